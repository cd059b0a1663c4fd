//! End-to-end dispatch scenarios through the in-memory test client.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use http::StatusCode;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::json;
use sextant::prelude::*;
use sextant::server::ServerBuilder;
use sextant_test::TestClient;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Job {
    id: u64,
    name: String,
}

#[derive(Debug, Default, PartialEq, Serialize, Deserialize)]
struct JobsList {
    jobs: Vec<Job>,
}

#[derive(Default)]
struct JobsApi {
    jobs: RwLock<Vec<Job>>,
    last_id: AtomicU64,
    creates: AtomicUsize,
}

#[service]
impl JobsApi {
    pub fn list(&self, _ctx: &Context) -> Result<JobsList, ServiceError> {
        Ok(JobsList {
            jobs: self.jobs.read().clone(),
        })
    }

    pub async fn create(&self, _ctx: &Context, mut job: Job) -> Result<Job, ServiceError> {
        self.creates.fetch_add(1, Ordering::SeqCst);
        job.id = self.last_id.fetch_add(1, Ordering::SeqCst) + 1;
        self.jobs.write().push(job.clone());
        Ok(job)
    }

    pub fn clear(&self, _ctx: &Context) -> Result<(), ServiceError> {
        self.jobs.write().clear();
        Ok(())
    }

    pub fn echo(&self, _ctx: &Context, job: Job) -> Result<Job, ServiceError> {
        Ok(job)
    }

    pub fn fail(&self, _ctx: &Context) -> anyhow::Result<()> {
        anyhow::bail!("database password is hunter2")
    }

    pub async fn slow(&self, _ctx: &Context) -> Result<(), ServiceError> {
        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
        Ok(())
    }
}

struct MissingContext;

#[service]
impl MissingContext {
    pub fn list_fail(&self, _list: JobsList) -> Result<(), ServiceError> {
        Ok(())
    }
}

fn jobs_server(builder: ServerBuilder) -> (TestClient, std::sync::Arc<ServiceDescriptor<JobsApi>>) {
    let mut jobs = ServiceDescriptor::build(JobsApi::default()).unwrap();
    jobs.get("/", "list")
        .unwrap()
        .post("/", "create")
        .unwrap()
        .post("/clear", "clear")
        .unwrap()
        .post("/echo", "echo")
        .unwrap();

    let mut server = builder.build();
    server.bind(&jobs, "/jobs").unwrap();
    (TestClient::new(server), std::sync::Arc::new(jobs))
}

fn client() -> (TestClient, std::sync::Arc<ServiceDescriptor<JobsApi>>) {
    jobs_server(Server::builder())
}

#[tokio::test]
async fn list_returns_created_jobs() {
    let (client, _) = client();
    for name in ["build", "deploy"] {
        client
            .post("/jobs/")
            .json(&json!({ "name": name }))
            .send()
            .await
            .assert_status(StatusCode::OK);
    }

    let response = client.get("/jobs/").send().await;
    response
        .assert_status(StatusCode::OK)
        .assert_header("content-type", "application/json");
    let listed: JobsList = response.json().unwrap();
    assert_eq!(listed.jobs.len(), 2);
    assert_eq!(listed.jobs[1], Job { id: 2, name: "deploy".into() });
}

#[tokio::test]
async fn create_echoes_the_stored_job() {
    let (client, _) = client();
    let response = client
        .post("/jobs")
        .json(&json!({"name": "build"}))
        .send()
        .await;

    response.assert_json_eq(&json!({"id": 1, "name": "build"}));
    assert!(response.body().ends_with(b"\n"));
}

#[tokio::test]
async fn response_round_trips_into_equal_value() {
    let (client, _) = client();
    let job = Job {
        id: 42,
        name: "ship".into(),
    };
    let echoed: Job = client
        .post("/jobs/echo")
        .json(&job)
        .send()
        .await
        .json()
        .unwrap();
    assert_eq!(echoed, job);
}

#[tokio::test]
async fn error_only_method_writes_empty_body() {
    let (client, jobs) = client();
    client
        .post("/jobs/")
        .json(&json!({"name": "build"}))
        .send()
        .await;

    client
        .post("/jobs/clear")
        .send()
        .await
        .assert_status(StatusCode::OK)
        .assert_empty_body();
    assert!(jobs.receiver().jobs.read().is_empty());
}

#[tokio::test]
async fn ids_are_not_reused_after_clear() {
    let (client, _) = client();
    client.post("/jobs/").json(&json!({"name": "a"})).send().await;
    client.post("/jobs/clear").send().await.assert_status(StatusCode::OK);

    let created: Job = client
        .post("/jobs/")
        .json(&json!({"name": "b"}))
        .send()
        .await
        .json()
        .unwrap();
    assert_eq!(created.id, 2);
}

#[tokio::test]
async fn empty_body_decodes_to_default_request() {
    let (client, _) = client();
    let created: Job = client.post("/jobs/").send().await.json().unwrap();
    assert_eq!(created, Job { id: 1, name: String::new() });
}

#[tokio::test]
async fn null_body_decodes_to_default_request() {
    let (client, _) = client();
    let created: Job = client
        .post("/jobs/")
        .content_type("application/json")
        .body("null")
        .send()
        .await
        .json()
        .unwrap();
    assert_eq!(created, Job { id: 1, name: String::new() });
}

#[tokio::test]
async fn partial_body_fills_missing_fields_with_defaults() {
    let (client, _) = client();
    let echoed: Job = client
        .post("/jobs/echo")
        .json(&json!({"name": "ship"}))
        .send()
        .await
        .json()
        .unwrap();
    assert_eq!(echoed, Job { id: 0, name: "ship".into() });
}

#[tokio::test]
async fn malformed_json_is_rejected_before_invocation() {
    let (client, jobs) = client();
    let response = client
        .post("/jobs/")
        .content_type("application/json")
        .body("{\"name\":")
        .send()
        .await;

    response
        .assert_status(StatusCode::BAD_REQUEST)
        .assert_error_code("VALIDATION_ERROR");
    assert_eq!(jobs.receiver().creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn unknown_path_and_wrong_verb() {
    let (client, _) = client();
    client
        .get("/nope")
        .send()
        .await
        .assert_status(StatusCode::NOT_FOUND)
        .assert_error_code("NOT_FOUND");
    client
        .put("/jobs/")
        .send()
        .await
        .assert_status(StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn oversized_body_is_rejected() {
    let (client, jobs) = jobs_server(Server::builder().max_body_bytes(16));
    client
        .post("/jobs/")
        .json(&json!({"name": "a name well past sixteen bytes"}))
        .send()
        .await
        .assert_status(StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(jobs.receiver().creates.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn request_id_is_echoed() {
    let (client, _) = client();
    let id = "0190b3a4-7c1e-7a55-9d42-6f2a8c1b3e00";
    let response = client.get("/jobs/").header("x-request-id", id).send().await;
    assert_eq!(response.request_id(), Some(id));
}

#[tokio::test]
async fn foreign_errors_are_hidden() {
    let mut server = Server::builder().build();
    server.register(JobsApi::default()).unwrap();
    let client = TestClient::new(server);

    let response = client.get("/JobsApi/fail").send().await;
    response
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_error_code("INTERNAL_ERROR");
    assert!(!response.text().unwrap().contains("hunter2"));
}

#[tokio::test]
async fn slow_handler_times_out() {
    let mut server = Server::builder()
        .request_timeout(std::time::Duration::from_millis(20))
        .build();
    server.register(JobsApi::default()).unwrap();
    let client = TestClient::new(server);

    client
        .get("/JobsApi/slow")
        .send()
        .await
        .assert_status(StatusCode::GATEWAY_TIMEOUT);
}

#[test]
fn missing_context_fails_before_binding() {
    let mut server = Server::builder().build();
    let err = server.register(MissingContext).unwrap_err();

    assert!(matches!(
        err,
        ServerError::Registration(RegistrationError::MissingContext { .. })
    ));
    assert_eq!(server.router().route_count(), 0);
}

#[test]
fn route_reassignment_is_idempotent() {
    let mut jobs = ServiceDescriptor::build(JobsApi::default()).unwrap();
    jobs.post("/a", "create").unwrap();
    jobs.post("/b", "create").unwrap();
    jobs.post("/b", "create").unwrap();

    let create = jobs.method("create").unwrap();
    assert_eq!(create.verb(), Verb::Post);
    assert_eq!(create.path(), "/b");

    assert!(matches!(
        jobs.get("/", "missing"),
        Err(RegistrationError::UnknownMethod { .. })
    ));
}
