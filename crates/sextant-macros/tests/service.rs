//! Integration tests for `#[service]`.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sextant_core::{
    execute, Context, DispatchError, RegistrationError, Service, ServiceDescriptor, ServiceError,
    TypeTag,
};
use sextant_macros::service;
use std::sync::Arc;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
struct Job {
    id: u64,
    name: String,
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct JobsList {
    jobs: Vec<Job>,
}

#[derive(Default)]
struct JobsApi {
    jobs: RwLock<Vec<Job>>,
}

#[service]
impl JobsApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn list(&self, _ctx: &Context) -> Result<JobsList, ServiceError> {
        Ok(JobsList {
            jobs: self.jobs.read().clone(),
        })
    }

    pub async fn create(&self, _ctx: &Context, mut job: Job) -> Result<Job, ServiceError> {
        let mut jobs = self.jobs.write();
        job.id = jobs.len() as u64 + 1;
        jobs.push(job.clone());
        Ok(job)
    }

    pub fn rename(&self, _ctx: &Context, job: Job) -> anyhow::Result<()> {
        let mut jobs = self.jobs.write();
        let existing = jobs
            .iter_mut()
            .find(|j| j.id == job.id)
            .ok_or_else(|| ServiceError::not_found(format!("job {}", job.id)))?;
        existing.name = job.name;
        Ok(())
    }

    pub async fn clear(&self, _ctx: &Context) -> Result<(), ServiceError> {
        self.jobs.write().clear();
        Ok(())
    }

    fn count(&self) -> usize {
        self.jobs.read().len()
    }
}

#[derive(Debug)]
struct MissingContext;

#[service]
impl MissingContext {
    pub fn list_fail(&self, _r: JobsList) -> Result<(), ServiceError> {
        Ok(())
    }
}

mod tera {
    pub struct Context;
}

struct ForeignContext;

#[service]
impl ForeignContext {
    pub fn render(&self, _ctx: &tera::Context) -> Result<(), ServiceError> {
        Ok(())
    }
}

struct NoError;

#[service]
impl NoError {
    pub fn list(&self, _ctx: &Context) -> JobsList {
        JobsList::default()
    }
}

struct Mutating;

#[service]
impl Mutating {
    pub fn bump(&mut self, _ctx: &Context) -> Result<(), ServiceError> {
        Ok(())
    }
}

struct BorrowedRequest;

#[service]
impl BorrowedRequest {
    pub fn create(&self, _ctx: &Context, _job: &Job) -> Result<(), ServiceError> {
        Ok(())
    }
}

struct Renamed;

#[service(name = "jobs")]
impl Renamed {
    pub fn ping(&self, _ctx: &Context) -> Result<(), ServiceError> {
        Ok(())
    }
}

#[test]
fn table_lists_public_receiver_methods() {
    let mut names: Vec<_> = JobsApi::methods()
        .into_iter()
        .map(|entry| entry.signature.name)
        .collect();
    names.sort_unstable();
    assert_eq!(names, vec!["clear", "create", "list", "rename"]);
    assert_eq!(JobsApi::NAME, "JobsApi");
    assert_eq!(JobsApi::new().count(), 0);
}

#[test]
fn table_records_type_tags() {
    let create = JobsApi::methods()
        .into_iter()
        .find(|entry| entry.signature.name == "create")
        .unwrap();
    assert!(create.signature.is_async);
    assert_eq!(
        create.signature.params,
        vec![TypeTag::Context, TypeTag::Payload("Job")]
    );
    assert_eq!(
        create.signature.returns,
        vec![TypeTag::Payload("Job"), TypeTag::Error("ServiceError")]
    );
    assert!(create.invoker.is_some());
}

#[test]
fn all_four_shapes_build() {
    let jobs = ServiceDescriptor::build(JobsApi::new()).unwrap();

    let shape = |name: &str| {
        let method = jobs.method(name).unwrap();
        (method.consumes_body(), method.return_count())
    };
    assert_eq!(shape("clear"), (false, 1));
    assert_eq!(shape("list"), (false, 2));
    assert_eq!(shape("rename"), (true, 1));
    assert_eq!(shape("create"), (true, 2));
}

#[test]
fn missing_context_fails_registration() {
    let err = ServiceDescriptor::build(MissingContext).unwrap_err();
    match err {
        RegistrationError::MissingContext {
            service,
            method,
            found,
        } => {
            assert_eq!(service, "MissingContext");
            assert_eq!(method, "list_fail");
            assert_eq!(found, "JobsList");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn foreign_context_type_fails_registration() {
    match ServiceDescriptor::build(ForeignContext) {
        Err(RegistrationError::MissingContext { found, .. }) => assert_eq!(found, "&tera::Context"),
        other => panic!("unexpected result: {:?}", other.map(|d| d.len())),
    }
}

#[test]
fn missing_error_return_fails_registration() {
    assert!(matches!(
        ServiceDescriptor::build(NoError),
        Err(RegistrationError::MissingErrorReturn { .. })
    ));
}

#[test]
fn exclusive_receiver_fails_registration() {
    assert!(matches!(
        ServiceDescriptor::build(Mutating),
        Err(RegistrationError::ExclusiveReceiver { .. })
    ));
}

#[test]
fn borrowed_request_fails_registration() {
    match ServiceDescriptor::build(BorrowedRequest) {
        Err(RegistrationError::RequestNotOwned { found, .. }) => assert_eq!(found, "&Job"),
        other => panic!("unexpected result: {:?}", other.map(|d| d.len())),
    }
}

#[test]
fn name_override_sets_mount_path() {
    let renamed = ServiceDescriptor::build(Renamed).unwrap();
    assert_eq!(renamed.name(), "jobs");
    assert_eq!(renamed.path(), "/jobs");
}

#[tokio::test]
async fn generated_invokers_dispatch() {
    let jobs = ServiceDescriptor::build(JobsApi::new()).unwrap();
    let receiver = Arc::clone(jobs.receiver());

    let ctx = Context::builder().body(r#"{"name":"build"}"#).build();
    execute(jobs.method("create").unwrap(), Arc::clone(&receiver), ctx.clone())
        .await
        .unwrap();
    let created: Job = serde_json::from_slice(&ctx.into_response_parts().body).unwrap();
    assert_eq!(created.id, 1);

    let ctx = Context::builder().body(r#"{"id":1,"name":"deploy"}"#).build();
    execute(jobs.method("rename").unwrap(), Arc::clone(&receiver), ctx.clone())
        .await
        .unwrap();
    assert_eq!(ctx.written(), 0);

    let ctx = Context::builder().build();
    execute(jobs.method("list").unwrap(), Arc::clone(&receiver), ctx.clone())
        .await
        .unwrap();
    let body = ctx.into_response_parts().body;
    assert!(body.ends_with(b"\n"));
    let listed: JobsList = serde_json::from_slice(&body).unwrap();
    assert_eq!(listed.jobs[0].name, "deploy");
}

#[tokio::test]
async fn anyhow_method_error_keeps_service_error() {
    let jobs = ServiceDescriptor::build(JobsApi::new()).unwrap();
    let ctx = Context::builder().body(r#"{"id":9,"name":"x"}"#).build();

    let err = execute(
        jobs.method("rename").unwrap(),
        Arc::clone(jobs.receiver()),
        ctx,
    )
    .await
    .unwrap_err();

    assert!(matches!(err, DispatchError::Method(_)));
    assert_eq!(err.status_code(), http::StatusCode::NOT_FOUND);
}
