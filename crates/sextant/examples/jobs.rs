//! In-memory job store.
//!
//! ```text
//! cargo run -p sextant --example jobs
//! curl -X POST localhost:8080/jobs/ -d '{"name":"build"}'
//! curl localhost:8080/jobs/
//! ```
//!
//! Settings come from `sextant.toml` (optional), `.env` and `SEXTANT__*`
//! variables, e.g. `SEXTANT__SERVER__HTTP_ADDR=127.0.0.1:3000`.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sextant::prelude::*;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Job {
    id: u64,
    name: String,
}

#[derive(Debug, Serialize)]
struct JobsList {
    jobs: Vec<Job>,
}

#[derive(Default)]
struct Store {
    jobs: Vec<Job>,
    next_id: u64,
}

#[derive(Default)]
struct JobsApi {
    store: RwLock<Store>,
}

#[service(name = "jobs")]
impl JobsApi {
    pub fn list(&self, _ctx: &Context) -> Result<JobsList, ServiceError> {
        Ok(JobsList {
            jobs: self.store.read().jobs.clone(),
        })
    }

    pub fn create(&self, ctx: &Context, mut job: Job) -> Result<Job, ServiceError> {
        if job.name.is_empty() {
            return Err(ServiceError::validation("job name must not be empty"));
        }

        let mut store = self.store.write();
        store.next_id += 1;
        job.id = store.next_id;
        store.jobs.push(job.clone());
        tracing::info!(request_id = %ctx.request_id(), job.id = job.id, "job created");
        Ok(job)
    }

    pub fn clear(&self, _ctx: &Context) -> Result<(), ServiceError> {
        self.store.write().jobs.clear();
        Ok(())
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = ConfigLoader::new()
        .with_development()
        .with_optional_file("sextant.toml")?
        .with_dotenv()?
        .with_env_prefix("SEXTANT")
        .load()?;

    init_logging(&config.logging.to_log_config())?;
    if config.metrics.enabled {
        init_metrics(&config.metrics.to_metrics_config())?;
    }

    let mut jobs = ServiceDescriptor::build(JobsApi::default())?;
    jobs.get("/", "list")?
        .post("/", "create")?
        .post("/clear", "clear")?;

    let mut server = Server::new(config.server.to_server_config());
    server.mount(&jobs)?;

    tracing::info!(addr = %server.config().http_addr(), "jobs service listening");
    server.run().await?;
    Ok(())
}
