use std::sync::Arc;

use anyhow::Context;
use tracing_subscriber::EnvFilter;

use swarmer::api::{self, ApiState};
use swarmer::auth::AuthBroker;
use swarmer::callback::CallbackPoster;
use swarmer::config::Config;
use swarmer::runner::JobRunner;
use swarmer::scheduler::{self, Scheduler};
use swarmer::store::{JobStore, RedisJobStore};
use swarmer::swarm::{self, ContainerBackend, SwarmClient};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("loading configuration from the environment")?;

    let store: Arc<dyn JobStore> = Arc::new(
        RedisJobStore::connect(&config.redis)
            .await
            .context("connecting to redis")?,
    );
    let docker =
        swarm::connect_docker(&config.docker_socket).context("connecting to the docker daemon")?;
    let broker = AuthBroker::from_env()
        .context("building registry authentication providers")?
        .map(Arc::new);
    let backend: Arc<dyn ContainerBackend> =
        Arc::new(SwarmClient::new(docker, config.runner.clone(), broker));

    let (scheduler, wake_rx) = Scheduler::new(store, config.scheduler.clone());
    let runner = Arc::new(JobRunner::new(Arc::clone(&scheduler), backend));

    // Background work: the dispatch loop drains the scheduler's wake
    // channel, the sweepers reconcile dead tasks and finished jobs.
    let _dispatch = Arc::clone(&runner).spawn_dispatch_loop(wake_rx);
    let _sweepers = scheduler::spawn_sweepers(scheduler, Arc::new(CallbackPoster::new()));

    api::serve(config.listen_port, ApiState { runner })
        .await
        .context("running the HTTP API")?;
    Ok(())
}
