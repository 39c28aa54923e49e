//! Docker Swarm backend.
//!
//! Every task runs as a one-shot swarm service: restart policy `none`,
//! attached to the configured overlay network, with the callback address
//! injected through environment variables so the task container knows where
//! to report its result.

use std::sync::Arc;

use async_trait::async_trait;
use bollard::auth::DockerCredentials;
use bollard::models::{
    NetworkAttachmentConfig, ServiceSpec, TaskSpec, TaskSpecContainerSpec, TaskSpecRestartPolicy,
    TaskSpecRestartPolicyConditionEnum,
};
use bollard::{Docker, API_DEFAULT_VERSION};
use secrecy::ExposeSecret;

use crate::auth::{AuthBroker, RegistryAuth};
use crate::config::RunnerConfig;
use crate::error::BackendError;

/// The capability surface the scheduler needs from a container backend.
#[async_trait]
pub trait ContainerBackend: Send + Sync {
    /// Launch one task container, returning the opaque service id.
    async fn start_task(
        &self,
        job_id: &str,
        image: &str,
        task_name: &str,
        args: &[String],
    ) -> Result<String, BackendError>;

    /// Remove a batch of services. Idempotent: ids that no longer exist are
    /// skipped silently.
    async fn remove_services(&self, service_ids: &[String]) -> Result<(), BackendError>;
}

/// Connect to the Docker daemon on the given socket. Accepts both a bare
/// path and the `unix://` form.
pub fn connect_docker(socket_path: &str) -> Result<Docker, BackendError> {
    let path = socket_path.strip_prefix("unix://").unwrap_or(socket_path);
    Ok(Docker::connect_with_socket(path, 120, API_DEFAULT_VERSION)?)
}

/// [`ContainerBackend`] over the Docker Engine swarm API.
pub struct SwarmClient {
    docker: Docker,
    config: RunnerConfig,
    broker: Option<Arc<AuthBroker>>,
}

impl SwarmClient {
    pub fn new(docker: Docker, config: RunnerConfig, broker: Option<Arc<AuthBroker>>) -> Self {
        Self {
            docker,
            config,
            broker,
        }
    }

    /// Credentials for creating a service from `image`, refreshing logins
    /// first when any provider reports it needs one.
    async fn registry_credentials(
        &self,
        image: &str,
    ) -> Result<Option<DockerCredentials>, BackendError> {
        let Some(broker) = &self.broker else {
            return Ok(None);
        };
        if !broker.has_providers() {
            return Ok(None);
        }
        if broker.any_require_login().await {
            broker.perform_logins().await?;
        }
        let auths = broker.credentials().await;
        Ok(select_auth(&auths, image).map(docker_credentials))
    }
}

#[async_trait]
impl ContainerBackend for SwarmClient {
    async fn start_task(
        &self,
        job_id: &str,
        image: &str,
        task_name: &str,
        args: &[String],
    ) -> Result<String, BackendError> {
        let name = service_name(job_id, task_name);
        let credentials = self.registry_credentials(image).await?;

        let spec = ServiceSpec {
            name: Some(name.clone()),
            task_template: Some(TaskSpec {
                container_spec: Some(TaskSpecContainerSpec {
                    image: Some(image.to_string()),
                    env: Some(build_task_env(&self.config, job_id, task_name, args)),
                    ..Default::default()
                }),
                restart_policy: Some(TaskSpecRestartPolicy {
                    condition: Some(TaskSpecRestartPolicyConditionEnum::NONE),
                    ..Default::default()
                }),
                networks: Some(vec![NetworkAttachmentConfig {
                    target: Some(self.config.network.clone()),
                    ..Default::default()
                }]),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = self.docker.create_service(spec, credentials).await?;
        let service_id = response
            .id
            .ok_or(BackendError::MissingServiceId { service: name })?;
        tracing::info!(
            "started service {} for task {} in job {}",
            service_id,
            task_name,
            job_id
        );
        Ok(service_id)
    }

    async fn remove_services(&self, service_ids: &[String]) -> Result<(), BackendError> {
        let mut first_error = None;
        for service_id in service_ids {
            match self.docker.delete_service(service_id).await {
                Ok(()) => tracing::debug!("removed service {}", service_id),
                Err(bollard::errors::Error::DockerResponseServerError {
                    status_code: 404, ..
                }) => {
                    tracing::debug!("service {} already gone", service_id);
                }
                Err(e) => {
                    tracing::warn!("failed to remove service {}: {}", service_id, e);
                    first_error.get_or_insert(e);
                }
            }
        }
        match first_error {
            None => Ok(()),
            Some(e) => Err(e.into()),
        }
    }
}

fn service_name(job_id: &str, task_name: &str) -> String {
    format!("{job_id}-{task_name}")
}

/// Environment injected into every task container. `RUN_ARGS` only appears
/// when the task actually has arguments.
fn build_task_env(
    config: &RunnerConfig,
    job_id: &str,
    task_name: &str,
    args: &[String],
) -> Vec<String> {
    let mut env = vec![
        format!(
            "SWARMER_ADDRESS=http://{}:{}/result/{}",
            config.host, config.port, job_id
        ),
        format!("TASK_NAME={task_name}"),
        format!("SWARMER_JOB_ID={job_id}"),
    ];
    if !args.is_empty() {
        env.push(format!("RUN_ARGS={}", args.join(",")));
    }
    env
}

/// Pick the credential set whose registry matches the image reference,
/// falling back to the first configured provider.
fn select_auth<'a>(auths: &'a [RegistryAuth], image: &str) -> Option<&'a RegistryAuth> {
    auths
        .iter()
        .find(|auth| {
            let host = auth
                .registry
                .trim_start_matches("https://")
                .trim_start_matches("http://");
            !host.is_empty() && image.starts_with(host)
        })
        .or_else(|| auths.first())
}

fn docker_credentials(auth: &RegistryAuth) -> DockerCredentials {
    DockerCredentials {
        username: Some(auth.username.clone()),
        password: Some(auth.password.expose_secret().to_string()),
        serveraddress: Some(auth.registry.clone()),
        ..Default::default()
    }
}
