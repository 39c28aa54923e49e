//! Error types for the swarmer service, grouped by failure domain.

/// Errors raised by the durable job store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No job hash exists for the given identifier.
    #[error("can not find job with id: {id}")]
    JobNotFound { id: String },

    /// The job exists but has no task with the given name.
    #[error("unable to locate task {name} in job {id}")]
    TaskNotFound { id: String, name: String },

    /// The job hash exists but is missing a required field.
    #[error("job {id} record is missing field {field}")]
    Corrupt { id: String, field: &'static str },

    /// Redis command failure.
    #[error("redis error: {0}")]
    Redis(#[from] redis::RedisError),

    /// Task list (de)serialization failure.
    #[error("task list serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
}

impl StoreError {
    /// Whether this error means the referenced entity does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            StoreError::JobNotFound { .. } | StoreError::TaskNotFound { .. }
        )
    }
}

/// Errors raised by the scheduler's public operations.
#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    /// A job was submitted without any tasks.
    #[error("tasks must be provided with the job")]
    NoTasks,

    /// Two tasks in one submission share a name.
    #[error("duplicate task name {name} in job {id}")]
    DuplicateTask { id: String, name: String },

    /// The scheduler has no record of the job.
    #[error("unknown job {id}")]
    UnknownJob { id: String },

    /// The commit to the store failed.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Errors raised by the container backend.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// Docker API error.
    #[error("docker API error: {0}")]
    Docker(#[from] bollard::errors::Error),

    /// The engine accepted the service but returned no identifier.
    #[error("service create returned no id for {service}")]
    MissingServiceId { service: String },

    /// Registry login failed while preparing a create call.
    #[error("registry login failed: {0}")]
    Credential(#[from] CredentialError),
}

/// Errors raised while building or refreshing registry credentials.
#[derive(Debug, thiserror::Error)]
pub enum CredentialError {
    /// A provider is partially configured.
    #[error("the following required environment variables are missing: {names:?}")]
    MissingEnvironment { names: Vec<String> },

    /// Asked for authentication details when none are configured.
    #[error("was asked to generate authentication details, but there are no details set")]
    CredentialsNotPresent,

    /// A `*_FILE` secret could not be read.
    #[error("failed to read credential file {path}: {source}")]
    CredentialFile {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// The ECR token request failed.
    #[error("ECR token request failed: {reason}")]
    Ecr { reason: String },

    /// The ECR authorization token did not decode to `user:password`.
    #[error("malformed ECR authorization token")]
    MalformedToken,
}

/// Errors raised while loading configuration from the environment.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required environment variable {name}")]
    MissingEnv { name: &'static str },

    #[error("invalid value for {name}: {reason}")]
    InvalidEnv { name: &'static str, reason: String },
}
