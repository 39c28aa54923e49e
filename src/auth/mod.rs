//! Registry authentication for private image pulls.
//!
//! A broker coordinates zero or more credential providers. Each provider
//! knows whether it needs to (re)authenticate and how to obtain a fresh
//! credential set; the broker performs logins lazily, caches the results,
//! and records the last login time per provider. The container backend
//! checks `any_require_login` before every service create so the hot path
//! stays cheap once everything is fresh.

mod basic;
mod ecr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use secrecy::SecretString;
use tokio::sync::Mutex;

pub use basic::BasicAuthenticator;
pub use ecr::EcrAuthenticator;

use crate::error::CredentialError;

/// Credentials for one container registry.
#[derive(Debug, Clone)]
pub struct RegistryAuth {
    pub username: String,
    pub password: SecretString,
    /// Registry URL these credentials belong to.
    pub registry: String,
}

/// A source of registry credentials.
#[async_trait]
pub trait Authenticator: Send + Sync {
    /// Short provider name, for logs.
    fn name(&self) -> &'static str;

    /// Whether a login should happen given the time of the last one.
    /// `None` means the provider has never logged in and always answers true
    /// for providers with credentials configured.
    fn should_authenticate(&self, last_auth: Option<DateTime<Utc>>) -> bool;

    /// Produce a fresh credential set.
    async fn obtain_auth(&self) -> Result<RegistryAuth, CredentialError>;
}

struct ProviderEntry {
    provider: Box<dyn Authenticator>,
    last_login: Option<DateTime<Utc>>,
    auth: Option<RegistryAuth>,
}

/// Coordinates the configured credential providers.
pub struct AuthBroker {
    entries: Mutex<Vec<ProviderEntry>>,
    provider_count: usize,
}

impl AuthBroker {
    /// Build a broker over an explicit provider registry.
    pub fn new(providers: Vec<Box<dyn Authenticator>>) -> Self {
        let provider_count = providers.len();
        let entries = providers
            .into_iter()
            .map(|provider| ProviderEntry {
                provider,
                last_login: None,
                auth: None,
            })
            .collect();
        Self {
            entries: Mutex::new(entries),
            provider_count,
        }
    }

    /// Discover providers from the environment. Providers with no
    /// configuration at all are skipped; partially configured providers are
    /// a hard error. Returns `None` when nothing is configured.
    pub fn from_env() -> Result<Option<Self>, CredentialError> {
        let mut providers: Vec<Box<dyn Authenticator>> = Vec::new();
        if let Some(basic) = BasicAuthenticator::from_env()? {
            tracing::info!("registry authentication: basic provider enabled");
            providers.push(Box::new(basic));
        }
        if let Some(ecr) = EcrAuthenticator::from_env()? {
            tracing::info!("registry authentication: ECR provider enabled");
            providers.push(Box::new(ecr));
        }
        if providers.is_empty() {
            tracing::info!("no registry authentication providers configured");
            Ok(None)
        } else {
            Ok(Some(Self::new(providers)))
        }
    }

    pub fn has_providers(&self) -> bool {
        self.provider_count > 0
    }

    /// Whether any provider would log in right now.
    pub async fn any_require_login(&self) -> bool {
        let entries = self.entries.lock().await;
        entries
            .iter()
            .any(|e| e.provider.should_authenticate(e.last_login))
    }

    /// Run logins for every provider that reports it should authenticate,
    /// caching the credentials and stamping the login time.
    pub async fn perform_logins(&self) -> Result<(), CredentialError> {
        let mut entries = self.entries.lock().await;
        for entry in entries.iter_mut() {
            if !entry.provider.should_authenticate(entry.last_login) {
                continue;
            }
            tracing::info!("logging in via the {} provider", entry.provider.name());
            let auth = entry.provider.obtain_auth().await?;
            entry.auth = Some(auth);
            entry.last_login = Some(Utc::now());
        }
        Ok(())
    }

    /// The currently cached credential sets, in provider order.
    pub async fn credentials(&self) -> Vec<RegistryAuth> {
        let entries = self.entries.lock().await;
        entries.iter().filter_map(|e| e.auth.clone()).collect()
    }
}

/// Read `name` from the environment, falling back to the file named by
/// `{name}_FILE` (the swarm secrets convention). Values read from files are
/// trimmed of surrounding whitespace.
pub(crate) fn env_or_file(name: &str) -> Result<Option<String>, CredentialError> {
    if let Ok(value) = std::env::var(name) {
        return Ok(Some(value));
    }
    match std::env::var(format!("{name}_FILE")) {
        Ok(path) => match std::fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents.trim().to_string())),
            Err(source) => Err(CredentialError::CredentialFile { path, source }),
        },
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use secrecy::ExposeSecret;

    use super::*;

    struct StubProvider {
        renew: bool,
        logins: AtomicUsize,
    }

    impl StubProvider {
        fn new(renew: bool) -> Self {
            Self {
                renew,
                logins: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Authenticator for StubProvider {
        fn name(&self) -> &'static str {
            "stub"
        }

        fn should_authenticate(&self, last_auth: Option<DateTime<Utc>>) -> bool {
            last_auth.is_none() || self.renew
        }

        async fn obtain_auth(&self) -> Result<RegistryAuth, CredentialError> {
            let n = self.logins.fetch_add(1, Ordering::SeqCst);
            Ok(RegistryAuth {
                username: format!("user-{n}"),
                password: SecretString::from("hunter2"),
                registry: "registry.example.com".to_string(),
            })
        }
    }

    #[tokio::test]
    async fn test_login_once_then_cached() {
        let broker = AuthBroker::new(vec![Box::new(StubProvider::new(false))]);
        assert!(broker.has_providers());
        assert!(broker.any_require_login().await);

        broker.perform_logins().await.unwrap();
        assert!(!broker.any_require_login().await);

        let auths = broker.credentials().await;
        assert_eq!(auths.len(), 1);
        assert_eq!(auths[0].username, "user-0");
        assert_eq!(auths[0].password.expose_secret(), "hunter2");

        // A second pass is a no-op for a provider that never renews.
        broker.perform_logins().await.unwrap();
        assert_eq!(broker.credentials().await[0].username, "user-0");
    }

    #[tokio::test]
    async fn test_renewing_provider_logs_in_again() {
        let broker = AuthBroker::new(vec![Box::new(StubProvider::new(true))]);
        broker.perform_logins().await.unwrap();
        broker.perform_logins().await.unwrap();
        assert_eq!(broker.credentials().await[0].username, "user-1");
        assert!(broker.any_require_login().await);
    }

    #[tokio::test]
    async fn test_empty_broker() {
        let broker = AuthBroker::new(Vec::new());
        assert!(!broker.has_providers());
        assert!(!broker.any_require_login().await);
        broker.perform_logins().await.unwrap();
        assert!(broker.credentials().await.is_empty());
    }
}
