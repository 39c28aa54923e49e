//! Username/password authentication for a generic private registry.

use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::SecretString;

use crate::auth::{env_or_file, Authenticator, RegistryAuth};
use crate::error::CredentialError;

const USER_KEY: &str = "BASIC_AUTH_USER";
const PASS_KEY: &str = "BASIC_AUTH_PASS";
const REGISTRY_KEY: &str = "BASIC_AUTH_REGISTRY";
const REAUTH_KEY: &str = "BASIC_AUTH_SHOULD_REAUTH";
const REAUTH_HOURS_KEY: &str = "BASIC_AUTH_REAUTH_HOURS";
const DEFAULT_REAUTH_HOURS: i64 = 6;

/// Static credentials, authenticated once unless renewal is enabled.
pub struct BasicAuthenticator {
    username: String,
    password: SecretString,
    registry: String,
    /// `None` means the login never expires.
    renew_interval: Option<Duration>,
    has_authenticated: AtomicBool,
}

impl BasicAuthenticator {
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        registry: impl Into<String>,
        renew_interval: Option<Duration>,
    ) -> Self {
        Self {
            username: username.into(),
            password: SecretString::from(password.into()),
            registry: registry.into(),
            renew_interval,
            has_authenticated: AtomicBool::new(false),
        }
    }

    /// Build from `BASIC_AUTH_*` variables. All-absent means the provider is
    /// not configured; a partial set is an error.
    pub fn from_env() -> Result<Option<Self>, CredentialError> {
        let username = std::env::var(USER_KEY).ok();
        let password = env_or_file(PASS_KEY)?;
        let registry = std::env::var(REGISTRY_KEY).ok();

        let (username, password, registry) = match (username, password, registry) {
            (None, None, None) => return Ok(None),
            (Some(u), Some(p), Some(r)) => (u, p, r),
            (username, password, registry) => {
                let mut names = Vec::new();
                if username.is_none() {
                    names.push(USER_KEY.to_string());
                }
                if password.is_none() {
                    names.push(PASS_KEY.to_string());
                }
                if registry.is_none() {
                    names.push(REGISTRY_KEY.to_string());
                }
                return Err(CredentialError::MissingEnvironment { names });
            }
        };

        let renew_interval = if should_renew_from_env() {
            let hours = std::env::var(REAUTH_HOURS_KEY)
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_REAUTH_HOURS);
            Some(Duration::hours(hours))
        } else {
            None
        };

        Ok(Some(Self::new(username, password, registry, renew_interval)))
    }
}

fn should_renew_from_env() -> bool {
    std::env::var(REAUTH_KEY)
        .map(|v| truthy(&v))
        .unwrap_or(false)
}

fn truthy(value: &str) -> bool {
    matches!(
        value.to_ascii_lowercase().as_str(),
        "yes" | "y" | "true" | "t" | "1"
    )
}

#[async_trait]
impl Authenticator for BasicAuthenticator {
    fn name(&self) -> &'static str {
        "basic"
    }

    fn should_authenticate(&self, last_auth: Option<DateTime<Utc>>) -> bool {
        if !self.has_authenticated.load(Ordering::SeqCst) {
            return true;
        }
        let Some(interval) = self.renew_interval else {
            return false;
        };
        match last_auth {
            None => true,
            Some(last) => Utc::now() - last > interval,
        }
    }

    async fn obtain_auth(&self) -> Result<RegistryAuth, CredentialError> {
        self.has_authenticated.store(true, Ordering::SeqCst);
        Ok(RegistryAuth {
            username: self.username.clone(),
            password: self.password.clone(),
            registry: self.registry.clone(),
        })
    }
}
