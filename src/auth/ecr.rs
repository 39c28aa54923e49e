//! AWS ECR authentication.
//!
//! ECR issues short-lived registry tokens via `GetAuthorizationToken`; the
//! decoded token is a `user:password` pair valid for about twelve hours.
//! The provider tracks the token's actual expiry once the service has
//! reported it and falls back to the nominal lifetime before that.

use std::sync::Mutex;

use async_trait::async_trait;
use aws_sdk_ecr::config::{BehaviorVersion, Credentials, Region};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};

use crate::auth::{env_or_file, Authenticator, RegistryAuth};
use crate::error::CredentialError;

const ACCESS_KEY: &str = "AWS_ACCESS_KEY_ID";
const SECRET_KEY: &str = "AWS_SECRET_ACCESS_KEY";
const REGION_KEY: &str = "AWS_REGION";

fn token_lifetime() -> Duration {
    Duration::hours(12)
}

/// Credential provider for private ECR registries.
pub struct EcrAuthenticator {
    access_key_id: String,
    secret_access_key: SecretString,
    region: String,
    token_expiry: Mutex<Option<DateTime<Utc>>>,
}

impl EcrAuthenticator {
    pub fn new(
        access_key_id: impl Into<String>,
        secret_access_key: impl Into<String>,
        region: impl Into<String>,
    ) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: SecretString::from(secret_access_key.into()),
            region: region.into(),
            token_expiry: Mutex::new(None),
        }
    }

    /// Build from `AWS_*` variables. All-absent means the provider is not
    /// configured; a partial set is an error.
    pub fn from_env() -> Result<Option<Self>, CredentialError> {
        let access_key_id = env_or_file(ACCESS_KEY)?;
        let secret_access_key = env_or_file(SECRET_KEY)?;
        let region = std::env::var(REGION_KEY).ok();

        match (access_key_id, secret_access_key, region) {
            (None, None, None) => Ok(None),
            (Some(key), Some(secret), Some(region)) => Ok(Some(Self::new(key, secret, region))),
            (key, secret, region) => {
                let mut names = Vec::new();
                if key.is_none() {
                    names.push(ACCESS_KEY.to_string());
                }
                if secret.is_none() {
                    names.push(SECRET_KEY.to_string());
                }
                if region.is_none() {
                    names.push(REGION_KEY.to_string());
                }
                Err(CredentialError::MissingEnvironment { names })
            }
        }
    }

    fn client(&self) -> aws_sdk_ecr::Client {
        let credentials = Credentials::new(
            self.access_key_id.clone(),
            self.secret_access_key.expose_secret().to_string(),
            None,
            None,
            "swarmer-environment",
        );
        let config = aws_sdk_ecr::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(self.region.clone()))
            .credentials_provider(credentials)
            .build();
        aws_sdk_ecr::Client::from_conf(config)
    }
}

#[async_trait]
impl Authenticator for EcrAuthenticator {
    fn name(&self) -> &'static str {
        "ecr"
    }

    fn should_authenticate(&self, last_auth: Option<DateTime<Utc>>) -> bool {
        let Some(last) = last_auth else {
            return true;
        };
        if let Some(expiry) = *self.token_expiry.lock().expect("expiry lock poisoned") {
            return expiry < Utc::now();
        }
        Utc::now() - last > token_lifetime()
    }

    async fn obtain_auth(&self) -> Result<RegistryAuth, CredentialError> {
        let response = self
            .client()
            .get_authorization_token()
            .send()
            .await
            .map_err(|e| CredentialError::Ecr {
                reason: e.to_string(),
            })?;

        let data = response
            .authorization_data()
            .first()
            .ok_or(CredentialError::Ecr {
                reason: "no authorization data returned".to_string(),
            })?;

        let token = data
            .authorization_token()
            .ok_or(CredentialError::MalformedToken)?;
        let decoded = BASE64
            .decode(token)
            .ok()
            .and_then(|raw| String::from_utf8(raw).ok())
            .ok_or(CredentialError::MalformedToken)?;
        let (username, password) = decoded
            .split_once(':')
            .ok_or(CredentialError::MalformedToken)?;

        let registry = data
            .proxy_endpoint()
            .ok_or(CredentialError::MalformedToken)?
            .to_string();

        let expiry = data
            .expires_at()
            .and_then(|at| DateTime::from_timestamp(at.secs(), 0));
        *self.token_expiry.lock().expect("expiry lock poisoned") = expiry;

        Ok(RegistryAuth {
            username: username.to_string(),
            password: SecretString::from(password.to_string()),
            registry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_login_always_required() {
        let auth = EcrAuthenticator::new("AKIA", "secret", "us-east-1");
        assert!(auth.should_authenticate(None));
    }

    #[test]
    fn test_nominal_lifetime_before_expiry_known() {
        let auth = EcrAuthenticator::new("AKIA", "secret", "us-east-1");
        assert!(!auth.should_authenticate(Some(Utc::now() - Duration::hours(1))));
        assert!(auth.should_authenticate(Some(Utc::now() - Duration::hours(13))));
    }

    #[test]
    fn test_reported_expiry_wins() {
        let auth = EcrAuthenticator::new("AKIA", "secret", "us-east-1");

        *auth.token_expiry.lock().unwrap() = Some(Utc::now() + Duration::hours(1));
        assert!(!auth.should_authenticate(Some(Utc::now() - Duration::days(2))));

        *auth.token_expiry.lock().unwrap() = Some(Utc::now() - Duration::minutes(1));
        assert!(auth.should_authenticate(Some(Utc::now())));
    }
}
