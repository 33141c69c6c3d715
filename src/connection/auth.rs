//! Credential resolution for the remote service client.
//!
//! Credentials are chosen by priority:
//!
//! 1. a named profile (`AWSProfile`)
//! 2. the shared configuration files, when `AWS_SDK_LOAD_CONFIG` is set
//! 3. static keys from the config or the environment
//! 4. the SDK default chain for the configured region

use crate::connection::Config;
use crate::error::ConnectionError;
use aws_config::{BehaviorVersion, Region, SdkConfig};
use aws_credential_types::Credentials;
use std::fmt;

/// Environment variable that switches on shared configuration loading.
pub const ENV_SDK_LOAD_CONFIG: &str = "AWS_SDK_LOAD_CONFIG";

/// Provider name attached to static credentials.
const STATIC_PROVIDER_NAME: &str = "athena-sql";

/// Where the client's credentials come from.
#[derive(Clone, PartialEq, Eq)]
pub enum CredentialSource {
    Profile(String),
    SharedConfig,
    Static {
        access_id: String,
        secret_access_key: String,
        session_token: Option<String>,
    },
    RegionOnly,
}

impl CredentialSource {
    /// Pick the credential source for `config`, consulting the process environment.
    pub fn resolve(config: &Config) -> Self {
        Self::resolve_with(config, |name| std::env::var(name).ok())
    }

    pub(crate) fn resolve_with(config: &Config, env: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(profile) = config.aws_profile().filter(|p| !p.is_empty()) {
            return Self::Profile(profile.to_string());
        }
        if env(ENV_SDK_LOAD_CONFIG).is_some_and(|v| !v.is_empty()) {
            return Self::SharedConfig;
        }
        match (config.access_id_with(&env), config.secret_access_key_with(&env)) {
            (Some(access_id), Some(secret_access_key)) => Self::Static {
                access_id,
                secret_access_key,
                session_token: config.session_token_with(&env),
            },
            _ => Self::RegionOnly,
        }
    }

    /// Short name used in log messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Profile(_) => "profile",
            Self::SharedConfig => "shared-config",
            Self::Static { .. } => "static",
            Self::RegionOnly => "region-only",
        }
    }
}

impl fmt::Debug for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Profile(name) => f.debug_tuple("Profile").field(name).finish(),
            Self::SharedConfig => write!(f, "SharedConfig"),
            Self::Static { session_token, .. } => f
                .debug_struct("Static")
                .field("access_id", &"<redacted>")
                .field("secret_access_key", &"<redacted>")
                .field("session_token", &session_token.as_ref().map(|_| "<redacted>"))
                .finish(),
            Self::RegionOnly => write!(f, "RegionOnly"),
        }
    }
}

/// Load SDK configuration for `config`'s region and credential source.
///
/// # Errors
///
/// Returns `ConnectionError::Credentials` if static keys are incomplete.
pub async fn load_sdk_config(config: &Config) -> Result<SdkConfig, ConnectionError> {
    let source = CredentialSource::resolve(config);
    let loader =
        aws_config::defaults(BehaviorVersion::latest()).region(Region::new(config.region()));

    let loader = match source {
        CredentialSource::Profile(profile) => loader.profile_name(profile),
        CredentialSource::SharedConfig | CredentialSource::RegionOnly => loader,
        CredentialSource::Static {
            access_id,
            secret_access_key,
            session_token,
        } => {
            if access_id.is_empty() || secret_access_key.is_empty() {
                return Err(ConnectionError::Credentials(
                    "static credentials need both an access key ID and a secret key".to_string(),
                ));
            }
            loader.credentials_provider(Credentials::new(
                access_id,
                secret_access_key,
                session_token,
                None,
                STATIC_PROVIDER_NAME,
            ))
        }
    };

    Ok(loader.load().await)
}
