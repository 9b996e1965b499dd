use config::{Config, Environment};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use super::oauth::{DEFAULT_AUTHORITY, DEFAULT_REFRESH_BUFFER};
use crate::errors::{AideError, AideResult};

pub const ENV_PREFIX: &str = "AIDE";

/// Content-safety flags forwarded to the gateway on every request
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ContentSafety {
    #[serde(default = "default_true")]
    pub scrub_input: bool,
    #[serde(default = "default_true")]
    pub apply_guardrail: bool,
    #[serde(default)]
    pub fail_on_scrub: bool,
    #[serde(default = "default_scrubbing_timeout")]
    pub scrubbing_timeout_seconds: u64,
}

impl Default for ContentSafety {
    fn default() -> Self {
        Self {
            scrub_input: true,
            apply_guardrail: true,
            fail_on_scrub: false,
            scrubbing_timeout_seconds: default_scrubbing_timeout(),
        }
    }
}

/// Azure AD client-credentials settings
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AzureSettings {
    pub tenant_id: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub scope: Option<String>,
    pub authority: Option<String>,
}

/// Complete, validated Azure credentials
#[derive(Debug, Clone)]
pub struct AzureCredentials {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    pub scope: String,
    pub authority: String,
    pub refresh_buffer: Duration,
}

impl AzureSettings {
    pub fn credentials(&self) -> AideResult<AzureCredentials> {
        Ok(AzureCredentials {
            tenant_id: required(&self.tenant_id, "azure.tenant_id", "AIDE_AZURE__TENANT_ID")?,
            client_id: required(&self.client_id, "azure.client_id", "AIDE_AZURE__CLIENT_ID")?,
            client_secret: required(
                &self.client_secret,
                "azure.client_secret",
                "AIDE_AZURE__CLIENT_SECRET",
            )?,
            scope: required(&self.scope, "azure.scope", "AIDE_AZURE__SCOPE")?,
            authority: self
                .authority
                .clone()
                .unwrap_or_else(|| DEFAULT_AUTHORITY.to_string()),
            refresh_buffer: DEFAULT_REFRESH_BUFFER,
        })
    }
}

/// Settings for the AIDE provider.
///
/// Everything is optional at this level so that loading never fails on a
/// missing value; the provider factory checks the required ones and names the
/// first that is absent.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AideSettings {
    pub base_url: Option<String>,
    pub use_case_id: Option<String>,
    /// Logging id attached to every request
    pub solma_id: Option<String>,
    #[serde(default)]
    pub azure: AzureSettings,
    #[serde(default)]
    pub safety: ContentSafety,
    /// Headers sent with every gateway request
    #[serde(default)]
    pub headers: HashMap<String, String>,
    pub timeout_secs: Option<u64>,
}

impl AideSettings {
    /// Load settings from `AIDE_*` environment variables.
    /// Nested values use `__`, e.g. `AIDE_AZURE__TENANT_ID`.
    pub fn from_env() -> AideResult<Self> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__"),
            )
            .build()?;

        let settings: Self = config.try_deserialize()?;
        tracing::debug!(
            base_url = ?settings.base_url,
            use_case_id = ?settings.use_case_id,
            "loaded AIDE settings from environment"
        );
        Ok(settings)
    }

    pub fn base_url(&self) -> AideResult<String> {
        required(&self.base_url, "base_url", "AIDE_BASE_URL")
    }

    pub fn use_case_id(&self) -> AideResult<String> {
        required(&self.use_case_id, "use_case_id", "AIDE_USE_CASE_ID")
    }

    pub fn solma_id(&self) -> AideResult<String> {
        required(&self.solma_id, "solma_id", "AIDE_SOLMA_ID")
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout_secs.map(Duration::from_secs)
    }
}

fn required(
    value: &Option<String>,
    setting: &'static str,
    env_var: &'static str,
) -> AideResult<String> {
    match value.as_deref().map(str::trim) {
        Some(v) if !v.is_empty() => Ok(v.to_string()),
        _ => Err(AideError::MissingSetting { setting, env_var }),
    }
}

fn default_true() -> bool {
    true
}

fn default_scrubbing_timeout() -> u64 {
    10
}
