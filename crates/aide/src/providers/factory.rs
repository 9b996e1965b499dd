use reqwest::Client;
use std::sync::Arc;

use super::aide::{header_map, AideLanguageModel, GatewayTarget};
use super::configs::AideSettings;
use super::oauth::{AzureTokenCache, TokenSupplier};
use super::registry::{ModelInfo, ModelRegistry};
use crate::errors::{AideError, AideResult};

/// Entry point that validates settings once and hands out language models.
///
/// Every model built by one provider shares its HTTP client and token
/// supplier, so a token fetched for one call is reused by all of them.
#[derive(Clone)]
pub struct AideProvider {
    client: Client,
    target: GatewayTarget,
    registry: ModelRegistry,
    tokens: Arc<dyn TokenSupplier>,
}

impl AideProvider {
    /// Build a provider that authenticates with Azure AD client credentials
    pub fn new(settings: AideSettings) -> AideResult<Self> {
        let target = gateway_target(&settings)?;
        let credentials = settings.azure.credentials()?;
        let client = build_client(&settings)?;
        let tokens = Arc::new(AzureTokenCache::with_client(client.clone(), credentials));
        Ok(Self::build(target, client, tokens))
    }

    /// Build a provider around a caller-supplied token source
    pub fn with_token_supplier(
        settings: AideSettings,
        tokens: Arc<dyn TokenSupplier>,
    ) -> AideResult<Self> {
        let target = gateway_target(&settings)?;
        let client = build_client(&settings)?;
        Ok(Self::build(target, client, tokens))
    }

    pub fn from_env() -> AideResult<Self> {
        Self::new(AideSettings::from_env()?)
    }

    /// Replace the built-in model table
    pub fn with_registry(mut self, registry: ModelRegistry) -> Self {
        self.registry = registry;
        self
    }

    fn build(target: GatewayTarget, client: Client, tokens: Arc<dyn TokenSupplier>) -> Self {
        tracing::debug!(url = %target.invoke_url(), "configured AIDE provider");
        Self {
            client,
            target,
            registry: ModelRegistry::builtin(),
            tokens,
        }
    }

    /// A language model for a logical model id
    pub fn language_model(&self, model_id: &str) -> AideResult<AideLanguageModel> {
        let info = self.registry.lookup(model_id)?.clone();
        Ok(AideLanguageModel::new(
            self.client.clone(),
            self.target.clone(),
            model_id,
            info,
            Arc::clone(&self.tokens),
        ))
    }

    pub fn get_model_info(&self, model_id: &str) -> AideResult<&ModelInfo> {
        self.registry.lookup(model_id)
    }

    pub fn list_models(&self) -> Vec<(String, ModelInfo)> {
        self.registry.list()
    }
}

/// Gateway settings are checked before credentials, so a bare environment
/// reports the missing base URL first
fn gateway_target(settings: &AideSettings) -> AideResult<GatewayTarget> {
    let base_url = settings.base_url()?;
    url::Url::parse(&base_url).map_err(|e| {
        AideError::InvalidSetting(format!("base_url `{}` is not a valid URL: {}", base_url, e))
    })?;

    Ok(GatewayTarget {
        base_url,
        use_case_id: settings.use_case_id()?,
        solma_id: settings.solma_id()?,
        safety: settings.safety.clone(),
        headers: header_map(&settings.headers)?,
    })
}

fn build_client(settings: &AideSettings) -> AideResult<Client> {
    let mut builder = Client::builder();
    if let Some(timeout) = settings.timeout() {
        builder = builder.timeout(timeout);
    }
    Ok(builder.build()?)
}
