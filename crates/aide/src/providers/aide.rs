use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::Client;
use serde_json::Value;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use super::base::{CallOptions, EventStream, GenerateResult, LanguageModel};
use super::configs::ContentSafety;
use super::oauth::TokenSupplier;
use super::registry::{BackendFamily, ModelInfo};
use super::stream::SimulatedStream;
use super::utils::{convert_request, gateway_error_message, parse_response, wrap_envelope};
use crate::errors::{AideError, AideResult};

/// Where and how requests reach the gateway
#[derive(Debug, Clone)]
pub struct GatewayTarget {
    pub base_url: String,
    pub use_case_id: String,
    pub solma_id: String,
    pub safety: ContentSafety,
    /// Sent with every request, before per-call overrides
    pub headers: HeaderMap,
}

impl GatewayTarget {
    pub fn invoke_url(&self) -> String {
        format!(
            "{}/usecases/{}/invoke",
            self.base_url.trim_end_matches('/'),
            self.use_case_id
        )
    }
}

/// Validate string headers into a `HeaderMap`; later entries replace earlier ones
pub fn header_map<'a, I>(headers: I) -> AideResult<HeaderMap>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let header_name = HeaderName::from_bytes(name.as_bytes())
            .map_err(|_| AideError::InvalidSetting(format!("invalid header name `{}`", name)))?;
        let header_value = HeaderValue::from_str(value).map_err(|_| {
            AideError::InvalidSetting(format!("invalid value for header `{}`", name))
        })?;
        map.insert(header_name, header_value);
    }
    Ok(map)
}

struct ModelState {
    client: Client,
    target: GatewayTarget,
    model_id: String,
    model: ModelInfo,
    tokens: Arc<dyn TokenSupplier>,
}

/// One logical model behind the AIDE gateway.
///
/// Cloning is cheap; clones share the HTTP client and token supplier.
#[derive(Clone)]
pub struct AideLanguageModel {
    state: Arc<ModelState>,
}

impl AideLanguageModel {
    pub fn new<S: Into<String>>(
        client: Client,
        target: GatewayTarget,
        model_id: S,
        model: ModelInfo,
        tokens: Arc<dyn TokenSupplier>,
    ) -> Self {
        Self {
            state: Arc::new(ModelState {
                client,
                target,
                model_id: model_id.into(),
                model,
                tokens,
            }),
        }
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.state.model
    }

    /// Provider defaults with the per-call overrides applied on top
    fn request_headers(&self, overrides: &HashMap<String, String>) -> AideResult<HeaderMap> {
        let mut headers = self.state.target.headers.clone();
        for (name, value) in header_map(overrides)? {
            if let Some(name) = name {
                headers.insert(name, value);
            }
        }
        Ok(headers)
    }

    async fn post(
        &self,
        payload: &Value,
        overrides: &HashMap<String, String>,
    ) -> AideResult<Value> {
        let headers = self.request_headers(overrides)?;
        let token = self.state.tokens.get_token().await?;
        let url = self.state.target.invoke_url();

        tracing::info!(
            model = %self.state.model_id,
            family = %self.state.model.backend_family,
            "sending gateway request"
        );

        let response = self
            .state
            .client
            .post(&url)
            .bearer_auth(token)
            .json(payload)
            .headers(headers)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            let message = gateway_error_message(status, &body);
            tracing::warn!(
                model = %self.state.model_id,
                status = status.as_u16(),
                %message,
                "gateway request failed"
            );
            return Err(AideError::Gateway {
                status: status.as_u16(),
                message,
            });
        }

        let response_body: Value = serde_json::from_str(&body)?;
        tracing::info!(
            model = %self.state.model_id,
            status = status.as_u16(),
            request_id = response_body.get("requestId").and_then(|v| v.as_str()),
            "gateway request succeeded"
        );
        Ok(response_body)
    }
}

/// Run `fut` unless `cancel` fires first
async fn until_cancelled<F, T>(cancel: Option<&CancellationToken>, fut: F) -> AideResult<T>
where
    F: Future<Output = AideResult<T>>,
{
    match cancel {
        Some(token) => {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(AideError::Cancelled),
                result = fut => result,
            }
        }
        None => fut.await,
    }
}

#[async_trait]
impl LanguageModel for AideLanguageModel {
    fn model_id(&self) -> &str {
        &self.state.model_id
    }

    fn backend_family(&self) -> BackendFamily {
        self.state.model.backend_family
    }

    async fn generate(&self, options: CallOptions) -> AideResult<GenerateResult> {
        let CallOptions {
            prompt,
            tools,
            tool_choice,
            settings,
            headers,
            cancel,
        } = options;

        let converted = convert_request(
            &prompt,
            &self.state.model,
            &settings,
            &tools,
            tool_choice.as_ref(),
        )?;
        let target = &self.state.target;
        let request_body = wrap_envelope(
            self.state.model.backend_family,
            converted.body,
            &target.safety,
            &target.solma_id,
        );
        tracing::debug!(
            model = %self.state.model_id,
            messages = prompt.len(),
            tools = tools.len(),
            "built gateway request"
        );

        let response_body =
            until_cancelled(cancel.as_ref(), self.post(&request_body, &headers)).await?;
        let result = parse_response(&response_body, &self.state.model)?;

        Ok(GenerateResult {
            result,
            warnings: converted.warnings,
            request_body,
            response_body,
        })
    }

    fn stream(&self, options: CallOptions) -> EventStream {
        let model = self.clone();
        Box::pin(async_stream::stream! {
            let events = match model.generate(options).await {
                Ok(generated) => SimulatedStream::new(generated.result, generated.warnings),
                Err(err) => {
                    tracing::warn!(model = %model.model_id(), error = %err, "stream call failed");
                    SimulatedStream::failed(err.to_string())
                }
            };
            for event in events {
                yield event;
            }
        })
    }
}
