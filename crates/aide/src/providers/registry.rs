use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use strum_macros::{Display, EnumIter};

use crate::errors::{AideError, AideResult};

/// The wire protocol a model speaks behind the gateway
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumIter)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum BackendFamily {
    Anthropic,
    OpenAi,
}

impl BackendFamily {
    /// Key of the backend sub-object in gateway requests and responses
    pub fn envelope_key(&self) -> &'static str {
        match self {
            BackendFamily::Anthropic => "anthropic",
            BackendFamily::OpenAi => "openai",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub backend_family: BackendFamily,
    pub backend_model_id: String,
    pub display_name: String,
    pub max_tokens: u32,
    pub supports_tools: bool,
    pub supports_vision: bool,
}

impl ModelInfo {
    pub fn new<B, D>(
        backend_family: BackendFamily,
        backend_model_id: B,
        display_name: D,
        max_tokens: u32,
    ) -> Self
    where
        B: Into<String>,
        D: Into<String>,
    {
        Self {
            backend_family,
            backend_model_id: backend_model_id.into(),
            display_name: display_name.into(),
            max_tokens,
            supports_tools: true,
            supports_vision: true,
        }
    }

    pub fn without_tools(mut self) -> Self {
        self.supports_tools = false;
        self
    }

    pub fn without_vision(mut self) -> Self {
        self.supports_vision = false;
        self
    }
}

lazy_static! {
    static ref BUILTIN_MODELS: ModelRegistry = ModelRegistry::new(vec![
        (
            "claude-sonnet-4",
            ModelInfo::new(
                BackendFamily::Anthropic,
                "claude-sonnet-4-20250514",
                "Claude Sonnet 4",
                64_000,
            ),
        ),
        (
            "claude-3-7-sonnet",
            ModelInfo::new(
                BackendFamily::Anthropic,
                "claude-3-7-sonnet-20250219",
                "Claude 3.7 Sonnet",
                64_000,
            ),
        ),
        (
            "claude-3-5-haiku",
            ModelInfo::new(
                BackendFamily::Anthropic,
                "claude-3-5-haiku-20241022",
                "Claude 3.5 Haiku",
                8_192,
            )
            .without_vision(),
        ),
        (
            "gpt-4o",
            ModelInfo::new(BackendFamily::OpenAi, "gpt-4o-2024-11-20", "GPT-4o", 16_384),
        ),
        (
            "gpt-4o-mini",
            ModelInfo::new(
                BackendFamily::OpenAi,
                "gpt-4o-mini-2024-07-18",
                "GPT-4o mini",
                16_384,
            ),
        ),
        (
            "gpt-4.1",
            ModelInfo::new(BackendFamily::OpenAi, "gpt-4.1-2025-04-14", "GPT-4.1", 32_768),
        ),
        (
            "o3-mini",
            ModelInfo::new(BackendFamily::OpenAi, "o3-mini-2025-01-31", "o3-mini", 100_000)
                .without_vision(),
        ),
    ]);
}

/// Static mapping from logical model ids to backend metadata
#[derive(Debug, Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<String, ModelInfo>,
}

impl ModelRegistry {
    pub fn new<S: Into<String>>(models: Vec<(S, ModelInfo)>) -> Self {
        Self {
            models: models
                .into_iter()
                .map(|(id, info)| (id.into(), info))
                .collect(),
        }
    }

    /// The models known to the gateway deployment this crate ships for
    pub fn builtin() -> Self {
        BUILTIN_MODELS.clone()
    }

    pub fn lookup(&self, model_id: &str) -> AideResult<&ModelInfo> {
        self.models
            .get(model_id)
            .ok_or_else(|| AideError::UnknownModel {
                model_id: model_id.to_string(),
                available: self.ids(),
            })
    }

    /// Logical ids in sorted order
    pub fn ids(&self) -> Vec<String> {
        self.models.keys().cloned().collect()
    }

    pub fn list(&self) -> Vec<(String, ModelInfo)> {
        self.models
            .iter()
            .map(|(id, info)| (id.clone(), info.clone()))
            .collect()
    }
}
