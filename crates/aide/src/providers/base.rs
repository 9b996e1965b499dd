use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::pin::Pin;
use strum_macros::{Display, EnumString};
use tokio_util::sync::CancellationToken;

use super::registry::BackendFamily;
use super::stream::StreamEvent;
use crate::errors::AideResult;
use crate::models::content::ContentBlock;
use crate::models::message::Message;
use crate::models::tool::{Tool, ToolChoice};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputTokens {
    pub total: u64,
    pub no_cache: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_read: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_write: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputTokens {
    pub total: u64,
    pub text: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reasoning: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Usage {
    pub input_tokens: InputTokens,
    pub output_tokens: OutputTokens,
}

impl Usage {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens.total + self.output_tokens.total
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum UnifiedFinishReason {
    Stop,
    Length,
    ToolCalls,
    ContentFilter,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinishReason {
    pub unified: UnifiedFinishReason,
    /// The backend's own termination code, when it sent one
    pub raw: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseMetadata {
    /// Backend-native model id
    pub model_id: Option<String>,
    /// Backend-native request/trace id
    pub id: Option<String>,
}

/// A fully materialized response from the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UnifiedResult {
    pub content: Vec<ContentBlock>,
    pub finish_reason: FinishReason,
    pub usage: Usage,
    pub response: ResponseMetadata,
}

impl UnifiedResult {
    /// All text blocks joined in order
    pub fn text(&self) -> String {
        self.content.iter().filter_map(ContentBlock::as_text).collect()
    }

    pub fn tool_calls(&self) -> impl Iterator<Item = &ContentBlock> {
        self.content
            .iter()
            .filter(|block| matches!(block, ContentBlock::ToolCall { .. }))
    }
}

/// Non-fatal problems found while building a request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum CallWarning {
    UnsupportedSetting {
        setting: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    UnsupportedTool {
        tool_name: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        details: Option<String>,
    },
    Other {
        message: String,
    },
}

impl CallWarning {
    pub fn unsupported_setting<S: Into<String>>(setting: S, details: Option<String>) -> Self {
        CallWarning::UnsupportedSetting {
            setting: setting.into(),
            details,
        }
    }
}

/// Sampling parameters shared by both backends
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CallSettings {
    pub max_output_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub top_k: Option<u32>,
    pub frequency_penalty: Option<f32>,
    pub presence_penalty: Option<f32>,
    #[serde(default)]
    pub stop_sequences: Vec<String>,
    pub seed: Option<u64>,
}

/// Everything a single generate/stream call needs
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    pub prompt: Vec<Message>,
    pub tools: Vec<Tool>,
    pub tool_choice: Option<ToolChoice>,
    pub settings: CallSettings,
    /// Per-request header overrides, applied after the provider defaults
    pub headers: HashMap<String, String>,
    pub cancel: Option<CancellationToken>,
}

impl CallOptions {
    pub fn new(prompt: Vec<Message>) -> Self {
        Self {
            prompt,
            ..Default::default()
        }
    }

    pub fn tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = tools;
        self
    }

    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    pub fn settings(mut self, settings: CallSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn header<K: Into<String>, V: Into<String>>(mut self, key: K, value: V) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    pub fn cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }
}

/// The outcome of a non-streaming call, with the raw bodies kept for observability
#[derive(Debug, Clone)]
pub struct GenerateResult {
    pub result: UnifiedResult,
    pub warnings: Vec<CallWarning>,
    pub request_body: Value,
    pub response_body: Value,
}

pub type EventStream = Pin<Box<dyn Stream<Item = StreamEvent> + Send>>;

/// Uniform generate/stream contract over every backend family
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// The logical model id this instance was built for
    fn model_id(&self) -> &str;

    fn backend_family(&self) -> BackendFamily;

    /// Run one call and return the complete result
    async fn generate(&self, options: CallOptions) -> AideResult<GenerateResult>;

    /// Run one call and replay the result as incremental events.
    /// Failures arrive in-band as an `Error` event; this never fails itself.
    fn stream(&self, options: CallOptions) -> EventStream;
}
