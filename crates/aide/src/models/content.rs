use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextContent {
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "camelCase")]
/// File payload, either already base64 encoded or raw bytes
pub enum FileData {
    Base64(String),
    Bytes(Vec<u8>),
}

impl FileData {
    pub fn to_base64(&self) -> String {
        match self {
            FileData::Base64(data) => data.clone(),
            FileData::Bytes(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileContent {
    pub media_type: String,
    pub data: FileData,
}

impl FileContent {
    /// Only images are understood by both backends
    pub fn is_image(&self) -> bool {
        self.media_type.starts_with("image/")
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "kebab-case")]
/// The outcome of a tool execution as fed back to the model
pub enum ToolResultOutput {
    Text(String),
    Json(Value),
    ErrorText(String),
    ErrorJson(Value),
}

impl ToolResultOutput {
    pub fn is_error(&self) -> bool {
        matches!(
            self,
            ToolResultOutput::ErrorText(_) | ToolResultOutput::ErrorJson(_)
        )
    }

    /// Flatten the output into the single string both backends accept.
    /// Error variants carry an `Error: ` prefix.
    pub fn to_model_string(&self) -> String {
        match self {
            ToolResultOutput::Text(text) => text.clone(),
            ToolResultOutput::Json(value) => value.to_string(),
            ToolResultOutput::ErrorText(text) => format!("Error: {}", text),
            ToolResultOutput::ErrorJson(value) => format!("Error: {}", value),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
/// Content generated by the model in a unified result
pub enum ContentBlock {
    Text {
        text: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        /// Tool arguments as a JSON string
        input: String,
    },
}

impl ContentBlock {
    pub fn text<S: Into<String>>(text: S) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_call<I, N, A>(tool_call_id: I, tool_name: N, input: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        ContentBlock::ToolCall {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            input: input.into(),
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            ContentBlock::Text { text } => Some(text),
            _ => None,
        }
    }
}
