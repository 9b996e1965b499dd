use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A tool that can be used by a model.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Tool {
    /// The name of the tool
    pub name: String,
    /// A description of what the tool does
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// A JSON schema defining the expected parameters for the tool
    pub input_schema: Value,
}

impl Tool {
    /// Create a new tool with the given name and description
    pub fn new<N, D>(name: N, description: D, input_schema: Value) -> Self
    where
        N: Into<String>,
        D: Into<String>,
    {
        Tool {
            name: name.into(),
            description: Some(description.into()),
            input_schema,
        }
    }

    /// Create a tool that carries no description
    pub fn undocumented<N: Into<String>>(name: N, input_schema: Value) -> Self {
        Tool {
            name: name.into(),
            description: None,
            input_schema,
        }
    }
}

/// How the model should pick among the available tools
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ToolChoice {
    Auto,
    None,
    Required,
    #[serde(rename_all = "camelCase")]
    Tool { tool_name: String },
}

impl ToolChoice {
    pub fn tool<S: Into<String>>(tool_name: S) -> Self {
        ToolChoice::Tool {
            tool_name: tool_name.into(),
        }
    }
}
