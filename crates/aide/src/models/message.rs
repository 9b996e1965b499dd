use super::content::{FileContent, FileData, TextContent, ToolResultOutput};
use super::role::Role;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolCallPart {
    pub tool_call_id: String,
    pub tool_name: String,
    /// Tool arguments as a JSON string
    pub input: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolResultPart {
    pub tool_call_id: String,
    pub tool_name: String,
    pub output: ToolResultOutput,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
/// Content passed inside a message, which can be both simple content and tool content
pub enum MessageContent {
    Text(TextContent),
    File(FileContent),
    ToolCall(ToolCallPart),
    ToolResult(ToolResultPart),
}

impl MessageContent {
    pub fn text<S: Into<String>>(text: S) -> Self {
        MessageContent::Text(TextContent { text: text.into() })
    }

    pub fn file<S: Into<String>>(media_type: S, data: FileData) -> Self {
        MessageContent::File(FileContent {
            media_type: media_type.into(),
            data,
        })
    }

    pub fn tool_call<I, N, A>(tool_call_id: I, tool_name: N, input: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        MessageContent::ToolCall(ToolCallPart {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            input: input.into(),
        })
    }

    pub fn tool_result<I, N>(tool_call_id: I, tool_name: N, output: ToolResultOutput) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        MessageContent::ToolResult(ToolResultPart {
            tool_call_id: tool_call_id.into(),
            tool_name: tool_name.into(),
            output,
        })
    }

    /// Get the text content if this is a TextContent variant
    pub fn as_text(&self) -> Option<&str> {
        match self {
            MessageContent::Text(text) => Some(&text.text),
            _ => None,
        }
    }

    pub fn as_tool_call(&self) -> Option<&ToolCallPart> {
        if let MessageContent::ToolCall(ref call) = self {
            Some(call)
        } else {
            None
        }
    }

    pub fn as_tool_result(&self) -> Option<&ToolResultPart> {
        if let MessageContent::ToolResult(ref result) = self {
            Some(result)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
/// A message in the unified prompt
pub struct Message {
    pub role: Role,
    pub content: Vec<MessageContent>,
}

impl Message {
    fn new(role: Role) -> Self {
        Message {
            role,
            content: Vec::new(),
        }
    }

    /// Create a system message holding the given instructions
    pub fn system<S: Into<String>>(text: S) -> Self {
        Self::new(Role::System).with_text(text)
    }

    pub fn user() -> Self {
        Self::new(Role::User)
    }

    pub fn assistant() -> Self {
        Self::new(Role::Assistant)
    }

    /// Create an empty tool message, to be filled with tool results
    pub fn tool() -> Self {
        Self::new(Role::Tool)
    }

    /// Add any MessageContent to the message
    pub fn with_content(mut self, content: MessageContent) -> Self {
        self.content.push(content);
        self
    }

    pub fn with_text<S: Into<String>>(self, text: S) -> Self {
        self.with_content(MessageContent::text(text))
    }

    /// Add base64 encoded image content to the message
    pub fn with_image<S: Into<String>, T: Into<String>>(self, data: S, media_type: T) -> Self {
        self.with_content(MessageContent::file(
            media_type,
            FileData::Base64(data.into()),
        ))
    }

    pub fn with_file<S: Into<String>>(self, media_type: S, data: FileData) -> Self {
        self.with_content(MessageContent::file(media_type, data))
    }

    pub fn with_tool_call<I, N, A>(self, tool_call_id: I, tool_name: N, input: A) -> Self
    where
        I: Into<String>,
        N: Into<String>,
        A: Into<String>,
    {
        self.with_content(MessageContent::tool_call(tool_call_id, tool_name, input))
    }

    pub fn with_tool_result<I, N>(
        self,
        tool_call_id: I,
        tool_name: N,
        output: ToolResultOutput,
    ) -> Self
    where
        I: Into<String>,
        N: Into<String>,
    {
        self.with_content(MessageContent::tool_result(tool_call_id, tool_name, output))
    }

    /// All text parts joined without separators
    pub fn text(&self) -> String {
        self.content
            .iter()
            .filter_map(MessageContent::as_text)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builders_set_role() {
        assert_eq!(Message::system("be brief").role, Role::System);
        assert_eq!(Message::user().role, Role::User);
        assert_eq!(Message::assistant().role, Role::Assistant);
        assert_eq!(Message::tool().role, Role::Tool);
    }

    #[test]
    fn test_text_joins_parts() {
        let message = Message::assistant()
            .with_text("Creating ")
            .with_tool_call("call_1", "create_issue", "{}")
            .with_text("the ticket");
        assert_eq!(message.text(), "Creating the ticket");
        assert_eq!(message.content.len(), 3);
        assert!(message.content[1].as_tool_call().is_some());
    }

    #[test]
    fn test_message_serialization() {
        let message = Message::tool().with_tool_result(
            "call_1",
            "list_projects",
            ToolResultOutput::Json(json!(["web", "api"])),
        );
        let value = serde_json::to_value(&message).unwrap();
        assert_eq!(
            value,
            json!({
                "role": "tool",
                "content": [{
                    "type": "tool-result",
                    "toolCallId": "call_1",
                    "toolName": "list_projects",
                    "output": {"type": "json", "value": ["web", "api"]}
                }]
            })
        );
    }
}
