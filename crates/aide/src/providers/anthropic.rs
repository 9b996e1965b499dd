use serde_json::{json, Value};

use super::base::{
    CallSettings, CallWarning, FinishReason, InputTokens, OutputTokens, ResponseMetadata,
    UnifiedFinishReason, UnifiedResult, Usage,
};
use super::registry::ModelInfo;
use super::utils::{accept_file, convert_image, insert_some, token_count, ImageFormat};
use crate::errors::{AideError, AideResult};
use crate::models::content::ContentBlock;
use crate::models::message::{Message, MessageContent};
use crate::models::role::Role;
use crate::models::tool::{Tool, ToolChoice};

/// Build the `anthropic` body for the gateway
pub fn create_request(
    prompt: &[Message],
    model: &ModelInfo,
    settings: &CallSettings,
    tools: &[Tool],
    tool_choice: Option<&ToolChoice>,
    warnings: &mut Vec<CallWarning>,
) -> AideResult<Value> {
    let (system, messages) = messages_to_anthropic_spec(prompt, model, warnings)?;

    let mut payload = json!({
        "model": model.backend_model_id,
        "max_tokens": settings.max_output_tokens.unwrap_or(model.max_tokens),
        "messages": messages,
    });

    insert_some(&mut payload, "system", system);
    insert_some(&mut payload, "temperature", settings.temperature);
    insert_some(&mut payload, "top_p", settings.top_p);
    insert_some(&mut payload, "top_k", settings.top_k);
    if !settings.stop_sequences.is_empty() {
        payload["stop_sequences"] = json!(settings.stop_sequences);
    }

    if settings.frequency_penalty.is_some() {
        warnings.push(CallWarning::unsupported_setting("frequencyPenalty", None));
    }
    if settings.presence_penalty.is_some() {
        warnings.push(CallWarning::unsupported_setting("presencePenalty", None));
    }
    if settings.seed.is_some() {
        warnings.push(CallWarning::unsupported_setting("seed", None));
    }

    if !tools.is_empty() {
        payload["tools"] = json!(tools_to_anthropic_spec(tools));
        insert_some(
            &mut payload,
            "tool_choice",
            tool_choice.and_then(tool_choice_to_anthropic_spec),
        );
    }

    Ok(payload)
}

/// Convert unified messages into Anthropic's `system` string and message list.
///
/// Anthropic has a single top-level system prompt, so only the last system
/// message is kept. Tool messages become a synthetic `user` message holding
/// one `tool_result` block per result.
pub fn messages_to_anthropic_spec(
    messages: &[Message],
    model: &ModelInfo,
    warnings: &mut Vec<CallWarning>,
) -> AideResult<(Option<String>, Vec<Value>)> {
    let mut system = None;
    let mut anthropic_messages = Vec::new();

    for message in messages {
        let mut blocks = Vec::new();

        match message.role {
            Role::System => {
                system = Some(message.text());
                continue;
            }
            Role::User => {
                for content in &message.content {
                    match content {
                        MessageContent::Text(text) => {
                            blocks.push(json!({"type": "text", "text": text.text}));
                        }
                        MessageContent::File(file) => {
                            if accept_file(file, model, warnings) {
                                blocks.push(convert_image(file, &ImageFormat::Anthropic));
                            }
                        }
                        other => warnings.push(unexpected_part("user", other)),
                    }
                }
            }
            Role::Assistant => {
                for content in &message.content {
                    match content {
                        MessageContent::Text(text) => {
                            if !text.text.is_empty() {
                                blocks.push(json!({"type": "text", "text": text.text}));
                            }
                        }
                        MessageContent::ToolCall(call) => {
                            let input: Value = serde_json::from_str(&call.input).map_err(|e| {
                                AideError::InvalidPrompt(format!(
                                    "tool call {} has invalid JSON input: {}",
                                    call.tool_call_id, e
                                ))
                            })?;
                            blocks.push(json!({
                                "type": "tool_use",
                                "id": call.tool_call_id,
                                "name": call.tool_name,
                                "input": input,
                            }));
                        }
                        other => warnings.push(unexpected_part("assistant", other)),
                    }
                }
            }
            Role::Tool => {
                for content in &message.content {
                    match content {
                        MessageContent::ToolResult(result) => {
                            blocks.push(json!({
                                "type": "tool_result",
                                "tool_use_id": result.tool_call_id,
                                "content": result.output.to_model_string(),
                                "is_error": result.output.is_error(),
                            }));
                        }
                        other => warnings.push(unexpected_part("tool", other)),
                    }
                }
            }
        }

        if blocks.is_empty() {
            continue;
        }

        let role = match message.role {
            Role::Assistant => "assistant",
            _ => "user",
        };
        anthropic_messages.push(json!({
            "role": role,
            "content": blocks,
        }));
    }

    Ok((system, anthropic_messages))
}

fn unexpected_part(role: &str, content: &MessageContent) -> CallWarning {
    let kind = match content {
        MessageContent::Text(_) => "text",
        MessageContent::File(_) => "file",
        MessageContent::ToolCall(_) => "tool-call",
        MessageContent::ToolResult(_) => "tool-result",
    };
    CallWarning::Other {
        message: format!("{} parts are not supported in {} messages", kind, role),
    }
}

pub fn tools_to_anthropic_spec(tools: &[Tool]) -> Vec<Value> {
    tools
        .iter()
        .map(|tool| {
            let mut spec = json!({
                "name": tool.name,
                "input_schema": tool.input_schema,
            });
            insert_some(&mut spec, "description", tool.description.as_ref());
            spec
        })
        .collect()
}

/// Anthropic has no explicit "none", so that choice omits the field
pub fn tool_choice_to_anthropic_spec(choice: &ToolChoice) -> Option<Value> {
    match choice {
        ToolChoice::Auto => Some(json!({"type": "auto"})),
        ToolChoice::Required => Some(json!({"type": "any"})),
        ToolChoice::Tool { tool_name } => Some(json!({"type": "tool", "name": tool_name})),
        ToolChoice::None => None,
    }
}

pub fn map_finish_reason(stop_reason: Option<&str>) -> UnifiedFinishReason {
    match stop_reason {
        Some("end_turn") | Some("stop_sequence") => UnifiedFinishReason::Stop,
        Some("max_tokens") => UnifiedFinishReason::Length,
        Some("tool_use") => UnifiedFinishReason::ToolCalls,
        _ => UnifiedFinishReason::Other,
    }
}

fn get_usage(data: &Value) -> Usage {
    let total = token_count(data, "/usage/input_tokens").unwrap_or(0);
    let cache_read = token_count(data, "/usage/cache_read_input_tokens");
    let cache_write = token_count(data, "/usage/cache_creation_input_tokens");
    let output = token_count(data, "/usage/output_tokens").unwrap_or(0);

    Usage {
        input_tokens: InputTokens {
            total,
            no_cache: total.saturating_sub(cache_read.unwrap_or(0)),
            cache_read,
            cache_write,
        },
        output_tokens: OutputTokens {
            total: output,
            text: output,
            reasoning: None,
        },
    }
}

/// Convert the `anthropic` object of a gateway response into a unified result
pub fn response_to_result(
    response: &Value,
    request_id: Option<&str>,
) -> AideResult<UnifiedResult> {
    let blocks = response
        .get("content")
        .and_then(|c| c.as_array())
        .ok_or_else(|| {
            AideError::MalformedResponse("anthropic response has no content".to_string())
        })?;

    let mut content = Vec::new();
    for block in blocks {
        match block.get("type").and_then(|t| t.as_str()) {
            Some("text") => {
                let text = block.get("text").and_then(|t| t.as_str()).unwrap_or_default();
                content.push(ContentBlock::text(text));
            }
            Some("tool_use") => {
                let id = block.get("id").and_then(|v| v.as_str()).unwrap_or_default();
                let name = block.get("name").and_then(|v| v.as_str()).unwrap_or_default();
                let input = block.get("input").cloned().unwrap_or_else(|| json!({}));
                content.push(ContentBlock::tool_call(id, name, serde_json::to_string(&input)?));
            }
            _ => {}
        }
    }

    let stop_reason = response.get("stop_reason").and_then(|v| v.as_str());

    Ok(UnifiedResult {
        content,
        finish_reason: FinishReason {
            unified: map_finish_reason(stop_reason),
            raw: stop_reason.map(String::from),
        },
        usage: get_usage(response),
        response: ResponseMetadata {
            model_id: response.get("model").and_then(|v| v.as_str()).map(String::from),
            id: response
                .get("id")
                .and_then(|v| v.as_str())
                .or(request_id)
                .map(String::from),
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::content::ToolResultOutput;
    use crate::providers::registry::BackendFamily;

    fn model() -> ModelInfo {
        ModelInfo::new(BackendFamily::Anthropic, "claude-test", "Claude Test", 4096)
    }

    #[test]
    fn test_last_system_message_wins() -> anyhow::Result<()> {
        let messages = vec![
            Message::system("You file tickets."),
            Message::user().with_text("Hi"),
            Message::system("You file GitLab tickets."),
        ];
        let mut warnings = Vec::new();
        let (system, spec) = messages_to_anthropic_spec(&messages, &model(), &mut warnings)?;

        assert_eq!(system.as_deref(), Some("You file GitLab tickets."));
        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(spec[0]["content"], json!([{"type": "text", "text": "Hi"}]));
        assert!(warnings.is_empty());
        Ok(())
    }

    #[test]
    fn test_user_image_block() -> anyhow::Result<()> {
        let messages = vec![Message::user()
            .with_text("What is in this screenshot?")
            .with_image("iVBORw0KGgo=", "image/png")];
        let mut warnings = Vec::new();
        let (_, spec) = messages_to_anthropic_spec(&messages, &model(), &mut warnings)?;

        assert_eq!(
            spec[0]["content"][1],
            json!({
                "type": "image",
                "source": {"type": "base64", "media_type": "image/png", "data": "iVBORw0KGgo="}
            })
        );
        Ok(())
    }

    #[test]
    fn test_tool_call_input_is_parsed() -> anyhow::Result<()> {
        let messages = vec![Message::assistant()
            .with_text("Looking that up.")
            .with_tool_call("toolu_1", "create_issue", r#"{"title":"Bug","labels":["p1"]}"#)];
        let mut warnings = Vec::new();
        let (_, spec) = messages_to_anthropic_spec(&messages, &model(), &mut warnings)?;

        assert_eq!(spec[0]["role"], "assistant");
        assert_eq!(
            spec[0]["content"][1],
            json!({
                "type": "tool_use",
                "id": "toolu_1",
                "name": "create_issue",
                "input": {"title": "Bug", "labels": ["p1"]}
            })
        );
        Ok(())
    }

    #[test]
    fn test_invalid_tool_call_input_is_rejected() {
        let messages =
            vec![Message::assistant().with_tool_call("toolu_1", "create_issue", "{oops")];
        let mut warnings = Vec::new();
        let err = messages_to_anthropic_spec(&messages, &model(), &mut warnings).unwrap_err();
        assert!(matches!(err, AideError::InvalidPrompt(_)));
    }

    #[test]
    fn test_tool_results_packed_into_one_user_message() -> anyhow::Result<()> {
        let messages = vec![Message::tool()
            .with_tool_result(
                "toolu_1",
                "list_projects",
                ToolResultOutput::Json(json!(["web", "api"])),
            )
            .with_tool_result(
                "toolu_2",
                "get_project",
                ToolResultOutput::ErrorText("not found".to_string()),
            )];
        let mut warnings = Vec::new();
        let (_, spec) = messages_to_anthropic_spec(&messages, &model(), &mut warnings)?;

        assert_eq!(spec.len(), 1);
        assert_eq!(spec[0]["role"], "user");
        assert_eq!(
            spec[0]["content"],
            json!([
                {
                    "type": "tool_result",
                    "tool_use_id": "toolu_1",
                    "content": "[\"web\",\"api\"]",
                    "is_error": false
                },
                {
                    "type": "tool_result",
                    "tool_use_id": "toolu_2",
                    "content": "Error: not found",
                    "is_error": true
                }
            ])
        );
        Ok(())
    }

    #[test]
    fn test_tool_choice_mapping() {
        assert_eq!(
            tool_choice_to_anthropic_spec(&ToolChoice::Auto),
            Some(json!({"type": "auto"}))
        );
        assert_eq!(
            tool_choice_to_anthropic_spec(&ToolChoice::Required),
            Some(json!({"type": "any"}))
        );
        assert_eq!(
            tool_choice_to_anthropic_spec(&ToolChoice::tool("create_issue")),
            Some(json!({"type": "tool", "name": "create_issue"}))
        );
        assert_eq!(tool_choice_to_anthropic_spec(&ToolChoice::None), None);
    }

    #[test]
    fn test_create_request_drops_unsupported_settings() -> anyhow::Result<()> {
        let settings = CallSettings {
            temperature: Some(0.2),
            frequency_penalty: Some(0.5),
            presence_penalty: Some(0.1),
            ..Default::default()
        };
        let mut warnings = Vec::new();
        let payload = create_request(
            &[Message::user().with_text("Hi")],
            &model(),
            &settings,
            &[],
            None,
            &mut warnings,
        )?;

        assert_eq!(payload["model"], "claude-test");
        assert_eq!(payload["max_tokens"], 4096);
        assert!(payload.get("frequency_penalty").is_none());
        assert!(payload.get("presence_penalty").is_none());
        assert!(payload.get("system").is_none());
        assert_eq!(
            warnings,
            vec![
                CallWarning::unsupported_setting("frequencyPenalty", None),
                CallWarning::unsupported_setting("presencePenalty", None),
            ]
        );
        Ok(())
    }

    #[test]
    fn test_create_request_with_tools() -> anyhow::Result<()> {
        let tools = vec![Tool::new(
            "list_projects",
            "List GitLab projects",
            json!({"type": "object", "properties": {}}),
        )];
        let mut warnings = Vec::new();
        let settings = CallSettings {
            max_output_tokens: Some(512),
            stop_sequences: vec!["END".to_string()],
            ..Default::default()
        };
        let payload = create_request(
            &[Message::user().with_text("List my projects")],
            &model(),
            &settings,
            &tools,
            Some(&ToolChoice::None),
            &mut warnings,
        )?;

        assert_eq!(payload["max_tokens"], 512);
        assert_eq!(payload["stop_sequences"], json!(["END"]));
        assert_eq!(
            payload["tools"],
            json!([{
                "name": "list_projects",
                "description": "List GitLab projects",
                "input_schema": {"type": "object", "properties": {}}
            }])
        );
        assert!(payload.get("tool_choice").is_none());
        Ok(())
    }

    #[test]
    fn test_finish_reason_table() {
        assert_eq!(map_finish_reason(Some("end_turn")), UnifiedFinishReason::Stop);
        assert_eq!(map_finish_reason(Some("stop_sequence")), UnifiedFinishReason::Stop);
        assert_eq!(map_finish_reason(Some("max_tokens")), UnifiedFinishReason::Length);
        assert_eq!(map_finish_reason(Some("tool_use")), UnifiedFinishReason::ToolCalls);
        assert_eq!(map_finish_reason(Some("refusal")), UnifiedFinishReason::Other);
        assert_eq!(map_finish_reason(None), UnifiedFinishReason::Other);
    }

    #[test]
    fn test_response_to_result() -> anyhow::Result<()> {
        let response = json!({
            "id": "msg_123",
            "type": "message",
            "role": "assistant",
            "model": "claude-test-20250101",
            "content": [
                {"type": "thinking", "thinking": "..."},
                {"type": "text", "text": "Creating it now."},
                {
                    "type": "tool_use",
                    "id": "toolu_9",
                    "name": "create_issue",
                    "input": {"title": "Bug"}
                }
            ],
            "stop_reason": "tool_use",
            "usage": {
                "input_tokens": 100,
                "cache_read_input_tokens": 40,
                "cache_creation_input_tokens": 7,
                "output_tokens": 25
            }
        });

        let result = response_to_result(&response, Some("req-1"))?;

        assert_eq!(
            result.content,
            vec![
                ContentBlock::text("Creating it now."),
                ContentBlock::tool_call("toolu_9", "create_issue", r#"{"title":"Bug"}"#),
            ]
        );
        assert_eq!(result.finish_reason.unified, UnifiedFinishReason::ToolCalls);
        assert_eq!(result.finish_reason.raw.as_deref(), Some("tool_use"));
        assert_eq!(result.usage.input_tokens.total, 100);
        assert_eq!(result.usage.input_tokens.no_cache, 60);
        assert_eq!(result.usage.input_tokens.cache_read, Some(40));
        assert_eq!(result.usage.input_tokens.cache_write, Some(7));
        assert_eq!(result.usage.output_tokens.total, 25);
        assert_eq!(result.usage.output_tokens.text, 25);
        assert_eq!(result.usage.output_tokens.reasoning, None);
        assert_eq!(result.response.id.as_deref(), Some("msg_123"));
        assert_eq!(result.response.model_id.as_deref(), Some("claude-test-20250101"));
        Ok(())
    }

    #[test]
    fn test_response_without_cache_fields() -> anyhow::Result<()> {
        let response = json!({
            "content": [{"type": "text", "text": "Hello there"}],
            "stop_reason": "end_turn",
            "usage": {"input_tokens": 12, "output_tokens": 3}
        });

        let result = response_to_result(&response, Some("req-7"))?;
        assert_eq!(result.usage.input_tokens.no_cache, 12);
        assert_eq!(result.usage.input_tokens.cache_read, None);
        assert_eq!(result.response.id.as_deref(), Some("req-7"));
        Ok(())
    }

    #[test]
    fn test_tool_input_survives_round_trip() -> anyhow::Result<()> {
        let input = json!({"project": "web", "labels": ["bug", "p1"], "weight": 3, "draft": false});
        let response = json!({
            "content": [{"type": "tool_use", "id": "t", "name": "create_issue", "input": input}],
            "stop_reason": "tool_use"
        });
        let result = response_to_result(&response, None)?;

        if let ContentBlock::ToolCall { input: encoded, .. } = &result.content[0] {
            let decoded: Value = serde_json::from_str(encoded)?;
            assert_eq!(decoded, input);
        } else {
            panic!("Expected ToolCall content");
        }
        Ok(())
    }
}
