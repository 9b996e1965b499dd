use serde_json::{json, Value};
use std::collections::HashSet;

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

/// Build the `openai` body for the gateway
pub fn create_request(
    prompt: &[Message],
    model: &ModelInfo,
    settings: &CallSettings,
    tools: &[Tool],
    tool_choice: Option<&ToolChoice>,
    warnings: &mut Vec<CallWarning>,
) -> AideResult<Value> {
    let messages = messages_to_openai_spec(prompt, model, warnings);

    let mut payload = json!({
        "model": model.backend_model_id,
        "messages": messages,
    });

    insert_some(&mut payload, "max_tokens", settings.max_output_tokens);
    insert_some(&mut payload, "temperature", settings.temperature);
    insert_some(&mut payload, "top_p", settings.top_p);
    insert_some(&mut payload, "frequency_penalty", settings.frequency_penalty);
    insert_some(&mut payload, "presence_penalty", settings.presence_penalty);
    insert_some(&mut payload, "seed", settings.seed);
    if !settings.stop_sequences.is_empty() {
        payload["stop"] = json!(settings.stop_sequences);
    }

    if settings.top_k.is_some() {
        warnings.push(CallWarning::unsupported_setting("topK", None));
    }

    if !tools.is_empty() {
        payload["tools"] = json!(tools_to_openai_spec(tools)?);
        insert_some(&mut payload, "tool_choice", tool_choice.map(tool_choice_to_openai_spec));
    }

    Ok(payload)
}

/// Convert unified messages to OpenAI's chat message specification.
///
/// System messages keep their order. Every tool result becomes its own `tool`
/// message.
pub fn messages_to_openai_spec(
    messages: &[Message],
    model: &ModelInfo,
    warnings: &mut Vec<CallWarning>,
) -> Vec<Value> {
    let mut messages_spec = Vec::new();

    for message in messages {
        match message.role {
            Role::System => {
                messages_spec.push(json!({
                    "role": "system",
                    "content": message.text(),
                }));
            }
            Role::User => {
                let mut parts = Vec::new();
                for content in &message.content {
                    match content {
                        MessageContent::Text(text) => {
                            parts.push(json!({"type": "text", "text": text.text}));
                        }
                        MessageContent::File(file) => {
                            if accept_file(file, model, warnings) {
                                parts.push(convert_image(file, &ImageFormat::OpenAi));
                            }
                        }
                        _ => warnings.push(CallWarning::Other {
                            message: "tool parts are not supported in user messages".to_string(),
                        }),
                    }
                }

                // A lone text part goes out as a bare string
                let content = match parts.as_slice() {
                    [] => continue,
                    [single] if single["type"] == "text" => single["text"].clone(),
                    _ => json!(parts),
                };
                messages_spec.push(json!({"role": "user", "content": content}));
            }
            Role::Assistant => {
                let mut text = String::new();
                let mut tool_calls = Vec::new();
                for content in &message.content {
                    match content {
                        MessageContent::Text(part) => text.push_str(&part.text),
                        MessageContent::ToolCall(call) => {
                            tool_calls.push(json!({
                                "id": call.tool_call_id,
                                "type": "function",
                                "function": {
                                    "name": call.tool_name,
                                    "arguments": call.input,
                                }
                            }));
                        }
                        _ => warnings.push(CallWarning::Other {
                            message:
                                "only text and tool-call parts are supported in assistant messages"
                                    .to_string(),
                        }),
                    }
                }

                let mut converted = json!({"role": "assistant"});
                if tool_calls.is_empty() {
                    converted["content"] = json!(text);
                } else {
                    converted["content"] = if text.is_empty() { Value::Null } else { json!(text) };
                    converted["tool_calls"] = json!(tool_calls);
                }
                messages_spec.push(converted);
            }
            Role::Tool => {
                for content in &message.content {
                    if let MessageContent::ToolResult(result) = content {
                        messages_spec.push(json!({
                            "role": "tool",
                            "tool_call_id": result.tool_call_id,
                            "content": result.output.to_model_string(),
                        }));
                    } else {
                        warnings.push(CallWarning::Other {
                            message: "only tool-result parts are supported in tool messages"
                                .to_string(),
                        });
                    }
                }
            }
        }
    }

    messages_spec
}

/// Convert tools to OpenAI's function tool specification
pub fn tools_to_openai_spec(tools: &[Tool]) -> AideResult<Vec<Value>> {
    let mut tool_names = HashSet::new();
    let mut result = Vec::new();

    for tool in tools {
        if !tool_names.insert(&tool.name) {
            return Err(AideError::InvalidPrompt(format!(
                "Duplicate tool name: {}",
                tool.name
            )));
        }

        let mut function = json!({
            "name": tool.name,
            "parameters": tool.input_schema,
        });
        insert_some(&mut function, "description", tool.description.as_ref());

        result.push(json!({
            "type": "function",
            "function": function,
        }));
    }

    Ok(result)
}

pub fn tool_choice_to_openai_spec(choice: &ToolChoice) -> Value {
    match choice {
        ToolChoice::Auto => json!("auto"),
        ToolChoice::None => json!("none"),
        ToolChoice::Required => json!("required"),
        ToolChoice::Tool { tool_name } => json!({
            "type": "function",
            "function": {"name": tool_name},
        }),
    }
}

pub fn map_finish_reason(finish_reason: Option<&str>) -> UnifiedFinishReason {
    match finish_reason {
        Some("stop") => UnifiedFinishReason::Stop,
        Some("length") => UnifiedFinishReason::Length,
        Some("content_filter") => UnifiedFinishReason::ContentFilter,
        Some("tool_calls") => UnifiedFinishReason::ToolCalls,
        _ => UnifiedFinishReason::Other,
    }
}

fn get_usage(data: &Value) -> Usage {
    let prompt = token_count(data, "/usage/prompt_tokens").unwrap_or(0);
    let cached = token_count(data, "/usage/prompt_tokens_details/cached_tokens");
    let completion = token_count(data, "/usage/completion_tokens").unwrap_or(0);
    let reasoning =
        token_count(data, "/usage/completion_tokens_details/reasoning_tokens").unwrap_or(0);

    Usage {
        input_tokens: InputTokens {
            total: prompt,
            no_cache: prompt.saturating_sub(cached.unwrap_or(0)),
            cache_read: cached,
            cache_write: None,
        },
        output_tokens: OutputTokens {
            total: completion,
            text: completion.saturating_sub(reasoning),
            reasoning: Some(reasoning),
        },
    }
}

/// Convert the `openai` object of a gateway response into a unified result
pub fn response_to_result(
    response: &Value,
    request_id: Option<&str>,
) -> AideResult<UnifiedResult> {
    let choice = response
        .get("choices")
        .and_then(|c| c.get(0))
        .ok_or_else(|| {
            AideError::MalformedResponse("openai response has no choices".to_string())
        })?;
    let message = &choice["message"];
    let mut content = Vec::new();

    if let Some(text) = message.get("content").and_then(|c| c.as_str()) {
        if !text.is_empty() {
            content.push(ContentBlock::text(text));
        }
    }

    if let Some(tool_calls) = message.get("tool_calls").and_then(|t| t.as_array()) {
        for tool_call in tool_calls {
            let id = tool_call["id"].as_str().unwrap_or_default();
            let name = tool_call["function"]["name"].as_str().unwrap_or_default();
            let arguments = match tool_call["function"]["arguments"].as_str() {
                Some(args) if !args.trim().is_empty() => args,
                _ => "{}",
            };
            content.push(ContentBlock::tool_call(id, name, arguments));
        }
    }

    let finish_reason = choice.get("finish_reason").and_then(|v| v.as_str());

    Ok(UnifiedResult {
        content,
        finish_reason: FinishReason {
            unified: map_finish_reason(finish_reason),
            raw: finish_reason.map(String::from),
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
