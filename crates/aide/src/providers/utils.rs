use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::anthropic;
use super::base::{CallSettings, CallWarning, UnifiedResult};
use super::configs::ContentSafety;
use super::openai;
use super::registry::{BackendFamily, ModelInfo};
use crate::errors::{AideError, AideResult};
use crate::models::content::FileContent;
use crate::models::message::Message;
use crate::models::tool::{Tool, ToolChoice};

#[derive(Debug, Copy, Clone, Serialize, Deserialize)]
pub enum ImageFormat {
    OpenAi,
    Anthropic,
}

/// A backend request body plus the warnings collected while building it
#[derive(Debug, Clone)]
pub struct ConvertedRequest {
    pub body: Value,
    pub warnings: Vec<CallWarning>,
}

/// Convert a unified prompt into the body expected by the model's backend family
pub fn convert_request(
    prompt: &[Message],
    model: &ModelInfo,
    settings: &CallSettings,
    tools: &[Tool],
    tool_choice: Option<&ToolChoice>,
) -> AideResult<ConvertedRequest> {
    let mut warnings = Vec::new();
    let (tools, tool_choice) = usable_tools(model, tools, tool_choice, &mut warnings);

    let body = match model.backend_family {
        BackendFamily::Anthropic => anthropic::create_request(
            prompt,
            model,
            settings,
            tools,
            tool_choice,
            &mut warnings,
        )?,
        BackendFamily::OpenAi => {
            openai::create_request(prompt, model, settings, tools, tool_choice, &mut warnings)?
        }
    };

    for warning in &warnings {
        tracing::warn!(?warning, model = %model.backend_model_id, "call warning");
    }

    Ok(ConvertedRequest { body, warnings })
}

/// Translate a gateway success body back into a unified result.
/// The sub-object for the model's family must be present.
pub fn parse_response(response: &Value, model: &ModelInfo) -> AideResult<UnifiedResult> {
    let key = model.backend_family.envelope_key();
    let backend = response
        .get(key)
        .filter(|v| v.is_object())
        .ok_or_else(|| {
            AideError::MalformedResponse(format!(
                "expected an `{}` object in the gateway response",
                key
            ))
        })?;
    let request_id = response.get("requestId").and_then(|v| v.as_str());

    match model.backend_family {
        BackendFamily::Anthropic => anthropic::response_to_result(backend, request_id),
        BackendFamily::OpenAi => openai::response_to_result(backend, request_id),
    }
}

/// Drop tools (and the tool choice) for models that cannot call them
fn usable_tools<'a>(
    model: &ModelInfo,
    tools: &'a [Tool],
    tool_choice: Option<&'a ToolChoice>,
    warnings: &mut Vec<CallWarning>,
) -> (&'a [Tool], Option<&'a ToolChoice>) {
    if model.supports_tools || tools.is_empty() {
        return (tools, tool_choice);
    }
    for tool in tools {
        warnings.push(CallWarning::UnsupportedTool {
            tool_name: tool.name.clone(),
            details: Some(format!(
                "{} does not support tool calling",
                model.display_name
            )),
        });
    }
    (&[], None)
}

/// Whether a file part can be sent to the model, recording a warning if not
pub fn accept_file(
    file: &FileContent,
    model: &ModelInfo,
    warnings: &mut Vec<CallWarning>,
) -> bool {
    if !file.is_image() {
        warnings.push(CallWarning::Other {
            message: format!("file parts of type {} are not supported", file.media_type),
        });
        return false;
    }
    if !model.supports_vision {
        warnings.push(CallWarning::unsupported_setting(
            "image",
            Some(format!("{} does not accept image input", model.display_name)),
        ));
        return false;
    }
    true
}

/// Convert an image content into an image json based on format
pub fn convert_image(image: &FileContent, image_format: &ImageFormat) -> Value {
    let data = image.data.to_base64();
    match image_format {
        ImageFormat::OpenAi => json!({
            "type": "image_url",
            "image_url": {
                "url": format!("data:{};base64,{}", image.media_type, data)
            }
        }),
        ImageFormat::Anthropic => json!({
            "type": "image",
            "source": {
                "type": "base64",
                "media_type": image.media_type,
                "data": data,
            }
        }),
    }
}

/// Insert `value` under `key` when it is present
pub fn insert_some<T: Serialize>(payload: &mut Value, key: &str, value: Option<T>) {
    if let Some(value) = value {
        payload[key] = json!(value);
    }
}

/// Wrap a backend body in the gateway envelope carrying content-safety flags
/// and logging metadata. Every request goes through here.
pub fn wrap_envelope(
    family: BackendFamily,
    body: Value,
    safety: &ContentSafety,
    solma_id: &str,
) -> Value {
    let key = family.envelope_key();
    let mut backend = serde_json::Map::new();
    backend.insert(key.to_string(), body);
    json!({
        "policy": {
            "scrubInput": safety.scrub_input,
            "applyGuardrail": safety.apply_guardrail,
            "failOnScrub": safety.fail_on_scrub,
        },
        "routing": {
            "guardrailsEnabled": safety.apply_guardrail,
            "scrubInput": safety.scrub_input,
            "scrubbingTimeoutSeconds": safety.scrubbing_timeout_seconds,
            "pathToPrompt": format!("backend.{}.messages", key),
            "logMetadata": {
                "solmaId": solma_id,
            },
        },
        "backend": backend,
    })
}

/// Build the message for a failed gateway call.
/// Prefers the structured `{requestId, error}` body, then raw text, then the status reason.
pub fn gateway_error_message(status: reqwest::StatusCode, body: &str) -> String {
    if let Ok(parsed) = serde_json::from_str::<Value>(body) {
        if let Some(error) = parsed.get("error") {
            let message = match error {
                Value::String(s) => s.clone(),
                other => other
                    .get("message")
                    .and_then(|m| m.as_str())
                    .map(String::from)
                    .unwrap_or_else(|| other.to_string()),
            };
            return match parsed.get("requestId").and_then(|v| v.as_str()) {
                Some(request_id) => format!("{} (request {})", message, request_id),
                None => message,
            };
        }
    }

    let reason = status.canonical_reason().unwrap_or("Unknown status");
    if body.trim().is_empty() {
        reason.to_string()
    } else {
        format!("{}: {}", reason, body.trim())
    }
}

/// Read a non-negative token count at a JSON pointer
pub fn token_count(value: &Value, pointer: &str) -> Option<u64> {
    value.pointer(pointer).and_then(|v| v.as_u64())
}
