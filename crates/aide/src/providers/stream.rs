//! Simulated streaming on top of the synchronous gateway.
//!
//! The gateway only returns complete responses. [`SimulatedStream`] replays one
//! [`UnifiedResult`] as the event sequence a streaming backend would have
//! produced: text split into words, each tool call as a single input delta,
//! then metadata and the finish event. It is a plain pull-based iterator, so
//! the consumer's pace is the only pacing.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::collections::VecDeque;
use std::iter::FusedIterator;

use super::base::{CallWarning, FinishReason, ResponseMetadata, UnifiedResult, Usage};
use crate::models::content::ContentBlock;

lazy_static! {
    static ref WORD: Regex = Regex::new(r"(\S*)(\s*)").expect("valid word pattern");
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum StreamEvent {
    StreamStart {
        warnings: Vec<CallWarning>,
    },
    TextStart {
        id: String,
    },
    TextDelta {
        id: String,
        delta: String,
    },
    TextEnd {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolInputStart {
        id: String,
        tool_name: String,
    },
    ToolInputDelta {
        id: String,
        delta: String,
    },
    ToolInputEnd {
        id: String,
    },
    #[serde(rename_all = "camelCase")]
    ToolCall {
        tool_call_id: String,
        tool_name: String,
        input: String,
    },
    #[serde(rename_all = "camelCase")]
    ResponseMetadata {
        model_id: Option<String>,
        id: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Finish {
        usage: Usage,
        finish_reason: FinishReason,
    },
    Error {
        error: String,
    },
}

impl StreamEvent {
    /// The wire name of the event, e.g. `text-delta`
    pub fn kind(&self) -> &'static str {
        match self {
            StreamEvent::StreamStart { .. } => "stream-start",
            StreamEvent::TextStart { .. } => "text-start",
            StreamEvent::TextDelta { .. } => "text-delta",
            StreamEvent::TextEnd { .. } => "text-end",
            StreamEvent::ToolInputStart { .. } => "tool-input-start",
            StreamEvent::ToolInputDelta { .. } => "tool-input-delta",
            StreamEvent::ToolInputEnd { .. } => "tool-input-end",
            StreamEvent::ToolCall { .. } => "tool-call",
            StreamEvent::ResponseMetadata { .. } => "response-metadata",
            StreamEvent::Finish { .. } => "finish",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// Split text into `(word, trailing whitespace)` pairs.
///
/// Leading whitespace comes back as a pair with an empty word. Joining every
/// `word + whitespace` reproduces the input exactly.
pub fn split_words(text: &str) -> Vec<(&str, &str)> {
    WORD.captures_iter(text)
        .filter(|caps| !caps[0].is_empty())
        .map(|caps| {
            let word = caps.get(1).map_or("", |m| m.as_str());
            let space = caps.get(2).map_or("", |m| m.as_str());
            (word, space)
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Start,
    TextStart,
    TextDelta,
    Tools,
    Metadata,
    Finish,
    Failed,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ToolPhase {
    InputStart,
    InputDelta,
    InputEnd,
    Call,
}

#[derive(Debug, Clone)]
struct PendingToolCall {
    id: String,
    name: String,
    input: String,
}

/// Replays a finished result as stream events, one per `next()`
#[derive(Debug)]
pub struct SimulatedStream {
    state: State,
    warnings: Vec<CallWarning>,
    text_id: String,
    deltas: VecDeque<String>,
    has_text: bool,
    tool_calls: VecDeque<PendingToolCall>,
    tool_phase: ToolPhase,
    response: ResponseMetadata,
    usage: Usage,
    finish_reason: Option<FinishReason>,
    error: Option<String>,
}

impl SimulatedStream {
    pub fn new(result: UnifiedResult, warnings: Vec<CallWarning>) -> Self {
        let mut text = String::new();
        let mut tool_calls = VecDeque::new();
        for block in result.content {
            match block {
                ContentBlock::Text { text: part } => text.push_str(&part),
                ContentBlock::ToolCall {
                    tool_call_id,
                    tool_name,
                    input,
                } => tool_calls.push_back(PendingToolCall {
                    id: tool_call_id,
                    name: tool_name,
                    input,
                }),
            }
        }

        let deltas = split_words(&text)
            .into_iter()
            .map(|(word, space)| format!("{}{}", word, space))
            .collect();

        Self {
            state: State::Start,
            warnings,
            text_id: nanoid::nanoid!(),
            deltas,
            has_text: !text.is_empty(),
            tool_calls,
            tool_phase: ToolPhase::InputStart,
            response: result.response,
            usage: result.usage,
            finish_reason: Some(result.finish_reason),
            error: None,
        }
    }

    /// A stream for a call that failed before any result existed:
    /// `stream-start` with no warnings, a single `error`, then nothing.
    pub fn failed<S: Into<String>>(error: S) -> Self {
        Self {
            state: State::Start,
            warnings: Vec::new(),
            text_id: String::new(),
            deltas: VecDeque::new(),
            has_text: false,
            tool_calls: VecDeque::new(),
            tool_phase: ToolPhase::InputStart,
            response: ResponseMetadata::default(),
            usage: Usage::default(),
            finish_reason: None,
            error: Some(error.into()),
        }
    }

    fn after_text(&self) -> State {
        if self.tool_calls.is_empty() {
            State::Metadata
        } else {
            State::Tools
        }
    }

    fn next_tool_event(&mut self) -> Option<StreamEvent> {
        let call = self.tool_calls.front()?;
        let event = match self.tool_phase {
            ToolPhase::InputStart => {
                self.tool_phase = ToolPhase::InputDelta;
                StreamEvent::ToolInputStart {
                    id: call.id.clone(),
                    tool_name: call.name.clone(),
                }
            }
            ToolPhase::InputDelta => {
                self.tool_phase = ToolPhase::InputEnd;
                StreamEvent::ToolInputDelta {
                    id: call.id.clone(),
                    delta: call.input.clone(),
                }
            }
            ToolPhase::InputEnd => {
                self.tool_phase = ToolPhase::Call;
                StreamEvent::ToolInputEnd {
                    id: call.id.clone(),
                }
            }
            ToolPhase::Call => {
                self.tool_phase = ToolPhase::InputStart;
                let call = self.tool_calls.pop_front()?;
                if self.tool_calls.is_empty() {
                    self.state = State::Metadata;
                }
                StreamEvent::ToolCall {
                    tool_call_id: call.id,
                    tool_name: call.name,
                    input: call.input,
                }
            }
        };
        Some(event)
    }
}

impl Iterator for SimulatedStream {
    type Item = StreamEvent;

    fn next(&mut self) -> Option<StreamEvent> {
        match self.state {
            State::Start => {
                self.state = if self.error.is_some() {
                    State::Failed
                } else if self.has_text {
                    State::TextStart
                } else {
                    self.after_text()
                };
                Some(StreamEvent::StreamStart {
                    warnings: std::mem::take(&mut self.warnings),
                })
            }
            State::TextStart => {
                self.state = State::TextDelta;
                Some(StreamEvent::TextStart {
                    id: self.text_id.clone(),
                })
            }
            State::TextDelta => match self.deltas.pop_front() {
                Some(delta) => Some(StreamEvent::TextDelta {
                    id: self.text_id.clone(),
                    delta,
                }),
                None => {
                    self.state = self.after_text();
                    Some(StreamEvent::TextEnd {
                        id: self.text_id.clone(),
                    })
                }
            },
            State::Tools => match self.next_tool_event() {
                Some(event) => Some(event),
                None => {
                    self.state = State::Metadata;
                    self.next()
                }
            },
            State::Metadata => {
                self.state = State::Finish;
                Some(StreamEvent::ResponseMetadata {
                    model_id: self.response.model_id.take(),
                    id: self.response.id.take(),
                })
            }
            State::Finish => {
                self.state = State::Done;
                let finish_reason = self.finish_reason.take()?;
                Some(StreamEvent::Finish {
                    usage: std::mem::take(&mut self.usage),
                    finish_reason,
                })
            }
            State::Failed => {
                self.state = State::Done;
                self.error.take().map(|error| StreamEvent::Error { error })
            }
            State::Done => None,
        }
    }
}

impl FusedIterator for SimulatedStream {}
