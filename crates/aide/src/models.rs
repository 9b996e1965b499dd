//! These models represent the objects passed between callers and the AIDE provider
//!
//! There are several different related formats we need to interact with:
//! - the unified prompt, sent from chat-serving code to the provider
//! - anthropic messages/tools, sent from the provider to the gateway
//! - openai messages/tools, sent from the provider to the gateway
//! - the unified result and stream events, sent from the provider back to callers
//!
//! Callers only ever see the unified structs here. The backend formats are built
//! and read by the converters in `providers` and never escape them.
pub mod content;
pub mod message;
pub mod role;
pub mod tool;
