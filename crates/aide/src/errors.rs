use thiserror::Error;

#[non_exhaustive]
#[derive(Error, Debug)]
pub enum AideError {
    #[error("Missing required setting `{setting}` (set {env_var})")]
    MissingSetting {
        setting: &'static str,
        env_var: &'static str,
    },

    #[error("Invalid setting: {0}")]
    InvalidSetting(String),

    #[error("Unknown model '{model_id}'. Available models: {}", available.join(", "))]
    UnknownModel {
        model_id: String,
        available: Vec<String>,
    },

    #[error("Invalid prompt: {0}")]
    InvalidPrompt(String),

    #[error("Token request failed with status {status}: {body}")]
    Auth { status: u16, body: String },

    #[error("Gateway request failed with status {status}: {message}")]
    Gateway { status: u16, message: String },

    #[error("Malformed gateway response: {0}")]
    MalformedResponse(String),

    #[error("Request cancelled")]
    Cancelled,

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl AideError {
    /// Configuration problems are raised at construction time, never per call.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            AideError::MissingSetting { .. }
                | AideError::InvalidSetting(_)
                | AideError::UnknownModel { .. }
        )
    }
}

impl From<config::ConfigError> for AideError {
    fn from(err: config::ConfigError) -> Self {
        AideError::InvalidSetting(err.to_string())
    }
}

pub type AideResult<T> = Result<T, AideError>;
