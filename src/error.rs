use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{0} is not configured")]
    MissingCredential(&'static str),
    #[error("invalid configuration value for {field}: {message}")]
    Invalid {
        field: &'static str,
        message: String,
    },
}

/// Uniform failure of a completion call. None of this is shown to users; log it
/// with [`error_chain`] so the underlying cause is kept.
#[derive(Debug, Error)]
pub enum CompletionError {
    #[error(transparent)]
    Configuration(#[from] ConfigError),
    #[error("completion request failed")]
    Transport(#[source] reqwest::Error),
    #[error("completion API returned status {status}: {body}")]
    Status {
        status: u16,
        body: String,
    },
    #[error("failed to decode completion response: {0}")]
    Decode(String),
    #[error("completion worker did not finish: {0}")]
    Worker(String),
}

impl From<reqwest::Error> for CompletionError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            CompletionError::Decode(error_chain(&err))
        } else {
            CompletionError::Transport(err)
        }
    }
}

impl From<tokio::task::JoinError> for CompletionError {
    fn from(err: tokio::task::JoinError) -> Self {
        CompletionError::Worker(err.to_string())
    }
}

/// Renders an error followed by every `source()` beneath it, joined by `: `.
pub fn error_chain(err: &(dyn std::error::Error + 'static)) -> String {
    let mut rendered = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        rendered.push_str(": ");
        rendered.push_str(&cause.to_string());
        source = cause.source();
    }
    rendered
}

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("discord request failed: {0}")]
    Discord(String),
    #[error("{0}")]
    Other(String),
}

impl From<serenity::Error> for PlatformError {
    fn from(err: serenity::Error) -> Self {
        PlatformError::Discord(err.to_string())
    }
}
