use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// The `state` returned by the authorization redirect did not match
    /// the nonce generated for this flow. Possible interception; the
    /// flow aborts without yielding a code.
    #[error("authorization state mismatch: expected '{expected}', received '{received}'")]
    StateMismatch { expected: String, received: String },

    #[error("token endpoint rejected the request ({status}): {description}")]
    Auth { status: u16, description: String },

    #[error("connection to the token endpoint failed: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    #[error("authorization callback timed out after {seconds}s")]
    CallbackTimeout { seconds: u64 },

    #[error("callback request missing '{param}' query parameter")]
    MissingParam { param: &'static str },

    #[error("{message}")]
    Config { message: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Store(#[from] stashpost_config::Error),
}

impl Error {
    #[must_use]
    pub fn state_mismatch(expected: impl Into<String>, received: impl Into<String>) -> Self {
        Self::StateMismatch {
            expected: expected.into(),
            received: received.into(),
        }
    }

    #[must_use]
    pub fn auth(status: u16, description: impl Into<String>) -> Self {
        Self::Auth {
            status,
            description: description.into(),
        }
    }

    #[must_use]
    pub fn transport(source: reqwest::Error) -> Self {
        Self::Transport { source }
    }

    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
