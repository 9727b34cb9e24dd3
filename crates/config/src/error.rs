use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error("no posting job named '{name}' is configured")]
    UnknownJob { name: String },

    #[error("posting job '{name}' is not a rotation job")]
    NotRotation { name: String },

    #[error("{message}")]
    Message { message: String },
}

impl Error {
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn unknown_job(name: impl Into<String>) -> Self {
        Self::UnknownJob { name: name.into() }
    }

    #[must_use]
    pub fn not_rotation(name: impl Into<String>) -> Self {
        Self::NotRotation { name: name.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
