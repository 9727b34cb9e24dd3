use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Config(#[from] stashpost_config::Error),

    #[error(transparent)]
    Oauth(#[from] stashpost_oauth::Error),

    #[error("invalid time of day '{value}', expected HH:MM")]
    InvalidTime { value: String },

    #[error("{path} is not a directory")]
    NotADirectory { path: String },

    #[error("rotation job '{name}' has no directories")]
    EmptyRotation { name: String },
}

impl Error {
    #[must_use]
    pub fn invalid_time(value: impl Into<String>) -> Self {
        Self::InvalidTime {
            value: value.into(),
        }
    }

    #[must_use]
    pub fn not_a_directory(path: &std::path::Path) -> Self {
        Self::NotADirectory {
            path: path.display().to_string(),
        }
    }

    #[must_use]
    pub fn empty_rotation(name: impl Into<String>) -> Self {
        Self::EmptyRotation { name: name.into() }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
