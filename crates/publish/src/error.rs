use std::path::Path;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    /// Anything that is not a `.jpg`/`.jpeg`/`.png`. Fatal for the file,
    /// never for the batch.
    #[error("unsupported image format: {path}")]
    UnsupportedFormat { path: String },

    #[error("staging upload rejected: {body}")]
    Upload { body: String },

    #[error("publish rejected ({status}): {body}")]
    Publish { status: u16, body: String },

    #[error("connection to the API failed: {source}")]
    Transport {
        #[source]
        source: reqwest::Error,
    },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    #[must_use]
    pub fn unsupported_format(path: &Path) -> Self {
        Self::UnsupportedFormat {
            path: path.display().to_string(),
        }
    }

    #[must_use]
    pub fn upload(body: impl Into<String>) -> Self {
        Self::Upload { body: body.into() }
    }

    #[must_use]
    pub fn publish(status: u16, body: impl Into<String>) -> Self {
        Self::Publish {
            status,
            body: body.into(),
        }
    }

    #[must_use]
    pub fn transport(source: reqwest::Error) -> Self {
        Self::Transport { source }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
