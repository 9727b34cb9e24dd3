//! Request and result types for the upload-then-publish pipeline.

use std::path::Path;

use crate::error::{Error, Result};

/// Image formats the platform accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    Jpeg,
    Png,
}

impl ImageFormat {
    /// Derive the format from the file extension. Anything but
    /// `.jpg`/`.jpeg`/`.png` is rejected before any network call.
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("jpg" | "jpeg") => Ok(Self::Jpeg),
            Some("png") => Ok(Self::Png),
            _ => Err(Error::unsupported_format(path)),
        }
    }

    #[must_use]
    pub const fn mime_type(self) -> &'static str {
        match self {
            Self::Jpeg => "image/jpeg",
            Self::Png => "image/png",
        }
    }

    /// File name sent with the multipart image part.
    #[must_use]
    pub const fn part_file_name(self) -> &'static str {
        match self {
            Self::Jpeg => "image.jpg",
            Self::Png => "image.png",
        }
    }
}

/// Mature-content policy attached to a submission.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum MaturePolicy {
    #[default]
    Clean,
    Mature {
        level: String,
        classification: Vec<String>,
    },
}

impl MaturePolicy {
    /// The policy the original deployment posts under.
    #[must_use]
    pub fn strict_nudity() -> Self {
        Self::Mature {
            level: "strict".into(),
            classification: vec!["nudity".into(), "sexual".into()],
        }
    }

    #[must_use]
    pub const fn is_mature(&self) -> bool {
        matches!(self, Self::Mature { .. })
    }
}

/// Everything the pipeline needs to publish one file.
#[derive(Debug, Clone)]
pub struct Submission {
    pub title: String,
    pub comment: String,
    pub tags: Vec<String>,
    /// Destination gallery ids.
    pub galleries: Vec<String>,
    pub mature: MaturePolicy,
}

/// Staging identifier handed back by the upload endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    pub item_id: String,
}

/// Terminal result of a publish attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    /// The deviation is live.
    Published { deviation_id: String, url: String },
    /// Bounded retries were exhausted; the item was not posted and the
    /// source file must be kept.
    Abandoned { attempts: usize },
}
