pub mod error;
pub mod pipeline;
pub mod types;

pub use {
    error::{Error, Result},
    pipeline::{PublishEndpoints, Publisher},
    types::{ImageFormat, MaturePolicy, PublishOutcome, Submission, UploadResult},
};
