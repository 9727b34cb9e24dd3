//! Typed view of the `post_config` section of the credentials document.

use std::{collections::BTreeMap, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Key under which posting jobs live in the document's extra section.
pub const POST_CONFIG_KEY: &str = "post_config";

/// Source selection for a posting job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum JobKind {
    /// Posts from a single directory every run.
    Daily {
        directory: PathBuf,
        tags: Vec<String>,
    },
    /// Cycles through a list of directories, one per run.
    Rotation {
        directories: Vec<PathBuf>,
        /// Per-directory tag lists, parallel to `directories`.
        tags: Vec<Vec<String>>,
        /// Index of the directory posted on the previous run.
        #[serde(default)]
        last_posted: usize,
    },
}

/// One configured posting job.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PostJob {
    #[serde(flatten)]
    pub kind: JobKind,
    pub images_per_day: usize,
    /// Local time of day to post, `HH:MM`.
    pub time: String,
    /// Destination gallery ids.
    pub galleries: Vec<String>,
}

/// Parse the posting jobs out of the document's extra keys.
///
/// A document without a `post_config` section simply has no jobs.
pub fn load_post_config(
    extra: &serde_json::Map<String, serde_json::Value>,
) -> Result<BTreeMap<String, PostJob>> {
    match extra.get(POST_CONFIG_KEY) {
        Some(value) => Ok(serde_json::from_value(value.clone())?),
        None => Ok(BTreeMap::new()),
    }
}

/// Update the rotation cursor for `job_id` in place, leaving every
/// sibling key of the job untouched.
pub fn set_rotation_cursor(
    extra: &mut serde_json::Map<String, serde_json::Value>,
    job_id: &str,
    index: usize,
) -> Result<()> {
    let job = extra
        .get_mut(POST_CONFIG_KEY)
        .and_then(|jobs| jobs.get_mut(job_id))
        .and_then(serde_json::Value::as_object_mut)
        .ok_or_else(|| Error::unknown_job(job_id))?;

    let is_rotation = job
        .get("type")
        .and_then(serde_json::Value::as_str)
        .is_some_and(|kind| kind == "rotation");
    if !is_rotation {
        return Err(Error::not_rotation(job_id));
    }

    job.insert("last_posted".into(), index.into());
    Ok(())
}
