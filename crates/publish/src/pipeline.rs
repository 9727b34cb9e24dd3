//! Two-phase upload-then-publish pipeline with bounded retry and backoff.
//!
//! Rate limiting and server faults either retry the failing call or
//! restart the whole cycle from the upload step; exhausted bounds land
//! in the non-error `Abandoned` terminal state.

use std::{path::Path, time::Duration};

use {
    reqwest::{
        StatusCode,
        multipart::{Form, Part},
    },
    secrecy::{ExposeSecret, Secret},
    tracing::{debug, info, warn},
};

use crate::{
    error::{Error, Result},
    types::{ImageFormat, MaturePolicy, PublishOutcome, Submission, UploadResult},
};

/// Platform limit on deviation titles.
const TITLE_MAX_CHARS: usize = 50;
/// Full upload-then-publish cycles attempted before giving up on an item.
const MAX_CYCLE_ATTEMPTS: usize = 6;
/// Publish-only attempts under rate limiting or server errors.
const MAX_PUBLISH_ATTEMPTS: usize = 20;
/// Server-error waits during upload are fixed, not exponential.
const SERVER_ERROR_WAITS: u32 = 3;
/// Ceiling on squared backoff growth.
const MAX_BACKOFF_SECS: u64 = 900;
/// Publish calls are small; uploads carry the file bytes.
const PUBLISH_TIMEOUT: Duration = Duration::from_secs(120);
const UPLOAD_TIMEOUT: Duration = Duration::from_secs(300);

/// Staging and publish endpoints.
#[derive(Debug, Clone)]
pub struct PublishEndpoints {
    pub upload_url: String,
    pub publish_url: String,
}

impl Default for PublishEndpoints {
    fn default() -> Self {
        Self {
            upload_url: "https://www.deviantart.com/api/v1/oauth2/stash/submit".into(),
            publish_url: "https://www.deviantart.com/api/v1/oauth2/stash/publish".into(),
        }
    }
}

/// Uploads a file to staging and publishes it from there.
pub struct Publisher {
    endpoints: PublishEndpoints,
    client: reqwest::Client,
    initial_backoff: Duration,
    server_error_wait: Duration,
}

/// Where a step leaves the current cycle.
enum StepOutcome<T> {
    Done(T),
    /// Start over from the upload; the step already slept its share.
    RestartCycle,
}

impl Publisher {
    #[must_use]
    pub fn new(endpoints: PublishEndpoints) -> Self {
        Self {
            endpoints,
            client: reqwest::Client::new(),
            initial_backoff: Duration::from_secs(2),
            server_error_wait: Duration::from_secs(20),
        }
    }

    #[must_use]
    pub fn with_initial_backoff(mut self, backoff: Duration) -> Self {
        self.initial_backoff = backoff;
        self
    }

    #[must_use]
    pub fn with_server_error_wait(mut self, wait: Duration) -> Self {
        self.server_error_wait = wait;
        self
    }

    /// Upload `file_path` to staging and publish it.
    ///
    /// Transient failures are absorbed here: rate limits and server
    /// errors back off and retry within fixed bounds, and exhaustion
    /// returns [`PublishOutcome::Abandoned`] rather than an error. Only
    /// unretryable responses surface as `Err`.
    pub async fn publish(
        &self,
        file_path: &Path,
        token: &Secret<String>,
        submission: &Submission,
    ) -> Result<PublishOutcome> {
        let format = ImageFormat::from_path(file_path)?;
        let bytes = tokio::fs::read(file_path).await?;
        let title: String = submission.title.chars().take(TITLE_MAX_CHARS).collect();

        let mut backoff = self.initial_backoff;
        for cycle in 1..=MAX_CYCLE_ATTEMPTS {
            debug!(cycle, file = %file_path.display(), "starting upload cycle");
            let uploaded = match self
                .upload(&bytes, format, token, &title, submission, backoff)
                .await?
            {
                StepOutcome::Done(item) => item,
                StepOutcome::RestartCycle => {
                    backoff = squared(backoff);
                    continue;
                },
            };
            info!(item_id = %uploaded.item_id, "image staged");

            match self
                .publish_item(&uploaded, token, submission, backoff)
                .await?
            {
                StepOutcome::Done(outcome) => return Ok(outcome),
                StepOutcome::RestartCycle => backoff = squared(backoff),
            }
        }

        warn!(
            file = %file_path.display(),
            attempts = MAX_CYCLE_ATTEMPTS,
            "upload cycles exhausted, abandoning item"
        );
        Ok(PublishOutcome::Abandoned {
            attempts: MAX_CYCLE_ATTEMPTS,
        })
    }

    async fn upload(
        &self,
        bytes: &[u8],
        format: ImageFormat,
        token: &Secret<String>,
        title: &str,
        submission: &Submission,
        backoff: Duration,
    ) -> Result<StepOutcome<UploadResult>> {
        let form = upload_form(bytes, format, token, title, submission)?;
        let response = self
            .client
            .post(&self.endpoints.upload_url)
            .timeout(UPLOAD_TIMEOUT)
            .multipart(form)
            .send()
            .await
            .map_err(Error::transport)?;

        let status = response.status();
        let body = response.text().await.map_err(Error::transport)?;

        let parsed: Option<serde_json::Value> = serde_json::from_str(&body).ok();
        let item_id = parsed
            .as_ref()
            .filter(|json| json["status"].as_str() == Some("success"))
            .and_then(item_id_of);
        if let Some(item_id) = item_id {
            return Ok(StepOutcome::Done(UploadResult { item_id }));
        }

        if status == StatusCode::TOO_MANY_REQUESTS {
            warn!(wait_secs = backoff.as_secs(), "staging upload rate limited");
            tokio::time::sleep(backoff).await;
            return Ok(StepOutcome::RestartCycle);
        }
        if status.is_server_error() {
            for wait in 1..=SERVER_ERROR_WAITS {
                info!(
                    wait,
                    waits = SERVER_ERROR_WAITS,
                    status = status.as_u16(),
                    "staging endpoint faulted, waiting"
                );
                tokio::time::sleep(self.server_error_wait).await;
            }
            return Ok(StepOutcome::RestartCycle);
        }

        Err(Error::upload(body))
    }

    async fn publish_item(
        &self,
        item: &UploadResult,
        token: &Secret<String>,
        submission: &Submission,
        cycle_backoff: Duration,
    ) -> Result<StepOutcome<PublishOutcome>> {
        let mut backoff = cycle_backoff;

        for attempt in 1..=MAX_PUBLISH_ATTEMPTS {
            let response = self
                .client
                .post(&self.endpoints.publish_url)
                .timeout(PUBLISH_TIMEOUT)
                .form(&publish_form(item, token, submission))
                .send()
                .await
                .map_err(Error::transport)?;

            let status = response.status();
            let body = response.text().await.map_err(Error::transport)?;

            if status.is_success() {
                match parse_publish(&body) {
                    Some(outcome) => return Ok(StepOutcome::Done(outcome)),
                    None => {
                        warn!(
                            status = status.as_u16(),
                            "publish response was not usable JSON, restarting from upload"
                        );
                        tokio::time::sleep(backoff).await;
                        return Ok(StepOutcome::RestartCycle);
                    },
                }
            }

            match status.as_u16() {
                // The platform intermittently 400s on valid requests.
                400 => {
                    warn!(attempt, "publish returned 400, restarting from upload");
                    tokio::time::sleep(backoff).await;
                    return Ok(StepOutcome::RestartCycle);
                },
                429 | 500 | 503 => {
                    warn!(
                        attempt,
                        max_attempts = MAX_PUBLISH_ATTEMPTS,
                        wait_secs = backoff.as_secs(),
                        status = status.as_u16(),
                        "publish throttled, backing off"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = squared(backoff);
                },
                _ => return Err(Error::publish(status.as_u16(), body)),
            }
        }

        warn!(
            item_id = %item.item_id,
            attempts = MAX_PUBLISH_ATTEMPTS,
            "publish retries exhausted, abandoning item"
        );
        Ok(StepOutcome::Done(PublishOutcome::Abandoned {
            attempts: MAX_PUBLISH_ATTEMPTS,
        }))
    }
}

/// Backoff grows by squaring, capped.
fn squared(backoff: Duration) -> Duration {
    let secs = backoff.as_secs();
    Duration::from_secs(secs.saturating_mul(secs).min(MAX_BACKOFF_SECS))
}

fn upload_form(
    bytes: &[u8],
    format: ImageFormat,
    token: &Secret<String>,
    title: &str,
    submission: &Submission,
) -> Result<Form> {
    let mut form = Form::new()
        .text("access_token", token.expose_secret().clone())
        .text("title", title.to_string())
        .text("is_mature", submission.mature.is_mature().to_string());

    // A single-character comment counts as no comment.
    if submission.comment.chars().count() > 1 {
        form = form.text("artist_comments", submission.comment.clone());
    }
    for (i, tag) in submission.tags.iter().enumerate() {
        form = form.text(format!("tags[{i}]"), tag.clone());
    }

    let image = Part::bytes(bytes.to_vec())
        .file_name(format.part_file_name())
        .mime_str(format.mime_type())
        .map_err(Error::transport)?;
    Ok(form.part("image", image))
}

fn publish_form(
    item: &UploadResult,
    token: &Secret<String>,
    submission: &Submission,
) -> Vec<(String, String)> {
    let mut form = vec![
        ("access_token".into(), token.expose_secret().clone()),
        ("itemid".into(), item.item_id.clone()),
        ("allow_free_download".into(), "true".into()),
        ("add_watermark".into(), "false".into()),
        ("feature".into(), "true".into()),
        ("request_critique".into(), "false".into()),
        ("allow_comments".into(), "true".into()),
        ("display_resolution".into(), "0".into()),
        ("sharing".into(), "allow".into()),
        ("license_options[creative_commons]".into(), "false".into()),
        ("license_options[commercial]".into(), "false".into()),
        ("license_options[modify]".into(), "no".into()),
    ];
    for (i, gallery) in submission.galleries.iter().enumerate() {
        form.push((format!("galleryids[{i}]"), gallery.clone()));
    }
    if let MaturePolicy::Mature {
        level,
        classification,
    } = &submission.mature
    {
        form.push(("is_mature".into(), "true".into()));
        form.push(("mature_level".into(), level.clone()));
        for (i, class) in classification.iter().enumerate() {
            form.push((format!("mature_classification[{i}]"), class.clone()));
        }
    }
    form
}

fn item_id_of(json: &serde_json::Value) -> Option<String> {
    match &json["itemid"] {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_publish(body: &str) -> Option<PublishOutcome> {
    let json: serde_json::Value = serde_json::from_str(body).ok()?;
    let deviation_id = json["deviationid"].as_str()?.to_string();
    let url = json["url"].as_str()?.to_string();
    Some(PublishOutcome::Published { deviation_id, url })
}
