//! Walks the configured posting jobs and drives the publish pipeline.

use std::{collections::BTreeMap, path::PathBuf, time::Duration};

use {
    chrono::{DateTime, Local},
    tracing::{error, info, warn},
};

use {
    crate::{
        error::{Error, Result},
        schedule::next_run_at,
        select::select_images,
    },
    stashpost_config::{JobKind, PostJob, load_post_config},
    stashpost_oauth::TokenManager,
    stashpost_publish::{MaturePolicy, PublishOutcome, Publisher, Submission},
};

/// Executes posting jobs one at a time on their schedule.
///
/// Per-item failures never abort a batch: abandoned or failed items are
/// logged, their source files kept, and the run continues.
pub struct JobRunner {
    manager: TokenManager,
    publisher: Publisher,
    mature: MaturePolicy,
    dry_run: bool,
}

impl JobRunner {
    #[must_use]
    pub fn new(manager: TokenManager, publisher: Publisher) -> Self {
        Self {
            manager,
            publisher,
            mature: MaturePolicy::strict_nudity(),
            dry_run: false,
        }
    }

    /// Override the mature-content policy applied to every submission.
    #[must_use]
    pub fn with_mature_policy(mut self, mature: MaturePolicy) -> Self {
        self.mature = mature;
        self
    }

    /// Select and log, but never touch the network or delete files.
    #[must_use]
    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Run jobs on their schedule until the process is stopped.
    pub async fn run_forever(&mut self) -> Result<()> {
        loop {
            let Some((name, at)) = self.next_due()? else {
                warn!("no posting jobs configured, nothing to do");
                return Ok(());
            };

            info!(job = %name, at = %at, "next run scheduled");
            let wait = (at - Local::now()).to_std().unwrap_or(Duration::ZERO);
            tokio::time::sleep(wait).await;

            // Reload so a rotation cursor advanced on the previous run
            // (or an edited document) is honoured.
            let jobs = self.jobs()?;
            match jobs.get(&name) {
                Some(job) => {
                    if let Err(e) = self.run_job(&name, job).await {
                        error!(job = %name, error = %e, "job run failed");
                    }
                },
                None => warn!(job = %name, "job disappeared from configuration, skipping"),
            }
        }
    }

    /// Run one posting job now. Returns how many files were published.
    pub async fn run_job(&mut self, name: &str, job: &PostJob) -> Result<usize> {
        let (directory, tags) = self.resolve_source(name, job)?;
        let selected = select_images(&directory, job.images_per_day)?;
        if selected.is_empty() {
            warn!(job = name, directory = %directory.display(), "out of files to post");
            return Ok(0);
        }

        if self.dry_run {
            for file in &selected {
                info!(
                    job = name,
                    file = %file.path.display(),
                    title = %file.title,
                    "dry run, would post"
                );
            }
            return Ok(selected.len());
        }

        let token = self.manager.get_token().await?;
        let mut published = 0;
        for file in selected {
            info!(
                job = name,
                file = %file.path.display(),
                title = %file.title,
                "posting"
            );

            let submission = Submission {
                title: file.title.clone(),
                comment: file.comment.clone(),
                tags: tags.clone(),
                galleries: job.galleries.clone(),
                mature: self.mature.clone(),
            };
            match self.publisher.publish(&file.path, &token, &submission).await {
                Ok(PublishOutcome::Published { deviation_id, url }) => {
                    info!(job = name, deviation_id = %deviation_id, url = %url, "published");
                    // The local copy only goes away once the platform has it.
                    if let Err(e) = std::fs::remove_file(&file.path) {
                        warn!(file = %file.path.display(), error = %e, "could not delete posted file");
                    }
                    published += 1;
                },
                Ok(PublishOutcome::Abandoned { attempts }) => {
                    warn!(
                        job = name,
                        file = %file.path.display(),
                        attempts,
                        "item abandoned after retries, keeping file"
                    );
                },
                Err(e) => {
                    error!(
                        job = name,
                        file = %file.path.display(),
                        error = %e,
                        "publish failed, keeping file"
                    );
                },
            }
        }
        Ok(published)
    }

    /// The configured jobs, read fresh from the credentials document.
    pub fn jobs(&self) -> Result<BTreeMap<String, PostJob>> {
        Ok(load_post_config(&self.manager.credentials().extra)?)
    }

    fn next_due(&self) -> Result<Option<(String, DateTime<Local>)>> {
        let now = Local::now();
        let mut due: Option<(String, DateTime<Local>)> = None;
        for (name, job) in self.jobs()? {
            let at = next_run_at(&job.time, now)?;
            let sooner = due.as_ref().is_none_or(|(_, best)| at < *best);
            if sooner {
                due = Some((name, at));
            }
        }
        Ok(due)
    }

    /// Resolve which directory and tags this run posts from, advancing
    /// and persisting the rotation cursor first for rotation jobs.
    fn resolve_source(&mut self, name: &str, job: &PostJob) -> Result<(PathBuf, Vec<String>)> {
        match &job.kind {
            JobKind::Daily { directory, tags } => Ok((directory.clone(), tags.clone())),
            JobKind::Rotation {
                directories,
                tags,
                last_posted,
            } => {
                if directories.is_empty() {
                    return Err(Error::empty_rotation(name));
                }
                let next = (last_posted + 1) % directories.len();
                self.manager.register_rotation_progress(name, next)?;
                let tags = tags.get(next).cloned().unwrap_or_default();
                Ok((directories[next].clone(), tags))
            },
        }
    }
}
