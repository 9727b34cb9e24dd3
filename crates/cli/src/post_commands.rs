use std::path::Path;

use {anyhow::Result, chrono::Local};

use {
    stashpost_config::{CredentialStore, JobKind},
    stashpost_oauth::{AuthEndpoints, AuthFlow, TokenManager},
    stashpost_publish::{
        MaturePolicy, PublishEndpoints, PublishOutcome, Publisher, Submission,
    },
    stashpost_scheduler::{display_title, next_run_at},
};

/// Publish a single file outside the schedule.
pub async fn post(
    config_path: &Path,
    file: &Path,
    title: Option<String>,
    tags: Vec<String>,
    galleries: Vec<String>,
    mature: bool,
) -> Result<()> {
    let store = CredentialStore::new(config_path.to_path_buf());
    let credentials = store.load()?;
    let flow = AuthFlow::new(
        AuthEndpoints::default(),
        credentials.client_id.clone(),
        credentials.client_secret.clone(),
    );
    let mut manager = TokenManager::new(flow, store, credentials);
    let token = manager.get_token().await?;

    let stem = file
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or_default();
    let comment = std::fs::read_to_string(file.with_extension("txt")).unwrap_or_default();
    let submission = Submission {
        title: title.unwrap_or_else(|| display_title(stem)),
        comment,
        tags,
        galleries,
        mature: if mature {
            MaturePolicy::strict_nudity()
        } else {
            MaturePolicy::Clean
        },
    };

    let publisher = Publisher::new(PublishEndpoints::default());
    match publisher.publish(file, &token, &submission).await? {
        PublishOutcome::Published { deviation_id, url } => {
            println!("Published deviation {deviation_id} at {url}");
        },
        PublishOutcome::Abandoned { attempts } => {
            println!("Gave up after {attempts} attempts; the file was kept.");
        },
    }
    Ok(())
}

/// List configured posting jobs and when they next run.
pub fn jobs(config_path: &Path) -> Result<()> {
    let store = CredentialStore::new(config_path.to_path_buf());
    let credentials = store.load()?;
    let jobs = stashpost_config::load_post_config(&credentials.extra)?;
    if jobs.is_empty() {
        println!("No posting jobs configured.");
        return Ok(());
    }

    let now = Local::now();
    for (name, job) in jobs {
        let kind = match &job.kind {
            JobKind::Daily { directory, .. } => format!("daily from {}", directory.display()),
            JobKind::Rotation {
                directories,
                last_posted,
                ..
            } => format!(
                "rotation over {} directories (cursor {last_posted})",
                directories.len()
            ),
        };
        let next = next_run_at(&job.time, now)
            .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|_| format!("invalid time '{}'", job.time));
        println!(
            "{name}: {kind}, {} image(s) at {}, next run {next}",
            job.images_per_day, job.time
        );
    }
    Ok(())
}
