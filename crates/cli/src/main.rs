mod auth_commands;
mod post_commands;

use std::path::PathBuf;

use {
    anyhow::Result,
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    stashpost_config::CredentialStore,
    stashpost_oauth::{AuthEndpoints, AuthFlow, TokenManager},
    stashpost_publish::{PublishEndpoints, Publisher},
    stashpost_scheduler::JobRunner,
};

#[derive(Parser)]
#[command(name = "stashpost", about = "Scheduled art publishing for DeviantArt")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Path to the credentials document.
    #[arg(long, global = true, env = "STASHPOST_CONFIG")]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the posting daemon (default when no subcommand is provided).
    Run,
    /// Authorize the application and store a refresh token.
    Login,
    /// Publish a single file now.
    Post {
        /// Image to publish (`.jpg`/`.jpeg`/`.png`).
        file: PathBuf,
        /// Deviation title; derived from the file name when omitted.
        #[arg(long)]
        title: Option<String>,
        /// Tags, comma separated.
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
        /// Destination gallery ids, comma separated.
        #[arg(long, value_delimiter = ',')]
        galleries: Vec<String>,
        /// Publish under the strict mature-content policy.
        #[arg(long, default_value_t = false)]
        mature: bool,
    },
    /// Show credential status.
    Status,
    /// List configured posting jobs and their next runs.
    Jobs,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_telemetry(&cli);

    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(stashpost_config::discover_credentials_path);

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run_daemon(&config_path).await,
        Commands::Login => auth_commands::login(&config_path).await,
        Commands::Status => auth_commands::status(&config_path),
        Commands::Post {
            file,
            title,
            tags,
            galleries,
            mature,
        } => post_commands::post(&config_path, &file, title, tags, galleries, mature).await,
        Commands::Jobs => post_commands::jobs(&config_path),
    }
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    let registry = tracing_subscriber::registry().with(filter);

    if cli.json_logs {
        registry
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        registry
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

async fn run_daemon(config_path: &std::path::Path) -> Result<()> {
    let store = CredentialStore::new(config_path.to_path_buf());
    let credentials = store.load()?;
    let dry_run = credentials.flag("debug_no_post").unwrap_or(false);
    if dry_run {
        info!("dry-run mode: files are selected and logged but never posted");
    }

    let flow = AuthFlow::new(
        AuthEndpoints::default(),
        credentials.client_id.clone(),
        credentials.client_secret.clone(),
    );
    let manager = TokenManager::new(flow, store, credentials);
    let publisher = Publisher::new(PublishEndpoints::default());

    let mut runner = JobRunner::new(manager, publisher).with_dry_run(dry_run);
    runner.run_forever().await?;
    Ok(())
}
