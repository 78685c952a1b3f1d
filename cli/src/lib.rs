#![deny(clippy::unwrap_used, clippy::expect_used)]

mod cli;
mod commands;
pub mod config;

pub use cli::Cli;
pub use cli::Command;

use std::io::IsTerminal;
use std::sync::Arc;

use anyhow::Context;
use taskboard_attachments::Reconciler;
use taskboard_attachments_api::BlobStore;
use taskboard_attachments_api::RecordStore;
use taskboard_attachments_api::TaskId;
use taskboard_attachments_client::HttpBlobStore;
use taskboard_attachments_client::HttpConfig;
use taskboard_attachments_client::HttpRecordStore;
use taskboard_attachments_client::MockBlobStore;
use taskboard_attachments_client::MockRecordStore;
use tracing::info;
use tracing::warn;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::Registry;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::reload;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::Config;
use crate::config::ConfigOverrides;
use crate::config::Mode;
use crate::config::find_taskboard_home;

const DEFAULT_LOG_LEVEL: &str = "warn";

type LogFilterHandle = reload::Handle<EnvFilter, Registry>;

/// Entry point for the `taskboard` binary.
pub async fn run_main(cli: Cli) -> anyhow::Result<()> {
    let (rust_log_set, log_filter) = init_logging();

    let home = find_taskboard_home()?;
    let overrides = ConfigOverrides::from_env().merge(ConfigOverrides::from(&cli.connection));
    let config = Config::load(&home, overrides)?;
    if !rust_log_set {
        apply_log_level(&log_filter, &config.log_level);
    }

    info!(
        "taskboard.start mode={:?} base_url={} home={}",
        config.mode,
        config.base_url,
        home.display()
    );

    let seed = match &cli.command {
        Command::Show(args) => Some(args.task_id.as_str()),
        Command::Edit(args) => Some(args.task_id.as_str()),
        Command::Cleanup(_) => None,
    };
    let reconciler = build_reconciler(&config, seed.map(TaskId::new))?;

    match cli.command {
        Command::Show(args) => commands::show(&reconciler, &args).await,
        Command::Edit(args) => commands::edit(&reconciler, args).await,
        Command::Cleanup(args) => commands::cleanup(&reconciler, &args).await,
    }
}

/// Install the stderr subscriber before anything else logs. `RUST_LOG` wins
/// when set; otherwise the filter starts at `warn` and is swapped for the
/// configured level once config is loaded.
fn init_logging() -> (bool, LogFilterHandle) {
    let from_env = EnvFilter::try_from_default_env().ok();
    let rust_log_set = from_env.is_some();
    let (filter, handle) =
        reload::Layer::new(from_env.unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_LEVEL)));
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_ansi(std::io::stderr().is_terminal())
                .with_writer(std::io::stderr),
        )
        .try_init();
    (rust_log_set, handle)
}

fn apply_log_level(handle: &LogFilterHandle, level: &str) {
    let filter = match EnvFilter::try_new(level) {
        Ok(filter) => filter,
        Err(err) => {
            warn!("ignoring invalid log_level={level}: {err}");
            return;
        }
    };
    if let Err(err) = handle.reload(filter) {
        warn!("failed to apply log_level={level}: {err}");
    }
}

/// Wire the stores selected by `config.mode`. In mock mode `seed` names a task
/// to create empty so that `show` and `edit` have something to open.
fn build_reconciler(config: &Config, seed: Option<TaskId>) -> anyhow::Result<Reconciler> {
    let (blobs, records): (Arc<dyn BlobStore>, Arc<dyn RecordStore>) = match config.mode {
        Mode::Mock => {
            let records = MockRecordStore::new();
            if let Some(task_id) = &seed {
                records.seed(task_id, &config.owner_id, &[]);
            }
            (Arc::new(MockBlobStore::new()), Arc::new(records))
        }
        Mode::Online => {
            let http = HttpConfig {
                base_url: config.base_url.clone(),
                api_key: config.api_key.clone(),
                bearer_token: config.access_token.clone(),
                user_agent: Some(format!("taskboard-cli/{}", env!("CARGO_PKG_VERSION"))),
                timeout: config.request_timeout,
            };
            let blobs = HttpBlobStore::new(&http, config.bucket.clone())
                .context("failed to build blob store client")?;
            let records = HttpRecordStore::new(&http)
                .context("failed to build record store client")?
                .with_table(config.table.clone());
            (Arc::new(blobs), Arc::new(records))
        }
    };
    Ok(Reconciler::new(blobs, records, config.owner_id.clone()))
}
