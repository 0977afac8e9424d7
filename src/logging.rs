//! Log setup for the `segcast` binary.
//!
//! `send` is the only long-running command, so it is the only one that
//! writes a file: one JSON object per line in `logs/segcast.log.YYYY-MM-DD`.
//! Every line written during a run sits inside a `campaign` span carrying
//! `run_id`, `group` and `kind`, so one campaign can be pulled out with a
//! single filter. Recipients only ever appear masked (`XXXXXX3210`) and
//! incoming WhatsApp messages only as a short preview.
//!
//! The contact and media commands print their results on stdout and keep
//! stderr quiet unless `RUST_LOG` asks for more.

use std::path::Path;

use anyhow::Context;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

/// File name prefix of the daily campaign log.
pub const LOG_FILE_PREFIX: &str = "segcast.log";

/// Filter for `send` when `RUST_LOG` is unset. The HTTP stack is held at
/// `warn`; a bridge long-poll otherwise logs every reconnect.
pub const SEND_FILTER: &str = "info,hyper=warn,hyper_util=warn,reqwest=warn";

/// Filter for the one-shot commands when `RUST_LOG` is unset.
pub const CLI_FILTER: &str = "warn";

/// Keeps the background log writer alive; dropping it flushes the file.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

/// `RUST_LOG` if it parses, otherwise `fallback`.
pub fn filter_or(fallback: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback))
}

/// Install the JSON campaign log under `logs_dir` plus a readable stderr
/// copy for whoever is watching the run.
///
/// # Errors
///
/// Returns an error if `logs_dir` cannot be created or a global subscriber
/// is already installed.
pub fn init_production(logs_dir: &Path) -> anyhow::Result<LoggingGuard> {
    std::fs::create_dir_all(logs_dir)
        .with_context(|| format!("failed to create logs directory {}", logs_dir.display()))?;

    let (campaign_log, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::daily(logs_dir, LOG_FILE_PREFIX));

    tracing_subscriber::registry()
        .with(filter_or(SEND_FILTER))
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(true)
                .with_span_list(false)
                .with_writer(campaign_log),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to install log subscriber: {e}"))?;

    Ok(LoggingGuard { _guard: guard })
}

/// Stderr-only logging for `init`, `add`, `clear`, `list`, `stats` and
/// `status`. A second call is a no-op.
pub fn init_cli() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter_or(CLI_FILTER))
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
