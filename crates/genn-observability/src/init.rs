// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Logging initialisation
//!
//! Console logging is always available. With the `file-logging` feature each
//! run additionally writes to its own timestamped folder:
//! ```text
//! ./logs/
//!   └── run_20250101_120000/
//!       ├── genn-lifecycle.log
//!       ├── genn-backend.log
//!       └── genn.log (combined)
//! ```

use anyhow::{anyhow, Context, Result};
use chrono::{NaiveDateTime, TimeZone, Utc};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

use crate::{CrateDebugFlags, LoggingConfig};

const RUN_PREFIX: &str = "run_";
const RUN_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Console filter built from configured levels and debug flags
pub fn console_filter(config: &LoggingConfig, flags: &CrateDebugFlags) -> Result<EnvFilter> {
    let directives = config.filter_directives(flags)?;
    EnvFilter::try_new(&directives).with_context(|| format!("Invalid log filter '{}'", directives))
}

/// Install a console subscriber as the global default
///
/// # Errors
///
/// Fails if a level is invalid or a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig, flags: &CrateDebugFlags) -> Result<()> {
    let filter = console_filter(config, flags)?;
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init()
        .map_err(|e| anyhow!("Failed to install logging subscriber: {}", e))
}

/// Keeps file writers alive; logs are flushed when this is dropped
#[cfg(feature = "file-logging")]
pub struct LoggingGuard {
    _file_guards: Vec<tracing_appender::non_blocking::WorkerGuard>,
    log_dir: PathBuf,
}

#[cfg(feature = "file-logging")]
impl LoggingGuard {
    /// Folder of the current run
    pub fn log_dir(&self) -> &Path {
        &self.log_dir
    }
}

/// Install console logging plus per-crate and combined log files
///
/// Old run folders are pruned according to the configured retention.
#[cfg(feature = "file-logging")]
pub fn init_file_logging(config: &LoggingConfig, flags: &CrateDebugFlags) -> Result<LoggingGuard> {
    use tracing_appender::rolling;
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;
    use tracing_subscriber::{Layer, Registry};

    let run_folder = config.log_dir.join(format!(
        "{}{}",
        RUN_PREFIX,
        Utc::now().format(RUN_TIMESTAMP_FORMAT)
    ));
    std::fs::create_dir_all(&run_folder)
        .with_context(|| format!("Failed to create log directory: {}", run_folder.display()))?;
    prune_log_runs(&config.log_dir, config.retention_days, config.retention_runs)?;

    let target_levels = config.target_levels(flags)?;
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();
    let mut file_guards = Vec::new();

    layers.push(
        tracing_subscriber::fmt::layer()
            .with_target(true)
            .with_filter(console_filter(config, flags)?)
            .boxed(),
    );

    for crate_name in crate::KNOWN_CRATES {
        let target = crate::crate_target(crate_name);
        let prefix = format!("{}::", target);
        let mut directives = vec!["off".to_string()];
        for (name, level) in &target_levels {
            if *name == target || name.starts_with(&prefix) {
                directives.push(format!("{}={}", name, level.to_string().to_lowercase()));
            }
        }
        let filter = EnvFilter::try_new(directives.join(","))
            .with_context(|| format!("Invalid log filter for {}", crate_name))?;

        let (writer, guard) =
            tracing_appender::non_blocking(rolling::never(&run_folder, format!("{}.log", crate_name)));
        file_guards.push(guard);
        layers.push(
            tracing_subscriber::fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(filter)
                .boxed(),
        );
    }

    let (combined, combined_guard) = tracing_appender::non_blocking(rolling::never(&run_folder, "genn.log"));
    file_guards.push(combined_guard);
    layers.push(
        tracing_subscriber::fmt::layer()
            .with_writer(combined)
            .with_ansi(false)
            .with_target(true)
            .with_filter(console_filter(config, flags)?)
            .boxed(),
    );

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow!("Failed to install logging subscriber: {}", e))?;

    Ok(LoggingGuard {
        _file_guards: file_guards,
        log_dir: run_folder,
    })
}

/// Remove run folders older than `retention_days`, then all but the newest
/// `retention_runs`. Returns the number of folders removed.
///
/// Folders that are not named `run_<timestamp>` are left alone.
pub fn prune_log_runs(base_log_dir: &Path, retention_days: u64, retention_runs: usize) -> Result<usize> {
    if !base_log_dir.exists() {
        return Ok(0);
    }

    let cutoff = Utc::now() - chrono::Duration::days(retention_days as i64);
    let mut runs: Vec<(PathBuf, chrono::DateTime<Utc>)> = Vec::new();
    for entry in std::fs::read_dir(base_log_dir)? {
        let path = entry?.path();
        if !path.is_dir() {
            continue;
        }
        let Some(timestamp) = path
            .file_name()
            .and_then(|n| n.to_str())
            .and_then(|n| n.strip_prefix(RUN_PREFIX))
        else {
            continue;
        };
        if let Ok(naive) = NaiveDateTime::parse_from_str(timestamp, RUN_TIMESTAMP_FORMAT) {
            runs.push((path, Utc.from_utc_datetime(&naive)));
        }
    }

    // Oldest first
    runs.sort_by_key(|(_, started)| *started);
    let expired = runs.iter().filter(|(_, started)| *started < cutoff).count();
    let over_limit = (runs.len() - expired).saturating_sub(retention_runs);

    let mut removed = 0;
    for (path, _) in runs.iter().take(expired + over_limit) {
        match std::fs::remove_dir_all(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!(
                "Warning: Failed to remove old log directory {}: {}",
                path.display(),
                e
            ),
        }
    }
    Ok(removed)
}
