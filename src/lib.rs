pub mod cli;
pub mod config;
pub mod event;
pub mod ingest;
pub mod monitor;
pub mod query;
pub mod report;

use crate::config::load_config_from_path;
use crate::ingest::read_events;
use crate::monitor::{BatchStats, MonitorSet};
use crate::report::{CheckResult, CountReport};
use anyhow::{Context, anyhow};
pub use cli::{Cli, ColorMode, Commands, OutputFormat, cli_parse};
pub use config::{Config, MonitorConfig};
pub use event::{FieldPath, FieldValue, LogEntry};
pub use monitor::{Monitor, MonitorError};
pub use query::{Filter, QueryError};
use std::path::{Path, PathBuf};
use std::process::ExitCode;

/// Environment variable holding an `env_logger` filter spec
pub const CLOUDMON_LOG: &str = "CLOUDMON_LOG";
pub const CLOUDMON_LOG_STYLE: &str = "CLOUDMON_LOG_STYLE";

/// Set up logging to stderr. `CLOUDMON_LOG` takes precedence over the flags.
pub fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        log::LevelFilter::Error
    } else {
        match verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            2 => log::LevelFilter::Debug,
            _ => log::LevelFilter::Trace,
        }
    };

    let _ = env_logger::Builder::new()
        .filter_level(level)
        .parse_env(
            env_logger::Env::new()
                .filter(CLOUDMON_LOG)
                .write_style(CLOUDMON_LOG_STYLE),
        )
        .format_timestamp_millis()
        .try_init();
}

fn write_output_file(path: &Path, content: &str) -> anyhow::Result<()> {
    std::fs::write(path, content)
        .with_context(|| format!("Failed to write output file '{}'", path.display()))
}

fn emit(text: &str, output: Option<&Path>) -> anyhow::Result<()> {
    print!("{text}");
    if let Some(path) = output {
        write_output_file(path, text)?;
    }
    Ok(())
}

/// Read every file on its own thread and publish its events to the shared
/// monitor set in chunks of `batch_size`. Returns the number of skipped lines.
fn publish_files(
    set: &MonitorSet,
    files: &[PathBuf],
    batch_size: usize,
    stats: &BatchStats,
) -> anyhow::Result<usize> {
    std::thread::scope(|s| {
        let handles: Vec<_> = files
            .iter()
            .map(|file| {
                s.spawn(move || -> anyhow::Result<usize> {
                    let batch = read_events(file).with_context(|| {
                        format!("Failed to read events from '{}'", file.display())
                    })?;
                    log::info!(
                        "read {} event(s) from '{}' ({} skipped)",
                        batch.events.len(),
                        file.display(),
                        batch.skipped
                    );
                    for chunk in batch.events.chunks(batch_size) {
                        set.publish(chunk, stats);
                    }
                    Ok(batch.skipped)
                })
            })
            .collect();

        handles
            .into_iter()
            .map(|h| {
                h.join()
                    .unwrap_or_else(|_| Err(anyhow!("event reader thread panicked")))
            })
            .sum()
    })
}

fn count(cli: &Cli, config_path: &Path, files: &[PathBuf], batch_size: Option<usize>) -> anyhow::Result<ExitCode> {
    let config = load_config_from_path(config_path).context("Failed to load config")?;
    let set = MonitorSet::from_config(&config)?;
    let batch_size = batch_size.unwrap_or(config.batch_size).max(1);
    log::debug!("batch size: {batch_size}");

    let stats = BatchStats::default();
    let skipped = publish_files(&set, files, batch_size, &stats)?;
    let report = CountReport::new(&set, files.len(), skipped, stats.totals());

    let text = match cli.format {
        OutputFormat::Text => report::format_count_text(&report),
        OutputFormat::Json => format!("{}\n", report::format_count_json(&report)),
    };
    emit(&text, cli.output.as_deref())?;
    Ok(ExitCode::SUCCESS)
}

fn check(cli: &Cli, config_path: &Path) -> anyhow::Result<ExitCode> {
    let config = load_config_from_path(config_path).context("Failed to load config")?;

    let results: Vec<CheckResult> = config
        .monitors
        .iter()
        .map(|mc| match Monitor::new(mc) {
            Ok(monitor) => CheckResult {
                title: mc.title.clone(),
                query: mc.query.clone(),
                compiled: Some(monitor.filter().source().to_string()),
                error: None,
            },
            Err(MonitorError::Compile { source, .. }) => CheckResult {
                title: mc.title.clone(),
                query: mc.query.clone(),
                compiled: None,
                error: Some(source.to_string()),
            },
        })
        .collect();

    let text = match cli.format {
        OutputFormat::Text => report::format_check_text(&results),
        OutputFormat::Json => format!("{}\n", report::format_check_json(&results)),
    };
    emit(&text, cli.output.as_deref())?;

    if results.iter().all(CheckResult::is_ok) {
        Ok(ExitCode::SUCCESS)
    } else {
        Ok(ExitCode::FAILURE)
    }
}

fn match_events(cli: &Cli, query: &str, files: &[PathBuf], count_only: bool) -> anyhow::Result<ExitCode> {
    let filter = query::compile(query).context("Query compilation failed")?;

    let mut matched = Vec::new();
    for file in files {
        let batch = read_events(file)
            .with_context(|| format!("Failed to read events from '{}'", file.display()))?;
        matched.extend(batch.events.into_iter().filter(|e| filter.matches(e)));
    }
    log::info!("{} event(s) matched '{}'", matched.len(), filter.source());

    let text = match (cli.format, count_only) {
        (OutputFormat::Text, true) => format!("{}\n", matched.len()),
        (OutputFormat::Json, true) => format!("{}\n", serde_json::json!({ "matches": matched.len() })),
        (OutputFormat::Text, false) => matched.iter().map(|e| format!("{e}\n")).collect(),
        (OutputFormat::Json, false) => {
            let events: Vec<_> = matched.iter().map(LogEntry::to_json).collect();
            let body = serde_json::to_string_pretty(&serde_json::json!({
                "query": filter.source(),
                "matches": matched.len(),
                "events": events,
            }))?;
            format!("{body}\n")
        }
    };
    emit(&text, cli.output.as_deref())?;
    Ok(ExitCode::SUCCESS)
}

pub fn run(cli: &Cli) -> anyhow::Result<ExitCode> {
    if let Some(force) = cli.color.override_value() {
        colored::control::set_override(force);
    }

    match &cli.command {
        Commands::Count {
            config,
            files,
            batch_size,
        } => count(cli, config, files, *batch_size),
        Commands::Check { config } => check(cli, config),
        Commands::Match {
            query,
            files,
            count,
        } => match_events(cli, query, files, *count),
    }
}
