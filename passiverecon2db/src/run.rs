//! One ingestion run: configuration resolution, pipeline assembly and the
//! blocking stdin-to-store loop.
//!
//! # Configuration precedence
//!
//! 1. Built-in defaults
//! 2. `passiverecon.toml` (`--config`)
//! 3. `PASSIVERECON_{SECTION}_{FIELD}` environment variables
//! 4. Command-line flags

use std::io::BufRead;

use uuid::Uuid;

use passiverecon_core::config::PassiveReconConfig;
use passiverecon_pipeline::{
    PipelineConfig, ReconInfos, ReconPipeline, RunSummary, SqliteStore, select,
};

use crate::cli::Cli;
use crate::error::CliError;

/// Build the effective configuration from file, environment and flags.
///
/// # Errors
///
/// Returns `CliError::Config` if the file cannot be loaded or the merged
/// configuration is invalid.
pub async fn resolve_config(cli: &Cli) -> Result<PassiveReconConfig, CliError> {
    let mut config = match &cli.config {
        Some(path) => PassiveReconConfig::load(path).await?,
        None => PassiveReconConfig::from_env()?,
    };
    apply_cli_overrides(&mut config, cli);
    config.validate()?;
    Ok(config)
}

fn apply_cli_overrides(config: &mut PassiveReconConfig, cli: &Cli) {
    if let Some(sensor) = &cli.sensor {
        config.ingest.sensor = Some(sensor.clone()).filter(|s| !s.is_empty());
    }
    if let Some(path) = &cli.ignore_spec {
        config.ingest.ignore_spec = Some(path.display().to_string());
    }
    if let Some(db) = &cli.db {
        config.store.path = db.clone();
    }
    if let Some(format) = &cli.input_format {
        config.ingest.input_format = format.clone();
    }
    if let Some(level) = &cli.log_level {
        config.general.log_level = level.clone();
    }
    if let Some(format) = &cli.log_format {
        config.general.log_format = format.clone();
    }

    // Flags only override the configured mode when at least one is given.
    let flags = cli.write_mode_flags();
    if flags.any() {
        config.store.write_mode = select(flags);
    }
}

/// Run the pipeline over `input` and commit to the configured store.
///
/// The ignore rules are loaded before the first record is read, so a
/// broken rule file fails the run with nothing stored. The blocking
/// read/write loop runs on the blocking thread pool.
///
/// # Errors
///
/// - `Config`: invalid pipeline settings or ignore rule file
/// - `Storage`: database cannot be opened or a bulk commit failed
/// - `Io`: stdin read error (records read before it are still flushed)
pub async fn execute<R>(config: PassiveReconConfig, input: R) -> Result<RunSummary, CliError>
where
    R: BufRead + Send + 'static,
{
    let run_id = Uuid::new_v4();
    let pipeline_config = PipelineConfig::from_core(&config)?;
    let mode = pipeline_config.write_mode;
    let pipeline = ReconPipeline::load(pipeline_config).await?;
    let store = SqliteStore::open(&config.store.path)?;

    tracing::info!(
        %run_id,
        sensor = config.ingest.sensor.as_deref().unwrap_or("-"),
        ignore_spec = config.ingest.ignore_spec.as_deref().unwrap_or("-"),
        ignore_sensors = pipeline.rules().ignore_nets().sensor_count(),
        mode = %mode,
        db = %config.store.path,
        "passiverecon2db starting"
    );

    let summary = tokio::task::spawn_blocking(move || pipeline.run(input, store, &ReconInfos))
        .await
        .map_err(|e| CliError::Runtime(format!("ingestion task failed: {e}")))??;

    tracing::info!(
        %run_id,
        mode = %mode,
        read = summary.stats.read,
        malformed = summary.stats.malformed,
        ignored = summary.stats.ignored,
        kept = summary.stats.kept,
        committed = summary.write.committed,
        failed = summary.write.failed,
        flushes = summary.write.flushes,
        "passiverecon2db finished"
    );

    Ok(summary)
}

/// Turn a finished run into the process outcome.
///
/// # Errors
///
/// Returns `CliError::PartialFailure` if any record failed to store.
pub fn check_summary(summary: &RunSummary) -> Result<(), CliError> {
    if summary.write.is_clean() {
        Ok(())
    } else {
        Err(CliError::PartialFailure {
            failed: summary.write.failed,
            committed: summary.write.committed,
        })
    }
}
