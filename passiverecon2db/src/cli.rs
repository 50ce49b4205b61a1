//! CLI argument definitions for passiverecon2db.
//!
//! Uses `clap` v4 derive macros to parse command-line arguments.

use std::path::PathBuf;

use clap::Parser;

use passiverecon_pipeline::WriteModeFlags;

/// Ingest Zeek passiverecon records from stdin into the passive database.
///
/// Records are normalized, filtered through the per-sensor IGNORENETS /
/// NEVERIGNORE rules, merged by dedup key and committed with the selected
/// write strategy.
#[derive(Parser, Debug, Default)]
#[command(name = "passiverecon2db")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Sensor name attached to every record (selects the ignore rules).
    #[arg(short, long)]
    pub sensor: Option<String>,

    /// Path to the YAML ignore rule file (IGNORENETS / NEVERIGNORE).
    #[arg(short, long)]
    pub ignore_spec: Option<PathBuf>,

    /// Commit records in chunks, one transaction per chunk (default).
    #[arg(long)]
    pub bulk: bool,

    /// Merge records by dedup key in memory before committing.
    #[arg(long)]
    pub local_bulk: bool,

    /// Commit records one at a time; failed records are skipped.
    #[arg(long)]
    pub no_bulk: bool,

    /// Path to passiverecon.toml configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override the database path (`:memory:` for a dry run).
    #[arg(long)]
    pub db: Option<String>,

    /// Override input format (auto, zeek, json).
    #[arg(long)]
    pub input_format: Option<String>,

    /// Override log level (trace, debug, info, warn, error).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_level: Option<String>,

    /// Override log format (json, pretty).
    ///
    /// Takes precedence over the config file and environment variables.
    #[arg(long)]
    pub log_format: Option<String>,
}

impl Cli {
    /// Write mode flags as given on the command line.
    pub fn write_mode_flags(&self) -> WriteModeFlags {
        WriteModeFlags {
            bulk: self.bulk,
            local_bulk: self.local_bulk,
            no_bulk: self.no_bulk,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_short_flags() {
        let cli = Cli::try_parse_from([
            "passiverecon2db",
            "-s",
            "edge-01",
            "-i",
            "/etc/passiverecon/ignore.yml",
            "--local-bulk",
        ])
        .expect("should parse");

        assert_eq!(cli.sensor.as_deref(), Some("edge-01"));
        assert_eq!(
            cli.ignore_spec,
            Some(PathBuf::from("/etc/passiverecon/ignore.yml"))
        );
        assert!(cli.local_bulk);
        assert!(!cli.bulk);
        assert!(!cli.no_bulk);
    }

    #[test]
    fn test_no_flags_means_no_override() {
        let cli = Cli::try_parse_from(["passiverecon2db"]).expect("should parse");
        assert!(!cli.write_mode_flags().any());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_all_write_flags_accepted_together() {
        let cli = Cli::try_parse_from(["passiverecon2db", "--bulk", "--local-bulk", "--no-bulk"])
            .expect("conflicting flags are resolved by precedence, not rejected");
        let flags = cli.write_mode_flags();
        assert!(flags.bulk && flags.local_bulk && flags.no_bulk);
    }

    #[test]
    fn test_unknown_flag_rejected() {
        assert!(Cli::try_parse_from(["passiverecon2db", "--frobnicate"]).is_err());
    }
}
