//! Command-line inspection tool for DBPF package archives
//!
//! The `dbpf` binary is a thin wrapper: it parses a [`Cli`], installs a
//! tracing subscriber and hands the parsed arguments to [`run`], which
//! writes everything it prints to the given sink.

#![warn(missing_docs)]
#![allow(clippy::module_name_repetitions)] // Clear naming is preferred
#![allow(clippy::missing_errors_doc)]

pub mod commands;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use dbpf_archive::ArchiveConfig;
use dbpf_formats::ResourceKey;
use dbpf_formats::resource::DecodeOptions;
use std::fs;
use std::io::Write;
use std::path::PathBuf;

/// `dbpf` command line
#[derive(Debug, Parser)]
#[command(
    name = "dbpf",
    about = "Inspect, extract and verify DBPF package archives",
    version,
    author
)]
pub struct Cli {
    /// Log at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short = 'o', long, value_enum, global = true, default_value = "text")]
    pub format: OutputFormat,

    #[command(flatten)]
    pub archive: ArchiveArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// How command results are printed
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Plain text
    Text,
    /// Compact JSON
    Json,
}

/// Options that shape how archives are opened
#[derive(Debug, Clone, Default, Args)]
pub struct ArchiveArgs {
    /// JSON archive configuration file
    #[arg(long, global = true, env = "DBPF_CONFIG", value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Trust the compression directory only; never sniff unflagged resources for RefPack data
    #[arg(long, global = true)]
    pub no_compression_detection: bool,

    /// Reject malformed text-form property sets instead of repairing them
    #[arg(long, global = true)]
    pub strict: bool,
}

impl ArchiveArgs {
    /// Build the archive configuration, flags overriding the file
    pub fn to_config(&self) -> Result<ArchiveConfig> {
        let mut config = match &self.config {
            Some(path) => {
                let text = fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                ArchiveConfig::from_json(&text)
                    .with_context(|| format!("Invalid configuration in {}", path.display()))?
            }
            None => ArchiveConfig::default(),
        };
        if self.no_compression_detection {
            config = config.with_compression_detection(false);
        }
        if self.strict {
            config = config.with_decode_options(DecodeOptions::strict());
        }
        Ok(config)
    }
}

/// Subcommands
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// List the resources in a package
    List {
        /// Package file
        archive: PathBuf,
        /// Only list this type (short name such as GZPS, or hex id)
        #[arg(long = "type", value_name = "NAME")]
        type_filter: Option<String>,
    },
    /// Print a resource's export tree as JSON
    Show {
        /// Package file
        archive: PathBuf,
        /// Resource key as T-G-I-R hex fields
        key: ResourceKey,
    },
    /// Write a resource's decompressed bytes to a file
    Extract {
        /// Package file
        archive: PathBuf,
        /// Resource key as T-G-I-R hex fields
        key: ResourceKey,
        /// Destination file
        out: PathBuf,
    },
    /// Rewrite a package in memory and compare it with the file
    Verify {
        /// Package file
        archive: PathBuf,
    },
    /// Print the resource type table
    Types,
}

/// Execute `cli`, printing to `out`
pub fn run(cli: &Cli, out: &mut impl Write) -> Result<()> {
    let format = cli.format;
    match &cli.command {
        Commands::List {
            archive,
            type_filter,
        } => commands::list(
            archive,
            type_filter.as_deref(),
            cli.archive.to_config()?,
            format,
            out,
        ),
        Commands::Show { archive, key } => {
            commands::show(archive, key, cli.archive.to_config()?, format, out)
        }
        Commands::Extract { archive, key, out: dest } => {
            commands::extract(archive, key, dest, cli.archive.to_config()?, out)
        }
        Commands::Verify { archive } => {
            commands::verify(archive, cli.archive.to_config()?, format, out)
        }
        Commands::Types => commands::type_table(format, out),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_show_with_key() {
        let cli = Cli::try_parse_from([
            "dbpf",
            "show",
            "objects.package",
            "EBCF3E27-7FD46CD0-00001234-00000000",
        ])
        .expect("Test operation should succeed");
        match cli.command {
            Commands::Show { key, .. } => {
                assert_eq!(key, ResourceKey::new(0xEBCF3E27, 0x7FD46CD0, 0x1234, 0));
            }
            other => panic!("unexpected command {other:?}"),
        }
        assert!(!cli.verbose);
        assert_eq!(cli.format, OutputFormat::Text);
    }

    #[test]
    fn test_parse_rejects_bad_key() {
        assert!(Cli::try_parse_from(["dbpf", "show", "objects.package", "not-a-key"]).is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let cli = Cli::try_parse_from([
            "dbpf",
            "list",
            "objects.package",
            "--type",
            "GZPS",
            "--strict",
            "--no-compression-detection",
            "-v",
        ])
        .expect("Test operation should succeed");
        let config = cli.archive.to_config().expect("Test operation should succeed");
        assert!(!config.detect_unflagged_compression);
        assert_eq!(config.decode, DecodeOptions::strict());
        assert!(cli.verbose);
    }
}
