//! # jobsight CLI
//!
//! Extract structured fields from job postings and teach the extractor
//! with corrections.
//!
//! ## Usage
//!
//! ```bash
//! jobsight --config ./config/jobsight.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `jobsight parse <address>` | Extract fields and print the result as JSON |
//! | `jobsight correct <address>` | Record a human correction for one field |
//! | `jobsight stats` | Show what the pattern store has learned |
//! | `jobsight patterns` | List learned and discovered patterns |
//!
//! Logs go to stderr (`RUST_LOG` overrides the default filter); stdout
//! carries only command output.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use jobsight::config;
use jobsight::document;
use jobsight::stats;
use jobsight::{AnalyzeOptions, Harness};
use jobsight_core::{Correction, CorrectionOrigin, ExtractionError, ExtractionResult, Field};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// jobsight: adaptive job-posting field extraction.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. A missing file means built-in defaults.
#[derive(Parser)]
#[command(
    name = "jobsight",
    about = "jobsight: adaptive job-posting field extraction with learned corrections",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/jobsight.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract fields from a posting.
    ///
    /// Markup comes from `--file`, from `--pdf`, or from the network.
    /// Prints the result as JSON and saves the store snapshot. Exits with
    /// status 2 when nothing could be extracted.
    Parse {
        /// Address of the posting.
        address: String,

        /// Read markup from this HTML or text file instead of fetching.
        #[arg(long, conflicts_with = "pdf")]
        file: Option<PathBuf>,

        /// Read the posting from this PDF file instead of fetching.
        #[arg(long)]
        pdf: Option<PathBuf>,

        /// Earlier result (JSON) that may describe the same posting.
        #[arg(long = "reference")]
        references: Vec<PathBuf>,

        /// Skip the cross-validation collaborator even if configured.
        #[arg(long)]
        no_cross_validate: bool,
    },

    /// Record a correction for one field of a posting.
    Correct {
        /// Address the correction applies to.
        address: String,

        /// Field name: title, company, location, description or salary.
        #[arg(long)]
        field: Field,

        /// The wrong value the extractor produced. Omit when the field was
        /// missing; the correction is then logged without deriving a rule.
        #[arg(long)]
        from: Option<String>,

        /// The correct value.
        #[arg(long)]
        to: String,

        /// Confidence of the correction.
        #[arg(long, default_value_t = Correction::HUMAN_CONFIDENCE)]
        confidence: f64,
    },

    /// Show learning statistics.
    Stats {
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },

    /// List learned and discovered patterns.
    Patterns {
        /// Only patterns for this domain (e.g. `apply.deloitte.com`).
        #[arg(long)]
        domain: Option<String>,
    },
}

fn init_logging() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "jobsight=info,jobsight_core=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true),
        )
        .init();
}

fn main() -> ExitCode {
    init_logging();
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode> {
    let cfg = config::load_config(&cli.config)?;
    let harness = Harness::from_config(cfg)?;

    match cli.command {
        Commands::Parse {
            address,
            file,
            pdf,
            references,
            no_cross_validate,
        } => {
            return run_parse(&harness, &address, file, pdf, &references, !no_cross_validate);
        }
        Commands::Correct {
            address,
            field,
            from,
            to,
            confidence,
        } => {
            let correction = Correction::new(
                address,
                field,
                from,
                to,
                "",
                confidence,
                CorrectionOrigin::HumanFeedback,
            );
            match harness.record_correction(correction)? {
                Some(pattern) => println!("{}", serde_json::to_string_pretty(&pattern)?),
                None => println!("Correction logged; no pattern derived (no original value)."),
            }
            harness.save_state()?;
        }
        Commands::Stats { json } => {
            stats::run_stats(&harness, json)?;
        }
        Commands::Patterns { domain } => {
            stats::run_patterns(&harness, domain.as_deref())?;
        }
    }

    Ok(ExitCode::SUCCESS)
}

fn run_parse(
    harness: &Harness,
    address: &str,
    file: Option<PathBuf>,
    pdf: Option<PathBuf>,
    references: &[PathBuf],
    cross_validate: bool,
) -> Result<ExitCode> {
    let markup = match (file, pdf) {
        (Some(path), _) => Some(
            std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read markup file: {}", path.display()))?,
        ),
        (None, Some(path)) => {
            let doc = document::read_pdf(&path)?;
            if !doc.links.is_empty() {
                tracing::debug!(links = ?doc.links, "links found in document");
            }
            Some(doc.to_markup())
        }
        (None, None) => None,
    };

    let mut options = AnalyzeOptions {
        cross_validate,
        references: Vec::new(),
    };
    for path in references {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read reference result: {}", path.display()))?;
        let reference: ExtractionResult = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse reference result: {}", path.display()))?;
        options.references.push(reference);
    }

    let outcome = harness.analyze(address, markup.as_deref(), &options);
    harness.save_state()?;

    match outcome {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result)?);
            Ok(ExitCode::SUCCESS)
        }
        Err(e @ ExtractionError::Fatal { .. }) => {
            eprintln!("{}", e);
            if let Some(partial) = e.partial() {
                println!("{}", serde_json::to_string_pretty(partial)?);
            }
            Ok(ExitCode::from(2))
        }
        Err(e) => Err(e.into()),
    }
}
