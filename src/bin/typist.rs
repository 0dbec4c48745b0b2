//! Layout script command line interface
//!
//! Normalizes, interprets and dry-runs layout scripts without an editor.
//!
//! # Usage
//!
//! ```bash
//! # Show the repaired script
//! typist normalize --file answer.txt
//!
//! # Show the interpreter tier and operation stream
//! echo "insert_text('a') + insert_enter()" | typist parse
//!
//! # Type into an in-memory document and print the result
//! typist dry-run --file answer.txt --format json
//! ```

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use colored::Colorize;
use serde_json::json;
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use layout_typist::layout_script::{normalize, plan, Step};
use layout_typist::{
    CancelToken, CommandBridge, ComposeSettings, MemoryConnector, MemoryDocument, Session, SharedDocument,
    TypistConfig,
};

#[derive(Parser)]
#[command(name = "typist")]
#[command(version)]
#[command(about = "Repair, interpret and dry-run layout scripts")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, short = 'o', global = true, default_value = "pretty", value_enum)]
    format: OutputFormat,

    /// YAML configuration file (environment variables otherwise)
    #[arg(long, global = true, env = "TYPIST_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the normalized script
    Normalize {
        /// Input file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Normalize, then show the interpreter tier and operations
    Parse {
        /// Input file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Type the script into an in-memory document
    DryRun {
        /// Input file (reads stdin if not provided)
        #[arg(short, long)]
        file: Option<PathBuf>,

        /// Name of the in-memory document
        #[arg(long, default_value = "dry-run.hwp")]
        document: String,
    },
}

// =============================================================================
// MAIN
// =============================================================================

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Normalize { file } => cmd_normalize(file, cli.format),
        Commands::Parse { file } => cmd_parse(file, cli.format),
        Commands::DryRun { file, document } => cmd_dry_run(file, &document, cli.config.as_deref(), cli.format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            if cli.format == OutputFormat::Json {
                println!("{}", json!({ "error": format!("{e:#}") }));
            } else {
                eprintln!("{}: {:#}", "error".red().bold(), e);
            }
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// COMMAND IMPLEMENTATIONS
// =============================================================================

fn cmd_normalize(file: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let source = read_input(file)?;
    let normalized = normalize(&source);
    match format {
        OutputFormat::Json => println!("{}", json!({ "normalized": normalized })),
        OutputFormat::Pretty => println!("{normalized}"),
    }
    Ok(())
}

fn cmd_parse(file: Option<PathBuf>, format: OutputFormat) -> Result<()> {
    let source = read_input(file)?;
    let normalized = normalize(&source);
    let plan = plan(&normalized).context("script could not be interpreted")?;

    match format {
        OutputFormat::Json => {
            let steps: Vec<_> = plan.steps.iter().map(step_json).collect();
            let output = json!({ "tier": plan.tier, "steps": steps });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Pretty => {
            println!(
                "{} {} operation(s) via {:?} interpreter",
                "OK".green(),
                plan.steps.len(),
                plan.tier
            );
            for (i, step) in plan.steps.iter().enumerate() {
                match step {
                    Ok(op) => println!("  [{i}] {op:?}"),
                    Err(e) => println!("  [{i}] {} {e}", "invalid".yellow()),
                }
            }
        }
    }
    Ok(())
}

fn cmd_dry_run(file: Option<PathBuf>, document: &str, config: Option<&Path>, format: OutputFormat) -> Result<()> {
    let source = read_input(file)?;
    let config = load_config(config)?;

    let doc = SharedDocument::new(MemoryDocument::with_standard_fragments(document));
    let mut session = Session::new(
        Box::new(MemoryConnector::new(doc.clone())),
        ComposeSettings::from_config(&config),
        Arc::new(CommandBridge::from_config(&config.converter)),
    );
    let outcome = session.run_script(&source, None, &CancelToken::new());
    session.close();

    let (text, log) = (doc.text(), doc.log());
    match format {
        OutputFormat::Json => {
            let report = match &outcome {
                Ok(report) => serde_json::to_value(report)?,
                Err(e) => json!({ "error": e.to_string() }),
            };
            let output = json!({ "report": report, "text": text, "primitives": log });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
        OutputFormat::Pretty => {
            println!("{}", "Document".bold());
            println!("{text}");
            println!();
            println!("{} ({} call(s))", "Primitives".bold(), log.len());
            for (i, primitive) in log.iter().enumerate() {
                println!("  [{i}] {primitive:?}");
            }
        }
    }

    let report = outcome.context("dry run stopped")?;
    if format == OutputFormat::Pretty {
        println!(
            "{} typed {} operation(s) via {:?} interpreter",
            "OK".green(),
            report.applied,
            report.tier
        );
    }
    Ok(())
}

// =============================================================================
// HELPERS
// =============================================================================

fn step_json(step: &Step) -> serde_json::Value {
    match step {
        Ok(op) => serde_json::to_value(op).unwrap_or_else(|e| json!({ "error": e.to_string() })),
        Err(e) => json!({ "op": e.op(), "error": e.to_string() }),
    }
}

fn load_config(path: Option<&Path>) -> Result<TypistConfig> {
    let config = match path {
        Some(path) => TypistConfig::from_yaml_file(path)?,
        None => TypistConfig::from_env()?,
    };
    Ok(config)
}

fn read_input(file: Option<PathBuf>) -> Result<String> {
    match file {
        Some(path) => std::fs::read_to_string(&path).with_context(|| format!("failed to read {}", path.display())),
        None => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read stdin")?;
            Ok(buffer)
        }
    }
}
