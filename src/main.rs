//! Command-line front end for sapflow.
//!
//! Thin wrapper over the library: reads a source file, builds CFGs, and
//! prints them as JSON, DOT, or Mermaid; the `dfg` subcommand prints
//! def-use / use-def chains as JSON.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::EnvFilter;

use sapflow::cfg::render;
use sapflow::{analyze_def_use, build_cfgs, LanguageRegistry};

#[derive(Parser)]
#[command(name = "sapflow", version, about = "CFG and def-use analysis for C and Java")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build control flow graphs for every routine in a file
    Cfg {
        /// Source file to analyze
        file: PathBuf,
        /// Language override; detected from the extension when omitted
        #[arg(short, long)]
        language: Option<String>,
        /// Output format
        #[arg(short, long, value_enum, default_value_t = Format::Json)]
        format: Format,
    },
    /// Compute def-use and use-def chains for every routine in a file
    Dfg {
        /// Source file to analyze
        file: PathBuf,
        /// Language override; detected from the extension when omitted
        #[arg(short, long)]
        language: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Format {
    Json,
    Dot,
    Mermaid,
}

fn resolve_language(file: &PathBuf, language: Option<String>) -> Result<String> {
    if let Some(language) = language {
        return Ok(language);
    }
    match LanguageRegistry::global().detect_language(file) {
        Some(lang) => Ok(lang.name().to_string()),
        None => bail!(
            "cannot detect language of {}; pass --language (one of: {})",
            file.display(),
            LanguageRegistry::global().supported_languages().join(", ")
        ),
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    match cli.command {
        Commands::Cfg {
            file,
            language,
            format,
        } => {
            let language = resolve_language(&file, language)?;
            let source = std::fs::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let result = build_cfgs(&source, &language)?;
            for warning in &result.warnings {
                eprintln!("warning: {}", warning);
            }
            match format {
                Format::Json => println!("{}", serde_json::to_string_pretty(&result)?),
                Format::Dot => {
                    for routine in &result.routines {
                        print!("{}", render::to_dot(routine));
                    }
                }
                Format::Mermaid => {
                    for routine in &result.routines {
                        print!("{}", render::to_mermaid(routine));
                    }
                }
            }
        }
        Commands::Dfg { file, language } => {
            let language = resolve_language(&file, language)?;
            let source = std::fs::read(&file)
                .with_context(|| format!("reading {}", file.display()))?;
            let result = build_cfgs(&source, &language)?;
            for warning in &result.warnings {
                eprintln!("warning: {}", warning);
            }
            let analysis = analyze_def_use(&result.routines);
            println!("{}", serde_json::to_string_pretty(&analysis)?);
        }
    }
    Ok(())
}
