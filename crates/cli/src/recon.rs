//! `keyrecon run` / `keyrecon validate`: config-driven reconciliation.

use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use clap::{Subcommand, ValueEnum};
use keyrecon::config::{resolve_path, ReconConfig};
use keyrecon::sink::{emit, JsonSink, SummarySink};
use keyrecon::{ReconError, Strategy};

use crate::exit_codes::{EXIT_RECON_DIFFS, EXIT_RECON_INVALID_CONFIG, EXIT_RECON_RUNTIME};
use crate::CliError;

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Run reconciliation from a TOML config file
    #[command(after_help = "\
Examples:
  keyrecon run customers.recon.toml
  keyrecon run customers.recon.toml --json
  keyrecon run customers.recon.toml --strategy batch --output result.json")]
    Run {
        /// Path to the .recon.toml config file
        config: PathBuf,

        /// Output JSON to stdout instead of the human summary
        #[arg(long)]
        json: bool,

        /// Write the JSON report to this file (overrides [output].json)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Override the configured strategy
        #[arg(long, value_enum)]
        strategy: Option<StrategyArg>,
    },

    /// Validate a recon config without running
    #[command(after_help = "\
Examples:
  keyrecon validate customers.recon.toml")]
    Validate {
        /// Path to the .recon.toml config file
        config: PathBuf,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum StrategyArg {
    Full,
    Batch,
}

impl From<StrategyArg> for Strategy {
    fn from(s: StrategyArg) -> Self {
        match s {
            StrategyArg::Full => Strategy::Full,
            StrategyArg::Batch => Strategy::Batch,
        }
    }
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run { config, json, output, strategy } => {
            cmd_recon_run(config, json, output, strategy.map(Into::into))
        }
        ReconCommands::Validate { config } => cmd_recon_validate(config),
    }
}

fn recon_err(code: u8, msg: impl Into<String>) -> CliError {
    CliError { code, message: msg.into(), hint: None }
}

/// Map engine errors onto the exit-code registry.
fn from_recon_error(e: ReconError) -> CliError {
    match e {
        ReconError::ConfigParse(_) | ReconError::ConfigValidation(_) => {
            recon_err(EXIT_RECON_INVALID_CONFIG, e.to_string())
        }
        ReconError::Lookup { .. } => CliError {
            code: EXIT_RECON_RUNTIME,
            message: e.to_string(),
            hint: Some("check the [reference] section and that the store is reachable".into()),
        },
        _ => recon_err(EXIT_RECON_RUNTIME, e.to_string()),
    }
}

fn load_config(config_path: &Path) -> Result<ReconConfig, CliError> {
    let config_str = std::fs::read_to_string(config_path)
        .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot read config: {e}")))?;
    ReconConfig::from_toml(&config_str).map_err(from_recon_error)
}

fn cmd_recon_run(
    config_path: PathBuf,
    json_output: bool,
    output_file: Option<PathBuf>,
    strategy: Option<Strategy>,
) -> Result<(), CliError> {
    let config = load_config(&config_path)?;

    // Resolve file paths relative to config file's directory
    let base_dir = config_path.parent().unwrap_or_else(|| Path::new("."));

    let report = keyrecon::engine::run(&config, base_dir, strategy).map_err(from_recon_error)?;

    let output_path = output_file
        .or_else(|| config.output.json.as_ref().map(|p| resolve_path(base_dir, p)));
    if let Some(ref path) = output_path {
        let file = File::create(path)
            .map_err(|e| recon_err(EXIT_RECON_RUNTIME, format!("cannot write output: {e}")))?;
        emit(&mut JsonSink::new(BufWriter::new(file)), &report).map_err(from_recon_error)?;
        eprintln!("wrote {}", path.display());
    }

    if json_output {
        emit(&mut JsonSink::new(std::io::stdout().lock()), &report).map_err(from_recon_error)?;
    } else {
        emit(&mut SummarySink::new(std::io::stdout().lock()), &report).map_err(from_recon_error)?;
    }

    let s = &report.summary;
    eprintln!(
        "{} recon: {} matched ({} differing), {} source only, {} reference only",
        report.meta.strategy, s.matched, s.differing, s.source_only, s.reference_only,
    );

    if report.result.is_reconciled() {
        Ok(())
    } else {
        // Message already printed above.
        Err(recon_err(EXIT_RECON_DIFFS, ""))
    }
}

fn cmd_recon_validate(config_path: PathBuf) -> Result<(), CliError> {
    let config = load_config(&config_path)?;
    eprintln!(
        "config '{}' is valid ({} strategy, keys: {})",
        config.name,
        config.strategy,
        config.primary_keys.join(", ")
    );
    Ok(())
}
