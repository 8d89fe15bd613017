// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use flexi_logger::{Duplicate, FileSpec, FlexiLoggerError, Logger, LoggerHandle};
use log::{error, info};

use taintdist::analysis::score_to_file;
use taintdist::loader::InputPaths;
use taintdist::state::{AnalysisConfig, DEFAULT_MAX_OFFSET};

/// Scores every basic block of a program by its taint distance to a set of seed locations.
///
/// Writes one `<block>,<fitness>` line per block which got a score.
#[derive(Parser, Debug)]
#[command(name = "taintdist", version, about)]
struct Cli {
    /// Directory with the def/use and block facts (duVar.json, bbLine.json, ...).
    #[arg(short = 'p', long = "facts")]
    facts: PathBuf,

    /// Directory with one cfg.<function>.dot file per function.
    #[arg(short = 'c', long = "cfg")]
    cfgs: PathBuf,

    /// Taint seeds. One location per line or a JSON array.
    #[arg(short = 't', long = "taint")]
    taint: PathBuf,

    /// Output file.
    #[arg(short = 'o', long, default_value = "fitness.txt")]
    output: PathBuf,

    /// Interprocedural offset after which a walk is cut off.
    #[arg(long, default_value_t = DEFAULT_MAX_OFFSET)]
    max_offset: u32,

    /// Also score the blocks found by the backward walk.
    #[arg(long)]
    score_backward: bool,

    /// Number of threads the seeds are distributed over.
    #[arg(short = 'j', long, default_value_t = 1)]
    threads: usize,

    /// Show a progress bar.
    #[arg(long)]
    progress: bool,

    /// Log specification (e.g. "info" or "debug, taintdist::walker=trace").
    /// RUST_LOG takes precedence.
    #[arg(long, default_value = "info")]
    log: String,

    /// Write the log into this directory instead of stderr.
    /// Warnings are still duplicated to stderr.
    #[arg(long)]
    log_dir: Option<PathBuf>,
}

fn init_logger(cli: &Cli) -> Result<LoggerHandle, FlexiLoggerError> {
    let logger = Logger::try_with_env_or_str(&cli.log)?;
    match &cli.log_dir {
        Some(dir) => logger
            .log_to_file(FileSpec::default().directory(dir))
            .duplicate_to_stderr(Duplicate::Warn)
            .start(),
        None => logger.log_to_stderr().start(),
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    let _logger = match init_logger(&cli) {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Logger initialization failed: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let inputs = InputPaths::new(cli.facts.clone(), cli.cfgs.clone(), cli.taint.clone());
    if let Err(e) = inputs.check() {
        error!("{}", e);
        return ExitCode::FAILURE;
    }
    let config = AnalysisConfig {
        max_offset: cli.max_offset,
        score_backward: cli.score_backward,
        threads: cli.threads.max(1),
        show_progress: cli.progress,
    };
    info!("Run with {:?}", config);

    match score_to_file(&inputs, &cli.output, &config) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}
