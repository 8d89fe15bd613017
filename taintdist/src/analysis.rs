// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::path::Path;
use std::sync::{Mutex, PoisonError};
use std::thread;
use std::time::Instant;

use helper::progress::ProgressBar;
use log::info;

use crate::cfg_store::CfgStore;
use crate::error::AnalysisResult;
use crate::fitness::{write_scores_to_file, FitnessTable};
use crate::loader::{load_cfgs, load_program, load_seeds, InputPaths};
use crate::location::TaintSeed;
use crate::program::ProgramModel;
use crate::state::{AnalysisConfig, RunStats};
use crate::walker::Walker;

/// Walks the seeds with index `i % threads == worker`.
fn run_worker(
    worker: usize,
    threads: usize,
    walker: &Walker,
    seeds: &[TaintSeed],
    progress: Option<&Mutex<ProgressBar>>,
) -> (FitnessTable, RunStats) {
    let mut table = FitnessTable::new(seeds.len());
    let mut stats = RunStats::new();
    for (idx, seed) in seeds.iter().enumerate().skip(worker).step_by(threads) {
        walker.walk_seed(idx, seed, &mut table, &mut stats);
        if let Some(bar) = progress {
            bar.lock()
                .unwrap_or_else(PoisonError::into_inner)
                .tick(Some(seed.location.to_string()));
        }
    }
    (table, stats)
}

/// Walks all seeds and returns the filled fitness table.
///
/// With more than one thread the seeds are distributed round robin.
/// Every worker fills its own table. The tables are merged afterwards by
/// taking the per cell maximum, so the result doesn't depend on the number
/// of threads.
pub fn run_analysis(
    model: &ProgramModel,
    store: &CfgStore,
    seeds: &[TaintSeed],
    config: &AnalysisConfig,
) -> (FitnessTable, RunStats) {
    let start = Instant::now();
    let walker = Walker::new(model, store, config);
    let threads = config.threads.clamp(1, seeds.len().max(1));
    let progress = config
        .show_progress
        .then(|| Mutex::new(ProgressBar::new("Walk seeds".to_owned(), seeds.len())));

    let (table, mut stats) = if threads == 1 {
        run_worker(0, 1, &walker, seeds, progress.as_ref())
    } else {
        info!("Walk {} seeds with {} threads", seeds.len(), threads);
        let results: Vec<(FitnessTable, RunStats)> = thread::scope(|s| {
            let handles: Vec<_> = (0..threads)
                .map(|tid| {
                    let walker = &walker;
                    let progress = progress.as_ref();
                    s.spawn(move || run_worker(tid, threads, walker, seeds, progress))
                })
                .collect();
            handles
                .into_iter()
                .map(|h| match h.join() {
                    Ok(r) => r,
                    Err(e) => std::panic::resume_unwind(e),
                })
                .collect()
        });
        let mut table = FitnessTable::new(seeds.len());
        let mut stats = RunStats::new();
        for (t, s) in results.iter() {
            table.merge(t);
            stats.merge(s);
        }
        (table, stats)
    };
    stats.runtime = start.elapsed();
    (table, stats)
}

/// Loads all inputs, walks every seed and writes the block scores to [output].
///
/// The output file is written even if no block got a score.
pub fn score_to_file(
    inputs: &InputPaths,
    output: &Path,
    config: &AnalysisConfig,
) -> AnalysisResult<RunStats> {
    inputs.check()?;
    let model = load_program(&inputs.facts_dir)?;
    let store = load_cfgs(&inputs.cfg_dir)?;
    let seeds = load_seeds(&inputs.seed_file, &model)?;
    info!("Loaded {} seeds from {}", seeds.len(), inputs.seed_file.display());

    let (table, stats) = run_analysis(&model, &store, &seeds, config);
    let scores = table.aggregate();
    write_scores_to_file(&scores, output)?;
    info!("Wrote {} block scores to {}", scores.len(), output.display());
    info!("{}", stats);
    Ok(stats)
}
