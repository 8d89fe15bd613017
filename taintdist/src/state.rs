// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::fmt::Display;
use std::time::Duration;

/// Queue entries with a larger interprocedural offset are dropped.
pub const DEFAULT_MAX_OFFSET: u32 = 100;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnalysisConfig {
    /// Ceiling of the interprocedural offset.
    pub max_offset: u32,
    /// Write blocks tainted by the backward walk into the fitness table.
    /// Otherwise they are only logged.
    pub score_backward: bool,
    /// Number of worker threads seeds are distributed over.
    pub threads: usize,
    /// Draw a progress bar on stderr.
    pub show_progress: bool,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            max_offset: DEFAULT_MAX_OFFSET,
            score_backward: false,
            threads: 1,
            show_progress: false,
        }
    }
}

/// Counters collected while walking. Only used for reporting.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Seeds handed to the walker.
    pub seeds: usize,
    /// Queue entries which were processed.
    pub entries: usize,
    /// Queue entries dropped because their location was visited already.
    pub dropped_visited: usize,
    /// Queue entries dropped because their offset exceeded the ceiling.
    pub dropped_budget: usize,
    /// Queue entries aborted because a block, node or path couldn't be resolved.
    pub unresolved: usize,
    /// Blocks skipped during band scans because their facts were unresolvable.
    pub unresolvable_blocks: usize,
    /// Fitness updates from the forward walk.
    pub forward_tainted: usize,
    /// Blocks found by the backward walk.
    pub backward_tainted: usize,
    /// Callee entries queued by the backward walk.
    pub calls_followed: usize,
    pub runtime: Duration,
}

impl RunStats {
    pub fn new() -> RunStats {
        RunStats::default()
    }

    pub fn merge(&mut self, other: &RunStats) {
        self.seeds += other.seeds;
        self.entries += other.entries;
        self.dropped_visited += other.dropped_visited;
        self.dropped_budget += other.dropped_budget;
        self.unresolved += other.unresolved;
        self.unresolvable_blocks += other.unresolvable_blocks;
        self.forward_tainted += other.forward_tainted;
        self.backward_tainted += other.backward_tainted;
        self.calls_followed += other.calls_followed;
        self.runtime = self.runtime.max(other.runtime);
    }
}

impl Display for RunStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "seeds: {} - entries: {} (visited: {}, over budget: {}, unresolved: {}) - \
             unresolvable blocks: {} - tainted fwd/bwd: {}/{} - calls followed: {} - time: {:.2?}",
            self.seeds,
            self.entries,
            self.dropped_visited,
            self.dropped_budget,
            self.unresolved,
            self.unresolvable_blocks,
            self.forward_tainted,
            self.backward_tainted,
            self.calls_followed,
            self.runtime
        )
    }
}
