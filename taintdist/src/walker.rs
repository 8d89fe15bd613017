// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

//! Interprocedural distance and taint walk.
//!
//! Every seed is walked twice.
//!
//! The forward walk starts with the variables the seed uses. Inside the function
//! of the seed block it visits all blocks which can reach the seed block, ordered
//! by their distance to it, and marks those defining tainted variables.
//! Afterwards it continues at every call site of the function. Parameters are
//! replaced by the caller variables passed to them and the distance from the
//! function entry to the seed block is added to the interprocedural offset.
//!
//! The backward walk starts with the variables the seed defines and visits all
//! blocks reachable from the seed block. Calls passing tainted variables continue
//! the walk at the callee entry with the same offset.

use std::collections::{BTreeMap, HashSet, VecDeque};

use log::{debug, trace};

use crate::cfg_store::{CfgStore, Distances, FunctionCfg, NodeIdx};
use crate::fitness::FitnessTable;
use crate::location::{Location, TaintSeed, VarSet};
use crate::program::{BasicBlock, ProgramModel};
use crate::propagator::{
    backward_scan_lines, forward_scan, forward_scan_lines, ScanError, ScanOutcome,
};
use crate::state::{AnalysisConfig, RunStats};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum WalkDirection {
    Forward,
    Backward,
}

/// A queue entry of a walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WalkEntry {
    pub location: Location,
    /// Accumulated distance of all function boundaries crossed so far.
    pub offset: u32,
    /// Tainted variables at [WalkEntry::location].
    pub set: VarSet,
    /// [WalkEntry::location] is the first line of a callee entry block.
    /// Its own line is scanned as well.
    pub block_start: bool,
}

impl WalkEntry {
    pub fn new(location: Location, offset: u32, set: VarSet) -> WalkEntry {
        WalkEntry {
            location,
            offset,
            set,
            block_start: false,
        }
    }

    pub fn at_block_start(location: Location, offset: u32, set: VarSet) -> WalkEntry {
        WalkEntry {
            block_start: true,
            ..WalkEntry::new(location, offset, set)
        }
    }
}

/// A queue entry placed in its function's CFG.
struct Anchor<'a> {
    block: &'a BasicBlock,
    function: &'a str,
    cfg: &'a FunctionCfg,
    node: NodeIdx,
    entry: NodeIdx,
    /// Working set at the block boundary.
    set: VarSet,
}

pub struct Walker<'a> {
    model: &'a ProgramModel,
    store: &'a CfgStore,
    config: &'a AnalysisConfig,
}

impl<'a> Walker<'a> {
    pub fn new(model: &'a ProgramModel, store: &'a CfgStore, config: &'a AnalysisConfig) -> Walker<'a> {
        Walker {
            model,
            store,
            config,
        }
    }

    /// Runs both walks of the seed with index [seed_idx].
    pub fn walk_seed(
        &self,
        seed_idx: usize,
        seed: &TaintSeed,
        table: &mut FitnessTable,
        stats: &mut RunStats,
    ) {
        debug!("Walk seed {}: {}", seed_idx, seed);
        stats.seeds += 1;
        self.forward_walk(seed_idx, seed, table, stats);
        self.backward_walk(seed_idx, seed, table, stats);
    }

    pub fn forward_walk(
        &self,
        seed_idx: usize,
        seed: &TaintSeed,
        table: &mut FitnessTable,
        stats: &mut RunStats,
    ) {
        if seed.facts.uses.is_empty() {
            return;
        }
        let mut frontier = VecDeque::from([WalkEntry::new(
            seed.location.clone(),
            0,
            seed.facts.uses.clone(),
        )]);
        let mut visited: HashSet<Location> = HashSet::new();

        while let Some(entry) = frontier.pop_front() {
            if !self.admit(&entry, &visited, stats) {
                continue;
            }
            let Some((block, function)) = self.locate(&entry.location) else {
                stats.unresolved += 1;
                continue;
            };
            let set = match forward_scan_lines(
                self.model,
                block.lines_before(&entry.location),
                &entry.set,
            ) {
                Ok(outcome) => outcome.set,
                Err(e) => {
                    debug!("Abort forward entry at {}: {}", entry.location, e);
                    stats.unresolved += 1;
                    continue;
                }
            };
            let Some(anchor) = self.anchor(block, function, set) else {
                stats.unresolved += 1;
                continue;
            };
            let Some(distances) = self.store.distances_to(anchor.function, anchor.node) else {
                stats.unresolved += 1;
                continue;
            };
            self.taint_bands(
                seed_idx,
                &anchor,
                &distances,
                entry.offset,
                WalkDirection::Forward,
                table,
                stats,
                |b, s| forward_scan(self.model, b, s),
            );
            visited.insert(entry.location.clone());

            let Some(entry_dist) = self
                .store
                .distance(anchor.function, anchor.entry, anchor.node)
            else {
                debug!(
                    "{} is unreachable from the entry of {}. Abort branch.",
                    anchor.block.name, anchor.function
                );
                stats.unresolved += 1;
                continue;
            };
            if !self.model.has_callers(anchor.function) {
                trace!("{} has no callers.", anchor.function);
                continue;
            }
            let offset = entry.offset.saturating_add(entry_dist);
            for site in self.model.call_sites_of(anchor.function) {
                let caller_set = site.params_to_args(&anchor.set);
                trace!(
                    "Continue at caller {} of {} with offset {} and {:?}",
                    site.location,
                    anchor.function,
                    offset,
                    caller_set
                );
                frontier.push_back(WalkEntry::new(site.location.clone(), offset, caller_set));
            }
        }
    }

    pub fn backward_walk(
        &self,
        seed_idx: usize,
        seed: &TaintSeed,
        table: &mut FitnessTable,
        stats: &mut RunStats,
    ) {
        if seed.facts.def.is_empty() {
            return;
        }
        let mut frontier = VecDeque::from([WalkEntry::new(
            seed.location.clone(),
            0,
            seed.facts.def.clone(),
        )]);
        let mut visited: HashSet<Location> = HashSet::new();

        while let Some(entry) = frontier.pop_front() {
            if !self.admit(&entry, &visited, stats) {
                continue;
            }
            let Some((block, function)) = self.locate(&entry.location) else {
                stats.unresolved += 1;
                continue;
            };
            let mut callees: Vec<WalkEntry> = Vec::new();
            let lines = if entry.block_start {
                block.lines.as_slice()
            } else {
                block.lines_after(&entry.location)
            };
            let set = match backward_scan_lines(
                self.model,
                lines,
                &entry.set,
                |loc, s| self.follow_calls(loc, s, entry.offset, &mut callees),
            ) {
                Ok(outcome) => outcome.set,
                Err(e) => {
                    debug!("Abort backward entry at {}: {}", entry.location, e);
                    stats.unresolved += 1;
                    continue;
                }
            };
            let Some(anchor) = self.anchor(block, function, set) else {
                stats.unresolved += 1;
                continue;
            };
            let Some(distances) = self.store.distances_from(anchor.function, anchor.node) else {
                stats.unresolved += 1;
                continue;
            };
            self.taint_bands(
                seed_idx,
                &anchor,
                &distances,
                entry.offset,
                WalkDirection::Backward,
                table,
                stats,
                |b, s| {
                    backward_scan_lines(self.model, &b.lines, s, |loc, cur| {
                        self.follow_calls(loc, cur, entry.offset, &mut callees)
                    })
                },
            );
            visited.insert(entry.location.clone());

            stats.calls_followed += callees.len();
            frontier.extend(callees);
        }
    }

    /// Dedup and budget check of a dequeued entry.
    fn admit(&self, entry: &WalkEntry, visited: &HashSet<Location>, stats: &mut RunStats) -> bool {
        if visited.contains(&entry.location) {
            stats.dropped_visited += 1;
            return false;
        }
        if entry.offset > self.config.max_offset {
            trace!("Drop {}: offset {} over budget.", entry.location, entry.offset);
            stats.dropped_budget += 1;
            return false;
        }
        stats.entries += 1;
        true
    }

    /// Block and function [loc] belongs to.
    fn locate(&self, loc: &Location) -> Option<(&'a BasicBlock, &'a str)> {
        let model: &'a ProgramModel = self.model;
        let Some(block) = model.owner_block(loc) else {
            debug!("{} is not part of any block.", loc);
            return None;
        };
        let Some(function) = model.function_of(&block.name) else {
            debug!("Block {} belongs to no function.", block.name);
            return None;
        };
        Some((block, function))
    }

    /// Resolves the block and its function entry in the function's CFG.
    fn anchor(&self, block: &'a BasicBlock, function: &'a str, set: VarSet) -> Option<Anchor<'a>> {
        let store: &'a CfgStore = self.store;
        let Some(cfg) = store.get(function) else {
            debug!("No CFG for {}.", function);
            return None;
        };
        let Some(node) = cfg.resolve(&block.name) else {
            debug!("Block {} is not in the CFG of {}.", block.name, function);
            return None;
        };
        let Some(entry) = self.model.entry_block(function).and_then(|e| cfg.resolve(e)) else {
            debug!("Entry block of {} can't be resolved.", function);
            return None;
        };
        Some(Anchor {
            block,
            function,
            cfg,
            node,
            entry,
            set,
        })
    }

    /// Queues the callee entries of all calls at [loc] which pass a variable of [set].
    fn follow_calls(&self, loc: &Location, set: &VarSet, offset: u32, callees: &mut Vec<WalkEntry>) {
        for site in self.model.call_sites_at(loc) {
            let Some(callee_set) = site.args_to_params(set) else {
                continue;
            };
            let Some(entry_loc) = self.model.entry_location(&site.callee) else {
                debug!("Entry of callee {} at {} is unknown.", site.callee, loc);
                continue;
            };
            trace!("Follow call of {} at {} with {:?}", site.callee, loc, callee_set);
            callees.push(WalkEntry::at_block_start(
                entry_loc.clone(),
                offset,
                callee_set,
            ));
        }
    }

    /// Visits the nodes of the anchor's function in bands of equal distance.
    ///
    /// The anchor block is tainted at [offset]. Every following band is scanned
    /// with the union of the sets all scanned nodes of the previous band produced.
    /// Nodes which don't touch the input pass it on unchanged.
    #[allow(clippy::too_many_arguments)]
    fn taint_bands<S>(
        &self,
        seed_idx: usize,
        anchor: &Anchor<'a>,
        distances: &Distances,
        offset: u32,
        dir: WalkDirection,
        table: &mut FitnessTable,
        stats: &mut RunStats,
        mut scan: S,
    ) where
        S: FnMut(&BasicBlock, &VarSet) -> Result<ScanOutcome, ScanError>,
    {
        let cfg: &'a FunctionCfg = anchor.cfg;
        let mut bands: BTreeMap<u32, Vec<&'a str>> = BTreeMap::new();
        for (node, d) in distances.iter() {
            if *d == 0 {
                continue;
            }
            if let Some(label) = cfg.label(*node) {
                bands.entry(*d).or_default().push(label);
            }
        }

        self.mark(seed_idx, &anchor.block.name, offset, dir, table, stats);
        let mut acc = anchor.set.clone();
        for (d, mut band) in bands {
            band.sort_unstable();
            let input = std::mem::take(&mut acc);
            for label in band {
                let Some(block) = self.model.block(label) else {
                    continue;
                };
                match scan(block, &input) {
                    Ok(outcome) => {
                        if outcome.tainted {
                            self.mark(seed_idx, label, offset.saturating_add(d), dir, table, stats);
                        }
                        acc.extend(outcome.set);
                    }
                    Err(e) => {
                        debug!("Skip block {}: {}", label, e);
                        stats.unresolvable_blocks += 1;
                    }
                }
            }
        }
    }

    fn mark(
        &self,
        seed_idx: usize,
        block: &str,
        distance: u32,
        dir: WalkDirection,
        table: &mut FitnessTable,
        stats: &mut RunStats,
    ) {
        match dir {
            WalkDirection::Forward => {
                stats.forward_tainted += 1;
                table.update(block, seed_idx, distance);
            }
            WalkDirection::Backward => {
                stats.backward_tainted += 1;
                debug!(
                    "Seed {}: {} tainted by backward walk at distance {}",
                    seed_idx, block, distance
                );
                if self.config.score_backward {
                    table.update(block, seed_idx, distance);
                }
            }
        }
    }
}
