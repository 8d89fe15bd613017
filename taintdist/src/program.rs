// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::collections::{BTreeMap, HashMap};

use helper::set_map::SetMap;
use log::{debug, warn};

use crate::location::{DefUse, Location, TaintSeed, VarId, VarSet};

static NO_FACTS: DefUse = DefUse {
    def: VarSet::new(),
    uses: VarSet::new(),
};

/// A basic block and the source lines it covers.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BasicBlock {
    pub name: String,
    /// Lines in descending order. Largest line first.
    pub lines: Vec<Location>,
}

impl BasicBlock {
    pub fn new(name: String, mut lines: Vec<Location>) -> BasicBlock {
        lines.sort_by(|a, b| b.line.cmp(&a.line).then_with(|| b.file.cmp(&a.file)));
        lines.dedup();
        BasicBlock { name, lines }
    }

    /// Lines executed before [loc] inside this block.
    /// In stored (descending) order, so the line closest to [loc] comes first.
    pub fn lines_before(&self, loc: &Location) -> &[Location] {
        let idx = self.lines.partition_point(|l| l.line >= loc.line);
        &self.lines[idx..]
    }

    /// Lines executed after [loc] inside this block.
    /// In stored (descending) order, so the line closest to [loc] comes last.
    pub fn lines_after(&self, loc: &Location) -> &[Location] {
        let idx = self.lines.partition_point(|l| l.line > loc.line);
        &self.lines[..idx]
    }

    /// The first line executed in this block.
    pub fn first_line(&self) -> Option<&Location> {
        self.lines.last()
    }
}

/// A call of [CallSite::callee] at [CallSite::location].
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct CallSite {
    pub location: Location,
    pub callee: String,
    /// Parameter name -> caller variables passed as this argument.
    pub bindings: BTreeMap<VarId, VarSet>,
}

impl CallSite {
    /// Replaces every parameter of the callee in [set] with the caller variables bound to it.
    pub fn params_to_args(&self, set: &VarSet) -> VarSet {
        let mut result = set.clone();
        for (param, args) in self.bindings.iter() {
            if result.remove(param) {
                result.extend(args.iter().cloned());
            }
        }
        result
    }

    /// Replaces caller variables in [set] with the parameters they are bound to.
    /// Returns None if no argument of this call carries a variable of [set].
    pub fn args_to_params(&self, set: &VarSet) -> Option<VarSet> {
        let matched: Vec<(&VarId, &VarSet)> = self
            .bindings
            .iter()
            .filter(|(_, args)| !args.is_disjoint(set))
            .collect();
        if matched.is_empty() {
            return None;
        }
        let mut result = set.clone();
        for (_, args) in matched.iter() {
            result.retain(|v| !args.contains(v));
        }
        result.extend(matched.into_iter().map(|(param, _)| param.clone()));
        Some(result)
    }
}

/// Read-only view of all facts the front end produced about the program.
#[derive(Debug, Default)]
pub struct ProgramModel {
    def_use: HashMap<Location, DefUse>,
    blocks: BTreeMap<String, BasicBlock>,
    block_function: HashMap<String, String>,
    function_entry: HashMap<String, String>,
    function_params: HashMap<String, Vec<VarId>>,
    /// Location -> name of the block containing it.
    line_owner: HashMap<Location, String>,
    /// Callee -> its call sites.
    callers: SetMap<String, CallSite>,
    /// Location -> calls made at it.
    calls_at: SetMap<Location, CallSite>,
}

impl ProgramModel {
    pub fn builder() -> ProgramModelBuilder {
        ProgramModelBuilder::default()
    }

    pub fn facts(&self, loc: &Location) -> Option<&DefUse> {
        self.def_use.get(loc)
    }

    /// Facts of [loc]. Locations without facts define and use nothing.
    pub fn def_use(&self, loc: &Location) -> &DefUse {
        self.def_use.get(loc).unwrap_or(&NO_FACTS)
    }

    pub fn block(&self, name: &str) -> Option<&BasicBlock> {
        self.blocks.get(name)
    }

    pub fn blocks(&self) -> impl Iterator<Item = &BasicBlock> {
        self.blocks.values()
    }

    pub fn num_blocks(&self) -> usize {
        self.blocks.len()
    }

    /// The block which contains [loc].
    pub fn owner_block(&self, loc: &Location) -> Option<&BasicBlock> {
        self.line_owner.get(loc).and_then(|name| self.blocks.get(name))
    }

    pub fn function_of(&self, block: &str) -> Option<&str> {
        self.block_function.get(block).map(String::as_str)
    }

    pub fn entry_block(&self, function: &str) -> Option<&str> {
        self.function_entry.get(function).map(String::as_str)
    }

    /// The first line executed by [function].
    pub fn entry_location(&self, function: &str) -> Option<&Location> {
        self.entry_block(function)
            .and_then(|b| self.blocks.get(b))
            .and_then(|b| b.first_line())
    }

    pub fn params(&self, function: &str) -> &[VarId] {
        self.function_params
            .get(function)
            .map(|p| p.as_slice())
            .unwrap_or(&[])
    }

    pub fn has_callers(&self, function: &str) -> bool {
        self.callers.len_of(&function.to_owned()) > 0
    }

    pub fn call_sites_of<'a>(&'a self, function: &str) -> impl Iterator<Item = &'a CallSite> + 'a {
        self.callers
            .get(&function.to_owned())
            .into_iter()
            .flat_map(|set| set.iter())
    }

    pub fn call_sites_at<'a>(&'a self, loc: &Location) -> impl Iterator<Item = &'a CallSite> + 'a {
        self.calls_at.set_iter(loc)
    }

    /// Builds a seed for [loc] from the def/use table.
    pub fn seed_at(&self, loc: Location) -> TaintSeed {
        let facts = self.def_use(&loc).clone();
        TaintSeed::new(loc, facts)
    }
}

/// Collects the raw tables and cross indexes them into a [ProgramModel].
#[derive(Default)]
pub struct ProgramModelBuilder {
    def_use: HashMap<Location, DefUse>,
    block_lines: BTreeMap<String, Vec<Location>>,
    block_function: HashMap<String, String>,
    function_entry: HashMap<String, String>,
    function_params: HashMap<String, Vec<VarId>>,
    /// (call location, callee, argument variables per position)
    calls: Vec<(Location, String, Vec<VarSet>)>,
}

impl ProgramModelBuilder {
    pub fn def_use(mut self, loc: Location, facts: DefUse) -> Self {
        self.def_use.insert(loc, facts);
        self
    }

    /// Adds a block. Without a function the block can't be placed in a CFG,
    /// but its lines can still be scanned.
    pub fn block(mut self, name: &str, function: Option<&str>, lines: Vec<Location>) -> Self {
        self.block_lines.insert(name.to_owned(), lines);
        if let Some(f) = function {
            self.block_function.insert(name.to_owned(), f.to_owned());
        }
        self
    }

    pub fn block_function(mut self, block: &str, function: &str) -> Self {
        self.block_function
            .insert(block.to_owned(), function.to_owned());
        self
    }

    pub fn entry(mut self, function: &str, block: &str) -> Self {
        self.function_entry
            .insert(function.to_owned(), block.to_owned());
        self
    }

    pub fn params(mut self, function: &str, params: Vec<VarId>) -> Self {
        self.function_params.insert(function.to_owned(), params);
        self
    }

    /// Adds a call of [callee] at [loc]. [args] is aligned with the callee's parameter list.
    pub fn call(mut self, loc: Location, callee: &str, args: Vec<VarSet>) -> Self {
        self.calls.push((loc, callee.to_owned(), args));
        self
    }

    pub fn build(self) -> ProgramModel {
        let mut blocks = BTreeMap::new();
        let mut line_owner: HashMap<Location, String> = HashMap::new();
        // BTreeMap order: on conflicts the smallest block name keeps the line.
        for (name, lines) in self.block_lines {
            let block = BasicBlock::new(name.clone(), lines);
            for loc in block.lines.iter() {
                if let Some(owner) = line_owner.get(loc) {
                    warn!("{} is part of {} and {}. Keeping {}.", loc, owner, name, owner);
                    continue;
                }
                line_owner.insert(loc.clone(), name.clone());
            }
            blocks.insert(name, block);
        }

        let mut callers = SetMap::new();
        let mut calls_at = SetMap::new();
        for (loc, callee, args) in self.calls {
            let Some(params) = self.function_params.get(&callee) else {
                debug!("Dropped call of {} at {}: no parameter list.", callee, loc);
                continue;
            };
            if params.len() != args.len() {
                warn!(
                    "Dropped call of {} at {}: {} arguments for {} parameters.",
                    callee,
                    loc,
                    args.len(),
                    params.len()
                );
                continue;
            }
            let mut bindings: BTreeMap<VarId, VarSet> = BTreeMap::new();
            for (param, arg) in params.iter().zip(args.into_iter()) {
                bindings.entry(param.clone()).or_default().extend(arg);
            }
            let site = CallSite {
                location: loc.clone(),
                callee: callee.clone(),
                bindings,
            };
            callers.insert(callee, site.clone());
            calls_at.insert(loc, site);
        }

        ProgramModel {
            def_use: self.def_use,
            blocks,
            block_function: self.block_function,
            function_entry: self.function_entry,
            function_params: self.function_params,
            line_owner,
            callers,
            calls_at,
        }
    }
}
