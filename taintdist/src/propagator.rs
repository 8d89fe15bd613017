// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

//! Taint propagation through the lines of a single basic block.
//!
//! Forward propagation asks which definitions the tainted variables depend on.
//! It walks a block from its end to its start and swaps every defined variable
//! of the working set for the variables used to define it.
//! Backward propagation asks what the tainted variables flow into.
//! It walks from the block start to its end and swaps used variables
//! for the variables defined with them.
//!
//! Both never modify their input set.

use thiserror::Error;

use crate::location::{Location, VarId, VarSet};
use crate::program::{BasicBlock, ProgramModel};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("Facts of {location} can't be attributed to a single variable: '{var}'")]
    Unresolvable { location: Location, var: VarId },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanOutcome {
    /// At least one line matched the working set.
    pub tainted: bool,
    /// The working set after the last scanned line.
    pub set: VarSet,
}

/// A variable can be attributed if it names exactly one variable.
/// Unnamed values and element accesses of aggregates can't.
pub fn is_attributable(var: &str) -> bool {
    !var.is_empty() && !var.contains('[')
}

fn check_attributable(loc: &Location, vars: &VarSet) -> Result<(), ScanError> {
    match vars.iter().find(|v| !is_attributable(v)) {
        Some(var) => Err(ScanError::Unresolvable {
            location: loc.clone(),
            var: var.clone(),
        }),
        None => Ok(()),
    }
}

/// `(set - kill) ∪ gen`
fn transfer(set: &VarSet, kill: &VarSet, gen: &VarSet) -> VarSet {
    set.difference(kill).chain(gen.iter()).cloned().collect()
}

/// Forward scan over [lines] in the given order.
/// [lines] must be in stored block order (descending).
pub fn forward_scan_lines(
    model: &ProgramModel,
    lines: &[Location],
    set: &VarSet,
) -> Result<ScanOutcome, ScanError> {
    let mut tainted = false;
    let mut current = set.clone();
    for loc in lines.iter() {
        let Some(facts) = model.facts(loc) else {
            continue;
        };
        check_attributable(loc, &facts.def)?;
        if facts.def.is_disjoint(&current) {
            continue;
        }
        tainted = true;
        current = transfer(&current, &facts.def, &facts.uses);
    }
    Ok(ScanOutcome {
        tainted,
        set: current,
    })
}

/// Backward scan over [lines] in reverse order.
/// [lines] must be in stored block order (descending).
/// [observer] sees every visited location together with the working set
/// right before the location is applied.
pub fn backward_scan_lines<O>(
    model: &ProgramModel,
    lines: &[Location],
    set: &VarSet,
    mut observer: O,
) -> Result<ScanOutcome, ScanError>
where
    O: FnMut(&Location, &VarSet),
{
    let mut tainted = false;
    let mut current = set.clone();
    for loc in lines.iter().rev() {
        observer(loc, &current);
        let Some(facts) = model.facts(loc) else {
            continue;
        };
        check_attributable(loc, &facts.uses)?;
        if facts.uses.is_disjoint(&current) {
            continue;
        }
        tainted = true;
        current = transfer(&current, &facts.uses, &facts.def);
    }
    Ok(ScanOutcome {
        tainted,
        set: current,
    })
}

/// Is [block] tainted by definitions of [set]? Scans from block end to block start.
pub fn forward_scan(
    model: &ProgramModel,
    block: &BasicBlock,
    set: &VarSet,
) -> Result<ScanOutcome, ScanError> {
    forward_scan_lines(model, &block.lines, set)
}

/// Is [block] tainted by uses of [set]? Scans from block start to block end.
pub fn backward_scan(
    model: &ProgramModel,
    block: &BasicBlock,
    set: &VarSet,
) -> Result<ScanOutcome, ScanError> {
    backward_scan_lines(model, &block.lines, set, |_, _| {})
}
