// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::collections::BTreeSet;
use std::fmt::Display;
use std::str::FromStr;

use serde::Deserialize;

use crate::error::AnalysisError;

/// Name of a source variable, as emitted by the front end.
pub type VarId = String;

/// Ordered so every set operation iterates deterministically.
pub type VarSet = BTreeSet<VarId>;

/// A single source line. Ordered by file first, then line.
#[derive(Clone, Debug, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Location {
    pub file: String,
    pub line: u32,
}

impl Location {
    pub fn new(file: impl Into<String>, line: u32) -> Location {
        Location {
            file: file.into(),
            line,
        }
    }
}

impl FromStr for Location {
    type Err = AnalysisError;

    /// Parses `<file>:<line>`. The file itself may contain colons.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let Some((file, line)) = trimmed.rsplit_once(':') else {
            return Err(AnalysisError::Location(s.to_owned()));
        };
        if file.is_empty() {
            return Err(AnalysisError::Location(s.to_owned()));
        }
        let Ok(line) = line.trim().parse::<u32>() else {
            return Err(AnalysisError::Location(s.to_owned()));
        };
        Ok(Location::new(file, line))
    }
}

impl Display for Location {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

/// Variables defined and used at one location.
#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct DefUse {
    #[serde(default)]
    pub def: VarSet,
    #[serde(default, rename = "use")]
    pub uses: VarSet,
}

impl DefUse {
    pub fn new<D, U>(def: D, uses: U) -> DefUse
    where
        D: IntoIterator,
        D::Item: Into<VarId>,
        U: IntoIterator,
        U::Item: Into<VarId>,
    {
        DefUse {
            def: def.into_iter().map(Into::into).collect(),
            uses: uses.into_iter().map(Into::into).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.def.is_empty() && self.uses.is_empty()
    }
}

/// Starting point of the analysis.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TaintSeed {
    pub location: Location,
    pub facts: DefUse,
}

impl TaintSeed {
    pub fn new(location: Location, facts: DefUse) -> TaintSeed {
        TaintSeed { location, facts }
    }
}

impl Display for TaintSeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} def: {:?} use: {:?}",
            self.location, self.facts.def, self.facts.uses
        )
    }
}

/// Builds a [VarSet] from anything string like.
pub fn var_set<I>(vars: I) -> VarSet
where
    I: IntoIterator,
    I::Item: Into<VarId>,
{
    vars.into_iter().map(Into::into).collect()
}
