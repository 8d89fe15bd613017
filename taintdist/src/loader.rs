// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

//! Reads the facts the front end wrote to disk.

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::cfg_store::CfgStore;
use crate::dot::parse_cfg;
use crate::error::{AnalysisError, AnalysisResult};
use crate::location::{var_set, DefUse, Location, TaintSeed, VarId};
use crate::program::ProgramModel;

pub const DEF_USE_FILE: &str = "duVar.json";
pub const BLOCK_LINES_FILE: &str = "bbLine.json";
pub const BLOCK_FUNCTION_FILE: &str = "bbFunc.json";
pub const FUNCTION_ENTRY_FILE: &str = "funcEntry.json";
pub const FUNCTION_PARAMS_FILE: &str = "funcParam.json";
pub const CALL_ARGS_FILE: &str = "callArgs.json";

pub const CFG_FILE_PREFIX: &str = "cfg.";
pub const CFG_FILE_SUFFIX: &str = ".dot";

/// Paths of all inputs of a run.
#[derive(Clone, Debug)]
pub struct InputPaths {
    pub facts_dir: PathBuf,
    pub cfg_dir: PathBuf,
    pub seed_file: PathBuf,
}

impl InputPaths {
    pub fn new(facts_dir: PathBuf, cfg_dir: PathBuf, seed_file: PathBuf) -> InputPaths {
        InputPaths {
            facts_dir,
            cfg_dir,
            seed_file,
        }
    }

    /// Fails on the first path which doesn't exist or has the wrong type.
    pub fn check(&self) -> AnalysisResult<()> {
        if !self.facts_dir.is_dir() {
            return Err(AnalysisError::MissingPath(self.facts_dir.clone()));
        }
        if !self.cfg_dir.is_dir() {
            return Err(AnalysisError::MissingPath(self.cfg_dir.clone()));
        }
        if !self.seed_file.is_file() {
            return Err(AnalysisError::MissingPath(self.seed_file.clone()));
        }
        Ok(())
    }
}

/// call location -> callee -> argument variables per parameter position
type CallArgTable = BTreeMap<String, BTreeMap<String, Vec<Vec<VarId>>>>;

fn read_text(path: &Path) -> AnalysisResult<String> {
    fs::read_to_string(path).map_err(|e| AnalysisError::io(path, e))
}

fn read_json<T: DeserializeOwned>(path: &Path) -> AnalysisResult<T> {
    let text = read_text(path)?;
    serde_json::from_str(&text).map_err(|source| AnalysisError::Json {
        path: path.to_owned(),
        source,
    })
}

/// Like [read_json], but a missing file is an empty table.
fn read_optional_json<T: DeserializeOwned + Default>(path: &Path) -> AnalysisResult<T> {
    if !path.exists() {
        debug!("{} not present. Assume it is empty.", path.display());
        return Ok(T::default());
    }
    read_json(path)
}

fn parse_locations(keys: &[String]) -> AnalysisResult<Vec<Location>> {
    keys.iter().map(|k| Location::from_str(k)).collect()
}

/// Loads the program facts from [facts_dir].
pub fn load_program(facts_dir: &Path) -> AnalysisResult<ProgramModel> {
    let def_use: HashMap<String, DefUse> = read_json(&facts_dir.join(DEF_USE_FILE))?;
    let block_lines: BTreeMap<String, Vec<String>> =
        read_json(&facts_dir.join(BLOCK_LINES_FILE))?;
    let block_function: BTreeMap<String, String> =
        read_json(&facts_dir.join(BLOCK_FUNCTION_FILE))?;
    let function_entry: BTreeMap<String, String> =
        read_json(&facts_dir.join(FUNCTION_ENTRY_FILE))?;
    let function_params: BTreeMap<String, Vec<VarId>> =
        read_optional_json(&facts_dir.join(FUNCTION_PARAMS_FILE))?;
    let call_args: CallArgTable = read_optional_json(&facts_dir.join(CALL_ARGS_FILE))?;

    let mut builder = ProgramModel::builder();
    for (key, facts) in def_use {
        builder = builder.def_use(Location::from_str(&key)?, facts);
    }
    for (block, lines) in block_lines.iter() {
        builder = builder.block(block, None, parse_locations(lines)?);
    }
    for (block, function) in block_function.iter() {
        builder = builder.block_function(block, function);
    }
    for (function, entry) in function_entry.iter() {
        builder = builder.entry(function, entry);
    }
    for (function, params) in function_params {
        builder = builder.params(&function, params);
    }
    for (key, callees) in call_args {
        let loc = Location::from_str(&key)?;
        for (callee, args) in callees {
            builder = builder.call(loc.clone(), &callee, args.into_iter().map(var_set).collect());
        }
    }
    let model = builder.build();
    info!(
        "Loaded {} blocks of {} functions from {}",
        model.num_blocks(),
        function_entry.len(),
        facts_dir.display()
    );
    Ok(model)
}

/// Function name encoded in a CFG file name: `cfg.<function>.dot`
fn cfg_file_function(path: &Path) -> Option<String> {
    let fname = path.file_name()?.to_str()?;
    let name = fname
        .strip_prefix(CFG_FILE_PREFIX)?
        .strip_suffix(CFG_FILE_SUFFIX)?;
    if name.is_empty() {
        return None;
    }
    Some(name.to_owned())
}

/// Parses every `cfg.<function>.dot` in [cfg_dir].
/// Files are read in name order. If two graphs have the same function name,
/// the later one wins.
pub fn load_cfgs(cfg_dir: &Path) -> AnalysisResult<CfgStore> {
    let mut files: Vec<(PathBuf, String)> = Vec::new();
    let dir = fs::read_dir(cfg_dir).map_err(|e| AnalysisError::io(cfg_dir, e))?;
    for dir_entry in dir {
        let path = dir_entry.map_err(|e| AnalysisError::io(cfg_dir, e))?.path();
        if let Some(function) = cfg_file_function(&path) {
            files.push((path, function));
        }
    }
    files.sort();

    let mut store = CfgStore::new();
    for (path, function) in files {
        let text = read_text(&path)?;
        let cfg = parse_cfg(&text, &function).map_err(|e| AnalysisError::Dot {
            path: path.clone(),
            line: e.line,
            msg: e.msg,
        })?;
        debug!(
            "CFG of {}: {} nodes, {} edges",
            cfg.get_name(),
            cfg.node_count(),
            cfg.edge_count()
        );
        store.insert(cfg);
    }
    if store.is_empty() {
        warn!("No CFG found in {}", cfg_dir.display());
    }
    info!("Loaded {} CFGs from {}", store.len(), cfg_dir.display());
    Ok(store)
}

#[derive(Deserialize)]
struct SeedRecord {
    location: String,
    #[serde(default)]
    def: Vec<VarId>,
    #[serde(default, rename = "use")]
    uses: Vec<VarId>,
}

/// Parses the seed file.
///
/// A JSON array holds seeds with explicit def/use sets.
/// Anything else is read as one location per line, whose facts come from [model].
/// On those lines everything after the first `,` is ignored.
pub fn parse_seeds(text: &str, model: &ProgramModel) -> AnalysisResult<Vec<TaintSeed>> {
    if text.trim_start().starts_with('[') {
        let records: Vec<SeedRecord> =
            serde_json::from_str(text).map_err(|source| AnalysisError::Json {
                path: PathBuf::from("<seeds>"),
                source,
            })?;
        return records
            .into_iter()
            .map(|r| -> AnalysisResult<TaintSeed> {
                Ok(TaintSeed::new(
                    Location::from_str(&r.location)?,
                    DefUse::new(r.def, r.uses),
                ))
            })
            .collect();
    }

    let mut seeds = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let key = line.split(',').next().unwrap_or(line);
        let loc = Location::from_str(key)?;
        if model.facts(&loc).is_none() {
            warn!("Seed {} has no def/use facts.", loc);
        }
        seeds.push(model.seed_at(loc));
    }
    Ok(seeds)
}

pub fn load_seeds(path: &Path, model: &ProgramModel) -> AnalysisResult<Vec<TaintSeed>> {
    let text = read_text(path)?;
    parse_seeds(&text, model).map_err(|e| match e {
        AnalysisError::Json { source, .. } => AnalysisError::Json {
            path: path.to_owned(),
            source,
        },
        other => other,
    })
}
