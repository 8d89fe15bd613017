// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

//! Reader for the CFG DOT files LLVM's `WriteGraph` emits.
//!
//! Only the subset of DOT found in those files is understood:
//! one statement per line, record nodes with a `label` attribute
//! and plain edges between node identifiers (ports are ignored).

use std::sync::OnceLock;

use regex::Regex;
use thiserror::Error;

use crate::cfg_store::FunctionCfg;

/// A syntax error in a DOT file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{line}: {msg}")]
pub struct DotError {
    pub line: usize,
    pub msg: String,
}

fn header_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*(?:strict\s+)?digraph\s*(?:"((?:[^"\\]|\\.)*)"|(\w+))?\s*\{?\s*$"#)
            .expect("static regex")
    })
}

fn node_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"^\s*"?([A-Za-z_][\w.]*)"?\s*\[(.*)\]\s*;?\s*$"#).expect("static regex")
    })
}

fn edge_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r#"^\s*"?([A-Za-z_][\w.]*)"?(?::\w+)*\s*->\s*"?([A-Za-z_][\w.]*)"?(?::\w+)*\s*(?:\[.*\])?\s*;?\s*$"#,
        )
        .expect("static regex")
    })
}

fn label_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"label\s*=\s*"((?:[^"\\]|\\.)*)""#).expect("static regex"))
}

fn cfg_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^CFG for '(.+)' function$").expect("static regex"))
}

/// Extracts the block name from a node label.
///
/// `{main.c:12:|{<s0>T|<s1>F}}` -> `main.c:12`
/// `{main.c:12:\l  %1 = alloca i32\l}` -> `main.c:12`
pub fn block_label(label: &str) -> Option<String> {
    let record = label.trim().trim_start_matches('{');
    let end = record.find(['|', '}', '\\']).unwrap_or(record.len());
    let name = record[..end].trim();
    let name = name.strip_suffix(':').unwrap_or(name).trim();
    if name.is_empty() {
        return None;
    }
    Some(name.to_owned())
}

/// Parses a CFG in DOT format.
/// [fallback_name] is used as function name if the graph name doesn't carry one.
pub fn parse_cfg(text: &str, fallback_name: &str) -> Result<FunctionCfg, DotError> {
    let mut cfg = FunctionCfg::new(fallback_name);
    let mut seen_header = false;
    for (i, raw) in text.lines().enumerate() {
        let lnum = i + 1;
        let line = raw.trim();
        if line.is_empty() || line.starts_with("//") || line.starts_with('#') {
            continue;
        }
        if !seen_header {
            let Some(caps) = header_re().captures(line) else {
                return Err(DotError {
                    line: lnum,
                    msg: "Expected a digraph header".to_owned(),
                });
            };
            if let Some(gname) = caps.get(1) {
                if let Some(fname) = cfg_name_re().captures(gname.as_str()) {
                    cfg.set_name(&fname[1]);
                }
            }
            seen_header = true;
            continue;
        }
        if let Some(caps) = node_re().captures(line) {
            let id = &caps[1];
            if matches!(id, "graph" | "node" | "edge") {
                continue;
            }
            let label = label_re()
                .captures(&caps[2])
                .and_then(|l| block_label(&l[1]));
            cfg.add_node(id, label.as_deref());
            continue;
        }
        if line.contains("->") {
            let Some(caps) = edge_re().captures(line) else {
                return Err(DotError {
                    line: lnum,
                    msg: format!("Malformed edge statement: {}", line),
                });
            };
            cfg.add_edge(&caps[1], &caps[2]);
            continue;
        }
        // Graph attributes (label=..., rankdir=...) and braces.
    }
    if !seen_header {
        return Err(DotError {
            line: 0,
            msg: "No digraph found".to_owned(),
        });
    }
    Ok(cfg)
}
