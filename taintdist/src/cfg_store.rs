// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use petgraph::prelude::DiGraphMap;
use petgraph::Direction;
use petgraph::Direction::{Incoming, Outgoing};

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, warn};

/// Index of a node within one [FunctionCfg].
pub type NodeIdx = u32;

pub type FlowGraph = DiGraphMap<NodeIdx, ()>;

/// Node -> number of edges to/from the node the BFS started at.
/// Unreachable nodes are not part of it.
pub type Distances = BTreeMap<NodeIdx, u32>;

/// The control-flow graph of a single function.
///
/// Nodes carry two names. The structural name identifies the node in the
/// DOT file (e.g. `Node0x55d5c1a3b2c0`). The label is the name of the
/// basic block (e.g. `main.c:12`) and is what the rest of the analysis uses.
#[derive(Clone, Debug)]
pub struct FunctionCfg {
    name: String,
    graph: FlowGraph,
    /// Structural names. Indexed by [NodeIdx].
    node_names: Vec<String>,
    /// Block labels. Indexed by [NodeIdx].
    labels: Vec<Option<String>>,
    node_index: HashMap<String, NodeIdx>,
    label_index: HashMap<String, NodeIdx>,
}

impl FunctionCfg {
    pub fn new(name: &str) -> FunctionCfg {
        FunctionCfg {
            name: name.to_owned(),
            graph: FlowGraph::new(),
            node_names: Vec::new(),
            labels: Vec::new(),
            node_index: HashMap::new(),
            label_index: HashMap::new(),
        }
    }

    pub fn get_name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_owned();
    }

    pub fn get_graph(&self) -> &FlowGraph {
        &self.graph
    }

    /// Adds a node if it doesn't exist yet. A given label replaces a missing one.
    pub fn add_node(&mut self, node_name: &str, label: Option<&str>) -> NodeIdx {
        let idx = match self.node_index.get(node_name) {
            Some(idx) => *idx,
            None => {
                let idx = self.node_names.len() as NodeIdx;
                self.node_names.push(node_name.to_owned());
                self.labels.push(None);
                self.node_index.insert(node_name.to_owned(), idx);
                self.graph.add_node(idx);
                idx
            }
        };
        if let Some(label) = label {
            self.set_label(idx, label);
        }
        idx
    }

    fn set_label(&mut self, idx: NodeIdx, label: &str) {
        if let Some(other) = self.label_index.get(label) {
            if *other != idx {
                warn!(
                    "{}: label {} is used by {} and {}. Keeping {}.",
                    self.name,
                    label,
                    self.node_names[*other as usize],
                    self.node_names[idx as usize],
                    self.node_names[*other as usize]
                );
                return;
            }
        }
        self.labels[idx as usize] = Some(label.to_owned());
        self.label_index.insert(label.to_owned(), idx);
    }

    /// Adds the edge [from] -> [to]. Unknown nodes are added without a label.
    pub fn add_edge(&mut self, from: &str, to: &str) {
        let f = self.add_node(from, None);
        let t = self.add_node(to, None);
        self.graph.add_edge(f, t, ());
    }

    /// Resolves a block label to its node.
    pub fn resolve(&self, label: &str) -> Option<NodeIdx> {
        self.label_index.get(label).copied()
    }

    pub fn label(&self, node: NodeIdx) -> Option<&str> {
        self.labels.get(node as usize).and_then(|l| l.as_deref())
    }

    pub fn node_name(&self, node: NodeIdx) -> Option<&str> {
        self.node_names.get(node as usize).map(String::as_str)
    }

    /// Structural name of the node labeled [label].
    pub fn node_name_of(&self, label: &str) -> Option<&str> {
        self.resolve(label).and_then(|n| self.node_name(n))
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Unweighted shortest path lengths from [start].
    /// With [Outgoing] edges are followed, with [Incoming] they are followed in reverse.
    pub fn bfs(&self, start: NodeIdx, dir: Direction) -> Distances {
        let mut dist = Distances::new();
        if !self.graph.contains_node(start) {
            return dist;
        }
        dist.insert(start, 0);
        let mut queue = VecDeque::from([start]);
        while let Some(n) = queue.pop_front() {
            let d = dist[&n];
            for neigh in self.graph.neighbors_directed(n, dir) {
                if dist.contains_key(&neigh) {
                    continue;
                }
                dist.insert(neigh, d + 1);
                queue.push_back(neigh);
            }
        }
        dist
    }
}

/// All function CFGs of the program.
/// Distance queries are cached. The cache is filled on demand and
/// entries are never changed afterwards, so the store can be shared between threads.
#[derive(Default)]
pub struct CfgStore {
    graphs: HashMap<String, FunctionCfg>,
    distances: RwLock<HashMap<(String, NodeIdx, Direction), Arc<Distances>>>,
}

impl CfgStore {
    pub fn new() -> CfgStore {
        CfgStore::default()
    }

    /// Adds a CFG. A CFG with the same function name is replaced.
    pub fn insert(&mut self, cfg: FunctionCfg) {
        if self.graphs.contains_key(cfg.get_name()) {
            debug!("Replace CFG of {}", cfg.get_name());
        }
        self.distances
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|(f, _, _), _| f != cfg.get_name());
        self.graphs.insert(cfg.get_name().to_owned(), cfg);
    }

    pub fn get(&self, function: &str) -> Option<&FunctionCfg> {
        self.graphs.get(function)
    }

    pub fn len(&self) -> usize {
        self.graphs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.graphs.is_empty()
    }

    /// Node of block [label] in the CFG of [function].
    pub fn resolve(&self, function: &str, label: &str) -> Option<NodeIdx> {
        self.graphs.get(function).and_then(|cfg| cfg.resolve(label))
    }

    fn distances(&self, function: &str, node: NodeIdx, dir: Direction) -> Option<Arc<Distances>> {
        let cfg = self.graphs.get(function)?;
        if !cfg.get_graph().contains_node(node) {
            return None;
        }
        let key = (function.to_owned(), node, dir);
        if let Some(d) = self
            .distances
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&key)
        {
            return Some(d.clone());
        }
        let d = Arc::new(cfg.bfs(node, dir));
        let mut cache = self
            .distances
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        Some(cache.entry(key).or_insert(d).clone())
    }

    /// Distances of all nodes which can reach [target].
    pub fn distances_to(&self, function: &str, target: NodeIdx) -> Option<Arc<Distances>> {
        self.distances(function, target, Incoming)
    }

    /// Distances of all nodes reachable from [source].
    pub fn distances_from(&self, function: &str, source: NodeIdx) -> Option<Arc<Distances>> {
        self.distances(function, source, Outgoing)
    }

    /// Length of the shortest path [from] -> [to]. None if there is none.
    pub fn distance(&self, function: &str, from: NodeIdx, to: NodeIdx) -> Option<u32> {
        self.distances_from(function, from)?.get(&to).copied()
    }
}
