// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{AnalysisError, AnalysisResult};

/// Fitness of a block tainted at [distance].
pub fn fitness(distance: u32) -> f64 {
    1.0 / (1.0 + distance as f64)
}

/// Block name -> one fitness value per seed.
/// Cells only ever grow.
#[derive(Clone, Debug, PartialEq)]
pub struct FitnessTable {
    num_seeds: usize,
    cells: BTreeMap<String, Vec<f64>>,
}

impl FitnessTable {
    pub fn new(num_seeds: usize) -> FitnessTable {
        FitnessTable {
            num_seeds,
            cells: BTreeMap::new(),
        }
    }

    pub fn num_seeds(&self) -> usize {
        self.num_seeds
    }

    /// Raises the cell of ([block], [seed_idx]) to the fitness of [distance].
    /// Returns true if the cell changed.
    pub fn update(&mut self, block: &str, seed_idx: usize, distance: u32) -> bool {
        assert!(
            seed_idx < self.num_seeds,
            "Seed index {} out of range. Table has {} seeds.",
            seed_idx,
            self.num_seeds
        );
        let value = fitness(distance);
        let num_seeds = self.num_seeds;
        let vec = self
            .cells
            .entry(block.to_owned())
            .or_insert_with(|| vec![0.0; num_seeds]);
        if vec[seed_idx] < value {
            vec[seed_idx] = value;
            return true;
        }
        false
    }

    pub fn get(&self, block: &str, seed_idx: usize) -> f64 {
        self.cells
            .get(block)
            .and_then(|v| v.get(seed_idx))
            .copied()
            .unwrap_or(0.0)
    }

    pub fn row(&self, block: &str) -> Option<&[f64]> {
        self.cells.get(block).map(|v| v.as_slice())
    }

    pub fn blocks(&self) -> impl Iterator<Item = &str> {
        self.cells.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Per cell maximum of both tables.
    pub fn merge(&mut self, other: &FitnessTable) {
        assert_eq!(self.num_seeds, other.num_seeds, "Seed count mismatch.");
        for (block, row) in other.cells.iter() {
            let mine = self
                .cells
                .entry(block.clone())
                .or_insert_with(|| vec![0.0; row.len()]);
            for (m, o) in mine.iter_mut().zip(row.iter()) {
                if *o > *m {
                    *m = *o;
                }
            }
        }
    }

    /// Mean over the positive cells of every block.
    /// Blocks without any positive cell are left out.
    pub fn aggregate(&self) -> BlockScores {
        let mut scores = BlockScores::new();
        for (block, row) in self.cells.iter() {
            if let Some(mean) = positive_mean(row) {
                scores.insert(block.clone(), mean);
            }
        }
        scores
    }
}

pub type BlockScores = BTreeMap<String, f64>;

/// Arithmetic mean of the values > 0. None if there are none.
pub fn positive_mean(values: &[f64]) -> Option<f64> {
    let (sum, cnt) = values
        .iter()
        .filter(|v| **v > 0.0)
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    if cnt == 0 {
        return None;
    }
    Some(sum / cnt as f64)
}

/// Writes one `<block>,<score>` line per block.
pub fn write_scores<W: Write>(scores: &BlockScores, out: &mut W) -> std::io::Result<()> {
    for (block, score) in scores.iter() {
        writeln!(out, "{},{}", block, score)?;
    }
    Ok(())
}

pub fn write_scores_to_file(scores: &BlockScores, path: &Path) -> AnalysisResult<()> {
    let file = File::create(path).map_err(|e| AnalysisError::io(path, e))?;
    let mut out = BufWriter::new(file);
    write_scores(scores, &mut out).map_err(|e| AnalysisError::io(path, e))?;
    out.flush().map_err(|e| AnalysisError::io(path, e))
}
