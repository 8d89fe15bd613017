// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

pub mod analysis;
pub mod cfg_store;
pub mod dot;
pub mod error;
pub mod fitness;
pub mod loader;
pub mod location;
pub mod program;
pub mod propagator;
pub mod state;
pub mod walker;
mod test_cfg_store;
mod test_dot;
mod test_fitness;
#[cfg(test)]
mod test_graphs;
mod test_loader;
mod test_propagator;
mod test_walker;
