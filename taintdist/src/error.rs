// SPDX-FileCopyrightText: 2024 Rot127 <unisono@quyllur.org>
// SPDX-License-Identifier: LGPL-3.0-only

use std::path::PathBuf;

use thiserror::Error;

/// Fatal errors. They only occur while reading the inputs
/// or writing the result. Problems during the analysis itself
/// are absorbed by the walker.
#[derive(Debug, Error)]
pub enum AnalysisError {
    #[error("Input path {0} does not exist or has the wrong type")]
    MissingPath(PathBuf),

    #[error("Failed to access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("{path}:{line}: {msg}")]
    Dot {
        path: PathBuf,
        line: usize,
        msg: String,
    },

    #[error("Malformed location '{0}'. Expected '<file>:<line>'")]
    Location(String),
}

impl AnalysisError {
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> AnalysisError {
        AnalysisError::Io {
            path: path.into(),
            source,
        }
    }
}

pub type AnalysisResult<T> = Result<T, AnalysisError>;
