//! Error types for the schema compiler

use std::path::PathBuf;

use thiserror::Error;

use crate::compile::{CompilationState, Phase};
use crate::repository::Location;

/// Result type for compiler operations
pub type Result<T> = std::result::Result<T, CompileError>;

/// Schema compiler errors
#[derive(Error, Debug)]
pub enum CompileError {
    #[error("Definition not found: {location}")]
    NotFound { location: Location },

    #[error("Cyclic inheritance in {phase} phase: {}", format_cycle(.cycle))]
    CyclicInheritance { phase: Phase, cycle: Vec<Location> },

    #[error("Cannot {step} a compilation in state {state}")]
    OutOfOrder {
        step: &'static str,
        state: CompilationState,
    },

    #[error("Incomplete schema: {} entities never reached the schema phase ({})", .missing.len(), .failures.join("; "))]
    IncompleteSchema {
        missing: Vec<Location>,
        failures: Vec<String>,
    },

    #[error("Invalid definition {}: {reason}", .path.display())]
    InvalidDefinition { path: PathBuf, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(#[from] config_crate::ConfigError),
}

impl CompileError {
    pub(crate) fn invalid(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        CompileError::InvalidDefinition {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

fn format_cycle(cycle: &[Location]) -> String {
    cycle
        .iter()
        .map(|l| l.to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
