use crate::core::io::molfile::MolfileError;
use crate::core::models::structure::StructureError;
use std::path::PathBuf;
use thiserror::Error;

/// Fatal failures while loading a structural unit.
#[derive(Debug, Error)]
pub enum UnitError {
    #[error("Failed to parse structure from '{source_id}': {source}")]
    Parse {
        source_id: String,
        source: MolfileError,
    },

    #[error("Failed to write heavy structure to '{}': {source}", path.display())]
    Io { path: PathBuf, source: MolfileError },
}

/// Non-fatal diagnostics recorded on a structural unit.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UnitWarning {
    #[error("No functional group name occurs in '{source_id}'; the heavy form equals the raw form")]
    NoGroupMatched { source_id: String },

    #[error("Several functional groups occur in '{source_id}'; using '{chosen}', ignoring {others:?}")]
    AmbiguousIdentifier {
        source_id: String,
        chosen: String,
        others: Vec<String>,
    },
}

/// Failures of a topology while placing and bonding units.
#[derive(Debug, Error)]
pub enum AssemblyError {
    #[error("{topology} needs {role} units with {expected} bonders, but '{unit}' has {found}")]
    ConnectivityMismatch {
        topology: &'static str,
        role: &'static str,
        unit: String,
        expected: usize,
        found: usize,
    },

    #[error("Linker bonder {atom} on edge {edge} has no free building block bonder to pair with")]
    UnpairedBonder { edge: usize, atom: usize },

    #[error("Failed to write assembled structure to '{}': {source}", path.display())]
    Io { path: PathBuf, source: MolfileError },

    #[error("Internal logic error: {0}")]
    Internal(String),
}

impl From<StructureError> for AssemblyError {
    fn from(err: StructureError) -> Self {
        Self::Internal(err.to_string())
    }
}

#[derive(Debug, Error)]
pub enum CageError {
    #[error(transparent)]
    Unit(#[from] UnitError),

    #[error(transparent)]
    Assembly(#[from] AssemblyError),
}

/// Returned when ordering cages whose fitness has not been assigned.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("Cannot compare cages before fitness is assigned to both")]
pub struct UnscoredComparisonError;

/// Failures while converting between cages and their persisted records.
#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Invalid cage record JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid cage record: {0}")]
    Composition(String),

    #[error("Record refers to unknown functional group '{0}'")]
    UnknownGroup(String),

    #[error("Record key does not match its building blocks (stored {stored}, computed {computed})")]
    KeyMismatch { stored: String, computed: String },

    #[error("Invalid bonder ids: {0}")]
    InvalidBonderIds(String),

    #[error("Placeholder cages carry no structures and cannot be persisted")]
    Placeholder,

    #[error("Invalid structure in record: {0}")]
    Structure(#[from] StructureError),

    #[error(transparent)]
    Unit(#[from] UnitError),
}
