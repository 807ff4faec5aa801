//! Error taxonomy for building and loading CauseNet files.
//!
//! Lookup misses (unknown concept, missing edge) are not errors: they are
//! reported as `None` or as empty sequences by the reader.

use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, CausenetError>;

#[derive(Debug, thiserror::Error)]
pub enum CausenetError {
    /// A relation named a concept with an empty name.
    #[error("concept names must not be empty")]
    EmptyConceptName,

    /// Strings are stored NUL-terminated, so they cannot contain NUL.
    #[error("{field} contains an interior NUL byte")]
    NulInString { field: &'static str },

    #[error("invalid source type: {0}")]
    UnknownSourceType(String),

    #[error("invalid source type tag: {0}")]
    UnknownSourceTag(u8),

    #[error("concept count exceeds the sentinel-free 32-bit index range")]
    TooManyConcepts,

    #[error("edge {cause} -> {effect} has more supports than fit in 32 bits")]
    TooManySupports { cause: u32, effect: u32 },

    /// The record source failed before producing a relation.
    #[error("invalid input record: {0}")]
    Input(#[source] Box<dyn std::error::Error + Send + Sync>),

    /// A write to the staging files failed partway through a record.
    #[error("writer is unusable after a failed write: {0}")]
    Poisoned(String),

    #[error("cannot load dataset {path}: {source}")]
    CannotLoad {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt causenet file: {0}")]
    Corrupt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CausenetError {
    pub(crate) fn corrupt(msg: impl Into<String>) -> Self {
        Self::Corrupt(msg.into())
    }
}
