//! Dictionary lookup service.
//!
//! `Dictionary` is the read-only collaborator the composition session and the
//! output injector query. `TableDictionary` is the in-memory implementation,
//! built from tab-separated sources or loaded from the `Q9DX` binary format.

pub mod source;
mod table;
mod table_io;

pub use table::{DictStats, TableDictionary};

use std::io;

#[derive(Debug, thiserror::Error)]
pub enum DictError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    #[error("invalid header (too short)")]
    InvalidHeader,

    #[error("invalid magic bytes (expected Q9DX)")]
    InvalidMagic,

    #[error("unsupported version: {0}")]
    UnsupportedVersion(u8),

    #[error("serialization error: {0}")]
    Serialize(bincode::Error),

    #[error("deserialization error: {0}")]
    Deserialize(bincode::Error),

    #[error("parse error: {0}")]
    Parse(String),
}

pub trait Dictionary: Send + Sync {
    /// Candidates for a 1-3 digit code, in stable order. `None` when unmapped.
    fn lookup_by_code(&self, code: &str) -> Option<Vec<String>>;

    /// Related words for a single character, in source order.
    fn lookup_related(&self, character: &str) -> Option<Vec<String>>;

    /// Per-character script conversion; identity when unmapped.
    fn convert_script(&self, character: &str, to_simplified: bool) -> String;

    /// Release any backing connection. Called once at shutdown.
    fn close(&self) {}
}
