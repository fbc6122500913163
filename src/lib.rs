// src/lib.rs

//! romdb — content-addressed archival database for ROM collections.
//!
//! Collections are organized by emulated system and by per-title
//! media. Files are stored compressed (deflate or xz) and, within a
//! media group, as VCDIFF deltas against a parent file, with per-file
//! checksums guarding integrity. Import reads a declarative directory
//! of plain-text manifests plus a pool of source files; dump
//! reconstructs a byte-exact directory tree from the database.
//!
//! # Architecture
//!
//! - Single embedded SQLite database, exclusive per process
//! - Manifest-driven: imports are deterministic and replayable
//! - Longest-prefix grouping maps raw files onto media, so manifests
//!   never spell out a file-to-media mapping
//! - Delta storage: a child row stores the (optionally compressed)
//!   VCDIFF patch against its parent's reconstructed bytes

pub mod codec;
pub mod collate;
pub mod db;
mod dump;
mod error;
pub mod grouping;
pub mod hash;
mod import;
pub mod manifest;
mod verify;

pub use codec::Compression;
pub use db::RomDb;
pub use error::{Error, Result};
pub use hash::HashAlgorithm;
pub use verify::SystemReport;
