// src/db/mod.rs

//! The embedded relational store.
//!
//! `RomDb` wraps one exclusive SQLite connection. Opening registers
//! the project collation and probes the schema; a file that is not a
//! romdb database is rejected rather than repaired. Reconstruction
//! (`get_file`) lives here because it is pure read-through: fetch,
//! decompress, apply the delta chain.

pub mod models;
pub mod schema;

use crate::codec::{self, Compression};
use crate::collate;
use crate::error::{Error, Result};
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::collections::HashSet;
use std::path::Path;
use tracing::warn;

/// Canonical single-row-by-id probes; a file is a romdb database iff
/// every one of them prepares cleanly.
const VALIDITY_PROBES: &[&str] = &[
    "SELECT id, name, code FROM system WHERE id = -1",
    "SELECT id, name, system_id FROM media WHERE id = -1",
    "SELECT id, name, data, size, compression, media_id, parent_id FROM file WHERE id = -1",
    "SELECT file_id, name, data FROM checksum WHERE file_id = -1",
    "SELECT id, name, value FROM tag WHERE id = -1",
    "SELECT tag_id, media_id FROM mediatag WHERE tag_id = -1",
    "SELECT tag_id, file_id FROM filetag WHERE tag_id = -1",
];

/// Register the case-insensitive natural collation under the name SQL
/// queries refer to (`natural_nocase`).
pub fn register_collation(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_collation("natural_nocase", |a, b| collate::compare(a, b))
}

fn is_valid(conn: &Connection) -> bool {
    VALIDITY_PROBES.iter().all(|sql| conn.prepare(sql).is_ok())
}

/// An open romdb database.
pub struct RomDb {
    conn: Connection,
}

impl RomDb {
    /// Open an existing database read-write. Fails with
    /// [`Error::InvalidDatabase`] when the file is absent or does not
    /// carry the romdb schema.
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open_with_flags(path, OpenFlags::SQLITE_OPEN_READ_WRITE)
            .map_err(|_| Error::InvalidDatabase)?;
        Self::finish_open(conn)
    }

    /// Open a database, creating the file and schema when absent. A
    /// schema file, when given, supplies the DDL instead of the
    /// built-in default. An existing non-romdb file is rejected.
    pub fn open_or_create(path: &Path, schema_path: Option<&Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|_| Error::InvalidDatabase)?;
        schema::ensure_schema(&conn, schema_path)?;
        Self::finish_open(conn)
    }

    fn finish_open(conn: Connection) -> Result<Self> {
        register_collation(&conn)?;
        if !is_valid(&conn) {
            return Err(Error::InvalidDatabase);
        }
        Ok(Self { conn })
    }

    /// The underlying connection, for sibling modules and tooling.
    pub fn connection(&self) -> &Connection {
        &self.conn
    }

    /// Reconstruct the original bytes of a file: fetch its row,
    /// decompress the payload, then apply the delta chain from the
    /// root parent down. Missing rows and broken chains reconstruct
    /// as empty rather than failing the caller.
    pub fn get_file(&self, file_id: i64) -> Result<Vec<u8>> {
        // payloads of delta rows on the walk up to the root, child first
        let mut patches: Vec<(Vec<u8>, usize)> = Vec::new();
        let mut seen = HashSet::new();
        let mut next = Some(file_id);
        let mut bytes = Vec::new();

        while let Some(id) = next {
            if !seen.insert(id) {
                warn!(file_id, "parent chain loops, returning empty");
                return Ok(Vec::new());
            }
            let Some((data, size, compression, parent_id)) = self
                .conn
                .query_row(
                    "SELECT data, size, compression, parent_id FROM file WHERE id = ?1",
                    [id],
                    |row| {
                        Ok((
                            row.get::<_, Option<Vec<u8>>>(0)?,
                            row.get::<_, i64>(1)?,
                            row.get::<_, Option<String>>(2)?,
                            row.get::<_, Option<i64>>(3)?,
                        ))
                    },
                )
                .optional()?
            else {
                warn!(file_id = id, "file row missing while reconstructing");
                return Ok(Vec::new());
            };

            let data = data.unwrap_or_default();
            let size = size.max(0) as usize;
            let algorithm = compression
                .as_deref()
                .and_then(|name| name.parse::<Compression>().ok());
            let payload = match algorithm {
                Some(algorithm) => codec::decompress(&data, size, algorithm),
                None => data,
            };

            match parent_id {
                Some(parent) => {
                    patches.push((payload, size));
                    next = Some(parent);
                }
                None => {
                    bytes = payload;
                    next = None;
                }
            }
        }

        while let Some((patch, size)) = patches.pop() {
            bytes = codec::apply_patch(&bytes, &patch, size);
        }
        Ok(bytes)
    }
}
