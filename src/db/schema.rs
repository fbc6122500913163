// src/db/schema.rs

//! Schema bootstrap for the romdb database.
//!
//! The schema is fixed: six entities (system, media, file, checksum,
//! tag and the two tag bridges) with declarative uniqueness so every
//! import statement can upsert with ON CONFLICT clauses. On first open
//! the store creates it, from a user-provided schema file when one is
//! given, otherwise from the built-in default.

use crate::error::Result;
use rusqlite::Connection;
use std::fs;
use std::path::Path;
use tracing::{debug, info};

/// Built-in schema, applied when no schema file is supplied.
pub const DEFAULT_SCHEMA: &str = "\
CREATE TABLE system(
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  code TEXT COLLATE NOCASE UNIQUE NOT NULL
);

CREATE TABLE media(
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  system_id INTEGER NOT NULL,
  FOREIGN KEY(system_id) REFERENCES system(id),
  UNIQUE(name, system_id)
);

CREATE INDEX media_name_idx ON media(name);
CREATE INDEX media_system_id_idx ON media(system_id);

CREATE TABLE file(
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  data BLOB,
  size INTEGER NOT NULL,
  compression TEXT,
  media_id INTEGER NOT NULL,
  parent_id INTEGER,
  FOREIGN KEY(media_id) REFERENCES media(id),
  FOREIGN KEY(parent_id) REFERENCES file(id),
  UNIQUE(name, media_id)
);

CREATE INDEX file_name_idx ON file(name);
CREATE INDEX file_media_id_idx ON file(media_id);
CREATE INDEX file_parent_id_idx ON file(parent_id);

CREATE TABLE checksum(
  file_id INTEGER,
  name TEXT NOT NULL,
  data TEXT NOT NULL,
  FOREIGN KEY(file_id) REFERENCES file(id),
  UNIQUE(file_id, name)
);

CREATE INDEX checksum_file_id_idx ON checksum(file_id);

CREATE TABLE tag(
  id INTEGER PRIMARY KEY,
  name TEXT NOT NULL,
  value TEXT,
  UNIQUE(name, value)
);

CREATE TABLE mediatag(
  tag_id INTEGER NOT NULL,
  media_id INTEGER NOT NULL,
  FOREIGN KEY(tag_id) REFERENCES tag(id),
  FOREIGN KEY(media_id) REFERENCES media(id),
  UNIQUE(tag_id, media_id)
);

CREATE INDEX mediatag_tag_id_idx ON mediatag(tag_id);
CREATE INDEX mediatag_media_id_idx ON mediatag(media_id);

CREATE TABLE filetag(
  tag_id INTEGER NOT NULL,
  file_id INTEGER NOT NULL,
  FOREIGN KEY(tag_id) REFERENCES tag(id),
  FOREIGN KEY(file_id) REFERENCES file(id),
  UNIQUE(tag_id, file_id)
);

CREATE INDEX filetag_tag_id_idx ON filetag(tag_id);
CREATE INDEX filetag_file_id_idx ON filetag(file_id);
";

/// Create the schema if the database holds no tables yet. Returns
/// whether the schema was created by this call.
pub fn ensure_schema(conn: &Connection, schema_path: Option<&Path>) -> Result<bool> {
    let tables: i64 = conn.query_row(
        "SELECT count(*) FROM sqlite_master WHERE type = 'table'",
        [],
        |row| row.get(0),
    )?;
    if tables != 0 {
        debug!(tables, "database already populated, leaving schema as is");
        return Ok(false);
    }

    let ddl = match schema_path {
        Some(path) if path.is_file() => {
            info!(path = %path.display(), "creating schema from file");
            fs::read_to_string(path)?
        }
        _ => DEFAULT_SCHEMA.to_string(),
    };
    conn.execute_batch(&ddl)?;
    Ok(true)
}
