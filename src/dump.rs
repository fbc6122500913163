// src/dump.rs

//! Regenerates a directory tree from the store.
//!
//! A short dump writes the reconstructed files straight under
//! `<dump_path>/<code>/`. A full dump writes them under
//! `<code>/files/` and regenerates the manifests (`system.txt`,
//! `media.txt`, `file.txt`, `patch.txt` and the tag directories) so
//! the output can be imported again. Short dumps carry no metadata
//! and do not round-trip.

use crate::db::models::{FileRow, Media, System};
use crate::db::RomDb;
use crate::error::Result;
use rusqlite::OptionalExtension;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

const FILETAG_SQL: &str = "\
SELECT * FROM (
  SELECT t.name || '.txt' tagfile, f.name name FROM tag t, file f, filetag ft, media m
   WHERE t.id = ft.tag_id AND f.id = ft.file_id AND f.media_id = m.id
   AND m.system_id = ?1 AND LENGTH(t.value) = 0
  UNION
  SELECT t.name || '.' || t.value || '.txt' tagfile, f.name name FROM tag t, file f, filetag ft, media m
   WHERE t.id = ft.tag_id AND f.id = ft.file_id AND f.media_id = m.id
   AND m.system_id = ?1 AND LENGTH(t.value) > 0
) ORDER BY tagfile, name COLLATE natural_nocase";

const MEDIATAG_SQL: &str = "\
SELECT * FROM (
  SELECT t.name || '.txt' tagfile, m.name name FROM tag t, media m, mediatag mt
   WHERE t.id = mt.tag_id AND m.id = mt.media_id
   AND m.system_id = ?1 AND LENGTH(t.value) = 0
  UNION
  SELECT t.name || '.' || t.value || '.txt' tagfile, m.name name FROM tag t, media m, mediatag mt
   WHERE t.id = mt.tag_id AND m.id = mt.media_id
   AND m.system_id = ?1 AND LENGTH(t.value) > 0
) ORDER BY tagfile, name COLLATE natural_nocase";

impl RomDb {
    /// Dump every system to `<dump_path>/<code>/`. Systems whose
    /// directory already holds anything are skipped.
    pub fn dump(&self, dump_path: &Path, full: bool) -> Result<bool> {
        if !dump_path.is_dir() {
            warn!(path = %dump_path.display(), "dump path is not a directory");
            return Ok(false);
        }
        for system in System::list_all(self.connection())? {
            let system_dir = dump_path.join(&system.code);
            fs::create_dir_all(&system_dir)?;
            if system_dir.read_dir()?.next().is_some() {
                info!(code = %system.code, "dump directory not empty, skipping");
                continue;
            }
            self.dump_system(&system, &system_dir, full)?;
        }
        Ok(true)
    }

    fn dump_system(&self, system: &System, system_dir: &Path, full: bool) -> Result<()> {
        let conn = self.connection();
        info!(code = %system.code, full, "dumping system");

        if full {
            let compression: Option<String> = conn
                .query_row(
                    "SELECT LOWER(compression) FROM file WHERE compression IS NOT NULL
                     AND media_id IN (SELECT id FROM media WHERE system_id = ?1) LIMIT 1",
                    [system.id],
                    |row| row.get(0),
                )
                .optional()?;
            let checksum: Option<String> = conn
                .query_row(
                    "SELECT LOWER(name) FROM checksum WHERE file_id IN
                     (SELECT id FROM file WHERE media_id IN
                      (SELECT id FROM media WHERE system_id = ?1)) LIMIT 1",
                    [system.id],
                    |row| row.get(0),
                )
                .optional()?;
            let text = format!(
                "{}\n{}\n{}\n{}\n",
                system.code,
                system.name,
                compression.as_deref().unwrap_or("none"),
                checksum.as_deref().unwrap_or("none"),
            );
            fs::write(system_dir.join("system.txt"), text)?;
        }

        let files_dir = if full {
            let dir = system_dir.join("files");
            fs::create_dir_all(&dir)?;
            dir
        } else {
            system_dir.to_path_buf()
        };

        let mut file_list = String::new();
        for file in FileRow::list_by_system(conn, system.id)? {
            let bytes = self.get_file(file.id)?;
            debug!(file = %file.name, size = bytes.len(), "writing file");
            fs::write(files_dir.join(&file.name), &bytes)?;
            file_list.push_str(&file.name);
            file_list.push('\n');
        }
        if !full {
            return Ok(());
        }
        fs::write(system_dir.join("file.txt"), file_list)?;

        // patch records grouped by parent, children in natural order
        let mut patch_text = String::new();
        let mut current_parent: Option<String> = None;
        let mut stmt = conn.prepare(
            "SELECT f2.name parent, f1.name name FROM file f1, file f2
             WHERE f1.parent_id IS NOT NULL AND f1.parent_id = f2.id
             AND f2.media_id IN (SELECT id FROM media WHERE system_id = ?1)
             ORDER BY parent COLLATE natural_nocase, name COLLATE natural_nocase",
        )?;
        let pairs = stmt.query_map([system.id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for pair in pairs {
            let (parent, child) = pair?;
            if current_parent.as_deref() != Some(parent.as_str()) {
                if current_parent.is_some() {
                    patch_text.push('\n');
                }
                patch_text.push_str(&parent);
                patch_text.push('\n');
                current_parent = Some(parent);
            }
            patch_text.push_str(&child);
            patch_text.push('\n');
        }
        fs::write(system_dir.join("patch.txt"), patch_text)?;

        let mut media_text = String::new();
        for name in Media::names_by_system(conn, system.id)? {
            media_text.push_str(&name);
            media_text.push('\n');
        }
        fs::write(system_dir.join("media.txt"), media_text)?;

        self.dump_tags(system.id, &system_dir.join("filetag"), FILETAG_SQL)?;
        self.dump_tags(system.id, &system_dir.join("mediatag"), MEDIATAG_SQL)
    }

    /// Write one `<tag>.txt` (or `<tag>.<value>.txt`) per distinct tag
    /// pair, listing every assigned file or media name.
    fn dump_tags(&self, system_id: i64, dir: &Path, sql: &str) -> Result<()> {
        let mut contents: BTreeMap<String, String> = BTreeMap::new();
        let mut stmt = self.connection().prepare(sql)?;
        let rows = stmt.query_map([system_id], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        for row in rows {
            let (tag_file, name) = row?;
            let entry = contents.entry(tag_file).or_default();
            entry.push_str(&name);
            entry.push('\n');
        }

        fs::create_dir_all(dir)?;
        for (tag_file, text) in contents {
            fs::write(dir.join(tag_file), text)?;
        }
        Ok(())
    }
}
