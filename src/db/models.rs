// src/db/models.rs

//! Typed upserts and queries over the romdb schema.
//!
//! Every write is declarative upsert-on-conflict, so replaying an
//! import over an existing database converges instead of failing.
//! Row ids are re-read through the unique key after each upsert
//! because `last_insert_rowid` is meaningless when the conflict arm
//! ran.

use crate::error::Result;
use rusqlite::{params, Connection, OptionalExtension};

/// A row of the `system` table.
#[derive(Debug, Clone)]
pub struct System {
    pub id: i64,
    pub name: String,
    pub code: String,
}

impl System {
    /// Insert the system unless its code is already taken (codes are
    /// case-insensitively unique) and return the surviving row.
    pub fn upsert(conn: &Connection, code: &str, name: &str) -> Result<System> {
        conn.execute(
            "INSERT INTO system (name, code) VALUES (?1, ?2) ON CONFLICT(code) DO NOTHING",
            params![name, code],
        )?;
        let system = conn.query_row(
            "SELECT id, name, code FROM system WHERE code = ?1",
            [code],
            |row| {
                Ok(System {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    code: row.get(2)?,
                })
            },
        )?;
        Ok(system)
    }

    pub fn list_all(conn: &Connection) -> Result<Vec<System>> {
        let mut stmt = conn.prepare("SELECT id, name, code FROM system")?;
        let systems = stmt
            .query_map([], |row| {
                Ok(System {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    code: row.get(2)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(systems)
    }
}

/// A row of the `media` table.
#[derive(Debug, Clone)]
pub struct Media {
    pub id: i64,
    pub name: String,
}

impl Media {
    pub fn upsert(conn: &Connection, name: &str, system_id: i64) -> Result<i64> {
        conn.execute(
            "INSERT INTO media (name, system_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            params![name, system_id],
        )?;
        let id = conn.query_row(
            "SELECT id FROM media WHERE name = ?1 AND system_id = ?2",
            params![name, system_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Media of a system in descending natural order: the grouping
    /// descent order that lets the longest matching prefix claim its
    /// files first.
    pub fn by_system_descending(conn: &Connection, system_id: i64) -> Result<Vec<Media>> {
        let mut stmt = conn.prepare(
            "SELECT id, name FROM media WHERE system_id = ?1
             ORDER BY name COLLATE natural_nocase DESC",
        )?;
        let media = stmt
            .query_map([system_id], |row| {
                Ok(Media {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(media)
    }

    /// Media names of a system in row order, as `media.txt` lists them.
    pub fn names_by_system(conn: &Connection, system_id: i64) -> Result<Vec<String>> {
        let mut stmt = conn.prepare("SELECT name FROM media WHERE system_id = ?1")?;
        let names = stmt
            .query_map([system_id], |row| row.get(0))?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(names)
    }
}

/// A row of the `file` table (id and name; payloads are fetched
/// separately by the reconstruction walk).
#[derive(Debug, Clone)]
pub struct FileRow {
    pub id: i64,
    pub name: String,
}

impl FileRow {
    /// Insert a file row. `data` is `None` for a deferred patch child
    /// (and for zero-length files); the patch pass fills it in later.
    pub fn insert(
        conn: &Connection,
        name: &str,
        data: Option<&[u8]>,
        size: i64,
        compression: Option<&str>,
        media_id: i64,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO file (name, data, size, compression, media_id)
             VALUES (?1, ?2, ?3, ?4, ?5) ON CONFLICT(name, media_id) DO NOTHING",
            params![name, data, size, compression, media_id],
        )?;
        let id = conn.query_row(
            "SELECT id FROM file WHERE name = ?1 AND media_id = ?2",
            params![name, media_id],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    /// Rewrite a deferred child with its patch payload and parent
    /// link. `parent_id` is `None` when delta encoding fell back to
    /// plain storage.
    pub fn update_patch(
        conn: &Connection,
        id: i64,
        data: &[u8],
        compression: Option<&str>,
        parent_id: Option<i64>,
    ) -> Result<()> {
        conn.execute(
            "UPDATE file SET data = ?2, compression = ?3, parent_id = ?4 WHERE id = ?1",
            params![id, data, compression, parent_id],
        )?;
        Ok(())
    }

    /// Cross-system parent lookup: any file of that name owned by a
    /// different system.
    pub fn find_in_other_system(
        conn: &Connection,
        name: &str,
        system_id: i64,
    ) -> Result<Option<i64>> {
        let id = conn
            .query_row(
                "SELECT id FROM file WHERE name = ?1 COLLATE NOCASE AND media_id NOT IN
                 (SELECT id FROM media WHERE system_id = ?2) LIMIT 1",
                params![name, system_id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn list_by_system(conn: &Connection, system_id: i64) -> Result<Vec<FileRow>> {
        let mut stmt = conn.prepare(
            "SELECT id, name FROM file WHERE media_id IN
             (SELECT id FROM media WHERE system_id = ?1)",
        )?;
        let files = stmt
            .query_map([system_id], |row| {
                Ok(FileRow {
                    id: row.get(0)?,
                    name: row.get(1)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(files)
    }
}

/// Upserts for the `tag` table and its bridges.
pub struct Tag;

impl Tag {
    /// `value` is the empty string for bare tags; `(name, value)` is
    /// unique.
    pub fn upsert(conn: &Connection, name: &str, value: &str) -> Result<i64> {
        conn.execute(
            "INSERT INTO tag (name, value) VALUES (?1, ?2) ON CONFLICT(name, value) DO NOTHING",
            params![name, value],
        )?;
        let id = conn.query_row(
            "SELECT id FROM tag WHERE name = ?1 AND value = ?2",
            params![name, value],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn link_media(conn: &Connection, tag_id: i64, media_id: i64) -> Result<()> {
        conn.execute(
            "INSERT INTO mediatag (tag_id, media_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            params![tag_id, media_id],
        )?;
        Ok(())
    }

    pub fn link_file(conn: &Connection, tag_id: i64, file_id: i64) -> Result<()> {
        conn.execute(
            "INSERT INTO filetag (tag_id, file_id) VALUES (?1, ?2) ON CONFLICT DO NOTHING",
            params![tag_id, file_id],
        )?;
        Ok(())
    }
}

/// Upserts and lookups for the `checksum` table.
pub struct Checksum;

impl Checksum {
    pub fn upsert(conn: &Connection, file_id: i64, name: &str, hex: &str) -> Result<()> {
        conn.execute(
            "INSERT INTO checksum (file_id, name, data) VALUES (?1, ?2, ?3)
             ON CONFLICT(file_id, name) DO UPDATE SET data = excluded.data",
            params![file_id, name, hex],
        )?;
        Ok(())
    }

    /// The verification digest for a file: the first checksum row in
    /// descending algorithm-name order, lowercased.
    pub fn first_for_file(conn: &Connection, file_id: i64) -> Result<Option<(String, String)>> {
        let row = conn
            .query_row(
                "SELECT LOWER(name), LOWER(data) FROM checksum WHERE file_id = ?1
                 ORDER BY name DESC LIMIT 1",
                [file_id],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{register_collation, schema};

    fn test_conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        register_collation(&conn).unwrap();
        schema::ensure_schema(&conn, None).unwrap();
        conn
    }

    #[test]
    fn system_upsert_converges_on_code() {
        let conn = test_conn();
        let first = System::upsert(&conn, "snes", "Super NES").unwrap();
        let second = System::upsert(&conn, "SNES", "Renamed").unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.name, "Super NES");
    }

    #[test]
    fn media_descending_order_is_natural() {
        let conn = test_conn();
        let system = System::upsert(&conn, "sys", "System").unwrap();
        for name in ["Game 2", "Game 10", "game 2 extras"] {
            Media::upsert(&conn, name, system.id).unwrap();
        }
        let order: Vec<String> = Media::by_system_descending(&conn, system.id)
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        assert_eq!(order, vec!["Game 10", "game 2 extras", "Game 2"]);
    }

    #[test]
    fn file_upsert_is_idempotent_per_media() {
        let conn = test_conn();
        let system = System::upsert(&conn, "sys", "System").unwrap();
        let media_id = Media::upsert(&conn, "Game", system.id).unwrap();
        let a = FileRow::insert(&conn, "Game.rom", Some(b"xy".as_slice()), 2, None, media_id).unwrap();
        let b = FileRow::insert(&conn, "Game.rom", Some(b"other".as_slice()), 5, None, media_id).unwrap();
        assert_eq!(a, b);
        let size: i64 = conn
            .query_row("SELECT size FROM file WHERE id = ?1", [a], |row| row.get(0))
            .unwrap();
        assert_eq!(size, 2);
    }

    #[test]
    fn cross_system_lookup_skips_own_system() {
        let conn = test_conn();
        let sys_a = System::upsert(&conn, "a", "A").unwrap();
        let sys_b = System::upsert(&conn, "b", "B").unwrap();
        let media_a = Media::upsert(&conn, "Shared", sys_a.id).unwrap();
        let media_b = Media::upsert(&conn, "Shared", sys_b.id).unwrap();
        let file_a = FileRow::insert(&conn, "Shared.rom", Some(b"AAAA".as_slice()), 4, None, media_a).unwrap();
        let file_b = FileRow::insert(&conn, "shared.ROM", None, 4, None, media_b).unwrap();

        let found = FileRow::find_in_other_system(&conn, "Shared.rom", sys_b.id).unwrap();
        assert_eq!(found, Some(file_a));
        assert_ne!(found, Some(file_b));
        assert_eq!(
            FileRow::find_in_other_system(&conn, "Missing.rom", sys_b.id).unwrap(),
            None
        );
    }

    #[test]
    fn checksum_upsert_overwrites() {
        let conn = test_conn();
        let system = System::upsert(&conn, "sys", "System").unwrap();
        let media_id = Media::upsert(&conn, "Game", system.id).unwrap();
        let file_id = FileRow::insert(&conn, "Game.rom", Some(b"xy".as_slice()), 2, None, media_id).unwrap();
        Checksum::upsert(&conn, file_id, "sha256", "aa").unwrap();
        Checksum::upsert(&conn, file_id, "sha256", "bb").unwrap();
        Checksum::upsert(&conn, file_id, "crc32", "cc").unwrap();
        let (name, data) = Checksum::first_for_file(&conn, file_id).unwrap().unwrap();
        assert_eq!((name.as_str(), data.as_str()), ("sha256", "bb"));
    }

    #[test]
    fn tag_pairs_are_unique() {
        let conn = test_conn();
        let a = Tag::upsert(&conn, "region", "usa").unwrap();
        let b = Tag::upsert(&conn, "region", "usa").unwrap();
        let c = Tag::upsert(&conn, "region", "").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }
}
