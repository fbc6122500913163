// src/verify.rs

//! Stored-payload verification.
//!
//! Verify recomputes each file's recorded digest from what the
//! database actually stores (decompressed, with no delta applied) and
//! compares it against the checksum row. It detects storage
//! corruption; end-to-end validity of reconstructed files is a
//! different check, exercised by the round-trip tests.

use crate::codec::{self, Compression};
use crate::db::models::{Checksum, System};
use crate::db::RomDb;
use crate::error::Result;
use crate::hash::{self, HashAlgorithm};

/// Per-system verification tally.
#[derive(Debug, Default)]
pub struct SystemReport {
    pub code: String,
    pub name: String,
    pub files_good: u64,
    pub files_bad: u64,
    pub files_no_checksum: u64,
    pub bad_files: Vec<String>,
}

impl RomDb {
    /// Verify every file carrying a checksum row, one system at a
    /// time. Only the first checksum in descending algorithm-name
    /// order is checked per file; a file with no checksum rows counts
    /// separately. Mismatches are reported, never fatal.
    pub fn verify(&self) -> Result<Vec<SystemReport>> {
        let conn = self.connection();
        let mut reports = Vec::new();

        for system in System::list_all(conn)? {
            let mut report = SystemReport {
                code: system.code,
                name: system.name,
                ..Default::default()
            };

            let mut media_stmt = conn.prepare("SELECT id FROM media WHERE system_id = ?1")?;
            let media_ids = media_stmt
                .query_map([system.id], |row| row.get::<_, i64>(0))?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            for media_id in media_ids {
                let mut file_stmt = conn.prepare(
                    "SELECT id, name, data, size, compression FROM file WHERE media_id = ?1",
                )?;
                let files = file_stmt
                    .query_map([media_id], |row| {
                        Ok((
                            row.get::<_, i64>(0)?,
                            row.get::<_, String>(1)?,
                            row.get::<_, Option<Vec<u8>>>(2)?,
                            row.get::<_, i64>(3)?,
                            row.get::<_, Option<String>>(4)?,
                        ))
                    })?
                    .collect::<std::result::Result<Vec<_>, _>>()?;

                for (file_id, name, data, size, compression) in files {
                    let Some((algorithm_name, recorded)) = Checksum::first_for_file(conn, file_id)?
                    else {
                        report.files_no_checksum += 1;
                        continue;
                    };

                    let data = data.unwrap_or_default();
                    let payload = match compression
                        .as_deref()
                        .and_then(|c| c.parse::<Compression>().ok())
                    {
                        Some(algorithm) => {
                            codec::decompress(&data, size.max(0) as usize, algorithm)
                        }
                        None => data,
                    };
                    let computed = match algorithm_name.parse::<HashAlgorithm>() {
                        Ok(algorithm) => hash::hash_bytes(algorithm, &payload),
                        Err(_) => String::new(),
                    };

                    if computed == recorded {
                        report.files_good += 1;
                    } else {
                        report.files_bad += 1;
                        report.bad_files.push(name);
                    }
                }
            }
            reports.push(report);
        }
        Ok(reports)
    }
}
