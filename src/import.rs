// src/import.rs

//! The manifest-driven import pipeline.
//!
//! Per system the passes run in strict order: system row, media and
//! media tags, patch pre-read, files (grouped to media by prefix),
//! then patches. Files named by `patch.txt` as children are inserted
//! with a NULL payload during the file pass and rewritten as deltas by
//! the patch pass. Each statement stands alone; a crash mid-import
//! leaves a partially populated but structurally valid database.

use crate::codec;
use crate::collate::{NaturalKey, NaturalMap, NaturalSet};
use crate::db::models::{Checksum, FileRow, Media, System, Tag};
use crate::db::RomDb;
use crate::error::Result;
use crate::grouping;
use crate::hash;
use crate::manifest::{self, PatchSet, SystemManifest, TagMap};
use std::fs;
use std::path::Path;
use tracing::{debug, info, warn};

/// Patch bookkeeping threaded through the file pass: the declared
/// parent/child pairs plus the row ids assigned while inserting.
struct PatchWork {
    set: PatchSet,
    child_ids: NaturalMap<i64>,
}

impl RomDb {
    /// Import with the default pool location `<import_path>/files`.
    pub fn import(&self, import_path: &Path, config: &str) -> Result<bool> {
        self.import_from_pool(&import_path.join("files"), import_path, config)
    }

    /// Import one system directory, or every system listed by
    /// `systems.txt`. Returns whether any system imported. A system
    /// with missing or short manifests is skipped with a warning while
    /// the remaining systems proceed.
    pub fn import_from_pool(
        &self,
        roms_path: &Path,
        import_path: &Path,
        config: &str,
    ) -> Result<bool> {
        if !roms_path.is_dir() {
            warn!(path = %roms_path.display(), "roms path is not a directory");
            return Ok(false);
        }
        if !import_path.is_dir() {
            warn!(path = %import_path.display(), "import path is not a directory");
            return Ok(false);
        }

        if let Some(systems) = manifest::read_systems_list(import_path, config) {
            let mut any = false;
            for line in systems {
                if line.is_empty() {
                    continue;
                }
                let system_path = import_path.join(&line);
                if !system_path.is_dir() {
                    continue;
                }
                any |= self.try_import_system(roms_path, &system_path, config)?;
            }
            return Ok(any);
        }
        self.try_import_system(roms_path, import_path, config)
    }

    fn try_import_system(
        &self,
        roms_path: &Path,
        import_path: &Path,
        config: &str,
    ) -> Result<bool> {
        match self.import_system(roms_path, import_path, config) {
            Ok(()) => Ok(true),
            Err(err) if err.is_system_abort() => {
                warn!(path = %import_path.display(), %err, "system import aborted");
                Ok(false)
            }
            Err(err) => Err(err),
        }
    }

    fn import_system(&self, roms_path: &Path, import_path: &Path, config: &str) -> Result<()> {
        let conn = self.connection();

        let system_manifest = manifest::read_system(import_path, config)?;
        let system = System::upsert(conn, &system_manifest.code, &system_manifest.name)?;
        info!(code = %system.code, id = system.id, "importing system");

        let media_lines = manifest::read_media(import_path, config)?;
        let media_tags = manifest::read_tags(&import_path.join("mediatag"));
        for name in &media_lines {
            if name.is_empty() {
                continue;
            }
            let media_id = Media::upsert(conn, name, system.id)?;
            if let Some(tags) = media_tags.get(&NaturalKey::from(name.as_str())) {
                for (tag_name, value) in tags {
                    let tag_id = Tag::upsert(conn, tag_name.as_str(), value)?;
                    Tag::link_media(conn, tag_id, media_id)?;
                }
            }
        }

        let mut patch_work = PatchWork {
            set: manifest::read_patches(import_path, config),
            child_ids: NaturalMap::new(),
        };

        let file_lines = manifest::read_files(import_path, config)?;
        let file_tags = manifest::read_tags(&import_path.join("filetag"));
        let mut working: NaturalSet = file_lines
            .into_iter()
            .filter(|line| !line.is_empty())
            .map(NaturalKey::from)
            .collect();

        for media in Media::by_system_descending(conn, system.id)? {
            for file_name in grouping::claim_files(&mut working, &media.name) {
                let imported = self.import_file(
                    roms_path,
                    &system_manifest,
                    media.id,
                    &file_name,
                    &mut patch_work,
                    &file_tags,
                );
                if let Err(err) = imported {
                    warn!(file = %file_name, %err, "file import failed, skipping");
                }
            }
        }

        self.import_patches(roms_path, &system_manifest, system.id, &patch_work)
    }

    fn import_file(
        &self,
        roms_path: &Path,
        system_manifest: &SystemManifest,
        media_id: i64,
        file_name: &str,
        patch_work: &mut PatchWork,
        file_tags: &TagMap,
    ) -> Result<()> {
        let conn = self.connection();
        let file_path = roms_path.join(file_name);
        if !file_path.is_file() {
            debug!(file = %file_name, "not in the file pool, skipping");
            return Ok(());
        }

        let file_id = if patch_work.set.is_child(file_name) {
            // payload deferred to the patch pass
            let size = fs::metadata(&file_path)?.len() as i64;
            let file_id = FileRow::insert(conn, file_name, None, size, None, media_id)?;
            patch_work
                .child_ids
                .insert(NaturalKey::from(file_name), file_id);
            if let Some(algorithm) = system_manifest.hash {
                let digest = hash::hash_bytes(algorithm, &[]);
                Checksum::upsert(conn, file_id, algorithm.name(), &digest)?;
            }
            file_id
        } else {
            let raw = fs::read(&file_path)?;
            let size = raw.len() as i64;
            let compressed = system_manifest
                .compression
                .and_then(|algorithm| codec::compress(&raw, algorithm).map(|out| (out, algorithm)));
            let (stored, compression) = match &compressed {
                Some((out, algorithm)) => (out.as_slice(), Some(algorithm.name())),
                None => (raw.as_slice(), None),
            };
            let data = (!stored.is_empty()).then_some(stored);
            let file_id = FileRow::insert(conn, file_name, data, size, compression, media_id)?;
            if let Some(algorithm) = system_manifest.hash {
                let digest = hash::hash_bytes(algorithm, &raw);
                Checksum::upsert(conn, file_id, algorithm.name(), &digest)?;
            }
            file_id
        };

        // same-system parent resolution for the patch pass
        if let Some(slot) = patch_work.set.parents.get_mut(&NaturalKey::from(file_name)) {
            *slot = Some(file_id);
        }

        if let Some(tags) = file_tags.get(&NaturalKey::from(file_name)) {
            for (tag_name, value) in tags {
                let tag_id = Tag::upsert(conn, tag_name.as_str(), value)?;
                Tag::link_file(conn, tag_id, file_id)?;
            }
        }
        Ok(())
    }

    fn import_patches(
        &self,
        roms_path: &Path,
        system_manifest: &SystemManifest,
        system_id: i64,
        patch_work: &PatchWork,
    ) -> Result<()> {
        let conn = self.connection();

        for (child, parent_name) in &patch_work.set.parent_of {
            let Some(&child_id) = patch_work.child_ids.get(child) else {
                continue;
            };

            // same-system resolution first, then any other system; a
            // child can never serve as its own parent
            let mut parent_id = patch_work
                .set
                .parents
                .get(&NaturalKey::from(parent_name.as_str()))
                .copied()
                .flatten();
            if parent_id == Some(child_id) {
                parent_id = None;
            }
            if parent_id.is_none() {
                parent_id = FileRow::find_in_other_system(conn, parent_name, system_id)?;
            }
            let Some(parent_id) = parent_id else {
                warn!(
                    child = %child.as_str(),
                    parent = %parent_name,
                    "patch parent not found, leaving child deferred"
                );
                continue;
            };

            let source = match fs::read(roms_path.join(parent_name)) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(parent = %parent_name, %err, "cannot read patch parent, skipping");
                    continue;
                }
            };
            let target = match fs::read(roms_path.join(child.as_str())) {
                Ok(bytes) => bytes,
                Err(err) => {
                    warn!(child = %child.as_str(), %err, "cannot read patch child, skipping");
                    continue;
                }
            };

            let (payload, is_patch) = codec::make_patch(&source, &target);
            let compressed = system_manifest
                .compression
                .and_then(|algorithm| {
                    codec::compress(&payload, algorithm).map(|out| (out, algorithm))
                });
            let (stored, compression) = match &compressed {
                Some((out, algorithm)) => (out.as_slice(), Some(algorithm.name())),
                None => (payload.as_slice(), None),
            };
            FileRow::update_patch(conn, child_id, stored, compression, is_patch.then_some(parent_id))?;
            if let Some(algorithm) = system_manifest.hash {
                let digest = hash::hash_bytes(algorithm, &payload);
                Checksum::upsert(conn, child_id, algorithm.name(), &digest)?;
            }
            debug!(
                child = %child.as_str(),
                parent = %parent_name,
                is_patch,
                "patch stored"
            );
        }
        Ok(())
    }
}
