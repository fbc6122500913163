// src/grouping.rs

//! Assigns raw files to media by longest matching prefix.
//!
//! Media names double as file-name prefixes, so no explicit
//! file-to-media mapping exists in the manifests. Iterating media in
//! descending natural order and removing claimed files as we go
//! guarantees that "Game X Extras" claims its files before "Game X"
//! can. The same sweep, run straight off the manifests, derives the
//! `patch.txt` records for `-p` mode.

use crate::collate::{self, NaturalKey, NaturalSet};
use crate::error::Result;
use crate::manifest;
use std::cmp::Ordering;
use std::fs;
use std::path::Path;
use tracing::warn;

/// Case-insensitive (ASCII) prefix check used for media claims.
pub fn starts_with_nocase(name: &str, prefix: &str) -> bool {
    name.get(..prefix.len())
        .map(|head| head.eq_ignore_ascii_case(prefix))
        .unwrap_or(false)
}

/// Extract from `working` every file whose name starts with
/// `media_name`, removing the claims so a later (shorter) media
/// cannot re-claim them. Returns the claimed names in natural order.
pub fn claim_files(working: &mut NaturalSet, media_name: &str) -> Vec<String> {
    let claimed: Vec<NaturalKey> = working
        .iter()
        .filter(|key| starts_with_nocase(key.as_str(), media_name))
        .cloned()
        .collect();
    for key in &claimed {
        working.remove(key);
    }
    claimed.into_iter().map(|key| key.0).collect()
}

/// Generate `patch.txt` manifests from an import tree without touching
/// any database (`-p` mode). Every media claiming at least two files
/// becomes one record: its files in natural order, the first line
/// acting as parent, records separated by a blank line. With a
/// `systems.txt` layout one `<patch_path>/<system>/patch.txt` is
/// written per sub-directory; otherwise `patch_path` itself is the
/// output file.
pub fn write_patch_lists(import_path: &Path, patch_path: &Path, config: &str) -> Result<bool> {
    if !import_path.is_dir() {
        warn!(path = %import_path.display(), "import path is not a directory");
        return Ok(false);
    }
    if patch_path.is_file() {
        warn!(path = %patch_path.display(), "patch path already exists");
        return Ok(false);
    }

    if let Some(systems) = manifest::read_systems_list(import_path, config) {
        let mut any = false;
        for line in systems {
            if line.is_empty() {
                continue;
            }
            let system_import = import_path.join(&line);
            if !system_import.is_dir() {
                continue;
            }
            let system_dir = patch_path.join(&line);
            fs::create_dir_all(&system_dir)?;
            match write_system_patch_list(&system_import, &system_dir.join("patch.txt"), config) {
                Ok(()) => any = true,
                Err(err) if err.is_system_abort() => {
                    warn!(system = %line, %err, "skipping system");
                }
                Err(err) => return Err(err),
            }
        }
        return Ok(any);
    }

    match write_system_patch_list(import_path, patch_path, config) {
        Ok(()) => Ok(true),
        Err(err) if err.is_system_abort() => {
            warn!(%err, "skipping system");
            Ok(false)
        }
        Err(err) => Err(err),
    }
}

fn write_system_patch_list(import_path: &Path, out_path: &Path, config: &str) -> Result<()> {
    let media_lines = manifest::read_media(import_path, config)?;
    let file_lines = manifest::read_files(import_path, config)?;

    let mut working: NaturalSet = file_lines
        .into_iter()
        .filter(|line| !line.is_empty())
        .map(NaturalKey::from)
        .collect();

    let mut groups: Vec<Vec<String>> = Vec::new();
    for media in media_lines.iter().rev() {
        if media.is_empty() {
            continue;
        }
        let claimed = claim_files(&mut working, media);
        if !claimed.is_empty() {
            groups.push(claimed);
        }
    }
    groups.sort_by(|a, b| compare_groups(a, b));

    let mut text = String::new();
    for group in &groups {
        if group.len() <= 1 {
            continue;
        }
        if !text.is_empty() {
            text.push('\n');
        }
        for file in group {
            text.push_str(file);
            text.push('\n');
        }
    }
    fs::write(out_path, text)?;
    Ok(())
}

fn compare_groups(a: &[String], b: &[String]) -> Ordering {
    let mut left = a.iter();
    let mut right = b.iter();
    loop {
        match (left.next(), right.next()) {
            (Some(x), Some(y)) => match collate::compare(x, y) {
                Ordering::Equal => continue,
                other => return other,
            },
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
        }
    }
}
