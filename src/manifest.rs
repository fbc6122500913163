// src/manifest.rs

//! Reads the per-system directory of declarative text manifests.
//!
//! A system directory holds `system.txt`, `media.txt`, `file.txt`, an
//! optional `patch.txt` and the `mediatag/`/`filetag/` directories. An
//! optional configuration name selects `<base>.<config>.txt` over
//! `<base>.txt`, giving per-tenant overrides of individual manifests.

use crate::codec::Compression;
use crate::collate::{self, NaturalKey, NaturalMap};
use crate::error::{Error, Result};
use crate::hash::HashAlgorithm;
use std::fs;
use std::path::{Path, PathBuf};

/// Typed contents of `system.txt`.
///
/// Lines three and four are optional; an unrecognized algorithm name
/// behaves like an absent line (files stored raw, no checksums).
#[derive(Debug, Clone)]
pub struct SystemManifest {
    pub code: String,
    pub name: String,
    pub compression: Option<Compression>,
    pub hash: Option<HashAlgorithm>,
}

/// Parent/child pairs declared by `patch.txt`. Within a record the
/// first non-empty line names the parent and every following line a
/// child; a blank line terminates the record.
#[derive(Debug, Default)]
pub struct PatchSet {
    /// child name -> parent name
    pub parent_of: NaturalMap<String>,
    /// distinct parent names, awaiting row-id resolution during import
    pub parents: NaturalMap<Option<i64>>,
}

impl PatchSet {
    pub fn is_child(&self, name: &str) -> bool {
        self.parent_of.contains_key(&NaturalKey::from(name))
    }

    pub fn is_parent(&self, name: &str) -> bool {
        self.parents.contains_key(&NaturalKey::from(name))
    }
}

/// Tags parsed from a `mediatag/` or `filetag/` directory, keyed by
/// the media or file name each tag applies to.
pub type TagMap = NaturalMap<NaturalMap<String>>;

/// Resolve `<base>.txt` under `import_path`, preferring
/// `<base>.<config>.txt` when a configuration name is given and the
/// override exists.
pub fn manifest_path(import_path: &Path, base: &str, config: &str) -> PathBuf {
    if !config.is_empty() {
        let override_path = import_path.join(format!("{base}.{config}.txt"));
        if override_path.exists() {
            return override_path;
        }
    }
    import_path.join(format!("{base}.txt"))
}

fn read_manifest_lines(import_path: &Path, base: &str, config: &str) -> Result<Vec<String>> {
    let path = manifest_path(import_path, base, config);
    if !path.is_file() {
        return Err(Error::MissingManifest { path });
    }
    let bytes = fs::read(&path)?;
    Ok(collate::split_lines(&String::from_utf8_lossy(&bytes)))
}

/// Read and parse `system.txt`.
pub fn read_system(import_path: &Path, config: &str) -> Result<SystemManifest> {
    let lines = read_manifest_lines(import_path, "system", config)?;
    if lines.len() < 2 {
        return Err(Error::ShortManifest {
            path: manifest_path(import_path, "system", config),
        });
    }
    Ok(SystemManifest {
        code: lines[0].clone(),
        name: lines[1].clone(),
        compression: lines.get(2).and_then(|l| l.parse().ok()),
        hash: lines.get(3).and_then(|l| l.parse().ok()),
    })
}

/// Read `media.txt`: one media name per line.
pub fn read_media(import_path: &Path, config: &str) -> Result<Vec<String>> {
    let lines = read_manifest_lines(import_path, "media", config)?;
    if lines.is_empty() {
        return Err(Error::ShortManifest {
            path: manifest_path(import_path, "media", config),
        });
    }
    Ok(lines)
}

/// Read `file.txt`: one file name per line.
pub fn read_files(import_path: &Path, config: &str) -> Result<Vec<String>> {
    let lines = read_manifest_lines(import_path, "file", config)?;
    if lines.is_empty() {
        return Err(Error::ShortManifest {
            path: manifest_path(import_path, "file", config),
        });
    }
    Ok(lines)
}

/// Read `systems.txt` if present: the list of sub-directories a parent
/// import directory delegates to. `None` means single-system layout.
pub fn read_systems_list(import_path: &Path, config: &str) -> Option<Vec<String>> {
    let path = manifest_path(import_path, "systems", config);
    if !path.is_file() {
        return None;
    }
    let bytes = fs::read(&path).ok()?;
    Some(collate::split_lines(&String::from_utf8_lossy(&bytes)))
}

/// Read `patch.txt` if present; absence yields an empty set.
pub fn read_patches(import_path: &Path, config: &str) -> PatchSet {
    let path = manifest_path(import_path, "patch", config);
    if !path.is_file() {
        return PatchSet::default();
    }
    match fs::read(&path) {
        Ok(bytes) => parse_patches(&String::from_utf8_lossy(&bytes)),
        Err(_) => PatchSet::default(),
    }
}

fn parse_patches(text: &str) -> PatchSet {
    let mut set = PatchSet::default();
    let mut parent: Option<String> = None;
    for line in collate::split_lines(text) {
        if line.is_empty() {
            parent = None;
            continue;
        }
        match &parent {
            None => parent = Some(line),
            Some(p) => {
                set.parents.insert(NaturalKey::from(p.as_str()), None);
                set.parent_of.insert(NaturalKey::from(line), p.clone());
            }
        }
    }
    set
}

/// Scan a tag directory. Each `<name>.txt` file records tag
/// (`name`, "") and each `<name>.<value>.txt` records (`name`,
/// `value`) — the stem splits at its first dot — for every media or
/// file named on its lines.
pub fn read_tags(tags_path: &Path) -> TagMap {
    let mut tags = TagMap::new();
    let Ok(entries) = fs::read_dir(tags_path) else {
        return tags;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("txt") {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        let (name, value) = match stem.split_once('.') {
            Some((name, value)) => (name, value),
            None => (stem, ""),
        };
        if name.is_empty() {
            continue;
        }
        let Ok(bytes) = fs::read(&path) else {
            continue;
        };
        for line in collate::split_lines(&String::from_utf8_lossy(&bytes)) {
            if line.is_empty() {
                continue;
            }
            tags.entry(NaturalKey::from(line))
                .or_default()
                .insert(NaturalKey::from(name), value.to_string());
        }
    }
    tags
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_manifest_parses_optional_lines() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("system.txt"), "snes\nSuper NES\nXZ\nSHA256\n").unwrap();
        let manifest = read_system(dir.path(), "").unwrap();
        assert_eq!(manifest.code, "snes");
        assert_eq!(manifest.name, "Super NES");
        assert_eq!(manifest.compression, Some(Compression::Xz));
        assert_eq!(manifest.hash, Some(HashAlgorithm::Sha256));
    }

    #[test]
    fn system_manifest_two_lines_only() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("system.txt"), "gb\nGame Boy\n").unwrap();
        let manifest = read_system(dir.path(), "").unwrap();
        assert_eq!(manifest.compression, None);
        assert_eq!(manifest.hash, None);
    }

    #[test]
    fn short_system_manifest_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("system.txt"), "snes\n").unwrap();
        assert!(matches!(
            read_system(dir.path(), ""),
            Err(Error::ShortManifest { .. })
        ));
    }

    #[test]
    fn missing_manifest_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            read_media(dir.path(), ""),
            Err(Error::MissingManifest { .. })
        ));
    }

    #[test]
    fn configuration_overrides_base_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("media.txt"), "Base\n").unwrap();
        fs::write(dir.path().join("media.eu.txt"), "Override\n").unwrap();
        assert_eq!(read_media(dir.path(), "eu").unwrap(), vec!["Override"]);
        assert_eq!(read_media(dir.path(), "jp").unwrap(), vec!["Base"]);
        assert_eq!(read_media(dir.path(), "").unwrap(), vec!["Base"]);
    }

    #[test]
    fn patch_records_split_on_blank_lines() {
        let set = parse_patches("Parent A\nChild A1\nChild A2\n\nParent B\nChild B1\n");
        assert_eq!(set.parent_of.len(), 3);
        assert_eq!(
            set.parent_of.get(&NaturalKey::from("Child A2")).unwrap(),
            "Parent A"
        );
        assert_eq!(
            set.parent_of.get(&NaturalKey::from("child b1")).unwrap(),
            "Parent B"
        );
        assert!(set.is_parent("Parent B"));
        assert!(!set.is_child("Parent A"));
    }

    #[test]
    fn lone_parent_declares_nothing() {
        let set = parse_patches("Only Line\n");
        assert!(set.parent_of.is_empty());
        assert!(set.parents.is_empty());
    }

    #[test]
    fn tag_stem_splits_at_first_dot() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("region.usa.txt"), "Game X\n").unwrap();
        fs::write(dir.path().join("favorite.txt"), "Game X\nGame Y\n").unwrap();
        fs::write(dir.path().join("multi.part.value.txt"), "Game Y\n").unwrap();
        fs::write(dir.path().join("ignored.csv"), "Game Z\n").unwrap();

        let tags = read_tags(dir.path());
        let x = tags.get(&NaturalKey::from("game x")).unwrap();
        assert_eq!(x.get(&NaturalKey::from("region")).unwrap(), "usa");
        assert_eq!(x.get(&NaturalKey::from("favorite")).unwrap(), "");
        let y = tags.get(&NaturalKey::from("Game Y")).unwrap();
        assert_eq!(y.get(&NaturalKey::from("multi")).unwrap(), "part.value");
        assert!(!tags.contains_key(&NaturalKey::from("Game Z")));
    }
}
