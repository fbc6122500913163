// src/collate.rs

//! Case-insensitive natural ordering, used everywhere ordered output
//! is required: media grouping descent, patch record ordering, tag
//! file contents and the `--sort` utility.
//!
//! File names are compared stem-first: the name is split at the last
//! dot, stems are compared with case-insensitive natural ordering
//! (digit runs compare as numbers), and extensions break ties.

use crate::error::Result;
use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

/// Split a file name at the last dot into (stem, extension).
fn split_extension(name: &str) -> (&str, &str) {
    match name.rfind('.') {
        Some(pos) => (&name[..pos], &name[pos + 1..]),
        None => (name, ""),
    }
}

/// The project-wide comparator.
pub fn compare(a: &str, b: &str) -> Ordering {
    let (a_stem, a_ext) = split_extension(a);
    let (b_stem, b_ext) = split_extension(b);
    natord::compare_ignore_case(a_stem, b_stem)
        .then_with(|| natord::compare_ignore_case(a_ext, b_ext))
}

/// A string key ordered (and equated) by [`compare`]. Mirrors the
/// case-insensitive keyed sets and maps the manifests are read into.
#[derive(Debug, Clone)]
pub struct NaturalKey(pub String);

impl NaturalKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for NaturalKey {
    fn from(s: &str) -> Self {
        NaturalKey(s.to_owned())
    }
}

impl From<String> for NaturalKey {
    fn from(s: String) -> Self {
        NaturalKey(s)
    }
}

impl PartialEq for NaturalKey {
    fn eq(&self, other: &Self) -> bool {
        compare(&self.0, &other.0) == Ordering::Equal
    }
}

impl Eq for NaturalKey {}

impl PartialOrd for NaturalKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for NaturalKey {
    fn cmp(&self, other: &Self) -> Ordering {
        compare(&self.0, &other.0)
    }
}

/// Set of names in natural order.
pub type NaturalSet = BTreeSet<NaturalKey>;

/// Map keyed by name in natural order.
pub type NaturalMap<V> = BTreeMap<NaturalKey, V>;

/// Split manifest text into lines. Carriage returns are stripped,
/// empty lines are kept as blanks, and the empty fragment after a
/// final newline is not an entry.
pub fn split_lines(text: &str) -> Vec<String> {
    let cleaned: String = text.chars().filter(|&c| c != '\r').collect();
    let mut lines: Vec<String> = cleaned.split('\n').map(str::to_owned).collect();
    if lines.last().map(|l| l.is_empty()).unwrap_or(false) {
        lines.pop();
    }
    lines
}

/// Sort the lines of a text file in place with the natural comparator.
/// Blank lines are collapsed; N blanks in the input re-emit as N-1
/// trailing blanks.
pub fn sort_file(path: &Path) -> Result<()> {
    let bytes = fs::read(path)?;
    let mut lines = split_lines(&String::from_utf8_lossy(&bytes));
    if lines.is_empty() {
        return Ok(());
    }
    lines.sort_by(|a, b| compare(a, b));

    let mut sorted = String::new();
    let mut blanks = 0usize;
    for line in &lines {
        if line.is_empty() {
            blanks += 1;
            continue;
        }
        sorted.push_str(line);
        sorted.push('\n');
    }
    for _ in 1..blanks {
        sorted.push('\n');
    }
    fs::write(path, sorted)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn digit_runs_compare_numerically() {
        assert_eq!(compare("Game 2", "Game 10"), Ordering::Less);
        assert_eq!(compare("game 10", "Game 2"), Ordering::Greater);
    }

    #[test]
    fn comparison_ignores_case() {
        assert_eq!(compare("GAME X", "game x"), Ordering::Equal);
        assert_eq!(compare("alpha", "BETA"), Ordering::Less);
    }

    #[test]
    fn extension_breaks_ties() {
        assert_eq!(compare("a.bin", "a.rom"), Ordering::Less);
        assert_eq!(compare("a 2.rom", "a 10.bin"), Ordering::Less);
    }

    #[test]
    fn natural_key_equates_case_insensitively() {
        let mut set = NaturalSet::new();
        set.insert("Game X".into());
        assert!(set.contains(&NaturalKey::from("game x")));
        assert!(!set.contains(&NaturalKey::from("Game Y")));
    }

    #[test]
    fn split_lines_drops_trailing_fragment() {
        assert_eq!(split_lines("a\nb\n"), vec!["a", "b"]);
        assert_eq!(split_lines("a\r\nb"), vec!["a", "b"]);
        assert_eq!(split_lines("a\n\nb\n"), vec!["a", "", "b"]);
        assert!(split_lines("").is_empty());
    }

    #[test]
    fn sort_file_collapses_blanks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        fs::write(&path, "bbb\naaa\n\nccc\n").unwrap();
        sort_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "aaa\nbbb\nccc\n");
    }

    #[test]
    fn sort_file_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        fs::write(&path, "b 10\nb 2\n\na\n").unwrap();
        sort_file(&path).unwrap();
        let once = fs::read_to_string(&path).unwrap();
        assert_eq!(once, "a\nb 2\nb 10\n");
        sort_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), once);
    }

    #[test]
    fn sort_file_preserves_surplus_blanks_minus_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("list.txt");
        fs::write(&path, "b\n\n\n\na\n").unwrap();
        sort_file(&path).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "a\nb\n\n\n");
    }
}
