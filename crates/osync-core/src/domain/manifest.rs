//! Library manifests
//!
//! A [`Manifest`] is the set of identifiers a library holds right now. It is
//! produced by a full recursive scan of the content directory, never cached,
//! and exchanged as newline-separated text.
//!
//! The fetch set of a sync is `remote - local` ([`Manifest::missing_from`]).

use std::collections::btree_set::{self, BTreeSet};
use std::path::Path;

use tracing::{debug, warn};
use walkdir::WalkDir;

use super::identifier::Identifier;
use super::mode::LibraryMode;

/// Set of identifiers held by one library, in one mode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Manifest {
    mode: LibraryMode,
    entries: BTreeSet<Identifier>,
}

impl Manifest {
    /// Create an empty manifest.
    #[must_use]
    pub fn new(mode: LibraryMode) -> Self {
        Self {
            mode,
            entries: BTreeSet::new(),
        }
    }

    /// Build a manifest from already-validated identifiers.
    pub fn from_entries(mode: LibraryMode, entries: impl IntoIterator<Item = Identifier>) -> Self {
        Self {
            mode,
            entries: entries.into_iter().collect(),
        }
    }

    /// Scan the content directory of the library at `root`.
    ///
    /// A missing content directory yields an empty manifest. Unreadable
    /// entries and file names that cannot be expressed as identifiers are
    /// skipped with a warning. This walks the whole tree synchronously;
    /// async callers should use `spawn_blocking`.
    pub fn scan(root: &Path, mode: LibraryMode) -> Self {
        let scheme = mode.scheme();
        let content_dir = scheme.content_dir(root);
        let mut manifest = Self::new(mode);

        if !content_dir.is_dir() {
            debug!(dir = %content_dir.display(), "Content directory absent, empty manifest");
            return manifest;
        }

        for entry in WalkDir::new(&content_dir).follow_links(false) {
            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    warn!(%err, "Skipping unreadable entry during scan");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let Some(raw) = scheme.manifest_entry(&content_dir, entry.path()) else {
                continue;
            };
            match Identifier::new(raw) {
                Ok(id) => {
                    manifest.entries.insert(id);
                }
                Err(err) => warn!(path = %entry.path().display(), %err, "Skipping file"),
            }
        }

        debug!(
            dir = %content_dir.display(),
            count = manifest.entries.len(),
            "Library scanned"
        );
        manifest
    }

    /// Parse the newline-separated wire form.
    ///
    /// Blank lines are dropped and a trailing `\r` is tolerated.
    #[must_use]
    pub fn parse(mode: LibraryMode, text: &str) -> Self {
        let entries = text
            .lines()
            .map(|line| line.trim_end_matches('\r'))
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| Identifier::new(line).ok())
            .collect();
        Self { mode, entries }
    }

    /// Newline-joined wire form (no trailing newline).
    #[must_use]
    pub fn to_wire(&self) -> String {
        let mut out = String::new();
        for (i, id) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push('\n');
            }
            out.push_str(id.as_str());
        }
        out
    }

    /// Identifiers present in `self` but absent from `local`.
    #[must_use]
    pub fn missing_from(&self, local: &Manifest) -> Vec<Identifier> {
        self.entries.difference(&local.entries).cloned().collect()
    }

    /// Insert an identifier; returns false if it was already present.
    pub fn insert(&mut self, id: Identifier) -> bool {
        self.entries.insert(id)
    }

    #[must_use]
    pub fn contains(&self, id: &Identifier) -> bool {
        self.entries.contains(id)
    }

    #[must_use]
    pub fn mode(&self) -> LibraryMode {
        self.mode
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> btree_set::Iter<'_, Identifier> {
        self.entries.iter()
    }
}

impl<'a> IntoIterator for &'a Manifest {
    type Item = &'a Identifier;
    type IntoIter = btree_set::Iter<'a, Identifier>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;

    fn manifest(mode: LibraryMode, ids: &[&str]) -> Manifest {
        Manifest::from_entries(mode, ids.iter().map(|s| Identifier::new(*s).unwrap()))
    }

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"x").unwrap();
    }

    #[test]
    fn test_missing_from_is_exact_set_difference() {
        let remote = manifest(LibraryMode::Lazer, &["aaa", "bbb", "ccc"]);
        let local = manifest(LibraryMode::Lazer, &["bbb", "zzz"]);

        let missing = remote.missing_from(&local);
        let names: Vec<&str> = missing.iter().map(Identifier::as_str).collect();
        assert_eq!(names, vec!["aaa", "ccc"]);
    }

    #[test]
    fn test_missing_from_identical_sets_is_empty() {
        let remote = manifest(LibraryMode::Stable, &["a/b.mp3", "c/d.osu"]);
        assert!(remote.missing_from(&remote.clone()).is_empty());
    }

    #[test]
    fn test_parse_drops_blank_lines_and_carriage_returns() {
        let parsed = Manifest::parse(LibraryMode::Lazer, "aaa\r\n\n  \nbbb\n");
        assert_eq!(parsed, manifest(LibraryMode::Lazer, &["aaa", "bbb"]));
    }

    #[test]
    fn test_parse_deduplicates() {
        let parsed = Manifest::parse(LibraryMode::Lazer, "aaa\naaa\nbbb");
        assert_eq!(parsed.len(), 2);
    }

    #[test]
    fn test_wire_form_has_no_trailing_newline() {
        let m = manifest(LibraryMode::Lazer, &["bbb", "aaa"]);
        assert_eq!(m.to_wire(), "aaa\nbbb");
        assert_eq!(Manifest::new(LibraryMode::Lazer).to_wire(), "");
    }

    #[test]
    fn test_newline_in_name_cannot_enter_manifest() {
        let mut m = Manifest::new(LibraryMode::Stable);
        assert!(Identifier::new("evil\nname").is_err());
        m.insert(Identifier::new("fine").unwrap());
        assert_eq!(Manifest::parse(LibraryMode::Stable, &m.to_wire()), m);
    }

    #[test]
    fn test_scan_content_addressed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("files/a/ab/abcdef"));
        touch(&root.join("files/1/12/123456"));
        touch(&root.join("files/xy"));
        touch(&root.join("files/a/ab/abc999.osync-part"));
        touch(&root.join("client.realm"));

        let scanned = Manifest::scan(root, LibraryMode::Lazer);
        assert_eq!(scanned, manifest(LibraryMode::Lazer, &["123456", "abcdef"]));
    }

    #[test]
    fn test_scan_path_addressed() {
        let dir = TempDir::new().unwrap();
        let root = dir.path();
        touch(&root.join("Songs/100 A - B/audio.mp3"));
        touch(&root.join("Songs/100 A - B/sub/x.png"));
        touch(&root.join("Songs/top.osz"));
        touch(&root.join("Other/ignored.txt"));

        let scanned = Manifest::scan(root, LibraryMode::Stable);
        assert_eq!(
            scanned,
            manifest(
                LibraryMode::Stable,
                &["100 A - B/audio.mp3", "100 A - B/sub/x.png", "top.osz"]
            )
        );
    }

    #[test]
    fn test_scan_missing_content_dir_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(Manifest::scan(dir.path(), LibraryMode::Lazer).is_empty());
        assert!(Manifest::scan(dir.path(), LibraryMode::Stable).is_empty());
    }
}
