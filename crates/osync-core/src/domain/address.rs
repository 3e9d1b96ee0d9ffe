//! Address schemes
//!
//! An [`AddressScheme`] maps an [`Identifier`] to its location on disk and
//! to the request path a client uses to fetch it. There is one scheme per
//! [`LibraryMode`]:
//!
//! | Scheme | Disk location | Request |
//! |---|---|---|
//! | [`ContentAddressed`] | `root/files/<h0>/<h0h1>/<hash>` | `GET /file/<hash>` |
//! | [`PathAddressed`] | `root/Songs/<relative path>` | `GET /stable-file?path=<encoded>` |
//!
//! Both schemes refuse identifiers that would resolve outside of the
//! library root. The server applies an additional canonical-path check
//! ([`confine_to`]) before serving `PathAddressed` files, since symlinks
//! inside the library can still point elsewhere.

use std::fmt::Debug;
use std::path::{Component, Path, PathBuf};

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};

use super::errors::DomainError;
use super::identifier::Identifier;
use super::mode::LibraryMode;

/// Content directory of a `Lazer` library.
pub const CONTENT_DIR: &str = "files";

/// Content directory of a `Stable` library.
pub const SONGS_DIR: &str = "Songs";

/// Database file of a `Lazer` library, relative to its root.
pub const DATABASE_FILE: &str = "client.realm";

/// Suffix of the previous database kept after a replacement.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Suffix of the database while it is being downloaded.
pub const DATABASE_TEMP_SUFFIX: &str = ".tmp";

/// Suffix of a content file while it is being downloaded.
///
/// Files carrying this suffix are never listed in a manifest.
pub const PARTIAL_SUFFIX: &str = ".osync-part";

/// Characters left as-is in a query value; everything else is `%XX` encoded
/// (space becomes `%20`, never `+`).
const QUERY_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Characters left as-is in a single path segment.
const PATH_SEGMENT: &AsciiSet = QUERY_VALUE;

/// Placement of library files on disk and on the wire.
pub trait AddressScheme: Debug + Send + Sync {
    /// Library mode this scheme belongs to.
    fn mode(&self) -> LibraryMode;

    /// Directory holding every content file of the library.
    fn content_dir(&self, root: &Path) -> PathBuf;

    /// Resolve an identifier to the file it names under `root`.
    ///
    /// # Errors
    ///
    /// [`DomainError::UnsafeIdentifier`] when the identifier would leave the
    /// content directory.
    fn locate(&self, root: &Path, id: &Identifier) -> Result<PathBuf, DomainError>;

    /// Request path (and query) used to fetch `id` from a server.
    fn request_path(&self, id: &Identifier) -> String;

    /// Manifest entry for a regular file found while scanning `content_dir`,
    /// or `None` if the file is not part of the library.
    fn manifest_entry(&self, content_dir: &Path, file: &Path) -> Option<String>;
}

// ============================================================================
// ContentAddressed
// ============================================================================

/// Hash-named files sharded two levels deep: `files/a/ab/abcdef`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ContentAddressed;

impl ContentAddressed {
    /// A hash must be a single plain file name.
    fn is_safe(hash: &str) -> bool {
        hash != "." && hash != ".." && !hash.contains(['/', '\\'])
    }
}

impl AddressScheme for ContentAddressed {
    fn mode(&self) -> LibraryMode {
        LibraryMode::Lazer
    }

    fn content_dir(&self, root: &Path) -> PathBuf {
        root.join(CONTENT_DIR)
    }

    fn locate(&self, root: &Path, id: &Identifier) -> Result<PathBuf, DomainError> {
        let hash = id.as_str();
        if !Self::is_safe(hash) {
            return Err(DomainError::UnsafeIdentifier(hash.to_string()));
        }

        let dir = self.content_dir(root);
        let mut chars = hash.char_indices();
        let first = chars.next().map(|(_, c)| c.len_utf8());
        let second = chars.next().map(|(i, c)| i + c.len_utf8());

        match (first, second) {
            (Some(one), Some(two)) => Ok(dir.join(&hash[..one]).join(&hash[..two]).join(hash)),
            // Shorter than two characters: no sharding.
            _ => Ok(dir.join(hash)),
        }
    }

    fn request_path(&self, id: &Identifier) -> String {
        format!("/file/{}", utf8_percent_encode(id.as_str(), PATH_SEGMENT))
    }

    fn manifest_entry(&self, _content_dir: &Path, file: &Path) -> Option<String> {
        let name = file.file_name()?.to_str()?;
        if name.chars().count() <= 2 || name.ends_with(PARTIAL_SUFFIX) {
            return None;
        }
        Some(name.to_string())
    }
}

// ============================================================================
// PathAddressed
// ============================================================================

/// Files kept at their natural path under `Songs/`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PathAddressed;

impl AddressScheme for PathAddressed {
    fn mode(&self) -> LibraryMode {
        LibraryMode::Stable
    }

    fn content_dir(&self, root: &Path) -> PathBuf {
        root.join(SONGS_DIR)
    }

    fn locate(&self, root: &Path, id: &Identifier) -> Result<PathBuf, DomainError> {
        let mut path = self.content_dir(root);

        for segment in id.as_str().split('/') {
            let plain = !segment.is_empty()
                && Path::new(segment)
                    .components()
                    .all(|c| matches!(c, Component::Normal(_)));
            if !plain {
                return Err(DomainError::UnsafeIdentifier(id.to_string()));
            }
            path.push(segment);
        }

        Ok(path)
    }

    fn request_path(&self, id: &Identifier) -> String {
        format!(
            "/stable-file?path={}",
            utf8_percent_encode(id.as_str(), QUERY_VALUE)
        )
    }

    fn manifest_entry(&self, content_dir: &Path, file: &Path) -> Option<String> {
        let relative = file.strip_prefix(content_dir).ok()?;
        let mut parts = Vec::new();
        for component in relative.components() {
            match component {
                Component::Normal(part) => parts.push(part.to_str()?),
                _ => return None,
            }
        }
        if parts.is_empty() || parts.last()?.ends_with(PARTIAL_SUFFIX) {
            return None;
        }
        Some(parts.join("/"))
    }
}

// ============================================================================
// Canonical confinement
// ============================================================================

/// Canonicalize `candidate` and return it only if it lies inside `base`.
///
/// Returns `None` when either path cannot be canonicalized (typically
/// because it does not exist) or when the candidate escapes `base`, so
/// callers can answer both cases identically. Blocking: run it off the
/// async executor.
#[must_use]
pub fn confine_to(base: &Path, candidate: &Path) -> Option<PathBuf> {
    let base = std::fs::canonicalize(base).ok()?;
    let resolved = std::fs::canonicalize(candidate).ok()?;
    resolved.starts_with(&base).then_some(resolved)
}
