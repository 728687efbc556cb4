//! The shared directory and confinement of client paths.
//!
//! Every path a client sends is untrusted. [`SharedRoot::resolve`] joins it
//! onto the shared directory and canonicalizes the result; the location is
//! accepted only when it is the shared directory itself or lies beneath it
//! component by component. Comparing string prefixes would accept a sibling
//! such as `/data/share2` for a root of `/data/share`, so containment is
//! always checked with [`Path::starts_with`] on canonical paths.

use std::fs;
use std::path::{Component, Path, PathBuf};

use tracing::{debug, info};

use super::error::{display_path, FileError};

/// Archive folder name used when the shared directory has no name of its own.
const FALLBACK_ROOT_NAME: &str = "shared_files";

/// The directory tree this process exposes.
///
/// Built once at startup and shared read-only for the lifetime of the
/// process; there are no mutators.
#[derive(Debug)]
pub struct SharedRoot {
    /// Canonical path of the shared directory.
    path: PathBuf,
    /// Base that archive entry names are computed against (the parent).
    archive_base: PathBuf,
}

/// A client path that has been confined to the shared directory.
///
/// Only [`SharedRoot::resolve`] creates these. The location is computed per
/// request and never cached, since the filesystem may change in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedPath {
    /// Canonical absolute path.
    path: PathBuf,
    /// Path relative to the shared directory, `/`-separated.
    relative: String,
}

impl ResolvedPath {
    /// The canonical absolute path.
    pub fn as_path(&self) -> &Path {
        &self.path
    }

    /// The path relative to the shared directory, `/`-separated.
    pub fn relative(&self) -> &str {
        &self.relative
    }

    /// Whether this is the shared directory itself.
    pub fn is_root(&self) -> bool {
        self.relative.is_empty()
    }

    /// Final component of the path.
    pub fn file_name(&self) -> Option<String> {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
    }
}

impl SharedRoot {
    /// Open the shared directory, creating it if it does not exist.
    ///
    /// Relative paths are resolved against the current working directory.
    pub fn open<P: AsRef<Path>>(dir: P) -> Result<Self, FileError> {
        let dir = dir.as_ref();
        let label = dir.display().to_string();

        if !dir.exists() {
            info!(path = %dir.display(), "Shared directory does not exist, creating it");
            fs::create_dir_all(dir).map_err(|e| FileError::from_io(e, &label))?;
        }

        let path = fs::canonicalize(dir).map_err(|e| FileError::from_io(e, &label))?;
        if !path.is_dir() {
            return Err(FileError::NotFound(format!("not a directory: {label}")));
        }

        let archive_base = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| path.clone());

        debug!(root = %path.display(), "Shared root opened");

        Ok(Self { path, archive_base })
    }

    /// Canonical path of the shared directory.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name of the shared directory, used as the archive's top-level folder.
    pub fn name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| FALLBACK_ROOT_NAME.to_string())
    }

    /// Whether `path` is the shared directory or lies beneath it.
    ///
    /// `path` must already be canonical for this to mean anything.
    pub fn contains(&self, path: &Path) -> bool {
        path.starts_with(&self.path)
    }

    /// Confine a client-supplied path to the shared directory.
    ///
    /// The empty string names the shared directory. An absolute `relative`
    /// replaces the root when joined, so `/readme.txt` names the host path
    /// and is accepted only if that lies inside the share. `..` components,
    /// absolute paths and symlinks that end up outside the share all
    /// resolve to [`FileError::Forbidden`]; paths that stay inside but do
    /// not exist resolve to [`FileError::NotFound`].
    ///
    /// `..` is checked lexically before symlinks are resolved. A path that
    /// climbs out through an in-share symlink (`link/../../x` with `link`
    /// pointing at `a/b/c`) is therefore Forbidden even though it would
    /// canonicalize back inside.
    pub fn resolve(&self, relative: &str) -> Result<ResolvedPath, FileError> {
        let joined = self.path.join(relative);

        // Reject lexical escapes up front so that a traversal to a missing
        // target is reported as forbidden rather than missing.
        if !self.contains(&lexical_normalize(&joined)) {
            debug!(path = %relative, "Rejected path escaping the shared root");
            return Err(FileError::Forbidden(display_path(relative)));
        }

        let canonical = fs::canonicalize(&joined).map_err(|e| FileError::from_io(e, relative))?;

        if !self.contains(&canonical) {
            debug!(path = %relative, "Rejected path resolving outside the shared root");
            return Err(FileError::Forbidden(display_path(relative)));
        }

        let relative = self.relative_wire_path(&canonical).unwrap_or_default();
        Ok(ResolvedPath {
            path: canonical,
            relative,
        })
    }

    /// Express a location inside the share relative to it, `/`-separated.
    ///
    /// Returns `None` when `path` is not under the shared directory.
    pub fn relative_wire_path(&self, path: &Path) -> Option<String> {
        path.strip_prefix(&self.path).ok().map(to_wire_path)
    }

    /// Name a file inside the share the way it appears in an archive.
    ///
    /// Names are relative to the share's parent, so the share's own name is
    /// the first component of every entry.
    pub fn archive_entry_name(&self, path: &Path) -> Option<String> {
        if !path.starts_with(&self.path) {
            return None;
        }
        let name = path.strip_prefix(&self.archive_base).ok().map(to_wire_path)?;
        if name.is_empty() {
            None
        } else {
            Some(name)
        }
    }
}

/// Join the normal components of a relative path with `/`.
fn to_wire_path(path: &Path) -> String {
    path.components()
        .filter_map(|c| match c {
            Component::Normal(part) => Some(part.to_string_lossy()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve `.` and `..` without touching the filesystem.
fn lexical_normalize(path: &Path) -> PathBuf {
    let mut normalized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir | Component::Normal(_) => {
                normalized.push(component.as_os_str());
            }
            Component::CurDir => {}
            Component::ParentDir => {
                normalized.pop();
            }
        }
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::os::unix::fs::symlink;
    use tempfile::TempDir;

    fn create_share(base: &Path) -> SharedRoot {
        let share = base.join("share");
        fs::create_dir_all(share.join("docs/nested")).unwrap();
        fs::write(share.join("readme.txt"), "hello").unwrap();
        fs::write(share.join("docs/a.txt"), "a").unwrap();
        fs::write(share.join("docs/nested/b.txt"), "b").unwrap();
        SharedRoot::open(&share).unwrap()
    }

    #[test]
    fn test_open_creates_missing_directory() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("not/yet/there");

        let root = SharedRoot::open(&target).unwrap();

        assert!(target.is_dir());
        assert_eq!(root.path(), fs::canonicalize(&target).unwrap());
        assert_eq!(root.name(), "there");
    }

    #[test]
    fn test_open_rejects_file() {
        let temp_dir = TempDir::new().unwrap();
        let file = temp_dir.path().join("plain.txt");
        fs::write(&file, "x").unwrap();

        let result = SharedRoot::open(&file);
        assert!(matches!(result, Err(FileError::NotFound(_))));
    }

    #[test]
    fn test_resolve_empty_is_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());

        let resolved = root.resolve("").unwrap();
        assert!(resolved.is_root());
        assert_eq!(resolved.as_path(), root.path());
        assert_eq!(resolved.relative(), "");
    }

    #[test]
    fn test_resolve_nested_file() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());

        let resolved = root.resolve("docs/nested/b.txt").unwrap();
        assert_eq!(resolved.relative(), "docs/nested/b.txt");
        assert_eq!(resolved.file_name().as_deref(), Some("b.txt"));
        assert!(!resolved.is_root());
    }

    #[test]
    fn test_resolve_dot_segments_inside_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());

        let resolved = root.resolve("docs/./nested/../a.txt").unwrap();
        assert_eq!(resolved.relative(), "docs/a.txt");
    }

    #[test]
    fn test_resolve_parent_traversal_forbidden() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());
        fs::write(temp_dir.path().join("outside.txt"), "secret").unwrap();

        for attempt in ["..", "../outside.txt", "docs/../../outside.txt", "../../../../etc/passwd"] {
            let result = root.resolve(attempt);
            assert!(
                matches!(result, Err(FileError::Forbidden(_))),
                "{attempt} should be forbidden"
            );
        }
    }

    #[test]
    fn test_resolve_traversal_to_missing_target_is_forbidden() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());

        let result = root.resolve("../does-not-exist");
        assert!(matches!(result, Err(FileError::Forbidden(_))));
    }

    #[test]
    fn test_resolve_sibling_with_shared_prefix_forbidden() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());
        let sibling = temp_dir.path().join("share2");
        fs::create_dir_all(&sibling).unwrap();
        fs::write(sibling.join("leak.txt"), "leak").unwrap();

        let absolute = fs::canonicalize(&sibling).unwrap();
        let result = root.resolve(&absolute.to_string_lossy());
        assert!(matches!(result, Err(FileError::Forbidden(_))));

        let result = root.resolve("../share2/leak.txt");
        assert!(matches!(result, Err(FileError::Forbidden(_))));
    }

    #[test]
    fn test_resolve_absolute_path_outside_forbidden() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());

        let result = root.resolve("/etc/passwd");
        assert!(matches!(result, Err(FileError::Forbidden(_))));

        // Absolute, not root-relative: this names the host's /readme.txt
        let result = root.resolve("/readme.txt");
        assert!(matches!(result, Err(FileError::Forbidden(ref p)) if p == "/readme.txt"));
    }

    #[test]
    fn test_resolve_lexical_escape_through_symlink_forbidden() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());
        fs::create_dir_all(root.path().join("a/b/c")).unwrap();
        fs::write(root.path().join("a/x"), "x").unwrap();
        symlink(root.path().join("a/b/c"), root.path().join("deep")).unwrap();

        // Canonically this is a/x, but `..` is judged before links resolve
        assert!(fs::canonicalize(root.path().join("deep/../../x")).is_ok());
        assert!(matches!(
            root.resolve("deep/../../x"),
            Err(FileError::Forbidden(_))
        ));
    }

    #[test]
    fn test_resolve_absolute_path_inside_allowed() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());

        let inside = root.path().join("readme.txt");
        let resolved = root.resolve(&inside.to_string_lossy()).unwrap();
        assert_eq!(resolved.relative(), "readme.txt");
    }

    #[test]
    fn test_resolve_missing_inside_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());

        let result = root.resolve("docs/missing.txt");
        assert!(matches!(result, Err(FileError::NotFound(_))));
    }

    #[test]
    fn test_resolve_through_file_is_not_found() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());

        let result = root.resolve("readme.txt/child");
        assert!(matches!(result, Err(FileError::NotFound(_))));
    }

    #[test]
    fn test_resolve_symlink_escape_forbidden() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());
        let outside = temp_dir.path().join("secret");
        fs::create_dir_all(&outside).unwrap();
        fs::write(outside.join("key.pem"), "key").unwrap();

        symlink(&outside, root.path().join("escape")).unwrap();
        symlink(outside.join("key.pem"), root.path().join("key.pem")).unwrap();

        assert!(matches!(root.resolve("escape"), Err(FileError::Forbidden(_))));
        assert!(matches!(root.resolve("escape/key.pem"), Err(FileError::Forbidden(_))));
        assert!(matches!(root.resolve("key.pem"), Err(FileError::Forbidden(_))));
    }

    #[test]
    fn test_resolve_symlink_inside_allowed() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());
        symlink(root.path().join("docs/a.txt"), root.path().join("shortcut")).unwrap();

        let resolved = root.resolve("shortcut").unwrap();
        assert_eq!(resolved.relative(), "docs/a.txt");
    }

    #[test]
    fn test_relative_wire_path() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());

        let nested = root.path().join("docs").join("nested").join("b.txt");
        assert_eq!(
            root.relative_wire_path(&nested).as_deref(),
            Some("docs/nested/b.txt")
        );
        assert_eq!(root.relative_wire_path(root.path()).as_deref(), Some(""));
        assert_eq!(root.relative_wire_path(temp_dir.path()), None);
    }

    #[test]
    fn test_archive_entry_name_keeps_root_name() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());

        let file = root.path().join("docs/nested/b.txt");
        assert_eq!(
            root.archive_entry_name(&file).as_deref(),
            Some("share/docs/nested/b.txt")
        );
    }

    #[test]
    fn test_archive_entry_name_outside_root() {
        let temp_dir = TempDir::new().unwrap();
        let root = create_share(temp_dir.path());

        let sibling = temp_dir.path().join("share2/file.txt");
        assert_eq!(root.archive_entry_name(&sibling), None);
        assert_eq!(root.archive_entry_name(root.path().parent().unwrap()), None);
    }

    #[test]
    fn test_lexical_normalize() {
        assert_eq!(
            lexical_normalize(Path::new("/a/b/../c/./d")),
            PathBuf::from("/a/c/d")
        );
        assert_eq!(lexical_normalize(Path::new("/a/../../..")), PathBuf::from("/"));
    }
}
