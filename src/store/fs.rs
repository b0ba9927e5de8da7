//! store::fs
//!
//! Filesystem-backed store rooted at a directory.
//!
//! # Storage Layout
//!
//! - `<root>/<resource>` - Resource content
//! - `<root>/.workcopy/lock` - Writer lock
//! - `<root>/.workcopy/history/<resource>/<seq>-<uuid>` - Preserved versions
//!
//! # Atomicity
//!
//! Writes go to a temporary file next to the target, are fsynced, then
//! renamed over the target. A failure at any point leaves the previous
//! content in place. A replaced file keeps its permissions, and its
//! previous version enters history only once the rename has succeeded.
//!
//! # Markers
//!
//! Markers hash the file length and modification time. On unix they also
//! cover the inode, device and status change time, so an external rewrite
//! that restores the modification time still changes the marker.

use std::fs::{self, File, OpenOptions, Permissions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use tracing::{debug, warn};
use uuid::Uuid;

use crate::core::types::{ModificationMarker, ResourcePath};

use super::lock::StoreLock;
use super::{ResourceStore, StoreError, WriteMode, WriteOptions};

/// Path routing for a filesystem store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePaths {
    root: PathBuf,
}

impl StorePaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<root>/.workcopy`
    pub fn state_dir(&self) -> PathBuf {
        self.root.join(".workcopy")
    }

    /// `<root>/.workcopy/lock`
    pub fn lock_path(&self) -> PathBuf {
        self.state_dir().join("lock")
    }

    /// `<root>/.workcopy/history/<resource>`
    pub fn history_dir(&self, resource: &ResourcePath) -> PathBuf {
        resource
            .components()
            .fold(self.state_dir().join("history"), |dir, c| dir.join(c))
    }

    /// `<root>/<resource>`
    pub fn resource_path(&self, resource: &ResourcePath) -> PathBuf {
        resource
            .components()
            .fold(self.root.clone(), |dir, c| dir.join(c))
    }
}

/// Store over a directory tree.
#[derive(Debug, Clone)]
pub struct FsStore {
    paths: StorePaths,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            paths: StorePaths::new(root),
        }
    }

    pub fn paths(&self) -> &StorePaths {
        &self.paths
    }

    fn marker_for(path: &Path) -> Option<ModificationMarker> {
        let metadata = fs::metadata(path).ok()?;
        if !metadata.is_file() {
            return None;
        }
        let nanos = metadata
            .modified()
            .ok()?
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        Some(ModificationMarker::from_metadata(
            metadata.len(),
            nanos,
            &file_identity(&metadata),
        ))
    }

    fn preserve(&self, resource: &ResourcePath, previous: &[u8]) -> Result<(), std::io::Error> {
        let dir = self.paths.history_dir(resource);
        fs::create_dir_all(&dir)?;
        let seq = fs::read_dir(&dir)?.count();
        let entry = dir.join(format!("{seq:08}-{}", Uuid::new_v4().simple()));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&entry)?;
        file.write_all(previous)?;
        file.sync_all()?;
        Ok(())
    }

    fn write_atomic(
        target: &Path,
        bytes: &[u8],
        permissions: Option<Permissions>,
    ) -> Result<(), std::io::Error> {
        let dir = target.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(dir)?;

        let name = target
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let temp = dir.join(format!(".{name}.{}.tmp", Uuid::new_v4().simple()));

        let result = (|| {
            let mut file = OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&temp)?;
            file.write_all(bytes)?;
            file.sync_all()?;
            if let Some(permissions) = permissions {
                file.set_permissions(permissions)?;
            }
            drop(file);
            fs::rename(&temp, target)
        })();

        if result.is_err() {
            if let Err(e) = fs::remove_file(&temp) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(path = %temp.display(), error = %e, "failed to remove temporary file");
                }
            }
        }
        result
    }
}

impl ResourceStore for FsStore {
    fn exists(&self, resource: &ResourcePath) -> bool {
        self.paths.resource_path(resource).is_file()
    }

    fn read_bytes(&self, resource: &ResourcePath) -> Result<Vec<u8>, StoreError> {
        let path = self.paths.resource_path(resource);
        fs::read(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => StoreError::NotFound(resource.clone()),
            _ => StoreError::Io {
                resource: resource.clone(),
                source: e,
            },
        })
    }

    fn modification_marker(&self, resource: &ResourcePath) -> Option<ModificationMarker> {
        Self::marker_for(&self.paths.resource_path(resource))
    }

    fn write_bytes(
        &self,
        resource: &ResourcePath,
        bytes: &[u8],
        options: WriteOptions,
    ) -> Result<ModificationMarker, StoreError> {
        let _lock = StoreLock::acquire(&self.paths.lock_path())?;
        let target = self.paths.resource_path(resource);
        let io = |source: std::io::Error| StoreError::Io {
            resource: resource.clone(),
            source,
        };

        let existing = match fs::metadata(&target) {
            Ok(metadata) => Some(metadata),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(io(e)),
        };

        match (&existing, options.mode) {
            (Some(_), WriteMode::Create) if !options.overwrite => {
                return Err(StoreError::AlreadyExists(resource.clone()))
            }
            (Some(metadata), _) if metadata.permissions().readonly() && !options.overwrite => {
                return Err(StoreError::ReadOnly(resource.clone()))
            }
            (None, WriteMode::Replace) => return Err(StoreError::NotFound(resource.clone())),
            _ => {}
        }

        let previous = match &existing {
            Some(_) if options.keep_history => Some(fs::read(&target).map_err(io)?),
            _ => None,
        };

        Self::write_atomic(&target, bytes, existing.map(|m| m.permissions())).map_err(io)?;
        debug!(
            resource = %resource,
            mode = %options.mode,
            bytes = bytes.len(),
            "resource written"
        );

        if let Some(previous) = previous {
            if let Err(e) = self.preserve(resource, &previous) {
                warn!(resource = %resource, error = %e, "failed to preserve previous version");
            }
        }

        Self::marker_for(&target).ok_or_else(|| StoreError::NotFound(resource.clone()))
    }

    fn history(&self, resource: &ResourcePath) -> Result<Vec<Vec<u8>>, StoreError> {
        let dir = self.paths.history_dir(resource);
        let io = |source: std::io::Error| StoreError::Io {
            resource: resource.clone(),
            source,
        };

        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(io(e)),
        };

        let mut files = entries
            .map(|entry| entry.map(|e| e.path()))
            .collect::<Result<Vec<_>, _>>()
            .map_err(io)?;
        files.retain(|p| p.is_file());
        files.sort();

        files
            .iter()
            .map(|p| fs::read(p).map_err(io))
            .collect()
    }
}

#[cfg(unix)]
fn file_identity(metadata: &fs::Metadata) -> Vec<u64> {
    use std::os::unix::fs::MetadataExt;

    vec![
        metadata.ino(),
        metadata.dev(),
        metadata.ctime() as u64,
        metadata.ctime_nsec() as u64,
    ]
}

#[cfg(not(unix))]
fn file_identity(_metadata: &fs::Metadata) -> Vec<u64> {
    Vec::new()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn path(p: &str) -> ResourcePath {
        ResourcePath::new(p).unwrap()
    }

    fn options(mode: WriteMode, overwrite: bool, keep_history: bool) -> WriteOptions {
        WriteOptions {
            mode,
            overwrite,
            keep_history,
        }
    }

    #[test]
    fn paths_layout() {
        let paths = StorePaths::new("/ws");
        let p = path("src/app/A.unit");
        assert_eq!(paths.resource_path(&p), PathBuf::from("/ws/src/app/A.unit"));
        assert_eq!(paths.lock_path(), PathBuf::from("/ws/.workcopy/lock"));
        assert_eq!(
            paths.history_dir(&p),
            PathBuf::from("/ws/.workcopy/history/src/app/A.unit")
        );
    }

    #[test]
    fn create_then_read() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let p = path("src/A.unit");

        assert!(!store.exists(&p));
        assert!(store.modification_marker(&p).is_none());
        store
            .write_bytes(&p, b"type A\n", options(WriteMode::Create, false, false))
            .unwrap();
        assert!(store.exists(&p));
        assert_eq!(store.read_bytes(&p).unwrap(), b"type A\n");
    }

    #[test]
    fn create_existing_without_overwrite_fails() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let p = path("A.unit");
        fs::write(dir.path().join("A.unit"), b"old").unwrap();

        let err = store
            .write_bytes(&p, b"new", options(WriteMode::Create, false, false))
            .unwrap_err();
        assert!(matches!(err, StoreError::AlreadyExists(_)));
        assert_eq!(fs::read(dir.path().join("A.unit")).unwrap(), b"old");
    }

    #[test]
    fn replace_missing_fails() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let err = store
            .write_bytes(&path("A.unit"), b"x", options(WriteMode::Replace, true, false))
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
    }

    #[test]
    fn replace_keeps_history_in_order() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let p = path("src/A.unit");
        store
            .write_bytes(&p, b"v1", options(WriteMode::Create, false, false))
            .unwrap();
        store
            .write_bytes(&p, b"v22", options(WriteMode::Replace, false, true))
            .unwrap();
        store
            .write_bytes(&p, b"v333", options(WriteMode::Replace, false, true))
            .unwrap();

        assert_eq!(store.read_bytes(&p).unwrap(), b"v333");
        assert_eq!(
            store.history(&p).unwrap(),
            vec![b"v1".to_vec(), b"v22".to_vec()]
        );
    }

    #[test]
    fn marker_changes_on_write() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let p = path("A.unit");
        let first = store
            .write_bytes(&p, b"short", options(WriteMode::Create, false, false))
            .unwrap();
        assert_eq!(store.modification_marker(&p), Some(first.clone()));
        let second = store
            .write_bytes(&p, b"much longer", options(WriteMode::Replace, false, false))
            .unwrap();
        assert_ne!(first, second);
    }

    #[test]
    fn read_only_requires_overwrite() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let p = path("A.unit");
        let file = dir.path().join("A.unit");
        fs::write(&file, b"old").unwrap();
        let mut perms = fs::metadata(&file).unwrap().permissions();
        perms.set_readonly(true);
        fs::set_permissions(&file, perms).unwrap();

        let err = store
            .write_bytes(&p, b"new", options(WriteMode::Replace, false, false))
            .unwrap_err();
        assert!(matches!(err, StoreError::ReadOnly(_)));

        store
            .write_bytes(&p, b"new", options(WriteMode::Replace, true, false))
            .unwrap();
        assert_eq!(fs::read(&file).unwrap(), b"new");
        assert!(fs::metadata(&file).unwrap().permissions().readonly());
    }

    #[cfg(unix)]
    #[test]
    fn replace_keeps_mode_bits() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let file = dir.path().join("run.unit");
        fs::write(&file, b"old").unwrap();
        fs::set_permissions(&file, Permissions::from_mode(0o750)).unwrap();

        store
            .write_bytes(&path("run.unit"), b"new", options(WriteMode::Replace, false, false))
            .unwrap();
        let mode = fs::metadata(&file).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o750);
    }

    #[test]
    fn failed_write_leaves_no_history() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        // Long enough that the temporary name next to it exceeds NAME_MAX.
        let name = format!("{}.unit", "a".repeat(245));
        let p = path(&name);
        fs::write(dir.path().join(&name), b"old").unwrap();

        let err = store
            .write_bytes(&p, b"new", options(WriteMode::Replace, false, true))
            .unwrap_err();
        assert!(matches!(err, StoreError::Io { .. }));
        assert_eq!(store.read_bytes(&p).unwrap(), b"old");
        assert!(store.history(&p).unwrap().is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn marker_sees_rewrite_with_restored_mtime() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let p = path("A.unit");
        let file = dir.path().join("A.unit");
        let before = store
            .write_bytes(&p, b"type A\n", options(WriteMode::Create, false, false))
            .unwrap();
        let mtime = fs::metadata(&file).unwrap().modified().unwrap();

        // Let the status change clock tick past the write above.
        std::thread::sleep(std::time::Duration::from_millis(50));
        fs::write(&file, b"type B\n").unwrap();
        File::options()
            .write(true)
            .open(&file)
            .unwrap()
            .set_modified(mtime)
            .unwrap();

        let metadata = fs::metadata(&file).unwrap();
        assert_eq!(metadata.modified().unwrap(), mtime);
        assert_eq!(metadata.len(), 7);
        assert_ne!(store.modification_marker(&p), Some(before));
    }

    #[test]
    fn no_temporary_files_left_behind() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        store
            .write_bytes(&path("src/A.unit"), b"x", options(WriteMode::Create, false, false))
            .unwrap();
        let names: Vec<_> = fs::read_dir(dir.path().join("src"))
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["A.unit".to_string()]);
    }

    #[test]
    fn write_fails_while_locked() {
        let dir = TempDir::new().unwrap();
        let store = FsStore::new(dir.path());
        let _held = StoreLock::acquire(&store.paths().lock_path()).unwrap();
        let err = store
            .write_bytes(&path("A.unit"), b"x", options(WriteMode::Create, false, false))
            .unwrap_err();
        assert!(matches!(err, StoreError::Lock(_)));
        assert!(!store.exists(&path("A.unit")));
    }
}
