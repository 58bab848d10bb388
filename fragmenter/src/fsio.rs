//! Filesystem helpers: atomic document writes, the run lock, directory pruning.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use tracing::debug;
use walkdir::WalkDir;

/// Guard that removes a file on drop unless disarmed.
struct TempFileGuard {
    path: PathBuf,
    armed: bool,
}

impl TempFileGuard {
    fn new(path: PathBuf) -> Self {
        Self { path, armed: true }
    }

    fn disarm(&mut self) {
        self.armed = false;
    }
}

impl Drop for TempFileGuard {
    fn drop(&mut self) {
        if self.armed {
            // Best effort; the error being returned matters more.
            let _ = fs::remove_file(&self.path);
        }
    }
}

/// Writes `contents` to `path` with write-then-rename semantics.
///
/// The payload goes to a sibling `*.tmp` file which is synced and renamed
/// over the target, so readers see either the previous file or the complete
/// new one. Parent directories are created as needed. An existing file is
/// replaced, never appended to.
///
/// # Errors
///
/// Returns the underlying I/O error; the temporary file is removed on failure.
pub fn write_atomic(path: &Path, contents: &[u8]) -> io::Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
    tmp_name.push(".tmp");
    let tmp_path = path.with_file_name(tmp_name);
    let mut guard = TempFileGuard::new(tmp_path.clone());

    {
        let mut file = fs::File::create(&tmp_path)?;
        file.write_all(contents)?;
        file.sync_all()?;
    }
    fs::rename(&tmp_path, path)?;
    guard.disarm();
    Ok(())
}

/// Advisory lock on an output directory, held for the lifetime of the value.
///
/// The lock file is created with create-new semantics; a second run finds it
/// and fails instead of interleaving writes. It is removed on drop.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    /// Creates the lock file at `path`.
    ///
    /// Returns `Ok(None)` if the file already exists (another run holds it).
    ///
    /// # Errors
    ///
    /// Returns any other I/O error from creating the file or its directory.
    pub fn acquire(path: &Path) -> io::Result<Option<Self>> {
        Self::acquire_with(path, write_owner)
    }

    fn acquire_with<F>(path: &Path, write: F) -> io::Result<Option<Self>>
    where
        F: FnOnce(&mut fs::File) -> io::Result<()>,
    {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        match fs::OpenOptions::new().write(true).create_new(true).open(path) {
            Ok(mut file) => {
                // From here on the file is ours; the guard removes it unless
                // the lock is handed out.
                let mut guard = TempFileGuard::new(path.to_path_buf());
                write(&mut file)?;
                guard.disarm();
                debug!(lock = %path.display(), "acquired run lock");
                Ok(Some(Self {
                    path: path.to_path_buf(),
                }))
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Returns the lock file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Records the owning process in a freshly created lock file.
fn write_owner<W: Write>(file: &mut W) -> io::Result<()> {
    writeln!(file, "pid {}", std::process::id())?;
    file.flush()
}

impl Drop for RunLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

/// Removes every empty directory below `root` (not `root` itself), deepest
/// first, and returns how many were removed.
///
/// # Errors
///
/// Returns the path and I/O error of the first directory that could not be
/// listed or removed.
pub fn prune_empty_dirs(root: &Path) -> Result<usize, (PathBuf, io::Error)> {
    let mut removed = 0;
    for entry in WalkDir::new(root).min_depth(1).contents_first(true) {
        let entry = entry.map_err(|e| {
            let path = e.path().map(Path::to_path_buf).unwrap_or_else(|| root.to_path_buf());
            (path, io::Error::other(e.to_string()))
        })?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let path = entry.path();
        let empty = fs::read_dir(path)
            .map_err(|e| (path.to_path_buf(), e))?
            .next()
            .is_none();
        if empty {
            fs::remove_dir(path).map_err(|e| (path.to_path_buf(), e))?;
            removed += 1;
        }
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn write_atomic_replaces_instead_of_appending() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join("2023/01/01.ttl");
        write_atomic(&path, b"first")?;
        write_atomic(&path, b"second")?;
        assert_eq!(fs::read_to_string(&path)?, "second");
        assert!(!dir.path().join("2023/01/01.ttl.tmp").exists());
        Ok(())
    }

    #[test]
    fn second_lock_is_refused_until_first_is_dropped() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(".ldes.lock");
        let first = RunLock::acquire(&path)?;
        assert!(first.is_some());
        assert!(RunLock::acquire(&path)?.is_none());
        drop(first);
        assert!(!path.exists());
        assert!(RunLock::acquire(&path)?.is_some());
        Ok(())
    }

    /// A writer that fails like a full disk.
    struct FullDisk;

    impl Write for FullDisk {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::StorageFull, "no space left on device"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn failed_owner_write_is_reported() {
        let err = write_owner(&mut FullDisk);
        assert_eq!(err.map_err(|e| e.kind()), Err(io::ErrorKind::StorageFull));
    }

    #[test]
    fn lock_file_is_removed_when_the_owner_cannot_be_written() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(".ldes.lock");
        let result = RunLock::acquire_with(&path, |_| write_owner(&mut FullDisk));
        assert_eq!(
            result.map(|lock| lock.is_some()).map_err(|e| e.kind()),
            Err(io::ErrorKind::StorageFull)
        );
        assert!(!path.exists());
        // Nothing stale is left to block the next run.
        assert!(RunLock::acquire(&path)?.is_some());
        Ok(())
    }

    #[test]
    fn lock_file_names_its_owner() -> io::Result<()> {
        let dir = TempDir::new()?;
        let path = dir.path().join(".ldes.lock");
        let lock = RunLock::acquire(&path)?;
        assert!(lock.is_some());
        assert_eq!(
            fs::read_to_string(&path)?,
            format!("pid {}\n", std::process::id())
        );
        Ok(())
    }

    #[test]
    fn prune_removes_nested_empty_dirs_only() -> io::Result<()> {
        let dir = TempDir::new()?;
        fs::create_dir_all(dir.path().join("2022/12/31"))?;
        fs::create_dir_all(dir.path().join("2023/01/01"))?;
        fs::write(dir.path().join("2023/01/01/readings.ttl"), "x")?;
        let removed = prune_empty_dirs(dir.path()).map_err(|(_, e)| e)?;
        assert_eq!(removed, 3);
        assert!(!dir.path().join("2022").exists());
        assert!(dir.path().join("2023/01/01/readings.ttl").exists());
        assert!(dir.path().exists());
        Ok(())
    }
}
