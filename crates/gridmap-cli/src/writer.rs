//! Lock-guarded mapfile appends.
//!
//! Workers that resolve files of the same dataset race on one mapfile. Two
//! layers serialize them:
//! - an in-process mutex per output path (workers in this process), and
//! - an on-disk `<mapfile>.lock` file created with create-new semantics
//!   (concurrent gridmap processes writing into the same output directory).
//!
//! The disk lock is acquired with bounded retry; a timeout is a per-file
//! failure surfaced to the driver, never a crash of the pool. Appends to
//! one mapfile happen in lock-acquisition order; consumers treat lines as
//! independent records, so that order carries no meaning.

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;

const LOCK_RETRY: Duration = Duration::from_millis(50);

/// Per-file mapfile write errors.
#[derive(Error, Debug)]
pub enum WriteError {
    #[error("timed out acquiring lock file {path} after {waited:?}")]
    LockTimeout { path: PathBuf, waited: Duration },

    #[error("failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Serializes appends to mapfiles below one output directory.
pub struct MapfileWriter {
    outdir: PathBuf,
    lock_timeout: Duration,
    locks: Mutex<BTreeMap<PathBuf, Arc<Mutex<()>>>>,
}

impl MapfileWriter {
    pub fn new(outdir: &Path, lock_timeout: Duration) -> Self {
        Self {
            outdir: outdir.to_path_buf(),
            lock_timeout,
            locks: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn outdir(&self) -> &Path {
        &self.outdir
    }

    /// Append one record line to the named mapfile.
    pub fn append(&self, name: &str, line: &str) -> Result<PathBuf, WriteError> {
        let path = self.outdir.join(name);
        let io_err = |source| WriteError::Io {
            path: path.clone(),
            source,
        };

        let file_lock = {
            let mut locks = self.locks.lock();
            Arc::clone(locks.entry(path.clone()).or_default())
        };
        let _guard = file_lock.lock();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io_err)?;
        }
        let _disk_lock = DiskLock::acquire(&path, self.lock_timeout)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        writeln!(file, "{line}").map_err(io_err)?;
        Ok(path)
    }
}

/// An exclusive `<mapfile>.lock` marker, removed on drop.
struct DiskLock {
    path: PathBuf,
}

impl DiskLock {
    fn acquire(mapfile: &Path, timeout: Duration) -> Result<Self, WriteError> {
        let path = mapfile.with_extension("map.lock");
        let started = Instant::now();
        loop {
            match OpenOptions::new().write(true).create_new(true).open(&path) {
                Ok(_) => return Ok(Self { path }),
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    if started.elapsed() >= timeout {
                        return Err(WriteError::LockTimeout {
                            path,
                            waited: started.elapsed(),
                        });
                    }
                    std::thread::sleep(LOCK_RETRY);
                }
                Err(source) => return Err(WriteError::Io { path, source }),
            }
        }
    }
}

impl Drop for DiskLock {
    fn drop(&mut self) {
        let _ = std::fs::remove_file(&self.path);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn appends_accumulate_lines() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = MapfileWriter::new(tmp.path(), Duration::from_secs(1));
        writer.append("a.map", "line1").unwrap();
        writer.append("a.map", "line2").unwrap();
        let content = std::fs::read_to_string(tmp.path().join("a.map")).unwrap();
        assert_eq!(content, "line1\nline2\n");
    }

    #[test]
    fn lock_file_is_removed_after_append() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = MapfileWriter::new(tmp.path(), Duration::from_secs(1));
        writer.append("a.map", "line").unwrap();
        assert!(!tmp.path().join("a.map.lock").exists());
    }

    #[test]
    fn stale_lock_times_out() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("a.map.lock"), b"").unwrap();
        let writer = MapfileWriter::new(tmp.path(), Duration::from_millis(120));
        assert!(matches!(
            writer.append("a.map", "line"),
            Err(WriteError::LockTimeout { .. })
        ));
    }

    #[test]
    fn concurrent_appends_do_not_interleave() {
        let tmp = tempfile::tempdir().unwrap();
        let writer = std::sync::Arc::new(MapfileWriter::new(tmp.path(), Duration::from_secs(5)));
        let mut handles = Vec::new();
        for i in 0..8 {
            let writer = std::sync::Arc::clone(&writer);
            handles.push(std::thread::spawn(move || {
                writer.append("shared.map", &format!("record-{i}")).unwrap();
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        let content = std::fs::read_to_string(tmp.path().join("shared.map")).unwrap();
        let mut lines: Vec<&str> = content.lines().collect();
        lines.sort_unstable();
        assert_eq!(lines.len(), 8);
        assert_eq!(lines[0], "record-0");
        assert_eq!(lines[7], "record-7");
    }
}
