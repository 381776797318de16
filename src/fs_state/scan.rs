// src/fs_state/scan.rs

use std::collections::BTreeSet;
use std::io::Read;
use std::path::{Path, PathBuf};

use anyhow::Context;
use blake3::Hasher;
use tracing::{debug, trace};

use crate::errors::Result;
use crate::fs::{is_under_any, FileSystem};
use crate::fs_state::FsState;
use crate::project::RootDescriptor;
use crate::storage::{StampRecord, TimestampStore};

/// Compute the blake3 hash of a single file.
pub fn content_hash(fs: &dyn FileSystem, path: &Path) -> anyhow::Result<String> {
    let mut hasher = Hasher::new();
    let mut file = fs
        .open_read(path)
        .with_context(|| format!("opening file for hashing: {:?}", path))?;
    let mut buf = [0u8; 8192];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hasher.finalize().to_hex().to_string())
}

/// Walks source roots and marks files whose stamps no longer match.
pub struct RootScanner<'a> {
    pub fs: &'a dyn FileSystem,
    pub stamps: &'a mut dyn TimestampStore,
    /// Mark every file regardless of its stamp.
    pub force_dirty: bool,
    /// Drop the stored record of each marked file. Off during a full rebuild,
    /// where the store has already been emptied.
    pub invalidate: bool,
    pub use_hash: bool,
}

impl RootScanner<'_> {
    /// Scan one root, adding every file seen to `seen`.
    ///
    /// Directories in `excludes` and in `nested` (roots owned by another
    /// descriptor) are skipped. Returns how many files were marked dirty.
    pub fn scan(
        &mut self,
        state: &mut FsState,
        rd: &RootDescriptor,
        excludes: &[PathBuf],
        nested: &[PathBuf],
        seen: &mut BTreeSet<PathBuf>,
    ) -> Result<usize> {
        if !self.fs.is_dir(&rd.root) {
            return Ok(0);
        }

        let mut marked = 0;
        let mut stack = vec![rd.root.clone()];
        while let Some(path) = stack.pop() {
            if is_under_any(excludes, &path) {
                continue;
            }
            if self.fs.is_dir(&path) {
                if path != rd.root && nested.iter().any(|n| n == &path) {
                    continue;
                }
                stack.extend(self.fs.read_dir(&path)?);
                continue;
            }

            if self.is_stale(rd, &path)? {
                trace!(file = ?path, target = %rd.target, "marking dirty");
                state.mark_dirty(rd, &path);
                if self.invalidate {
                    self.stamps.remove(&rd.target, &path)?;
                }
                marked += 1;
            }
            seen.insert(path);
        }

        debug!(root = ?rd.root, target = %rd.target, marked, "scanned source root");
        Ok(marked)
    }

    fn is_stale(&mut self, rd: &RootDescriptor, file: &Path) -> Result<bool> {
        if self.force_dirty {
            return Ok(true);
        }
        let current = self.fs.modified(file)?;
        let Some(record) = self.stamps.get(&rd.target, file)? else {
            return Ok(true);
        };
        if record.stamp == current {
            return Ok(false);
        }
        if !self.use_hash {
            return Ok(true);
        }
        let Some(stored) = record.hash else {
            return Ok(true);
        };

        let hash = content_hash(self.fs, file)?;
        if hash != stored {
            return Ok(true);
        }
        // Touched but unchanged: refresh the stamp and keep it clean.
        debug!(file = ?file, "content hash unchanged, refreshing stamp");
        self.stamps
            .save(&rd.target, file, StampRecord::new(current).with_hash(hash))?;
        Ok(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::project::BuildTarget;
    use crate::storage::MemoryTimestampStore;

    fn rd(root: &str) -> RootDescriptor {
        RootDescriptor {
            root: PathBuf::from(root),
            target: BuildTarget::production("core"),
            is_test: false,
            package_prefix: String::new(),
        }
    }

    #[test]
    fn scan_skips_excludes_and_nested_roots() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/a.txt", "a");
        fs.add_file("/p/src/skip/b.txt", "b");
        fs.add_file("/p/src/gen/c.txt", "c");

        let mut stamps = MemoryTimestampStore::new();
        let mut state = FsState::new();
        let mut seen = BTreeSet::new();
        let mut scanner = RootScanner {
            fs: &fs,
            stamps: &mut stamps,
            force_dirty: false,
            invalidate: true,
            use_hash: false,
        };

        let marked = scanner
            .scan(
                &mut state,
                &rd("/p/src"),
                &[PathBuf::from("/p/src/skip")],
                &[PathBuf::from("/p/src/gen")],
                &mut seen,
            )
            .unwrap();

        assert_eq!(marked, 1);
        assert_eq!(seen.into_iter().collect::<Vec<_>>(), vec![PathBuf::from("/p/src/a.txt")]);
    }

    #[test]
    fn touched_file_with_same_hash_stays_clean() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/a.txt", "same");
        let root = rd("/p/src");
        let file = Path::new("/p/src/a.txt");

        let mut stamps = MemoryTimestampStore::new();
        let hash = content_hash(&fs, file).unwrap();
        let old = fs.modified(file).unwrap();
        stamps
            .save(&root.target, file, StampRecord::new(old).with_hash(hash))
            .unwrap();
        fs.touch(file);

        let mut state = FsState::new();
        let mut scanner = RootScanner {
            fs: &fs,
            stamps: &mut stamps,
            force_dirty: false,
            invalidate: true,
            use_hash: true,
        };
        let marked = scanner
            .scan(&mut state, &root, &[], &[], &mut BTreeSet::new())
            .unwrap();

        assert_eq!(marked, 0);
        let refreshed = stamps.get(&root.target, file).unwrap().unwrap();
        assert_eq!(refreshed.stamp, fs.modified(file).unwrap());
    }
}
