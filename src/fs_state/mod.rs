// src/fs_state/mod.rs

//! In-memory view of what needs compiling.
//!
//! Dirty files are tracked per source root, deleted files per target. None
//! of this is persisted: a fresh process rediscovers it with an initial scan
//! that compares files against the timestamp store.

pub mod scan;

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::project::{BuildTarget, RootDescriptor};
use crate::scope::CompileScope;
use crate::storage::{StampRecord, TimestampStore};

pub use scan::{content_hash, RootScanner};

#[derive(Debug, Default)]
pub struct FsState {
    dirty: BTreeMap<PathBuf, BTreeSet<PathBuf>>,
    deleted: BTreeMap<BuildTarget, BTreeSet<PathBuf>>,
    scanned: BTreeSet<BuildTarget>,
    /// Files marked dirty since the current pass started.
    round: BTreeSet<PathBuf>,
}

impl FsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mark_dirty(&mut self, root: &RootDescriptor, file: &Path) {
        self.dirty
            .entry(root.root.clone())
            .or_default()
            .insert(file.to_path_buf());
        self.round.insert(file.to_path_buf());
    }

    pub fn register_deleted(&mut self, target: &BuildTarget, file: &Path) {
        for files in self.dirty.values_mut() {
            files.remove(file);
        }
        self.deleted
            .entry(target.clone())
            .or_default()
            .insert(file.to_path_buf());
    }

    /// Forget pending recompilation of everything under `root`.
    pub fn clear_recompile(&mut self, root: &Path) {
        self.dirty.remove(root);
    }

    pub fn is_dirty(&self, file: &Path) -> bool {
        self.dirty.values().any(|files| files.contains(file))
    }

    pub fn dirty_files(&self, root: &Path) -> impl Iterator<Item = &Path> {
        self.dirty
            .get(root)
            .into_iter()
            .flat_map(|files| files.iter().map(PathBuf::as_path))
    }

    pub fn has_dirty_files<'a>(&self, roots: impl IntoIterator<Item = &'a RootDescriptor>) -> bool {
        roots
            .into_iter()
            .any(|rd| self.dirty.get(&rd.root).is_some_and(|f| !f.is_empty()))
    }

    /// Visit every dirty file of the given roots until `visitor` returns
    /// `false`.
    pub fn process_files_to_recompile<'a, F>(
        &self,
        roots: impl IntoIterator<Item = &'a RootDescriptor>,
        mut visitor: F,
    ) where
        F: FnMut(&'a RootDescriptor, &Path) -> bool,
    {
        for rd in roots {
            for file in self.dirty_files(&rd.root) {
                if !visitor(rd, file) {
                    return;
                }
            }
        }
    }

    /// Returns true the first time it is called for `target`.
    pub fn mark_initial_scan_performed(&mut self, target: &BuildTarget) -> bool {
        self.scanned.insert(target.clone())
    }

    pub fn deleted_paths(&self, target: &BuildTarget) -> Vec<PathBuf> {
        self.deleted
            .get(target)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear_deleted_paths(&mut self, target: &BuildTarget) {
        self.deleted.remove(target);
    }

    /// Save stamps for the dirty files of `root` that the scope covers and
    /// that have not changed since `start_stamp`, and stop tracking them.
    ///
    /// Returns whether any file was marked.
    pub fn mark_all_up_to_date(
        &mut self,
        fs: &dyn FileSystem,
        scope: &CompileScope,
        root: &RootDescriptor,
        stamps: &mut dyn TimestampStore,
        start_stamp: u64,
        use_hash: bool,
    ) -> Result<bool> {
        let Some(files) = self.dirty.get_mut(&root.root) else {
            return Ok(false);
        };

        let mut marked = false;
        let mut remaining = BTreeSet::new();
        for file in std::mem::take(files) {
            if !scope.is_affected_file(&root.target, &file) {
                remaining.insert(file);
                continue;
            }
            let Ok(stamp) = fs.modified(&file) else {
                // Gone; the next scan reports it as deleted.
                continue;
            };
            if stamp > start_stamp {
                remaining.insert(file);
                continue;
            }
            let mut record = StampRecord::new(stamp);
            if use_hash {
                record.hash = Some(content_hash(fs, &file)?);
            }
            stamps.save(&root.target, &file, record)?;
            marked = true;
        }

        if remaining.is_empty() {
            self.dirty.remove(&root.root);
        } else {
            self.dirty.insert(root.root.clone(), remaining);
        }
        Ok(marked)
    }

    pub fn before_next_round_start(&mut self) {
        self.round.clear();
    }

    pub fn round_files(&self) -> &BTreeSet<PathBuf> {
        &self.round
    }

    /// Drop everything; a full rebuild starts from nothing.
    pub fn on_rebuild(&mut self) {
        debug!("resetting file-system state for rebuild");
        self.dirty.clear();
        self.deleted.clear();
        self.scanned.clear();
        self.round.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;
    use crate::storage::MemoryTimestampStore;
    use crate::types::Variant;

    fn root() -> RootDescriptor {
        RootDescriptor {
            root: PathBuf::from("/p/src"),
            target: BuildTarget::production("core"),
            is_test: false,
            package_prefix: String::new(),
        }
    }

    #[test]
    fn files_changed_after_start_stay_dirty() {
        let fs = MockFileSystem::new();
        fs.add_file("/p/src/old.txt", "old");
        let start = fs.tick();
        fs.add_file("/p/src/new.txt", "new");

        let rd = root();
        let mut state = FsState::new();
        state.mark_dirty(&rd, Path::new("/p/src/old.txt"));
        state.mark_dirty(&rd, Path::new("/p/src/new.txt"));

        let mut stamps = MemoryTimestampStore::new();
        let scope = CompileScope::all(false);
        let marked = state
            .mark_all_up_to_date(&fs, &scope, &rd, &mut stamps, start, false)
            .unwrap();

        assert!(marked);
        assert!(!state.is_dirty(Path::new("/p/src/old.txt")));
        assert!(state.is_dirty(Path::new("/p/src/new.txt")));
        assert!(stamps
            .get(&rd.target, Path::new("/p/src/old.txt"))
            .unwrap()
            .is_some());
    }

    #[test]
    fn first_scan_flag_and_deleted_lists() {
        let mut state = FsState::new();
        let target = BuildTarget::new("core", Variant::Test);
        assert!(state.mark_initial_scan_performed(&target));
        assert!(!state.mark_initial_scan_performed(&target));

        state.register_deleted(&target, Path::new("/p/tests/gone.txt"));
        assert_eq!(state.deleted_paths(&target), vec![PathBuf::from("/p/tests/gone.txt")]);
        state.clear_deleted_paths(&target);
        assert!(state.deleted_paths(&target).is_empty());

        state.on_rebuild();
        assert!(state.mark_initial_scan_performed(&target));
    }

    #[test]
    fn visiting_dirty_files_stops_when_asked() {
        let rd = root();
        let mut state = FsState::new();
        for name in ["a.txt", "b.txt", "c.txt"] {
            state.mark_dirty(&rd, &rd.root.join(name));
        }

        let mut visited = Vec::new();
        state.process_files_to_recompile([&rd], |_, file| {
            visited.push(file.to_path_buf());
            visited.len() < 2
        });

        assert_eq!(
            visited,
            vec![PathBuf::from("/p/src/a.txt"), PathBuf::from("/p/src/b.txt")]
        );
    }
}
