// src/storage/timestamps.rs

use std::collections::BTreeMap;
use std::fmt::Debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info};

use crate::errors::{BuildError, Result};
use crate::fs::{to_system_independent, FileSystem};
use crate::project::BuildTarget;
use crate::storage::persist;

const STORE: &str = "timestamps";

/// What was last observed for a source file when it was compiled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StampRecord {
    pub stamp: u64,
    /// blake3 of the content, recorded only when hashing is enabled.
    pub hash: Option<String>,
}

impl StampRecord {
    pub fn new(stamp: u64) -> Self {
        Self { stamp, hash: None }
    }

    pub fn with_hash(mut self, hash: impl Into<String>) -> Self {
        self.hash = Some(hash.into());
        self
    }
}

/// Durable (target, file) -> stamp records.
pub trait TimestampStore: Send + Debug {
    fn get(&mut self, target: &BuildTarget, file: &Path) -> Result<Option<StampRecord>>;
    fn save(&mut self, target: &BuildTarget, file: &Path, record: StampRecord) -> Result<()>;
    fn remove(&mut self, target: &BuildTarget, file: &Path) -> Result<()>;
    /// Forget everything, without reading the existing data.
    fn clean(&mut self) -> Result<()>;
    fn flush(&mut self) -> Result<()>;
}

type Key = (BuildTarget, PathBuf);

/// Stores records in `<data_dir>/timestamps`, loaded on first access.
#[derive(Debug)]
pub struct FileTimestampStore {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    entries: Option<BTreeMap<Key, StampRecord>>,
    dirty: bool,
}

impl FileTimestampStore {
    pub fn new(fs: Arc<dyn FileSystem>, data_dir: &Path) -> Self {
        Self {
            fs,
            path: data_dir.join(STORE),
            entries: None,
            dirty: false,
        }
    }

    fn entries(&mut self) -> Result<&mut BTreeMap<Key, StampRecord>> {
        if self.entries.is_none() {
            let mut map = BTreeMap::new();
            if let Some(rows) = persist::read_rows(self.fs.as_ref(), &self.path, STORE, 5)? {
                for row in rows {
                    let [module, variant, path, stamp, hash]: [String; 5] = row
                        .try_into()
                        .map_err(|_| BuildError::corrupted(STORE, "wrong column count"))?;
                    let variant = variant
                        .parse()
                        .map_err(|e: String| BuildError::corrupted(STORE, e))?;
                    let stamp = stamp
                        .parse::<u64>()
                        .map_err(|e| BuildError::corrupted(STORE, e))?;
                    let hash = (!hash.is_empty()).then_some(hash);
                    map.insert(
                        (BuildTarget::new(module, variant), PathBuf::from(path)),
                        StampRecord { stamp, hash },
                    );
                }
            }
            self.entries = Some(map);
        }
        Ok(self.entries.get_or_insert_with(BTreeMap::new))
    }
}

impl TimestampStore for FileTimestampStore {
    fn get(&mut self, target: &BuildTarget, file: &Path) -> Result<Option<StampRecord>> {
        let key = (target.clone(), file.to_path_buf());
        Ok(self.entries()?.get(&key).cloned())
    }

    fn save(&mut self, target: &BuildTarget, file: &Path, record: StampRecord) -> Result<()> {
        let key = (target.clone(), file.to_path_buf());
        self.entries()?.insert(key, record);
        self.dirty = true;
        Ok(())
    }

    fn remove(&mut self, target: &BuildTarget, file: &Path) -> Result<()> {
        let key = (target.clone(), file.to_path_buf());
        if self.entries()?.remove(&key).is_some() {
            self.dirty = true;
        }
        Ok(())
    }

    fn clean(&mut self) -> Result<()> {
        self.entries = Some(BTreeMap::new());
        self.dirty = false;
        persist::remove_file(self.fs.as_ref(), &self.path, STORE)?;
        info!(path = ?self.path, "cleaned timestamp store");
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let Some(entries) = &self.entries else {
            return Ok(());
        };
        let rows: Vec<Vec<String>> = entries
            .iter()
            .map(|((target, file), record)| {
                vec![
                    target.module.clone(),
                    target.variant.to_string(),
                    to_system_independent(file),
                    record.stamp.to_string(),
                    record.hash.clone().unwrap_or_default(),
                ]
            })
            .collect();
        persist::write_rows(self.fs.as_ref(), &self.path, STORE, rows)?;
        self.dirty = false;
        debug!(records = entries.len(), "flushed timestamp store");
        Ok(())
    }
}

/// Keeps records in memory only.
#[derive(Debug, Default)]
pub struct MemoryTimestampStore {
    entries: BTreeMap<Key, StampRecord>,
}

impl MemoryTimestampStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl TimestampStore for MemoryTimestampStore {
    fn get(&mut self, target: &BuildTarget, file: &Path) -> Result<Option<StampRecord>> {
        Ok(self
            .entries
            .get(&(target.clone(), file.to_path_buf()))
            .cloned())
    }

    fn save(&mut self, target: &BuildTarget, file: &Path, record: StampRecord) -> Result<()> {
        self.entries
            .insert((target.clone(), file.to_path_buf()), record);
        Ok(())
    }

    fn remove(&mut self, target: &BuildTarget, file: &Path) -> Result<()> {
        self.entries.remove(&(target.clone(), file.to_path_buf()));
        Ok(())
    }

    fn clean(&mut self) -> Result<()> {
        self.entries.clear();
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn file_store_round_trips_records_with_and_without_hash() {
        let fs = Arc::new(MockFileSystem::new());
        let data = Path::new("/data");
        let target = BuildTarget::production("core");

        let mut store = FileTimestampStore::new(fs.clone(), data);
        store
            .save(&target, Path::new("/p/a.txt"), StampRecord::new(7))
            .unwrap();
        store
            .save(&target, Path::new("/p/b.txt"), StampRecord::new(9).with_hash("abc"))
            .unwrap();
        store.flush().unwrap();

        let mut reloaded = FileTimestampStore::new(fs, data);
        assert_eq!(
            reloaded.get(&target, Path::new("/p/a.txt")).unwrap(),
            Some(StampRecord::new(7))
        );
        assert_eq!(
            reloaded
                .get(&target, Path::new("/p/b.txt"))
                .unwrap()
                .and_then(|r| r.hash),
            Some("abc".to_string())
        );
        assert_eq!(
            reloaded
                .get(&BuildTarget::test("core"), Path::new("/p/a.txt"))
                .unwrap(),
            None
        );
    }

    #[test]
    fn clean_recovers_from_a_corrupted_file() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("/data/timestamps", "incbuild timestamps v1\nonly\ttwo\n");
        let target = BuildTarget::production("core");

        let mut store = FileTimestampStore::new(fs, Path::new("/data"));
        assert!(store
            .get(&target, Path::new("/p/a.txt"))
            .unwrap_err()
            .is_store_corruption());

        store.clean().unwrap();
        assert_eq!(store.get(&target, Path::new("/p/a.txt")).unwrap(), None);
    }
}
