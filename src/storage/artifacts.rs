// src/storage/artifacts.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::storage::persist::PathTable;

const STORE: &str = "artifacts";

/// Source -> secondary artifact bound to it (for example a layout file a
/// generator reads alongside the source).
///
/// When the source disappears the artifact is not deleted; it is marked
/// dirty so whatever consumes it gets rebuilt.
#[derive(Debug)]
pub struct ArtifactMapping {
    table: PathTable,
}

impl ArtifactMapping {
    pub fn new(fs: Arc<dyn FileSystem>, data_dir: &Path) -> Self {
        Self {
            table: PathTable::new(fs, data_dir.join(STORE), STORE),
        }
    }

    pub fn get(&mut self, source: &Path) -> Result<Option<PathBuf>> {
        Ok(self.table.get(source)?.into_iter().next())
    }

    pub fn update(&mut self, source: &Path, artifact: impl Into<PathBuf>) -> Result<()> {
        self.table.set(source, [artifact.into()])
    }

    pub fn remove(&mut self, source: &Path) -> Result<()> {
        self.table.remove(source)
    }

    pub fn clean(&mut self) -> Result<()> {
        self.table.clean()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.table.flush()
    }
}
