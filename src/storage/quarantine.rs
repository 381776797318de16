// src/storage/quarantine.rs

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::{BuildError, Result};
use crate::fs::FileSystem;
use crate::project::BuildTarget;
use crate::storage::persist;

const STORE: &str = "quarantine";

/// Targets that must not be built incrementally on the next make.
///
/// A target lands here when a cascade was requested for it and its chunk
/// did not complete cleanly in the same build.
#[derive(Debug)]
pub struct Quarantine {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
}

impl Quarantine {
    pub fn new(fs: Arc<dyn FileSystem>, data_dir: &Path) -> Self {
        Self {
            fs,
            path: data_dir.join(STORE),
        }
    }

    pub fn load(&self) -> Result<BTreeSet<BuildTarget>> {
        let mut out = BTreeSet::new();
        for row in persist::read_rows(self.fs.as_ref(), &self.path, STORE, 2)?.unwrap_or_default() {
            let mut fields = row.into_iter();
            if let (Some(module), Some(variant)) = (fields.next(), fields.next()) {
                let variant = variant
                    .parse()
                    .map_err(|e: String| BuildError::corrupted(STORE, e))?;
                out.insert(BuildTarget::new(module, variant));
            }
        }
        Ok(out)
    }

    /// Replace the persisted set; an empty set removes the file.
    pub fn store(&self, targets: &BTreeSet<BuildTarget>) -> Result<()> {
        if targets.is_empty() {
            return self.clean();
        }
        let rows = targets
            .iter()
            .map(|t| vec![t.module.clone(), t.variant.to_string()]);
        persist::write_rows(self.fs.as_ref(), &self.path, STORE, rows)
    }

    pub fn clean(&self) -> Result<()> {
        persist::remove_file(self.fs.as_ref(), &self.path, STORE)
    }
}
