// src/storage/mod.rs

//! Persistent build data kept under the project's data directory:
//!
//! ```text
//! <data_dir>/timestamps
//! <data_dir>/mappings/<module>-<hash>.<variant>
//! <data_dir>/artifacts
//! <data_dir>/output-layout
//! <data_dir>/quarantine
//! ```

pub mod artifacts;
pub mod layout;
pub mod output_mapping;
pub mod persist;
pub mod quarantine;
pub mod timestamps;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::project::BuildTarget;

pub use artifacts::ArtifactMapping;
pub use layout::{OutputRoots, OutputRootsLayout};
pub use output_mapping::OutputMapping;
pub use quarantine::Quarantine;
pub use timestamps::{FileTimestampStore, MemoryTimestampStore, StampRecord, TimestampStore};

/// Owns every persistent store of a project.
#[derive(Debug)]
pub struct BuildDataManager {
    fs: Arc<dyn FileSystem>,
    data_dir: PathBuf,
    timestamps: Box<dyn TimestampStore>,
    mappings: BTreeMap<BuildTarget, OutputMapping>,
    artifacts: ArtifactMapping,
    layout: OutputRootsLayout,
    quarantine: Quarantine,
}

impl BuildDataManager {
    pub fn new(fs: Arc<dyn FileSystem>, data_dir: impl Into<PathBuf>) -> Self {
        let data_dir = data_dir.into();
        let timestamps = Box::new(FileTimestampStore::new(fs.clone(), &data_dir));
        Self::with_timestamp_store(fs, data_dir, timestamps)
    }

    pub fn with_timestamp_store(
        fs: Arc<dyn FileSystem>,
        data_dir: impl Into<PathBuf>,
        timestamps: Box<dyn TimestampStore>,
    ) -> Self {
        let data_dir = data_dir.into();
        Self {
            artifacts: ArtifactMapping::new(fs.clone(), &data_dir),
            layout: OutputRootsLayout::new(fs.clone(), &data_dir),
            quarantine: Quarantine::new(fs.clone(), &data_dir),
            mappings: BTreeMap::new(),
            timestamps,
            data_dir,
            fs,
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn timestamps(&mut self) -> &mut dyn TimestampStore {
        self.timestamps.as_mut()
    }

    pub fn output_mapping(&mut self, target: &BuildTarget) -> &mut OutputMapping {
        let fs = self.fs.clone();
        let data_dir = &self.data_dir;
        self.mappings
            .entry(target.clone())
            .or_insert_with(|| OutputMapping::new(fs, data_dir, target))
    }

    pub fn artifacts(&mut self) -> &mut ArtifactMapping {
        &mut self.artifacts
    }

    pub fn layout(&mut self) -> &mut OutputRootsLayout {
        &mut self.layout
    }

    pub fn quarantine(&self) -> &Quarantine {
        &self.quarantine
    }

    /// Erase all build data. Existing files are deleted unread, so this also
    /// works when they are corrupted.
    pub fn clean(&mut self) -> Result<()> {
        self.timestamps.clean()?;
        for mapping in self.mappings.values_mut() {
            mapping.clean()?;
        }
        self.mappings.clear();
        persist::remove_file(
            self.fs.as_ref(),
            &self.data_dir.join(output_mapping::MAPPINGS_DIR),
            "output-mapping",
        )?;
        self.artifacts.clean()?;
        self.layout.clean()?;
        self.quarantine.clean()?;
        info!(data_dir = ?self.data_dir, "cleaned build data");
        Ok(())
    }

    /// Flush the output mappings of the given targets.
    pub fn flush_mappings<'a>(
        &mut self,
        targets: impl IntoIterator<Item = &'a BuildTarget>,
    ) -> Result<()> {
        for target in targets {
            if let Some(mapping) = self.mappings.get_mut(target) {
                mapping.flush()?;
            }
        }
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.timestamps.flush()?;
        for mapping in self.mappings.values_mut() {
            mapping.flush()?;
        }
        self.artifacts.flush()?;
        self.layout.flush()?;
        Ok(())
    }
}
