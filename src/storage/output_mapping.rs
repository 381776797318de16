// src/storage/output_mapping.rs

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::Result;
use crate::fs::FileSystem;
use crate::project::BuildTarget;
use crate::storage::persist::PathTable;

/// Directory under the data dir holding one mapping file per target.
pub const MAPPINGS_DIR: &str = "mappings";

/// File name for a target's mapping: readable module prefix plus a short
/// hash of the exact name so distinct modules never collide.
pub fn mapping_file_name(target: &BuildTarget) -> String {
    let readable: String = target
        .module
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect();
    let hash = blake3::hash(target.module.as_bytes()).to_hex();
    format!("{readable}-{}.{}", &hash.as_str()[..8], target.variant)
}

/// Source file -> outputs generated from it, for one target.
#[derive(Debug)]
pub struct OutputMapping {
    table: PathTable,
}

impl OutputMapping {
    pub fn new(fs: Arc<dyn FileSystem>, data_dir: &Path, target: &BuildTarget) -> Self {
        let path = data_dir.join(MAPPINGS_DIR).join(mapping_file_name(target));
        Self {
            table: PathTable::new(fs, path, "output-mapping"),
        }
    }

    /// Replace the outputs recorded for `source`.
    pub fn record(
        &mut self,
        source: &Path,
        outputs: impl IntoIterator<Item = PathBuf>,
    ) -> Result<()> {
        self.table.set(source, outputs)
    }

    pub fn append_output(&mut self, source: &Path, output: impl Into<PathBuf>) -> Result<()> {
        self.table.add(source, output.into())
    }

    pub fn outputs(&mut self, source: &Path) -> Result<Vec<PathBuf>> {
        self.table.get(source)
    }

    pub fn remove(&mut self, source: &Path) -> Result<()> {
        self.table.remove(source)
    }

    pub fn sources(&mut self) -> Result<Vec<PathBuf>> {
        self.table.keys()
    }

    pub fn clean(&mut self) -> Result<()> {
        self.table.clean()
    }

    pub fn flush(&mut self) -> Result<()> {
        self.table.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn file_names_are_distinct_for_similar_modules() {
        let a = mapping_file_name(&BuildTarget::production("My Module"));
        let b = mapping_file_name(&BuildTarget::production("my_module"));
        assert!(a.starts_with("my_module-"));
        assert!(a.ends_with(".production"));
        assert_ne!(a, b);
    }

    #[test]
    fn record_replaces_and_remove_drops() {
        let fs = Arc::new(MockFileSystem::new());
        let target = BuildTarget::test("core");
        let mut mapping = OutputMapping::new(fs.clone(), Path::new("/data"), &target);

        let src = Path::new("/p/tests/a.txt");
        mapping.append_output(src, "/out/a.old").unwrap();
        mapping.record(src, [PathBuf::from("/out/a.new")]).unwrap();
        assert_eq!(mapping.outputs(src).unwrap(), vec![PathBuf::from("/out/a.new")]);

        mapping.flush().unwrap();
        let mut reloaded = OutputMapping::new(fs, Path::new("/data"), &target);
        assert_eq!(reloaded.sources().unwrap(), vec![src.to_path_buf()]);

        reloaded.remove(src).unwrap();
        assert!(reloaded.outputs(src).unwrap().is_empty());
    }
}
