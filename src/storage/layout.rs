// src/storage/layout.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::errors::Result;
use crate::fs::{to_system_independent, FileSystem};
use crate::storage::persist;
use crate::types::Variant;

const STORE: &str = "output-layout";

/// Output directories each module was last built into.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OutputRoots {
    pub production: Option<PathBuf>,
    pub test: Option<PathBuf>,
}

impl OutputRoots {
    pub fn get(&self, variant: Variant) -> Option<&Path> {
        match variant {
            Variant::Production => self.production.as_deref(),
            Variant::Test => self.test.as_deref(),
        }
    }
}

#[derive(Debug)]
pub struct OutputRootsLayout {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    entries: Option<BTreeMap<String, OutputRoots>>,
    dirty: bool,
}

fn optional(field: String) -> Option<PathBuf> {
    (!field.is_empty()).then(|| PathBuf::from(field))
}

fn field(path: &Option<PathBuf>) -> String {
    path.as_deref().map(to_system_independent).unwrap_or_default()
}

impl OutputRootsLayout {
    pub fn new(fs: Arc<dyn FileSystem>, data_dir: &Path) -> Self {
        Self {
            fs,
            path: data_dir.join(STORE),
            entries: None,
            dirty: false,
        }
    }

    fn entries(&mut self) -> Result<&mut BTreeMap<String, OutputRoots>> {
        if self.entries.is_none() {
            let mut map = BTreeMap::new();
            if let Some(rows) = persist::read_rows(self.fs.as_ref(), &self.path, STORE, 3)? {
                for row in rows {
                    let mut fields = row.into_iter();
                    if let (Some(module), Some(production), Some(test)) =
                        (fields.next(), fields.next(), fields.next())
                    {
                        map.insert(
                            module,
                            OutputRoots {
                                production: optional(production),
                                test: optional(test),
                            },
                        );
                    }
                }
            }
            self.entries = Some(map);
        }
        Ok(self.entries.get_or_insert_with(BTreeMap::new))
    }

    pub fn get(&mut self, module: &str) -> Result<Option<OutputRoots>> {
        Ok(self.entries()?.get(module).cloned())
    }

    /// Record the output dir `module` is now built into for `variant`,
    /// keeping the other variant's entry.
    pub fn update(&mut self, module: &str, variant: Variant, output: &Path) -> Result<()> {
        let entry = self.entries()?.entry(module.to_string()).or_default();
        let slot = match variant {
            Variant::Production => &mut entry.production,
            Variant::Test => &mut entry.test,
        };
        if slot.as_deref() != Some(output) {
            *slot = Some(output.to_path_buf());
            self.dirty = true;
        }
        Ok(())
    }

    pub fn clean(&mut self) -> Result<()> {
        self.entries = Some(BTreeMap::new());
        self.dirty = false;
        persist::remove_file(self.fs.as_ref(), &self.path, STORE)
    }

    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }
        let Some(entries) = &self.entries else {
            return Ok(());
        };
        let rows: Vec<Vec<String>> = entries
            .iter()
            .map(|(module, roots)| {
                vec![module.clone(), field(&roots.production), field(&roots.test)]
            })
            .collect();
        persist::write_rows(self.fs.as_ref(), &self.path, STORE, rows)?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn update_keeps_the_other_variant() {
        let fs = Arc::new(MockFileSystem::new());
        let mut layout = OutputRootsLayout::new(fs.clone(), Path::new("/data"));
        layout.update("core", Variant::Production, Path::new("/out/core")).unwrap();
        layout.update("core", Variant::Test, Path::new("/out/core-test")).unwrap();
        layout.flush().unwrap();

        let mut reloaded = OutputRootsLayout::new(fs, Path::new("/data"));
        let roots = reloaded.get("core").unwrap().unwrap();
        assert_eq!(roots.get(Variant::Production), Some(Path::new("/out/core")));
        assert_eq!(roots.get(Variant::Test), Some(Path::new("/out/core-test")));
        assert_eq!(reloaded.get("other").unwrap(), None);
    }
}
