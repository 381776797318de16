// src/storage/persist.rs

//! Line-oriented table files shared by every build-data store.
//!
//! Format:
//!
//! ```text
//! incbuild <store> v1
//! field<TAB>field<TAB>...
//! ```
//!
//! Fields escape backslash, tab and newline. Anything that cannot be read
//! back is reported as [`BuildError::StoreCorrupted`].

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::errors::{BuildError, Result};
use crate::fs::{to_system_independent, FileSystem};

pub const FORMAT_VERSION: u32 = 1;

fn header(store: &str) -> String {
    format!("incbuild {store} v{FORMAT_VERSION}")
}

pub fn escape(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    for c in field.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\t' => out.push_str("\\t"),
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out
}

pub fn unescape(field: &str) -> Option<String> {
    let mut out = String::with_capacity(field.len());
    let mut chars = field.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next()? {
            '\\' => out.push('\\'),
            't' => out.push('\t'),
            'n' => out.push('\n'),
            _ => return None,
        }
    }
    Some(out)
}

/// Read all rows of a table file; `None` when the file does not exist.
///
/// Every row must have exactly `columns` fields.
pub fn read_rows(
    fs: &dyn FileSystem,
    path: &Path,
    store: &str,
    columns: usize,
) -> Result<Option<Vec<Vec<String>>>> {
    if !fs.exists(path) {
        return Ok(None);
    }
    let contents = fs
        .read_to_string(path)
        .map_err(|e| BuildError::corrupted(store, format!("{e:#}")))?;

    let mut lines = contents.lines();
    let expected = header(store);
    match lines.next() {
        Some(first) if first == expected => {}
        other => {
            return Err(BuildError::corrupted(
                store,
                format!("unexpected header {:?} in {:?}", other.unwrap_or(""), path),
            ));
        }
    }

    let mut rows = Vec::new();
    for (n, line) in lines.enumerate() {
        if line.is_empty() {
            continue;
        }
        let fields: Option<Vec<String>> = line.split('\t').map(unescape).collect();
        match fields {
            Some(fields) if fields.len() == columns => rows.push(fields),
            _ => {
                return Err(BuildError::corrupted(
                    store,
                    format!("malformed line {} in {:?}", n + 2, path),
                ));
            }
        }
    }
    debug!(store, rows = rows.len(), "loaded build data table");
    Ok(Some(rows))
}

/// Write a table file atomically: temp file first, then rename over the target.
pub fn write_rows<I>(fs: &dyn FileSystem, path: &Path, store: &str, rows: I) -> Result<()>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut out = header(store);
    out.push('\n');
    for row in rows {
        let line: Vec<String> = row.iter().map(|f| escape(f)).collect();
        out.push_str(&line.join("\t"));
        out.push('\n');
    }

    let mut temp_path = path.as_os_str().to_owned();
    temp_path.push(".tmp");
    let temp_path = PathBuf::from(temp_path);
    fs.write(&temp_path, out.as_bytes())
        .map_err(|e| BuildError::corrupted(store, format!("{e:#}")))?;
    fs.rename(&temp_path, path)
        .map_err(|e| BuildError::corrupted(store, format!("{e:#}")))?;
    Ok(())
}

pub fn remove_file(fs: &dyn FileSystem, path: &Path, store: &str) -> Result<()> {
    fs.remove(path)
        .map_err(|e| BuildError::corrupted(store, format!("{e:#}")))
}

/// A lazily loaded multimap of paths persisted as `key<TAB>value` rows.
#[derive(Debug)]
pub struct PathTable {
    fs: Arc<dyn FileSystem>,
    path: PathBuf,
    store: String,
    entries: Option<BTreeMap<PathBuf, BTreeSet<PathBuf>>>,
    dirty: bool,
}

impl PathTable {
    pub fn new(fs: Arc<dyn FileSystem>, path: PathBuf, store: impl Into<String>) -> Self {
        Self {
            fs,
            path,
            store: store.into(),
            entries: None,
            dirty: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn entries(&mut self) -> Result<&mut BTreeMap<PathBuf, BTreeSet<PathBuf>>> {
        if self.entries.is_none() {
            let mut map: BTreeMap<PathBuf, BTreeSet<PathBuf>> = BTreeMap::new();
            if let Some(rows) = read_rows(self.fs.as_ref(), &self.path, &self.store, 2)? {
                for row in rows {
                    let mut fields = row.into_iter();
                    if let (Some(key), Some(value)) = (fields.next(), fields.next()) {
                        map.entry(PathBuf::from(key))
                            .or_default()
                            .insert(PathBuf::from(value));
                    }
                }
            }
            self.entries = Some(map);
        }
        // Populated just above.
        Ok(self.entries.get_or_insert_with(BTreeMap::new))
    }

    pub fn get(&mut self, key: &Path) -> Result<Vec<PathBuf>> {
        Ok(self
            .entries()?
            .get(key)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default())
    }

    pub fn contains(&mut self, key: &Path) -> Result<bool> {
        Ok(self.entries()?.contains_key(key))
    }

    pub fn set(&mut self, key: &Path, values: impl IntoIterator<Item = PathBuf>) -> Result<()> {
        let values: BTreeSet<PathBuf> = values.into_iter().collect();
        let entries = self.entries()?;
        if values.is_empty() {
            entries.remove(key);
        } else {
            entries.insert(key.to_path_buf(), values);
        }
        self.dirty = true;
        Ok(())
    }

    pub fn add(&mut self, key: &Path, value: PathBuf) -> Result<()> {
        let inserted = self
            .entries()?
            .entry(key.to_path_buf())
            .or_default()
            .insert(value);
        self.dirty |= inserted;
        Ok(())
    }

    pub fn remove(&mut self, key: &Path) -> Result<()> {
        if self.entries()?.remove(key).is_some() {
            self.dirty = true;
        }
        Ok(())
    }

    pub fn keys(&mut self) -> Result<Vec<PathBuf>> {
        Ok(self.entries()?.keys().cloned().collect())
    }

    /// Drop every entry and delete the backing file without reading it.
    pub fn clean(&mut self) -> Result<()> {
        self.entries = Some(BTreeMap::new());
        self.dirty = false;
        remove_file(self.fs.as_ref(), &self.path, &self.store)
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
            .flat_map(|(key, values)| {
                values.iter().map(move |v| {
                    vec![to_system_independent(key), to_system_independent(v)]
                })
            })
            .collect();
        write_rows(self.fs.as_ref(), &self.path, &self.store, rows)?;
        self.dirty = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::mock::MockFileSystem;

    #[test]
    fn escaping_survives_awkward_characters() {
        let raw = "a\tb\\c\nd";
        assert_eq!(unescape(&escape(raw)).as_deref(), Some(raw));
        assert_eq!(unescape("bad\\q"), None);
    }

    #[test]
    fn table_persists_and_reloads() {
        let fs = Arc::new(MockFileSystem::new());
        let path = PathBuf::from("/data/table");

        let mut table = PathTable::new(fs.clone(), path.clone(), "table");
        table.add(Path::new("/src/a"), PathBuf::from("/out/a1")).unwrap();
        table.add(Path::new("/src/a"), PathBuf::from("/out/a2")).unwrap();
        table.flush().unwrap();
        assert!(!fs.exists(Path::new("/data/table.tmp")));

        let mut reloaded = PathTable::new(fs, path, "table");
        assert_eq!(
            reloaded.get(Path::new("/src/a")).unwrap(),
            vec![PathBuf::from("/out/a1"), PathBuf::from("/out/a2")]
        );
    }

    #[test]
    fn garbage_is_reported_as_corruption() {
        let fs = Arc::new(MockFileSystem::new());
        fs.add_file("/data/table", "not a table\n");

        let mut table = PathTable::new(fs, PathBuf::from("/data/table"), "table");
        let err = table.keys().unwrap_err();
        assert!(err.is_store_corruption());
    }
}
