// src/fs/mock.rs

use super::FileSystem;
use anyhow::{anyhow, Result};
use std::collections::HashMap;
use std::io::{Cursor, Read};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Debug, Clone)]
pub enum MockEntry {
    File { content: Vec<u8>, modified: u64 },
    Dir(Vec<String>), // List of child names
}

#[derive(Debug, Default)]
struct MockState {
    entries: HashMap<PathBuf, MockEntry>,
    /// Logical clock; every write advances it by one.
    clock: u64,
}

/// In-memory file system with a logical modification clock.
///
/// Clones share the same underlying tree, so a test can keep a handle while
/// the engine owns another.
#[derive(Debug, Clone, Default)]
pub struct MockFileSystem {
    state: Arc<Mutex<MockState>>,
}

fn parent_of(path: &Path) -> Option<PathBuf> {
    let parent = path.parent()?;
    if parent.as_os_str().is_empty() {
        Some(PathBuf::from("."))
    } else {
        Some(parent.to_path_buf())
    }
}

fn child_name(path: &Path) -> Option<String> {
    path.file_name().and_then(|n| n.to_str()).map(|s| s.to_string())
}

impl MockFileSystem {
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        // Ensure root exists
        entries.insert(PathBuf::from("."), MockEntry::Dir(Vec::new()));

        Self {
            state: Arc::new(Mutex::new(MockState { entries, clock: 1 })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MockState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    /// Create or overwrite a file, stamping it with the next clock tick.
    pub fn add_file(&self, path: impl AsRef<Path>, content: impl Into<Vec<u8>>) {
        let mut state = self.lock();
        state.clock += 1;
        let modified = state.clock;
        Self::insert_file(&mut state, path.as_ref(), content.into(), modified);
    }

    pub fn add_dir(&self, path: impl AsRef<Path>) {
        let mut state = self.lock();
        Self::ensure_dir_entry(&mut state.entries, path.as_ref());
    }

    /// Bump a file's modification stamp without changing its content.
    pub fn touch(&self, path: impl AsRef<Path>) {
        let mut state = self.lock();
        state.clock += 1;
        let clock = state.clock;
        if let Some(MockEntry::File { modified, .. }) = state.entries.get_mut(path.as_ref()) {
            *modified = clock;
        }
    }

    /// Advance the logical clock, e.g. to simulate time passing mid-build.
    pub fn tick(&self) -> u64 {
        let mut state = self.lock();
        state.clock += 1;
        state.clock
    }

    /// Sorted list of every file currently present.
    pub fn files(&self) -> Vec<PathBuf> {
        let state = self.lock();
        let mut files: Vec<PathBuf> = state
            .entries
            .iter()
            .filter(|(_, e)| matches!(e, MockEntry::File { .. }))
            .map(|(p, _)| p.clone())
            .collect();
        files.sort();
        files
    }

    fn insert_file(state: &mut MockState, path: &Path, content: Vec<u8>, modified: u64) {
        state
            .entries
            .insert(path.to_path_buf(), MockEntry::File { content, modified });

        // Ensure parent directories exist implicitly for simplicity in this mock
        if let Some(parent) = parent_of(path) {
            Self::ensure_dir_entry(&mut state.entries, &parent);
            Self::link_child(&mut state.entries, &parent, path);
        }
    }

    fn link_child(entries: &mut HashMap<PathBuf, MockEntry>, parent: &Path, path: &Path) {
        if let (Some(MockEntry::Dir(children)), Some(name)) =
            (entries.get_mut(parent), child_name(path))
        {
            if !children.contains(&name) {
                children.push(name);
            }
        }
    }

    fn ensure_dir_entry(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
        if entries.contains_key(path) {
            return;
        }
        entries.insert(path.to_path_buf(), MockEntry::Dir(Vec::new()));
        if let Some(parent) = parent_of(path) {
            if parent != path {
                // Avoid infinite loop at root
                Self::ensure_dir_entry(entries, &parent);
                Self::link_child(entries, &parent, path);
            }
        }
    }
}

impl FileSystem for MockFileSystem {
    fn read(&self, path: &Path) -> Result<Vec<u8>> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::File { content, .. }) => Ok(content.clone()),
            Some(MockEntry::Dir(_)) => Err(anyhow!("Is a directory: {:?}", path)),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn read_to_string(&self, path: &Path) -> Result<String> {
        let content = self.read(path)?;
        String::from_utf8(content).map_err(|e| anyhow!("Invalid UTF-8: {}", e))
    }

    fn open_read(&self, path: &Path) -> Result<Box<dyn Read + Send>> {
        let content = self.read(path)?;
        Ok(Box::new(Cursor::new(content)))
    }

    fn write(&self, path: &Path, contents: &[u8]) -> Result<()> {
        if self.is_dir(path) {
            return Err(anyhow!("Is a directory: {:?}", path));
        }
        self.add_file(path, contents);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> Result<()> {
        let mut state = self.lock();
        let (content, modified) = match state.entries.get(from) {
            Some(MockEntry::File { content, modified }) => (content.clone(), *modified),
            Some(MockEntry::Dir(_)) => return Err(anyhow!("cannot rename directory {:?}", from)),
            None => return Err(anyhow!("File not found: {:?}", from)),
        };
        remove_entry(&mut state.entries, from);
        Self::insert_file(&mut state, to, content, modified);
        Ok(())
    }

    fn exists(&self, path: &Path) -> bool {
        self.lock().entries.contains_key(path)
    }

    fn is_file(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::File { .. }))
    }

    fn is_dir(&self, path: &Path) -> bool {
        matches!(self.lock().entries.get(path), Some(MockEntry::Dir(_)))
    }

    fn read_dir(&self, path: &Path) -> Result<Vec<PathBuf>> {
        let state = self.lock();
        match state.entries.get(path) {
            Some(MockEntry::Dir(children)) => {
                Ok(children.iter().map(|name| path.join(name)).collect())
            }
            _ => Err(anyhow!("Not a directory or not found: {:?}", path)),
        }
    }

    fn modified(&self, path: &Path) -> Result<u64> {
        match self.lock().entries.get(path) {
            Some(MockEntry::File { modified, .. }) => Ok(*modified),
            Some(MockEntry::Dir(_)) => Ok(0),
            None => Err(anyhow!("File not found: {:?}", path)),
        }
    }

    fn remove(&self, path: &Path) -> Result<()> {
        let mut state = self.lock();
        remove_entry(&mut state.entries, path);
        Ok(())
    }

    fn current_stamp(&self) -> u64 {
        self.lock().clock
    }
}

fn remove_entry(entries: &mut HashMap<PathBuf, MockEntry>, path: &Path) {
    if entries.remove(path).is_none() {
        return;
    }
    entries.retain(|p, _| !p.starts_with(path));
    if let (Some(parent), Some(name)) = (parent_of(path), child_name(path)) {
        if let Some(MockEntry::Dir(children)) = entries.get_mut(&parent) {
            children.retain(|c| c != &name);
        }
    }
}
