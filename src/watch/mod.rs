// src/watch/mod.rs

//! File watching for `--watch` mode.
//!
//! Turns `notify` events under the project's source roots into debounced
//! batches of changed paths. It knows nothing about modules or targets; the
//! batches are fed to `ProjectBuilder::notify_changed` before each make.

pub mod watcher;

pub use watcher::{spawn_watcher, WatcherHandle};
