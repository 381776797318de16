// src/engine/mod.rs

//! Build engine.
//!
//! - [`context`] holds the per-run [`CompileContext`] lent to build steps.
//! - [`orchestrator`] walks phases, chunks and categories for a
//!   [`ProjectBuilder`].
//! - [`state`] and [`progress`] track where a build is and how far along.

pub mod cancel;
pub mod context;
pub mod orchestrator;
pub mod progress;
pub mod state;

pub use cancel::CancelToken;
pub use context::{CompileContext, ContextOptions, DirtyFile};
pub use orchestrator::{ProjectBuilder, ProjectDescriptor};
pub use state::{BuildReport, BuildState};
