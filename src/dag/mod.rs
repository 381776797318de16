// src/dag/mod.rs

//! Target graph and chunking.
//!
//! - [`graph`] holds the directed graph of build targets and the classpath
//!   walks used for cascading invalidation.
//! - [`chunks`] groups strongly connected targets into chunks and orders
//!   them for each build phase.

pub mod chunks;
pub mod graph;

pub use chunks::{ModuleChunk, ProjectChunks};
pub use graph::{compute_dependencies, TargetGraph};
