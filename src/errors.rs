// src/errors.rs

//! Crate-wide error type and result alias.

use std::fmt;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    /// A persistent build-data store could not be read or written.
    ///
    /// The orchestrator answers this with a single forced full rebuild.
    #[error("Internal caches are corrupted or have outdated format ({store}): {detail}")]
    StoreCorrupted { store: String, detail: String },

    #[error("The build has been canceled")]
    Canceled,

    #[error("Builder {0} requested build stop")]
    Aborted(String),

    #[error("Builder {step} failed: {error:#}")]
    StepFailed { step: String, error: anyhow::Error },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl BuildError {
    pub fn corrupted(store: impl Into<String>, detail: impl fmt::Display) -> Self {
        BuildError::StoreCorrupted {
            store: store.into(),
            detail: detail.to_string(),
        }
    }

    pub fn is_store_corruption(&self) -> bool {
        matches!(self, BuildError::StoreCorrupted { .. })
    }
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, BuildError>;
