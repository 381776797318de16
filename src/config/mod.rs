// src/config/mod.rs

//! Project configuration.
//!
//! - `model.rs`: the TOML data model.
//! - `loader.rs`: reading a config file from disk.
//! - `validate.rs`: checks applied when turning a [`RawConfigFile`] into a
//!   [`ConfigFile`].

pub mod loader;
pub mod model;
pub mod validate;

pub use loader::{load_and_validate, load_from_path};
pub use model::{
    ConfigFile, DependencyConfig, ModuleConfig, ProjectSection, RawConfigFile, ResourcesSection,
    StepConfig,
};
pub use validate::validate_raw_config;
