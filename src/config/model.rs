// src/config/model.rs

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::builders::{BuilderCategory, CommandStepSpec, ConfigStepProvider, ResourcePatterns};
use crate::errors::Result;
use crate::project::{Dependency, Module, Project, SourceRoot};
use crate::types::DependencyScope;

/// Configuration exactly as deserialised from TOML, before validation.
///
/// ```toml
/// [project]
/// data_dir = ".incbuild"
///
/// [module.core]
/// sources = ["core/src"]
/// tests = ["core/tests"]
/// output = "out/core"
///
/// [module.app]
/// sources = ["app/src"]
/// output = "out/app"
/// deps = [{ module = "core", exported = true }]
///
/// [step.compile]
/// category = "translator"
/// cmd = "./compile.sh"
/// sources = ["**/*.src"]
/// ```
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawConfigFile {
    #[serde(default)]
    pub project: ProjectSection,

    #[serde(default)]
    pub resources: ResourcesSection,

    /// Modules from `[module.<name>]`.
    #[serde(default)]
    pub module: BTreeMap<String, ModuleConfig>,

    /// Command steps from `[step.<name>]`.
    #[serde(default)]
    pub step: BTreeMap<String, StepConfig>,
}

/// Validated configuration; relative paths resolve against `base_dir`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub project: ProjectSection,
    pub resources: ResourcesSection,
    pub module: BTreeMap<String, ModuleConfig>,
    pub step: BTreeMap<String, StepConfig>,
    pub base_dir: PathBuf,
}

/// `[project]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectSection {
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Keep building later chunks after a chunk reported errors.
    #[serde(default)]
    pub proceed_on_errors: bool,

    /// Compare content hashes before treating a touched file as changed.
    #[serde(default)]
    pub use_hash: bool,
}

fn default_data_dir() -> PathBuf {
    PathBuf::from(".incbuild")
}

impl Default for ProjectSection {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            proceed_on_errors: false,
            use_hash: false,
        }
    }
}

/// `[resources]` section. Without `patterns` the built-in defaults apply.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ResourcesSection {
    #[serde(default)]
    pub patterns: Option<Vec<String>>,
}

/// `[module.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ModuleConfig {
    #[serde(default)]
    pub sources: Vec<PathBuf>,

    #[serde(default)]
    pub tests: Vec<PathBuf>,

    #[serde(default)]
    pub excludes: Vec<PathBuf>,

    pub output: PathBuf,

    /// Defaults to a `-test` sibling of `output`.
    #[serde(default)]
    pub test_output: Option<PathBuf>,

    /// Package prefix applied to every root of the module.
    #[serde(default)]
    pub package_prefix: Option<String>,

    #[serde(default)]
    pub deps: Vec<DependencyConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DependencyConfig {
    pub module: String,

    #[serde(default)]
    pub scope: DependencyScope,

    #[serde(default)]
    pub exported: bool,
}

/// `[step.<name>]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct StepConfig {
    pub category: BuilderCategory,

    pub cmd: String,

    /// Globs over paths relative to a source root; empty means every file.
    #[serde(default)]
    pub sources: Vec<String>,

    /// Only run for test chunks (`true`) or production chunks (`false`).
    #[serde(default)]
    pub tests: Option<bool>,
}

impl ModuleConfig {
    pub fn effective_test_output(&self) -> PathBuf {
        match &self.test_output {
            Some(path) => path.clone(),
            None => {
                let mut name = self
                    .output
                    .file_name()
                    .map(|n| n.to_os_string())
                    .unwrap_or_default();
                name.push("-test");
                self.output.with_file_name(name)
            }
        }
    }
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            project: raw.project,
            resources: raw.resources,
            module: raw.module,
            step: raw.step,
            base_dir: PathBuf::from("."),
        }
    }

    pub fn with_base_dir(mut self, base_dir: impl Into<PathBuf>) -> Self {
        self.base_dir = base_dir.into();
        self
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    pub fn data_dir(&self) -> PathBuf {
        self.resolve(&self.project.data_dir)
    }

    /// Module definitions with every path resolved.
    pub fn to_modules(&self) -> Vec<Module> {
        self.module
            .iter()
            .map(|(name, cfg)| {
                let mut module = Module::new(
                    name.clone(),
                    self.resolve(&cfg.output),
                    self.resolve(&cfg.effective_test_output()),
                );
                let roots = cfg
                    .sources
                    .iter()
                    .map(|p| (p, false))
                    .chain(cfg.tests.iter().map(|p| (p, true)));
                for (path, is_test) in roots {
                    let mut root = SourceRoot::new(self.resolve(path), is_test);
                    if let Some(prefix) = &cfg.package_prefix {
                        root = root.with_package_prefix(prefix.clone());
                    }
                    module = module.with_root(root);
                }
                for exclude in &cfg.excludes {
                    module = module.with_exclude(self.resolve(exclude));
                }
                for dep in &cfg.deps {
                    let mut dependency = Dependency::new(dep.module.clone()).scope(dep.scope);
                    if dep.exported {
                        dependency = dependency.exported();
                    }
                    module = module.with_dependency(dependency);
                }
                module
            })
            .collect()
    }

    pub fn to_project(&self) -> Result<Project> {
        Project::new(self.to_modules())
    }

    pub fn resource_patterns(&self) -> anyhow::Result<ResourcePatterns> {
        match &self.resources.patterns {
            Some(patterns) => ResourcePatterns::new(patterns),
            None => Ok(ResourcePatterns::default()),
        }
    }

    /// Command steps in name order, running in the config directory.
    pub fn command_specs(&self) -> Vec<CommandStepSpec> {
        self.step
            .iter()
            .map(|(name, cfg)| CommandStepSpec {
                name: name.clone(),
                category: cfg.category,
                cmd: cfg.cmd.clone(),
                sources: cfg.sources.clone(),
                tests: cfg.tests,
                workdir: Some(self.base_dir.clone()),
            })
            .collect()
    }

    pub fn step_provider(&self) -> anyhow::Result<ConfigStepProvider> {
        let mut provider = ConfigStepProvider::new(self.resource_patterns()?);
        for spec in self.command_specs() {
            provider = provider.with_command(spec)?;
        }
        Ok(provider)
    }
}
