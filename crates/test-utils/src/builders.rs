// crates/test-utils/src/builders.rs

#![allow(dead_code)]

use std::path::PathBuf;

use incbuild::builders::BuilderCategory;
use incbuild::config::model::{
    ConfigFile, DependencyConfig, ModuleConfig, ProjectSection, RawConfigFile, ResourcesSection,
    StepConfig,
};
use incbuild::errors::Result;
use incbuild::types::DependencyScope;

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
    base_dir: PathBuf,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                project: ProjectSection::default(),
                resources: ResourcesSection::default(),
                module: Default::default(),
                step: Default::default(),
            },
            base_dir: PathBuf::from("/p"),
        }
    }

    pub fn with_base_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.base_dir = dir.into();
        self
    }

    pub fn with_module(mut self, name: &str, module: ModuleConfig) -> Self {
        self.config.module.insert(name.to_string(), module);
        self
    }

    pub fn with_step(mut self, name: &str, step: StepConfig) -> Self {
        self.config.step.insert(name.to_string(), step);
        self
    }

    pub fn with_resource_patterns(mut self, patterns: &[&str]) -> Self {
        self.config.resources.patterns = Some(patterns.iter().map(|p| p.to_string()).collect());
        self
    }

    pub fn with_data_dir(mut self, dir: &str) -> Self {
        self.config.project.data_dir = PathBuf::from(dir);
        self
    }

    pub fn proceed_on_errors(mut self, val: bool) -> Self {
        self.config.project.proceed_on_errors = val;
        self
    }

    pub fn use_hash(mut self, val: bool) -> Self {
        self.config.project.use_hash = val;
        self
    }

    pub fn try_build(self) -> Result<ConfigFile> {
        Ok(ConfigFile::try_from(self.config)?.with_base_dir(self.base_dir))
    }

    pub fn build(self) -> ConfigFile {
        self.try_build()
            .expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ModuleConfig`.
pub struct ModuleConfigBuilder {
    module: ModuleConfig,
}

impl ModuleConfigBuilder {
    pub fn new(output: &str) -> Self {
        Self {
            module: ModuleConfig {
                sources: Vec::new(),
                tests: Vec::new(),
                excludes: Vec::new(),
                output: PathBuf::from(output),
                test_output: None,
                package_prefix: None,
                deps: Vec::new(),
            },
        }
    }

    pub fn source(mut self, path: &str) -> Self {
        self.module.sources.push(PathBuf::from(path));
        self
    }

    pub fn test(mut self, path: &str) -> Self {
        self.module.tests.push(PathBuf::from(path));
        self
    }

    pub fn exclude(mut self, path: &str) -> Self {
        self.module.excludes.push(PathBuf::from(path));
        self
    }

    pub fn test_output(mut self, path: &str) -> Self {
        self.module.test_output = Some(PathBuf::from(path));
        self
    }

    pub fn package_prefix(mut self, prefix: &str) -> Self {
        self.module.package_prefix = Some(prefix.to_string());
        self
    }

    pub fn dep(self, module: &str) -> Self {
        self.dep_with(module, DependencyScope::Compile, false)
    }

    pub fn exported_dep(self, module: &str) -> Self {
        self.dep_with(module, DependencyScope::Compile, true)
    }

    pub fn dep_with(mut self, module: &str, scope: DependencyScope, exported: bool) -> Self {
        self.module.deps.push(DependencyConfig {
            module: module.to_string(),
            scope,
            exported,
        });
        self
    }

    pub fn build(self) -> ModuleConfig {
        self.module
    }
}

/// Builder for `StepConfig`.
pub struct StepConfigBuilder {
    step: StepConfig,
}

impl StepConfigBuilder {
    pub fn new(category: BuilderCategory, cmd: &str) -> Self {
        Self {
            step: StepConfig {
                category,
                cmd: cmd.to_string(),
                sources: Vec::new(),
                tests: None,
            },
        }
    }

    pub fn source(mut self, glob: &str) -> Self {
        self.step.sources.push(glob.to_string());
        self
    }

    pub fn tests_only(mut self) -> Self {
        self.step.tests = Some(true);
        self
    }

    pub fn production_only(mut self) -> Self {
        self.step.tests = Some(false);
        self
    }

    pub fn build(self) -> StepConfig {
        self.step
    }
}
