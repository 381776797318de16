// src/config/validate.rs

use globset::Glob;

use crate::builders::ResourcePatterns;
use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{BuildError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = BuildError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

pub fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_modules(cfg)?;
    validate_module_outputs(cfg)?;
    validate_module_dependencies(cfg)?;
    validate_steps(cfg)?;
    validate_resource_patterns(cfg)?;
    Ok(())
}

fn ensure_has_modules(cfg: &RawConfigFile) -> Result<()> {
    if cfg.module.is_empty() {
        return Err(BuildError::ConfigError(
            "config must contain at least one [module.<name>] section".to_string(),
        ));
    }
    Ok(())
}

fn validate_module_outputs(cfg: &RawConfigFile) -> Result<()> {
    for (name, module) in &cfg.module {
        if module.output.as_os_str().is_empty() {
            return Err(BuildError::ConfigError(format!(
                "module '{name}' has an empty `output`"
            )));
        }
        if module.effective_test_output() == module.output {
            return Err(BuildError::ConfigError(format!(
                "module '{name}' uses the same directory for `output` and `test_output`"
            )));
        }
    }
    Ok(())
}

fn validate_module_dependencies(cfg: &RawConfigFile) -> Result<()> {
    for (name, module) in &cfg.module {
        for dep in &module.deps {
            if !cfg.module.contains_key(&dep.module) {
                return Err(BuildError::ConfigError(format!(
                    "module '{}' has unknown dependency '{}' in `deps`",
                    name, dep.module
                )));
            }
        }
    }
    Ok(())
}

fn validate_steps(cfg: &RawConfigFile) -> Result<()> {
    for (name, step) in &cfg.step {
        if step.cmd.trim().is_empty() {
            return Err(BuildError::ConfigError(format!(
                "step '{name}' has an empty `cmd`"
            )));
        }
        for pattern in &step.sources {
            Glob::new(pattern).map_err(|e| {
                BuildError::ConfigError(format!(
                    "step '{name}' has an invalid source glob '{pattern}': {e}"
                ))
            })?;
        }
    }
    Ok(())
}

fn validate_resource_patterns(cfg: &RawConfigFile) -> Result<()> {
    if let Some(patterns) = &cfg.resources.patterns {
        ResourcePatterns::new(patterns)
            .map_err(|e| BuildError::ConfigError(format!("[resources]: {e:#}")))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(toml_src: &str) -> Result<ConfigFile> {
        let raw: RawConfigFile = toml::from_str(toml_src)?;
        ConfigFile::try_from(raw)
    }

    #[test]
    fn rejects_empty_module_list() {
        let err = parse("[project]\nuse_hash = true\n").unwrap_err();
        assert!(matches!(err, BuildError::ConfigError(msg) if msg.contains("at least one")));
    }

    #[test]
    fn rejects_unknown_dependency() {
        let err = parse(
            r#"
            [module.app]
            output = "out/app"
            deps = [{ module = "core" }]
            "#,
        )
        .unwrap_err();
        assert!(matches!(
            err,
            BuildError::ConfigError(msg) if msg.contains("unknown dependency 'core'")
        ));
    }

    #[test]
    fn rejects_unknown_category() {
        let err = parse(
            r#"
            [module.app]
            output = "out/app"

            [step.gen]
            category = "linker"
            cmd = "true"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::TomlError(_)));
    }

    #[test]
    fn rejects_bad_step_globs() {
        let err = parse(
            r#"
            [module.app]
            output = "out/app"

            [step.gen]
            category = "translator"
            cmd = "true"
            sources = ["src/[oops"]
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::ConfigError(msg) if msg.contains("invalid source glob")));
    }

    #[test]
    fn rejects_shared_output_directories() {
        let err = parse(
            r#"
            [module.app]
            output = "out/app"
            test_output = "out/app"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, BuildError::ConfigError(msg) if msg.contains("same directory")));
    }
}
