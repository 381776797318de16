// src/builders/resources.rs

use std::path::PathBuf;

use anyhow::Context;
use tracing::{debug, info};

use crate::builders::{BuildStep, BuilderCategory, ExitCode, ResourcePatterns};
use crate::dag::ModuleChunk;
use crate::engine::{CompileContext, DirtyFile};
use crate::messages::BuildMessage;

const STEP_NAME: &str = "resources";

/// Copies dirty resource files into the output directory of their target.
#[derive(Debug, Clone)]
pub struct ResourcesStep {
    patterns: ResourcePatterns,
}

impl ResourcesStep {
    pub fn new(patterns: ResourcePatterns) -> Self {
        Self { patterns }
    }

    fn destination(ctx: &CompileContext<'_>, file: &DirtyFile<'_>) -> Option<PathBuf> {
        let mut dest = ctx.output_dir(&file.root.target)?.to_path_buf();
        for segment in file.root.package_prefix.split('.').filter(|s| !s.is_empty()) {
            dest.push(segment);
        }
        dest.push(file.relative_path());
        Some(dest)
    }
}

impl BuildStep for ResourcesStep {
    fn name(&self) -> &str {
        STEP_NAME
    }

    fn category(&self) -> BuilderCategory {
        BuilderCategory::SourceProcessor
    }

    fn build(&self, ctx: &mut CompileContext<'_>, chunk: &ModuleChunk) -> anyhow::Result<ExitCode> {
        let fs = ctx.fs();
        let mut copied = 0usize;

        for file in ctx.files_to_recompile(chunk) {
            if !self.patterns.is_resource(&file.path, &file.root.root) {
                continue;
            }
            let Some(dest) = Self::destination(ctx, &file) else {
                continue;
            };

            let result = fs
                .copy(&file.path, &dest)
                .with_context(|| format!("copying {:?} to {:?}", file.path, dest));
            if let Err(e) = result {
                ctx.process_message(
                    BuildMessage::error(STEP_NAME, format!("{e:#}")).with_path(&file.path),
                );
                continue;
            }
            debug!(source = ?file.path, output = ?dest, "copied resource");
            ctx.register_output(&file.root.target, &file.path, dest)?;
            copied += 1;
            ctx.check_canceled()?;
        }

        if copied > 0 {
            info!(chunk = %chunk, copied, "copied resources");
        }
        Ok(ExitCode::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_its_category() {
        let step = ResourcesStep::new(ResourcePatterns::default());
        assert_eq!(step.name(), "resources");
        assert_eq!(step.category(), BuilderCategory::SourceProcessor);
    }
}
