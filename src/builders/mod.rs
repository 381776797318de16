// src/builders/mod.rs

//! Pluggable build steps.
//!
//! A [`BuildStep`] runs once per pass over a chunk; the orchestrator calls
//! the steps of each [`BuilderCategory`] in category order and repeats a
//! category while any of its steps asks for another pass. [`ProjectTask`]s
//! run once per build, before or after all chunks.

pub mod command;
pub mod patterns;
pub mod registry;
pub mod resources;

use std::fmt;

use serde::Deserialize;

use crate::dag::ModuleChunk;
use crate::engine::CompileContext;

pub use command::{CommandStep, CommandStepSpec};
pub use patterns::ResourcePatterns;
pub use registry::BuilderRegistry;
pub use resources::ResourcesStep;

/// Step categories, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuilderCategory {
    SourceGenerator,
    SourceInstrumenter,
    SourceProcessor,
    Translator,
    ClassInstrumenter,
    ClassPostProcessor,
    Packager,
    Validator,
}

impl BuilderCategory {
    pub const ALL: [BuilderCategory; 8] = [
        BuilderCategory::SourceGenerator,
        BuilderCategory::SourceInstrumenter,
        BuilderCategory::SourceProcessor,
        BuilderCategory::Translator,
        BuilderCategory::ClassInstrumenter,
        BuilderCategory::ClassPostProcessor,
        BuilderCategory::Packager,
        BuilderCategory::Validator,
    ];
}

impl fmt::Display for BuilderCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuilderCategory::SourceGenerator => "source-generator",
            BuilderCategory::SourceInstrumenter => "source-instrumenter",
            BuilderCategory::SourceProcessor => "source-processor",
            BuilderCategory::Translator => "translator",
            BuilderCategory::ClassInstrumenter => "class-instrumenter",
            BuilderCategory::ClassPostProcessor => "class-post-processor",
            BuilderCategory::Packager => "packager",
            BuilderCategory::Validator => "validator",
        };
        f.write_str(s)
    }
}

/// Result of one step invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Ok,
    /// Run every step of this category once more.
    AdditionalPassRequired,
    /// Stop the whole build.
    Abort,
}

/// A unit of work applied to a chunk.
///
/// Recoverable problems are reported as ERROR messages through the context;
/// returning `Err` is fatal for the build.
pub trait BuildStep: Send + Sync {
    fn name(&self) -> &str;

    fn category(&self) -> BuilderCategory;

    fn build(&self, ctx: &mut CompileContext<'_>, chunk: &ModuleChunk) -> anyhow::Result<ExitCode>;

    /// Called for every registered step once a chunk is finished, whether or
    /// not the step ran and whether or not the chunk failed.
    fn cleanup(&self, _ctx: &mut CompileContext<'_>, _chunk: &ModuleChunk) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    Before,
    After,
}

/// Project-wide work run once per build.
pub trait ProjectTask: Send + Sync {
    fn name(&self) -> &str;

    fn phase(&self) -> TaskPhase;

    fn run(&self, ctx: &mut CompileContext<'_>) -> anyhow::Result<()>;
}

/// What a provider contributes to the registry.
#[derive(Default)]
pub struct ProvidedSteps {
    pub steps: Vec<Box<dyn BuildStep>>,
    pub tasks: Vec<Box<dyn ProjectTask>>,
}

impl ProvidedSteps {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(mut self, step: impl BuildStep + 'static) -> Self {
        self.steps.push(Box::new(step));
        self
    }

    pub fn task(mut self, task: impl ProjectTask + 'static) -> Self {
        self.tasks.push(Box::new(task));
        self
    }
}

/// Source of build steps, queried once when the registry is assembled.
pub trait BuildStepProvider {
    fn create_steps(&self) -> ProvidedSteps;
}

/// Provider for the steps declared in a project configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigStepProvider {
    pub resources: ResourcePatterns,
    pub commands: Vec<CommandStep>,
}

impl ConfigStepProvider {
    pub fn new(resources: ResourcePatterns) -> Self {
        Self {
            resources,
            commands: Vec::new(),
        }
    }

    pub fn with_command(mut self, spec: CommandStepSpec) -> anyhow::Result<Self> {
        self.commands.push(CommandStep::new(spec)?);
        Ok(self)
    }
}

impl BuildStepProvider for ConfigStepProvider {
    fn create_steps(&self) -> ProvidedSteps {
        let mut provided = ProvidedSteps::new().step(ResourcesStep::new(self.resources.clone()));
        for step in &self.commands {
            provided = provided.step(step.clone());
        }
        provided
    }
}
