// src/builders/registry.rs

use std::collections::BTreeMap;
use std::fmt;

use tracing::debug;

use crate::builders::{BuildStep, BuildStepProvider, BuilderCategory, ProjectTask, TaskPhase};

/// Build steps keyed by category, each list in registration order.
#[derive(Default)]
pub struct BuilderRegistry {
    steps: BTreeMap<BuilderCategory, Vec<Box<dyn BuildStep>>>,
    before: Vec<Box<dyn ProjectTask>>,
    after: Vec<Box<dyn ProjectTask>>,
}

impl fmt::Debug for BuilderRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let steps: Vec<String> = self
            .all_steps()
            .map(|s| format!("{}:{}", s.category(), s.name()))
            .collect();
        f.debug_struct("BuilderRegistry")
            .field("steps", &steps)
            .field("before", &self.before.len())
            .field("after", &self.after.len())
            .finish()
    }
}

impl BuilderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_providers<'a>(
        providers: impl IntoIterator<Item = &'a dyn BuildStepProvider>,
    ) -> Self {
        let mut registry = Self::new();
        for provider in providers {
            let provided = provider.create_steps();
            for step in provided.steps {
                registry.register_step(step);
            }
            for task in provided.tasks {
                registry.register_task(task);
            }
        }
        registry
    }

    pub fn register_step(&mut self, step: Box<dyn BuildStep>) {
        debug!(step = step.name(), category = %step.category(), "registered build step");
        self.steps.entry(step.category()).or_default().push(step);
    }

    pub fn register_task(&mut self, task: Box<dyn ProjectTask>) {
        match task.phase() {
            TaskPhase::Before => self.before.push(task),
            TaskPhase::After => self.after.push(task),
        }
    }

    pub fn builders_for(&self, category: BuilderCategory) -> &[Box<dyn BuildStep>] {
        self.steps.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every step, in category order then registration order.
    pub fn all_steps(&self) -> impl Iterator<Item = &dyn BuildStep> {
        self.steps.values().flatten().map(|s| s.as_ref())
    }

    pub fn total_builder_count(&self) -> usize {
        self.steps.values().map(Vec::len).sum()
    }

    pub fn before_tasks(&self) -> &[Box<dyn ProjectTask>] {
        &self.before
    }

    pub fn after_tasks(&self) -> &[Box<dyn ProjectTask>] {
        &self.after
    }
}
