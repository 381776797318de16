// src/engine/progress.rs

/// Fraction-of-work bookkeeping for a build.
///
/// Each chunk is worth one unit per module. A category spreads that unit
/// over its steps; an extra pass widens the basis so the fraction keeps
/// moving forward without overshooting.
#[derive(Debug, Clone)]
pub struct ProgressTracker {
    processed: f32,
    total_work: f32,
    total_builders: f32,
}

impl ProgressTracker {
    pub fn new(total_work: usize, total_builders: usize) -> Self {
        Self {
            processed: 0.0,
            total_work: total_work.max(1) as f32,
            total_builders: total_builders.max(1) as f32,
        }
    }

    pub fn fraction(&self) -> f32 {
        (self.processed / self.total_work).clamp(0.0, 1.0)
    }

    /// Account for a chunk that is not built.
    pub fn chunk_skipped(&mut self, modules: usize) -> f32 {
        self.processed += modules as f32;
        self.fraction()
    }

    pub fn start_category(&mut self, modules: usize) -> CategoryProgress<'_> {
        let stage_count = self.total_builders;
        CategoryProgress {
            tracker: self,
            stage_count,
            stages_passed: 0,
            modules: modules as f32,
        }
    }
}

pub struct CategoryProgress<'a> {
    tracker: &'a mut ProgressTracker,
    stage_count: f32,
    stages_passed: usize,
    modules: f32,
}

impl CategoryProgress<'_> {
    /// Recalculate the basis for another pass over the category.
    pub fn additional_pass(&mut self) {
        let passed = self.stages_passed as f32;
        self.tracker.processed -= passed * self.modules / self.stage_count;
        self.stage_count += self.tracker.total_builders;
        self.tracker.processed += passed * self.modules / self.stage_count;
    }

    pub fn stage_finished(&mut self) -> f32 {
        self.stages_passed += 1;
        self.tracker.processed += self.modules / self.stage_count;
        self.tracker.fraction()
    }
}
