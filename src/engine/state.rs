// src/engine/state.rs

use std::fmt;

/// Where the orchestrator is in a build.
///
/// ```text
/// Init -> RunningProduction -> RunningTests -> Done
///            |                     |
///            +-> Failed / Canceled <-+
///
/// any running state --(store corrupted)--> RetryAsRebuild -> RunningProduction ...
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BuildState {
    #[default]
    Init,
    RunningProduction,
    RunningTests,
    /// Build data was unreadable; restarting once as a full rebuild.
    RetryAsRebuild,
    Done,
    Failed,
    Canceled,
}

impl BuildState {
    pub fn is_finished(self) -> bool {
        matches!(self, BuildState::Done | BuildState::Failed | BuildState::Canceled)
    }
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            BuildState::Init => "init",
            BuildState::RunningProduction => "running-production",
            BuildState::RunningTests => "running-tests",
            BuildState::RetryAsRebuild => "retry-as-rebuild",
            BuildState::Done => "done",
            BuildState::Failed => "failed",
            BuildState::Canceled => "canceled",
        };
        f.write_str(s)
    }
}

/// Summary of a finished build.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildReport {
    pub state: BuildState,
    /// At least one ERROR message was reported.
    pub errors_found: bool,
    /// Chunks whose steps ran, in build order.
    pub chunks_built: Vec<String>,
    /// Chunks found up to date in make mode.
    pub chunks_up_to_date: Vec<String>,
    /// The build was restarted as a full rebuild after store corruption.
    pub retried_as_rebuild: bool,
}

impl BuildReport {
    pub(crate) fn new() -> Self {
        Self {
            state: BuildState::Init,
            errors_found: false,
            chunks_built: Vec::new(),
            chunks_up_to_date: Vec::new(),
            retried_as_rebuild: false,
        }
    }

    pub fn is_success(&self) -> bool {
        self.state == BuildState::Done && !self.errors_found
    }
}
