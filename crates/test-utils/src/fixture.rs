// crates/test-utils/src/fixture.rs

//! In-memory projects laid out under `/p`.
//!
//! Module `m` keeps sources in `/p/m/src`, tests in `/p/m/tests` and writes
//! to `/p/out/m` and `/p/out/m-test`. Build data lives in `/p/.incbuild`.

use std::path::PathBuf;
use std::sync::Arc;

use incbuild::builders::{BuildStep, BuilderRegistry};
use incbuild::engine::{BuildReport, CancelToken, ProjectBuilder, ProjectDescriptor};
use incbuild::errors::Result;
use incbuild::fs::mock::MockFileSystem;
use incbuild::fs::FileSystem;
use incbuild::fs_state::FsState;
use incbuild::messages::{BuildMessage, CollectingSink, MessageKind};
use incbuild::project::{Module, Project};
use incbuild::scope::CompileScope;
use incbuild::storage::BuildDataManager;

pub const DATA_DIR: &str = "/p/.incbuild";

/// A module with one source root and one test root, depending on `deps`.
pub fn module(name: &str, deps: &[&str]) -> Module {
    let mut module = Module::new(
        name,
        format!("/p/out/{name}"),
        format!("/p/out/{name}-test"),
    )
    .with_source_root(format!("/p/{name}/src"))
    .with_test_root(format!("/p/{name}/tests"));
    for dep in deps {
        module = module.depends_on(*dep);
    }
    module
}

pub fn src(module: &str, rel: &str) -> PathBuf {
    PathBuf::from(format!("/p/{module}/src/{rel}"))
}

pub fn test_src(module: &str, rel: &str) -> PathBuf {
    PathBuf::from(format!("/p/{module}/tests/{rel}"))
}

pub fn out(module: &str, rel: &str) -> PathBuf {
    PathBuf::from(format!("/p/out/{module}/{rel}"))
}

pub fn test_out(module: &str, rel: &str) -> PathBuf {
    PathBuf::from(format!("/p/out/{module}-test/{rel}"))
}

/// A project builder over a [`MockFileSystem`] with every message collected.
pub struct MockProject {
    pub fs: MockFileSystem,
    pub builder: ProjectBuilder,
    pub messages: CollectingSink,
}

impl MockProject {
    pub fn builder(fs: &MockFileSystem) -> MockProjectBuilder {
        MockProjectBuilder {
            fs: fs.clone(),
            modules: Vec::new(),
            registry: BuilderRegistry::new(),
            proceed_on_errors: false,
            use_hash: false,
            cancel: None,
        }
    }

    pub fn make(&mut self) -> Result<BuildReport> {
        self.builder.make()
    }

    pub fn rebuild(&mut self) -> Result<BuildReport> {
        self.builder.rebuild()
    }

    pub fn build(
        &mut self,
        scope: &CompileScope,
        is_make: bool,
        is_rebuild: bool,
    ) -> Result<BuildReport> {
        self.builder.build(scope, is_make, is_rebuild)
    }

    /// Drop all in-memory state, as if the process had been restarted.
    pub fn restart(&mut self) {
        let descriptor = self.builder.descriptor_mut();
        descriptor.fs_state = FsState::new();
        descriptor.data = BuildDataManager::new(descriptor.fs.clone(), DATA_DIR);
    }

    pub fn errors(&self) -> Vec<BuildMessage> {
        self.messages.of_kind(MessageKind::Error)
    }

    pub fn infos(&self) -> Vec<BuildMessage> {
        self.messages.of_kind(MessageKind::Info)
    }
}

pub struct MockProjectBuilder {
    fs: MockFileSystem,
    modules: Vec<Module>,
    registry: BuilderRegistry,
    proceed_on_errors: bool,
    use_hash: bool,
    cancel: Option<CancelToken>,
}

impl MockProjectBuilder {
    pub fn module(mut self, module: Module) -> Self {
        self.modules.push(module);
        self
    }

    pub fn step(mut self, step: impl BuildStep + 'static) -> Self {
        self.registry.register_step(Box::new(step));
        self
    }

    pub fn proceed_on_errors(mut self) -> Self {
        self.proceed_on_errors = true;
        self
    }

    pub fn use_hash(mut self) -> Self {
        self.use_hash = true;
        self
    }

    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> MockProject {
        let project = Project::new(self.modules).expect("valid test project");
        let fs: Arc<dyn FileSystem> = Arc::new(self.fs.clone());
        let descriptor = ProjectDescriptor::new(project, fs, DATA_DIR)
            .proceed_on_errors(self.proceed_on_errors)
            .use_hash(self.use_hash);
        let mut builder = ProjectBuilder::new(descriptor, self.registry);
        if let Some(token) = self.cancel {
            builder = builder.with_cancel_token(token);
        }
        let messages = CollectingSink::new();
        builder.add_message_sink(Arc::new(messages.clone()));
        MockProject {
            fs: self.fs,
            builder,
            messages,
        }
    }
}
