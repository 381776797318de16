// src/builders/command.rs

//! Build step that runs an external shell command.
//!
//! The command sees the chunk through environment variables and talks back
//! through its stdout, one directive per line:
//!
//! ```text
//! output: src/a.txt -> out/a.bin   register an output of a source
//! error: message                   report an error (warning:, info: too)
//! pass                             ask for another pass over the category
//! cascade                          invalidate dependent chunks
//! ```
//!
//! Relative paths in `output:` lines are taken against the directory the
//! command ran in. Any other line is logged at debug level.

use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use globset::{Glob, GlobSet, GlobSetBuilder};
use regex::Regex;
use tracing::{debug, info, warn};

use crate::builders::{BuildStep, BuilderCategory, ExitCode};
use crate::dag::ModuleChunk;
use crate::engine::{CompileContext, DirtyFile};
use crate::fs::to_system_independent;
use crate::messages::{BuildMessage, MessageKind};

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Declarative description of a command step, as read from configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct CommandStepSpec {
    pub name: String,
    pub category: BuilderCategory,
    pub cmd: String,
    /// Globs over source paths relative to their root; empty matches all.
    pub sources: Vec<String>,
    /// Restrict to test (`true`) or production (`false`) chunks.
    pub tests: Option<bool>,
    /// Directory the command runs in.
    pub workdir: Option<PathBuf>,
}

impl CommandStepSpec {
    pub fn new(name: impl Into<String>, category: BuilderCategory, cmd: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            category,
            cmd: cmd.into(),
            sources: Vec::new(),
            tests: None,
            workdir: None,
        }
    }

    pub fn with_sources<I, S>(mut self, globs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.sources = globs.into_iter().map(Into::into).collect();
        self
    }
}

/// Parsed stdout directive.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Directive {
    Output { source: PathBuf, output: PathBuf },
    Message { kind: MessageKind, text: String },
    Pass,
    Cascade,
    Other(String),
}

#[derive(Debug, Clone)]
struct LineParser {
    output: Regex,
    message: Regex,
}

impl LineParser {
    fn new() -> Result<Self> {
        Ok(Self {
            output: Regex::new(r"^output:\s*(?P<src>.+?)\s*->\s*(?P<out>.+?)\s*$")?,
            message: Regex::new(r"^(?P<kind>error|warning|info):\s*(?P<text>.*)$")?,
        })
    }

    fn parse(&self, line: &str) -> Directive {
        let line = line.trim();
        if line == "pass" {
            return Directive::Pass;
        }
        if line == "cascade" {
            return Directive::Cascade;
        }
        if let Some(caps) = self.output.captures(line) {
            return Directive::Output {
                source: PathBuf::from(&caps["src"]),
                output: PathBuf::from(&caps["out"]),
            };
        }
        if let Some(caps) = self.message.captures(line) {
            let kind = match &caps["kind"] {
                "error" => MessageKind::Error,
                "warning" => MessageKind::Warning,
                _ => MessageKind::Info,
            };
            return Directive::Message {
                kind,
                text: caps["text"].to_string(),
            };
        }
        Directive::Other(line.to_string())
    }
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = Glob::new(pattern).with_context(|| format!("invalid glob pattern: {pattern}"))?;
        builder.add(glob);
    }
    Ok(builder.build()?)
}

#[derive(Debug, Clone)]
pub struct CommandStep {
    spec: CommandStepSpec,
    sources: Option<GlobSet>,
    parser: LineParser,
}

impl CommandStep {
    pub fn new(spec: CommandStepSpec) -> Result<Self> {
        let sources = if spec.sources.is_empty() {
            None
        } else {
            Some(
                build_globset(&spec.sources)
                    .with_context(|| format!("building source globs for step '{}'", spec.name))?,
            )
        };
        Ok(Self {
            spec,
            sources,
            parser: LineParser::new()?,
        })
    }

    pub fn spec(&self) -> &CommandStepSpec {
        &self.spec
    }

    fn applies_to(&self, chunk: &ModuleChunk) -> bool {
        self.spec.tests.is_none_or(|tests| tests == chunk.is_tests())
    }

    fn matches(&self, file: &DirtyFile<'_>) -> bool {
        match &self.sources {
            Some(set) => set.is_match(to_system_independent(file.relative_path())),
            None => true,
        }
    }

    fn spawn(&self, chunk: &ModuleChunk, output: &Path, files: &[PathBuf]) -> Result<Child> {
        let mut cmd = if cfg!(windows) {
            let mut c = Command::new("cmd");
            c.arg("/C").arg(&self.spec.cmd);
            c
        } else {
            let mut c = Command::new("sh");
            c.arg("-c").arg(&self.spec.cmd);
            c
        };
        if let Some(dir) = &self.spec.workdir {
            cmd.current_dir(dir);
        }

        let file_list: Vec<String> = files.iter().map(|f| f.display().to_string()).collect();
        cmd.env("INCBUILD_CHUNK", chunk.name())
            .env("INCBUILD_OUTPUT", output)
            .env("INCBUILD_FILES", file_list.join("\n"))
            .env("INCBUILD_TESTS", if chunk.is_tests() { "1" } else { "0" })
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        cmd.spawn()
            .with_context(|| format!("spawning process for step '{}'", self.spec.name))
    }

    /// Resolve a path printed by the command against its working directory.
    fn resolve(&self, path: PathBuf) -> Result<PathBuf> {
        if path.is_absolute() {
            return Ok(path);
        }
        let base = match &self.spec.workdir {
            Some(dir) => dir.clone(),
            None => std::env::current_dir().context("resolving step output paths")?,
        };
        Ok(base.join(path).components().collect())
    }

    /// Wait for the child, killing it if the build gets canceled.
    fn wait(&self, ctx: &CompileContext<'_>, child: &mut Child) -> Result<Option<i32>> {
        loop {
            if let Some(status) = child.try_wait()? {
                return Ok(Some(status.code().unwrap_or(-1)));
            }
            if ctx.is_canceled() {
                info!(step = %self.spec.name, "build canceled, killing step process");
                if let Err(e) = child.kill() {
                    warn!(step = %self.spec.name, error = %e, "failed to kill step process");
                }
                if let Err(e) = child.wait() {
                    warn!(step = %self.spec.name, error = %e, "failed to reap step process");
                }
                return Ok(None);
            }
            thread::sleep(POLL_INTERVAL);
        }
    }
}

fn read_lines<R: Read + Send + 'static>(reader: R) -> thread::JoinHandle<Vec<String>> {
    thread::spawn(move || BufReader::new(reader).lines().map_while(|l| l.ok()).collect())
}

impl BuildStep for CommandStep {
    fn name(&self) -> &str {
        &self.spec.name
    }

    fn category(&self) -> BuilderCategory {
        self.spec.category
    }

    fn build(&self, ctx: &mut CompileContext<'_>, chunk: &ModuleChunk) -> anyhow::Result<ExitCode> {
        if !self.applies_to(chunk) {
            return Ok(ExitCode::Ok);
        }
        let dirty: Vec<DirtyFile<'_>> = ctx
            .files_to_recompile(chunk)
            .into_iter()
            .filter(|f| self.matches(f))
            .collect();
        if dirty.is_empty() && ctx.removed_sources().is_empty() {
            return Ok(ExitCode::Ok);
        }
        let Some(target) = chunk.targets().first() else {
            return Ok(ExitCode::Ok);
        };
        let output = ctx
            .output_dir(target)
            .map(Path::to_path_buf)
            .unwrap_or_default();
        let files: Vec<PathBuf> = dirty.iter().map(|f| f.path.clone()).collect();

        info!(step = %self.spec.name, chunk = %chunk, files = files.len(), "running command step");
        let mut child = self.spawn(chunk, &output, &files)?;
        let stdout = child.stdout.take().map(read_lines);
        let stderr = child.stderr.take().map(read_lines);

        let code = self.wait(ctx, &mut child)?;
        let stdout = stdout.and_then(|h| h.join().ok()).unwrap_or_default();
        let stderr = stderr.and_then(|h| h.join().ok()).unwrap_or_default();
        for line in &stderr {
            debug!(step = %self.spec.name, "stderr: {}", line);
        }
        ctx.check_canceled()?;

        let mut exit = ExitCode::Ok;
        for line in &stdout {
            match self.parser.parse(line) {
                Directive::Output { source, output } => {
                    let source = self.resolve(source)?;
                    let output = self.resolve(output)?;
                    let Some(rd) = ctx.project().roots().root_for_file(&source) else {
                        warn!(
                            step = %self.spec.name,
                            source = ?source,
                            "output reported for unknown source"
                        );
                        continue;
                    };
                    ctx.register_output(&rd.target, &source, output)?;
                }
                Directive::Message { kind, text } => {
                    ctx.process_message(BuildMessage::new(kind, self.spec.name.clone(), text));
                }
                Directive::Pass => exit = ExitCode::AdditionalPassRequired,
                Directive::Cascade => ctx.request_cascade_invalidation(chunk)?,
                Directive::Other(text) if !text.is_empty() => {
                    debug!(step = %self.spec.name, "stdout: {}", text);
                }
                Directive::Other(_) => {}
            }
        }

        if let Some(code) = code.filter(|c| *c != 0) {
            ctx.process_message(BuildMessage::error(
                self.spec.name.clone(),
                format!("command exited with code {code}: {}", self.spec.cmd),
            ));
        }
        Ok(exit)
    }
}
