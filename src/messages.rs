// src/messages.rs

//! Build messages and the sinks that receive them.

use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use tracing::{error, info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Info,
    Warning,
    Error,
    Progress,
}

#[derive(Debug, Clone, PartialEq)]
pub struct BuildMessage {
    pub kind: MessageKind,
    /// Name of the step or component that produced the message.
    pub source: String,
    pub text: String,
    pub path: Option<PathBuf>,
    /// Fraction of the build completed, set on progress messages.
    pub done: Option<f32>,
}

impl BuildMessage {
    pub fn new(kind: MessageKind, source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            text: text.into(),
            path: None,
            done: None,
        }
    }

    pub fn info(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageKind::Info, source, text)
    }

    pub fn warning(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageKind::Warning, source, text)
    }

    pub fn error(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self::new(MessageKind::Error, source, text)
    }

    pub fn progress(text: impl Into<String>) -> Self {
        Self::new(MessageKind::Progress, crate::ENGINE_NAME, text)
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

impl fmt::Display for BuildMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.source, self.text)?;
        if let Some(path) = &self.path {
            write!(f, " ({})", path.display())?;
        }
        Ok(())
    }
}

/// Receives every message a build emits.
pub trait MessageSink: Send + Sync {
    fn process(&self, msg: &BuildMessage);
}

/// Forwards messages to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl MessageSink for TracingSink {
    fn process(&self, msg: &BuildMessage) {
        let path = msg.path.as_ref().map(|p| p.display().to_string());
        match msg.kind {
            MessageKind::Error => error!(source = %msg.source, path = ?path, "{}", msg.text),
            MessageKind::Warning => warn!(source = %msg.source, path = ?path, "{}", msg.text),
            MessageKind::Info => info!(source = %msg.source, path = ?path, "{}", msg.text),
            MessageKind::Progress => match msg.done {
                Some(done) => info!(done = %format!("{:.0}%", done * 100.0), "{}", msg.text),
                None => info!("{}", msg.text),
            },
        }
    }
}

/// Keeps every message; clones share the same buffer.
#[derive(Debug, Default, Clone)]
pub struct CollectingSink {
    messages: Arc<Mutex<Vec<BuildMessage>>>,
}

impl CollectingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<BuildMessage> {
        match self.messages.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn of_kind(&self, kind: MessageKind) -> Vec<BuildMessage> {
        self.messages()
            .into_iter()
            .filter(|m| m.kind == kind)
            .collect()
    }
}

impl MessageSink for CollectingSink {
    fn process(&self, msg: &BuildMessage) {
        let mut guard = match self.messages.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        guard.push(msg.clone());
    }
}

/// Fans every message out to a list of sinks.
#[derive(Default, Clone)]
pub struct MessageDispatcher {
    sinks: Vec<Arc<dyn MessageSink>>,
}

impl MessageDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, sink: Arc<dyn MessageSink>) {
        self.sinks.push(sink);
    }
}

impl fmt::Debug for MessageDispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MessageDispatcher")
            .field("sinks", &self.sinks.len())
            .finish()
    }
}

impl MessageSink for MessageDispatcher {
    fn process(&self, msg: &BuildMessage) {
        for sink in &self.sinks {
            sink.process(msg);
        }
    }
}
