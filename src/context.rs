//! Explicit run context: configuration plus a sink for diagnostic events.
//!
//! Components never reach for global state. They receive a [`Context`] and
//! report noteworthy conditions through [`Context::diagnostics`], which by
//! default forwards to `tracing`.

use std::fmt;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error, info, warn};

use crate::config::Config;

/// Severity of a diagnostic event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Debug,
    Info,
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Debug => "debug",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        };
        f.write_str(name)
    }
}

/// A single diagnostic event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Emitting component (e.g. "parser", "pipeline").
    pub component: &'static str,
    pub message: String,
}

/// Receiver of diagnostic events.
pub trait DiagnosticSink: Send + Sync {
    fn emit(&self, diagnostic: Diagnostic);
}

/// Forwards diagnostics to `tracing`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl DiagnosticSink for TracingSink {
    fn emit(&self, d: Diagnostic) {
        match d.severity {
            Severity::Debug => debug!(component = d.component, "{}", d.message),
            Severity::Info => info!(component = d.component, "{}", d.message),
            Severity::Warning => warn!(component = d.component, "{}", d.message),
            Severity::Error => error!(component = d.component, "{}", d.message),
        }
    }
}

/// Collects diagnostics in memory, optionally forwarding to `tracing` too.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<Diagnostic>>,
    forward: bool,
}

impl MemorySink {
    /// Collect and also forward every event to `tracing`.
    #[must_use]
    pub fn forwarding() -> Self {
        Self {
            events: Mutex::default(),
            forward: true,
        }
    }

    /// Snapshot of collected events.
    pub fn events(&self) -> Vec<Diagnostic> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Remove and return collected events.
    pub fn drain(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.events.lock().unwrap_or_else(PoisonError::into_inner))
    }
}

impl DiagnosticSink for MemorySink {
    fn emit(&self, diagnostic: Diagnostic) {
        if self.forward {
            TracingSink.emit(diagnostic.clone());
        }
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(diagnostic);
    }
}

/// Configuration and diagnostics shared by every component of a run.
#[derive(Clone)]
pub struct Context {
    pub config: Config,
    sink: Arc<dyn DiagnosticSink>,
}

impl Context {
    #[must_use]
    pub fn new(config: Config, sink: Arc<dyn DiagnosticSink>) -> Self {
        Self { config, sink }
    }

    /// Context with the given config, reporting through `tracing`.
    #[must_use]
    pub fn with_config(config: Config) -> Self {
        Self::new(config, Arc::new(TracingSink))
    }

    pub fn diagnostics(&self) -> &dyn DiagnosticSink {
        self.sink.as_ref()
    }

    pub fn report(&self, severity: Severity, component: &'static str, message: impl Into<String>) {
        self.sink.emit(Diagnostic {
            severity,
            component,
            message: message.into(),
        });
    }

    pub fn debug(&self, component: &'static str, message: impl Into<String>) {
        self.report(Severity::Debug, component, message);
    }

    pub fn info(&self, component: &'static str, message: impl Into<String>) {
        self.report(Severity::Info, component, message);
    }

    pub fn warn(&self, component: &'static str, message: impl Into<String>) {
        self.report(Severity::Warning, component, message);
    }

    pub fn error(&self, component: &'static str, message: impl Into<String>) {
        self.report(Severity::Error, component, message);
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::with_config(Config::default())
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
