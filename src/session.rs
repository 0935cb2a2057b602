//! Interactive editing session over an [`AnnotationStore`].
//!
//! Edits address records by [`RecordId`]. While a substitution run is in
//! flight every edit and every new run is rejected with [`Error::Busy`]; the
//! run itself works on a snapshot taken when it started.

use std::time::Duration;

use crate::annotation::{LabelRecord, OptionKey, RecordId};
use crate::context::Context;
use crate::error::{Error, Result};
use crate::pipeline::{
    Invoker, OutputFormat, OutputFormats, PipelineHandle, PipelineReport, ProcessRunner, Stage,
    ToolRunner,
};
use crate::store::AnnotationStore;

/// Heartbeat period while waiting for a run.
pub const HEARTBEAT: Duration = Duration::from_millis(50);

/// One line of user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    List,
    /// Append a record. Both fields may be empty.
    Add { tag: String, replacement: String },
    Tag { id: RecordId, tag: String },
    Replacement { id: RecordId, replacement: String },
    Placement { id: RecordId, key: OptionKey, value: String },
    Check { id: RecordId },
    Candidates,
    Format { format: OutputFormat, enabled: bool },
    Density(u32),
    Save,
    Replace,
    Help,
    Quit,
}

impl Command {
    /// Parse a command line. Free text (tags, replacements) runs to the end
    /// of the line.
    pub fn parse(line: &str) -> std::result::Result<Self, String> {
        let line = line.trim();
        let (word, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim_start();

        let id = |s: &str| -> std::result::Result<RecordId, String> {
            s.parse().map_err(|_| format!("invalid record id: {s:?}"))
        };
        let split = |s: &str| -> (String, String) {
            let (a, b) = s.split_once(char::is_whitespace).unwrap_or((s, ""));
            (a.to_string(), b.trim_start().to_string())
        };

        match word {
            "list" | "ls" => Ok(Self::List),
            "add" => {
                let (tag, replacement) = split(rest);
                Ok(Self::Add { tag, replacement })
            }
            "tag" => {
                let (target, tag) = split(rest);
                Ok(Self::Tag { id: id(&target)?, tag })
            }
            "rep" | "latex" => {
                let (target, replacement) = split(rest);
                Ok(Self::Replacement {
                    id: id(&target)?,
                    replacement,
                })
            }
            "opt" => {
                let (target, rest) = split(rest);
                let (key, value) = split(&rest);
                let key: OptionKey = key.parse().map_err(|e: Error| e.to_string())?;
                Ok(Self::Placement {
                    id: id(&target)?,
                    key,
                    value,
                })
            }
            "check" => Ok(Self::Check { id: id(rest)? }),
            "candidates" => Ok(Self::Candidates),
            "format" => {
                let (format, state) = split(rest);
                let format: OutputFormat = format.parse().map_err(|e: Error| e.to_string())?;
                let enabled = match state.as_str() {
                    "on" | "" => true,
                    "off" => false,
                    other => return Err(format!("expected on/off, got {other:?}")),
                };
                Ok(Self::Format { format, enabled })
            }
            "density" => rest
                .parse()
                .map(Self::Density)
                .map_err(|_| format!("invalid density: {rest:?}")),
            "save" => Ok(Self::Save),
            "replace" | "run" => Ok(Self::Replace),
            "help" | "?" => Ok(Self::Help),
            "quit" | "exit" | "q" => Ok(Self::Quit),
            "" => Err("empty command".to_string()),
            other => Err(format!("unknown command: {other}")),
        }
    }
}

/// Editable state plus the in-flight run, if any.
pub struct Session<R = ProcessRunner> {
    ctx: Context,
    store: AnnotationStore,
    invoker: Invoker<R>,
    formats: OutputFormats,
    run: Option<PipelineHandle>,
}

impl Session<ProcessRunner> {
    pub fn new(ctx: Context, store: AnnotationStore, formats: OutputFormats) -> Self {
        let invoker = Invoker::new(ctx.clone());
        Self::with_invoker(ctx, store, invoker, formats)
    }
}

impl<R: ToolRunner + 'static> Session<R> {
    pub fn with_invoker(
        ctx: Context,
        store: AnnotationStore,
        invoker: Invoker<R>,
        formats: OutputFormats,
    ) -> Self {
        Self {
            ctx,
            store,
            invoker,
            formats,
            run: None,
        }
    }

    pub fn store(&self) -> &AnnotationStore {
        &self.store
    }

    pub fn formats(&self) -> &OutputFormats {
        &self.formats
    }

    /// Whether a run is in flight.
    pub fn is_busy(&self) -> bool {
        self.run.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_busy() {
            Err(Error::Busy)
        } else {
            Ok(())
        }
    }

    pub fn add(&mut self, tag: &str, replacement: &str) -> Result<RecordId> {
        self.ensure_idle()?;
        let record = LabelRecord::new(tag.trim(), replacement);
        record.validate()?;
        let id = self.store.document_mut().push(record);
        self.ctx.debug("session", format!("added record {id}"));
        Ok(id)
    }

    /// Seed an empty document with the image's candidate tags.
    pub fn prepopulate_candidates(&mut self) -> Result<usize> {
        self.ensure_idle()?;
        Ok(self.store.prepopulate_candidates())
    }

    pub fn set_tag(&mut self, id: RecordId, tag: &str) -> Result<()> {
        self.ensure_idle()?;
        self.store.document_mut().set_tag(id, tag)
    }

    pub fn set_replacement(&mut self, id: RecordId, replacement: &str) -> Result<()> {
        self.ensure_idle()?;
        self.store.document_mut().set_replacement(id, replacement)
    }

    pub fn set_option(&mut self, id: RecordId, key: OptionKey, value: &str) -> Result<()> {
        self.ensure_idle()?;
        self.store.document_mut().set_option(id, key, value)
    }

    pub fn set_format(&mut self, format: OutputFormat, enabled: bool) -> Result<()> {
        self.ensure_idle()?;
        self.formats.set(format, enabled)
    }

    pub fn set_density(&mut self, density: u32) -> Result<()> {
        self.ensure_idle()?;
        if density == 0 {
            return Err(Error::InvalidField {
                field: "density",
                value: density.to_string(),
                reason: "must be at least 1 dpi",
            });
        }
        self.formats.density = density;
        Ok(())
    }

    /// Look up a record's tag, reported as info (found) or warning (not found).
    pub fn check(&self, id: RecordId) -> Result<bool> {
        let found = self.store.check_tag(id)?;
        let tag = self.store.document().get(id).map_or("", |r| r.tag.as_str());
        if found {
            self.ctx.info("session", format!("Tag {tag} found."));
        } else {
            self.ctx.warn("session", format!("Tag {tag} not found."));
        }
        Ok(found)
    }

    pub fn save(&self) -> Result<std::path::PathBuf> {
        self.ensure_idle()?;
        self.store.create_subs(&self.ctx)
    }

    /// Start a run on a snapshot of the current records.
    pub fn start_replace(&mut self) -> Result<()> {
        self.ensure_idle()?;
        let invoker = self.invoker.clone().with_formats(self.formats);
        let handle = invoker.spawn(self.store.snapshot(), self.store.image().clone());
        self.run = Some(handle);
        Ok(())
    }

    /// Wait for the in-flight run, ticking `on_tick` every [`HEARTBEAT`].
    /// The session is idle again afterwards, whatever the outcome.
    pub async fn finish_replace<F>(&mut self, on_tick: F) -> Result<PipelineReport>
    where
        F: FnMut(Stage),
    {
        let handle = self
            .run
            .take()
            .ok_or_else(|| Error::Join("no run in progress".to_string()))?;
        handle.wait_with_heartbeat(HEARTBEAT, on_tick).await
    }
}
