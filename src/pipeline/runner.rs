//! External program execution.
//!
//! Every step is a discrete program plus argument vector, never a shell
//! string. The [`ToolRunner`] trait lets tests substitute the toolchain.

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::config::ToolPaths;
use crate::error::{Error, Result};

use super::OutputFormats;

/// One external program run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolInvocation {
    /// Step label used in progress and errors (e.g. "pdfcrop").
    pub step: &'static str,
    pub program: String,
    pub args: Vec<String>,
    /// Working directory (the image directory).
    pub cwd: PathBuf,
    /// Files the step must produce.
    pub outputs: Vec<PathBuf>,
}

/// Captured result of a finished program.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ToolOutput {
    /// Exit code, `None` when terminated by a signal.
    pub code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl ToolOutput {
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs external programs.
#[async_trait]
pub trait ToolRunner: Send + Sync {
    /// Run to completion and capture output. Only spawn failures are errors;
    /// a non-zero exit is reported through [`ToolOutput::code`].
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput>;
}

/// Runs programs as tokio subprocesses.
#[derive(Debug, Default, Clone, Copy)]
pub struct ProcessRunner;

#[async_trait]
impl ToolRunner for ProcessRunner {
    async fn run(&self, invocation: &ToolInvocation) -> Result<ToolOutput> {
        debug!("{} args: {:?}", invocation.program, invocation.args);

        let output = Command::new(&invocation.program)
            .args(&invocation.args)
            .current_dir(&invocation.cwd)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|source| Error::ToolSpawn {
                program: invocation.program.clone(),
                source,
            })?;

        Ok(ToolOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

/// Availability of one external program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolStatus {
    pub name: &'static str,
    pub program: String,
    pub resolved: Option<PathBuf>,
    /// Needed for the selected output formats.
    pub required: bool,
}

/// Resolve every configured program in `PATH`.
pub fn check_toolchain(tools: &ToolPaths, formats: &OutputFormats) -> Vec<ToolStatus> {
    tools
        .entries()
        .into_iter()
        .map(|(name, program)| ToolStatus {
            name,
            program: program.to_string(),
            resolved: which::which(program).ok(),
            required: match name {
                "pdf2svg" => formats.svg,
                "convert" => formats.png,
                _ => true,
            },
        })
        .collect()
}
