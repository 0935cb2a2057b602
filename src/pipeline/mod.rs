//! Substitution driver: latex → dvips → ps2pdf → pdfcrop → pdftops → ps2eps.
//!
//! Orchestrates the TeX toolchain that turns an EPS figure plus its psfrag
//! records into `<stem>-latex.eps` and, optionally, PDF, SVG and PNG copies.
//!
//! # Example
//!
//! ```rust,no_run
//! use epsfrag::{AnnotationStore, Context, Invoker, Mode};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = Context::default();
//!     let store = AnnotationStore::open(&ctx, Path::new("fig.eps"), None, Mode::Headless)?;
//!     let report = Invoker::new(ctx).run(&store.snapshot(), store.image()).await?;
//!     println!("{:?}", report.outputs);
//!     Ok(())
//! }
//! ```

pub mod invoker;
pub mod latex;
pub mod runner;

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use crate::config::OutputConfig;
use crate::error::Error;

pub use invoker::{Invoker, PipelineHandle};
pub use runner::{check_toolchain, ProcessRunner, ToolInvocation, ToolOutput, ToolRunner, ToolStatus};

/// Suffix of every final output file (`fig.eps` → `fig-latex.eps`).
pub const OUTPUT_SUFFIX: &str = "-latex";
/// Suffix of the intermediate job name (`fig-psfrag.tex`, `.dvi`, ...).
pub const JOB_SUFFIX: &str = "-psfrag";

/// Output file format.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// Always produced.
    Eps,
    Pdf,
    Svg,
    Png,
}

impl OutputFormat {
    #[must_use]
    pub fn extension(&self) -> &'static str {
        match self {
            Self::Eps => "eps",
            Self::Pdf => "pdf",
            Self::Svg => "svg",
            Self::Png => "png",
        }
    }
}

impl FromStr for OutputFormat {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "eps" => Ok(Self::Eps),
            "pdf" => Ok(Self::Pdf),
            "svg" => Ok(Self::Svg),
            "png" => Ok(Self::Png),
            _ => Err(Error::UnknownFormat(s.to_string())),
        }
    }
}

/// Requested optional outputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputFormats {
    pub pdf: bool,
    pub svg: bool,
    pub png: bool,
    /// PNG density in dots per inch.
    pub density: u32,
}

impl Default for OutputFormats {
    fn default() -> Self {
        Self::from(&OutputConfig::default())
    }
}

impl From<&OutputConfig> for OutputFormats {
    fn from(c: &OutputConfig) -> Self {
        Self {
            pdf: c.pdf,
            svg: c.svg,
            png: c.png,
            density: c.density,
        }
    }
}

impl OutputFormats {
    /// Toggle an optional format; EPS cannot be switched off.
    pub fn set(&mut self, format: OutputFormat, enabled: bool) -> crate::Result<()> {
        match format {
            OutputFormat::Eps if enabled => {}
            OutputFormat::Eps => return Err(Error::UnknownFormat("eps is always produced".to_string())),
            OutputFormat::Pdf => self.pdf = enabled,
            OutputFormat::Svg => self.svg = enabled,
            OutputFormat::Png => self.png = enabled,
        }
        Ok(())
    }

    /// Formats that will be produced, EPS first.
    pub fn selected(&self) -> Vec<OutputFormat> {
        let mut out = vec![OutputFormat::Eps];
        if self.pdf {
            out.push(OutputFormat::Pdf);
        }
        if self.svg {
            out.push(OutputFormat::Svg);
        }
        if self.png {
            out.push(OutputFormat::Png);
        }
        out
    }
}

impl fmt::Display for OutputFormats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = self.selected().iter().map(OutputFormat::extension).collect();
        write!(f, "{}", names.join(", "))?;
        if self.png {
            write!(f, " (png at {} dpi)", self.density)?;
        }
        Ok(())
    }
}

/// Progress of a pipeline run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Stage {
    #[default]
    Pending,
    WritingSubs,
    WritingSource,
    /// External step in progress.
    Running(&'static str),
    Finalizing,
    Done,
    Failed,
}

impl Stage {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done | Self::Failed)
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => f.write_str("pending"),
            Self::WritingSubs => f.write_str("writing substitutions"),
            Self::WritingSource => f.write_str("writing latex source"),
            Self::Running(step) => write!(f, "running {step}"),
            Self::Finalizing => f.write_str("finalizing"),
            Self::Done => f.write_str("done"),
            Self::Failed => f.write_str("failed"),
        }
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineReport {
    /// Substitution file written before compiling.
    pub subs_file: PathBuf,
    /// Final output files, EPS first.
    pub outputs: Vec<PathBuf>,
    /// External steps executed.
    pub steps: Vec<&'static str>,
}
