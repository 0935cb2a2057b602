//! `epsfrag` - LaTeX labels for EPS figures via psfrag
//!
//! # Features
//!
//! - **Substitution files**: read and write `\psfrag` records with a verbatim INFO block
//! - **Tag lookup**: check that a tag is drawn as a PostScript string in the figure
//! - **Candidate tags**: pre-populate records for gnuplot and matplotlib figures
//! - **Toolchain driver**: latex → dvips → ps2pdf → pdfcrop → pdftops → ps2eps, every step checked
//!
//! # Example
//!
//! ```rust,no_run
//! use epsfrag::{AnnotationStore, Context, Invoker, LabelRecord, Mode};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let ctx = Context::default();
//!     let mut store = AnnotationStore::open(&ctx, Path::new("fig.eps"), None, Mode::Headless)?;
//!     store.document_mut().push(LabelRecord::new("x1", "$\\alpha$"));
//!     let report = Invoker::new(ctx).run(&store.snapshot(), store.image()).await?;
//!     println!("Wrote {}", report.outputs[0].display());
//!     Ok(())
//! }
//! ```

pub mod annotation;
pub mod config;
pub mod context;
pub mod error;
pub mod image;
pub mod pipeline;
pub mod session;
pub mod store;

pub use annotation::{AnnotationDocument, LabelRecord, OptionKey, Placement, RecordId};
pub use config::Config;
pub use context::{Context, Diagnostic, DiagnosticSink, MemorySink, Severity, TracingSink};
pub use error::{Error, Result};
pub use image::ImageAsset;
pub use pipeline::{Invoker, OutputFormat, OutputFormats, PipelineReport, Stage};
pub use session::{Command, Session};
pub use store::{AnnotationStore, Mode};

/// Version of epsfrag.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
