//! psfrag substitution files: record model, reader and writer.
//!
//! A substitution file holds an opaque INFO block, copied through unchanged,
//! and a commands block with one `\psfrag` record per line. Records are kept
//! in an [`AnnotationDocument`] and addressed by [`RecordId`].

pub mod document;
pub mod parser;
pub mod record;
pub mod serializer;

pub use document::{AnnotationDocument, RecordId, DEFAULT_PREAMBLE};
pub use parser::{parse, parse_record};
pub use record::{validate_replacement, validate_tag, LabelRecord, OptionKey, Placement};
pub use serializer::{format_record, serialize};
