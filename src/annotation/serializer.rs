//! Writer for psfrag substitution files.

use std::fmt::Write as FmtWrite;

use super::document::AnnotationDocument;
use super::record::LabelRecord;

pub const COMMANDS_BEGIN: &str = "% BEGIN PS";
pub const COMMANDS_END: &str = "% END PS";
pub const END_OF_RECORD: &str = "%EndPs";

/// Format one record as a `\psfrag` line, without the trailing newline.
#[must_use]
pub fn format_record(record: &LabelRecord) -> String {
    let mut line = format!("\\psfrag{{{}}}", record.tag.trim());
    for (_, value) in record.placement.iter() {
        let _ = write!(line, "[{value}]");
    }
    let _ = write!(line, "{{{}}} {END_OF_RECORD}", record.replacement);
    line
}

/// Serialize a document. Records without a tag are left out.
#[must_use]
pub fn serialize(doc: &AnnotationDocument) -> String {
    let mut out = String::from(doc.preamble());
    if !out.is_empty() && !out.ends_with('\n') {
        out.push('\n');
    }
    out.push_str(COMMANDS_BEGIN);
    out.push('\n');
    for record in doc.complete_records() {
        out.push_str(&format_record(record));
        out.push('\n');
    }
    out.push_str(COMMANDS_END);
    out.push('\n');
    out
}
