//! Reader for psfrag substitution files.
//!
//! ```text
//! % BEGIN INFO
//! % anything, kept verbatim
//! % END INFO
//! % BEGIN PS
//! \psfrag{x1}[bl][bl][1.0][0]{$\alpha$} %EndPs
//! % END PS
//! ```

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::Context;
use crate::error::{Error, Result};

use super::document::AnnotationDocument;
use super::record::{LabelRecord, Placement};

/// Maximum number of bracketed options on one record.
pub const MAX_OPTIONS: usize = 4;

static INFO_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)% BEGIN INFO.*?% END INFO[^\n]*\n?").expect("valid INFO regex")
});

static COMMANDS_BLOCK: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ms)^% BEGIN PS[^\n]*\n(.*?)^% END PS").expect("valid PS regex")
});

/// Opening of a record; the tag that follows may nest balanced braces.
const RECORD_PREFIX: &str = "\\psfrag{";

// Greedy replacement group: anchors on the last closing brace before %EndPs.
static RECORD_TAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((?:\[[^\]]*\])*)\{(.*)\}\s*%EndPs\s*$").expect("valid record regex")
});

static OPTION: Lazy<Regex> = Lazy::new(|| Regex::new(r"\[([^\]]*)\]").expect("valid option regex"));

/// Parse the full text of a substitution file.
///
/// A missing or empty commands block is not an error: the document simply has
/// no records. Any non-blank, non-comment line inside the commands block that
/// is not a valid record fails the whole parse with its line number.
pub fn parse(text: &str, ctx: &Context) -> Result<AnnotationDocument> {
    let mut doc = match INFO_BLOCK.find(text) {
        Some(m) => AnnotationDocument::with_preamble(m.as_str()),
        None => {
            ctx.debug("parser", "no INFO block, using an empty one");
            AnnotationDocument::default()
        }
    };

    let Some(caps) = COMMANDS_BLOCK.captures(text) else {
        ctx.info("parser", "no commands block found, nothing to substitute");
        return Ok(doc);
    };
    let Some(body) = caps.get(1) else {
        return Ok(doc);
    };

    let first_line = text[..body.start()].matches('\n').count() + 1;
    for (offset, line) in body.as_str().lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        let record = parse_record(trimmed).ok_or_else(|| Error::MalformedRecord {
            line: first_line + offset,
            text: trimmed.to_string(),
        })?;
        doc.push(record);
    }

    if doc.is_empty() {
        ctx.info("parser", "commands block is empty, nothing to substitute");
    } else {
        ctx.debug("parser", format!("loaded {} psfrag records", doc.len()));
    }
    Ok(doc)
}

/// Parse a single `\psfrag{..}[..]{..} %EndPs` line.
pub fn parse_record(line: &str) -> Option<LabelRecord> {
    let rest = line.trim().strip_prefix(RECORD_PREFIX)?;
    let tag_end = closing_brace(rest)?;
    let tag = rest[..tag_end].trim();
    if tag.is_empty() {
        return None;
    }

    let caps = RECORD_TAIL.captures(&rest[tag_end + 1..])?;
    let options: Vec<&str> = OPTION
        .captures_iter(caps.get(1).map_or("", |m| m.as_str()))
        .filter_map(|c| c.get(1).map(|m| m.as_str()))
        .collect();
    if options.len() > MAX_OPTIONS {
        return None;
    }

    Some(LabelRecord {
        tag: tag.to_string(),
        replacement: caps.get(2)?.as_str().to_string(),
        placement: Placement::from_positional(options).ok()?,
    })
}

/// Byte offset of the `}` that closes a group whose `{` precedes `text`.
fn closing_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' if depth == 0 => return Some(i),
            '}' => depth -= 1,
            _ => {}
        }
    }
    None
}
