//! Ordered record collection with stable record identifiers.

use std::fmt;

use crate::error::{Error, Result};

use super::record::{validate_replacement, validate_tag, LabelRecord, OptionKey};

/// INFO block written when a file provides none.
pub const DEFAULT_PREAMBLE: &str = "% BEGIN INFO\n% END INFO\n";

/// Stable key of a record inside one [`AnnotationDocument`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RecordId(u32);

impl RecordId {
    #[must_use]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

impl std::str::FromStr for RecordId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        s.trim_start_matches('#').parse().map(Self)
    }
}

/// A parsed annotation file: opaque preamble plus ordered records.
#[derive(Debug, Clone)]
pub struct AnnotationDocument {
    preamble: String,
    records: Vec<(RecordId, LabelRecord)>,
    next_id: u32,
}

impl Default for AnnotationDocument {
    fn default() -> Self {
        Self::with_preamble(DEFAULT_PREAMBLE)
    }
}

impl PartialEq for AnnotationDocument {
    fn eq(&self, other: &Self) -> bool {
        self.preamble == other.preamble && self.records().eq(other.records())
    }
}

impl Eq for AnnotationDocument {}

impl AnnotationDocument {
    #[must_use]
    pub fn with_preamble(preamble: impl Into<String>) -> Self {
        Self {
            preamble: preamble.into(),
            records: Vec::new(),
            next_id: 1,
        }
    }

    /// Verbatim INFO block, markers included.
    pub fn preamble(&self) -> &str {
        &self.preamble
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append a record, returning its new id.
    pub fn push(&mut self, record: LabelRecord) -> RecordId {
        let id = RecordId(self.next_id);
        self.next_id += 1;
        self.records.push((id, record));
        id
    }

    /// Records in write order.
    pub fn records(&self) -> impl Iterator<Item = &LabelRecord> {
        self.records.iter().map(|(_, r)| r)
    }

    /// `(id, record)` pairs in write order.
    pub fn entries(&self) -> impl Iterator<Item = (RecordId, &LabelRecord)> {
        self.records.iter().map(|(id, r)| (*id, r))
    }

    pub fn ids(&self) -> Vec<RecordId> {
        self.records.iter().map(|(id, _)| *id).collect()
    }

    pub fn get(&self, id: RecordId) -> Option<&LabelRecord> {
        self.records.iter().find(|(i, _)| *i == id).map(|(_, r)| r)
    }

    pub fn get_mut(&mut self, id: RecordId) -> Result<&mut LabelRecord> {
        self.records
            .iter_mut()
            .find(|(i, _)| *i == id)
            .map(|(_, r)| r)
            .ok_or(Error::UnknownRecord(id))
    }

    pub fn set_tag(&mut self, id: RecordId, tag: &str) -> Result<()> {
        let tag = tag.trim();
        if tag.is_empty() {
            return Err(Error::EmptyTag);
        }
        validate_tag(tag)?;
        self.get_mut(id)?.tag = tag.to_string();
        Ok(())
    }

    pub fn set_replacement(&mut self, id: RecordId, replacement: &str) -> Result<()> {
        validate_replacement(replacement)?;
        self.get_mut(id)?.replacement = replacement.to_string();
        Ok(())
    }

    pub fn set_option(&mut self, id: RecordId, key: OptionKey, value: &str) -> Result<()> {
        self.get_mut(id)?.placement.set(key, value)
    }

    /// Records with a usable tag, in write order.
    pub fn complete_records(&self) -> impl Iterator<Item = &LabelRecord> {
        self.records().filter(|r| r.is_complete())
    }

    /// Fail on the first record that would not read back unchanged once written.
    pub fn validate(&self) -> Result<()> {
        self.records().try_for_each(LabelRecord::validate)
    }
}
