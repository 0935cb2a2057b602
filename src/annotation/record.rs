//! Label records and their psfrag placement options.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default anchor token (baseline left).
pub const DEFAULT_ANCHOR: &str = "bl";
/// Default scale factor.
pub const DEFAULT_SCALE: &str = "1.0";
/// Default rotation in degrees.
pub const DEFAULT_ROTATION: &str = "0";

/// Check that `tag` can be written inside `\psfrag{..}` and read back.
///
/// Braces must balance and the tag must fit on one line.
pub fn validate_tag(tag: &str) -> Result<()> {
    let invalid = |reason| Error::InvalidField {
        field: "tag",
        value: tag.to_string(),
        reason,
    };
    if tag.contains(['\n', '\r']) {
        return Err(invalid("line breaks are not allowed"));
    }
    if !braces_balanced(tag) {
        return Err(invalid("braces must be balanced"));
    }
    Ok(())
}

/// Check that a replacement fits on the single line of its record.
pub fn validate_replacement(replacement: &str) -> Result<()> {
    if replacement.contains(['\n', '\r']) {
        return Err(Error::InvalidField {
            field: "replacement",
            value: replacement.to_string(),
            reason: "line breaks are not allowed",
        });
    }
    Ok(())
}

fn validate_option(key: OptionKey, value: &str) -> Result<()> {
    let invalid = |reason| Error::InvalidField {
        field: key.name(),
        value: value.to_string(),
        reason,
    };
    if value.contains(['\n', '\r']) {
        return Err(invalid("line breaks are not allowed"));
    }
    if value.contains(']') {
        return Err(invalid("`]` would close the option early"));
    }
    Ok(())
}

fn braces_balanced(text: &str) -> bool {
    let mut depth = 0usize;
    for c in text.chars() {
        match c {
            '{' => depth += 1,
            '}' => match depth.checked_sub(1) {
                Some(d) => depth = d,
                None => return false,
            },
            _ => {}
        }
    }
    depth == 0
}

/// The four positional psfrag options, in canonical order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum OptionKey {
    /// Anchor on the original text (`posn`).
    TextAnchor,
    /// Anchor on the replacement (`psposn`).
    ReplacementAnchor,
    Scale,
    Rotation,
}

impl OptionKey {
    /// All keys in the order they are written.
    pub const CANONICAL: [Self; 4] = [
        Self::TextAnchor,
        Self::ReplacementAnchor,
        Self::Scale,
        Self::Rotation,
    ];

    /// Value substituted for a blank or absent option.
    #[must_use]
    pub fn default_value(self) -> &'static str {
        match self {
            Self::TextAnchor | Self::ReplacementAnchor => DEFAULT_ANCHOR,
            Self::Scale => DEFAULT_SCALE,
            Self::Rotation => DEFAULT_ROTATION,
        }
    }

    /// Name used on the command line and in messages.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::TextAnchor => "anchor",
            Self::ReplacementAnchor => "ps-anchor",
            Self::Scale => "scale",
            Self::Rotation => "rotation",
        }
    }
}

impl fmt::Display for OptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OptionKey {
    type Err = Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "anchor" | "posn" | "text-anchor" | "1" => Ok(Self::TextAnchor),
            "ps-anchor" | "psposn" | "replacement-anchor" | "2" => Ok(Self::ReplacementAnchor),
            "scale" | "3" => Ok(Self::Scale),
            "rotation" | "rot" | "4" => Ok(Self::Rotation),
            _ => Err(Error::UnknownOption(s.to_string())),
        }
    }
}

/// Placement options of a record. Blank values never survive assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
    values: [String; 4],
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            values: OptionKey::CANONICAL.map(|k| k.default_value().to_string()),
        }
    }
}

impl Placement {
    /// Build from positional values. Missing or blank slots take defaults.
    pub fn from_positional<I, S>(values: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut placement = Self::default();
        for (key, value) in OptionKey::CANONICAL.into_iter().zip(values) {
            placement.set(key, value.as_ref())?;
        }
        Ok(placement)
    }

    #[must_use]
    pub fn get(&self, key: OptionKey) -> &str {
        &self.values[key as usize]
    }

    /// Set an option. A blank value resets it to the key's default.
    pub fn set(&mut self, key: OptionKey, value: &str) -> Result<()> {
        let value = value.trim();
        validate_option(key, value)?;
        self.values[key as usize] = if value.is_empty() {
            key.default_value().to_string()
        } else {
            value.to_string()
        };
        Ok(())
    }

    /// `(key, value)` pairs in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = (OptionKey, &str)> {
        OptionKey::CANONICAL
            .into_iter()
            .map(move |k| (k, self.get(k)))
    }

    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// One tag → replacement substitution.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelRecord {
    /// Literal string token in the EPS file.
    pub tag: String,
    /// LaTeX markup replacing the tag.
    pub replacement: String,
    pub placement: Placement,
}

impl LabelRecord {
    #[must_use]
    pub fn new(tag: impl Into<String>, replacement: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            replacement: replacement.into(),
            placement: Placement::default(),
        }
    }

    pub fn with_option(mut self, key: OptionKey, value: &str) -> Result<Self> {
        self.placement.set(key, value)?;
        Ok(self)
    }

    /// Ready for serialization: the tag is the only mandatory field.
    pub fn is_complete(&self) -> bool {
        !self.tag.trim().is_empty()
    }

    /// Check that the record survives a write and a re-read unchanged.
    ///
    /// An untagged record is never written, so only its replacement is checked.
    pub fn validate(&self) -> Result<()> {
        if self.is_complete() {
            validate_tag(self.tag.trim())?;
        }
        validate_replacement(&self.replacement)
    }
}
