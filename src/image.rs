//! EPS image asset: raw text, creator detection and tag lookup.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;

use crate::context::Context;
use crate::error::{Error, Result};

static CREATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^%%Creator:[ \t]*(.*?)[ \t]*\r?$").expect("valid creator regex"));

/// A PostScript string literal followed by a show-family operator.
static SHOWN_STRING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\(((?:[^()\\]|\\.)*)\)\s*([A-Za-z]*show)\b").expect("valid show regex")
});

/// Generators whose EPS output keeps labels as plain `show` strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Generator {
    Gnuplot,
    Matplotlib,
}

impl Generator {
    /// Detect from the `%%Creator:` value.
    pub fn detect(creator: &str) -> Option<Self> {
        let creator = creator.to_ascii_lowercase();
        if creator.contains("gnuplot") {
            Some(Self::Gnuplot)
        } else if creator.contains("matplotlib") {
            Some(Self::Matplotlib)
        } else {
            None
        }
    }

    /// Whether a show operator emitted by this generator draws a label.
    fn draws_label(self, operator: &str) -> bool {
        match self {
            // gnuplot's prologue defines justified variants
            Self::Gnuplot => matches!(
                operator,
                "show" | "Lshow" | "Rshow" | "Cshow" | "MLshow" | "MRshow" | "MCshow"
            ),
            Self::Matplotlib => operator == "show",
        }
    }
}

/// A loaded EPS file.
#[derive(Debug, Clone)]
pub struct ImageAsset {
    path: PathBuf,
    text: String,
    creator: Option<String>,
    candidates: Vec<String>,
}

impl ImageAsset {
    /// Load an `.eps` file. The file must exist and carry the `.eps` extension.
    pub fn load(path: impl AsRef<Path>, ctx: &Context) -> Result<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(Error::MissingFile(path.to_path_buf()));
        }
        if !has_extension(path, "eps") {
            return Err(Error::WrongExtension {
                path: path.to_path_buf(),
                expected: "eps",
            });
        }

        let bytes = std::fs::read(path)?;
        let asset = Self::from_text(path, String::from_utf8_lossy(&bytes).into_owned());
        ctx.debug(
            "image",
            format!(
                "loaded {} ({} bytes, creator: {})",
                path.display(),
                asset.text.len(),
                asset.creator.as_deref().unwrap_or("unknown")
            ),
        );
        if !asset.candidates.is_empty() {
            ctx.info(
                "image",
                format!("found {} candidate tags", asset.candidates.len()),
            );
        }
        Ok(asset)
    }

    /// Build from already loaded text.
    pub fn from_text(path: impl Into<PathBuf>, text: String) -> Self {
        let creator = CREATOR
            .captures(&text)
            .and_then(|c| c.get(1))
            .map(|m| m.as_str().to_string());
        let candidates = creator
            .as_deref()
            .and_then(Generator::detect)
            .map(|g| extract_candidates(&text, g))
            .unwrap_or_default();
        Self {
            path: path.into(),
            text,
            creator,
            candidates,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn creator(&self) -> Option<&str> {
        self.creator.as_deref()
    }

    /// Tags found heuristically (only for known generators).
    pub fn candidates(&self) -> &[String] {
        &self.candidates
    }

    /// File name without the `.eps` extension.
    pub fn stem(&self) -> String {
        self.path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }

    /// Directory holding the image; `.` for bare file names.
    pub fn dir(&self) -> PathBuf {
        match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }

    /// Whether `tag` is drawn by a show operator as a complete string literal.
    ///
    /// Matching is exact: `foo` does not match `(foobar) show`.
    pub fn check_tag(&self, tag: &str) -> bool {
        if tag.is_empty() {
            return false;
        }
        let pattern = format!(
            r"\({}\)\s*[A-Za-z]*show\b",
            regex::escape(&ps_escape(tag))
        );
        Regex::new(&pattern).is_ok_and(|re| re.is_match(&self.text))
    }
}

/// Escape a string the way it appears inside a PostScript `( )` literal.
fn ps_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if matches!(c, '(' | ')' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn ps_unescape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c == '\\' {
            if let Some(next) = chars.next() {
                out.push(next);
            }
        } else {
            out.push(c);
        }
    }
    out
}

/// Distinct shown strings in first-seen order.
fn extract_candidates(text: &str, generator: Generator) -> Vec<String> {
    let mut seen = Vec::new();
    for caps in SHOWN_STRING.captures_iter(text) {
        let (Some(literal), Some(op)) = (caps.get(1), caps.get(2)) else {
            continue;
        };
        if !generator.draws_label(op.as_str()) {
            continue;
        }
        let tag = ps_unescape(literal.as_str());
        if !tag.trim().is_empty() && !seen.contains(&tag) {
            seen.push(tag);
        }
    }
    seen
}

pub(crate) fn has_extension(path: &Path, ext: &str) -> bool {
    path.extension()
        .is_some_and(|e| e.to_string_lossy().eq_ignore_ascii_case(ext))
}

#[cfg(test)]
mod tests {
    use super::*;

    const GNUPLOT_EPS: &str = "%!PS-Adobe-2.0 EPSF-2.0\n\
%%Creator: gnuplot 5.4 patchlevel 2\n\
%%BoundingBox: 50 50 410 302\n\
/Helvetica findfont 140 scalefont setfont\n\
1000 400 M\n(x1) Cshow\n\
1000 800 M\n(ylabel) Rshow\n\
1000 900 M\n(x1) Cshow\n\
(f\\(t\\)) Lshow\n\
(hidden) stringwidth\n";

    fn asset(text: &str) -> ImageAsset {
        ImageAsset::from_text("figs/fig.eps", text.to_string())
    }

    #[test]
    fn check_tag_finds_shown_literal() {
        let img = asset("%!PS\n(foo) show\n");
        assert!(img.check_tag("foo"));
        assert!(!img.check_tag("bar"));
    }

    #[test]
    fn check_tag_is_exact() {
        let img = asset("%!PS\n(foobar) show\n(xfoo) show\n");
        assert!(!img.check_tag("foo"));
        assert!(img.check_tag("foobar"));
    }

    #[test]
    fn check_tag_ignores_non_show_usage() {
        let img = asset("%!PS\n(foo) stringwidth pop\n");
        assert!(!img.check_tag("foo"));
    }

    #[test]
    fn check_tag_escapes_regex_and_postscript() {
        let img = asset(GNUPLOT_EPS);
        assert!(img.check_tag("f(t)"));
        assert!(!img.check_tag("x."));
        assert!(!img.check_tag(""));
    }

    #[test]
    fn gnuplot_candidates_are_distinct_and_ordered() {
        let img = asset(GNUPLOT_EPS);
        assert_eq!(img.creator(), Some("gnuplot 5.4 patchlevel 2"));
        assert_eq!(img.candidates(), ["x1", "ylabel", "f(t)"]);
    }

    #[test]
    fn unknown_creator_has_no_candidates() {
        let img = asset("%!PS\n%%Creator: Inkscape\n(x1) show\n");
        assert_eq!(img.creator(), Some("Inkscape"));
        assert!(img.candidates().is_empty());
        assert!(img.check_tag("x1"));
    }

    #[test]
    fn generator_detection() {
        assert_eq!(Generator::detect("Matplotlib v3.8, https://matplotlib.org/"), Some(Generator::Matplotlib));
        assert_eq!(Generator::detect("GNUPLOT"), Some(Generator::Gnuplot));
        assert_eq!(Generator::detect("dvips"), None);
    }

    #[test]
    fn path_helpers() {
        let img = asset("");
        assert_eq!(img.stem(), "fig");
        assert_eq!(img.file_name(), "fig.eps");
        assert_eq!(img.dir(), PathBuf::from("figs"));
        assert_eq!(ImageAsset::from_text("fig.eps", String::new()).dir(), PathBuf::from("."));
    }

    #[test]
    fn load_rejects_missing_and_wrong_extension() {
        let ctx = Context::default();
        assert!(matches!(
            ImageAsset::load("/nonexistent/fig.eps", &ctx),
            Err(Error::MissingFile(_))
        ));

        let dir = tempfile::tempdir().unwrap();
        let png = dir.path().join("fig.png");
        std::fs::write(&png, b"\x89PNG").unwrap();
        assert!(matches!(
            ImageAsset::load(&png, &ctx),
            Err(Error::WrongExtension { expected: "eps", .. })
        ));
    }
}
