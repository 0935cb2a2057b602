//! Configuration loaded from `~/.config/epsfrag/config.toml`.
//!
//! ```toml
//! [tools]
//! latex = "/usr/local/texlive/bin/latex"
//! convert = "magick"
//!
//! [output]
//! png = true
//! density = 150
//! ```
//!
//! Every key is optional. Programs that are not configured are looked up in
//! `PATH` with [`which`].

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

/// Default raster density (dots per inch) for PNG output.
pub const DEFAULT_DENSITY: u32 = 300;

/// Top-level configuration.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Config {
    pub tools: ToolPaths,
    pub output: OutputConfig,
}

/// Paths of the external programs driven by the pipeline.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct ToolPaths {
    pub latex: String,
    pub dvips: String,
    pub ps2pdf: String,
    pub pdfcrop: String,
    pub pdftops: String,
    pub ps2eps: String,
    pub pdf2svg: String,
    pub convert: String,
}

impl Default for ToolPaths {
    fn default() -> Self {
        Self {
            latex: locate("latex"),
            dvips: locate("dvips"),
            ps2pdf: locate("ps2pdf"),
            pdfcrop: locate("pdfcrop"),
            pdftops: locate("pdftops"),
            ps2eps: locate("ps2eps"),
            pdf2svg: locate("pdf2svg"),
            convert: locate("convert"),
        }
    }
}

impl ToolPaths {
    /// `(name, configured path)` for every tool, in pipeline order.
    pub fn entries(&self) -> [(&'static str, &str); 8] {
        [
            ("latex", self.latex.as_str()),
            ("dvips", self.dvips.as_str()),
            ("ps2pdf", self.ps2pdf.as_str()),
            ("pdfcrop", self.pdfcrop.as_str()),
            ("pdftops", self.pdftops.as_str()),
            ("ps2eps", self.ps2eps.as_str()),
            ("pdf2svg", self.pdf2svg.as_str()),
            ("convert", self.convert.as_str()),
        ]
    }
}

fn locate(program: &str) -> String {
    which::which(program).map_or_else(
        |_| program.to_string(),
        |p| p.to_string_lossy().to_string(),
    )
}

/// Output selection defaults, overridable from the command line.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct OutputConfig {
    pub pdf: bool,
    pub svg: bool,
    pub png: bool,
    pub density: u32,
    /// Keep `.tex`, `.dvi`, `.ps`, ... after a run.
    pub keep_intermediates: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            pdf: false,
            svg: false,
            png: false,
            density: DEFAULT_DENSITY,
            keep_intermediates: false,
        }
    }
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str, origin: &Path) -> Result<Self> {
        let invalid = |message: String| Error::Config {
            path: origin.to_path_buf(),
            message,
        };
        let config: Self = toml::from_str(text).map_err(|e| invalid(e.to_string()))?;
        if config.output.density == 0 {
            return Err(invalid("output.density must be at least 1".to_string()));
        }
        Ok(config)
    }

    /// Load from an explicit path, or from the default location.
    ///
    /// A missing file at the default location yields the defaults; a missing
    /// explicit path is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(p) if !p.exists() => return Err(Error::MissingFile(p.to_path_buf())),
            Some(p) => p.to_path_buf(),
            None => {
                let p = config_path();
                if !p.exists() {
                    return Ok(Self::default());
                }
                p
            }
        };

        let content = std::fs::read_to_string(&path)?;
        Self::from_toml(&content, &path)
    }
}

/// Return the path to the default config file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("epsfrag")
        .join("config.toml")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config() {
        let config = Config::from_toml("", Path::new("config.toml")).unwrap();
        assert_eq!(config, Config::default());
        assert_eq!(config.output.density, DEFAULT_DENSITY);
    }

    #[test]
    fn parse_partial_config_keeps_defaults() {
        let toml_str = r#"
[tools]
latex = "/opt/tex/bin/latex"

[output]
png = true
density = 150
"#;
        let config = Config::from_toml(toml_str, Path::new("config.toml")).unwrap();
        assert_eq!(config.tools.latex, "/opt/tex/bin/latex");
        assert_eq!(config.tools.dvips, ToolPaths::default().dvips);
        assert!(config.output.png);
        assert!(!config.output.pdf);
        assert_eq!(config.output.density, 150);
    }

    #[test]
    fn invalid_toml_names_file() {
        let err = Config::from_toml("[output]\ndensity = \"high\"", Path::new("bad.toml"))
            .unwrap_err();
        assert!(matches!(err, Error::Config { ref path, .. } if path == Path::new("bad.toml")));
    }

    #[test]
    fn zero_density_is_rejected() {
        let err = Config::from_toml("[output]\npng = true\ndensity = 0\n", Path::new("c.toml"))
            .unwrap_err();
        assert!(matches!(err, Error::Config { ref message, .. } if message.contains("density")));
    }

    #[test]
    fn explicit_missing_path_is_error() {
        let err = Config::load(Some(Path::new("/nonexistent/epsfrag.toml"))).unwrap_err();
        assert!(matches!(err, Error::MissingFile(_)));
    }

    #[test]
    fn tool_entries_follow_pipeline_order() {
        let names: Vec<_> = ToolPaths::default().entries().iter().map(|(n, _)| *n).collect();
        assert_eq!(names[0], "latex");
        assert_eq!(names[5], "ps2eps");
    }
}
