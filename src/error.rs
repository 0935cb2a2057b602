//! Error taxonomy shared by the store, the checker and the pipeline.

use std::path::PathBuf;

use thiserror::Error;

use crate::annotation::RecordId;

/// Errors raised by `epsfrag` components.
#[derive(Error, Debug)]
pub enum Error {
    /// A required input file does not exist.
    #[error("File {} does not exist", .0.display())]
    MissingFile(PathBuf),

    /// An input file has the wrong extension.
    #[error("File {} is not a .{expected} file", .path.display())]
    WrongExtension {
        path: PathBuf,
        expected: &'static str,
    },

    /// Nothing to substitute (fatal only in headless mode).
    #[error("No substitutions to be made")]
    NoSubstitutions,

    /// A line in the commands block is not a valid `\psfrag` record.
    #[error("Malformed psfrag record at line {line}: {text}")]
    MalformedRecord { line: usize, text: String },

    #[error("Tag must not be empty")]
    EmptyTag,

    /// A record field holds text that cannot be written back as a `\psfrag` line.
    #[error("Invalid {field} {value:?}: {reason}")]
    InvalidField {
        field: &'static str,
        value: String,
        reason: &'static str,
    },

    #[error("No record with id {0}")]
    UnknownRecord(RecordId),

    #[error("Unknown placement option: {0}")]
    UnknownOption(String),

    #[error("Unknown output format: {0}")]
    UnknownFormat(String),

    /// A substitution run is in flight; edits and new runs are locked out.
    #[error("A substitution run is already in progress")]
    Busy,

    #[error("Failed to start {program}: {source}")]
    ToolSpawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// External step exited unsuccessfully.
    #[error("{step} failed ({program} {}){}", describe_exit(.code), format_detail(.detail))]
    ToolFailed {
        step: &'static str,
        program: String,
        /// Exit code, `None` when killed by a signal.
        code: Option<i32>,
        detail: String,
    },

    /// External step reported success but did not produce its output.
    #[error("{step} did not produce {}", .path.display())]
    MissingArtifact { step: &'static str, path: PathBuf },

    #[error("Pipeline task aborted: {0}")]
    Join(String),

    #[error("Invalid config {}: {message}", .path.display())]
    Config { path: PathBuf, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(
        || "was terminated by a signal".to_string(),
        |c| format!("exited with code {c}"),
    )
}

fn format_detail(detail: &str) -> String {
    if detail.is_empty() {
        String::new()
    } else {
        format!(":\n{detail}")
    }
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// External toolchain failures that leave the session usable.
    pub fn is_tool_failure(&self) -> bool {
        matches!(
            self,
            Self::ToolSpawn { .. } | Self::ToolFailed { .. } | Self::MissingArtifact { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_names_path() {
        let err = Error::MissingFile(PathBuf::from("figs/plot.eps"));
        assert_eq!(err.to_string(), "File figs/plot.eps does not exist");
    }

    #[test]
    fn wrong_extension_reads_naturally() {
        let err = Error::WrongExtension {
            path: PathBuf::from("subs.txt"),
            expected: "tex",
        };
        assert_eq!(err.to_string(), "File subs.txt is not a .tex file");
    }

    #[test]
    fn malformed_record_names_line() {
        let err = Error::MalformedRecord {
            line: 7,
            text: "\\psfrag{x}".to_string(),
        };
        assert!(err.to_string().contains("line 7"));
    }

    #[test]
    fn tool_failure_shows_code_and_detail() {
        let err = Error::ToolFailed {
            step: "latex",
            program: "latex".to_string(),
            code: Some(1),
            detail: "fig-psfrag.tex:12: Undefined control sequence.".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.starts_with("latex failed (latex exited with code 1):\n"));
        assert!(msg.contains("Undefined control sequence"));
    }

    #[test]
    fn artifact_errors_are_tool_failures() {
        let err = Error::MissingArtifact {
            step: "dvips",
            path: PathBuf::from("fig-psfrag.ps"),
        };
        assert!(err.is_tool_failure());
        assert!(!Error::NoSubstitutions.is_tool_failure());
    }
}
