//! Generated LaTeX wrapper document and compiler log scraping.

use once_cell::sync::Lazy;
use regex::Regex;

static FILE_LINE_ERROR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^.+:\d+: .*$").expect("valid file-line-error regex"));

/// Maximum number of lines quoted from a failing tool's stderr.
const STDERR_TAIL: usize = 20;

/// Wrapper document: one figure page that inputs the substitution file and
/// includes the image.
#[must_use]
pub fn source_document(subs_file: &str, image_file: &str) -> String {
    format!(
        "\\documentclass[a4paper]{{article}}\n\
         \\usepackage{{graphicx, psfrag}}\n\
         \\begin{{document}}\n\
         \\pagestyle{{empty}}\n\
         \\begin{{figure}}[htbp]\n\
         \\input{{{subs_file}}}\n\
         \\centerline{{\\includegraphics[width=\\textwidth]{{{image_file}}}}}\n\
         \\end{{figure}}\n\
         \\end{{document}}\n"
    )
}

/// `file:line: message` lines from `latex -file-line-error` output.
pub fn latex_errors(log: &str) -> Vec<&str> {
    FILE_LINE_ERROR.find_iter(log).map(|m| m.as_str()).collect()
}

/// Last lines of a tool's stderr.
pub fn stderr_tail(stderr: &str) -> String {
    let lines: Vec<&str> = stderr.trim().lines().collect();
    lines[lines.len().saturating_sub(STDERR_TAIL)..].join("\n")
}
