//! Input/output resolution and logging configuration for the CLI.
//!
//! Every tool reads tabular text from a file or from stdin and writes its
//! results to stdout. Diagnostics never go to stdout: they are routed through
//! `tracing` to stderr, filtered by `$MINIMANTICS_LOG` when set.

use anyhow::{Context, Result};
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use tracing_subscriber::EnvFilter;

/// Environment variable overriding the log filter (e.g. `debug`).
pub const LOG_ENV: &str = "MINIMANTICS_LOG";

/// Path argument meaning "read standard input".
pub const STDIN_PATH: &str = "-";

/// Builds the log filter.
///
/// Search order:
/// 1. `$MINIMANTICS_LOG` when set and valid
/// 2. `info` with `--verbose`, `warn` otherwise
pub fn log_filter(verbose: bool) -> EnvFilter {
    if let Ok(directives) = std::env::var(LOG_ENV) {
        if let Ok(filter) = EnvFilter::try_new(&directives) {
            return filter;
        }
    }
    EnvFilter::new(default_directive(verbose))
}

fn default_directive(verbose: bool) -> &'static str {
    if verbose {
        "info"
    } else {
        "warn"
    }
}

/// Returns true when `path` designates standard input.
pub fn is_stdin(path: Option<&Path>) -> bool {
    path.map_or(true, |p| p.as_os_str() == STDIN_PATH)
}

/// Name of an input for messages: the path, or `<stdin>`.
pub fn source_name(path: Option<&Path>) -> String {
    match path {
        Some(p) if !is_stdin(Some(p)) => p.display().to_string(),
        _ => "<stdin>".to_string(),
    }
}

/// Opens an input; `None` or `-` reads standard input.
///
/// # Errors
///
/// The file cannot be opened.
pub fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(p) if !is_stdin(Some(p)) => open_file(p),
        _ => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

/// Opens a file that must exist (stdin is not accepted).
///
/// # Errors
///
/// The file cannot be opened.
pub fn open_file(path: &Path) -> Result<Box<dyn BufRead>> {
    let file = File::open(path).with_context(|| format!("Failed to open {}", path.display()))?;
    Ok(Box::new(BufReader::new(file)))
}

/// Buffered standard output.
pub fn output() -> BufWriter<io::StdoutLock<'static>> {
    BufWriter::new(io::stdout().lock())
}

/// Reads a list of values, one per line (trailing whitespace stripped,
/// blank lines skipped).
///
/// # Errors
///
/// The file cannot be opened or read.
pub fn read_value_list(path: &Path) -> Result<Vec<String>> {
    let reader = open_file(path)?;
    let mut values = Vec::new();
    for line in reader.lines() {
        let line = line.with_context(|| format!("Failed to read {}", path.display()))?;
        let value = line.trim_end();
        if !value.is_empty() {
            values.push(value.to_string());
        }
    }
    Ok(values)
}

/// Writes one tab-separated line.
pub fn write_row<W: Write, S: AsRef<str>>(out: &mut W, fields: &[S]) -> io::Result<()> {
    let mut first = true;
    for field in fields {
        if !first {
            out.write_all(b"\t")?;
        }
        out.write_all(field.as_ref().as_bytes())?;
        first = false;
    }
    out.write_all(b"\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_dash_means_stdin() {
        assert!(is_stdin(None));
        assert!(is_stdin(Some(Path::new("-"))));
        assert!(!is_stdin(Some(Path::new("gold.tsv"))));
        assert_eq!(source_name(None), "<stdin>");
        assert_eq!(source_name(Some(Path::new("gold.tsv"))), "gold.tsv");
    }

    #[test]
    fn test_open_input_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("input.tsv");
        std::fs::write(&path, "target\tcontext\n").unwrap();

        let mut content = String::new();
        open_input(Some(path.as_path())).unwrap().read_to_string(&mut content).unwrap();
        assert_eq!(content, "target\tcontext\n");
    }

    #[test]
    fn test_open_missing_file_names_path() {
        let err = open_file(Path::new("/nonexistent/profiles.tsv")).err().unwrap();
        assert!(err.to_string().contains("profiles.tsv"));
    }

    #[test]
    fn test_read_value_list_skips_blank_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("values.txt");
        std::fs::write(&path, "NN\n\nVB \nJJ\n").unwrap();
        assert_eq!(read_value_list(&path).unwrap(), vec!["NN", "VB", "JJ"]);
    }

    #[test]
    fn test_write_row_tab_separated() {
        let mut out = Vec::new();
        write_row(&mut out, &["a", "b", "c"]).unwrap();
        assert_eq!(out, b"a\tb\tc\n");
    }

    #[test]
    fn test_default_log_directive() {
        assert_eq!(default_directive(false), "warn");
        assert_eq!(default_directive(true), "info");
    }
}
