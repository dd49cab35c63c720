//! Expansion of `<!-- include path/to/file.xml -->` directives.
//!
//! The expanded text keeps a table of [`Origin`]s so that a row of the final
//! document can be traced back to the file (and line) it came from.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use log::trace;
use regex::Regex;

use crate::errors::{IncludeError, SourceLine};

fn directive() -> &'static Regex {
    static DIRECTIVE: OnceLock<Regex> = OnceLock::new();
    DIRECTIVE.get_or_init(|| Regex::new(r"<!--\s*include\s*(?P<path>\S+)\s*-->").unwrap())
}

/// A contiguous range of output rows coming from a single source file.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Origin {
    pub path: PathBuf,
    /// First output row, 0-based.
    pub first_row: usize,
    /// Last output row (inclusive), 0-based.
    pub last_row: usize,
    /// Row of `path` that became `first_row`, 0-based.
    pub source_row: usize,
}

/// A document with all include directives replaced.
#[derive(Clone, Debug, Default)]
pub struct Expanded {
    pub text: String,
    pub origins: Vec<Origin>,
}

impl Expanded {
    /// Wraps a document that was not read from disk.
    pub fn from_text(text: &str, path: impl Into<PathBuf>) -> Self {
        let mut out = Self::default();
        let mut rows = Rows::default();
        out.push_text(text, &path.into(), &mut rows);
        out
    }

    /// Every original location of the 1-based output `row`.
    ///
    /// A row may have several origins when an include directive shares its
    /// line with other text.
    pub fn locate(&self, row: usize) -> Vec<SourceLine> {
        let Some(row) = row.checked_sub(1) else {
            return Vec::new();
        };
        let mut lines = Vec::new();
        for o in self
            .origins
            .iter()
            .filter(|o| o.first_row <= row && row <= o.last_row)
        {
            let line = SourceLine {
                path: o.path.clone(),
                line: o.source_row + (row - o.first_row) + 1,
            };
            if !lines.contains(&line) {
                lines.push(line);
            }
        }
        lines
    }

    fn push_text(&mut self, part: &str, path: &Path, rows: &mut Rows) {
        if part.is_empty() {
            return;
        }
        let newlines = count_newlines(part);
        self.origins.push(Origin {
            path: path.to_path_buf(),
            first_row: rows.output,
            last_row: rows.output + newlines,
            source_row: rows.source,
        });
        self.text.push_str(part);
        rows.output += newlines;
        rows.source += newlines;
    }

    fn push_nested(&mut self, nested: Expanded, rows: &mut Rows) {
        let shift = rows.output;
        self.origins
            .extend(nested.origins.into_iter().map(|o| Origin {
                first_row: o.first_row + shift,
                last_row: o.last_row + shift,
                ..o
            }));
        rows.output += count_newlines(&nested.text);
        self.text.push_str(&nested.text);
    }
}

#[derive(Default)]
struct Rows {
    output: usize,
    source: usize,
}

fn count_newlines(s: &str) -> usize {
    s.bytes().filter(|&b| b == b'\n').count()
}

/// Reads `path` (relative to `base_dir` unless absolute) and recursively
/// replaces its include directives.
///
/// Relative paths inside a file resolve against that file's directory.
/// Files are read again every time they are included and cycles are not
/// detected.
pub fn expand(path: &Path, base_dir: &Path) -> Result<Expanded, IncludeError> {
    expand_file(path, base_dir, None)
}

fn expand_file(
    path: &Path,
    base_dir: &Path,
    included_from: Option<SourceLine>,
) -> Result<Expanded, IncludeError> {
    let full_path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };
    let contents = fs::read_to_string(&full_path).map_err(|source| IncludeError::Read {
        path: full_path.clone(),
        included_from,
        source,
    })?;
    let next_base_dir = full_path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_default();
    trace!("Expanding {}", full_path.display());

    let mut out = Expanded::default();
    let mut rows = Rows::default();
    let mut start = 0;
    for caps in directive().captures_iter(&contents) {
        let (Some(whole), Some(target)) = (caps.get(0), caps.name("path")) else {
            continue;
        };
        out.push_text(&contents[start..whole.start()], &full_path, &mut rows);
        let directive_line = SourceLine {
            path: full_path.clone(),
            line: rows.source + 1,
        };
        let nested = expand_file(
            Path::new(target.as_str()),
            &next_base_dir,
            Some(directive_line),
        )?;
        out.push_nested(nested, &mut rows);
        rows.source += count_newlines(whole.as_str());
        start = whole.end();
    }
    out.push_text(&contents[start..], &full_path, &mut rows);
    Ok(out)
}
