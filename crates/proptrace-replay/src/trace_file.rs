//! Reader for rendered trace files.
//!
//! ```text
//! // Trace <n>: <label>
//! <name>(<key>=<value>, ...)@<timestep>;
//! <blank line>
//! ```

use std::path::Path;
use std::sync::LazyLock;

use indexmap::IndexMap;
use miette::{Diagnostic, NamedSource, SourceSpan};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;

use crate::errors::ReplayError;

static RECORD_LINE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\w+)\((.*)\)@(\d+);$").expect("record line pattern is valid")
});

static LABEL_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^// Trace (\d+): (.*)$").expect("label line pattern is valid"));

#[derive(Debug, Error, Diagnostic)]
pub enum TraceFileError {
    #[error("line {line}: malformed trace record")]
    #[diagnostic(
        code(proptrace::trace_file::malformed),
        help("records look like `name(key=value, ...)@timestep;`")
    )]
    Malformed {
        line: usize,
        #[source_code]
        src: NamedSource<String>,
        #[label("not a record")]
        span: SourceSpan,
    },

    #[error("line {line}: record is outside any `// Trace` block")]
    #[diagnostic(code(proptrace::trace_file::unlabelled))]
    Unlabelled {
        line: usize,
        #[source_code]
        src: NamedSource<String>,
        #[label("no enclosing block")]
        span: SourceSpan,
    },

    #[error("line {line}: argument `{field}` is not `key=value`")]
    #[diagnostic(code(proptrace::trace_file::field))]
    BadField {
        line: usize,
        field: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("here")]
        span: SourceSpan,
    },
}

impl TraceFileError {
    pub fn line(&self) -> usize {
        match self {
            TraceFileError::Malformed { line, .. }
            | TraceFileError::Unlabelled { line, .. }
            | TraceFileError::BadField { line, .. } => *line,
        }
    }
}

/// One record line, split into its parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedRecord {
    pub name: String,
    pub fields: Vec<(String, String)>,
    pub timestep: usize,
    /// 1-based line number in the source text.
    pub line: usize,
}

impl ParsedRecord {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParsedBlock {
    pub number: usize,
    pub label: String,
    pub records: Vec<ParsedRecord>,
    /// A blank line followed the block.
    pub separated: bool,
}

impl ParsedBlock {
    /// Record count per operation, in first-occurrence order.
    pub fn operation_counts(&self) -> IndexMap<&str, usize> {
        let mut counts = IndexMap::new();
        for record in &self.records {
            *counts.entry(record.name.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Timesteps run 0, 1, 2, ... within the block.
    pub fn timesteps_are_sequential(&self) -> bool {
        self.records
            .iter()
            .enumerate()
            .all(|(i, r)| r.timestep == i)
    }
}

/// Parse trace text. `name` labels the source in diagnostics.
///
/// Blank lines close the current block; `//` lines other than block
/// labels are skipped.
pub fn read_trace_file(name: &str, text: &str) -> Result<Vec<ParsedBlock>, TraceFileError> {
    let mut blocks: Vec<ParsedBlock> = Vec::new();
    let mut offset = 0;
    for (idx, raw) in text.split_inclusive('\n').enumerate() {
        let line_no = idx + 1;
        let line = raw.trim_end_matches(['\n', '\r']);
        let start = offset;
        offset += raw.len();
        let span = |from: usize, len: usize| SourceSpan::from((start + from, len));
        let src = || NamedSource::new(name, text.to_string());

        if line.trim().is_empty() {
            if let Some(block) = blocks.last_mut() {
                block.separated = true;
            }
            continue;
        }
        if let Some(caps) = LABEL_LINE.captures(line) {
            let number = caps[1].parse().map_err(|_| TraceFileError::Malformed {
                line: line_no,
                src: src(),
                span: span(0, line.len()),
            })?;
            blocks.push(ParsedBlock {
                number,
                label: caps[2].to_string(),
                records: Vec::new(),
                separated: false,
            });
            continue;
        }
        if line.starts_with("//") {
            continue;
        }

        let Some(caps) = RECORD_LINE.captures(line) else {
            return Err(TraceFileError::Malformed {
                line: line_no,
                src: src(),
                span: span(0, line.len()),
            });
        };
        let timestep = caps[3].parse().map_err(|_| TraceFileError::Malformed {
            line: line_no,
            src: src(),
            span: span(0, line.len()),
        })?;
        let Some(block) = blocks.last_mut().filter(|b| !b.separated) else {
            return Err(TraceFileError::Unlabelled {
                line: line_no,
                src: src(),
                span: span(0, line.len()),
            });
        };

        let body = caps.get(2).map_or("", |m| m.as_str());
        let body_start = caps.get(2).map_or(0, |m| m.start());
        let mut fields = Vec::new();
        if !body.trim().is_empty() {
            let mut cursor = 0;
            for part in body.split(", ") {
                match part.split_once('=') {
                    Some((key, value)) if !key.trim().is_empty() => {
                        fields.push((key.trim().to_string(), value.trim().to_string()));
                    }
                    _ => {
                        return Err(TraceFileError::BadField {
                            line: line_no,
                            field: part.to_string(),
                            src: src(),
                            span: span(body_start + cursor, part.len()),
                        });
                    }
                }
                cursor += part.len() + 2;
            }
        }

        block.records.push(ParsedRecord {
            name: caps[1].to_string(),
            fields,
            timestep,
            line: line_no,
        });
    }
    Ok(blocks)
}

/// Read and parse a trace file from disk.
pub fn read_trace_path(path: impl AsRef<Path>) -> Result<Vec<ParsedBlock>, ReplayError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| ReplayError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(read_trace_file(&path.display().to_string(), &text)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
// Trace 1: transfer, approve
transfer(from=0xA1, to=0xB2, value=12)@0;
approve(owner=0xB2, spender=0xC3, amount=100)@1;
transfer(from=0xB2, to=0xD4, value=5)@2;

// Trace 2: totalSupply
totalSupply()@0;
";

    #[test]
    fn parses_blocks_and_fields() {
        let blocks = read_trace_file("sample", SAMPLE).unwrap();
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].number, 1);
        assert_eq!(blocks[0].label, "transfer, approve");
        assert!(blocks[0].separated);
        assert!(!blocks[1].separated);

        let first = &blocks[0].records[0];
        assert_eq!(first.name, "transfer");
        assert_eq!(first.field("value"), Some("12"));
        assert_eq!(first.line, 2);
        assert!(blocks[1].records[0].fields.is_empty());
        assert!(blocks.iter().all(ParsedBlock::timesteps_are_sequential));
    }

    #[test]
    fn counts_operations_in_first_seen_order() {
        let blocks = read_trace_file("sample", SAMPLE).unwrap();
        let counts: Vec<_> = blocks[0].operation_counts().into_iter().collect();
        assert_eq!(counts, vec![("transfer", 2), ("approve", 1)]);
    }

    #[test]
    fn malformed_lines_report_their_line_number() {
        let text = "// Trace 1: transfer\ntransfer(from=0xA1 to=0xB2)@0\n";
        let err = read_trace_file("bad", text).unwrap_err();
        assert!(matches!(err, TraceFileError::Malformed { line: 2, .. }));
        assert_eq!(err.line(), 2);
    }

    #[test]
    fn records_outside_a_block_are_rejected() {
        let err = read_trace_file("bad", "totalSupply()@0;\n").unwrap_err();
        assert!(matches!(err, TraceFileError::Unlabelled { line: 1, .. }));

        let after_separator = "// Trace 1: mint\nmint(account=0xA1, amount=5)@0;\n\nmint(account=0xA1, amount=5)@1;\n";
        let err = read_trace_file("bad", after_separator).unwrap_err();
        assert_eq!(err.line(), 4);
    }

    #[test]
    fn fields_without_equals_are_rejected() {
        let err = read_trace_file("bad", "// Trace 1: mint\nmint(account=0xA1, 5)@0;\n").unwrap_err();
        match err {
            TraceFileError::BadField { line, field, .. } => {
                assert_eq!(line, 2);
                assert_eq!(field, "5");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn free_comments_and_crlf_are_tolerated() {
        let text = "// generated\r\n// Trace 1: vote\r\nvote(voter=0xA1, proposal=1)@0;\r\n";
        let blocks = read_trace_file("crlf", text).unwrap();
        assert_eq!(blocks[0].records[0].field("proposal"), Some("1"));
    }

    #[test]
    fn missing_files_are_io_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_trace_path(dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, ReplayError::Io { .. }));
    }
}
