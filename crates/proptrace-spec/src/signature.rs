use std::path::Path;
use std::sync::LazyLock;

use regex::Regex;

use crate::errors::SpecError;

/// Visibility qualifiers that make a declaration callable from outside.
pub const RECOGNIZED_VISIBILITY: [&str; 2] = ["public", "external"];

static FUNCTION_DECL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"function\s+(\w+)\s*\(([^)]*)\)[^;{]*?\b(public|external)\b")
        .expect("function declaration pattern compiles")
});

/// A callable contract operation.
///
/// Identity is the name; the same name may still appear more than once in
/// an extraction result when the source declares overloads.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Operation {
    pub name: String,
    /// First whitespace-delimited token of each parameter declaration.
    pub parameter_type_hints: Vec<String>,
}

impl Operation {
    pub fn new(name: impl Into<String>, hints: &[&str]) -> Self {
        Self {
            name: name.into(),
            parameter_type_hints: hints.iter().map(|h| (*h).to_string()).collect(),
        }
    }

    /// An operation known only by name, as used by injected patterns.
    pub fn bare(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parameter_type_hints: Vec::new(),
        }
    }

    pub fn arity(&self) -> usize {
        self.parameter_type_hints.len()
    }
}

/// Scan contract source text for externally callable operations.
///
/// Declarations are returned in order of first textual occurrence and are
/// not de-duplicated. Anything that does not match the recognized
/// `function name(params) ... public|external` shape is skipped.
pub fn extract_operations(source: &str) -> Vec<Operation> {
    FUNCTION_DECL
        .captures_iter(source)
        .map(|caps| {
            let name = caps[1].to_string();
            let params = caps[2].trim();
            let parameter_type_hints = if params.is_empty() {
                Vec::new()
            } else {
                params
                    .split(',')
                    .map(|p| p.split_whitespace().next().unwrap_or("").to_string())
                    .collect()
            };
            Operation {
                name,
                parameter_type_hints,
            }
        })
        .collect()
}

/// Read a contract file and extract its operations.
pub fn extract_operations_from_path(path: impl AsRef<Path>) -> Result<Vec<Operation>, SpecError> {
    let path = path.as_ref();
    let source = std::fs::read_to_string(path).map_err(|e| SpecError::io(path, e))?;
    Ok(extract_operations(&source))
}
