//! Validation gate for rewritten sources.
//!
//! # Hard Rules (Never Violate)
//!
//! 1. **Parse validation**: every file about to replace an original is
//!    re-parsed with the same grammar used for extraction. Any ERROR or
//!    MISSING node rejects it and the original stays untouched.
//! 2. **Re-location**: spans are never reused across writes. Each write
//!    re-parses the freshest content before locating its target.

use crate::ts::{ParsedSource, TreeSitterError};
use thiserror::Error;

/// Validation errors.
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Parse error introduced: found {count} ERROR nodes, first at line {}", first_line(.errors))]
    ParseErrorIntroduced {
        count: usize,
        errors: Vec<ErrorLocation>,
    },

    #[error("Rejected by {validator}: {message}")]
    Rejected { validator: String, message: String },

    #[error("Tree-sitter error: {0}")]
    TreeSitter(#[from] TreeSitterError),
}

fn first_line(errors: &[ErrorLocation]) -> usize {
    errors.first().map_or(0, |e| e.line)
}

/// Location of an error node in the source.
#[derive(Debug, Clone)]
pub struct ErrorLocation {
    pub byte_start: usize,
    pub byte_end: usize,
    pub line: usize,
    pub column: usize,
    pub context: String,
}

/// Content gate run against the temporary file before it replaces the original.
pub trait SourceValidator: Send + Sync {
    fn name(&self) -> &str;

    fn validate(&self, source: &str) -> Result<(), ValidationError>;
}

/// Strict Python syntax check with the pooled tree-sitter parser.
#[derive(Debug, Clone, Copy, Default)]
pub struct PythonSyntax;

impl SourceValidator for PythonSyntax {
    fn name(&self) -> &str {
        "python-syntax"
    }

    fn validate(&self, source: &str) -> Result<(), ValidationError> {
        pooled::validate(source)
    }
}

/// Pooled validation functions that reuse parsers from thread-local pool.
pub mod pooled {
    use super::*;
    use crate::pool;

    /// Validate source code using pooled parser.
    pub fn validate(source: &str) -> Result<(), ValidationError> {
        pool::with_parser(|parser| {
            let parsed = parser.parse_with_source(source)?;
            let errors = collect_errors(&parsed, source);

            if !errors.is_empty() {
                return Err(ValidationError::ParseErrorIntroduced {
                    count: errors.len(),
                    errors,
                });
            }

            Ok(())
        })?
    }
}

/// Collect all error nodes from a parsed source.
fn collect_errors(parsed: &ParsedSource<'_>, source: &str) -> Vec<ErrorLocation> {
    parsed
        .error_nodes()
        .into_iter()
        .map(|node| {
            // Extract context (up to 20 bytes either side of the error)
            let context_start = floor_boundary(source, node.byte_start.saturating_sub(20));
            let context_end = floor_boundary(source, (node.byte_end + 20).min(source.len()));
            let context = source
                .get(context_start..context_end)
                .unwrap_or("")
                .replace('\n', "\\n");

            ErrorLocation {
                byte_start: node.byte_start,
                byte_end: node.byte_end,
                line: node.start_point.row + 1,
                column: node.start_point.column + 1,
                context,
            }
        })
        .collect()
}

fn floor_boundary(source: &str, mut index: usize) -> usize {
    while index > 0 && !source.is_char_boundary(index) {
        index -= 1;
    }
    index
}
