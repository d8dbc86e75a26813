//! Tree-sitter integration for structural Python source queries.
//!
//! This module provides CST-based span location using tree-sitter, enabling
//! precise byte-span extraction of documentation blocks without losing
//! comments or formatting around them.

pub mod errors;
pub mod literal;
pub mod locator;
pub mod parser;
pub mod query;

pub use errors::TreeSitterError;
pub use literal::{clean_docstring, string_value};
pub use locator::{locate, DocSpan};
pub use parser::{ParsedSource, PythonParser};
pub use query::{QueryEngine, QueryMatch};
