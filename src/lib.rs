//! Docstring Patcher: documentation maintenance for Python packages
//!
//! Extracts every docstring of a Python file, asks an external generator
//! for improved text and writes the result back in place, without
//! disturbing the code or formatting around it. A second pass keeps
//! package `__all__` declarations in step with their relative imports.
//!
//! # Architecture
//!
//! All writes compile down to a single primitive: [`Edit`], a verified
//! byte-span replacement committed through the [`AtomicWriter`]. Spans are
//! never cached; every write re-parses the current file and re-locates its
//! target with tree-sitter, so concurrent improvements to one file compose.
//!
//! # Safety
//!
//! - Every edit verifies its expected before-text
//! - Backup, temp file, re-parse, then atomic rename
//! - A failed write restores the backup
//! - Re-running on unchanged input is a no-op
//!
//! # Example
//!
//! ```no_run
//! use docstring_patcher::{ContentExtractor, TextFormatter, AtomicWriter, rewrite};
//! use std::path::Path;
//!
//! let path = Path::new("pkg/core.py");
//! let records = ContentExtractor::default().extract(path)?;
//! if let Some(record) = records.first() {
//!     rewrite::replace_docstring(
//!         &AtomicWriter::default(),
//!         &TextFormatter::default(),
//!         path,
//!         record,
//!         "Summarise the core module.",
//!     )?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod config;
pub mod discover;
pub mod edit;
pub mod exports;
pub mod extract;
pub mod format;
pub mod generate;
pub mod model;
pub mod orchestrator;
pub mod pool;
pub mod report;
pub mod rewrite;
pub mod telemetry;
pub mod ts;
pub mod validate;
pub mod writer;

// Re-exports
pub use config::{load_from_path, load_from_str, ConfigError, ProcessingConfig};
pub use edit::{Edit, EditError, EditResult, EditVerification};
pub use exports::{ExportError, ExportReport, ExportStatus};
pub use extract::{ContentExtractor, ExtractError};
pub use format::{DelimiterStyle, TextFormatter};
pub use generate::{Backend, CliBackend, Generate, GenerationClient, GenerationError};
pub use model::{DocKind, DocumentationRecord, LineSpan};
pub use orchestrator::{Orchestrator, RunOptions};
pub use report::{Outcome, RunReport, RunSummary};
pub use rewrite::RewriteError;
pub use ts::{locate, DocSpan, PythonParser, TreeSitterError};
pub use validate::{PythonSyntax, SourceValidator, ValidationError};
pub use writer::{AtomicWriter, CommitOutcome, WriteError};
