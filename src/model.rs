//! Documentation records produced by extraction and consumed by the rewrite path.

use serde::Serialize;
use std::fmt;

/// The declaration a documentation block belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DocKind {
    Module,
    Class,
    Function,
    Method,
    Property,
    StaticMethod,
    ClassMethod,
    AsyncFunction,
    AsyncMethod,
    NestedFunction,
    ModuleAttribute,
}

impl DocKind {
    pub fn as_str(self) -> &'static str {
        match self {
            DocKind::Module => "module",
            DocKind::Class => "class",
            DocKind::Function => "function",
            DocKind::Method => "method",
            DocKind::Property => "property",
            DocKind::StaticMethod => "static-method",
            DocKind::ClassMethod => "class-method",
            DocKind::AsyncFunction => "async-function",
            DocKind::AsyncMethod => "async-method",
            DocKind::NestedFunction => "nested-function",
            DocKind::ModuleAttribute => "module-attribute",
        }
    }

    /// Kinds attached to a `def` / `async def`.
    pub fn is_callable(self) -> bool {
        matches!(
            self,
            DocKind::Function
                | DocKind::Method
                | DocKind::Property
                | DocKind::StaticMethod
                | DocKind::ClassMethod
                | DocKind::AsyncFunction
                | DocKind::AsyncMethod
                | DocKind::NestedFunction
        )
    }
}

impl fmt::Display for DocKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Inclusive 1-based line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

/// One documentation block found during extraction.
///
/// `source_span` and `context_text` describe the file as it was when the
/// record was extracted. The write path never trusts them: it re-parses the
/// current file and re-locates the block by name, kind, parent and content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentationRecord {
    pub kind: DocKind,
    /// Declaration name; for module attributes, the owning variable.
    pub name: String,
    /// Current documentation text, trimmed.
    pub content: String,
    /// 1-based line of the declaration (or of the attribute assignment).
    pub line: usize,
    pub source_span: LineSpan,
    pub context_text: String,
    pub parent_name: Option<String>,
}

impl DocumentationRecord {
    /// `Parent.name` for nested declarations, `name` otherwise.
    pub fn qualified_name(&self) -> String {
        match &self.parent_name {
            Some(parent) => format!("{parent}.{}", self.name),
            None => self.name.clone(),
        }
    }
}
