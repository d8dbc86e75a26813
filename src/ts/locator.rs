//! Locating documentation blocks in a freshly parsed tree.
//!
//! `locate` is a pure function of the current tree and a record. Nothing
//! from the extraction pass other than the record's identity (kind, name,
//! parent, content) is trusted.

use crate::model::{DocKind, DocumentationRecord};
use crate::ts::errors::TreeSitterError;
use crate::ts::literal::{bare_string, clean_docstring, string_value};
use crate::ts::parser::{definition_name, statements, unwrap_decorated, ParsedSource};
use crate::ts::query::{queries, QueryEngine};
use std::collections::VecDeque;
use std::ops::Range;
use tree_sitter::Node;

/// Position of a documentation block in the current source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocSpan {
    /// Byte range of the string literal itself.
    pub literal: Range<usize>,
    /// Replaceable region: from the start of the first line to the end of the
    /// last line, line terminator excluded.
    pub region: Range<usize>,
    /// 0-based rows of the first and last line of the region.
    pub start_row: usize,
    pub end_row: usize,
    /// Leading whitespace of the first line.
    pub indentation: String,
    /// Text between the indentation and the literal (`X.__doc__ = ` for attributes).
    pub lead: String,
    /// Text after the literal on its last line, kept verbatim on rewrite.
    pub trailing: String,
    /// The block shares its first line with unrelated code.
    pub inline: bool,
    /// Content currently held by the block, normalised like the record's.
    pub current_content: String,
}

impl DocSpan {
    /// Source text of the literal.
    pub fn literal_text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.literal.clone()]
    }
}

/// Locate the documentation block described by `record` in `parsed`.
pub fn locate(
    parsed: &ParsedSource<'_>,
    record: &DocumentationRecord,
) -> Result<DocSpan, TreeSitterError> {
    match record.kind {
        DocKind::Module => locate_module(parsed, record),
        DocKind::ModuleAttribute => locate_attribute(parsed, record),
        _ => locate_definition(parsed, record),
    }
}

fn locate_module(
    parsed: &ParsedSource<'_>,
    record: &DocumentationRecord,
) -> Result<DocSpan, TreeSitterError> {
    statements(parsed.root_node())
        .first()
        .and_then(|first| bare_string(*first, parsed.source))
        .and_then(|literal| build_span(parsed, literal, literal, true))
        .ok_or_else(|| TreeSitterError::TargetNotFound {
            target: format!("module docstring of {}", record.name),
            suggestion: None,
        })
}

fn locate_attribute(
    parsed: &ParsedSource<'_>,
    record: &DocumentationRecord,
) -> Result<DocSpan, TreeSitterError> {
    let engine = QueryEngine::new(&queries::doc_assignment(&record.name))?;
    let root = parsed.root_node();
    let wanted = record.content.trim();

    for m in engine.find_all(parsed) {
        let (Some(statement), Some(value)) = (m.captures.get("statement"), m.captures.get("value"))
        else {
            continue;
        };
        let Some(literal) = root.descendant_for_byte_range(value.byte_start, value.byte_end) else {
            continue;
        };
        let Some(anchor) = root.descendant_for_byte_range(statement.byte_start, statement.byte_end)
        else {
            continue;
        };
        let Some(text) = string_value(literal, parsed.source) else {
            continue;
        };
        if text.trim() != wanted {
            continue;
        }
        if let Some(span) = build_span(parsed, anchor, literal, false) {
            return Ok(span);
        }
    }

    Err(TreeSitterError::TargetNotFound {
        target: format!("{}.__doc__", record.name),
        suggestion: None,
    })
}

fn locate_definition(
    parsed: &ParsedSource<'_>,
    record: &DocumentationRecord,
) -> Result<DocSpan, TreeSitterError> {
    let want_class = record.kind == DocKind::Class;
    let mut candidates = Vec::new();

    let mut queue: VecDeque<(Node<'_>, Option<&str>)> = VecDeque::new();
    queue.push_back((parsed.root_node(), None));

    while let Some((node, parent)) = queue.pop_front() {
        let node_name = match node.kind() {
            "function_definition" | "class_definition" => definition_name(node, parsed.source),
            _ => None,
        };

        if let Some(name) = node_name {
            let is_class = node.kind() == "class_definition";
            if name == record.name
                && is_class == want_class
                && parent == record.parent_name.as_deref()
            {
                if let Some(span) = definition_docstring(parsed, node) {
                    candidates.push(span);
                }
            }
        }

        let child_parent = node_name.or(parent);
        let mut cursor = node.walk();
        for child in node.named_children(&mut cursor) {
            queue.push_back((child, child_parent));
        }
    }

    let wanted = record.content.trim();
    if let Some(index) = candidates
        .iter()
        .position(|span| span.current_content == wanted)
    {
        return Ok(candidates.swap_remove(index));
    }
    if !candidates.is_empty() {
        return Ok(candidates.swap_remove(0));
    }

    Err(TreeSitterError::TargetNotFound {
        target: format!("{} {}", record.kind, record.qualified_name()),
        suggestion: closest_definition(parsed, &record.name),
    })
}

fn definition_docstring(parsed: &ParsedSource<'_>, definition: Node<'_>) -> Option<DocSpan> {
    let definition = unwrap_decorated(definition);
    let body = definition.child_by_field_name("body")?;
    let first = *statements(body).first()?;
    let literal = bare_string(first, parsed.source)?;
    build_span(parsed, literal, literal, true)
}

/// Build the span around `literal`, whose region starts on the line of `anchor`.
fn build_span(
    parsed: &ParsedSource<'_>,
    anchor: Node<'_>,
    literal: Node<'_>,
    clean: bool,
) -> Option<DocSpan> {
    let source = parsed.source;
    let value = string_value(literal, source)?;

    let line_start = source[..anchor.start_byte()]
        .rfind('\n')
        .map_or(0, |i| i + 1);
    let line_end = source[literal.end_byte()..]
        .find('\n')
        .map_or(source.len(), |i| literal.end_byte() + i);
    let line_end = if source[..line_end].ends_with('\r') {
        line_end - 1
    } else {
        line_end
    };

    let first_line = &source[line_start..anchor.start_byte()];
    let indent_len = first_line.len() - first_line.trim_start().len();
    let inline = indent_len != first_line.len();

    let current_content = if clean {
        clean_docstring(&value).trim().to_string()
    } else {
        value.trim().to_string()
    };

    Some(DocSpan {
        literal: literal.byte_range(),
        region: line_start..line_end,
        start_row: anchor.start_position().row,
        end_row: literal.end_position().row,
        indentation: first_line[..indent_len].to_string(),
        lead: source[line_start + indent_len..literal.start_byte()].to_string(),
        trailing: source[literal.end_byte()..line_end].to_string(),
        inline,
        current_content,
    })
}

fn closest_definition(parsed: &ParsedSource<'_>, name: &str) -> Option<String> {
    let engine = QueryEngine::new(queries::ALL_DEFINITIONS).ok()?;
    engine
        .find_all(parsed)
        .into_iter()
        .filter_map(|m| m.captures.get("name").map(|c| c.text.clone()))
        .map(|candidate| (strsim::jaro_winkler(name, &candidate), candidate))
        .filter(|(score, _)| *score >= 0.8)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LineSpan;
    use crate::ts::parser::PythonParser;

    fn record(kind: DocKind, name: &str, content: &str, parent: Option<&str>) -> DocumentationRecord {
        DocumentationRecord {
            kind,
            name: name.into(),
            content: content.into(),
            line: 1,
            source_span: LineSpan { start: 1, end: 1 },
            context_text: String::new(),
            parent_name: parent.map(str::to_string),
        }
    }

    fn span_of(source: &str, record: &DocumentationRecord) -> Result<DocSpan, TreeSitterError> {
        let mut parser = PythonParser::new().unwrap();
        let parsed = parser.parse_with_source(source).unwrap();
        locate(&parsed, record)
    }

    #[test]
    fn module_docstring_is_first_statement() {
        let source = "#!/usr/bin/env python\n\"\"\"Module doc.\"\"\"\nimport os\n";
        let span = span_of(source, &record(DocKind::Module, "mod", "Module doc.", None)).unwrap();

        assert_eq!(span.literal_text(source), "\"\"\"Module doc.\"\"\"");
        assert_eq!(span.start_row, 1);
        assert_eq!(span.current_content, "Module doc.");
        assert!(!span.inline);
    }

    #[test]
    fn module_without_docstring_is_not_found() {
        let source = "import os\n\"\"\"Not a docstring.\"\"\"\n";
        let result = span_of(source, &record(DocKind::Module, "mod", "", None));
        assert!(matches!(result, Err(TreeSitterError::TargetNotFound { .. })));
    }

    #[test]
    fn method_docstring_matches_parent() {
        let source = r#"
class A:
    def run(self):
        """A.run doc."""

class B:
    def run(self):
        """B.run doc."""
"#;
        let span = span_of(source, &record(DocKind::Method, "run", "stale", Some("B"))).unwrap();
        assert_eq!(span.current_content, "B.run doc.");
        assert_eq!(span.indentation, "        ");
        assert_eq!(span.start_row, 7);
    }

    #[test]
    fn top_level_record_never_matches_a_method() {
        let source = r#"
def g():
    """Top."""

class A:
    def f(self):
        """Method doc."""
"#;
        let err = span_of(source, &record(DocKind::Function, "f", "Top.", None)).unwrap_err();
        assert!(matches!(err, TreeSitterError::TargetNotFound { .. }));

        let span = span_of(source, &record(DocKind::Method, "f", "Method doc.", Some("A"))).unwrap();
        assert_eq!(span.current_content, "Method doc.");
    }

    #[test]
    fn nested_record_needs_its_enclosing_function() {
        let source = "def outer():\n    def inner():\n        \"\"\"Inner.\"\"\"\n\ndef inner():\n    \"\"\"Top.\"\"\"\n";
        let span = span_of(source, &record(DocKind::NestedFunction, "inner", "x", Some("outer"))).unwrap();
        assert_eq!(span.current_content, "Inner.");

        let span = span_of(source, &record(DocKind::Function, "inner", "x", None)).unwrap();
        assert_eq!(span.current_content, "Top.");
    }

    #[test]
    fn content_equality_breaks_ties() {
        let source = r#"
if PY3:
    def helper():
        """First."""
else:
    def helper():
        """Second."""
"#;
        let span = span_of(source, &record(DocKind::Function, "helper", "Second.", None)).unwrap();
        assert_eq!(span.current_content, "Second.");

        let span = span_of(source, &record(DocKind::Function, "helper", "changed", None)).unwrap();
        assert_eq!(span.current_content, "First.");
    }

    #[test]
    fn class_and_function_kinds_do_not_collide() {
        let source = "def Thing():\n    \"\"\"Function.\"\"\"\n\nclass Thing:\n    \"\"\"Class.\"\"\"\n";
        let span = span_of(source, &record(DocKind::Class, "Thing", "", None)).unwrap();
        assert_eq!(span.current_content, "Class.");
    }

    #[test]
    fn decorated_and_async_definitions_are_found() {
        let source = "class A:\n    @property\n    async def value(self):\n        '''Value.'''\n        return 1\n";
        let span = span_of(source, &record(DocKind::AsyncMethod, "value", "Value.", Some("A"))).unwrap();
        assert_eq!(span.literal_text(source), "'''Value.'''");
    }

    #[test]
    fn trailing_comment_is_captured() {
        let source = "def f():\n    \"\"\"Doc.\"\"\"  # noqa: D401\n    return 1\n";
        let span = span_of(source, &record(DocKind::Function, "f", "Doc.", None)).unwrap();
        assert_eq!(span.trailing, "  # noqa: D401");
        assert_eq!(&source[span.region.clone()], "    \"\"\"Doc.\"\"\"  # noqa: D401");
    }

    #[test]
    fn inline_docstring_is_flagged() {
        let source = "def f(): \"\"\"Doc.\"\"\"\n";
        let span = span_of(source, &record(DocKind::Function, "f", "Doc.", None)).unwrap();
        assert!(span.inline);
    }

    #[test]
    fn crlf_region_excludes_carriage_return() {
        let source = "def f():\r\n    \"\"\"Doc.\"\"\"\r\n    pass\r\n";
        let span = span_of(source, &record(DocKind::Function, "f", "Doc.", None)).unwrap();
        assert_eq!(&source[span.region.clone()], "    \"\"\"Doc.\"\"\"");
        assert!(span.trailing.is_empty());
    }

    #[test]
    fn attribute_requires_matching_content() {
        let source = "X = 1\nX.__doc__ = \"Old.\"\nX.__doc__ = \"Newer.\"\n";
        let span = span_of(source, &record(DocKind::ModuleAttribute, "X", "Newer.", None)).unwrap();
        assert_eq!(span.start_row, 2);
        assert_eq!(span.lead, "X.__doc__ = ");
        assert!(!span.inline);

        let missing = span_of(source, &record(DocKind::ModuleAttribute, "X", "Other.", None));
        assert!(matches!(missing, Err(TreeSitterError::TargetNotFound { .. })));
    }

    #[test]
    fn missing_definition_suggests_close_name() {
        let source = "def process_items():\n    \"\"\"Doc.\"\"\"\n";
        let err = span_of(source, &record(DocKind::Function, "process_item", "Doc.", None)).unwrap_err();
        match err {
            TreeSitterError::TargetNotFound { suggestion, .. } => {
                assert_eq!(suggestion.as_deref(), Some("process_items"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn located_literal_reparses_to_original_content() {
        let source = "class C:\n    \"\"\"\n    Summary.\n\n    Details.\n    \"\"\"\n";
        let span = span_of(source, &record(DocKind::Class, "C", "Summary.\n\nDetails.", None)).unwrap();

        let isolated = span.literal_text(source).to_string() + "\n";
        let mut parser = PythonParser::new().unwrap();
        let parsed = parser.parse_with_source(&isolated).unwrap();
        let statement = statements(parsed.root_node())[0];
        let literal = bare_string(statement, &isolated).unwrap();
        let value = clean_docstring(&string_value(literal, &isolated).unwrap());
        assert_eq!(value, "Summary.\n\nDetails.");
    }
}
