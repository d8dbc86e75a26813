//! Single-pass extraction of documentation records from a Python file.

use crate::config::ContextConfig;
use crate::model::{DocKind, DocumentationRecord, LineSpan};
use crate::pool;
use crate::ts::literal::{bare_string, clean_docstring, string_value};
use crate::ts::parser::{definition_name, statements, ParsedSource};
use crate::ts::TreeSitterError;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, error};
use tree_sitter::Node;

const SELF_NAMES: [&str; 2] = ["self", "cls"];

#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("syntax error in {path} at line {line}, column {column}")]
    Syntax {
        path: PathBuf,
        line: usize,
        column: usize,
    },

    #[error(transparent)]
    TreeSitter(#[from] TreeSitterError),
}

/// Walks a parsed file once and produces its documentation records.
#[derive(Debug, Clone, Default)]
pub struct ContentExtractor {
    context: ContextConfig,
}

#[derive(Clone, Copy)]
struct Enclosing<'a> {
    name: &'a str,
    is_function: bool,
}

impl ContentExtractor {
    pub fn new(context: ContextConfig) -> Self {
        Self { context }
    }

    /// Read and extract `path`. A file that does not parse yields an error
    /// and no records.
    pub fn extract(&self, path: &Path) -> Result<Vec<DocumentationRecord>, ExtractError> {
        let source = std::fs::read_to_string(path).map_err(|source| ExtractError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let module_name = path
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();

        let records = self.extract_source(&source, &module_name).map_err(|e| match e {
            ExtractError::Syntax { line, column, .. } => {
                error!(path = %path.display(), line, column, "syntax error, skipping file");
                ExtractError::Syntax {
                    path: path.to_path_buf(),
                    line,
                    column,
                }
            }
            other => other,
        })?;

        debug!(path = %path.display(), count = records.len(), "extracted records");
        Ok(records)
    }

    /// Extract records from in-memory source, ordered by line.
    pub fn extract_source(
        &self,
        source: &str,
        module_name: &str,
    ) -> Result<Vec<DocumentationRecord>, ExtractError> {
        pool::with_parser(|parser| {
            let parsed = parser.parse_with_source(source)?;
            if let Some(TreeSitterError::SyntaxError { line, column }) = parsed.first_error() {
                return Err(ExtractError::Syntax {
                    path: PathBuf::new(),
                    line,
                    column,
                });
            }
            Ok(self.collect(&parsed, module_name))
        })?
    }

    fn collect(&self, parsed: &ParsedSource<'_>, module_name: &str) -> Vec<DocumentationRecord> {
        let lines = parsed.lines();
        let mut records = Vec::new();

        if let Some(record) = self.module_record(parsed, &lines, module_name) {
            records.push(record);
        }

        // Pre-order walk keeps declarations in source order.
        let mut stack: Vec<(Node<'_>, Option<Enclosing<'_>>)> = vec![(parsed.root_node(), None)];
        while let Some((node, enclosing)) = stack.pop() {
            let mut inner = enclosing;
            match node.kind() {
                "function_definition" => {
                    if let Some(record) = self.function_record(parsed, &lines, node, enclosing) {
                        records.push(record);
                    }
                    if let Some(name) = definition_name(node, parsed.source) {
                        inner = Some(Enclosing {
                            name,
                            is_function: true,
                        });
                    }
                }
                "class_definition" => {
                    if let Some(record) = self.class_record(parsed, &lines, node, enclosing) {
                        records.push(record);
                    }
                    if let Some(name) = definition_name(node, parsed.source) {
                        inner = Some(Enclosing {
                            name,
                            is_function: false,
                        });
                    }
                }
                _ => {}
            }

            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.named_children(&mut cursor).collect();
            for child in children.into_iter().rev() {
                stack.push((child, inner));
            }
        }

        records.extend(self.attribute_records(parsed, &lines));
        records.sort_by_key(|record| record.line);
        records
    }

    fn module_record(
        &self,
        parsed: &ParsedSource<'_>,
        lines: &[&str],
        module_name: &str,
    ) -> Option<DocumentationRecord> {
        let first = *statements(parsed.root_node()).first()?;
        let literal = bare_string(first, parsed.source)?;
        let content = docstring_text(literal, parsed.source)?;

        let mut context = Vec::new();
        for line in lines.iter().take(self.context.module_context_lines) {
            let trimmed = line.trim();
            if trimmed.starts_with("import ") || trimmed.starts_with("from ") {
                context.push(*line);
            } else if !trimmed.is_empty() && !trimmed.starts_with('#') {
                context.push(*line);
                if context.len() >= self.context.max_context_lines {
                    break;
                }
            }
        }

        Some(DocumentationRecord {
            kind: DocKind::Module,
            name: module_name.to_string(),
            content,
            line: literal.start_position().row + 1,
            source_span: span_of(literal),
            context_text: context.join("\n"),
            parent_name: None,
        })
    }

    fn class_record(
        &self,
        parsed: &ParsedSource<'_>,
        lines: &[&str],
        node: Node<'_>,
        enclosing: Option<Enclosing<'_>>,
    ) -> Option<DocumentationRecord> {
        let name = definition_name(node, parsed.source)?;
        let literal = body_docstring(node, parsed.source)?;
        let content = docstring_text(literal, parsed.source)?;
        let row = node.start_position().row;

        Some(DocumentationRecord {
            kind: DocKind::Class,
            name: name.to_string(),
            content,
            line: row + 1,
            source_span: span_of(literal),
            context_text: window(lines, row, self.context.class_before, self.context.class_after),
            parent_name: enclosing.map(|e| e.name.to_string()),
        })
    }

    fn function_record(
        &self,
        parsed: &ParsedSource<'_>,
        lines: &[&str],
        node: Node<'_>,
        enclosing: Option<Enclosing<'_>>,
    ) -> Option<DocumentationRecord> {
        let name = definition_name(node, parsed.source)?;
        let literal = body_docstring(node, parsed.source)?;
        let content = docstring_text(literal, parsed.source)?;
        let row = node.start_position().row;

        Some(DocumentationRecord {
            kind: classify_function(node, parsed.source, enclosing),
            name: name.to_string(),
            content,
            line: row + 1,
            source_span: span_of(literal),
            context_text: window(
                lines,
                row,
                self.context.function_before,
                self.context.function_after,
            ),
            parent_name: enclosing.map(|e| e.name.to_string()),
        })
    }

    /// Top-level `name.__doc__ = "..."` assignments.
    fn attribute_records(&self, parsed: &ParsedSource<'_>, lines: &[&str]) -> Vec<DocumentationRecord> {
        let source = parsed.source;
        let top_level = statements(parsed.root_node());
        let mut records = Vec::new();

        for (index, statement) in top_level.iter().enumerate() {
            let Some((owner, literal)) = doc_assignment(*statement, source) else {
                continue;
            };
            let Some(value) = string_value(literal, source) else {
                continue;
            };
            let content = value.trim();
            if content.is_empty() {
                continue;
            }

            let binding = top_level[..index]
                .iter()
                .rev()
                .find(|candidate| binds_name(**candidate, owner, source));

            let context_text = match binding {
                Some(binding) => {
                    let start = binding.start_position().row.saturating_sub(2);
                    let end = (statement.end_position().row + 3).min(lines.len());
                    lines[start..end].join("\n")
                }
                None => {
                    debug!(owner, "no binding found for __doc__ assignment");
                    String::new()
                }
            };

            records.push(DocumentationRecord {
                kind: DocKind::ModuleAttribute,
                name: owner.to_string(),
                content: content.to_string(),
                line: statement.start_position().row + 1,
                source_span: LineSpan {
                    start: statement.start_position().row + 1,
                    end: statement.end_position().row + 1,
                },
                context_text,
                parent_name: None,
            });
        }

        records
    }
}

fn span_of(literal: Node<'_>) -> LineSpan {
    LineSpan {
        start: literal.start_position().row + 1,
        end: literal.end_position().row + 1,
    }
}

/// Lines `[row - before, row + after)`, clamped to the file.
fn window(lines: &[&str], row: usize, before: usize, after: usize) -> String {
    let start = row.saturating_sub(before);
    let end = (row + after).min(lines.len());
    if start >= end {
        return String::new();
    }
    lines[start..end].join("\n")
}

fn body_docstring<'t>(definition: Node<'t>, source: &str) -> Option<Node<'t>> {
    let body = definition.child_by_field_name("body")?;
    let first = *statements(body).first()?;
    bare_string(first, source)
}

/// Cleaned docstring text, or `None` when it is empty.
fn docstring_text(literal: Node<'_>, source: &str) -> Option<String> {
    let value = string_value(literal, source)?;
    let content = clean_docstring(&value).trim().to_string();
    (!content.is_empty()).then_some(content)
}

fn classify_function(node: Node<'_>, source: &str, enclosing: Option<Enclosing<'_>>) -> DocKind {
    let is_async = node.child(0).is_some_and(|first| first.kind() == "async");
    let is_method = first_parameter(node, source).is_some_and(|name| SELF_NAMES.contains(&name));

    if is_async {
        return if is_method {
            DocKind::AsyncMethod
        } else {
            DocKind::AsyncFunction
        };
    }

    for decorator in decorator_names(node, source) {
        match decorator {
            "staticmethod" => return DocKind::StaticMethod,
            "classmethod" => return DocKind::ClassMethod,
            "property" => return DocKind::Property,
            _ => {}
        }
    }

    if is_method {
        DocKind::Method
    } else if enclosing.is_some_and(|e| e.is_function) {
        DocKind::NestedFunction
    } else {
        DocKind::Function
    }
}

/// Bare-name decorators applied to `definition`.
fn decorator_names<'a>(definition: Node<'_>, source: &'a str) -> Vec<&'a str> {
    let Some(parent) = definition.parent() else {
        return Vec::new();
    };
    if parent.kind() != "decorated_definition" {
        return Vec::new();
    }
    let mut cursor = parent.walk();
    parent
        .named_children(&mut cursor)
        .filter(|child| child.kind() == "decorator")
        .filter_map(|decorator| decorator.named_child(0))
        .filter(|expr| expr.kind() == "identifier")
        .map(|expr| &source[expr.byte_range()])
        .collect()
}

fn first_parameter<'a>(definition: Node<'_>, source: &'a str) -> Option<&'a str> {
    let parameters = definition.child_by_field_name("parameters")?;
    let first = parameters.named_child(0)?;
    let name = match first.kind() {
        "identifier" => first,
        "typed_parameter" => first.named_child(0).filter(|n| n.kind() == "identifier")?,
        "default_parameter" | "typed_default_parameter" => first.child_by_field_name("name")?,
        _ => return None,
    };
    Some(&source[name.byte_range()])
}

/// `(owner, literal)` for a top-level `owner.__doc__ = <string>` statement.
fn doc_assignment<'t, 's>(statement: Node<'t>, source: &'s str) -> Option<(&'s str, Node<'t>)> {
    if statement.kind() != "expression_statement" {
        return None;
    }
    let assignment = statement.named_child(0).filter(|n| n.kind() == "assignment")?;
    let left = assignment.child_by_field_name("left")?;
    if left.kind() != "attribute" {
        return None;
    }
    let object = left.child_by_field_name("object")?;
    let attribute = left.child_by_field_name("attribute")?;
    if object.kind() != "identifier" || &source[attribute.byte_range()] != "__doc__" {
        return None;
    }
    let right = assignment.child_by_field_name("right")?;
    if !matches!(right.kind(), "string" | "concatenated_string") {
        return None;
    }
    Some((&source[object.byte_range()], right))
}

/// Plain, annotated or chained assignment binding `name` at top level.
fn binds_name(statement: Node<'_>, name: &str, source: &str) -> bool {
    if statement.kind() != "expression_statement" {
        return false;
    }
    let mut current = statement.named_child(0);
    while let Some(assignment) = current.filter(|n| n.kind() == "assignment") {
        if assignment
            .child_by_field_name("left")
            .is_some_and(|left| left.kind() == "identifier" && &source[left.byte_range()] == name)
        {
            return true;
        }
        current = assignment.child_by_field_name("right");
    }
    false
}
