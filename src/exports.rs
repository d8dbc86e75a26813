//! Reconciliation of `__all__` export sections with relative import order.
//!
//! The first contiguous group of top-level `__all__` sections is rebuilt so
//! that it lists, block by block, the names introduced by the relative
//! imports that precede it:
//!
//! ```text
//! from .core import a, b        __all__ = [
//! from . import datasets   =>       "a",
//!                                   "b",
//!                               ]
//!                               __all__ += datasets.__all__
//! ```
//!
//! Reconstruction is a pure function of import order, so a second pass over
//! a fixed file finds nothing to do.

use crate::edit::{Edit, EditError, EditResult};
use crate::format::detect_newline;
use crate::pool;
use crate::ts::literal::string_value;
use crate::ts::parser::{statements, ParsedSource};
use crate::ts::TreeSitterError;
use crate::writer::AtomicWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, info};
use tree_sitter::Node;

const EXPORT_NAME: &str = "__all__";

#[derive(Error, Debug)]
pub enum ExportError {
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

    #[error(transparent)]
    Edit(#[from] EditError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    /// `__all__ = ...`
    Assign,
    /// `__all__ += ...`
    AugAssign,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportEntries {
    Names(Vec<String>),
    /// Anything other than a list literal, e.g. `module.__all__`.
    Complex,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSection {
    pub kind: SectionKind,
    pub entries: ExportEntries,
    /// 0-based first and last row.
    pub start_row: usize,
    pub end_row: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImportBlock {
    /// `from .module import a, b as c` contributes `a`, `c`.
    Names { names: Vec<String>, row: usize },
    /// `from . import module` re-exports `module.__all__`.
    Module { module: String, row: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContiguousGroup {
    pub sections: Vec<ExportSection>,
    pub start_row: usize,
    pub end_row: usize,
}

/// Everything the reconciliation pass knows about one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportAnalysis {
    pub sections: Vec<ExportSection>,
    pub groups: Vec<ContiguousGroup>,
    pub import_blocks: Vec<ImportBlock>,
}

impl ExportAnalysis {
    pub fn first_group(&self) -> Option<&ContiguousGroup> {
        self.groups.first()
    }
}

/// Result of checking one file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportStatus {
    NoSections,
    NoImports,
    UpToDate,
    NeedsUpdate {
        byte_start: usize,
        byte_end: usize,
        current: String,
        replacement: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportReport {
    pub path: PathBuf,
    pub status: ExportStatus,
    pub applied: bool,
}

impl ExportReport {
    pub fn needs_update(&self) -> bool {
        matches!(self.status, ExportStatus::NeedsUpdate { .. })
    }
}

/// Parse `source` into sections, groups and import blocks.
pub fn analyze(source: &str, gap_threshold: usize) -> Result<ExportAnalysis, ExportError> {
    pool::with_parser(|parser| {
        let parsed = parser.parse_with_source(source)?;
        if let Some(TreeSitterError::SyntaxError { line, column }) = parsed.first_error() {
            return Err(ExportError::Syntax {
                path: PathBuf::new(),
                line,
                column,
            });
        }
        Ok(analyze_parsed(&parsed, gap_threshold))
    })?
}

fn analyze_parsed(parsed: &ParsedSource<'_>, gap_threshold: usize) -> ExportAnalysis {
    let lines = parsed.lines();
    let top_level = statements(parsed.root_node());

    let sections: Vec<ExportSection> = top_level
        .iter()
        .enumerate()
        .filter_map(|(index, statement)| {
            export_section(*statement, &top_level[index + 1..], parsed.source, &lines)
        })
        .collect();

    let groups = contiguous_groups(&sections, gap_threshold);

    let import_blocks = match groups.first() {
        Some(first) => top_level
            .iter()
            .take_while(|statement| statement.start_position().row < first.start_row)
            .filter_map(|statement| import_block(*statement, parsed.source))
            .collect(),
        None => Vec::new(),
    };

    ExportAnalysis {
        sections,
        groups,
        import_blocks,
    }
}

fn export_section(
    statement: Node<'_>,
    following: &[Node<'_>],
    source: &str,
    lines: &[&str],
) -> Option<ExportSection> {
    if statement.kind() != "expression_statement" {
        return None;
    }
    let assignment = statement.named_child(0)?;
    let kind = match assignment.kind() {
        "assignment" => SectionKind::Assign,
        "augmented_assignment" => SectionKind::AugAssign,
        _ => return None,
    };
    let left = assignment.child_by_field_name("left")?;
    if left.kind() != "identifier" || &source[left.byte_range()] != EXPORT_NAME {
        return None;
    }
    let value = assignment.child_by_field_name("right")?;
    let start_row = statement.start_position().row;

    let (entries, end_row) = if value.kind() == "list" {
        let mut cursor = value.walk();
        let names = value
            .named_children(&mut cursor)
            .filter_map(|element| string_value(element, source))
            .collect();
        (ExportEntries::Names(names), value.end_position().row)
    } else {
        // The next unrelated statement bounds the fallback scan.
        let limit = following
            .iter()
            .find(|next| !is_export_statement(**next, source))
            .map(|next| next.start_position().row);
        let end = bracket_section_end(lines, start_row);
        let end = match limit {
            Some(limit) if end >= limit => start_row,
            _ => end,
        };
        (ExportEntries::Complex, end)
    };

    Some(ExportSection {
        kind,
        entries,
        start_row,
        end_row,
    })
}

fn is_export_statement(statement: Node<'_>, source: &str) -> bool {
    statement.kind() == "expression_statement"
        && statement
            .named_child(0)
            .filter(|n| matches!(n.kind(), "assignment" | "augmented_assignment"))
            .and_then(|n| n.child_by_field_name("left"))
            .is_some_and(|left| &source[left.byte_range()] == EXPORT_NAME)
}

/// End row of a section whose extent the tree does not describe.
///
/// Counts `[` and `]` from `start_row` until the count returns to zero on a
/// closing bracket. Brackets inside string literals are counted too, so a
/// name containing `]` ends the section early. If the count never returns to
/// zero the section is treated as a single line.
pub fn bracket_section_end(lines: &[&str], start_row: usize) -> usize {
    let mut depth: i64 = 0;
    for (row, line) in lines.iter().enumerate().skip(start_row) {
        for c in line.chars() {
            match c {
                '[' => depth += 1,
                ']' => {
                    depth -= 1;
                    if depth == 0 {
                        return row;
                    }
                }
                _ => {}
            }
        }
    }
    start_row
}

fn contiguous_groups(sections: &[ExportSection], gap_threshold: usize) -> Vec<ContiguousGroup> {
    let mut sorted: Vec<&ExportSection> = sections.iter().collect();
    sorted.sort_by_key(|section| section.start_row);

    let mut groups: Vec<ContiguousGroup> = Vec::new();
    for section in sorted {
        if let Some(current) = groups.last_mut() {
            let gap = section.start_row as i64 - current.end_row as i64 - 1;
            if gap <= gap_threshold as i64 {
                current.end_row = current.end_row.max(section.end_row);
                current.sections.push(section.clone());
                continue;
            }
        }
        groups.push(ContiguousGroup {
            sections: vec![section.clone()],
            start_row: section.start_row,
            end_row: section.end_row,
        });
    }
    groups
}

fn import_block(statement: Node<'_>, source: &str) -> Option<ImportBlock> {
    if statement.kind() != "import_from_statement" {
        return None;
    }
    let module = statement.child_by_field_name("module_name")?;
    if module.kind() != "relative_import" {
        return None;
    }
    let has_module_path = {
        let mut cursor = module.walk();
        let found = module
            .named_children(&mut cursor)
            .any(|child| child.kind() == "dotted_name");
        found
    };

    let mut cursor = statement.walk();
    let imported: Vec<Node<'_>> = statement
        .children_by_field_name("name", &mut cursor)
        .collect();
    let row = statement.start_position().row;

    if !has_module_path {
        if let [only] = imported.as_slice() {
            if only.kind() == "dotted_name" {
                return Some(ImportBlock::Module {
                    module: source[only.byte_range()].to_string(),
                    row,
                });
            }
        }
    }

    let names: Vec<String> = imported
        .iter()
        .filter_map(|node| match node.kind() {
            "aliased_import" => node
                .child_by_field_name("alias")
                .or_else(|| node.child_by_field_name("name")),
            "dotted_name" => Some(*node),
            _ => None,
        })
        .map(|node| source[node.byte_range()].to_string())
        .filter(|name| name != "*" && !name.starts_with('_'))
        .collect();

    (!names.is_empty()).then_some(ImportBlock::Names { names, row })
}

/// Rebuild the export sections for `blocks`, one line per entry.
pub fn reconstruct(blocks: &[ImportBlock], newline: &str) -> String {
    let mut out = String::new();
    for (index, block) in blocks.iter().enumerate() {
        let operator = if index == 0 { "=" } else { "+=" };
        match block {
            ImportBlock::Module { module, .. } => {
                out.push_str(&format!("{EXPORT_NAME} {operator} {module}.{EXPORT_NAME}{newline}"));
            }
            ImportBlock::Names { names, .. } => {
                out.push_str(&format!("{EXPORT_NAME} {operator} [{newline}"));
                for name in names {
                    out.push_str(&format!("    \"{name}\",{newline}"));
                }
                out.push_str(&format!("]{newline}"));
            }
        }
    }
    out
}

/// Compare the first group of `source` with its reconstruction.
pub fn check_source(source: &str, gap_threshold: usize) -> Result<ExportStatus, ExportError> {
    let analysis = analyze(source, gap_threshold)?;
    let Some(group) = analysis.first_group() else {
        return Ok(ExportStatus::NoSections);
    };
    if analysis.import_blocks.is_empty() {
        return Ok(ExportStatus::NoImports);
    }

    let line_starts = line_starts(source);
    let byte_start = line_starts.get(group.start_row).copied().unwrap_or(source.len());
    let byte_end = line_starts
        .get(group.end_row + 1)
        .copied()
        .unwrap_or(source.len());

    let current = &source[byte_start..byte_end];
    let mut replacement = reconstruct(&analysis.import_blocks, detect_newline(source));
    if !current.ends_with('\n') {
        // Last line of the file without a terminator.
        while replacement.ends_with('\n') || replacement.ends_with('\r') {
            replacement.pop();
        }
    }

    if current == replacement {
        return Ok(ExportStatus::UpToDate);
    }
    Ok(ExportStatus::NeedsUpdate {
        byte_start,
        byte_end,
        current: current.to_string(),
        replacement,
    })
}

fn line_starts(source: &str) -> Vec<usize> {
    std::iter::once(0)
        .chain(source.match_indices('\n').map(|(i, _)| i + 1))
        .collect()
}

/// Check the file at `path` without touching it.
pub fn check(path: &Path, gap_threshold: usize) -> Result<ExportReport, ExportError> {
    let source = read(path)?;
    let status = check_source(&source, gap_threshold).map_err(|e| with_path(e, path))?;
    debug!(path = %path.display(), needs_update = matches!(status, ExportStatus::NeedsUpdate { .. }), "checked exports");
    Ok(ExportReport {
        path: path.to_path_buf(),
        status,
        applied: false,
    })
}

/// Rebuild the first group of the file at `path` through the atomic writer.
pub fn fix(writer: &AtomicWriter, path: &Path, gap_threshold: usize) -> Result<ExportReport, ExportError> {
    let mut report = check(path, gap_threshold)?;
    if let ExportStatus::NeedsUpdate {
        byte_start,
        byte_end,
        current,
        replacement,
    } = &report.status
    {
        let edit = Edit::new(path, *byte_start, *byte_end, replacement.clone(), current);
        report.applied = matches!(writer.apply(&edit)?, EditResult::Applied { .. });
        info!(path = %path.display(), "rebuilt __all__ sections");
    }
    Ok(report)
}

fn read(path: &Path) -> Result<String, ExportError> {
    std::fs::read_to_string(path).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

fn with_path(error: ExportError, path: &Path) -> ExportError {
    match error {
        ExportError::Syntax { line, column, .. } => ExportError::Syntax {
            path: path.to_path_buf(),
            line,
            column,
        },
        other => other,
    }
}
