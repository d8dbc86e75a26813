//! Replacing one documentation block on disk.
//!
//! Each replacement re-reads the file, re-parses it and re-locates its
//! target, so earlier writes to the same file never invalidate later ones.

use crate::edit::{Edit, EditError, EditResult};
use crate::format::{detect_newline, DelimiterStyle, TextFormatter};
use crate::model::{DocKind, DocumentationRecord};
use crate::pool;
use crate::ts::{locate, TreeSitterError};
use crate::writer::AtomicWriter;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

#[derive(Error, Debug)]
pub enum RewriteError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Locate(#[from] TreeSitterError),

    #[error("{target} shares its line with other code; refusing to rewrite it")]
    Inline { target: String },

    #[error(transparent)]
    Edit(#[from] EditError),
}

/// A replacement computed against the current file content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedRewrite {
    pub edit: Edit,
    /// Region text before and after the replacement.
    pub old_block: String,
    pub new_block: String,
}

impl PlannedRewrite {
    pub fn is_noop(&self) -> bool {
        self.old_block == self.new_block
    }
}

/// Compute the edit that replaces `record`'s block in `source` with `new_text`.
pub fn plan_replacement(
    formatter: &TextFormatter,
    path: &Path,
    source: &str,
    record: &DocumentationRecord,
    new_text: &str,
) -> Result<PlannedRewrite, RewriteError> {
    let span = pool::with_parser(|parser| {
        let parsed = parser.parse_with_source(source)?;
        locate(&parsed, record)
    })??;

    if span.inline {
        return Err(RewriteError::Inline {
            target: format!("{} {}", record.kind, record.qualified_name()),
        });
    }

    let style = DelimiterStyle::detect(span.literal_text(source));
    let owner = (record.kind == DocKind::ModuleAttribute).then_some(record.name.as_str());
    let mut lines = formatter.format(new_text, &style, &span.indentation, owner);
    if let Some(last) = lines.last_mut() {
        last.push_str(&span.trailing);
    }

    let old_block = source[span.region.clone()].to_string();
    let new_block = lines.join(detect_newline(source));
    debug!(
        target = %record.qualified_name(),
        start_line = span.start_row + 1,
        end_line = span.end_row + 1,
        "planned docstring replacement"
    );

    Ok(PlannedRewrite {
        edit: Edit::new(
            path,
            span.region.start,
            span.region.end,
            new_block.clone(),
            &old_block,
        ),
        old_block,
        new_block,
    })
}

/// Replace `record`'s block in the file at `path` and commit it.
pub fn replace_docstring(
    writer: &AtomicWriter,
    formatter: &TextFormatter,
    path: &Path,
    record: &DocumentationRecord,
    new_text: &str,
) -> Result<(PlannedRewrite, EditResult), RewriteError> {
    let source = std::fs::read_to_string(path).map_err(|source| RewriteError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let planned = plan_replacement(formatter, path, &source, record, new_text)?;
    let result = writer.apply(&planned.edit)?;
    Ok((planned, result))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::LineSpan;
    use std::fs;

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

    fn rewrite(source: &str, record: &DocumentationRecord, new_text: &str) -> String {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.py");
        fs::write(&path, source).unwrap();
        replace_docstring(
            &AtomicWriter::default(),
            &TextFormatter::default(),
            &path,
            record,
            new_text,
        )
        .unwrap();
        fs::read_to_string(&path).unwrap()
    }

    #[test]
    fn replaces_function_docstring_with_multi_line_block() {
        let source = "def f():\n    \"\"\"old.\"\"\"\n    pass\n";
        let result = rewrite(
            source,
            &record(DocKind::Function, "f", "old.", None),
            "new, longer explanation that exceeds the short-form threshold.",
        );
        assert_eq!(
            result,
            "def f():\n    \"\"\"\n    new, longer explanation that exceeds the short-form threshold.\n    \"\"\"\n    pass\n"
        );
    }

    #[test]
    fn keeps_prefix_quote_style_and_trailing_comment() {
        let source = "class C:\n    r'''Old \\d.'''  # noqa\n";
        let result = rewrite(
            source,
            &record(DocKind::Class, "C", "Old \\d.", None),
            "Matches \\d digits.",
        );
        assert_eq!(result, "class C:\n    r'''Matches \\d digits.'''  # noqa\n");
    }

    #[test]
    fn backslashes_survive_the_round_trip() {
        let source = "def f():\n    \"\"\"Old.\"\"\"\n    pass\n";
        for text in ["Angle :math:`\\beta` in radians.", "Split on the separator \\"] {
            let result = rewrite(source, &record(DocKind::Function, "f", "Old.", None), text);
            let records = crate::extract::ContentExtractor::default()
                .extract_source(&result, "mod")
                .unwrap();
            assert_eq!(records[0].content, text);
        }
    }

    #[test]
    fn preserves_crlf_line_endings() {
        let source = "def f():\r\n    \"\"\"Old.\"\"\"\r\n    pass\r\n";
        let result = rewrite(source, &record(DocKind::Function, "f", "Old.", None), "Line one.\nLine two.");
        assert_eq!(
            result,
            "def f():\r\n    \"\"\"\r\n    Line one.\r\n    Line two.\r\n    \"\"\"\r\n    pass\r\n"
        );
    }

    #[test]
    fn rewrites_module_attribute_assignment() {
        let source = "LIMIT = 10\nLIMIT.__doc__ = 'Old.'\n";
        let result = rewrite(
            source,
            &record(DocKind::ModuleAttribute, "LIMIT", "Old.", None),
            "Maximum number of \"items\".",
        );
        assert_eq!(
            result,
            "LIMIT = 10\nLIMIT.__doc__ = '''Maximum number of \"items\".'''\n"
        );
    }

    #[test]
    fn inline_docstrings_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.py");
        fs::write(&path, "def f(): \"\"\"Doc.\"\"\"\n").unwrap();

        let err = replace_docstring(
            &AtomicWriter::default(),
            &TextFormatter::default(),
            &path,
            &record(DocKind::Function, "f", "Doc.", None),
            "New.",
        )
        .unwrap_err();
        assert!(matches!(err, RewriteError::Inline { .. }));
    }

    #[test]
    fn successive_writes_relocate_against_fresh_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.py");
        fs::write(
            &path,
            "def a():\n    \"\"\"A.\"\"\"\n\ndef b():\n    \"\"\"B.\"\"\"\n",
        )
        .unwrap();
        let writer = AtomicWriter::default();
        let formatter = TextFormatter::default();

        replace_docstring(
            &writer,
            &formatter,
            &path,
            &record(DocKind::Function, "a", "A.", None),
            "First line of a.\nSecond line of a.",
        )
        .unwrap();
        replace_docstring(
            &writer,
            &formatter,
            &path,
            &record(DocKind::Function, "b", "B.", None),
            "Better b.",
        )
        .unwrap();

        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "def a():\n    \"\"\"\n    First line of a.\n    Second line of a.\n    \"\"\"\n\ndef b():\n    \"\"\"Better b.\"\"\"\n"
        );
    }

    #[test]
    fn stale_record_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("mod.py");
        fs::write(&path, "def renamed():\n    \"\"\"Doc.\"\"\"\n").unwrap();

        let err = replace_docstring(
            &AtomicWriter::default(),
            &TextFormatter::default(),
            &path,
            &record(DocKind::Function, "original", "Doc.", None),
            "New.",
        )
        .unwrap_err();
        assert!(matches!(
            err,
            RewriteError::Locate(TreeSitterError::TargetNotFound { .. })
        ));
        assert_eq!(
            fs::read_to_string(&path).unwrap(),
            "def renamed():\n    \"\"\"Doc.\"\"\"\n"
        );
    }
}
