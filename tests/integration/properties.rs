//! Property tests over generated documentation text and import layouts.

use docstring_patcher::exports::{check_source, ExportStatus};
use docstring_patcher::format::TextFormatter;
use docstring_patcher::model::LineSpan;
use docstring_patcher::rewrite::plan_replacement;
use docstring_patcher::validate::pooled;
use docstring_patcher::{ContentExtractor, DocKind, DocumentationRecord};
use proptest::prelude::*;
use std::path::Path;

const SOURCE: &str = "def f():\n    \"\"\"old.\"\"\"\n    pass\n";
const RAW_SOURCE: &str = "def f():\n    r\"\"\"old.\"\"\"\n    pass\n";

fn record() -> DocumentationRecord {
    DocumentationRecord {
        kind: DocKind::Function,
        name: "f".into(),
        content: "old.".into(),
        line: 1,
        source_span: LineSpan { start: 2, end: 2 },
        context_text: String::new(),
        parent_name: None,
    }
}

fn doc_text() -> impl Strategy<Value = String> {
    prop::collection::vec(
        r#"[A-Za-z0-9"'\\]{1,8}( [A-Za-z0-9.,:()"'`\\-]{1,8}){0,9}"#,
        1..6,
    )
    .prop_map(|lines| lines.join("\n"))
}

fn import_blocks() -> impl Strategy<Value = Vec<(String, Vec<String>)>> {
    prop::collection::vec(
        ("m_[a-z]{1,6}", prop::collection::vec("n_[a-z0-9]{1,6}", 1..4)),
        1..5,
    )
}

proptest! {
    #[test]
    fn test_rewritten_block_parses_and_extracts_back(text in doc_text(), raw in any::<bool>()) {
        let source = if raw { RAW_SOURCE } else { SOURCE };
        let planned = plan_replacement(
            &TextFormatter::default(),
            Path::new("f.py"),
            source,
            &record(),
            &text,
        )
        .unwrap();

        let mut rewritten = source.to_string();
        rewritten.replace_range(planned.edit.byte_start..planned.edit.byte_end, &planned.new_block);

        prop_assert!(pooled::validate(&rewritten).is_ok(), "{}", rewritten);
        let records = ContentExtractor::default().extract_source(&rewritten, "f").unwrap();
        let function = records.iter().find(|r| r.name == "f").unwrap();
        prop_assert_eq!(&function.content, &text);
    }

    #[test]
    fn test_reconstruction_follows_import_order(blocks in import_blocks()) {
        let mut source = String::new();
        for (module, names) in &blocks {
            source.push_str(&format!("from .{module} import {}\n", names.join(", ")));
        }
        source.push_str("\n__all__ = [\"stale\"]\n");

        let ExportStatus::NeedsUpdate { byte_start, byte_end, replacement, .. } =
            check_source(&source, 5).unwrap()
        else {
            return Err(TestCaseError::fail("expected an update"));
        };

        let expected: Vec<String> = blocks
            .iter()
            .flat_map(|(_, names)| names.iter().map(|name| format!("    \"{name}\",")))
            .collect();
        let listed: Vec<String> = replacement
            .lines()
            .filter(|line| line.starts_with("    \""))
            .map(str::to_string)
            .collect();
        prop_assert_eq!(listed, expected);

        let mut fixed = source.clone();
        fixed.replace_range(byte_start..byte_end, &replacement);
        prop_assert_eq!(check_source(&fixed, 5).unwrap(), ExportStatus::UpToDate);
    }
}
