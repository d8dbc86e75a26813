//! `__all__` reconciliation against golden fixtures.

use super::{copy_fixture, fixture, leftovers};
use docstring_patcher::exports::{self, ExportStatus};
use docstring_patcher::AtomicWriter;
use std::fs;
use tempfile::TempDir;

const GAP: usize = 5;

#[test]
fn test_fix_matches_golden_output() {
    let dir = TempDir::new().unwrap();
    let path = copy_fixture(dir.path(), "package_init.py", "colour/__init__.py");

    let report = exports::fix(&AtomicWriter::default(), &path, GAP).unwrap();

    assert!(report.applied);
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        fixture("package_init.expected.py")
    );
    assert!(leftovers(&path).is_empty());
}

#[test]
fn test_fix_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = copy_fixture(dir.path(), "package_init.py", "colour/__init__.py");
    let writer = AtomicWriter::default();

    exports::fix(&writer, &path, GAP).unwrap();
    let first = fs::read_to_string(&path).unwrap();

    let second = exports::fix(&writer, &path, GAP).unwrap();
    assert_eq!(second.status, ExportStatus::UpToDate);
    assert!(!second.applied);
    assert_eq!(fs::read_to_string(&path).unwrap(), first);
}

#[test]
fn test_check_reports_without_writing() {
    let dir = TempDir::new().unwrap();
    let path = copy_fixture(dir.path(), "package_init.py", "colour/__init__.py");

    let report = exports::check(&path, GAP).unwrap();
    match &report.status {
        ExportStatus::NeedsUpdate { current, replacement, .. } => {
            assert!(current.contains("\"XYZ_to_RGB\",\n    \"lerp\","));
            assert!(replacement.starts_with("__all__ = [\n    \"lerp\",\n    \"normalize\",\n]\n"));
        }
        other => panic!("expected an update, got {other:?}"),
    }
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        fixture("package_init.py")
    );
}

#[test]
fn test_sections_beyond_the_first_group_are_preserved() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("__init__.py");
    let source = "from .core import b, a\n\n__all__ = [\"a\"]\n\n\n\n\n\n\n\n# Optional extras.\n__all__ += [\"extra\"]\n";
    fs::write(&path, source).unwrap();

    exports::fix(&AtomicWriter::default(), &path, GAP).unwrap();

    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "from .core import b, a\n\n__all__ = [\n    \"b\",\n    \"a\",\n]\n\n\n\n\n\n\n\n# Optional extras.\n__all__ += [\"extra\"]\n"
    );
}

#[test]
fn test_files_with_syntax_errors_are_skipped() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("__init__.py");
    fs::write(&path, "from .core import (a\n__all__ = []\n").unwrap();

    let err = exports::fix(&AtomicWriter::default(), &path, GAP).unwrap_err();
    assert!(matches!(err, exports::ExportError::Syntax { .. }));
    assert_eq!(
        fs::read_to_string(&path).unwrap(),
        "from .core import (a\n__all__ = []\n"
    );
}
