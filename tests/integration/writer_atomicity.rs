//! Commit protocol behaviour under success and induced failure.

use super::leftovers;
use docstring_patcher::validate::ValidationError;
use docstring_patcher::{AtomicWriter, CommitOutcome, Edit, EditError, SourceValidator, WriteError};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

const TEN_LINES: &str = "\"\"\"Module.\"\"\"\n\nimport os\n\n\ndef f():\n    \"\"\"Old.\"\"\"\n    return os.sep\n\nVALUE = 1\n";

struct AlwaysReject;

impl SourceValidator for AlwaysReject {
    fn name(&self) -> &str {
        "always-reject"
    }

    fn validate(&self, _source: &str) -> Result<(), ValidationError> {
        Err(ValidationError::Rejected {
            validator: "always-reject".to_string(),
            message: "induced failure".to_string(),
        })
    }
}

#[test]
fn test_successful_commit_leaves_a_single_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mod.py");
    fs::write(&path, TEN_LINES).unwrap();

    let new_text = TEN_LINES.replace("Old.", "New.");
    let outcome = AtomicWriter::default().commit(&path, &new_text).unwrap();

    assert_eq!(outcome, CommitOutcome::Written);
    assert_eq!(fs::read_to_string(&path).unwrap(), new_text);
    assert!(leftovers(&path).is_empty());
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_rejected_content_leaves_original_byte_identical() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mod.py");
    fs::write(&path, TEN_LINES).unwrap();

    let writer = AtomicWriter::new(Arc::new(AlwaysReject));
    let err = writer
        .commit(&path, &TEN_LINES.replace("Old.", "New."))
        .unwrap_err();

    assert!(matches!(err, WriteError::Validation { .. }));
    assert_eq!(fs::read(&path).unwrap(), TEN_LINES.as_bytes());
    assert!(leftovers(&path).is_empty());
}

#[test]
fn test_syntax_breaking_content_is_never_written() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mod.py");
    fs::write(&path, TEN_LINES).unwrap();

    let broken = TEN_LINES.replace("\"\"\"Old.\"\"\"", "\"\"\"Old.");
    let err = AtomicWriter::default().commit(&path, &broken).unwrap_err();

    assert!(matches!(err, WriteError::Validation { .. }));
    assert_eq!(fs::read_to_string(&path).unwrap(), TEN_LINES);
    assert!(leftovers(&path).is_empty());
}

#[test]
fn test_edit_through_writer_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mod.py");
    fs::write(&path, TEN_LINES).unwrap();

    let start = TEN_LINES.find("Old.").unwrap();
    let edit = Edit::new(&path, start, start + 4, "New.", "Old.");
    let writer = AtomicWriter::default();

    assert!(matches!(
        writer.apply(&edit).unwrap(),
        docstring_patcher::EditResult::Applied { .. }
    ));
    assert!(matches!(
        writer.apply(&edit).unwrap(),
        docstring_patcher::EditResult::AlreadyApplied { .. }
    ));
    assert!(leftovers(&path).is_empty());
}

#[test]
fn test_edit_rejected_by_validator_reports_write_error() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("mod.py");
    fs::write(&path, TEN_LINES).unwrap();

    let start = TEN_LINES.find("Old.").unwrap();
    let edit = Edit::new(&path, start, start + 4, "New.", "Old.");
    let err = AtomicWriter::new(Arc::new(AlwaysReject))
        .apply(&edit)
        .unwrap_err();

    assert!(matches!(err, EditError::Write(WriteError::Validation { .. })));
    assert_eq!(fs::read_to_string(&path).unwrap(), TEN_LINES);
}
