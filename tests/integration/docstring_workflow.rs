//! Extraction, generation and write-back across a whole module.

use super::{copy_fixture, leftovers};
use docstring_patcher::config::{FormattingConfig, GenerationConfig};
use docstring_patcher::{
    AtomicWriter, ContentExtractor, DocKind, Generate, GenerationClient, GenerationError,
    Orchestrator, Outcome, RunOptions, TextFormatter,
};
use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

/// Rewrites known docstrings and echoes everything else back unchanged.
struct Rewrites(HashMap<&'static str, &'static str>);

impl Rewrites {
    fn geometry() -> Self {
        Self(HashMap::from([
            ("Geometry helpers.", "Helpers for planar geometry."),
            ("Full turn in radians.", "Number of radians in a full turn."),
            ("Area.", "Return the area enclosed by the circle."),
            ("Grow.", "Grow the circle in place by ``factor``."),
            (
                "Scale value.",
                "Scale a value.\n\nParameters\n----------\nvalue\n    Value to scale.",
            ),
        ]))
    }
}

impl Generate for Rewrites {
    fn name(&self) -> &str {
        "rewrites"
    }

    async fn generate(&self, prompt: &str) -> Result<String, GenerationError> {
        let current = prompt
            .split("Current docstring:\n")
            .nth(1)
            .and_then(|rest| rest.split("\n\nReturn ").next())
            .unwrap_or_default();
        let reply = self
            .0
            .get(current)
            .map_or_else(|| current.to_string(), |text| text.to_string());
        Ok(format!(
            "Improved Docstring\n\n```reStructuredText\n{reply}\n```\n\nExplanation\n\n```text\nTightened wording.\n```\n"
        ))
    }
}

const EXPECTED: &str = r#""""Helpers for planar geometry."""

import math

TAU = 2 * math.pi
TAU.__doc__ = """Number of radians in a full turn."""


class Circle:
    """A circle."""

    def __init__(self, radius):
        """Store radius."""
        self.radius = radius

    @property
    def area(self):
        """Return the area enclosed by the circle."""
        return math.pi * self.radius**2

    async def grow(self, factor):
        """Grow the circle in place by ``factor``."""
        self.radius *= factor


def scale(value, factor=2):
    """
    Scale a value.

    Parameters
    ----------
    value
        Value to scale.
    """

    def helper():
        """Nested helper."""
        return factor

    return value * helper()
"#;

fn orchestrator(dry_run: bool) -> Orchestrator<Rewrites> {
    let config = GenerationConfig {
        max_retries: 0,
        ..GenerationConfig::default()
    };
    Orchestrator::new(
        GenerationClient::new(Rewrites::geometry(), config, &FormattingConfig::default()),
        ContentExtractor::default(),
        AtomicWriter::default(),
        TextFormatter::default(),
        RunOptions {
            dry_run,
            ..RunOptions::default()
        },
        CancellationToken::new(),
    )
}

fn kinds(path: &Path) -> Vec<DocKind> {
    ContentExtractor::default()
        .extract(path)
        .unwrap()
        .into_iter()
        .map(|record| record.kind)
        .collect()
}

#[test]
fn test_fixture_covers_every_record_family() {
    let dir = TempDir::new().unwrap();
    let path = copy_fixture(dir.path(), "geometry.py", "geometry.py");
    assert_eq!(
        kinds(&path),
        [
            DocKind::Module,
            DocKind::ModuleAttribute,
            DocKind::Class,
            DocKind::Method,
            DocKind::Property,
            DocKind::AsyncMethod,
            DocKind::Function,
            DocKind::NestedFunction,
        ]
    );
}

#[tokio::test]
async fn test_live_run_rewrites_module_in_place() {
    let dir = TempDir::new().unwrap();
    let path = copy_fixture(dir.path(), "geometry.py", "geometry.py");

    let report = orchestrator(false).run(&[path.clone()]).await;
    let summary = report.summary();

    assert_eq!(summary.records_found, 8);
    assert_eq!(summary.improved, 5);
    assert_eq!(summary.unchanged, 3);
    assert_eq!(summary.failed, 0);
    assert_eq!(fs::read_to_string(&path).unwrap(), EXPECTED);
    assert!(leftovers(&path).is_empty());

    let improved = &report.files[0].records[6];
    assert_eq!(improved.name, "scale");
    assert_eq!(improved.outcome, Outcome::Improved);
    assert_eq!(improved.file_operation, Some(true));
    assert_eq!(improved.explanation, "Tightened wording.");
}

#[tokio::test]
async fn test_written_blocks_extract_back_to_generated_text() {
    let dir = TempDir::new().unwrap();
    let path = copy_fixture(dir.path(), "geometry.py", "geometry.py");
    orchestrator(false).run(&[path.clone()]).await;

    let records = ContentExtractor::default().extract(&path).unwrap();
    let scale = records.iter().find(|r| r.name == "scale").unwrap();
    assert_eq!(
        scale.content,
        "Scale a value.\n\nParameters\n----------\nvalue\n    Value to scale."
    );
    let tau = records.iter().find(|r| r.name == "TAU").unwrap();
    assert_eq!(tau.content, "Number of radians in a full turn.");
}

#[tokio::test]
async fn test_second_run_changes_nothing() {
    let dir = TempDir::new().unwrap();
    let path = copy_fixture(dir.path(), "geometry.py", "geometry.py");
    orchestrator(false).run(&[path.clone()]).await;

    let report = orchestrator(false).run(&[path.clone()]).await;
    assert_eq!(report.summary().improved, 0);
    assert_eq!(report.summary().unchanged, 8);
    assert_eq!(fs::read_to_string(&path).unwrap(), EXPECTED);
}

#[tokio::test]
async fn test_dry_run_plans_without_touching_the_file() {
    let dir = TempDir::new().unwrap();
    let path = copy_fixture(dir.path(), "geometry.py", "geometry.py");
    let before = fs::read_to_string(&path).unwrap();

    let report = orchestrator(true).run(&[path.clone()]).await;
    assert_eq!(report.summary().improved, 5);
    assert_eq!(fs::read_to_string(&path).unwrap(), before);

    let rendered = report.render(true);
    assert!(rendered.contains("Dry run"));
    assert!(rendered.contains("Return the area enclosed by the circle."));
}
