//! Integration tests exercising the library end to end.

mod docstring_workflow;
mod exports_golden;
mod properties;
mod writer_atomicity;

use std::fs;
use std::path::{Path, PathBuf};

/// Copy `tests/fixtures/<name>` into `dir` and return the new path.
pub fn copy_fixture(dir: &Path, name: &str, target: &str) -> PathBuf {
    let source = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests/fixtures")
        .join(name);
    let path = dir.join(target);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::copy(&source, &path).unwrap();
    path
}

pub fn fixture(name: &str) -> String {
    fs::read_to_string(
        Path::new(env!("CARGO_MANIFEST_DIR"))
            .join("tests/fixtures")
            .join(name),
    )
    .unwrap()
}

/// Files left beside `path` by an interrupted commit.
pub fn leftovers(path: &Path) -> Vec<PathBuf> {
    let dir = path.parent().unwrap();
    fs::read_dir(dir)
        .unwrap()
        .map(|entry| entry.unwrap().path())
        .filter(|p| {
            let name = p.to_string_lossy();
            name.ends_with(".backup") || name.ends_with(".tmp")
        })
        .collect()
}
