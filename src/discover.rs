//! Python source discovery.

use globset::{Glob, GlobMatcher};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum DiscoverError {
    #[error("path does not exist: {0}")]
    Missing(PathBuf),

    #[error("invalid file pattern `{pattern}`: {source}")]
    Pattern {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to walk {root}: {source}")]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
}

/// Compile a glob with `*` confined to one path component.
pub fn compile_glob(pattern: &str) -> Result<GlobMatcher, DiscoverError> {
    globset::GlobBuilder::new(pattern)
        .literal_separator(true)
        .build()
        .map(|glob| glob.compile_matcher())
        .map_err(|source| DiscoverError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Glob over record names, where there are no separators to respect.
pub fn compile_name_glob(pattern: &str) -> Result<GlobMatcher, DiscoverError> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|source| DiscoverError::Pattern {
            pattern: pattern.to_string(),
            source,
        })
}

/// Collect the `.py` files under `paths`, sorted and de-duplicated.
///
/// Files named explicitly are kept regardless of `pattern`. Files found by
/// walking a directory must match `pattern`, if given, against either their
/// path relative to that directory or their full path.
pub fn python_files(paths: &[PathBuf], pattern: Option<&str>) -> Result<Vec<PathBuf>, DiscoverError> {
    let matcher = pattern.map(compile_glob).transpose()?;
    let mut files = Vec::new();

    for root in paths {
        if root.is_file() {
            if is_python(root) {
                files.push(root.clone());
            }
            continue;
        }
        if !root.is_dir() {
            return Err(DiscoverError::Missing(root.clone()));
        }

        for entry in WalkDir::new(root).follow_links(false) {
            let entry = entry.map_err(|source| DiscoverError::Walk {
                root: root.clone(),
                source,
            })?;
            let path = entry.path();
            if !entry.file_type().is_file() || !is_python(path) {
                continue;
            }
            if let Some(matcher) = &matcher {
                let relative = path.strip_prefix(root).unwrap_or(path);
                if !matcher.is_match(relative) && !matcher.is_match(path) {
                    continue;
                }
            }
            files.push(path.to_path_buf());
        }
    }

    files.sort();
    files.dedup();
    debug!(count = files.len(), "discovered python files");
    Ok(files)
}

fn is_python(path: &Path) -> bool {
    path.extension().and_then(|ext| ext.to_str()) == Some("py")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn tree() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for file in [
            "pkg/__init__.py",
            "pkg/core.py",
            "pkg/sub/__init__.py",
            "pkg/sub/notes.txt",
            "setup.py",
        ] {
            let path = dir.path().join(file);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, "").unwrap();
        }
        dir
    }

    fn names(root: &Path, files: &[PathBuf]) -> Vec<String> {
        files
            .iter()
            .map(|f| f.strip_prefix(root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn walks_directories_for_python_files() {
        let dir = tree();
        let files = python_files(&[dir.path().to_path_buf()], None).unwrap();
        assert_eq!(
            names(dir.path(), &files),
            ["pkg/__init__.py", "pkg/core.py", "pkg/sub/__init__.py", "setup.py"]
        );
    }

    #[test]
    fn pattern_filters_walked_files() {
        let dir = tree();
        let files = python_files(&[dir.path().to_path_buf()], Some("**/__init__.py")).unwrap();
        assert_eq!(
            names(dir.path(), &files),
            ["pkg/__init__.py", "pkg/sub/__init__.py"]
        );
    }

    #[test]
    fn explicit_files_and_overlaps_are_deduplicated() {
        let dir = tree();
        let core = dir.path().join("pkg/core.py");
        let files = python_files(&[core.clone(), dir.path().join("pkg"), core], None).unwrap();
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn missing_paths_are_reported() {
        let err = python_files(&[PathBuf::from("/nonexistent/pkg")], None).unwrap_err();
        assert!(matches!(err, DiscoverError::Missing(_)));
    }

    #[test]
    fn name_globs_match_wildcards() {
        let glob = compile_name_glob("sd_to_*").unwrap();
        assert!(glob.is_match("sd_to_XYZ"));
        assert!(!glob.is_match("XYZ_to_sd"));
    }
}
