//! Source/test file correspondence check.
//!
//! Verifies that every source file below a source root has a companion
//! test file below a test root, matched by relative path with a naming
//! prefix on the file name (`foo/bar.rs` ⇒ `foo/test_bar.rs`). Vendoring
//! projects wire this into their own test steps.

use std::collections::BTreeSet;

use camino::{Utf8Path, Utf8PathBuf};
use thiserror::Error;
use tracing::warn;
use walkdir::WalkDir;

/// Errors from the test-file check.
#[derive(Error, Debug)]
pub enum TestFilesError {
    /// A root directory does not exist.
    #[error("path does not exist: {0}")]
    MissingRoot(Utf8PathBuf),

    /// Directory traversal failed.
    #[error("failed to walk {root}: {source}")]
    Walk {
        /// The root being traversed.
        root: Utf8PathBuf,
        /// The underlying walkdir error.
        #[source]
        source: walkdir::Error,
    },
}

/// Result alias for the test-file check.
pub type TestFilesResult<T> = Result<T, TestFilesError>;

/// Naming rules for matching source files to test files.
#[derive(Debug, Clone)]
pub struct TestFileRules {
    /// Prefix a test file name carries (default: `test_`).
    pub prefix: String,
    /// File suffix of source and test files (default: `.rs`).
    pub suffix: String,
    /// File names exempt from the check (default: `mod.rs`, `lib.rs`, `main.rs`).
    pub ignore: Vec<String>,
}

impl Default for TestFileRules {
    fn default() -> Self {
        Self {
            prefix: "test_".to_string(),
            suffix: ".rs".to_string(),
            ignore: vec![
                "mod.rs".to_string(),
                "lib.rs".to_string(),
                "main.rs".to_string(),
            ],
        }
    }
}

/// Relative paths of source files with no matching test file.
///
/// An empty result means the source tree is fully covered. An empty source
/// tree logs a warning and passes.
pub fn missing_test_files(
    src_root: &Utf8Path,
    test_root: &Utf8Path,
    rules: &TestFileRules,
) -> TestFilesResult<Vec<Utf8PathBuf>> {
    for root in [src_root, test_root] {
        if !root.as_std_path().exists() {
            return Err(TestFilesError::MissingRoot(root.to_path_buf()));
        }
    }

    let sources = collect(src_root, rules, false)?;
    let tests: BTreeSet<Utf8PathBuf> = collect(test_root, rules, true)?.into_iter().collect();

    if sources.is_empty() {
        warn!(root = %src_root, "no source files found");
    }

    Ok(sources
        .into_iter()
        .filter(|source| !tests.contains(source))
        .collect())
}

/// Collect suffix-matching files below `root`, relative to it.
///
/// With `strip_prefix` set, only files whose name carries the test prefix
/// are kept, and the prefix is removed so entries compare against source
/// paths directly.
fn collect(
    root: &Utf8Path,
    rules: &TestFileRules,
    strip_prefix: bool,
) -> TestFilesResult<Vec<Utf8PathBuf>> {
    let mut files = Vec::new();

    for entry in WalkDir::new(root.as_std_path()) {
        let entry = entry.map_err(|source| TestFilesError::Walk {
            root: root.to_path_buf(),
            source,
        })?;
        if !entry.file_type().is_file() {
            continue;
        }
        let Some(path) = Utf8Path::from_path(entry.path()) else {
            warn!(path = %entry.path().display(), "skipping non-UTF-8 path");
            continue;
        };
        let Some(name) = path.file_name() else {
            continue;
        };
        if !name.ends_with(&rules.suffix) {
            continue;
        }

        let relative = path.strip_prefix(root).unwrap_or(path);

        if strip_prefix {
            let Some(bare) = name.strip_prefix(&rules.prefix) else {
                continue;
            };
            files.push(relative.with_file_name(bare));
        } else {
            if rules.ignore.iter().any(|ignored| ignored == name) {
                continue;
            }
            files.push(relative.to_path_buf());
        }
    }

    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn utf8(path: &std::path::Path) -> Utf8PathBuf {
        Utf8PathBuf::from_path_buf(path.to_path_buf()).unwrap()
    }

    #[test]
    fn missing_root_is_an_error() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = utf8(&tmp.path().join("src"));
        let test = utf8(&tmp.path().join("test"));
        assert!(matches!(
            missing_test_files(&src, &test, &TestFileRules::default()),
            Err(TestFilesError::MissingRoot(_))
        ));
    }

    #[test]
    fn empty_trees_pass() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = utf8(&tmp.path().join("src"));
        let test = utf8(&tmp.path().join("test"));
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&test).unwrap();

        let missing = missing_test_files(&src, &test, &TestFileRules::default()).unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn reports_uncovered_sources() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = utf8(&tmp.path().join("src"));
        let test = utf8(&tmp.path().join("test"));
        fs::create_dir_all(src.join("inner")).unwrap();
        fs::create_dir_all(&test).unwrap();

        fs::write(src.join("alpha.rs"), "").unwrap();
        fs::write(src.join("inner/beta.rs"), "").unwrap();
        fs::write(test.join("test_alpha.rs"), "").unwrap();

        let missing = missing_test_files(&src, &test, &TestFileRules::default()).unwrap();
        assert_eq!(missing, vec![Utf8PathBuf::from("inner/beta.rs")]);
    }

    #[test]
    fn nested_tests_match_nested_sources() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = utf8(&tmp.path().join("src"));
        let test = utf8(&tmp.path().join("test"));
        fs::create_dir_all(src.join("inner")).unwrap();
        fs::create_dir_all(test.join("inner")).unwrap();

        fs::write(src.join("inner/beta.rs"), "").unwrap();
        fs::write(test.join("inner/test_beta.rs"), "").unwrap();

        let missing = missing_test_files(&src, &test, &TestFileRules::default()).unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn ignored_names_are_exempt() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = utf8(&tmp.path().join("src"));
        let test = utf8(&tmp.path().join("test"));
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&test).unwrap();

        fs::write(src.join("lib.rs"), "").unwrap();
        fs::write(src.join("mod.rs"), "").unwrap();

        let missing = missing_test_files(&src, &test, &TestFileRules::default()).unwrap();
        assert!(missing.is_empty());
    }

    #[test]
    fn custom_suffix() {
        let tmp = tempfile::TempDir::new().unwrap();
        let src = utf8(&tmp.path().join("src"));
        let test = utf8(&tmp.path().join("test"));
        fs::create_dir_all(&src).unwrap();
        fs::create_dir_all(&test).unwrap();

        fs::write(src.join("tool.py"), "").unwrap();
        fs::write(test.join("test_tool.py"), "").unwrap();
        fs::write(src.join("helper.py"), "").unwrap();

        let rules = TestFileRules {
            suffix: ".py".to_string(),
            ignore: Vec::new(),
            ..TestFileRules::default()
        };
        let missing = missing_test_files(&src, &test, &rules).unwrap();
        assert_eq!(missing, vec![Utf8PathBuf::from("helper.py")]);
    }
}
