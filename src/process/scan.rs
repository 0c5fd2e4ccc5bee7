use anyhow::Context;
use glob::{glob, Pattern};
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{DashboardError, Result};

/// Resolve a data path to the stats files it refers to.
///
/// Anything other than a directory (a regular file, a pipe) is returned
/// as-is. For a directory, files whose names match `pattern` are collected
/// from the directory itself or, with `recursive`, from the whole tree below
/// it. Results are sorted so merges are stable.
pub fn discover_stats_files(path: &Path, pattern: &str, recursive: bool) -> Result<Vec<PathBuf>> {
    let not_found = || DashboardError::NotFound {
        path: path.to_path_buf(),
        pattern: Some(path.join(pattern).display().to_string()),
    };

    if !path.exists() {
        return Err(not_found());
    }
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }

    let root = Pattern::escape(&path.display().to_string());
    let full = if recursive {
        format!("{}/**/{}", root, pattern)
    } else {
        format!("{}/{}", root, pattern)
    };
    debug!(pattern = %full, "scanning for stats files");

    let mut files = Vec::new();
    for entry in glob(&full).with_context(|| format!("invalid stats glob {}", full))? {
        let p = entry.context("reading directory entry")?;
        if p.is_file() {
            files.push(p);
        }
    }
    files.sort();

    if files.is_empty() {
        return Err(not_found());
    }
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn file_path_is_returned_directly() -> anyhow::Result<()> {
        let dir = tempdir()?;
        let f = dir.path().join("merged_p0.csv");
        fs::write(&f, "a\n1\n")?;
        assert_eq!(discover_stats_files(&f, "*.csv", false)?, vec![f]);
        Ok(())
    }

    #[test]
    fn scans_top_level_unless_recursive() -> anyhow::Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("b.csv"), "a\n")?;
        fs::write(dir.path().join("a.csv"), "a\n")?;
        fs::write(dir.path().join("notes.txt"), "x")?;
        fs::create_dir(dir.path().join("sub"))?;
        fs::write(dir.path().join("sub").join("c.csv"), "a\n")?;

        let flat = discover_stats_files(dir.path(), "*.csv", false)?;
        assert_eq!(
            flat,
            vec![dir.path().join("a.csv"), dir.path().join("b.csv")]
        );

        let deep = discover_stats_files(dir.path(), "*.csv", true)?;
        assert_eq!(deep.len(), 3);
        assert!(deep.contains(&dir.path().join("sub").join("c.csv")));
        Ok(())
    }

    #[test]
    fn missing_path_reports_expected_glob() {
        let err = discover_stats_files(Path::new("/nonexistent"), "*.csv", false).unwrap_err();
        match err {
            DashboardError::NotFound { path, pattern } => {
                assert_eq!(path, PathBuf::from("/nonexistent"));
                assert_eq!(pattern.as_deref(), Some("/nonexistent/*.csv"));
            }
            other => panic!("expected not found, got {other:?}"),
        }
    }

    #[test]
    fn directory_without_matches_is_not_found() -> anyhow::Result<()> {
        let dir = tempdir()?;
        fs::write(dir.path().join("readme.md"), "x")?;
        let err = discover_stats_files(dir.path(), "*.csv", true).unwrap_err();
        assert!(matches!(err, DashboardError::NotFound { .. }));
        Ok(())
    }
}
