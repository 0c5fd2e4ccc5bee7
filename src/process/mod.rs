// src/process/mod.rs
use csv::ReaderBuilder;
use std::{
    collections::VecDeque,
    fs::File,
    io::{self, BufReader},
    path::Path,
};
use tracing::{debug, trace};

use crate::error::{DashboardError, Result};

pub mod normalize;
pub mod raw_table;
pub mod scan;
pub mod utils;

pub use normalize::normalize;
pub use raw_table::{RunTable, Value};
pub use scan::discover_stats_files;

/// Identifier columns read verbatim so derived paths match names on disk.
const TEXT_COLUMNS: &[&str] = &[normalize::TTYREC_NAME];

/// Read a delimited stats file, keeping only its last `read_last` data rows.
///
/// - The first record is the header; names are trimmed and must be unique.
/// - Each cell is coerced with [`utils::parse_value`], except in the
///   identifier columns (`ttyrecname`), which stay text.
/// - Every record must have as many fields as the header, otherwise the whole
///   file is rejected with [`DashboardError::Parse`].
#[tracing::instrument(level = "debug", skip(path), fields(path = %path.as_ref().display()))]
pub fn read_stats_file<P: AsRef<Path>>(path: P, read_last: usize) -> Result<RunTable> {
    let path = path.as_ref();
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => {
            return Err(DashboardError::not_found(path))
        }
        Err(e) => {
            return Err(anyhow::Error::new(e)
                .context(format!("opening stats file {}", path.display()))
                .into())
        }
    };

    let mut rdr = ReaderBuilder::new()
        .has_headers(true)
        .flexible(false)
        .from_reader(BufReader::new(file));

    let columns: Vec<String> = rdr
        .headers()
        .map_err(|e| DashboardError::parse(path, format!("reading header: {}", e)))?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();
    let verbatim: Vec<bool> = columns
        .iter()
        .map(|c| TEXT_COLUMNS.contains(&c.as_str()))
        .collect();

    // keep a rolling window of the trailing rows
    let mut tail: VecDeque<Vec<Value>> = VecDeque::with_capacity(read_last.min(4096));
    let mut total = 0usize;
    for (idx, result) in rdr.records().enumerate() {
        let record = result.map_err(|e| {
            DashboardError::parse(path, format!("CSV parse error at record {}: {}", idx, e))
        })?;
        total += 1;
        if read_last == 0 {
            continue;
        }
        if tail.len() == read_last {
            tail.pop_front();
        }
        tail.push_back(
            record
                .iter()
                .zip(&verbatim)
                .map(|(cell, &text)| {
                    if text {
                        utils::parse_text(cell)
                    } else {
                        utils::parse_value(cell)
                    }
                })
                .collect(),
        );
    }
    trace!(total, kept = tail.len(), "read stats records");

    let table = RunTable::new(columns, tail.into_iter().collect()).ok_or_else(|| {
        DashboardError::parse(path, "header contains duplicate column names")
    })?;
    debug!(rows = table.len(), columns = table.columns().len(), "loaded stats file");
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;
    use tracing_subscriber::{EnvFilter, FmtSubscriber};

    fn init_test_logging() {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(
                EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| EnvFilter::new("info,nle_dashboard::process=debug")),
            )
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }

    fn stats_file(content: &str) -> NamedTempFile {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(content.as_bytes()).unwrap();
        tmp
    }

    #[test]
    fn test_read_stats_file() -> anyhow::Result<()> {
        init_test_logging();
        let tmp = stats_file(
            "death,max_hitpoints,len,role,ttyrecname\n\
             starved,14,1520,val,run0.ttyrec.bz2\n\
             \"killed by a newt\",12,31,sam,run1.ttyrec.bz2\n",
        );

        let table = read_stats_file(tmp.path(), 100)?;

        assert_eq!(
            table.columns(),
            ["death", "max_hitpoints", "len", "role", "ttyrecname"]
        );
        assert_eq!(table.len(), 2);
        assert_eq!(table.get(0, "max_hitpoints"), Some(&Value::from(14)));
        assert_eq!(table.get(1, "death"), Some(&Value::from("killed by a newt")));
        assert_eq!(table.get(1, "ttyrecname"), Some(&Value::from("run1.ttyrec.bz2")));
        Ok(())
    }

    #[test]
    fn keeps_only_trailing_rows() -> anyhow::Result<()> {
        let mut content = String::from("score,ttyrecname\n");
        for i in 0..10 {
            content.push_str(&format!("{},run{}.ttyrec\n", i * 10, i));
        }
        let tmp = stats_file(&content);

        let table = read_stats_file(tmp.path(), 3)?;
        assert_eq!(table.len(), 3);
        assert_eq!(table.get(0, "score"), Some(&Value::from(70)));
        assert_eq!(table.get(2, "score"), Some(&Value::from(90)));

        let none = read_stats_file(tmp.path(), 0)?;
        assert!(none.is_empty());
        assert_eq!(none.columns(), ["score", "ttyrecname"]);

        let all = read_stats_file(tmp.path(), 1000)?;
        assert_eq!(all.len(), 10);
        Ok(())
    }

    #[test]
    fn empty_cells_become_null_and_blank_lines_are_skipped() -> anyhow::Result<()> {
        let tmp = stats_file("score,role,ttyrecname\n\n5,,a.ttyrec\n\n");
        let table = read_stats_file(tmp.path(), 10)?;
        assert_eq!(table.len(), 1);
        assert_eq!(table.get(0, "role"), Some(&Value::Null));
        Ok(())
    }

    #[test]
    fn numeric_looking_ttyrecnames_stay_text() -> anyhow::Result<()> {
        let tmp = stats_file("score,ttyrecname\n0007,0007\n10,1e3\n");
        let table = read_stats_file(tmp.path(), 10)?;
        assert_eq!(table.get(0, "score"), Some(&Value::from(7)));
        assert_eq!(table.get(0, "ttyrecname"), Some(&Value::from("0007")));
        assert_eq!(table.get(1, "ttyrecname"), Some(&Value::from("1e3")));

        let out = normalize(table, Path::new("/runs/stats.csv"))?;
        assert_eq!(out.get(0, "ttyrec"), Some(&Value::from("/runs/nle_data/0007")));
        assert_eq!(out.get(1, "ttyrec"), Some(&Value::from("/runs/nle_data/1e3")));
        Ok(())
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = read_stats_file("/definitely/not/here/stats.csv", 10).unwrap_err();
        assert!(matches!(err, DashboardError::NotFound { .. }), "{err:?}");
    }

    #[test]
    fn ragged_rows_are_parse_errors() {
        let tmp = stats_file("a,b,c\n1,2,3\n4,5\n");
        let err = read_stats_file(tmp.path(), 10).unwrap_err();
        match err {
            DashboardError::Parse { path, message } => {
                assert_eq!(path, tmp.path());
                assert!(message.contains("record 1"), "{message}");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn invalid_utf8_is_parse_error() {
        let mut tmp = NamedTempFile::new().unwrap();
        tmp.write_all(b"a,b\n1,\xff\xfe\n").unwrap();
        let err = read_stats_file(tmp.path(), 10).unwrap_err();
        assert!(matches!(err, DashboardError::Parse { .. }), "{err:?}");
    }

    #[test]
    fn duplicate_headers_are_parse_errors() {
        let tmp = stats_file("score,score\n1,2\n");
        let err = read_stats_file(tmp.path(), 10).unwrap_err();
        assert!(matches!(err, DashboardError::Parse { .. }), "{err:?}");
    }
}
