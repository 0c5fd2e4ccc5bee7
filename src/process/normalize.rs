use once_cell::sync::Lazy;
use std::{collections::HashSet, path::Path};

use super::raw_table::{RunTable, Value};
use crate::error::{DashboardError, Result};

/// Source column → name the dashboard expects.
pub const RENAMES: &[(&str, &str)] = &[
    ("death", "end_status"),
    ("max_hitpoints", "hp"),
    ("len", "steps"),
    ("experience_level", "xplvl"),
    ("sokobanfillpit_score", "sokoban"),
];

/// Columns that survive normalization, besides the derived one.
/// `xplvl` is intentionally absent: it is renamed and then dropped.
pub const RETAINED: &[&str] = &[
    "end_status",
    "score",
    "steps",
    "turns",
    "hp",
    "dlvl",
    "sokoban",
    "role",
    "race",
    "gender",
    "ttyrecname",
];

pub const TTYREC_NAME: &str = "ttyrecname";
pub const TTYREC: &str = "ttyrec";
/// Recordings live in this directory next to the stats file.
pub const RECORDINGS_DIR: &str = "nle_data";

static RETAINED_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| RETAINED.iter().copied().chain([TTYREC]).collect());

/// Rename, derive `ttyrec`, then drop everything outside the retained set.
///
/// Fails with [`DashboardError::Schema`] when the table has no `ttyrecname`
/// column; no partial table is ever returned.
pub fn normalize(mut table: RunTable, source_path: &Path) -> Result<RunTable> {
    apply_renames(&mut table);

    let src = table.column_index(TTYREC_NAME).ok_or_else(|| DashboardError::Schema {
        message: format!(
            "column `{}` missing from {}",
            TTYREC_NAME,
            source_path.display()
        ),
    })?;
    let dir = source_path.parent().unwrap_or_else(|| Path::new(""));
    let derived = table
        .rows()
        .iter()
        .map(|row| recording_path(dir, &row[src]))
        .collect();
    table.set_column(TTYREC, derived);

    table.retain_columns(|c| RETAINED_SET.contains(c));
    Ok(table)
}

/// `<dir>/nle_data/<ttyrecname>`, or `Null` when the name is missing.
pub fn recording_path(dir: &Path, ttyrecname: &Value) -> Value {
    if ttyrecname.is_null() {
        return Value::Null;
    }
    let name = ttyrecname.to_string();
    Value::Text(
        dir.join(RECORDINGS_DIR)
            .join(name)
            .to_string_lossy()
            .into_owned(),
    )
}

fn apply_renames(table: &mut RunTable) {
    for &(from, to) in RENAMES {
        let Some(idx) = table.column_index(from) else {
            continue;
        };
        match table.column_index(to) {
            // first occurrence wins so names stay unique
            Some(existing) if existing < idx => table.drop_column_at(idx),
            Some(existing) => {
                table.drop_column_at(existing);
                table.rename_at(idx, to);
            }
            None => table.rename_at(idx, to),
        }
    }
}
