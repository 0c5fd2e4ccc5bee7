use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};
use std::fmt;

/// One cell of a stats file after coercion.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(serde_json::Number),
    Text(String),
    Null,
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{}", n),
            Value::Text(s) => f.write_str(s),
            Value::Null => Ok(()),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Number(n.into())
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Number(n) => n.serialize(serializer),
            Value::Text(s) => serializer.serialize_str(s),
            Value::Null => serializer.serialize_none(),
        }
    }
}

/// Runs read from one or more stats files.
///
/// Column-oriented header plus row-major values: `rows[i][j]` belongs to
/// `columns[j]`. Every row has exactly `columns.len()` values and column names
/// are unique.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RunTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl RunTable {
    /// Returns `None` if a row is ragged or a column name repeats.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<Value>>) -> Option<Self> {
        let unique = columns
            .iter()
            .enumerate()
            .all(|(i, c)| !columns[..i].contains(c));
        if !unique || rows.iter().any(|r| r.len() != columns.len()) {
            return None;
        }
        Some(Self { columns, rows })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn get(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[idx])
    }

    /// Relabel column `idx`; values are untouched.
    pub(crate) fn rename_at(&mut self, idx: usize, name: &str) {
        self.columns[idx] = name.to_string();
    }

    pub(crate) fn drop_column_at(&mut self, idx: usize) {
        self.columns.remove(idx);
        for row in &mut self.rows {
            row.remove(idx);
        }
    }

    /// Keep only the columns for which `keep(name)` holds, preserving order.
    pub(crate) fn retain_columns(&mut self, mut keep: impl FnMut(&str) -> bool) {
        let mask: Vec<bool> = self.columns.iter().map(|c| keep(c)).collect();
        let mut it = mask.iter();
        self.columns.retain(|_| *it.next().unwrap_or(&false));
        for row in &mut self.rows {
            let mut it = mask.iter();
            row.retain(|_| *it.next().unwrap_or(&false));
        }
    }

    /// Replace (or append) column `name` with one value per row.
    pub(crate) fn set_column(&mut self, name: &str, values: Vec<Value>) {
        debug_assert_eq!(values.len(), self.rows.len());
        match self.column_index(name) {
            Some(idx) => {
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row[idx] = v;
                }
            }
            None => {
                self.columns.push(name.to_string());
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
    }

    /// Append `other`'s rows. Columns are unioned in first-seen order and
    /// cells a table has no column for become `Null`.
    pub fn append(&mut self, other: RunTable) {
        for c in &other.columns {
            if self.column_index(c).is_none() {
                self.columns.push(c.clone());
                for row in &mut self.rows {
                    row.push(Value::Null);
                }
            }
        }
        let mapping: Vec<usize> = other
            .columns
            .iter()
            .filter_map(|c| self.column_index(c))
            .collect();
        for row in other.rows {
            let mut out = vec![Value::Null; self.columns.len()];
            for (v, &idx) in row.into_iter().zip(&mapping) {
                out[idx] = v;
            }
            self.rows.push(out);
        }
    }
}

/// Serializes as `[{column: value, ...}, ...]` in column order.
impl Serialize for RunTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.rows.len()))?;
        for row in &self.rows {
            seq.serialize_element(&RowRef {
                columns: &self.columns,
                values: row,
            })?;
        }
        seq.end()
    }
}

struct RowRef<'a> {
    columns: &'a [String],
    values: &'a [Value],
}

impl Serialize for RowRef<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.columns.len()))?;
        for (c, v) in self.columns.iter().zip(self.values) {
            map.serialize_entry(c, v)?;
        }
        map.end()
    }
}
