//! The merged price table (`menu.csv`)
//!
//! One row per store keyed by `store_id`, one column per item name, cells
//! holding the store's price for that item or empty when it does not sell it.

use crate::checkpoint::write_atomic;
use crate::PersistError;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::path::Path;

/// Header of the key column
pub const KEY_COLUMN: &str = "store_id";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    pub key: String,
    /// Non-empty cells by column name
    pub cells: BTreeMap<String, String>,
}

/// In-memory form of the merged table
///
/// Columns are kept sorted; rows keep their insertion order and are indexed
/// by key. The first row wins when a file carries a key twice.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergedTable {
    columns: Vec<String>,
    rows: Vec<TableRow>,
    index: HashMap<String, usize>,
}

impl MergedTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a table from rows, deriving the sorted column union
    pub fn from_rows(rows: Vec<TableRow>) -> Self {
        let columns: BTreeSet<String> = rows
            .iter()
            .flat_map(|row| row.cells.keys().cloned())
            .collect();
        Self::from_parts(columns.into_iter().collect(), rows)
    }

    pub(crate) fn from_parts(columns: Vec<String>, rows: Vec<TableRow>) -> Self {
        let mut index = HashMap::with_capacity(rows.len());
        for (position, row) in rows.iter().enumerate() {
            index.entry(row.key.clone()).or_insert(position);
        }
        Self {
            columns,
            rows,
            index,
        }
    }

    /// Appends a row unless its key is already present
    pub(crate) fn push_row(&mut self, row: TableRow) -> bool {
        if self.index.contains_key(&row.key) {
            return false;
        }
        self.index.insert(row.key.clone(), self.rows.len());
        self.rows.push(row);
        true
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns
            .binary_search_by(|c| c.as_str().cmp(column))
            .is_ok()
    }

    /// Adds columns in sorted position; returns how many were new
    pub(crate) fn add_columns<I>(&mut self, columns: I) -> usize
    where
        I: IntoIterator<Item = String>,
    {
        let mut added = 0;
        for column in columns {
            if let Err(position) = self.columns.binary_search(&column) {
                self.columns.insert(position, column);
                added += 1;
            }
        }
        added
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, key: &str) -> Option<&TableRow> {
        self.index.get(key).and_then(|&position| self.rows.get(position))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.row(key).is_some()
    }

    /// Cells of a row in column order, empty where the store has no price
    pub fn row_values(&self, key: &str) -> Option<Vec<&str>> {
        let row = self.row(key)?;
        Some(
            self.columns
                .iter()
                .map(|column| row.cells.get(column).map(String::as_str).unwrap_or(""))
                .collect(),
        )
    }

    /// Describes what `previous` has that this table lacks, if anything
    ///
    /// A merge may only add rows and columns; existing cells never change.
    pub fn missing_from(&self, previous: &MergedTable) -> Option<String> {
        if let Some(column) = previous.columns.iter().find(|c| !self.has_column(c)) {
            return Some(format!("column '{}'", column));
        }

        for old in &previous.rows {
            match self.row(&old.key) {
                None => return Some(format!("row '{}'", old.key)),
                Some(new) if new.cells != old.cells => {
                    return Some(format!("original cells of row '{}'", old.key));
                }
                Some(_) => {}
            }
        }
        None
    }

    /// Cheaper form of `missing_from` for a table grown in place from one
    /// that had `rows` rows and the given columns
    pub fn missing_since(&self, rows: usize, columns: &[String]) -> Option<String> {
        if let Some(column) = columns.iter().find(|c| !self.has_column(c)) {
            return Some(format!("column '{}'", column));
        }
        if self.rows.len() < rows {
            return Some(format!("{} of {} rows", rows - self.rows.len(), rows));
        }
        None
    }

    /// Reads the table; a missing or empty file is an empty table
    pub fn read(path: &Path) -> Result<Self, PersistError> {
        let csv_err = |source| PersistError::Csv {
            path: path.to_path_buf(),
            source,
        };

        let file = match std::fs::File::open(path) {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::new()),
            Err(source) => {
                return Err(PersistError::Io {
                    path: path.to_path_buf(),
                    source,
                })
            }
        };

        let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(file);
        let headers = reader.headers().map_err(csv_err)?.clone();
        if headers.is_empty() {
            return Ok(Self::new());
        }

        let header_columns: Vec<String> = headers.iter().skip(1).map(str::to_string).collect();
        let mut rows = Vec::new();
        for record in reader.records() {
            let record = record.map_err(csv_err)?;
            let Some(key) = record.get(0) else { continue };
            if key.is_empty() {
                continue;
            }
            let cells = header_columns
                .iter()
                .zip(record.iter().skip(1))
                .filter(|(_, value)| !value.is_empty())
                .map(|(column, value)| (column.clone(), value.to_string()))
                .collect();
            rows.push(TableRow {
                key: key.to_string(),
                cells,
            });
        }

        let mut columns: Vec<String> = header_columns
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        columns.retain(|c| !c.is_empty());

        Ok(Self::from_parts(columns, rows))
    }

    /// Serializes the table with a `store_id` header
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, csv::Error> {
        let mut writer = csv::WriterBuilder::new()
            .terminator(csv::Terminator::Any(b'\n'))
            .from_writer(Vec::new());

        let mut header = Vec::with_capacity(self.columns.len() + 1);
        header.push(KEY_COLUMN);
        header.extend(self.columns.iter().map(String::as_str));
        writer.write_record(&header)?;

        for row in &self.rows {
            let mut record = Vec::with_capacity(self.columns.len() + 1);
            record.push(row.key.as_str());
            record.extend(
                self.columns
                    .iter()
                    .map(|column| row.cells.get(column).map(String::as_str).unwrap_or("")),
            );
            writer.write_record(&record)?;
        }

        writer
            .into_inner()
            .map_err(|e| csv::Error::from(e.into_error()))
    }

    /// Replaces the file at `path` with this table, atomically
    pub fn write(&self, path: &Path) -> Result<(), PersistError> {
        let bytes = self.to_csv_bytes().map_err(|source| PersistError::Csv {
            path: path.to_path_buf(),
            source,
        })?;
        write_atomic(path, &bytes)
    }
}
