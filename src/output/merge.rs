//! Incremental union of fetched menus into the merged table

use super::table::{MergedTable, TableRow};
use crate::model::StoreMenu;
use crate::PersistError;
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// One store's contribution to a merge
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRow {
    pub key: String,
    /// `None` when the store's catalog could not be fetched
    pub cells: Option<BTreeMap<String, String>>,
}

impl NewRow {
    pub fn fetched(key: impl Into<String>, cells: BTreeMap<String, String>) -> Self {
        Self {
            key: key.into(),
            cells: Some(cells),
        }
    }

    pub fn failed(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            cells: None,
        }
    }

    /// Prices of every item on the menu, formatted with two decimals
    ///
    /// Item names are already unique within a persisted menu; should a
    /// duplicate slip through, the first one is kept.
    pub fn from_menu(menu: &StoreMenu) -> Self {
        let mut cells = BTreeMap::new();
        for item in menu.items() {
            cells
                .entry(item.name.clone())
                .or_insert_with(|| format_price(item.price));
        }
        Self::fetched(menu.store_id.clone(), cells)
    }
}

pub fn format_price(price: f64) -> String {
    format!("{:.2}", price)
}

/// What a merge did
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeOutcome {
    pub appended: usize,
    /// Rows whose key was already in the table (or earlier in the batch)
    pub skipped_existing: usize,
    pub skipped_failed: usize,
    pub columns_added: usize,
}

impl MergeOutcome {
    pub fn changed(&self) -> bool {
        self.appended > 0
    }
}

/// Unions `batch` into `existing` without touching any existing cell
///
/// Existing rows are kept as they are and win over new rows with the same
/// key; within the batch the first row for a key wins. Columns are the sorted
/// union of the existing columns and those of the appended rows.
pub fn merge(existing: &MergedTable, batch: &[NewRow]) -> (MergedTable, MergeOutcome) {
    let mut merged = existing.clone();
    let outcome = merge_into(&mut merged, batch);
    (merged, outcome)
}

/// In-place form of [`merge`]: rows are only ever appended
pub fn merge_into(table: &mut MergedTable, batch: &[NewRow]) -> MergeOutcome {
    let mut outcome = MergeOutcome::default();
    let mut columns = BTreeSet::new();

    for new in batch {
        let Some(cells) = &new.cells else {
            outcome.skipped_failed += 1;
            continue;
        };
        if table.contains(&new.key) {
            outcome.skipped_existing += 1;
            continue;
        }

        let cells: BTreeMap<String, String> = cells
            .iter()
            .filter(|(_, value)| !value.is_empty())
            .map(|(column, value)| (column.clone(), value.clone()))
            .collect();
        columns.extend(cells.keys().cloned());
        table.push_row(TableRow {
            key: new.key.clone(),
            cells,
        });
        outcome.appended += 1;
    }

    outcome.columns_added = table.add_columns(columns);
    outcome
}

/// Owner of the persisted table; serializes every read-merge-write cycle
///
/// The table is read from disk once and then kept in memory, so the writer
/// must be the only one writing the file while it lives. A failed cycle drops
/// the cached copy and the next one reads the file again.
#[derive(Debug)]
pub struct MergeWriter {
    path: PathBuf,
    table: Mutex<Option<MergedTable>>,
}

impl MergeWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            table: Mutex::new(None),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Merges `batch` into the table on disk
    ///
    /// The file is replaced only once the merged table is complete and
    /// contains everything the old one did; a merge that adds nothing leaves
    /// the file alone. This blocks on file IO; async callers run it on the
    /// blocking pool.
    pub fn apply(&self, batch: &[NewRow]) -> Result<MergeOutcome, PersistError> {
        // A panic mid-cycle leaves the cache empty, so the poisoned value is still usable
        let mut cached = match self.table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let mut table = match cached.take() {
            Some(table) => table,
            None => MergedTable::read(&self.path)?,
        };
        let rows_before = table.rows().len();
        let columns_before = table.columns().to_vec();

        let outcome = merge_into(&mut table, batch);

        if let Some(missing) = table.missing_since(rows_before, &columns_before) {
            return Err(PersistError::Shrink {
                path: self.path.clone(),
                missing,
            });
        }

        if outcome.changed() {
            table.write(&self.path)?;
            tracing::debug!(
                path = %self.path.display(),
                appended = outcome.appended,
                columns_added = outcome.columns_added,
                rows = table.rows().len(),
                "Merged table written"
            );
        }

        *cached = Some(table);
        Ok(outcome)
    }

    /// The table as the writer sees it
    pub fn read(&self) -> Result<MergedTable, PersistError> {
        let cached = match self.table.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        match cached.as_ref() {
            Some(table) => Ok(table.clone()),
            None => MergedTable::read(&self.path),
        }
    }
}
