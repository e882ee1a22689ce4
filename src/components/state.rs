//! Fixed-length, time-indexed component state.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Hourly state table with lazily created named columns.
///
/// Every column has exactly `len` rows. Columns are kept ordered by name so
/// exports are deterministic.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StateTable {
    len: usize,
    columns: BTreeMap<String, Vec<f64>>,
}

impl StateTable {
    /// Creates an empty table for a horizon of `len` steps.
    pub fn new(len: usize) -> Self {
        Self {
            len,
            columns: BTreeMap::new(),
        }
    }

    /// Number of rows (timesteps).
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Returns the column if it exists.
    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.columns.get(name).map(Vec::as_slice)
    }

    /// Returns the column, creating it filled with zeros on first access.
    pub fn column_mut(&mut self, name: &str) -> &mut Vec<f64> {
        let len = self.len;
        self.columns
            .entry(name.to_string())
            .or_insert_with(|| vec![0.0; len])
    }

    /// Replaces a column.
    ///
    /// # Errors
    ///
    /// Returns [`Error::HorizonMismatch`] if `values` does not have `len` rows.
    pub fn set_column(&mut self, name: &str, values: Vec<f64>) -> Result<()> {
        if values.len() != self.len {
            return Err(Error::HorizonMismatch {
                name: name.to_string(),
                expected: self.len,
                actual: values.len(),
            });
        }
        self.columns.insert(name.to_string(), values);
        Ok(())
    }

    /// Whether the column exists.
    pub fn contains(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    /// Iterates over `(name, values)` in name order.
    pub fn columns(&self) -> impl Iterator<Item = (&str, &[f64])> {
        self.columns
            .iter()
            .map(|(name, values)| (name.as_str(), values.as_slice()))
    }

    /// Drops all columns, keeping the horizon.
    pub fn clear(&mut self) {
        self.columns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn columns_are_created_lazily() {
        let mut state = StateTable::new(3);
        assert!(!state.contains("power"));
        state.column_mut("power")[1] = 2.0;
        assert_eq!(state.column("power"), Some(&[0.0, 2.0, 0.0][..]));
    }

    #[test]
    fn set_column_rejects_wrong_length() {
        let mut state = StateTable::new(4);
        let err = state.set_column("power", vec![1.0, 2.0]);
        assert!(matches!(
            err,
            Err(Error::HorizonMismatch {
                expected: 4,
                actual: 2,
                ..
            })
        ));
    }

    #[test]
    fn columns_iterate_in_name_order() {
        let mut state = StateTable::new(1);
        state.column_mut("power");
        state.column_mut("energy");
        let names: Vec<&str> = state.columns().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["energy", "power"]);
    }
}
