use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{Error, Result};
use crate::value::Params;

/// Row/column projection of named values.
///
/// Column names are unique and every row has exactly one cell per column.
/// `Value::Null` marks an absent cell.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl Table {
    /// Create an empty table with the given header.
    pub fn new<I, S>(columns: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let columns: Vec<String> = columns.into_iter().map(Into::into).collect();
        let mut seen = HashMap::with_capacity(columns.len());
        for (idx, column) in columns.iter().enumerate() {
            if let Some(first) = seen.insert(column.as_str(), idx) {
                return Err(Error::MalformedTable(format!(
                    "duplicate column '{column}' at positions {first} and {idx}"
                )));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Create a table and append `rows`, checking arity.
    pub fn with_rows<I, S>(columns: I, rows: Vec<Vec<Value>>) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut table = Self::new(columns)?;
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Build a table from row objects. Columns appear in first-seen order;
    /// keys missing from a record become null cells.
    pub fn from_records(records: &[Params]) -> Result<Self> {
        let mut columns: Vec<String> = Vec::new();
        for record in records {
            for key in record.keys() {
                if !columns.iter().any(|column| column == key) {
                    columns.push(key.clone());
                }
            }
        }

        let mut table = Self::new(columns)?;
        for record in records {
            let row = table
                .columns
                .iter()
                .map(|column| record.get(column).cloned().unwrap_or(Value::Null))
                .collect();
            table.rows.push(row);
        }
        Ok(table)
    }

    /// Build a table from a column-oriented JSON object (`{"col": [..]}`).
    pub fn from_columns_json(value: &Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(Error::MalformedTable(
                "column-oriented table must be a JSON object".to_string(),
            ));
        };

        let mut columns = Vec::with_capacity(map.len());
        let mut data: Vec<&Vec<Value>> = Vec::with_capacity(map.len());
        for (name, cells) in map {
            let Value::Array(cells) = cells else {
                return Err(Error::MalformedTable(format!(
                    "column '{name}' must be an array"
                )));
            };
            columns.push(name.clone());
            data.push(cells);
        }

        let height = data.first().map(|cells| cells.len()).unwrap_or(0);
        if let Some(pos) = data.iter().position(|cells| cells.len() != height) {
            return Err(Error::MalformedTable(format!(
                "column '{}' has {} cells, expected {height}",
                columns[pos],
                data[pos].len()
            )));
        }

        let rows = (0..height)
            .map(|row| data.iter().map(|cells| cells[row].clone()).collect())
            .collect();
        Self::with_rows(columns, rows)
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
        self.columns.iter().position(|column| column == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// Append a row; its length must match the header.
    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::MalformedTable(format!(
                "row {} has {} cells, expected {}",
                self.rows.len(),
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn cell(&self, row: usize, column: &str) -> Option<&Value> {
        let idx = self.column_index(column)?;
        self.rows.get(row).and_then(|cells| cells.get(idx))
    }

    /// All cells of one column, top to bottom.
    pub fn column_values(&self, name: &str) -> Result<Vec<&Value>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| Error::UnknownColumn(name.to_string()))?;
        Ok(self.rows.iter().map(|row| &row[idx]).collect())
    }

    /// One row as an ordered object.
    pub fn record(&self, row: usize) -> Option<Params> {
        let cells = self.rows.get(row)?;
        Some(
            self.columns
                .iter()
                .cloned()
                .zip(cells.iter().cloned())
                .collect(),
        )
    }

    /// Row-oriented view: one object per row.
    pub fn records(&self) -> Vec<Params> {
        (0..self.rows.len())
            .filter_map(|row| self.record(row))
            .collect()
    }

    /// Column-oriented view: one array per column.
    pub fn to_columns_json(&self) -> Value {
        let mut map = Map::with_capacity(self.columns.len());
        for (idx, column) in self.columns.iter().enumerate() {
            let cells = self.rows.iter().map(|row| row[idx].clone()).collect();
            map.insert(column.clone(), Value::Array(cells));
        }
        Value::Object(map)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn params(value: Value) -> Params {
        match value {
            Value::Object(map) => map,
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn rejects_duplicate_columns() {
        let err = Table::new(["a", "b", "a"]).unwrap_err();
        assert!(matches!(err, Error::MalformedTable(_)));
    }

    #[test]
    fn rejects_ragged_rows() {
        let mut table = Table::new(["a", "b"]).unwrap();
        assert!(table.push_row(vec![json!(1)]).is_err());
        assert!(table.is_empty());
    }

    #[test]
    fn from_records_unions_keys_in_first_seen_order() {
        let records = vec![
            params(json!({"name": "b1", "d": 20})),
            params(json!({"name": "b2", "cat": "8.8/S"})),
        ];
        let table = Table::from_records(&records).unwrap();
        assert_eq!(table.columns(), ["name", "d", "cat"]);
        assert_eq!(table.cell(1, "d"), Some(&Value::Null));
        assert_eq!(table.cell(1, "cat"), Some(&json!("8.8/S")));
    }

    #[test]
    fn column_view_preserves_names_and_types() {
        let table = Table::with_rows(
            ["name", "area"],
            vec![vec![json!("b1"), json!(1.5)], vec![json!("b2"), json!(3)]],
        )
        .unwrap();
        let columns = table.to_columns_json();
        assert_eq!(columns, json!({"name": ["b1", "b2"], "area": [1.5, 3]}));
        assert_eq!(Table::from_columns_json(&columns).unwrap(), table);
    }

    #[test]
    fn from_columns_json_rejects_uneven_columns() {
        let err = Table::from_columns_json(&json!({"a": [1, 2], "b": [1]})).unwrap_err();
        assert!(matches!(err, Error::MalformedTable(_)));
    }
}
