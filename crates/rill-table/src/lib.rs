#![forbid(unsafe_code)]

use rill_types::{DType, Value};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum TableError {
    #[error("Column not found: {0}")]
    ColumnNotFound(String),
    #[error("column length mismatch: column '{name}' has {len} rows, table has {expected}")]
    LengthMismatch {
        name: String,
        len: usize,
        expected: usize,
    },
    #[error("selection length {found} does not match row count {expected}")]
    SelectionLength { found: usize, expected: usize },
}

/// Typed nullable storage: exactly one of four parallel vectors, matching
/// the column's declared element type. `None` is a NULL cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "snake_case")]
pub enum ColumnData {
    Int64(Vec<Option<i64>>),
    Float64(Vec<Option<f64>>),
    Utf8(Vec<Option<String>>),
    Bool(Vec<Option<bool>>),
}

impl ColumnData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            Self::Int64(v) => v.len(),
            Self::Float64(v) => v.len(),
            Self::Utf8(v) => v.len(),
            Self::Bool(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        match self {
            Self::Int64(_) => DType::Int64,
            Self::Float64(_) => DType::Float64,
            Self::Utf8(_) => DType::Utf8,
            Self::Bool(_) => DType::Bool,
        }
    }

    fn keep(&self, selection: &[bool]) -> Self {
        fn retained<T: Clone>(values: &[Option<T>], selection: &[bool]) -> Vec<Option<T>> {
            values
                .iter()
                .zip(selection)
                .filter(|(_, keep)| **keep)
                .map(|(value, _)| value.clone())
                .collect()
        }

        match self {
            Self::Int64(v) => Self::Int64(retained(v, selection)),
            Self::Float64(v) => Self::Float64(retained(v, selection)),
            Self::Utf8(v) => Self::Utf8(retained(v, selection)),
            Self::Bool(v) => Self::Bool(retained(v, selection)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Column {
    name: String,
    data: ColumnData,
}

impl Column {
    pub fn new(name: impl Into<String>, data: ColumnData) -> Self {
        Self {
            name: name.into(),
            data,
        }
    }

    pub fn int64(name: impl Into<String>, values: Vec<Option<i64>>) -> Self {
        Self::new(name, ColumnData::Int64(values))
    }

    pub fn float64(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self::new(name, ColumnData::Float64(values))
    }

    pub fn utf8(name: impl Into<String>, values: Vec<Option<String>>) -> Self {
        Self::new(name, ColumnData::Utf8(values))
    }

    pub fn bools(name: impl Into<String>, values: Vec<Option<bool>>) -> Self {
        Self::new(name, ColumnData::Bool(values))
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn dtype(&self) -> DType {
        self.data.dtype()
    }

    #[must_use]
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[must_use]
    pub fn is_null(&self, idx: usize) -> bool {
        match &self.data {
            ColumnData::Int64(v) => v[idx].is_none(),
            ColumnData::Float64(v) => v[idx].is_none(),
            ColumnData::Utf8(v) => v[idx].is_none(),
            ColumnData::Bool(v) => v[idx].is_none(),
        }
    }

    /// Value at `idx` as a runtime value, `Value::Null` for a NULL cell.
    #[must_use]
    pub fn value(&self, idx: usize) -> Value {
        match &self.data {
            ColumnData::Int64(v) => v[idx].map_or(Value::Null, Value::Int64),
            ColumnData::Float64(v) => v[idx].map_or(Value::Null, Value::Float64),
            ColumnData::Utf8(v) => v[idx].clone().map_or(Value::Null, Value::Utf8),
            ColumnData::Bool(v) => v[idx].map_or(Value::Null, Value::Bool),
        }
    }
}

/// Columnar table. Invariant: every column's storage length equals
/// `num_rows`, checked at construction and preserved by every operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    columns: Vec<Column>,
    num_rows: usize,
}

impl Default for Table {
    fn default() -> Self {
        Self::empty()
    }
}

impl Table {
    pub fn new(columns: Vec<Column>) -> Result<Self, TableError> {
        let num_rows = columns.first().map_or(0, Column::len);
        for column in &columns {
            if column.len() != num_rows {
                return Err(TableError::LengthMismatch {
                    name: column.name().to_owned(),
                    len: column.len(),
                    expected: num_rows,
                });
            }
        }
        Ok(Self { columns, num_rows })
    }

    #[must_use]
    pub fn empty() -> Self {
        Self {
            columns: Vec::new(),
            num_rows: 0,
        }
    }

    #[must_use]
    pub fn num_rows(&self) -> usize {
        self.num_rows
    }

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|column| column.name() == name)
    }

    #[must_use]
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|column| column.name() == name)
    }

    /// New table holding the named columns in the listed order, same row
    /// count. Column data is copied; tables never share storage.
    pub fn project(&self, names: &[String]) -> Result<Self, TableError> {
        let columns = names
            .iter()
            .map(|name| {
                self.column(name)
                    .cloned()
                    .ok_or_else(|| TableError::ColumnNotFound(name.clone()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            columns,
            num_rows: self.num_rows,
        })
    }

    /// Materialize the rows whose selection bit is set. Both the scalar
    /// and the vectorized filter funnel through here, which keeps their
    /// output contracts identical.
    pub fn take_rows(&self, selection: &[bool]) -> Result<Self, TableError> {
        if selection.len() != self.num_rows {
            return Err(TableError::SelectionLength {
                found: selection.len(),
                expected: self.num_rows,
            });
        }

        let kept = selection.iter().filter(|keep| **keep).count();
        let columns = self
            .columns
            .iter()
            .map(|column| Column::new(column.name(), column.data.keep(selection)))
            .collect();

        Ok(Self {
            columns,
            num_rows: kept,
        })
    }
}

#[cfg(test)]
mod tests {
    use rill_types::{DType, Value};

    use super::{Column, Table, TableError};

    fn people() -> Table {
        Table::new(vec![
            Column::utf8(
                "name",
                vec![
                    Some("Alice".to_owned()),
                    Some("Bob".to_owned()),
                    Some("Charlie".to_owned()),
                ],
            ),
            Column::int64("age", vec![Some(35), None, Some(42)]),
        ])
        .expect("table should build")
    }

    #[test]
    fn construction_rejects_ragged_columns() {
        let err = Table::new(vec![
            Column::int64("a", vec![Some(1), Some(2)]),
            Column::int64("b", vec![Some(1)]),
        ])
        .expect_err("ragged columns must be rejected");

        assert!(matches!(err, TableError::LengthMismatch { .. }));
    }

    #[test]
    fn lookup_by_name_returns_reference_or_index() {
        let table = people();
        assert_eq!(table.column_index("age"), Some(1));
        assert_eq!(table.column("age").expect("age").name(), "age");
        assert_eq!(table.column_index("dept"), None);
        assert!(table.column("dept").is_none());
    }

    #[test]
    fn null_cells_surface_as_null_values() {
        let table = people();
        let age = table.column("age").expect("age column");
        assert!(age.is_null(1));
        assert_eq!(age.value(1), Value::Null);
        assert_eq!(age.value(2), Value::Int64(42));
    }

    #[test]
    fn projection_reorders_and_preserves_row_count() {
        let table = people();
        let projected = table
            .project(&["age".to_owned(), "name".to_owned()])
            .expect("projection should pass");

        assert_eq!(projected.num_rows(), table.num_rows());
        assert_eq!(projected.columns()[0].name(), "age");
        assert_eq!(projected.columns()[1].name(), "name");
        assert_eq!(projected.columns()[0].dtype(), DType::Int64);
    }

    #[test]
    fn projection_reports_unknown_column_by_name() {
        let err = people()
            .project(&["dept".to_owned()])
            .expect_err("unknown column must fail");
        assert_eq!(err.to_string(), "Column not found: dept");
    }

    #[test]
    fn bool_columns_store_and_surface_like_any_other() {
        let table = Table::new(vec![Column::bools(
            "active",
            vec![Some(true), Some(false), None],
        )])
        .expect("table should build");

        let active = table.column("active").expect("active");
        assert_eq!(active.dtype(), DType::Bool);
        assert_eq!(active.value(0), Value::Bool(true));
        assert!(active.is_null(2));
    }

    #[test]
    fn take_rows_keeps_selected_rows_in_order() {
        let table = people();
        let out = table
            .take_rows(&[true, false, true])
            .expect("selection should apply");

        assert_eq!(out.num_rows(), 2);
        assert_eq!(out.column("name").expect("name").value(1), "Charlie".into());
        for column in out.columns() {
            assert_eq!(column.len(), out.num_rows());
        }
    }

    #[test]
    fn take_rows_rejects_wrong_selection_length() {
        let err = people()
            .take_rows(&[true])
            .expect_err("short selection must fail");
        assert!(matches!(err, TableError::SelectionLength { .. }));
    }
}
