//! Column-oriented in-memory table.

use serde::Serialize;
use std::collections::HashSet;

use super::{DataType, Value, ValueKey};
use crate::error::{TableError, TableResult};

/// A named, typed column.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Column {
    pub name: String,
    pub dtype: DataType,
    pub values: Vec<Value>,
}

impl Column {
    pub fn new(name: impl Into<String>, dtype: DataType, values: Vec<Value>) -> Self {
        Self {
            name: name.into(),
            dtype,
            values,
        }
    }

    /// Build a column typed after its non-null values.
    ///
    /// Integers mixed with floats widen to `Float64`; any other mix, or a
    /// column with no values at all, becomes `Utf8`. Values are converted so
    /// each one matches the chosen type.
    pub fn infer(name: impl Into<String>, values: Vec<Value>) -> Self {
        let mut types = values.iter().filter_map(Value::data_type);
        let dtype = match types.next() {
            None => DataType::Utf8,
            Some(first) => types.fold(first, |acc, t| match (acc, t) {
                (a, b) if a == b => a,
                (DataType::Int64, DataType::Float64) | (DataType::Float64, DataType::Int64) => DataType::Float64,
                _ => DataType::Utf8,
            }),
        };

        let values = values
            .into_iter()
            .map(|v| {
                if v.is_null() {
                    return v;
                }
                match v {
                    Value::Int(i) if dtype == DataType::Float64 => Value::Float(i as f64),
                    Value::Str(_) => v,
                    other if dtype == DataType::Utf8 => Value::Str(other.to_string()),
                    other => other,
                }
            })
            .collect();
        Self::new(name, dtype, values)
    }

    /// True when every non-null value belongs to the declared type.
    pub fn is_consistent(&self) -> bool {
        self.values
            .iter()
            .all(|v| v.data_type().map_or(true, |t| t == self.dtype))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn null_count(&self) -> usize {
        self.values.iter().filter(|v| v.is_null()).count()
    }

    fn take(&self, indices: &[usize]) -> Column {
        Column {
            name: self.name.clone(),
            dtype: self.dtype,
            values: indices.iter().map(|&i| self.values[i].clone()).collect(),
        }
    }
}

/// Ordered collection of equally long columns with unique names.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Table {
    columns: Vec<Column>,
}

impl Table {
    pub fn new(columns: Vec<Column>) -> TableResult<Self> {
        let mut seen = HashSet::new();
        for col in &columns {
            if !seen.insert(col.name.as_str()) {
                return Err(TableError::Shape(format!("duplicate column '{}'", col.name)));
            }
        }
        if let Some(first) = columns.first() {
            if let Some(bad) = columns.iter().find(|c| c.len() != first.len()) {
                return Err(TableError::Shape(format!(
                    "column '{}' has {} rows, expected {}",
                    bad.name,
                    bad.len(),
                    first.len()
                )));
            }
        }
        Ok(Self { columns })
    }

    /// Build a table from row-major data, inferring each column's type.
    pub fn from_rows<S: AsRef<str>>(names: &[S], rows: Vec<Vec<Value>>) -> TableResult<Self> {
        let mut buffers: Vec<Vec<Value>> = vec![Vec::with_capacity(rows.len()); names.len()];
        for (i, row) in rows.into_iter().enumerate() {
            if row.len() != names.len() {
                return Err(TableError::Shape(format!(
                    "row {} has {} values, expected {}",
                    i,
                    row.len(),
                    names.len()
                )));
            }
            for (buf, value) in buffers.iter_mut().zip(row) {
                buf.push(value);
            }
        }
        let columns = names
            .iter()
            .zip(buffers)
            .map(|(name, values)| Column::infer(name.as_ref(), values))
            .collect();
        Self::new(columns)
    }

    pub fn row_count(&self) -> usize {
        self.columns.first().map(Column::len).unwrap_or(0)
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_count() == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.iter().any(|c| c.name == name)
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    /// Column by name; `context` names the table in the error.
    pub fn column(&self, name: &str, context: &str) -> TableResult<&Column> {
        self.columns
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| TableError::missing_column(name, context))
    }

    pub fn column_mut(&mut self, name: &str, context: &str) -> TableResult<&mut Column> {
        self.columns
            .iter_mut()
            .find(|c| c.name == name)
            .ok_or_else(|| TableError::missing_column(name, context))
    }

    /// Fail on the first name that is not a column.
    pub fn require<S: AsRef<str>>(&self, names: &[S], context: &str) -> TableResult<()> {
        match names.iter().find(|n| !self.has_column(n.as_ref())) {
            Some(missing) => Err(TableError::missing_column(missing.as_ref(), context)),
            None => Ok(()),
        }
    }

    /// Project onto `names`, in that order.
    pub fn select<S: AsRef<str>>(&self, names: &[S], context: &str) -> TableResult<Table> {
        let columns = names
            .iter()
            .map(|n| self.column(n.as_ref(), context).cloned())
            .collect::<TableResult<Vec<_>>>()?;
        Table::new(columns)
    }

    /// Rows at `indices`, in that order.
    pub fn take(&self, indices: &[usize]) -> Table {
        Table {
            columns: self.columns.iter().map(|c| c.take(indices)).collect(),
        }
    }

    /// Rows where `mask` is true.
    pub fn filter(&self, mask: &[bool]) -> Table {
        let indices: Vec<usize> = mask
            .iter()
            .enumerate()
            .filter_map(|(i, keep)| keep.then_some(i))
            .collect();
        self.take(&indices)
    }

    /// Append a column; its length must match the table's row count.
    pub fn push_column(&mut self, column: Column) -> TableResult<()> {
        if self.has_column(&column.name) {
            return Err(TableError::Shape(format!("duplicate column '{}'", column.name)));
        }
        if !self.columns.is_empty() && column.len() != self.row_count() {
            return Err(TableError::Shape(format!(
                "column '{}' has {} rows, expected {}",
                column.name,
                column.len(),
                self.row_count()
            )));
        }
        self.columns.push(column);
        Ok(())
    }

    /// Replace the same-named column in place.
    pub fn replace_column(&mut self, column: Column) -> TableResult<()> {
        if column.len() != self.row_count() {
            return Err(TableError::Shape(format!(
                "column '{}' has {} rows, expected {}",
                column.name,
                column.len(),
                self.row_count()
            )));
        }
        let slot = self.column_mut(&column.name, "table")?;
        *slot = column;
        Ok(())
    }

    /// Replace the same-named column, or append it when absent.
    pub fn set_column(&mut self, column: Column) -> TableResult<()> {
        if self.has_column(&column.name) {
            self.replace_column(column)
        } else {
            self.push_column(column)
        }
    }

    pub fn drop_column(&mut self, name: &str) -> Option<Column> {
        let pos = self.position(name)?;
        Some(self.columns.remove(pos))
    }

    pub fn row(&self, index: usize) -> Vec<&Value> {
        self.columns.iter().map(|c| &c.values[index]).collect()
    }

    pub fn row_key(&self, index: usize) -> Vec<ValueKey> {
        self.columns.iter().map(|c| c.values[index].key()).collect()
    }

    pub fn rows(&self) -> impl Iterator<Item = Vec<&Value>> + '_ {
        (0..self.row_count()).map(move |i| self.row(i))
    }

    pub fn into_columns(self) -> Vec<Column> {
        self.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Table {
        Table::from_rows(
            &["name", "plays"],
            vec![
                vec![Value::str("a"), Value::Int(1)],
                vec![Value::str("b"), Value::Null],
                vec![Value::str("c"), Value::Int(3)],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_rows_infers_types() {
        let t = sample();
        assert_eq!(t.row_count(), 3);
        assert_eq!(t.column("plays", "t").unwrap().dtype, DataType::Int64);
        assert_eq!(t.column("name", "t").unwrap().dtype, DataType::Utf8);
    }

    #[test]
    fn test_select_missing_column() {
        let err = sample().select(&["name", "genre"], "songs").unwrap_err();
        assert_eq!(err, TableError::missing_column("genre", "songs"));
    }

    #[test]
    fn test_filter_and_take() {
        let t = sample();
        let f = t.filter(&[true, false, true]);
        assert_eq!(f.row_count(), 2);
        assert_eq!(f.row(1)[0], &Value::str("c"));

        let r = t.take(&[2, 0]);
        assert_eq!(r.row(0)[0], &Value::str("c"));
    }

    #[test]
    fn test_rejects_ragged_columns() {
        let err = Table::new(vec![
            Column::new("a", DataType::Int64, vec![Value::Int(1)]),
            Column::new("b", DataType::Int64, vec![]),
        ])
        .unwrap_err();
        assert!(matches!(err, TableError::Shape(_)));
    }

    #[test]
    fn test_push_duplicate_column() {
        let mut t = sample();
        let err = t
            .push_column(Column::new("name", DataType::Utf8, vec![Value::Null; 3]))
            .unwrap_err();
        assert!(matches!(err, TableError::Shape(_)));
    }

    #[test]
    fn test_infer_mixed_values_falls_back_to_text() {
        let col = Column::infer("code", vec![Value::Int(1), Value::str(" X "), Value::Null]);
        assert_eq!(col.dtype, DataType::Utf8);
        assert_eq!(col.values, vec![Value::str("1"), Value::str(" X "), Value::Null]);
        assert!(col.is_consistent());

        let col = Column::infer("score", vec![Value::Int(2), Value::Float(2.5)]);
        assert_eq!(col.dtype, DataType::Float64);
        assert_eq!(col.values, vec![Value::Float(2.0), Value::Float(2.5)]);
    }

    #[test]
    fn test_inconsistent_column() {
        let col = Column::new("code", DataType::Int64, vec![Value::Int(1), Value::str("x")]);
        assert!(!col.is_consistent());
    }

    #[test]
    fn test_set_column_replaces_or_appends() {
        let mut t = sample();
        t.set_column(Column::new("name", DataType::Utf8, vec![Value::str("z"); 3]))
            .unwrap();
        assert_eq!(t.column_names(), vec!["name", "plays"]);
        assert_eq!(t.row(0)[0], &Value::str("z"));

        t.set_column(Column::new("rank", DataType::Int64, vec![Value::Int(1); 3]))
            .unwrap();
        assert_eq!(t.column_names(), vec!["name", "plays", "rank"]);
    }
}
