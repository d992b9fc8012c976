//! Typed, chunked column storage: the "ValueSegment" of the data model.
//!
//! Each column owns a parallel `Vec<Option<T>>` for its [`DataType`],
//! with `None` standing in for a NULL cell (an equivalent of the bitmap
//! representation the external `OutputTable` contract in `SPEC_FULL.md`
//! §5.3 calls for, simplified to what `read_buffer`'s own in-memory
//! representation needs).

use data_types::{DataType, Scalar, Value};

/// A single owning, typed column.
#[derive(Debug, Clone, PartialEq)]
pub enum Column {
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float(Vec<Option<f32>>),
    Double(Vec<Option<f64>>),
    String(Vec<Option<String>>),
}

impl Column {
    pub fn data_type(&self) -> DataType {
        match self {
            Column::Int32(_) => DataType::Int32,
            Column::Int64(_) => DataType::Int64,
            Column::Float(_) => DataType::Float,
            Column::Double(_) => DataType::Double,
            Column::String(_) => DataType::String,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Column::Int32(v) => v.len(),
            Column::Int64(v) => v.len(),
            Column::Float(v) => v.len(),
            Column::Double(v) => v.len(),
            Column::String(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `None` when the cell is NULL, otherwise the row's value.
    pub fn get(&self, row: usize) -> Option<Value<'_>> {
        match self {
            Column::Int32(v) => v[row].map(Value::I32),
            Column::Int64(v) => v[row].map(Value::I64),
            Column::Float(v) => v[row].map(Value::F32),
            Column::Double(v) => v[row].map(Value::F64),
            Column::String(v) => v[row].as_deref().map(Value::String),
        }
    }
}

impl From<Vec<i64>> for Column {
    fn from(values: Vec<i64>) -> Self {
        Column::Int64(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<f64>> for Column {
    fn from(values: Vec<f64>) -> Self {
        Column::Double(values.into_iter().map(Some).collect())
    }
}

impl From<Vec<&str>> for Column {
    fn from(values: Vec<&str>) -> Self {
        Column::String(values.into_iter().map(|s| Some(s.to_owned())).collect())
    }
}

/// A growable column used to materialize an aggregation operator's output:
/// one per group-by column and one per aggregate result column.
#[derive(Debug)]
pub enum ColumnBuilder {
    Int32(Vec<Option<i32>>),
    Int64(Vec<Option<i64>>),
    Float(Vec<Option<f32>>),
    Double(Vec<Option<f64>>),
    String(Vec<Option<String>>),
}

impl ColumnBuilder {
    pub fn new(data_type: DataType) -> Self {
        match data_type {
            DataType::Int32 => ColumnBuilder::Int32(Vec::new()),
            DataType::Int64 => ColumnBuilder::Int64(Vec::new()),
            DataType::Float => ColumnBuilder::Float(Vec::new()),
            DataType::Double => ColumnBuilder::Double(Vec::new()),
            DataType::String => ColumnBuilder::String(Vec::new()),
        }
    }

    /// Appends a value (or NULL) produced for this output column. Panics if
    /// `value`'s type doesn't match the builder's declared type — an
    /// operator bug, not a runtime condition callers need to handle.
    pub fn push(&mut self, value: Option<Scalar>) {
        match (self, value) {
            (ColumnBuilder::Int32(vec), Some(Scalar::I32(v))) => vec.push(Some(v)),
            (ColumnBuilder::Int32(vec), None) => vec.push(None),
            (ColumnBuilder::Int64(vec), Some(Scalar::I64(v))) => vec.push(Some(v)),
            (ColumnBuilder::Int64(vec), None) => vec.push(None),
            (ColumnBuilder::Float(vec), Some(Scalar::F32(v))) => vec.push(Some(v)),
            (ColumnBuilder::Float(vec), None) => vec.push(None),
            (ColumnBuilder::Double(vec), Some(Scalar::F64(v))) => vec.push(Some(v)),
            (ColumnBuilder::Double(vec), None) => vec.push(None),
            (ColumnBuilder::String(vec), Some(Scalar::String(v))) => vec.push(Some(v)),
            (ColumnBuilder::String(vec), None) => vec.push(None),
            (builder, Some(v)) => panic!("type mismatch: {:?} cannot accept {:?}", builder, v),
        }
    }

    pub fn finish(self) -> Column {
        match self {
            ColumnBuilder::Int32(v) => Column::Int32(v),
            ColumnBuilder::Int64(v) => Column::Int64(v),
            ColumnBuilder::Float(v) => Column::Float(v),
            ColumnBuilder::Double(v) => Column::Double(v),
            ColumnBuilder::String(v) => Column::String(v),
        }
    }
}
