#![deny(rust_2018_idioms)]

//! Shared value and type definitions for the column-oriented engine.
//!
//! This crate is deliberately dependency-light: it exists so that
//! `read_buffer` and any future operator crate can agree on what a
//! "column" and a "row" are without depending on each other.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use snafu::Snafu;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("cannot widen {:?} for an aggregate of type {}", value, target))]
    Widen { value: Scalar, target: &'static str },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The closed set of physical column types this engine understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Int32,
    Int64,
    Float,
    Double,
    String,
}

impl DataType {
    pub fn is_numeric(&self) -> bool {
        !matches!(self, DataType::String)
    }
}

impl std::fmt::Display for DataType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DataType::Int32 => "Int32",
            DataType::Int64 => "Int64",
            DataType::Float => "Float",
            DataType::Double => "Double",
            DataType::String => "String",
        };
        write!(f, "{}", name)
    }
}

/// A single owned, typed value. Used wherever a value crosses a module
/// boundary (e.g. reading one cell out of a chunk, or a filter bound).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(String),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::I32(_) => DataType::Int32,
            Scalar::I64(_) => DataType::Int64,
            Scalar::F32(_) => DataType::Float,
            Scalar::F64(_) => DataType::Double,
            Scalar::String(_) => DataType::String,
        }
    }
}

impl PartialOrd for Scalar {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Scalar::I32(a), Scalar::I32(b)) => a.partial_cmp(b),
            (Scalar::I64(a), Scalar::I64(b)) => a.partial_cmp(b),
            (Scalar::F32(a), Scalar::F32(b)) => a.partial_cmp(b),
            (Scalar::F64(a), Scalar::F64(b)) => a.partial_cmp(b),
            (Scalar::String(a), Scalar::String(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Borrowed counterpart of [`Scalar`], avoiding an allocation when reading
/// string values straight out of a column.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value<'a> {
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    String(&'a str),
}

impl<'a> Value<'a> {
    pub fn to_owned(self) -> Scalar {
        match self {
            Value::I32(v) => Scalar::I32(v),
            Value::I64(v) => Scalar::I64(v),
            Value::F32(v) => Scalar::F32(v),
            Value::F64(v) => Scalar::F64(v),
            Value::String(v) => Scalar::String(v.to_owned()),
        }
    }
}

/// `(chunk_index, row_offset_in_chunk)` — identifies a single row anywhere
/// in an input table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RowID {
    pub chunk_index: usize,
    pub row_offset: usize,
}

impl RowID {
    pub fn new(chunk_index: usize, row_offset: usize) -> Self {
        Self {
            chunk_index,
            row_offset,
        }
    }
}

/// A single column's name and declared type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSchema {
    pub name: String,
    pub data_type: DataType,
}

impl ColumnSchema {
    pub fn new(name: impl Into<String>, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            data_type,
        }
    }
}

/// An ordered list of `(column_name, DataType)`, shared by every chunk of
/// a table.
pub type ChunkSchema = Vec<ColumnSchema>;
