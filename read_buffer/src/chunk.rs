//! A `Chunk` is a fixed-width row block holding parallel columns. Columns
//! are either owning [`Column`] storage (a "value segment") or
//! [`ReferenceSegment`]s that point into another table's rows by
//! [`RowID`].

use std::sync::Arc;

use data_types::{ChunkSchema, RowID, Value};

use crate::column::Column;
use crate::table::Table;

/// One column within a chunk: either owned data, or a reference into
/// another table.
#[derive(Debug, Clone)]
pub enum Segment {
    Value(Column),
    Reference(ReferenceSegment),
}

impl Segment {
    pub fn len(&self) -> usize {
        match self {
            Segment::Value(c) => c.len(),
            Segment::Reference(r) => r.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, row: usize) -> Option<Value<'_>> {
        match self {
            Segment::Value(c) => c.get(row),
            Segment::Reference(r) => r.get(row),
        }
    }
}

/// A column whose values live in another table's rows. Each entry is a
/// [`RowID`] into the `referenced` table; resolving a value means
/// following that pointer.
#[derive(Debug, Clone)]
pub struct ReferenceSegment {
    referenced: Arc<Table>,
    column_index: usize,
    row_ids: Vec<RowID>,
}

impl ReferenceSegment {
    pub fn new(referenced: Arc<Table>, column_index: usize, row_ids: Vec<RowID>) -> Self {
        Self {
            referenced,
            column_index,
            row_ids,
        }
    }

    pub fn len(&self) -> usize {
        self.row_ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.row_ids.is_empty()
    }

    pub fn get(&self, row: usize) -> Option<Value<'_>> {
        let target = self.row_ids[row];
        self.referenced.get(target, self.column_index)
    }
}

/// A horizontal block of rows sharing a schema.
#[derive(Debug, Clone)]
pub struct Chunk {
    schema: Arc<ChunkSchema>,
    segments: Vec<Segment>,
    rows: usize,
}

impl Chunk {
    /// Builds a chunk from value segments. Every segment must have the
    /// same length; that length becomes the chunk's row count.
    pub fn new(schema: Arc<ChunkSchema>, segments: Vec<Segment>) -> Self {
        let rows = segments.first().map(Segment::len).unwrap_or(0);
        debug_assert!(segments.iter().all(|s| s.len() == rows));
        debug_assert_eq!(schema.len(), segments.len());
        Self { schema, segments, rows }
    }

    pub fn schema(&self) -> &ChunkSchema {
        &self.schema
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    /// Typed value accessor: `(value, is_null)`, matching the `InputTable`
    /// contract in `SPEC_FULL.md` §4 (a `None` return stands for NULL).
    pub fn get(&self, column_index: usize, row: usize) -> Option<Value<'_>> {
        self.segments[column_index].get(row)
    }

    pub fn column_count(&self) -> usize {
        self.segments.len()
    }
}
