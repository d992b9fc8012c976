//! `InputTable`/`OutputTable`: the external interfaces the aggregation
//! operator is built against (`SPEC_FULL.md` §5.3 / spec §6).

use data_types::{ChunkSchema, RowID, Value};

use crate::chunk::Chunk;

/// An ordered sequence of chunks sharing a schema. The aggregation
/// operator only ever reads an `InputTable`; it never mutates it.
pub trait InputTable: Send + Sync {
    fn schema(&self) -> &ChunkSchema;
    fn chunks(&self) -> &[Chunk];

    fn rows(&self) -> usize {
        self.chunks().iter().map(Chunk::rows).sum()
    }
}

/// A simple owned, in-memory `InputTable`.
#[derive(Debug, Clone)]
pub struct Table {
    schema: ChunkSchema,
    chunks: Vec<Chunk>,
}

impl Table {
    pub fn new(schema: ChunkSchema, chunks: Vec<Chunk>) -> Self {
        Self { schema, chunks }
    }

    /// Resolves a value by absolute row id, used by `ReferenceSegment` to
    /// follow a pointer into this table.
    pub fn get(&self, row_id: RowID, column_index: usize) -> Option<Value<'_>> {
        self.chunks[row_id.chunk_index].get(column_index, row_id.row_offset)
    }
}

impl InputTable for Table {
    fn schema(&self) -> &ChunkSchema {
        &self.schema
    }

    fn chunks(&self) -> &[Chunk] {
        &self.chunks
    }
}

/// The result of the aggregation operator: one chunk, group-by columns
/// followed by aggregate columns, in that order.
#[derive(Debug, Clone)]
pub struct OutputTable {
    schema: ChunkSchema,
    chunk: Chunk,
}

impl OutputTable {
    pub fn new(schema: ChunkSchema, chunk: Chunk) -> Self {
        Self { schema, chunk }
    }

    pub fn schema(&self) -> &ChunkSchema {
        &self.schema
    }

    pub fn chunk(&self) -> &Chunk {
        &self.chunk
    }

    pub fn rows(&self) -> usize {
        self.chunk.rows()
    }

    /// Reads a single cell by column name rather than index — convenient
    /// for tests and callers without a cached schema lookup.
    pub fn get(&self, column_name: &str, row: usize) -> Option<Value<'_>> {
        let idx = self.schema.iter().position(|c| c.name == column_name)?;
        self.chunk.get(idx, row)
    }

    pub fn column_index(&self, column_name: &str) -> Option<usize> {
        self.schema.iter().position(|c| c.name == column_name)
    }
}
