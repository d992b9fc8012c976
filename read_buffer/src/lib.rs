#![deny(rust_2018_idioms)]

//! A column-oriented, in-memory storage and query layer.
//!
//! This crate covers two subsystems: chunk-level pruning statistics
//! ([`filter`]) that let a scan skip whole chunks without reading them,
//! and the group-by [`aggregate`] operator that turns a chunked
//! [`table::InputTable`] into a grouped [`table::OutputTable`].

use snafu::Snafu;

pub mod aggregate;
pub mod chunk;
pub mod column;
pub mod filter;
pub mod predicate;
pub mod table;

#[derive(Debug, Snafu)]
pub enum Error {
    #[snafu(display("a range/min-max filter requires at least one input value"))]
    EmptyInput,

    #[snafu(display("column index {} is outside the input table's schema", index))]
    InvalidColumn { index: usize },

    #[snafu(display("{} requires a column to aggregate but none was given", function))]
    MissingColumn { function: &'static str },

    #[snafu(display("{} is not a supported aggregate for column type {}", function, data_type))]
    UnsupportedAggregate {
        function: &'static str,
        data_type: data_types::DataType,
    },

    #[snafu(display("integer SUM overflowed 64 bits"))]
    Overflow,

    #[snafu(display("aggregation was cancelled"))]
    Cancelled,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
