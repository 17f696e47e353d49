//! Tabular record streams.
//!
//! Every tool in the suite reads the same format: UTF-8 text, one record per
//! line, fields separated by tabs, a header naming the fields, and `#` or
//! empty lines as comments anywhere in the stream.
//!
//! - [`RecordStream`] - lazy iterator over comments, the header and records
//! - [`RecordHandler`] / [`parse_records`] - callback-style driving of a stream
//! - [`Schema`] - header names with duplicate renaming and name lookup
//! - [`Value`] / [`ColumnKind`] - numeric/text duality of cells
//! - [`GroupTracker`] - group boundaries in key-sorted input

mod group;
mod schema;
mod stream;
mod value;

pub use group::GroupTracker;
pub use schema::Schema;
pub use stream::{
    parse_records, parse_records_with, Delimiter, Record, RecordHandler, RecordStream, StreamItem,
};
pub use value::{format_number, parse_number, ColumnKind, Value};
