//! I/O module
//!
//! Handles CSV parsing and output.
//!
//! # Components
//!
//! - `csv_format` - CSV format handling (command conversion, output serialization)
//! - `async_reader` - Asynchronous CSV command reader with batch interface

pub mod async_reader;
pub mod csv_format;

pub use async_reader::AsyncReader;
pub use csv_format::{convert_csv_command, write_states_csv, CsvCommand};
