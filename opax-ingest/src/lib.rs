//! opax-ingest: bank statement ingestion and description normalization.

pub mod clean;
pub mod parsers;
pub mod types;

pub use clean::{clean_description, DescriptionCleaner};
pub use parsers::bank_csv::{parse_bank_csv, parse_bank_csv_reader};
pub use types::{ColumnRole, StatementColumns};
