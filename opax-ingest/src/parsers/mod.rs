//! Statement parsers. Each one yields normalized debit transactions.

pub mod bank_csv;
