//! Parse Indian bank statement CSV exports into debit transactions.
//!
//! Exports often carry a few preamble rows (account holder, period) before the
//! header, so the header is located by content rather than position. Only
//! debits are kept since deductions come from money paid out.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use csv::StringRecord;
use opax_core::Transaction;
use std::io::Read;
use std::path::Path;

use crate::clean::DescriptionCleaner;
use crate::types::StatementColumns;

// Two-digit years go first: %Y would happily read "24" as year 24.
const DATE_FORMATS: &[&str] = &[
    "%d/%m/%y",
    "%Y-%m-%d",
    "%d/%m/%Y",
    "%d-%m-%Y",
    "%d-%b-%Y",
    "%d %b %Y",
];

fn parse_date(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Currency markers that may lead an amount, matched case-insensitively
const CURRENCY_PREFIXES: [&str; 4] = ["rs.", "rs", "inr", "₹"];

fn strip_currency(s: &str) -> &str {
    let s = s.trim();
    for prefix in CURRENCY_PREFIXES {
        let head = s.get(..prefix.len());
        if head.is_some_and(|h| h.eq_ignore_ascii_case(prefix)) {
            return s[prefix.len()..].trim_start();
        }
    }
    s
}

/// "1,50,000.00", "₹ 5,000", "INR 250", "Rs. 50,000" -> number
fn parse_amount(s: &str) -> Option<f64> {
    let cleaned: String = strip_currency(s)
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();
    if cleaned.is_empty() || cleaned.matches('.').count() > 1 {
        return None;
    }
    cleaned.parse().ok().filter(|v: &f64| v.is_finite())
}

fn field<'a>(record: &'a StringRecord, idx: Option<usize>) -> Option<&'a str> {
    idx.and_then(|i| record.get(i))
        .map(str::trim)
        .filter(|s| !s.is_empty())
}

/// Expense amount of a row: the debit column when positive, otherwise the
/// absolute value of a signed amount column. Credit-only rows yield `None`.
fn expense_amount(record: &StringRecord, cols: &StatementColumns) -> Option<f64> {
    if let Some(debit) = field(record, cols.debit).and_then(parse_amount) {
        if debit > 0.0 {
            return Some(debit);
        }
    }
    field(record, cols.amount).and_then(parse_amount).map(f64::abs)
}

/// Parse a bank statement CSV file
pub fn parse_bank_csv(path: impl AsRef<Path>) -> Result<Vec<Transaction>> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).with_context(|| format!("opening {}", path.display()))?;
    parse_bank_csv_reader(file).with_context(|| format!("parsing {}", path.display()))
}

/// Parse a bank statement CSV from any reader
pub fn parse_bank_csv_reader<R: Read>(reader: R) -> Result<Vec<Transaction>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .has_headers(false)
        .from_reader(reader);

    let cleaner = DescriptionCleaner::new()?;
    let mut columns: Option<StatementColumns> = None;
    let mut txns = Vec::new();
    let mut skipped = 0usize;

    for result in rdr.records() {
        let record = result?;

        // Skip until we find the header row
        let Some(cols) = columns else {
            columns = StatementColumns::from_header(&record);
            continue;
        };

        let Some(date) = field(&record, Some(cols.date)).and_then(parse_date) else {
            skipped += 1;
            continue;
        };

        let description = match field(&record, Some(cols.description)) {
            Some(raw) => cleaner.clean(raw),
            None => {
                skipped += 1;
                continue;
            }
        };
        if description.is_empty() {
            skipped += 1;
            continue;
        }

        let Some(amount) = expense_amount(&record, &cols) else {
            skipped += 1;
            continue;
        };

        txns.push(Transaction::new(date, description, amount));
    }

    if columns.is_none() {
        bail!("no header row with date and description columns found");
    }

    tracing::debug!(parsed = txns.len(), skipped, "parsed bank statement");
    Ok(txns)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const HDFC: &str = "\
Account Statement,,,,,
Period: 01/04/2024 - 31/03/2025,,,,,
Date,Narration,Chq./Ref.No.,Withdrawal Amount (INR),Deposit Amount (INR),Closing Balance (INR)
10/04/2024,UPI/DR/LIC Premium,0001,\"50,000.00\",,\"1,50,000.00\"
15/05/2024,HDFC ELSS Tax Saver SIP,0002,60000,,90000
01/06/2024,EMPLOYER SALARY NEFT,0003,,100000,190000
20/06/2024,Star Health Insurance Renewal,0004,20000.00,,170000
not a date,Opening balance,,,,170000
";

    #[test]
    fn test_parses_debits_after_preamble() {
        let txns = parse_bank_csv_reader(HDFC.as_bytes()).unwrap();
        assert_eq!(txns.len(), 3, "salary credit and junk rows are skipped");

        let first = &txns[0];
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 4, 10).unwrap());
        assert_eq!(first.description, "upi dr lic premium");
        assert_eq!(first.amount, 50000.0);
        assert!(!first.is_tax_saving);

        assert_eq!(txns[2].description, "star health insurance renewal");
    }

    #[test]
    fn test_signed_amount_column_uses_absolute_value() {
        let csv = "Txn Date,Particulars,Amount\n2024-07-01,Amazon Shopping,-5000\n2024-08-01,NPS Contribution,25000\n";
        let txns = parse_bank_csv_reader(csv.as_bytes()).unwrap();
        assert_eq!(txns.len(), 2);
        assert_eq!(txns[0].amount, 5000.0);
        assert_eq!(txns[1].description, "nps contribution");
    }

    #[test]
    fn test_missing_header_is_an_error() {
        let csv = "foo,bar\n1,2\n";
        assert!(parse_bank_csv_reader(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 4, 5).unwrap();
        for s in ["2024-04-05", "05/04/2024", "05-04-2024", "05/04/24", "05-Apr-2024", "05 Apr 2024"] {
            assert_eq!(parse_date(s), Some(expected), "{s}");
        }
        assert_eq!(parse_date("April 5th"), None);
    }

    #[test]
    fn test_amount_formats() {
        assert_eq!(parse_amount("1,50,000.00"), Some(150000.0));
        assert_eq!(parse_amount("₹ 5,000"), Some(5000.0));
        assert_eq!(parse_amount("INR 250"), Some(250.0));
        assert_eq!(parse_amount("Rs. 50000"), Some(50000.0));
        assert_eq!(parse_amount("Rs.5,000.00"), Some(5000.0));
        assert_eq!(parse_amount("rs 250"), Some(250.0));
        assert_eq!(parse_amount("RS.1,20,000"), Some(120000.0));
        assert_eq!(parse_amount("1.2.3"), None);
        assert_eq!(parse_amount(""), None);
    }

    #[test]
    fn test_parse_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(HDFC.as_bytes()).unwrap();
        let txns = parse_bank_csv(file.path()).unwrap();
        assert_eq!(txns.len(), 3);
    }
}
