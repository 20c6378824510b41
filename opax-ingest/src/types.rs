use csv::StringRecord;

/// What a statement column holds, after header normalization
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnRole {
    Date,
    Description,
    Debit,
    Credit,
    Amount,
}

impl ColumnRole {
    /// Map a raw header (HDFC, SBI, ICICI and generic exports) to its role
    pub fn from_header(header: &str) -> Option<Self> {
        match header.trim().to_lowercase().as_str() {
            "date" | "txn date" | "value date" | "transaction date" => Some(ColumnRole::Date),
            "description" | "narration" | "remarks" | "particulars" => {
                Some(ColumnRole::Description)
            }
            "debit" | "debit amount" | "withdrawal" | "withdrawal amount (inr)" => {
                Some(ColumnRole::Debit)
            }
            "credit" | "credit amount" | "deposit" | "deposit amount (inr)" => {
                Some(ColumnRole::Credit)
            }
            "amount" => Some(ColumnRole::Amount),
            _ => None,
        }
    }
}

/// Column positions resolved from a statement header row
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementColumns {
    pub date: usize,
    pub description: usize,
    pub debit: Option<usize>,
    pub credit: Option<usize>,
    pub amount: Option<usize>,
}

impl StatementColumns {
    /// Resolve columns from a header record. The first column claiming a role
    /// wins. Returns `None` unless both a date and a description column exist.
    pub fn from_header(record: &StringRecord) -> Option<Self> {
        let mut date = None;
        let mut description = None;
        let mut debit = None;
        let mut credit = None;
        let mut amount = None;

        for (i, field) in record.iter().enumerate() {
            let slot = match ColumnRole::from_header(field) {
                Some(ColumnRole::Date) => &mut date,
                Some(ColumnRole::Description) => &mut description,
                Some(ColumnRole::Debit) => &mut debit,
                Some(ColumnRole::Credit) => &mut credit,
                Some(ColumnRole::Amount) => &mut amount,
                None => continue,
            };
            if slot.is_none() {
                *slot = Some(i);
            }
        }

        Some(Self {
            date: date?,
            description: description?,
            debit,
            credit,
            amount,
        })
    }
}
