//! Transaction and taxpayer profile types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{OpaxError, Result};

/// Oldest age accepted on a profile.
pub const MAX_PROFILE_AGE: u32 = 120;

/// Statutory deduction sections the engine understands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaxSection {
    #[serde(rename = "80C")]
    Sec80C,
    #[serde(rename = "80D")]
    Sec80D,
    #[serde(rename = "80CCD_1B")]
    Sec80Ccd1B,
    #[serde(rename = "24B")]
    Sec24B,
}

impl TaxSection {
    pub const ALL: [TaxSection; 4] = [
        TaxSection::Sec80C,
        TaxSection::Sec80D,
        TaxSection::Sec80Ccd1B,
        TaxSection::Sec24B,
    ];

    /// Statutory label, e.g. "80CCD_1B"
    pub fn label(&self) -> &'static str {
        match self {
            TaxSection::Sec80C => "80C",
            TaxSection::Sec80D => "80D",
            TaxSection::Sec80Ccd1B => "80CCD_1B",
            TaxSection::Sec24B => "24B",
        }
    }
}

impl fmt::Display for TaxSection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for TaxSection {
    type Err = OpaxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_uppercase().as_str() {
            "80C" => Ok(TaxSection::Sec80C),
            "80D" => Ok(TaxSection::Sec80D),
            "80CCD_1B" | "80CCD(1B)" | "80CCD1B" => Ok(TaxSection::Sec80Ccd1B),
            "24B" | "24(B)" => Ok(TaxSection::Sec24B),
            other => Err(OpaxError::configuration(format!("unknown tax section '{other}'"))),
        }
    }
}

/// A single debit from a bank statement, optionally enriched by the classifier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Transaction {
    /// Date of the transaction (YYYY-MM-DD)
    pub date: NaiveDate,
    /// Normalized lowercase description
    pub description: String,
    /// Non-negative amount in rupees
    pub amount: f64,
    /// Instrument category, set on a classifier match
    #[serde(default)]
    pub category: Option<String>,
    /// Deduction section, set on a classifier match
    #[serde(default)]
    pub tax_section: Option<TaxSection>,
    #[serde(default)]
    pub is_tax_saving: bool,
}

impl Transaction {
    /// Create an unclassified transaction
    pub fn new(date: NaiveDate, description: impl Into<String>, amount: f64) -> Self {
        Self {
            date,
            description: description.into(),
            amount,
            category: None,
            tax_section: None,
            is_tax_saving: false,
        }
    }

    /// Record a classifier match on this transaction
    pub fn mark_tax_saving(&mut self, section: TaxSection, category: impl Into<String>) {
        self.tax_section = Some(section);
        self.category = Some(category.into());
        self.is_tax_saving = true;
    }

    /// Section this transaction counts towards, if any
    pub fn deductible_section(&self) -> Option<TaxSection> {
        if self.is_tax_saving { self.tax_section } else { None }
    }
}

/// Investor risk appetite, used to pick between equity and capital-protection suggestions
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum RiskAppetite {
    Conservative,
    Moderate,
    Aggressive,
}

impl FromStr for RiskAppetite {
    type Err = OpaxError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "conservative" | "low" => Ok(RiskAppetite::Conservative),
            "moderate" | "medium" => Ok(RiskAppetite::Moderate),
            "aggressive" | "high" => Ok(RiskAppetite::Aggressive),
            other => Err(OpaxError::invalid_input(format!("unknown risk appetite '{other}'"))),
        }
    }
}

impl fmt::Display for RiskAppetite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RiskAppetite::Conservative => "conservative",
            RiskAppetite::Moderate => "moderate",
            RiskAppetite::Aggressive => "aggressive",
        };
        f.write_str(s)
    }
}

/// The taxpayer an analysis is run for
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    #[serde(default)]
    pub name: Option<String>,
    /// Gross annual salary
    pub salary: f64,
    pub age: u32,
    pub risk_appetite: RiskAppetite,
    /// e.g. "2024-25"
    pub financial_year: String,
}

impl UserProfile {
    pub fn new(
        salary: f64,
        age: u32,
        risk_appetite: RiskAppetite,
        financial_year: impl Into<String>,
    ) -> Self {
        Self {
            name: None,
            salary,
            age,
            risk_appetite,
            financial_year: financial_year.into(),
        }
    }

    /// Reject profiles the engine cannot compute a meaningful result for
    pub fn validate(&self) -> Result<()> {
        if !self.salary.is_finite() || self.salary <= 0.0 {
            return Err(OpaxError::invalid_input(format!(
                "salary must be a positive amount, got {}",
                self.salary
            )));
        }
        if self.age > MAX_PROFILE_AGE {
            return Err(OpaxError::invalid_input(format!(
                "age {} is outside 0..={}",
                self.age, MAX_PROFILE_AGE
            )));
        }
        if self.financial_year.trim().is_empty() {
            return Err(OpaxError::invalid_input("financial_year is empty"));
        }
        Ok(())
    }
}
