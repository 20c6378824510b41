//! Typed tax rules loaded from `tax_rules.json`.
//!
//! The file is parsed once at startup and validated before any request is
//! served: slabs must start at zero, be contiguous and end in a single
//! unbounded slab, and every cap/rate must be a sane non-negative number.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

use crate::error::{OpaxError, Result};
use crate::finance::TaxSection;

/// Age from which the senior 80D bracket applies
pub const SENIOR_CITIZEN_AGE: u32 = 60;

/// The two mutually exclusive computation modes
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Regime {
    #[serde(rename = "old_regime")]
    Old,
    #[serde(rename = "new_regime")]
    New,
}

impl Regime {
    pub const BOTH: [Regime; 2] = [Regime::Old, Regime::New];

    pub fn key(&self) -> &'static str {
        match self {
            Regime::Old => "old_regime",
            Regime::New => "new_regime",
        }
    }
}

impl fmt::Display for Regime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Regime::Old => f.write_str("Old Regime"),
            Regime::New => f.write_str("New Regime"),
        }
    }
}

/// A value configured separately for each regime
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PerRegime<T> {
    pub old_regime: T,
    pub new_regime: T,
}

impl<T> PerRegime<T> {
    pub fn get(&self, regime: Regime) -> &T {
        match regime {
            Regime::Old => &self.old_regime,
            Regime::New => &self.new_regime,
        }
    }
}

/// One progressive bracket. `max = None` means unbounded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Slab {
    pub min: f64,
    pub max: Option<f64>,
    pub rate: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Rebate {
    pub max_income: f64,
    pub max_rebate: f64,
}

/// 80D caps keyed by age bracket
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HealthLimits {
    pub self_family_below_60: f64,
    pub self_family_above_60: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Limits {
    #[serde(rename = "80C")]
    pub sec_80c: f64,
    #[serde(rename = "80D")]
    pub sec_80d: HealthLimits,
    #[serde(rename = "80CCD_1B")]
    pub sec_80ccd_1b: f64,
    #[serde(rename = "24B")]
    pub sec_24b: f64,
}

impl Limits {
    /// 80D cap for a taxpayer of the given age
    pub fn health_cap(&self, age: u32) -> f64 {
        if age >= SENIOR_CITIZEN_AGE {
            self.sec_80d.self_family_above_60
        } else {
            self.sec_80d.self_family_below_60
        }
    }

    /// Statutory cap for a section; age only matters for 80D
    pub fn cap(&self, section: TaxSection, age: u32) -> f64 {
        match section {
            TaxSection::Sec80C => self.sec_80c,
            TaxSection::Sec80D => self.health_cap(age),
            TaxSection::Sec80Ccd1B => self.sec_80ccd_1b,
            TaxSection::Sec24B => self.sec_24b,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TaxRules {
    #[serde(default)]
    pub financial_year: Option<String>,
    pub slabs: PerRegime<Vec<Slab>>,
    pub standard_deduction: PerRegime<f64>,
    pub limits: Limits,
    #[serde(rename = "rebate_87A")]
    pub rebate_87a: PerRegime<Rebate>,
    pub cess_percent: f64,
}

impl TaxRules {
    /// Parse and validate rules from JSON text
    pub fn from_json_str(json: &str) -> Result<Self> {
        let rules: TaxRules = serde_json::from_str(json)
            .map_err(|e| OpaxError::configuration(format!("malformed tax rules: {e}")))?;
        rules.validate()?;
        Ok(rules)
    }

    /// Load and validate rules from a JSON file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|e| {
            OpaxError::configuration(format!("reading tax rules {}: {e}", path.display()))
        })?;
        let rules = Self::from_json_str(&json)?;
        tracing::info!(
            path = %path.display(),
            financial_year = rules.financial_year.as_deref().unwrap_or("unspecified"),
            "loaded tax rules"
        );
        Ok(rules)
    }

    pub fn slabs(&self, regime: Regime) -> &[Slab] {
        self.slabs.get(regime)
    }

    pub fn standard_deduction(&self, regime: Regime) -> f64 {
        *self.standard_deduction.get(regime)
    }

    pub fn rebate(&self, regime: Regime) -> Rebate {
        *self.rebate_87a.get(regime)
    }

    /// Check the structural invariants the engine relies on
    pub fn validate(&self) -> Result<()> {
        for regime in Regime::BOTH {
            validate_slabs(regime, self.slabs(regime))?;

            let sd = self.standard_deduction(regime);
            non_negative(&format!("standard_deduction.{}", regime.key()), sd)?;

            let rebate = self.rebate(regime);
            non_negative(&format!("rebate_87A.{}.max_income", regime.key()), rebate.max_income)?;
            non_negative(&format!("rebate_87A.{}.max_rebate", regime.key()), rebate.max_rebate)?;
        }

        non_negative("limits.80C", self.limits.sec_80c)?;
        non_negative("limits.80D.self_family_below_60", self.limits.sec_80d.self_family_below_60)?;
        non_negative("limits.80D.self_family_above_60", self.limits.sec_80d.self_family_above_60)?;
        non_negative("limits.80CCD_1B", self.limits.sec_80ccd_1b)?;
        non_negative("limits.24B", self.limits.sec_24b)?;
        // utilization divides by these
        let divisors = [
            self.limits.sec_80c,
            self.limits.sec_80d.self_family_below_60,
            self.limits.sec_80d.self_family_above_60,
        ];
        if divisors.iter().any(|&cap| cap == 0.0) {
            return Err(OpaxError::configuration("80C and 80D limits must be positive"));
        }

        if !self.cess_percent.is_finite() || !(0.0..=100.0).contains(&self.cess_percent) {
            return Err(OpaxError::configuration(format!(
                "cess_percent must be within 0..=100, got {}",
                self.cess_percent
            )));
        }

        Ok(())
    }
}

fn non_negative(field: &str, value: f64) -> Result<()> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(OpaxError::configuration(format!(
            "{field} must be a non-negative number, got {value}"
        )))
    }
}

fn validate_slabs(regime: Regime, slabs: &[Slab]) -> Result<()> {
    let key = regime.key();
    let Some(first) = slabs.first() else {
        return Err(OpaxError::configuration(format!("slabs.{key} is empty")));
    };
    if first.min != 0.0 {
        return Err(OpaxError::configuration(format!(
            "slabs.{key}[0] must start at 0, starts at {}",
            first.min
        )));
    }

    let last = slabs.len() - 1;
    for (i, slab) in slabs.iter().enumerate() {
        if !slab.rate.is_finite() || !(0.0..=1.0).contains(&slab.rate) {
            return Err(OpaxError::configuration(format!(
                "slabs.{key}[{i}] rate {} is outside 0..=1",
                slab.rate
            )));
        }
        match slab.max {
            Some(max) => {
                if i == last {
                    return Err(OpaxError::configuration(format!(
                        "slabs.{key}[{i}] is the top slab and must be unbounded"
                    )));
                }
                if !max.is_finite() || max <= slab.min {
                    return Err(OpaxError::configuration(format!(
                        "slabs.{key}[{i}] max {} must exceed min {}",
                        max, slab.min
                    )));
                }
                let next_min = slabs[i + 1].min;
                if next_min != max {
                    return Err(OpaxError::configuration(format!(
                        "slabs.{key} not contiguous: [{i}] ends at {max}, [{}] starts at {next_min}",
                        i + 1
                    )));
                }
            }
            None if i != last => {
                return Err(OpaxError::configuration(format!(
                    "slabs.{key}[{i}] is unbounded but is not the top slab"
                )));
            }
            None => {}
        }
    }

    Ok(())
}
