//! Derived analysis values produced by the tax engine

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::finance::TaxSection;
use crate::rules::Regime;

/// Claimed vs. statutory-capped amount for one deduction head
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct DeductionAggregate {
    pub claimed: f64,
    pub allowed: f64,
}

impl DeductionAggregate {
    /// `allowed = min(claimed, cap)`
    pub fn capped(claimed: f64, cap: f64) -> Self {
        Self {
            claimed,
            allowed: claimed.min(cap),
        }
    }

    /// Fixed entry where the full amount is always allowed
    pub fn fixed(amount: f64) -> Self {
        Self {
            claimed: amount,
            allowed: amount,
        }
    }
}

/// Per-section aggregates plus the standard deduction
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct DeductionBreakdown {
    pub sections: BTreeMap<TaxSection, DeductionAggregate>,
    pub standard_deduction: DeductionAggregate,
}

impl DeductionBreakdown {
    pub fn section(&self, section: TaxSection) -> DeductionAggregate {
        self.sections.get(&section).copied().unwrap_or_default()
    }

    pub fn allowed(&self, section: TaxSection) -> f64 {
        self.section(section).allowed
    }

    /// Sum of every `allowed`, standard deduction included
    pub fn total_allowed(&self) -> f64 {
        self.sections.values().map(|d| d.allowed).sum::<f64>() + self.standard_deduction.allowed
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RegimeResult {
    pub regime: Regime,
    pub taxable_income: f64,
    pub gross_tax: f64,
    pub rebate: f64,
    pub cess: f64,
    pub final_tax: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct HealthMetrics {
    /// Weighted 0-100 score: 70% 80C utilization, 30% 80D utilization
    pub score: u32,
    pub utilization_80c: f64,
    pub utilization_80d: f64,
}

/// Unused headroom under each investment-linked section
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct TaxGaps {
    #[serde(rename = "80C")]
    pub sec_80c: f64,
    #[serde(rename = "80D")]
    pub sec_80d: f64,
    #[serde(rename = "80CCD_1B")]
    pub sec_80ccd_1b: f64,
    pub total_tax_saving_opportunity: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationKind {
    EquityLinkedSavings,
    CapitalProtection,
    FamilySavings,
    HealthInsuranceTopUp,
    RetirementTopUp,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Recommendation {
    pub kind: RecommendationKind,
    pub title: String,
    pub description: String,
    pub section: TaxSection,
    /// Total amount to invest to close the gap
    pub amount: f64,
    /// Suggested monthly instalment, for recurring instruments
    pub monthly_amount: Option<f64>,
}

/// Everything one analysis request produces
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisResult {
    pub income: f64,
    pub deductions: DeductionBreakdown,
    pub old_regime: RegimeResult,
    pub new_regime: RegimeResult,
    pub recommended: Regime,
    /// |old tax - new tax|
    pub savings: f64,
    pub health: HealthMetrics,
    pub gaps: TaxGaps,
    pub recommendations: Vec<Recommendation>,
}

impl AnalysisResult {
    pub fn regime(&self, regime: Regime) -> &RegimeResult {
        match regime {
            Regime::Old => &self.old_regime,
            Regime::New => &self.new_regime,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capped_aggregate() {
        let d = DeductionAggregate::capped(160000.0, 150000.0);
        assert_eq!(d.claimed, 160000.0);
        assert_eq!(d.allowed, 150000.0);

        let under = DeductionAggregate::capped(20000.0, 25000.0);
        assert_eq!(under.allowed, 20000.0);
    }

    #[test]
    fn test_total_allowed_includes_standard_deduction() {
        let mut breakdown = DeductionBreakdown {
            standard_deduction: DeductionAggregate::fixed(50000.0),
            ..Default::default()
        };
        breakdown
            .sections
            .insert(TaxSection::Sec80C, DeductionAggregate::capped(210000.0, 150000.0));
        breakdown
            .sections
            .insert(TaxSection::Sec80D, DeductionAggregate::capped(20000.0, 25000.0));

        assert_eq!(breakdown.total_allowed(), 220000.0);
        assert_eq!(breakdown.allowed(TaxSection::Sec24B), 0.0);
    }

    #[test]
    fn test_breakdown_serializes_section_labels() {
        let mut breakdown = DeductionBreakdown::default();
        breakdown
            .sections
            .insert(TaxSection::Sec80Ccd1B, DeductionAggregate::fixed(1000.0));
        let json = serde_json::to_value(&breakdown).unwrap();
        assert_eq!(json["sections"]["80CCD_1B"]["allowed"], 1000.0);
    }
}
