//! Deterministic tax computation: deduction caps, slab tax, 87A rebate, cess
//! and the old-vs-new regime comparison.

use opax_core::{
    AnalysisResult, DeductionAggregate, DeductionBreakdown, HealthMetrics, Regime, RegimeResult,
    TaxGaps, TaxRules, TaxSection, Transaction, UserProfile,
};
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::recommendations::recommend;

/// Hypothetical extra investment per section, for what-if runs
pub type ExtraInvestments = BTreeMap<TaxSection, f64>;

const WEIGHT_80C: f64 = 0.7;
const WEIGHT_80D: f64 = 0.3;

#[derive(Debug, Clone)]
pub struct TaxEngine {
    rules: Arc<TaxRules>,
}

impl TaxEngine {
    pub fn new(rules: Arc<TaxRules>) -> Self {
        Self { rules }
    }

    pub fn rules(&self) -> &TaxRules {
        &self.rules
    }

    /// Raw claimed totals of tax-saving transactions, per section
    fn claimed_totals(transactions: &[Transaction]) -> BTreeMap<TaxSection, f64> {
        let mut totals: BTreeMap<TaxSection, f64> =
            TaxSection::ALL.iter().map(|s| (*s, 0.0)).collect();
        for txn in transactions {
            if let Some(section) = txn.deductible_section() {
                *totals.entry(section).or_insert(0.0) += txn.amount;
            }
        }
        totals
    }

    fn cap_claims(&self, totals: &BTreeMap<TaxSection, f64>, profile: &UserProfile) -> DeductionBreakdown {
        let limits = &self.rules.limits;
        let sections = totals
            .iter()
            .map(|(section, claimed)| {
                let cap = limits.cap(*section, profile.age);
                (*section, DeductionAggregate::capped(*claimed, cap))
            })
            .collect();

        DeductionBreakdown {
            sections,
            standard_deduction: DeductionAggregate::fixed(self.rules.standard_deduction(Regime::Old)),
        }
    }

    /// Sum tax-saving transactions per section and cap each at its statutory
    /// limit. The 80D cap depends on the taxpayer's age bracket.
    pub fn aggregate_deductions(
        &self,
        transactions: &[Transaction],
        profile: &UserProfile,
    ) -> DeductionBreakdown {
        self.cap_claims(&Self::claimed_totals(transactions), profile)
    }

    /// Progressive slab tax. Assumes the slabs were validated as contiguous.
    pub fn compute_tax(&self, taxable_income: f64, regime: Regime) -> f64 {
        let mut tax = 0.0;
        for slab in self.rules.slabs(regime) {
            if taxable_income <= slab.min {
                continue;
            }
            let taxable_amount = match slab.max {
                Some(max) if taxable_income > max => max - slab.min,
                _ => taxable_income - slab.min,
            };
            tax += taxable_amount * slab.rate;
        }
        tax
    }

    /// Full liability for one regime. The new regime only admits its standard
    /// deduction, so `deductions_allowed` is ignored there.
    pub fn calculate_regime(&self, income: f64, deductions_allowed: f64, regime: Regime) -> RegimeResult {
        let applicable_deductions = match regime {
            Regime::New => self.rules.standard_deduction(Regime::New),
            Regime::Old => deductions_allowed,
        };

        let taxable_income = (income - applicable_deductions).max(0.0);
        let gross_tax = self.compute_tax(taxable_income, regime);

        // cliff-edged, not phased out
        let rebate_rule = self.rules.rebate(regime);
        let rebate = if taxable_income <= rebate_rule.max_income {
            rebate_rule.max_rebate
        } else {
            0.0
        };
        let tax_after_rebate = (gross_tax - rebate).max(0.0);

        let cess = tax_after_rebate * (self.rules.cess_percent / 100.0);

        RegimeResult {
            regime,
            taxable_income,
            gross_tax,
            rebate,
            cess,
            final_tax: tax_after_rebate + cess,
        }
    }

    pub fn health_metrics(&self, deductions: &DeductionBreakdown, profile: &UserProfile) -> HealthMetrics {
        let limits = &self.rules.limits;
        let utilization_80c = deductions.allowed(TaxSection::Sec80C) / limits.sec_80c * 100.0;
        let utilization_80d =
            deductions.allowed(TaxSection::Sec80D) / limits.health_cap(profile.age) * 100.0;
        let score = (utilization_80c * WEIGHT_80C + utilization_80d * WEIGHT_80D)
            .floor()
            .clamp(0.0, 100.0) as u32;

        HealthMetrics {
            score,
            utilization_80c,
            utilization_80d,
        }
    }

    pub fn tax_gaps(&self, deductions: &DeductionBreakdown, profile: &UserProfile) -> TaxGaps {
        let gap = |section: TaxSection| {
            (self.rules.limits.cap(section, profile.age) - deductions.allowed(section)).max(0.0)
        };
        let sec_80c = gap(TaxSection::Sec80C);
        let sec_80d = gap(TaxSection::Sec80D);
        let sec_80ccd_1b = gap(TaxSection::Sec80Ccd1B);

        TaxGaps {
            sec_80c,
            sec_80d,
            sec_80ccd_1b,
            total_tax_saving_opportunity: sec_80c + sec_80d + sec_80ccd_1b,
        }
    }

    fn compare(&self, profile: &UserProfile, deductions: DeductionBreakdown) -> AnalysisResult {
        let total_allowed = deductions.total_allowed();

        let old_regime = self.calculate_regime(profile.salary, total_allowed, Regime::Old);
        // the new regime substitutes its own standard deduction
        let new_regime = self.calculate_regime(profile.salary, 0.0, Regime::New);

        let (old_tax, new_tax) = (old_regime.final_tax, new_regime.final_tax);
        let recommended = if old_tax <= new_tax { Regime::Old } else { Regime::New };
        let savings = (old_tax - new_tax).abs();

        let health = self.health_metrics(&deductions, profile);
        let gaps = self.tax_gaps(&deductions, profile);
        let recommendations = recommend(profile, &deductions, &self.rules);

        tracing::debug!(
            total_allowed,
            old_tax,
            new_tax,
            recommended = %recommended,
            health_score = health.score,
            "regime comparison"
        );

        AnalysisResult {
            income: profile.salary,
            deductions,
            old_regime,
            new_regime,
            recommended,
            savings,
            health,
            gaps,
            recommendations,
        }
    }

    /// Compare both regimes for a classified transaction list
    pub fn analyze_profile(&self, profile: &UserProfile, transactions: &[Transaction]) -> AnalysisResult {
        let deductions = self.aggregate_deductions(transactions, profile);
        self.compare(profile, deductions)
    }

    /// Same as [`analyze_profile`](Self::analyze_profile) with hypothetical
    /// extra investments added to the claimed totals before capping
    pub fn what_if(
        &self,
        profile: &UserProfile,
        transactions: &[Transaction],
        extra: &ExtraInvestments,
    ) -> AnalysisResult {
        let mut totals = Self::claimed_totals(transactions);
        for (section, amount) in extra {
            *totals.entry(*section).or_insert(0.0) += amount.max(0.0);
        }
        let deductions = self.cap_claims(&totals, profile);
        self.compare(profile, deductions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use opax_core::RiskAppetite;

    const RULES: &str = include_str!("../../data/tax_rules.json");

    fn engine() -> TaxEngine {
        TaxEngine::new(Arc::new(TaxRules::from_json_str(RULES).unwrap()))
    }

    fn profile(salary: f64, age: u32) -> UserProfile {
        UserProfile::new(salary, age, RiskAppetite::Moderate, "2024-25")
    }

    fn tagged(section: TaxSection, amount: f64) -> Transaction {
        let mut t = Transaction::new(NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(), "x", amount);
        t.mark_tax_saving(section, "test");
        t
    }

    fn approx(a: f64, b: f64) {
        assert!((a - b).abs() < 1e-6, "{a} != {b}");
    }

    #[test]
    fn test_compute_tax_old_regime_slabs() {
        let e = engine();
        approx(e.compute_tax(0.0, Regime::Old), 0.0);
        approx(e.compute_tax(250000.0, Regime::Old), 0.0);
        approx(e.compute_tax(500000.0, Regime::Old), 12500.0);
        // 12,500 + 20% of 480,000
        approx(e.compute_tax(980000.0, Regime::Old), 108500.0);
        // 12,500 + 100,000 + 30% of 200,000
        approx(e.compute_tax(1200000.0, Regime::Old), 172500.0);
    }

    #[test]
    fn test_compute_tax_new_regime_slabs() {
        let e = engine();
        // 20,000 + 30,000 + 15% of 125,000
        approx(e.compute_tax(1125000.0, Regime::New), 68750.0);
        approx(e.compute_tax(700000.0, Regime::New), 20000.0);
    }

    #[test]
    fn test_compute_tax_is_monotonic() {
        let e = engine();
        for regime in Regime::BOTH {
            let mut prev = 0.0;
            let mut income = 0.0;
            while income <= 3_000_000.0 {
                let tax = e.compute_tax(income, regime);
                assert!(tax >= prev, "{regime} tax dropped at {income}");
                prev = tax;
                income += 12_345.0;
            }
        }
    }

    #[test]
    fn test_new_regime_ignores_supplied_deductions() {
        let e = engine();
        let a = e.calculate_regime(1_500_000.0, 0.0, Regime::New);
        let b = e.calculate_regime(1_500_000.0, 400_000.0, Regime::New);
        assert_eq!(a, b);
        approx(a.taxable_income, 1_425_000.0);
    }

    #[test]
    fn test_rebate_cliff() {
        let e = engine();
        // old regime: taxable == 500,000 gets the full rebate
        let at = e.calculate_regime(550_000.0, 50_000.0, Regime::Old);
        approx(at.taxable_income, 500_000.0);
        approx(at.rebate, 12_500.0);
        approx(at.final_tax, 0.0);

        let over = e.calculate_regime(550_001.0, 50_000.0, Regime::Old);
        approx(over.rebate, 0.0);
        assert!(over.final_tax > 13_000.0);

        // new regime: 775,000 - 75,000 = 700,000
        let at_new = e.calculate_regime(775_000.0, 0.0, Regime::New);
        approx(at_new.rebate, 25_000.0);
        approx(at_new.final_tax, 0.0);
        let over_new = e.calculate_regime(775_001.0, 0.0, Regime::New);
        approx(over_new.rebate, 0.0);
    }

    #[test]
    fn test_taxable_income_never_negative() {
        let e = engine();
        let r = e.calculate_regime(30_000.0, 200_000.0, Regime::Old);
        approx(r.taxable_income, 0.0);
        approx(r.final_tax, 0.0);
        assert!(r.gross_tax >= 0.0);
    }

    #[test]
    fn test_cess_applied_after_rebate() {
        let e = engine();
        let r = e.calculate_regime(1_200_000.0, 220_000.0, Regime::Old);
        approx(r.gross_tax, 108_500.0);
        approx(r.cess, 4_340.0);
        approx(r.final_tax, 112_840.0);
    }

    #[test]
    fn test_aggregate_caps_exactly() {
        let e = engine();
        let txns = vec![
            tagged(TaxSection::Sec80C, 60_000.0),
            tagged(TaxSection::Sec80C, 100_000.0),
        ];
        let d = e.aggregate_deductions(&txns, &profile(1_000_000.0, 30));
        let c = d.section(TaxSection::Sec80C);
        approx(c.claimed, 160_000.0);
        approx(c.allowed, 150_000.0);
        approx(d.standard_deduction.allowed, 50_000.0);
        // every section is present even when nothing was claimed
        assert_eq!(d.sections.len(), 4);
        approx(d.section(TaxSection::Sec24B).claimed, 0.0);
    }

    #[test]
    fn test_untagged_transactions_ignored() {
        let e = engine();
        let mut txn = Transaction::new(NaiveDate::from_ymd_opt(2024, 7, 1).unwrap(), "amazon shopping", 5000.0);
        // a section without the tax-saving flag does not count
        txn.tax_section = Some(TaxSection::Sec80C);
        let d = e.aggregate_deductions(&[txn], &profile(1_000_000.0, 30));
        approx(d.section(TaxSection::Sec80C).claimed, 0.0);
    }

    #[test]
    fn test_senior_80d_bracket() {
        let e = engine();
        let txns = vec![tagged(TaxSection::Sec80D, 40_000.0)];

        let young = e.aggregate_deductions(&txns, &profile(1_000_000.0, 40));
        approx(young.allowed(TaxSection::Sec80D), 25_000.0);
        let senior = e.aggregate_deductions(&txns, &profile(1_000_000.0, 65));
        approx(senior.allowed(TaxSection::Sec80D), 40_000.0);
    }

    #[test]
    fn test_health_score_bounds() {
        let e = engine();
        let empty = e.analyze_profile(&profile(900_000.0, 30), &[]);
        assert_eq!(empty.health.score, 0);

        let full = e.analyze_profile(
            &profile(900_000.0, 30),
            &[
                tagged(TaxSection::Sec80C, 500_000.0),
                tagged(TaxSection::Sec80D, 90_000.0),
            ],
        );
        assert_eq!(full.health.score, 100);
        approx(full.health.utilization_80c, 100.0);
        approx(full.health.utilization_80d, 100.0);
    }

    #[test]
    fn test_gaps() {
        let e = engine();
        let d = e.aggregate_deductions(
            &[tagged(TaxSection::Sec80C, 90_000.0), tagged(TaxSection::Sec80Ccd1B, 60_000.0)],
            &profile(1_000_000.0, 30),
        );
        let gaps = e.tax_gaps(&d, &profile(1_000_000.0, 30));
        approx(gaps.sec_80c, 60_000.0);
        approx(gaps.sec_80d, 25_000.0);
        approx(gaps.sec_80ccd_1b, 0.0);
        approx(gaps.total_tax_saving_opportunity, 85_000.0);
    }

    #[test]
    fn test_old_regime_wins_ties() {
        // 300,000 salary: both regimes land inside their rebate window
        let e = engine();
        let result = e.analyze_profile(&profile(300_000.0, 30), &[]);
        approx(result.old_regime.final_tax, 0.0);
        approx(result.new_regime.final_tax, 0.0);
        assert_eq!(result.recommended, Regime::Old);
        approx(result.savings, 0.0);
    }

    #[test]
    fn test_what_if_adds_extra_before_capping() {
        let e = engine();
        let p = profile(1_200_000.0, 30);
        let txns = vec![tagged(TaxSection::Sec80C, 100_000.0)];

        let mut extra = ExtraInvestments::new();
        extra.insert(TaxSection::Sec80C, 80_000.0);
        extra.insert(TaxSection::Sec80Ccd1B, 50_000.0);

        let base = e.analyze_profile(&p, &txns);
        let sim = e.what_if(&p, &txns, &extra);
        approx(sim.deductions.section(TaxSection::Sec80C).claimed, 180_000.0);
        approx(sim.deductions.allowed(TaxSection::Sec80C), 150_000.0);
        approx(sim.deductions.allowed(TaxSection::Sec80Ccd1B), 50_000.0);
        assert!(sim.old_regime.final_tax < base.old_regime.final_tax);
        assert_eq!(sim.new_regime, base.new_regime);
    }
}
