//! Gap-driven savings recommendations.
//!
//! Each rule fires at most once and independently of the others; the order
//! rules are evaluated in is the display priority.

use opax_core::{
    DeductionBreakdown, Recommendation, RecommendationKind, RiskAppetite, TaxRules, TaxSection,
    UserProfile,
};

/// Gaps at or below this are treated as fully utilized
const GAP_EPSILON: f64 = 1.0;
/// Residual 80C gap above which a family instrument is also suggested
const FAMILY_GAP_THRESHOLD: f64 = 50_000.0;
/// Salary from which a moderate-risk profile is steered towards equity
const EQUITY_INCOME_FLOOR: f64 = 1_000_000.0;
/// Months a recurring top-up is spread over
const TOP_UP_HORIZON_MONTHS: f64 = 12.0;

fn prefers_equity(profile: &UserProfile) -> bool {
    match profile.risk_appetite {
        RiskAppetite::Aggressive => true,
        RiskAppetite::Moderate => profile.salary >= EQUITY_INCOME_FLOOR,
        RiskAppetite::Conservative => false,
    }
}

/// Whole-rupee amount with Indian digit grouping, e.g. ₹1,50,000
pub fn format_rupees(amount: f64) -> String {
    let whole = amount.round() as i64;
    let digits = whole.abs().to_string();
    // Indian grouping: last three digits, then pairs
    let (head, tail) = digits.split_at(digits.len().saturating_sub(3));
    let mut groups: Vec<&str> = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (h, t) = rest.split_at(rest.len() - 2);
        groups.push(t);
        rest = h;
    }
    if !rest.is_empty() {
        groups.push(rest);
    }
    groups.reverse();
    groups.push(tail);
    let sign = if whole < 0 { "-" } else { "" };
    format!("{sign}₹{}", groups.join(","))
}

/// Build the ranked recommendation list for a deduction breakdown
pub fn recommend(
    profile: &UserProfile,
    deductions: &DeductionBreakdown,
    rules: &TaxRules,
) -> Vec<Recommendation> {
    let limits = &rules.limits;
    let mut out = Vec::new();

    let gap_80c = (limits.sec_80c - deductions.allowed(TaxSection::Sec80C)).max(0.0);
    if gap_80c > GAP_EPSILON {
        let monthly = gap_80c / TOP_UP_HORIZON_MONTHS;
        let rec = if prefers_equity(profile) {
            Recommendation {
                kind: RecommendationKind::EquityLinkedSavings,
                title: "Start SIP in ELSS".to_string(),
                description: format!(
                    "Begin a monthly SIP of {} in a tax-saving ELSS fund to use the remaining {} of Section 80C, with a 3-year lock-in and market-linked returns.",
                    format_rupees(monthly),
                    format_rupees(gap_80c)
                ),
                section: TaxSection::Sec80C,
                amount: gap_80c,
                monthly_amount: Some(monthly),
            }
        } else {
            Recommendation {
                kind: RecommendationKind::CapitalProtection,
                title: "Invest in PPF".to_string(),
                description: format!(
                    "Allocate {} monthly to the Public Provident Fund for safe, tax-free returns covering the remaining {} of Section 80C.",
                    format_rupees(monthly),
                    format_rupees(gap_80c)
                ),
                section: TaxSection::Sec80C,
                amount: gap_80c,
                monthly_amount: Some(monthly),
            }
        };
        out.push(rec);
    }

    if gap_80c > FAMILY_GAP_THRESHOLD {
        out.push(Recommendation {
            kind: RecommendationKind::FamilySavings,
            title: "Open a Sukanya Samriddhi account".to_string(),
            description: format!(
                "If you have a daughter under 10, Sukanya Samriddhi Yojana deposits also count towards the {} still open under Section 80C.",
                format_rupees(gap_80c)
            ),
            section: TaxSection::Sec80C,
            amount: gap_80c,
            monthly_amount: None,
        });
    }

    let cap_80d = limits.health_cap(profile.age);
    let allowed_80d = deductions.allowed(TaxSection::Sec80D);
    if allowed_80d < cap_80d {
        let gap_80d = cap_80d - allowed_80d;
        out.push(Recommendation {
            kind: RecommendationKind::HealthInsuranceTopUp,
            title: "Top up health insurance".to_string(),
            description: format!(
                "Add {} of health cover premium for yourself and family to claim the full Section 80D limit of {}.",
                format_rupees(gap_80d),
                format_rupees(cap_80d)
            ),
            section: TaxSection::Sec80D,
            amount: gap_80d,
            monthly_amount: None,
        });
    }

    let allowed_nps = deductions.allowed(TaxSection::Sec80Ccd1B);
    if allowed_nps < limits.sec_80ccd_1b {
        let gap_nps = limits.sec_80ccd_1b - allowed_nps;
        let monthly = gap_nps / TOP_UP_HORIZON_MONTHS;
        out.push(Recommendation {
            kind: RecommendationKind::RetirementTopUp,
            title: "Contribute to NPS".to_string(),
            description: format!(
                "Contribute {} a month to NPS Tier 1 to use the additional {} deduction under Section 80CCD(1B).",
                format_rupees(monthly),
                format_rupees(gap_nps)
            ),
            section: TaxSection::Sec80Ccd1B,
            amount: gap_nps,
            monthly_amount: Some(monthly),
        });
    }

    out
}
