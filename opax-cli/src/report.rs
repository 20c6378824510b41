//! Human-readable rendering of analysis results.

use opax_core::{Regime, RegimeResult, TaxRules, TaxSection};
use opax_finance::{format_rupees, Analysis, Classification};

fn regime_block(r: &RegimeResult) -> String {
    let mut s = format!("{}\n", r.regime);
    s.push_str(&format!("  Taxable income : {}\n", format_rupees(r.taxable_income)));
    s.push_str(&format!("  Slab tax       : {}\n", format_rupees(r.gross_tax)));
    if r.rebate > 0.0 {
        s.push_str(&format!("  Rebate (87A)   : -{}\n", format_rupees(r.rebate)));
    }
    s.push_str(&format!("  Cess           : {}\n", format_rupees(r.cess)));
    s.push_str(&format!("  Total tax      : {}\n", format_rupees(r.final_tax)));
    s
}

pub fn render_analysis(analysis: &Analysis) -> String {
    let result = &analysis.result;
    let mut s = String::new();

    s.push_str(&format!("# Tax analysis (income {})\n\n", format_rupees(result.income)));

    let discovered: Vec<_> = analysis.discovered_investments().collect();
    s.push_str(&format!(
        "## Investments found ({} of {} transactions)\n\n",
        discovered.len(),
        analysis.transactions.len()
    ));
    if discovered.is_empty() {
        s.push_str("(none)\n");
    }
    for t in &discovered {
        let section = t.tax_section.map(|sec| sec.label()).unwrap_or("-");
        s.push_str(&format!(
            "- {} | {} | {} | {}\n",
            t.date,
            t.description,
            section,
            format_rupees(t.amount)
        ));
    }

    s.push_str("\n## Deductions\n\n");
    for section in TaxSection::ALL {
        let agg = result.deductions.section(section);
        s.push_str(&format!(
            "- {:<9} claimed {:>12}  allowed {:>12}\n",
            section.label(),
            format_rupees(agg.claimed),
            format_rupees(agg.allowed)
        ));
    }
    s.push_str(&format!(
        "- Standard  allowed {:>12}\n",
        format_rupees(result.deductions.standard_deduction.allowed)
    ));

    s.push_str("\n## Regimes\n\n");
    for regime in Regime::BOTH {
        s.push_str(&regime_block(result.regime(regime)));
    }
    s.push_str(&format!(
        "\nRecommended: {} (saves {})\n",
        result.recommended,
        format_rupees(result.savings)
    ));

    s.push_str(&format!(
        "\n## Tax health: {}/100 (80C {:.0}%, 80D {:.0}%)\n",
        result.health.score, result.health.utilization_80c, result.health.utilization_80d
    ));
    if result.gaps.total_tax_saving_opportunity > 0.0 {
        s.push_str(&format!(
            "Unused headroom: {} (80C {}, 80D {}, 80CCD(1B) {})\n",
            format_rupees(result.gaps.total_tax_saving_opportunity),
            format_rupees(result.gaps.sec_80c),
            format_rupees(result.gaps.sec_80d),
            format_rupees(result.gaps.sec_80ccd_1b)
        ));
    }

    if !result.recommendations.is_empty() {
        s.push_str("\n## Recommendations\n\n");
        for (i, rec) in result.recommendations.iter().enumerate() {
            s.push_str(&format!("{}. {}\n   {}\n", i + 1, rec.title, rec.description));
        }
    }

    s
}

pub fn render_classification(description: &str, c: &Classification) -> String {
    match &c.instrument {
        Some(m) => format!(
            "{description} -> {} / {} [{}] score={:.3}",
            m.instrument_name,
            m.provider,
            m.section.label(),
            c.score
        ),
        None => format!("{description} -> no match (best score={:.3})", c.score),
    }
}

pub fn render_rules(rules: &TaxRules) -> String {
    let mut s = String::new();
    if let Some(fy) = &rules.financial_year {
        s.push_str(&format!("Financial year: {fy}\n"));
    }
    for regime in Regime::BOTH {
        s.push_str(&format!(
            "\n{} (standard deduction {})\n",
            regime,
            format_rupees(rules.standard_deduction(regime))
        ));
        for slab in rules.slabs(regime) {
            let upper = slab.max.map(format_rupees).unwrap_or_else(|| "and above".to_string());
            s.push_str(&format!(
                "  {:>12} - {:<12} {:>5.1}%\n",
                format_rupees(slab.min),
                upper,
                slab.rate * 100.0
            ));
        }
        let rebate = rules.rebate(regime);
        s.push_str(&format!(
            "  Rebate 87A: up to {} when taxable income <= {}\n",
            format_rupees(rebate.max_rebate),
            format_rupees(rebate.max_income)
        ));
    }

    let limits = &rules.limits;
    s.push_str("\nSection limits\n");
    s.push_str(&format!("  80C       {}\n", format_rupees(limits.sec_80c)));
    s.push_str(&format!(
        "  80D       {} (below 60) / {} (60 and above)\n",
        format_rupees(limits.sec_80d.self_family_below_60),
        format_rupees(limits.sec_80d.self_family_above_60)
    ));
    s.push_str(&format!("  80CCD(1B) {}\n", format_rupees(limits.sec_80ccd_1b)));
    s.push_str(&format!("  24(B)     {}\n", format_rupees(limits.sec_24b)));
    s.push_str(&format!("\nCess: {}%\n", rules.cess_percent));
    s
}
