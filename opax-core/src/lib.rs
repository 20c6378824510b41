//! opax-core: shared data contracts, typed tax rules and the instrument catalog

pub mod analysis;
pub mod catalog;
pub mod error;
pub mod finance;
pub mod rules;

pub use analysis::{
    AnalysisResult, DeductionAggregate, DeductionBreakdown, HealthMetrics, Recommendation,
    RecommendationKind, RegimeResult, TaxGaps,
};
pub use catalog::{InstrumentCatalog, InstrumentCatalogEntry};
pub use error::{OpaxError, Result};
pub use finance::{RiskAppetite, TaxSection, Transaction, UserProfile};
pub use rules::{Limits, PerRegime, Rebate, Regime, Slab, TaxRules, SENIOR_CITIZEN_AGE};
