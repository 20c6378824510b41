//! Process-wide analysis context.
//!
//! Built once at startup from validated rules and the instrument catalog, then
//! shared by reference across requests. Everything inside is read-only except
//! the classifier's catalog index, which is published exactly once.

use opax_core::{
    AnalysisResult, InstrumentCatalog, OpaxError, Result, TaxRules, Transaction, UserProfile,
};
use std::path::Path;
use std::sync::Arc;

use crate::classifier::{ClassifierConfig, InstrumentClassifier};
use crate::embedder::Embedder;
use crate::tax_engine::{ExtraInvestments, TaxEngine};

/// Enriched transactions plus the computed result for one request
#[derive(Debug, Clone)]
pub struct Analysis {
    pub transactions: Vec<Transaction>,
    pub result: AnalysisResult,
}

impl Analysis {
    /// Transactions the classifier recognised as tax-saving investments
    pub fn discovered_investments(&self) -> impl Iterator<Item = &Transaction> {
        self.transactions.iter().filter(|t| t.is_tax_saving)
    }
}

pub struct AnalysisContext {
    rules: Arc<TaxRules>,
    engine: TaxEngine,
    classifier: InstrumentClassifier,
}

impl AnalysisContext {
    pub fn new(
        rules: TaxRules,
        catalog: InstrumentCatalog,
        embedder: Box<dyn Embedder>,
        config: ClassifierConfig,
    ) -> Result<Self> {
        rules.validate()?;
        if !(0.0..=1.0).contains(&config.similarity_threshold) {
            return Err(OpaxError::configuration(format!(
                "similarity_threshold must be within 0..=1, got {}",
                config.similarity_threshold
            )));
        }

        let rules = Arc::new(rules);
        Ok(Self {
            engine: TaxEngine::new(rules.clone()),
            classifier: InstrumentClassifier::new(Arc::new(catalog), embedder, config),
            rules,
        })
    }

    /// Load rules and catalog from disk
    pub fn load(
        rules_path: impl AsRef<Path>,
        catalog_path: impl AsRef<Path>,
        embedder: Box<dyn Embedder>,
        config: ClassifierConfig,
    ) -> Result<Self> {
        let rules = TaxRules::load(rules_path)?;
        let catalog = InstrumentCatalog::load(catalog_path)?;
        Self::new(rules, catalog, embedder, config)
    }

    /// Build the catalog index eagerly so the first request pays no startup cost
    pub fn warm_up(&self) -> Result<()> {
        self.classifier.warm_up()
    }

    pub fn rules(&self) -> &TaxRules {
        &self.rules
    }

    pub fn engine(&self) -> &TaxEngine {
        &self.engine
    }

    pub fn classifier(&self) -> &InstrumentClassifier {
        &self.classifier
    }

    fn prepare(&self, profile: &UserProfile, transactions: Vec<Transaction>) -> Result<Vec<Transaction>> {
        profile.validate()?;
        if transactions.is_empty() {
            return Err(OpaxError::invalid_input("no transactions to analyze"));
        }
        if let Some(bad) = transactions
            .iter()
            .find(|t| !t.amount.is_finite() || t.amount < 0.0)
        {
            return Err(OpaxError::invalid_input(format!(
                "transaction '{}' on {} has invalid amount {}",
                bad.description, bad.date, bad.amount
            )));
        }
        self.classifier.process_transactions(transactions)
    }

    /// Classify the statement and compare both regimes
    pub fn analyze(&self, profile: &UserProfile, transactions: Vec<Transaction>) -> Result<Analysis> {
        let transactions = self.prepare(profile, transactions)?;
        let result = self.engine.analyze_profile(profile, &transactions);
        Ok(Analysis { transactions, result })
    }

    /// Like [`analyze`](Self::analyze), with hypothetical extra investments
    pub fn what_if(
        &self,
        profile: &UserProfile,
        transactions: Vec<Transaction>,
        extra: &ExtraInvestments,
    ) -> Result<Analysis> {
        let transactions = self.prepare(profile, transactions)?;
        let result = self.engine.what_if(profile, &transactions, extra);
        Ok(Analysis { transactions, result })
    }
}
