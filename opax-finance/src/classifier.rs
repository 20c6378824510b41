//! Semantic instrument classifier: maps transaction descriptions onto the
//! instrument catalog by cosine similarity.
//!
//! The catalog index is built at most once per classifier, either eagerly via
//! [`InstrumentClassifier::warm_up`] or on first use. Concurrent first callers
//! block until a single build publishes the complete index; a failed build is
//! reported to the caller and retried on the next call rather than cached.

use once_cell::sync::OnceCell;
use opax_core::{InstrumentCatalog, OpaxError, Result, TaxSection, Transaction};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::embedder::{cosine_similarity, Embedder};

/// Minimum similarity for a description to count as an instrument match
pub const DEFAULT_SIMILARITY_THRESHOLD: f32 = 0.55;

/// Banking noise removed from descriptions before embedding
pub const DEFAULT_NOISE_TOKENS: [&str; 3] = ["upi", "netbanking", "ecs"];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClassifierConfig {
    pub similarity_threshold: f32,
    pub noise_tokens: Vec<String>,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            noise_tokens: DEFAULT_NOISE_TOKENS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// The catalog entry a description matched
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InstrumentMatch {
    pub catalog_index: usize,
    pub instrument_name: String,
    pub provider: String,
    pub category: String,
    pub section: TaxSection,
}

/// Outcome of classifying one description. `score` is the best similarity
/// found even when nothing cleared the threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Classification {
    pub score: f32,
    pub instrument: Option<InstrumentMatch>,
}

impl Classification {
    pub fn is_match(&self) -> bool {
        self.instrument.is_some()
    }
}

/// Embedding vectors for every catalog text. `owners[i]` is the catalog
/// position `vectors[i]` was embedded from; an entry's texts are contiguous
/// and entries stay in catalog order.
#[derive(Debug, Clone)]
pub struct CatalogIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
    owners: Vec<usize>,
}

impl CatalogIndex {
    pub fn build(catalog: &InstrumentCatalog, embedder: &dyn Embedder) -> Result<Self> {
        let mut texts = Vec::new();
        let mut owners = Vec::new();
        for (i, entry) in catalog.entries().iter().enumerate() {
            for text in entry.embedding_texts() {
                texts.push(text);
                owners.push(i);
            }
        }

        let vectors = embedder.embed_batch(&texts)?;
        if vectors.len() != texts.len() {
            return Err(OpaxError::classification(format!(
                "embedder returned {} vectors for {} catalog texts",
                vectors.len(),
                texts.len()
            )));
        }

        let dimension = embedder.dimension();
        for (i, v) in vectors.iter().enumerate() {
            if v.len() != dimension {
                return Err(OpaxError::classification(format!(
                    "catalog vector {i} has dimension {}, expected {dimension}",
                    v.len()
                )));
            }
        }

        Ok(Self {
            dimension,
            vectors,
            owners,
        })
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Catalog position and score of the most similar vector. Ties go to the
    /// earliest vector, so catalog order is the tie-break.
    pub fn best_match(&self, query: &[f32]) -> Result<(usize, f32)> {
        if query.len() != self.dimension {
            return Err(OpaxError::classification(format!(
                "query vector has dimension {}, expected {}",
                query.len(),
                self.dimension
            )));
        }

        let mut best: Option<(usize, f32)> = None;
        for (i, v) in self.vectors.iter().enumerate() {
            let score = cosine_similarity(query, v);
            match best {
                Some((_, best_score)) if score <= best_score => {}
                _ => best = Some((i, score)),
            }
        }

        best.map(|(i, score)| (self.owners[i], score))
            .ok_or_else(|| OpaxError::classification("catalog index is empty"))
    }
}

pub struct InstrumentClassifier {
    catalog: Arc<InstrumentCatalog>,
    embedder: Box<dyn Embedder>,
    config: ClassifierConfig,
    index: OnceCell<CatalogIndex>,
}

impl InstrumentClassifier {
    pub fn new(
        catalog: Arc<InstrumentCatalog>,
        embedder: Box<dyn Embedder>,
        config: ClassifierConfig,
    ) -> Self {
        Self {
            catalog,
            embedder,
            config,
            index: OnceCell::new(),
        }
    }

    pub fn config(&self) -> &ClassifierConfig {
        &self.config
    }

    pub fn catalog(&self) -> &InstrumentCatalog {
        &self.catalog
    }

    /// Build the catalog index now instead of on the first request
    pub fn warm_up(&self) -> Result<()> {
        self.index().map(|_| ())
    }

    pub fn is_warm(&self) -> bool {
        self.index.get().is_some()
    }

    fn index(&self) -> Result<&CatalogIndex> {
        self.index.get_or_try_init(|| {
            let index = CatalogIndex::build(&self.catalog, self.embedder.as_ref())?;
            tracing::info!(
                entries = self.catalog.len(),
                vectors = index.len(),
                dimension = index.dimension(),
                "built instrument catalog index"
            );
            Ok(index)
        })
    }

    /// Lowercase, then remove the noise denylist by plain substring replacement
    pub fn strip_noise(&self, description: &str) -> String {
        self.config
            .noise_tokens
            .iter()
            .fold(description.to_lowercase(), |acc, token| {
                acc.replace(token.to_lowercase().as_str(), "")
            })
    }

    pub fn classify(&self, description: &str) -> Result<Classification> {
        let index = self.index()?;
        let cleaned = self.strip_noise(description);
        let query = self.embedder.embed(&cleaned)?;
        let (best_idx, score) = index.best_match(&query)?;

        if score < self.config.similarity_threshold {
            tracing::debug!(description, score, "no instrument match");
            return Ok(Classification {
                score,
                instrument: None,
            });
        }

        let entry = self.catalog.get(best_idx).ok_or_else(|| {
            OpaxError::classification(format!("index entry {best_idx} has no catalog row"))
        })?;
        tracing::debug!(
            description,
            score,
            instrument = %entry.instrument_name,
            section = %entry.section,
            "instrument match"
        );

        Ok(Classification {
            score,
            instrument: Some(InstrumentMatch {
                catalog_index: best_idx,
                instrument_name: entry.instrument_name.clone(),
                provider: entry.provider.clone(),
                category: entry.category.clone(),
                section: entry.section,
            }),
        })
    }

    /// Enrichment pass. Takes the list by value and hands it back with
    /// matched transactions tagged; length and order are preserved. On error
    /// the list is dropped so no caller sees a half-enriched batch.
    pub fn process_transactions(&self, mut transactions: Vec<Transaction>) -> Result<Vec<Transaction>> {
        let mut matched = 0usize;
        for txn in transactions.iter_mut() {
            let classification = self.classify(&txn.description)?;
            if let Some(instrument) = classification.instrument {
                txn.mark_tax_saving(instrument.section, instrument.category);
                matched += 1;
            }
        }
        tracing::debug!(total = transactions.len(), matched, "classified transactions");
        Ok(transactions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::embedder::HashingEmbedder;
    use chrono::NaiveDate;
    use opax_core::InstrumentCatalogEntry;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const CATALOG: &str = "instrument_name,provider,category,section\n\
        ELSS Tax Saver Fund,HDFC Mutual Fund,ELSS,80C\n\
        LIC Premium,LIC,Life Insurance,80C\n\
        Health Insurance Premium,Star Health,Health Insurance,80D\n\
        NPS Tier 1 Contribution,Protean eGov,NPS,80CCD_1B\n\
        Home Loan EMI,HDFC Bank,Home Loan,24B\n";

    fn classifier() -> InstrumentClassifier {
        let catalog = InstrumentCatalog::from_reader(CATALOG.as_bytes()).unwrap();
        InstrumentClassifier::new(
            Arc::new(catalog),
            Box::new(HashingEmbedder::default()),
            ClassifierConfig::default(),
        )
    }

    fn txn(desc: &str, amount: f64) -> Transaction {
        Transaction::new(NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(), desc, amount)
    }

    /// Maps every text to the same vector, so every catalog entry ties.
    struct ConstantEmbedder;

    impl Embedder for ConstantEmbedder {
        fn dimension(&self) -> usize {
            2
        }
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct FailingEmbedder {
        calls: Arc<AtomicUsize>,
    }

    impl Embedder for FailingEmbedder {
        fn dimension(&self) -> usize {
            8
        }
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(OpaxError::classification("model weights missing"))
        }
    }

    struct WrongDimensionEmbedder;

    impl Embedder for WrongDimensionEmbedder {
        fn dimension(&self) -> usize {
            4
        }
        fn embed(&self, _text: &str) -> Result<Vec<f32>> {
            Ok(vec![1.0, 0.0])
        }
    }

    #[test]
    fn test_matches_health_insurance() {
        let c = classifier();
        let result = c.classify("star health insurance renewal").unwrap();
        let m = result.instrument.expect("should match");
        assert_eq!(m.section, TaxSection::Sec80D);
        assert_eq!(m.category, "Health Insurance");
        assert_eq!(m.provider, "Star Health");
        assert!(result.score >= DEFAULT_SIMILARITY_THRESHOLD);
    }

    #[test]
    fn test_noise_tokens_are_stripped() {
        let c = classifier();
        assert_eq!(c.strip_noise("upi nps tier 1 contribution"), " nps tier 1 contribution");
        assert_eq!(c.strip_noise("NETBANKING lic premium ecs"), " lic premium ");

        let result = c.classify("upi nps tier 1 contribution").unwrap();
        assert_eq!(result.instrument.unwrap().section, TaxSection::Sec80Ccd1B);
    }

    #[test]
    fn test_shopping_is_not_a_match_but_reports_score() {
        let c = classifier();
        let result = c.classify("amazon shopping").unwrap();
        assert!(!result.is_match());
        assert!(result.score < DEFAULT_SIMILARITY_THRESHOLD);
        assert!(result.score.is_finite());
    }

    #[test]
    fn test_bank_narration_matches_instrument() {
        let c = classifier();
        // cleaned form of "UPI/DR/4012/LIC OF INDIA/Premium"
        let result = c.classify("upi dr 4012 lic of india premium").unwrap();
        let m = result.instrument.expect("should match");
        assert_eq!(m.instrument_name, "LIC Premium");
        assert_eq!(m.section, TaxSection::Sec80C);
    }

    #[test]
    fn test_bank_name_alone_is_not_an_instrument() {
        let c = classifier();
        let result = c.classify("hdfc bank credit card payment").unwrap();
        assert!(!result.is_match(), "score {}", result.score);
    }

    #[test]
    fn test_classification_is_deterministic() {
        let c = classifier();
        let a = c.classify("hdfc elss tax saver sip").unwrap();
        let b = c.classify("hdfc elss tax saver sip").unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_threshold_is_configurable() {
        let catalog = InstrumentCatalog::from_reader(CATALOG.as_bytes()).unwrap();
        let strict = InstrumentClassifier::new(
            Arc::new(catalog),
            Box::new(HashingEmbedder::default()),
            ClassifierConfig {
                similarity_threshold: 0.99,
                ..ClassifierConfig::default()
            },
        );
        assert!(!strict.classify("star health insurance renewal").unwrap().is_match());
    }

    #[test]
    fn test_ties_go_to_first_catalog_entry() {
        let catalog = InstrumentCatalog::from_reader(CATALOG.as_bytes()).unwrap();
        let c = InstrumentClassifier::new(
            Arc::new(catalog),
            Box::new(ConstantEmbedder),
            ClassifierConfig::default(),
        );
        let m = c.classify("anything at all").unwrap().instrument.unwrap();
        assert_eq!(m.catalog_index, 0);
        assert_eq!(m.instrument_name, "ELSS Tax Saver Fund");
    }

    #[test]
    fn test_process_transactions_enriches_in_order() {
        let c = classifier();
        let txns = vec![
            txn("lic premium xyz", 50000.0),
            txn("amazon shopping", 5000.0),
            txn("star health insurance renewal", 20000.0),
        ];
        let out = c.process_transactions(txns).unwrap();
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].description, "lic premium xyz");
        assert_eq!(out[0].tax_section, Some(TaxSection::Sec80C));
        assert!(out[0].is_tax_saving);
        assert!(!out[1].is_tax_saving);
        assert_eq!(out[1].tax_section, None);
        assert_eq!(out[1].category, None);
        assert_eq!(out[2].tax_section, Some(TaxSection::Sec80D));
    }

    #[test]
    fn test_backend_failure_is_surfaced_not_swallowed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let catalog = InstrumentCatalog::from_reader(CATALOG.as_bytes()).unwrap();
        let c = InstrumentClassifier::new(
            Arc::new(catalog),
            Box::new(FailingEmbedder { calls: calls.clone() }),
            ClassifierConfig::default(),
        );

        assert!(matches!(c.warm_up(), Err(OpaxError::ClassificationUnavailable(_))));
        assert!(!c.is_warm());
        assert!(matches!(
            c.classify("lic premium"),
            Err(OpaxError::ClassificationUnavailable(_))
        ));
        assert!(c.process_transactions(vec![txn("lic premium", 1.0)]).is_err());
        // each call retried the build
        assert!(calls.load(Ordering::SeqCst) >= 3);
    }

    #[test]
    fn test_dimension_mismatch_fails_index_build() {
        let catalog = InstrumentCatalog::from_reader(CATALOG.as_bytes()).unwrap();
        let err = CatalogIndex::build(&catalog, &WrongDimensionEmbedder).unwrap_err();
        assert!(err.to_string().contains("dimension"), "{err}");
    }

    #[test]
    fn test_index_built_once_across_threads() {
        struct CountingEmbedder {
            inner: HashingEmbedder,
            batches: Arc<AtomicUsize>,
        }

        impl Embedder for CountingEmbedder {
            fn dimension(&self) -> usize {
                self.inner.dimension()
            }
            fn embed(&self, text: &str) -> Result<Vec<f32>> {
                self.inner.embed(text)
            }
            fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
                self.batches.fetch_add(1, Ordering::SeqCst);
                texts.iter().map(|t| self.inner.embed(t)).collect()
            }
        }

        let batches = Arc::new(AtomicUsize::new(0));
        let catalog = InstrumentCatalog::new(vec![InstrumentCatalogEntry {
            instrument_name: "LIC Premium".into(),
            provider: "LIC".into(),
            category: "Life Insurance".into(),
            section: TaxSection::Sec80C,
        }])
        .unwrap();
        let c = Arc::new(InstrumentClassifier::new(
            Arc::new(catalog),
            Box::new(CountingEmbedder {
                inner: HashingEmbedder::default(),
                batches: batches.clone(),
            }),
            ClassifierConfig::default(),
        ));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let c = c.clone();
                std::thread::spawn(move || c.classify("lic premium").unwrap())
            })
            .collect();
        for h in handles {
            assert!(h.join().unwrap().is_match());
        }
        assert_eq!(batches.load(Ordering::SeqCst), 1);
    }
}
