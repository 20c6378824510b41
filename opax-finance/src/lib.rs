//! opax-finance: instrument classifier, dual-regime tax engine and recommendations

pub mod classifier;
pub mod context;
pub mod embedder;
pub mod recommendations;
pub mod tax_engine;

pub use classifier::{
    CatalogIndex, Classification, ClassifierConfig, InstrumentClassifier, InstrumentMatch,
    DEFAULT_NOISE_TOKENS, DEFAULT_SIMILARITY_THRESHOLD,
};
pub use context::{Analysis, AnalysisContext};
pub use embedder::{cosine_similarity, Embedder, HashingEmbedder, DEFAULT_DIMENSION};
#[cfg(feature = "fastembed")]
pub use embedder::FastEmbedder;
pub use recommendations::{format_rupees, recommend};
pub use tax_engine::{ExtraInvestments, TaxEngine};
