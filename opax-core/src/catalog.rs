//! Catalog of known tax-saving instruments (`tax_instruments.csv`).
//!
//! CSV columns: instrument_name,provider,category,section

use serde::{Deserialize, Serialize};
use std::io::Read;
use std::path::Path;

use crate::error::{OpaxError, Result};
use crate::finance::TaxSection;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct InstrumentCatalogEntry {
    pub instrument_name: String,
    pub provider: String,
    pub category: String,
    pub section: TaxSection,
}

impl InstrumentCatalogEntry {
    /// Texts the entry is embedded from, most specific first: the full
    /// name + provider + category line, then the bare name, then name + category.
    pub fn embedding_texts(&self) -> Vec<String> {
        vec![
            format!("{} {} {}", self.instrument_name, self.provider, self.category),
            self.instrument_name.clone(),
            format!("{} {}", self.instrument_name, self.category),
        ]
    }
}

#[derive(Debug, Deserialize)]
struct CatalogRow {
    instrument_name: String,
    #[serde(default)]
    provider: String,
    #[serde(default)]
    category: String,
    section: String,
}

/// Ordered, immutable list of instruments. Position is the index key used by
/// the embedding index, so entries are never reordered after load.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InstrumentCatalog {
    entries: Vec<InstrumentCatalogEntry>,
}

impl InstrumentCatalog {
    pub fn new(entries: Vec<InstrumentCatalogEntry>) -> Result<Self> {
        if entries.is_empty() {
            return Err(OpaxError::configuration("instrument catalog is empty"));
        }
        Ok(Self { entries })
    }

    /// Parse catalog rows from any CSV source
    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut rdr = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);

        let mut entries = Vec::new();
        for (i, result) in rdr.deserialize::<CatalogRow>().enumerate() {
            // header is line 1
            let line = i + 2;
            let row = result
                .map_err(|e| OpaxError::configuration(format!("catalog line {line}: {e}")))?;
            if row.instrument_name.is_empty() {
                return Err(OpaxError::configuration(format!(
                    "catalog line {line}: instrument_name is empty"
                )));
            }
            let section: TaxSection = row
                .section
                .parse()
                .map_err(|e| OpaxError::configuration(format!("catalog line {line}: {e}")))?;
            entries.push(InstrumentCatalogEntry {
                instrument_name: row.instrument_name,
                provider: row.provider,
                category: row.category,
                section,
            });
        }

        Self::new(entries)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let file = std::fs::File::open(path).map_err(|e| {
            OpaxError::configuration(format!("opening catalog {}: {e}", path.display()))
        })?;
        let catalog = Self::from_reader(file)?;
        tracing::info!(path = %path.display(), entries = catalog.len(), "loaded instrument catalog");
        Ok(catalog)
    }

    pub fn entries(&self) -> &[InstrumentCatalogEntry] {
        &self.entries
    }

    pub fn get(&self, index: usize) -> Option<&InstrumentCatalogEntry> {
        self.entries.get(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
