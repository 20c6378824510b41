//! Description normalization applied before classification.
//!
//! Narrations like "UPI/DR/4012/LIC OF INDIA/Premium" become
//! "upi dr 4012 lic of india premium".

use anyhow::Result;
use regex::Regex;

pub struct DescriptionCleaner {
    non_alnum: Regex,
    spaces: Regex,
}

impl DescriptionCleaner {
    pub fn new() -> Result<Self> {
        Ok(Self {
            non_alnum: Regex::new(r"[^a-zA-Z0-9\s]")?,
            spaces: Regex::new(r"\s+")?,
        })
    }

    /// Replace punctuation with spaces, collapse whitespace, trim and lowercase
    pub fn clean(&self, raw: &str) -> String {
        let stripped = self.non_alnum.replace_all(raw, " ");
        let collapsed = self.spaces.replace_all(&stripped, " ");
        collapsed.trim().to_lowercase()
    }
}

/// One-off convenience; parsers reuse a single [`DescriptionCleaner`].
pub fn clean_description(raw: &str) -> Result<String> {
    Ok(DescriptionCleaner::new()?.clean(raw))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strips_punctuation_and_case() {
        let out = clean_description("UPI/DR/4012/LIC OF INDIA/Premium").unwrap();
        assert_eq!(out, "upi dr 4012 lic of india premium");
    }

    #[test]
    fn test_collapses_whitespace() {
        let out = clean_description("  HDFC   ELSS\tTax-Saver  SIP ").unwrap();
        assert_eq!(out, "hdfc elss tax saver sip");
    }

    #[test]
    fn test_symbol_only_description_is_empty() {
        assert_eq!(clean_description("*** // ***").unwrap(), "");
    }
}
