use anyhow::{Context, Result};
use opax_finance::{
    ClassifierConfig, DEFAULT_DIMENSION, DEFAULT_NOISE_TOKENS, DEFAULT_SIMILARITY_THRESHOLD,
};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::state::ensure_opax_home;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub data: DataSection,
    pub classifier: ClassifierSection,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DataSection {
    /// Tax rules JSON for the financial year being analyzed
    pub rules_path: PathBuf,
    /// Instrument catalog CSV
    pub catalog_path: PathBuf,
}

/// Which embedder feeds the classifier
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// all-MiniLM-L6-v2 sentence model
    #[default]
    Model,
    /// Offline feature hashing
    Hashing,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ClassifierSection {
    pub backend: Backend,
    /// Where the sentence model is downloaded; relative to the config directory
    pub model_cache_dir: PathBuf,
    pub similarity_threshold: f32,
    /// Hashing backend only
    pub dimension: usize,
    pub noise_tokens: Vec<String>,
}

impl Default for DataSection {
    fn default() -> Self {
        Self {
            rules_path: PathBuf::from("data/tax_rules.json"),
            catalog_path: PathBuf::from("data/tax_instruments.csv"),
        }
    }
}

impl Default for ClassifierSection {
    fn default() -> Self {
        Self {
            backend: Backend::default(),
            model_cache_dir: PathBuf::from("models"),
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            dimension: DEFAULT_DIMENSION,
            noise_tokens: DEFAULT_NOISE_TOKENS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl ClassifierSection {
    pub fn classifier_config(&self) -> ClassifierConfig {
        ClassifierConfig {
            similarity_threshold: self.similarity_threshold,
            noise_tokens: self.noise_tokens.clone(),
        }
    }
}

impl Config {
    /// Anchor relative paths. Data files resolve to the first base directory
    /// where they exist, falling back to the first base; the model cache always
    /// lives under the first base.
    pub fn resolve_paths(&mut self, bases: &[PathBuf]) {
        let Some(primary) = bases.first() else { return };
        for path in [&mut self.data.rules_path, &mut self.data.catalog_path] {
            if path.is_relative() {
                let found = bases.iter().map(|b| b.join(&*path)).find(|p| p.exists());
                *path = found.unwrap_or_else(|| primary.join(&*path));
            }
        }
        if self.classifier.model_cache_dir.is_relative() {
            self.classifier.model_cache_dir = primary.join(&self.classifier.model_cache_dir);
        }
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_opax_home()?.join("config.toml"))
}

/// ~/.opax first, then the directory holding the executable
fn base_dirs() -> Result<Vec<PathBuf>> {
    let mut bases = vec![ensure_opax_home()?];
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(Path::to_path_buf));
    if let Some(dir) = exe_dir {
        bases.push(dir);
    }
    Ok(bases)
}

/// Config from ~/.opax/config.toml with every path made absolute
pub fn load_config() -> Result<Config> {
    let mut cfg = load_config_from(&config_path()?)?;
    cfg.resolve_paths(&base_dirs()?);
    Ok(cfg)
}

/// Missing file means defaults
pub fn load_config_from(path: &Path) -> Result<Config> {
    if !path.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    toml::from_str(&s).with_context(|| format!("parse {}", path.display()))
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<()> {
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(path, s).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    let mut cfg = Config::default();
    cfg.resolve_paths(&base_dirs()?);
    save_config_to(&cfg, &p)?;
    println!("Wrote {}", p.display());
    Ok(())
}
