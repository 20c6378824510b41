use anyhow::{bail, Context, Result};
use chrono::{Datelike, NaiveDate};
use opax_core::UserProfile;
use std::fs;
use std::path::{Path, PathBuf};

pub fn opax_home() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".opax"))
}

pub fn ensure_opax_home() -> Result<PathBuf> {
    let dir = opax_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}

pub fn profile_path() -> Result<PathBuf> {
    Ok(ensure_opax_home()?.join("profile.json"))
}

pub fn write_profile(profile: &UserProfile, path: &Path) -> Result<()> {
    let json = serde_json::to_string_pretty(profile)?;
    fs::write(path, json).with_context(|| format!("write {}", path.display()))?;
    Ok(())
}

/// Read a profile from `path`, or from ~/.opax/profile.json
pub fn read_profile(path: Option<&Path>) -> Result<UserProfile> {
    let p = match path {
        Some(p) => p.to_path_buf(),
        None => profile_path()?,
    };
    if !p.exists() {
        bail!("No profile found at {}. Run: opax setup", p.display());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    serde_json::from_str(&s).with_context(|| format!("parse {}", p.display()))
}

/// Indian financial year (April to March) containing `date`, e.g. "2024-25"
pub fn financial_year_for(date: NaiveDate) -> String {
    let start = if date.month() >= 4 {
        date.year()
    } else {
        date.year() - 1
    };
    format!("{}-{:02}", start, (start + 1) % 100)
}
