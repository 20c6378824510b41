//! Embeds the build revision as OPAX_BUILD_SHA for `opax --version`.
//!
//! Packagers building from a tarball set OPAX_BUILD_SHA themselves; otherwise
//! the revision comes from git, suffixed with "-dirty" for uncommitted changes.

use std::path::{Path, PathBuf};
use std::process::Command;

const OVERRIDE_VAR: &str = "OPAX_BUILD_SHA";

fn git(repo: &Path, args: &[&str]) -> Option<String> {
    let out = Command::new("git").arg("-C").arg(repo).args(args).output().ok()?;
    out.status
        .success()
        .then(|| String::from_utf8_lossy(&out.stdout).trim().to_string())
}

fn revision(repo: &Path) -> Option<String> {
    let sha = git(repo, &["rev-parse", "--short=10", "HEAD"]).filter(|s| !s.is_empty())?;
    let dirty = git(repo, &["status", "--porcelain", "--untracked-files=no"])
        .is_some_and(|status| !status.is_empty());
    Some(if dirty { format!("{sha}-dirty") } else { sha })
}

fn main() {
    println!("cargo:rerun-if-env-changed={OVERRIDE_VAR}");

    let revision = match std::env::var(OVERRIDE_VAR) {
        Ok(pinned) if !pinned.trim().is_empty() => pinned.trim().to_string(),
        _ => {
            let manifest_dir = PathBuf::from(std::env::var_os("CARGO_MANIFEST_DIR").unwrap_or_default());
            let workspace = manifest_dir.parent().unwrap_or(&manifest_dir).to_path_buf();
            for watched in [".git/HEAD", ".git/index"] {
                let path = workspace.join(watched);
                if path.exists() {
                    println!("cargo:rerun-if-changed={}", path.display());
                }
            }
            revision(&workspace).unwrap_or_else(|| "unknown".to_string())
        }
    };

    println!("cargo:rustc-env={OVERRIDE_VAR}={revision}");
}
