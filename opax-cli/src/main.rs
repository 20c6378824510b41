use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use opax_core::{TaxRules, TaxSection};
use opax_finance::{Analysis, AnalysisContext, Embedder, ExtraInvestments, HashingEmbedder};
use opax_ingest::parse_bank_csv;
use std::path::{Path, PathBuf};
use tracing::debug;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

mod config;
mod report;
mod setup;
mod state;

use config::{Backend, Config};

#[derive(Parser, Debug)]
#[command(
    name = "opax",
    version,
    long_version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("OPAX_BUILD_SHA"), ")"),
    about = "Find tax-saving investments in bank statements and compare Indian tax regimes"
)]
struct Cli {
    /// error, warn, info, debug or trace. RUST_LOG takes precedence when set.
    #[arg(long, global = true, default_value_t = LevelFilter::WARN)]
    log_level: LevelFilter,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Write a default ~/.opax/config.toml
    Init,

    /// Interactive profile capture into ~/.opax/profile.json
    Setup,

    /// Classify a bank statement and compare old vs new regime
    Analyze {
        /// Bank statement CSV
        #[arg(long)]
        csv: PathBuf,

        /// Profile JSON (default: ~/.opax/profile.json)
        #[arg(long)]
        profile: Option<PathBuf>,

        /// Print the full result as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show which catalog instrument each description matches
    Classify {
        #[arg(required = true)]
        descriptions: Vec<String>,
    },

    /// Re-run the analysis with hypothetical extra investments
    WhatIf {
        #[arg(long)]
        csv: PathBuf,

        #[arg(long)]
        profile: Option<PathBuf>,

        /// Extra Section 80C investment
        #[arg(long = "sec-80c")]
        sec_80c: Option<f64>,

        /// Extra health insurance premium (Section 80D)
        #[arg(long = "sec-80d")]
        sec_80d: Option<f64>,

        /// Extra NPS contribution (Section 80CCD(1B))
        #[arg(long)]
        nps: Option<f64>,

        /// Extra home loan interest (Section 24(B))
        #[arg(long)]
        home_loan: Option<f64>,

        #[arg(long)]
        json: bool,
    },

    /// Validate and summarize a tax rules file
    Rules {
        /// Rules JSON (default: [data] rules_path from config)
        #[arg(long)]
        rules: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.log_level);
    debug!("Log level set to {}", cli.log_level.to_string().to_lowercase());

    match cli.command {
        Command::Init => config::init_config()?,

        Command::Setup => setup::run_setup()?,

        Command::Analyze { csv, profile, json } => {
            let cfg = config::load_config()?;
            let ctx = build_context(&cfg)?;
            let analysis = run_analysis(&ctx, &csv, profile.as_deref(), None)?;
            print_analysis(&analysis, json)?;
        }

        Command::Classify { descriptions } => {
            let cfg = config::load_config()?;
            let ctx = build_context(&cfg)?;
            for description in &descriptions {
                let c = ctx
                    .classifier()
                    .classify(description)
                    .with_context(|| format!("classifying '{description}'"))?;
                println!("{}", report::render_classification(description, &c));
            }
        }

        Command::WhatIf {
            csv,
            profile,
            sec_80c,
            sec_80d,
            nps,
            home_loan,
            json,
        } => {
            let extra = extra_investments(sec_80c, sec_80d, nps, home_loan)?;
            let cfg = config::load_config()?;
            let ctx = build_context(&cfg)?;
            let analysis = run_analysis(&ctx, &csv, profile.as_deref(), Some(&extra))?;
            print_analysis(&analysis, json)?;
        }

        Command::Rules { rules } => {
            let path = match rules {
                Some(p) => p,
                None => config::load_config()?.data.rules_path,
            };
            let rules = TaxRules::load(&path)
                .with_context(|| format!("loading rules from {}", path.display()))?;
            println!("{} is valid\n", path.display());
            print!("{}", report::render_rules(&rules));
        }
    }

    Ok(())
}

fn build_embedder(cfg: &Config) -> Result<Box<dyn Embedder>> {
    match cfg.classifier.backend {
        Backend::Hashing => Ok(Box::new(HashingEmbedder::new(cfg.classifier.dimension)?)),
        #[cfg(feature = "fastembed")]
        Backend::Model => {
            let model = opax_finance::FastEmbedder::new(&cfg.classifier.model_cache_dir)
                .context("loading the sentence model (backend = \"hashing\" runs offline)")?;
            Ok(Box::new(model))
        }
        #[cfg(not(feature = "fastembed"))]
        Backend::Model => bail!(
            "this build has no sentence model; set [classifier] backend = \"hashing\" in ~/.opax/config.toml"
        ),
    }
}

fn build_context(cfg: &Config) -> Result<AnalysisContext> {
    debug!(backend = ?cfg.classifier.backend, "building classifier");
    let ctx = AnalysisContext::load(
        &cfg.data.rules_path,
        &cfg.data.catalog_path,
        build_embedder(cfg)?,
        cfg.classifier.classifier_config(),
    )
    .with_context(|| {
        format!(
            "loading {} and {} (configure [data] in ~/.opax/config.toml)",
            cfg.data.rules_path.display(),
            cfg.data.catalog_path.display()
        )
    })?;
    ctx.warm_up()?;
    Ok(ctx)
}

fn run_analysis(
    ctx: &AnalysisContext,
    csv: &Path,
    profile: Option<&Path>,
    extra: Option<&ExtraInvestments>,
) -> Result<Analysis> {
    if !csv.exists() {
        bail!("CSV not found: {} (pass --csv <path>)", csv.display());
    }
    let profile = state::read_profile(profile)?;
    let txns = parse_bank_csv(csv)?;
    debug!(transactions = txns.len(), "parsed {}", csv.display());

    let analysis = match extra {
        Some(extra) => ctx.what_if(&profile, txns, extra)?,
        None => ctx.analyze(&profile, txns)?,
    };
    Ok(analysis)
}

fn extra_investments(
    sec_80c: Option<f64>,
    sec_80d: Option<f64>,
    nps: Option<f64>,
    home_loan: Option<f64>,
) -> Result<ExtraInvestments> {
    let mut extra = ExtraInvestments::new();
    for (section, amount) in [
        (TaxSection::Sec80C, sec_80c),
        (TaxSection::Sec80D, sec_80d),
        (TaxSection::Sec80Ccd1B, nps),
        (TaxSection::Sec24B, home_loan),
    ] {
        let Some(amount) = amount else { continue };
        if !amount.is_finite() || amount < 0.0 {
            bail!("extra {} investment must be a non-negative amount, got {amount}", section);
        }
        extra.insert(section, amount);
    }
    if extra.is_empty() {
        bail!("nothing to simulate: pass at least one of --sec-80c, --sec-80d, --nps, --home-loan");
    }
    Ok(extra)
}

fn print_analysis(analysis: &Analysis, json: bool) -> Result<()> {
    if json {
        let out = serde_json::json!({
            "transactions": analysis.transactions,
            "result": analysis.result,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
    } else {
        print!("{}", report::render_analysis(analysis));
    }
    Ok(())
}

pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        Some(_) => EnvFilter::from_default_env(),
        None => {
            // default level applies to this workspace only
            let directives = [
                env!("CARGO_CRATE_NAME"),
                "opax_core",
                "opax_ingest",
                "opax_finance",
            ]
            .iter()
            .map(|krate| format!("{krate}={level}"))
            .collect::<Vec<_>>()
            .join(",");
            EnvFilter::new(directives)
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
