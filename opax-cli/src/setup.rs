use anyhow::{bail, Result};
use opax_core::{RiskAppetite, UserProfile};
use std::io::{self, BufRead, Write};
use std::str::FromStr;

use crate::state::{financial_year_for, profile_path, write_profile};

const MAX_ATTEMPTS: usize = 3;

fn prompt(input: &mut impl BufRead, label: &str) -> Result<String> {
    print!("{}: ", label);
    io::stdout().flush().ok();
    let mut s = String::new();
    if input.read_line(&mut s)? == 0 {
        bail!("input closed while reading {label}");
    }
    Ok(s.trim().to_string())
}

/// Re-ask until the answer parses; blank takes `default` when there is one
fn prompt_parsed<T: FromStr>(
    input: &mut impl BufRead,
    label: &str,
    default: Option<T>,
) -> Result<T>
where
    T::Err: std::fmt::Display,
{
    let mut default = default;
    for _ in 0..MAX_ATTEMPTS {
        let answer = prompt(input, label)?;
        if answer.is_empty() {
            if let Some(d) = default.take() {
                return Ok(d);
            }
            println!("  a value is required");
            continue;
        }
        match answer.replace(',', "").parse::<T>() {
            Ok(v) => return Ok(v),
            Err(e) => println!("  {e}"),
        }
    }
    bail!("no valid answer for {label} after {MAX_ATTEMPTS} attempts")
}

fn read_profile_answers(input: &mut impl BufRead, financial_year: &str) -> Result<UserProfile> {
    let name = prompt(input, "Your name (optional)")?;
    let salary: f64 = prompt_parsed(input, "Gross annual salary (INR)", None)?;
    let age: u32 = prompt_parsed(input, "Age", None)?;
    let risk: RiskAppetite = prompt_parsed(
        input,
        "Risk appetite [conservative/moderate/aggressive] (default: moderate)",
        Some(RiskAppetite::Moderate),
    )?;
    let fy: String = prompt_parsed(
        input,
        &format!("Financial year (default: {financial_year})"),
        Some(financial_year.to_string()),
    )?;

    let mut profile = UserProfile::new(salary, age, risk, fy);
    if !name.is_empty() {
        profile.name = Some(name);
    }
    profile.validate()?;
    Ok(profile)
}

pub fn run_setup() -> Result<()> {
    println!("OPAX setup\n");
    let fy = financial_year_for(chrono::Local::now().date_naive());
    let stdin = io::stdin();
    let profile = read_profile_answers(&mut stdin.lock(), &fy)?;

    let path = profile_path()?;
    write_profile(&profile, &path)?;

    println!("\nWrote:");
    println!("- {}", path.display());

    println!("\nNext recommended steps:");
    println!("- opax init                           (optional, writes ~/.opax/config.toml)");
    println!("- opax analyze --csv statement.csv");
    println!("- opax what-if --csv statement.csv --sec-80c 50000");

    Ok(())
}
