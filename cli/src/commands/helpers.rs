use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use std::io::{self, BufRead, Write};

pub(crate) fn today() -> NaiveDate {
    Local::now().date_naive()
}

pub(crate) fn parse_date(date_str: Option<String>) -> Result<NaiveDate> {
    match date_str {
        None => Ok(today()),
        Some(s) => parse_date_str(&s),
    }
}

pub(crate) fn parse_date_str(s: &str) -> Result<NaiveDate> {
    match s {
        "today" => Ok(today()),
        "yesterday" => Ok(today() - chrono::Duration::days(1)),
        "tomorrow" => Ok(today() + chrono::Duration::days(1)),
        _ => NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| {
            format!("Invalid date '{s}'. Use YYYY-MM-DD or today/yesterday/tomorrow")
        }),
    }
}

/// Ask a yes/no question on stderr. Anything but `y`/`yes` is a no.
pub(crate) fn prompt_confirm(question: &str) -> Result<bool> {
    eprint!("{question} [y/N]: ");
    io::stderr().flush()?;
    let stdin = io::stdin();
    let line = stdin.lock().lines().next().context("No input")??;
    Ok(is_yes(&line))
}

fn is_yes(answer: &str) -> bool {
    matches!(answer.trim().to_lowercase().as_str(), "y" | "yes")
}

/// Bail unless `yes` was passed or the user confirms interactively.
pub(crate) fn require_confirmation(yes: bool, question: &str) -> Result<()> {
    if yes || prompt_confirm(question)? {
        Ok(())
    } else {
        bail!("Aborted, nothing changed")
    }
}

pub(crate) fn no_neg_zero(v: f64) -> f64 {
    if v == 0.0 { 0.0 } else { v }
}

/// Whole calories with an explicit sign, e.g. `+250` / `-400`.
pub(crate) fn signed_cal(v: f64) -> String {
    format!("{:+.0}", no_neg_zero(v.round()))
}

pub(crate) fn opt_num(v: Option<f64>, decimals: usize) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{:.*}", decimals, no_neg_zero(v)))
}
