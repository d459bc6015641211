use std::fmt::Write as _;
use std::str::FromStr;

use anyhow::{Result, anyhow, bail};
use chrono::NaiveDate;

use crate::models::{Entry, Goal, Snapshot, WeightUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Json => "json",
        }
    }
}

impl FromStr for ExportFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "csv" => Ok(Self::Csv),
            "json" => Ok(Self::Json),
            _ => bail!("Unknown export format '{s}'. Use 'csv' or 'json'"),
        }
    }
}

/// `fat-loss-data-YYYY-MM-DD.<ext>`
#[must_use]
pub fn default_file_name(format: ExportFormat, date: NaiveDate) -> String {
    format!("fat-loss-data-{}.{}", date.format("%Y-%m-%d"), format.extension())
}

/// Render entries as CSV, preceded by `#` metadata lines describing the unit
/// and the goal.
pub fn export_csv(
    entries: &[Entry],
    goal: Option<&Goal>,
    unit: WeightUnit,
    exported_on: NaiveDate,
) -> Result<String> {
    let mut out = String::new();
    writeln!(out, "# Weight Loss Tracker Export - {exported_on}")?;
    writeln!(out, "# Weight Unit: {unit}")?;
    if let Some(g) = goal {
        writeln!(out, "# Start Weight: {} {unit}", g.start_weight)?;
        writeln!(out, "# Target Weight: {} {unit}", g.target_weight)?;
        writeln!(out, "# Start Date: {}", g.start_date)?;
        writeln!(out, "# Target Date: {}", g.target_date)?;
        writeln!(
            out,
            "# Daily Calorie Deficit Goal: {} calories",
            g.starting_calorie_deficit
        )?;
    }

    let mut wtr = csv::Writer::from_writer(Vec::new());
    wtr.write_record(["Date", "Calories In", "Calories Out", "Net Calories", "Weight"])?;
    let mut sorted: Vec<&Entry> = entries.iter().collect();
    sorted.sort_by_key(|e| e.date);
    for e in sorted {
        wtr.write_record([
            e.date.to_string(),
            e.calories_in.to_string(),
            e.calories_out.to_string(),
            e.net_calories().to_string(),
            e.weight.map(|w| w.to_string()).unwrap_or_default(),
        ])?;
    }
    let body = wtr
        .into_inner()
        .map_err(|e| anyhow!("Failed to flush CSV output: {e}"))?;
    out.push_str(&String::from_utf8(body)?);
    Ok(out)
}

pub fn export_json(snapshot: &Snapshot) -> Result<String> {
    Ok(serde_json::to_string_pretty(snapshot)?)
}
