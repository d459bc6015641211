use std::collections::{BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;

use anyhow::{Context, Result, bail};
use chrono::NaiveDate;
use serde::Serialize;
use serde_json::Value;

use crate::models::{Entry, Goal, NewEntry, WeightUnit};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImportFormat {
    Json,
    Csv,
}

impl ImportFormat {
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_lowercase();
        match ext.as_str() {
            "json" => Some(Self::Json),
            "csv" => Some(Self::Csv),
            _ => None,
        }
    }

    /// Guess the format from the file body when the extension doesn't say.
    #[must_use]
    pub fn sniff(content: &str) -> Self {
        if content.trim_start().starts_with('{') {
            Self::Json
        } else {
            Self::Csv
        }
    }
}

/// Everything an import file contributes, before it is merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ImportData {
    pub entries: Vec<NewEntry>,
    pub goal: Option<Goal>,
    pub weight_unit: Option<WeightUnit>,
}

/// What applying an [`ImportData`] does / did to the existing entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub rows_parsed: usize,
    pub entries_added: usize,
    pub entries_updated: usize,
    pub dates_spanned: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_date: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_date: Option<NaiveDate>,
    pub goal_included: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight_unit: Option<WeightUnit>,
}

pub fn read_import_file(path: &Path) -> Result<ImportData> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read file: {}", path.display()))?;
    let format = ImportFormat::from_path(path).unwrap_or_else(|| ImportFormat::sniff(&content));
    parse_import(&content, format)
        .with_context(|| format!("Invalid import file: {}", path.display()))
}

pub fn parse_import(content: &str, format: ImportFormat) -> Result<ImportData> {
    match format {
        ImportFormat::Json => parse_snapshot_json(content),
        ImportFormat::Csv => parse_csv_import(content),
    }
}

/// Parse a full-state JSON snapshot.
///
/// The document must carry an `entries` array. Entry numbers may be given as
/// JSON numbers or numeric strings; `goal` and `weightUnit` are optional.
pub fn parse_snapshot_json(content: &str) -> Result<ImportData> {
    let root: Value = serde_json::from_str(content).context("File is not valid JSON")?;

    let Some(raw_entries) = root.get("entries").and_then(Value::as_array) else {
        bail!("Invalid data format: missing or invalid entries");
    };

    let entries = raw_entries
        .iter()
        .enumerate()
        .map(|(i, v)| entry_from_json(i, v))
        .collect::<Result<Vec<_>>>()?;

    let goal = match root.get("goal") {
        None | Some(Value::Null) => None,
        Some(v) => Some(
            serde_json::from_value::<Goal>(v.clone()).context("Invalid goal in import file")?,
        ),
    };

    let weight_unit = match root.get("weightUnit") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.parse()?),
        Some(other) => bail!("Invalid weightUnit: {other}"),
    };

    Ok(ImportData {
        entries,
        goal,
        weight_unit,
    })
}

fn entry_from_json(index: usize, value: &Value) -> Result<NewEntry> {
    let n = index + 1;
    let obj = value
        .as_object()
        .with_context(|| format!("Entry {n} is not an object"))?;
    let date = obj
        .get("date")
        .and_then(Value::as_str)
        .with_context(|| format!("Entry {n} has no date"))?;
    let date = normalize_date(date).with_context(|| format!("Entry {n}"))?;

    let number = |keys: &[&str]| -> Result<Option<f64>> {
        let value = keys.iter().find_map(|k| obj.get(*k));
        json_number(value).with_context(|| format!("Entry {n} ({date}): bad {}", keys[0]))
    };

    let calories_in = number(&["caloriesIn", "calories_in"])?;
    let calories_out = number(&["caloriesOut", "calories_out"])?;
    // A zero weight means "not measured"
    let weight = number(&["weight"])?.filter(|w| *w != 0.0);

    Ok(NewEntry {
        date,
        calories_in,
        calories_out,
        weight,
    })
}

fn json_number(value: Option<&Value>) -> Result<Option<f64>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => n.as_f64().map(Some).context("number out of range"),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        Some(Value::String(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .with_context(|| format!("'{s}' is not a number")),
        Some(other) => bail!("expected a number, got {other}"),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Column {
    Date,
    CaloriesIn,
    CaloriesOut,
    Weight,
}

impl Column {
    /// Match a header cell by name, ignoring case, spacing and punctuation.
    fn from_header(header: &str) -> Option<Self> {
        let key: String = header
            .chars()
            .filter(char::is_ascii_alphanumeric)
            .collect::<String>()
            .to_lowercase();
        if key == "date" || key == "day" {
            Some(Self::Date)
        } else if key.starts_with("caloriesin") || key.starts_with("calsin") {
            Some(Self::CaloriesIn)
        } else if key.starts_with("caloriesout") || key.starts_with("calsout") {
            Some(Self::CaloriesOut)
        } else if key.starts_with("weight") {
            Some(Self::Weight)
        } else {
            None
        }
    }
}

/// Parse a CSV of daily entries from any reader.
///
/// Lines starting with `#` are metadata and skipped. Columns are located by
/// header name (`Date`, `Calories In`, `Calories Out`, `Weight`) in any
/// order; other columns such as `Net Calories` are ignored.
pub fn parse_entries_csv<R: Read>(reader: R) -> Result<Vec<NewEntry>> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .comment(Some(b'#'))
        .from_reader(reader);

    let headers = rdr.headers().context("Failed to read CSV headers")?.clone();
    let col = |wanted: Column| -> Option<usize> {
        headers
            .iter()
            .position(|h| Column::from_header(h) == Some(wanted))
    };

    let idx_date = col(Column::Date).context("Missing required column: Date")?;
    let idx_in = col(Column::CaloriesIn);
    let idx_out = col(Column::CaloriesOut);
    let idx_weight = col(Column::Weight);

    if idx_in.is_none() && idx_out.is_none() && idx_weight.is_none() {
        bail!("No data columns found. Expected any of: Calories In, Calories Out, Weight");
    }

    let mut entries = Vec::new();

    for (row_num, result) in rdr.records().enumerate() {
        let record = result.with_context(|| format!("Failed to parse CSV row {}", row_num + 1))?;
        let line = record.position().map_or(row_num as u64 + 2, csv::Position::line);

        let date = record.get(idx_date).unwrap_or("").trim();
        if date.is_empty() {
            continue; // skip blank rows
        }
        let date = normalize_date(date).with_context(|| format!("Line {line}"))?;

        let cell = |idx: Option<usize>, name: &str| -> Result<Option<f64>> {
            let Some(raw) = idx.and_then(|i| record.get(i)).map(str::trim) else {
                return Ok(None);
            };
            if raw.is_empty() {
                return Ok(None);
            }
            raw.parse::<f64>()
                .map(Some)
                .with_context(|| format!("Line {line}: invalid {name} '{raw}'"))
        };

        entries.push(NewEntry {
            date,
            calories_in: cell(idx_in, "Calories In")?,
            calories_out: cell(idx_out, "Calories Out")?,
            // A zero weight means "not measured"
            weight: cell(idx_weight, "Weight")?.filter(|w| *w != 0.0),
        });
    }

    Ok(entries)
}

/// Parse a CSV import, picking the weight unit out of the `# Weight Unit:`
/// metadata line when present.
pub fn parse_csv_import(content: &str) -> Result<ImportData> {
    let entries = parse_entries_csv(content.as_bytes())?;
    let weight_unit = content
        .lines()
        .filter_map(|l| l.trim().strip_prefix('#'))
        .find_map(|l| l.trim().strip_prefix("Weight Unit:"))
        .and_then(|u| u.parse().ok());
    Ok(ImportData {
        entries,
        goal: None,
        weight_unit,
    })
}

/// Normalize an imported date to a calendar day.
///
/// Accepts `YYYY-MM-DD`, full ISO timestamps (date part only), `M/D/YYYY`
/// and `D/M/YYYY`.
fn normalize_date(raw: &str) -> Result<NaiveDate> {
    let raw = raw.trim();
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
        return Ok(d);
    }
    if let Some((day, _)) = raw.split_once('T') {
        if let Ok(d) = NaiveDate::parse_from_str(day, "%Y-%m-%d") {
            return Ok(d);
        }
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%m/%d/%Y") {
        return Ok(d);
    }
    if let Ok(d) = NaiveDate::parse_from_str(raw, "%d/%m/%Y") {
        return Ok(d);
    }
    bail!("Cannot parse date: '{raw}'")
}

#[must_use]
pub fn summarize_import(existing: &[Entry], data: &ImportData) -> ImportSummary {
    let existing: HashSet<NaiveDate> = existing.iter().map(|e| e.date).collect();
    let dates: BTreeSet<NaiveDate> = data.entries.iter().map(|e| e.date).collect();
    let entries_updated = dates.iter().filter(|d| existing.contains(d)).count();

    ImportSummary {
        rows_parsed: data.entries.len(),
        entries_added: dates.len() - entries_updated,
        entries_updated,
        dates_spanned: dates.len(),
        first_date: dates.first().copied(),
        last_date: dates.last().copied(),
        goal_included: data.goal.is_some(),
        weight_unit: data.weight_unit,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, d).unwrap()
    }

    const EXPORTED_CSV: &str = "\
# Weight Loss Tracker Export - 2024-01-20
# Weight Unit: kg
# Start Weight: 90 kg
Date,Calories In,Calories Out,Net Calories,Weight
2024-01-15,1800,2400,-600,89.5
2024-01-16,2100,2300,-200,
";

    #[test]
    fn test_parse_csv_basic() {
        let rows = parse_entries_csv(EXPORTED_CSV.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].date, day(15));
        assert_eq!(rows[0].calories_in, Some(1800.0));
        assert_eq!(rows[0].calories_out, Some(2400.0));
        assert_eq!(rows[0].weight, Some(89.5));
        assert_eq!(rows[1].weight, None);
    }

    #[test]
    fn test_parse_csv_arbitrary_column_order() {
        let csv = "\
Weight, Calories Out, Date, Calories In
180.2, 2500, 2024-01-03, 1900
";
        let rows = parse_entries_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].date, day(3));
        assert_eq!(rows[0].calories_in, Some(1900.0));
        assert_eq!(rows[0].calories_out, Some(2500.0));
        assert_eq!(rows[0].weight, Some(180.2));
    }

    #[test]
    fn test_parse_csv_header_case_and_style() {
        let csv = "DATE,caloriesIn,calories_out\n2024-01-04,1500,2000\n";
        let rows = parse_entries_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].calories_in, Some(1500.0));
        assert_eq!(rows[0].calories_out, Some(2000.0));
        assert_eq!(rows[0].weight, None);
    }

    #[test]
    fn test_parse_csv_missing_date_column() {
        let csv = "Calories In,Calories Out\n1500,2000\n";
        let err = parse_entries_csv(csv.as_bytes()).unwrap_err();
        assert!(err.to_string().contains("Date"));
    }

    #[test]
    fn test_parse_csv_no_data_columns() {
        let csv = "Date,Notes\n2024-01-01,hello\n";
        assert!(parse_entries_csv(csv.as_bytes()).is_err());
    }

    #[test]
    fn test_parse_csv_bad_number_reports_line() {
        let csv = "Date,Calories In\n2024-01-01,lots\n";
        let err = format!("{:#}", parse_entries_csv(csv.as_bytes()).unwrap_err());
        assert!(err.contains("Line 2"), "{err}");
        assert!(err.contains("lots"), "{err}");
    }

    #[test]
    fn test_parse_csv_skips_blank_rows() {
        let csv = "Date,Calories In\n2024-01-01,100\n,\n2024-01-02,200\n";
        let rows = parse_entries_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
    }

    #[test]
    fn test_parse_csv_zero_weight_is_absent() {
        let csv = "Date,Calories In,Weight\n2024-01-05,1600,0\n2024-01-06,1700,180.5\n";
        let rows = parse_entries_csv(csv.as_bytes()).unwrap();
        assert_eq!(rows[0].weight, None);
        assert_eq!(rows[0].calories_in, Some(1600.0));
        assert_eq!(rows[1].weight, Some(180.5));
    }

    #[test]
    fn test_parse_csv_import_reads_unit_metadata() {
        let data = parse_csv_import(EXPORTED_CSV).unwrap();
        assert_eq!(data.weight_unit, Some(WeightUnit::Kg));
        assert_eq!(data.entries.len(), 2);
        assert!(data.goal.is_none());
    }

    #[test]
    fn test_normalize_date_formats() {
        assert_eq!(normalize_date("2024-01-15").unwrap(), day(15));
        assert_eq!(normalize_date("2024-01-15T00:00:00.000Z").unwrap(), day(15));
        assert_eq!(normalize_date("1/15/2024").unwrap(), day(15));
        assert!(normalize_date("not-a-date").is_err());
    }

    #[test]
    fn test_parse_snapshot_json() {
        let json = r#"{
            "entries": [
                {"date": "2024-01-02", "caloriesIn": 1800, "caloriesOut": "2300", "weight": 181.5},
                {"date": "2024-01-01", "caloriesIn": 2000, "caloriesOut": 2200}
            ],
            "goal": {
                "startWeight": 185, "targetWeight": 170,
                "startDate": "2024-01-01", "targetDate": "2024-04-01",
                "startingCalorieDeficit": 500, "weightUnit": "lbs"
            },
            "weightUnit": "lbs",
            "timestamp": "2024-01-03T10:00:00Z"
        }"#;
        let data = parse_snapshot_json(json).unwrap();
        assert_eq!(data.entries.len(), 2);
        assert_eq!(data.entries[0].calories_out, Some(2300.0));
        assert_eq!(data.entries[0].weight, Some(181.5));
        assert_eq!(data.entries[1].weight, None);
        assert_eq!(data.weight_unit, Some(WeightUnit::Lbs));
        let goal = data.goal.unwrap();
        assert_eq!(goal.start_weight, 185.0);
        assert_eq!(goal.target_date, NaiveDate::from_ymd_opt(2024, 4, 1).unwrap());
    }

    #[test]
    fn test_parse_snapshot_json_requires_entries() {
        assert!(parse_snapshot_json(r#"{"goal": null}"#).is_err());
        assert!(parse_snapshot_json(r#"{"entries": "nope"}"#).is_err());
        assert!(parse_snapshot_json("not json").is_err());
        assert!(parse_snapshot_json(r#"{"entries": []}"#).is_ok());
    }

    #[test]
    fn test_parse_snapshot_json_bad_entry() {
        let json = r#"{"entries": [{"date": "2024-01-01", "caloriesIn": "abc"}]}"#;
        let err = format!("{:#}", parse_snapshot_json(json).unwrap_err());
        assert!(err.contains("Entry 1"), "{err}");
    }

    #[test]
    fn test_parse_snapshot_zero_weight_is_absent() {
        let json = r#"{"entries": [{"date": "2024-01-01", "caloriesIn": 1, "caloriesOut": 2, "weight": 0}]}"#;
        let data = parse_snapshot_json(json).unwrap();
        assert_eq!(data.entries[0].weight, None);
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(
            ImportFormat::from_path(Path::new("backup.JSON")),
            Some(ImportFormat::Json)
        );
        assert_eq!(
            ImportFormat::from_path(Path::new("data.csv")),
            Some(ImportFormat::Csv)
        );
        assert_eq!(ImportFormat::from_path(Path::new("data.txt")), None);
        assert_eq!(ImportFormat::sniff("  {\"entries\": []}"), ImportFormat::Json);
        assert_eq!(ImportFormat::sniff("Date,Weight"), ImportFormat::Csv);
    }

    #[test]
    fn test_summarize_import() {
        let existing = vec![Entry {
            date: day(1),
            calories_in: 1.0,
            calories_out: 2.0,
            weight: None,
        }];
        let data = ImportData {
            entries: vec![
                NewEntry {
                    date: day(1),
                    ..NewEntry::default()
                },
                NewEntry {
                    date: day(3),
                    ..NewEntry::default()
                },
                NewEntry {
                    date: day(3),
                    ..NewEntry::default()
                },
            ],
            goal: None,
            weight_unit: None,
        };
        let summary = summarize_import(&existing, &data);
        assert_eq!(summary.rows_parsed, 3);
        assert_eq!(summary.entries_updated, 1);
        assert_eq!(summary.entries_added, 1);
        assert_eq!(summary.dates_spanned, 2);
        assert_eq!(summary.first_date, Some(day(1)));
        assert_eq!(summary.last_date, Some(day(3)));
        assert!(!summary.goal_included);
    }
}
