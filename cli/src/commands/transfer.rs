use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};

use deficit_core::export::{ExportFormat, default_file_name, export_csv, export_json};
use deficit_core::import::{ImportSummary, read_import_file, summarize_import};

use super::AppTracker;
use super::helpers::{require_confirmation, today};

fn render_export(tracker: &AppTracker, format: ExportFormat) -> Result<String> {
    match format {
        ExportFormat::Csv => export_csv(
            tracker.entries(),
            tracker.goal(),
            tracker.weight_unit(),
            today(),
        ),
        ExportFormat::Json => export_json(&tracker.snapshot()),
    }
}

/// Write the export to `output`, or to the dated default file name in the
/// current directory. `-` writes to stdout.
pub(crate) fn cmd_export(
    tracker: &AppTracker,
    format: ExportFormat,
    output: Option<PathBuf>,
    json: bool,
) -> Result<()> {
    let content = render_export(tracker, format)?;

    if output.as_deref() == Some(Path::new("-")) {
        print!("{content}");
        return Ok(());
    }

    let path = output.unwrap_or_else(|| PathBuf::from(default_file_name(format, today())));
    std::fs::write(&path, &content)
        .with_context(|| format!("Failed to write export: {}", path.display()))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "path": path.display().to_string(),
                "format": format.extension(),
                "entries": tracker.entries().len(),
            })
        );
    } else {
        println!(
            "Exported {} entries to {}",
            tracker.entries().len(),
            path.display()
        );
    }

    Ok(())
}

fn print_summary(summary: &ImportSummary) {
    println!("  Rows parsed:     {}", summary.rows_parsed);
    println!("  New entries:     {}", summary.entries_added);
    println!("  Updated entries: {}", summary.entries_updated);
    if let (Some(first), Some(last)) = (summary.first_date, summary.last_date) {
        println!(
            "  Dates spanned:   {} ({first} to {last})",
            summary.dates_spanned
        );
    }
    if summary.goal_included {
        println!("  Goal:            replaced");
    }
    if let Some(unit) = summary.weight_unit {
        println!("  Weight unit:     {unit}");
    }
}

pub(crate) fn cmd_import(
    tracker: &mut AppTracker,
    path: &Path,
    yes: bool,
    dry_run: bool,
    json: bool,
) -> Result<()> {
    let data = read_import_file(path)?;
    if data.entries.is_empty() && data.goal.is_none() {
        bail!("No entries found in {}", path.display());
    }

    let summary = if dry_run {
        summarize_import(tracker.entries(), &data)
    } else {
        let preview = summarize_import(tracker.entries(), &data);
        if !json {
            println!("Importing {}:\n", path.display());
            print_summary(&preview);
            println!();
        }
        require_confirmation(
            yes,
            "Existing entries on the same dates will be overwritten. Continue?",
        )?;
        tracker.apply_import(&data)?
    };

    if json {
        let mut value = serde_json::to_value(&summary)?;
        value["dry_run"] = serde_json::Value::Bool(dry_run);
        println!("{}", serde_json::to_string_pretty(&value)?);
    } else if dry_run {
        println!("Dry run, no changes made.\n");
        print_summary(&summary);
    } else {
        println!("Import complete.");
    }

    Ok(())
}

pub(crate) fn cmd_backup(tracker: &AppTracker, output: Option<PathBuf>, json: bool) -> Result<()> {
    let content = tracker.backup_data()?;

    let Some(path) = output else {
        println!("{content}");
        return Ok(());
    };

    std::fs::write(&path, &content)
        .with_context(|| format!("Failed to write backup: {}", path.display()))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "path": path.display().to_string(),
                "entries": tracker.entries().len(),
            })
        );
    } else {
        println!("Backup written to {}", path.display());
    }

    Ok(())
}

pub(crate) fn cmd_restore(tracker: &mut AppTracker, path: &Path, yes: bool, json: bool) -> Result<()> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read backup: {}", path.display()))?;

    require_confirmation(yes, "This replaces all current entries. Continue?")?;
    tracker
        .restore_data(&content)
        .with_context(|| format!("Invalid backup file: {}", path.display()))?;

    if json {
        println!(
            "{}",
            serde_json::json!({
                "restored": tracker.entries().len(),
                "goal": tracker.goal().is_some(),
                "weight_unit": tracker.weight_unit(),
            })
        );
    } else {
        println!("Restored {} entries.", tracker.entries().len());
    }

    Ok(())
}

pub(crate) fn cmd_reset(tracker: &mut AppTracker, yes: bool, json: bool) -> Result<()> {
    require_confirmation(yes, "Delete all entries, the goal and the backup?")?;
    tracker.reset()?;

    if json {
        println!("{}", serde_json::json!({ "reset": true }));
    } else {
        println!("All data cleared.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use deficit_core::models::{Goal, NewEntry, WeightUnit};
    use deficit_core::store::SqliteStore;
    use deficit_core::tracker::Tracker;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 7, d).unwrap()
    }

    fn tracker() -> AppTracker {
        Tracker::load(SqliteStore::open_in_memory().unwrap())
    }

    fn populated() -> AppTracker {
        let mut t = tracker();
        t.set_goal(Goal {
            start_weight: 82.0,
            target_weight: 78.0,
            start_date: day(1),
            target_date: day(31),
            starting_calorie_deficit: 550.0,
            weight_unit: WeightUnit::Kg,
        })
        .unwrap();
        for (d, w) in [(1, Some(82.0)), (2, None), (3, Some(81.6))] {
            t.add_entry(NewEntry {
                date: day(d),
                calories_in: Some(1900.0),
                calories_out: Some(2450.0),
                weight: w,
            })
            .unwrap();
        }
        t
    }

    #[test]
    fn test_json_export_then_import() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.json");
        let source = populated();
        cmd_export(&source, ExportFormat::Json, Some(path.clone()), true).unwrap();

        let mut target = tracker();
        cmd_import(&mut target, &path, true, false, true).unwrap();
        assert_eq!(target.entries(), source.entries());
        assert_eq!(target.goal(), source.goal());
    }

    #[test]
    fn test_csv_export_then_import_merges() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("export.csv");
        let source = populated();
        cmd_export(&source, ExportFormat::Csv, Some(path.clone()), false).unwrap();

        let mut target = tracker();
        target.set_weight_unit(WeightUnit::Kg).unwrap();
        target
            .add_entry(NewEntry {
                date: day(2),
                weight: Some(81.9),
                ..NewEntry::default()
            })
            .unwrap();
        cmd_import(&mut target, &path, true, false, true).unwrap();

        assert_eq!(target.weight_unit(), WeightUnit::Kg);
        assert_eq!(target.entries().len(), 3);
        let merged = target.entry(day(2)).unwrap();
        assert_eq!(merged.calories_in, 1900.0);
        // The CSV row has no weight, so the stored one survives
        assert_eq!(merged.weight, Some(81.9));
        assert!(target.goal().is_none());
    }

    #[test]
    fn test_import_dry_run_changes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.csv");
        std::fs::write(&path, "Weight,Date\n180,2024-07-04\n").unwrap();

        let mut t = tracker();
        cmd_import(&mut t, &path, false, true, false).unwrap();
        assert!(t.entries().is_empty());
    }

    #[test]
    fn test_import_rejects_bad_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.json");
        std::fs::write(&path, r#"{"goal": null}"#).unwrap();

        let mut t = populated();
        let before = t.entries().to_vec();
        assert!(cmd_import(&mut t, &path, true, false, true).is_err());
        assert_eq!(t.entries(), before.as_slice());
    }

    #[test]
    fn test_backup_restore_reset() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("backup.json");
        let mut t = populated();
        let entries = t.entries().to_vec();
        cmd_backup(&t, Some(path.clone()), true).unwrap();

        cmd_reset(&mut t, true, true).unwrap();
        assert!(t.entries().is_empty());
        assert!(t.goal().is_none());

        cmd_restore(&mut t, &path, true, true).unwrap();
        assert_eq!(t.entries(), entries.as_slice());
        assert_eq!(t.weight_unit(), WeightUnit::Kg);
        assert!(t.goal().is_some());
    }
}
