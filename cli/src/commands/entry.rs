use anyhow::{Result, bail};
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use deficit_core::metrics::daily_deficits;
use deficit_core::models::{Entry, NewEntry, UpdateEntry};

use super::AppTracker;
use super::helpers::{no_neg_zero, opt_num, parse_date, parse_date_str, signed_cal, today};

fn print_entry(verb: &str, e: &Entry, unit: impl std::fmt::Display) {
    let weight = e
        .weight
        .map(|w| format!(", {w:.1} {unit}"))
        .unwrap_or_default();
    println!(
        "{verb} {}: {:.0} in, {:.0} out, net {}{weight}",
        e.date.format("%Y-%m-%d"),
        e.calories_in,
        e.calories_out,
        signed_cal(e.net_calories()),
    );
}

pub(crate) fn cmd_log(
    tracker: &mut AppTracker,
    date: Option<String>,
    calories_in: Option<f64>,
    calories_out: Option<f64>,
    weight: Option<f64>,
    json: bool,
) -> Result<()> {
    if calories_in.is_none() && calories_out.is_none() && weight.is_none() {
        bail!("Nothing to log. Pass at least one of --in, --out or --weight");
    }

    let date = parse_date(date)?;
    let existed = tracker.entry(date).is_some();
    let entry = tracker.add_entry(NewEntry {
        date,
        calories_in,
        calories_out,
        weight,
    })?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "entry": entry, "merged": existed })
        );
    } else {
        let verb = if existed { "Updated" } else { "Logged" };
        print_entry(verb, &entry, tracker.weight_unit());
    }

    Ok(())
}

pub(crate) fn cmd_update(
    tracker: &mut AppTracker,
    date: &str,
    update: &UpdateEntry,
    json: bool,
) -> Result<()> {
    if update.calories_in.is_none() && update.calories_out.is_none() && update.weight.is_none() {
        bail!("Nothing to update. Pass --in, --out, --weight or --clear-weight");
    }

    let date = parse_date_str(date)?;
    let entry = tracker.update_entry(date, update)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&entry)?);
    } else {
        print_entry("Updated", &entry, tracker.weight_unit());
    }

    Ok(())
}

pub(crate) fn cmd_delete(tracker: &mut AppTracker, date: &str, json: bool) -> Result<()> {
    let date = parse_date_str(date)?;
    if !tracker.delete_entry(date)? {
        bail!("No entry for {date}");
    }

    if json {
        println!("{}", serde_json::json!({ "deleted": date }));
    } else {
        println!("Deleted entry for {date}");
    }

    Ok(())
}

/// Entries on or after `today - (days - 1)`, or all of them.
fn recent(entries: &[Entry], days: Option<u32>) -> &[Entry] {
    let Some(days) = days else {
        return entries;
    };
    let since = today() - chrono::Duration::days(i64::from(days.saturating_sub(1)));
    let start = entries.partition_point(|e| e.date < since);
    &entries[start..]
}

pub(crate) fn cmd_entries(tracker: &AppTracker, days: Option<u32>, json: bool) -> Result<()> {
    let entries = recent(tracker.entries(), days);
    let target = tracker.goal().map(|g| g.starting_calorie_deficit);
    let deficits = daily_deficits(entries, target);

    if json {
        let rows: Vec<serde_json::Value> = entries
            .iter()
            .zip(&deficits)
            .map(|(e, d)| {
                serde_json::json!({
                    "date": e.date,
                    "caloriesIn": e.calories_in,
                    "caloriesOut": e.calories_out,
                    "netCalories": no_neg_zero(e.net_calories()),
                    "deficit": no_neg_zero(d.deficit),
                    "weight": e.weight,
                    "onTarget": target.map(|_| d.on_target),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    if entries.is_empty() {
        eprintln!("No entries found. Use `deficit log` to record a day.");
        return Ok(());
    }

    #[derive(Tabled)]
    struct EntryRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "In")]
        calories_in: String,
        #[tabled(rename = "Out")]
        calories_out: String,
        #[tabled(rename = "Net")]
        net: String,
        #[tabled(rename = "Deficit")]
        deficit: String,
        #[tabled(rename = "Weight")]
        weight: String,
        #[tabled(rename = "Target")]
        on_target: String,
    }

    let rows: Vec<EntryRow> = entries
        .iter()
        .zip(&deficits)
        .map(|(e, d)| EntryRow {
            date: e.date.format("%Y-%m-%d").to_string(),
            calories_in: format!("{:.0}", e.calories_in),
            calories_out: format!("{:.0}", e.calories_out),
            net: signed_cal(e.net_calories()),
            deficit: format!("{:.0}", no_neg_zero(d.deficit)),
            weight: opt_num(e.weight, 1),
            on_target: match target {
                None => String::new(),
                Some(_) if d.on_target => "✓".to_string(),
                Some(_) => "✗".to_string(),
            },
        })
        .collect();

    let table = Table::new(&rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(1..6)).with(Alignment::right()))
        .to_string();
    println!("{table}");
    println!("Weights in {}", tracker.weight_unit());

    Ok(())
}
