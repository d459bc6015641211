use anyhow::Result;
use chrono::NaiveDate;
use tabled::{
    Table, Tabled,
    settings::{Alignment, Modify, Style, object::Columns},
};

use deficit_core::metrics::{
    self, DatedValue, ProgressPoint, adherence, cumulative_deficits, deficit_trend,
    expected_weights, goal_progress,
};
use deficit_core::models::{Entry, Goal};

use super::AppTracker;
use super::helpers::{no_neg_zero, opt_num, signed_cal, today};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub(crate) enum ChartKind {
    /// Cumulative deficit, planned vs actual
    Calories,
    /// Daily deficit vs the goal deficit
    Daily,
    /// Expected vs actual weight lost
    Weight,
    /// Planned weight line vs measured weights
    Trajectory,
    /// Net calories per logged day
    Net,
    /// Daily deficit with 7-day and all-time averages
    Trend,
}

/// The goal and entries when both exist; otherwise prints why the view is
/// empty and returns `None`.
fn require_data(tracker: &AppTracker, json: bool) -> Option<(&Goal, &[Entry])> {
    let message = match tracker.goal() {
        None => "No goal set. Use `deficit goal set` to start tracking progress.",
        Some(_) if tracker.entries().is_empty() => {
            "No entries yet. Use `deficit log` to record your first day."
        }
        Some(goal) => return Some((goal, tracker.entries())),
    };
    if json {
        println!("{}", serde_json::json!({ "message": message }));
    } else {
        eprintln!("{message}");
    }
    None
}

pub(crate) fn cmd_dashboard(tracker: &AppTracker, json: bool) -> Result<()> {
    let Some((goal, entries)) = require_data(tracker, json) else {
        return Ok(());
    };
    let today = today();
    let unit = goal.weight_unit;

    let progress = goal_progress(entries, goal, today);
    let stats = adherence(entries, goal);
    let total_deficit = cumulative_deficits(entries).last().map_or(0.0, |c| c.value);
    let expected_weight = expected_weights(entries, goal).last().map(|w| w.value);
    let latest_weight = metrics::actual_weights(entries).last().cloned();
    let trend = deficit_trend(entries, goal);
    let latest_trend = trend.last();

    if json {
        println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "goal": goal,
                "progress": progress,
                "adherence": stats,
                "total_deficit": no_neg_zero(total_deficit),
                "expected_weight": expected_weight,
                "latest_weight": latest_weight,
                "rolling_average": latest_trend.and_then(|t| t.rolling_average),
                "all_time_average": latest_trend.map(|t| t.all_time_average),
            }))?
        );
        return Ok(());
    }

    println!(
        "=== Goal: {:.1} → {:.1} {unit} by {} ===\n",
        goal.start_weight,
        goal.target_weight,
        goal.target_date.format("%Y-%m-%d")
    );
    println!(
        "  Weight progress:  {:>5.1}%",
        progress.weight_loss_percent
    );
    println!("  Calorie progress: {:>5.1}%", progress.calorie_percent);
    println!("  Time elapsed:     {:>5.1}%\n", progress.time_percent);

    println!(
        "  Total deficit:    {:.0} kcal",
        no_neg_zero(total_deficit)
    );
    if let Some(expected) = expected_weight {
        println!("  Expected weight:  {expected:.1} {unit}");
    }
    if let Some(w) = &latest_weight {
        println!(
            "  Latest weight:    {:.1} {unit} ({})",
            w.value,
            w.date.format("%Y-%m-%d")
        );
    }
    if let Some(t) = latest_trend {
        println!(
            "  7-day average:    {} kcal/day",
            opt_num(t.rolling_average, 0)
        );
        println!(
            "  All-time average: {:.0} kcal/day (target {:.0})",
            no_neg_zero(t.all_time_average),
            t.target_deficit
        );
    }
    println!(
        "\n  Adherence: {}% ({} on target, {} missed)",
        stats.percent(),
        stats.days_adherent,
        stats.days_failed
    );

    Ok(())
}

#[derive(Tabled)]
struct SeriesRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Expected")]
    expected: String,
    #[tabled(rename = "Actual")]
    actual: String,
}

fn progress_rows(points: &[ProgressPoint], decimals: usize) -> Vec<SeriesRow> {
    points
        .iter()
        .map(|p| SeriesRow {
            date: p.date.format("%Y-%m-%d").to_string(),
            expected: opt_num(p.expected, decimals),
            actual: opt_num(p.actual, decimals),
        })
        .collect()
}

fn print_rows<T: Tabled>(rows: &[T], right_from: usize) {
    let table = Table::new(rows)
        .with(Style::rounded())
        .with(Modify::new(Columns::new(right_from..)).with(Alignment::right()))
        .to_string();
    println!("{table}");
}

fn print_values(title: &str, values: &[DatedValue]) {
    #[derive(Tabled)]
    struct ValueRow {
        #[tabled(rename = "Date")]
        date: String,
        #[tabled(rename = "Net kcal")]
        value: String,
    }

    let rows: Vec<ValueRow> = values
        .iter()
        .map(|v| ValueRow {
            date: v.date.format("%Y-%m-%d").to_string(),
            value: signed_cal(v.value),
        })
        .collect();
    println!("{title}");
    print_rows(&rows, 1);
}

fn print_progress(
    title: &str,
    series: &[ProgressPoint],
    decimals: usize,
    json: bool,
) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(series)?);
    } else if series.is_empty() {
        eprintln!("Nothing to chart for this goal.");
    } else {
        println!("{title}");
        print_rows(&progress_rows(series, decimals), 1);
    }
    Ok(())
}

pub(crate) fn cmd_chart(tracker: &AppTracker, kind: ChartKind, json: bool) -> Result<()> {
    let Some((goal, entries)) = require_data(tracker, json) else {
        return Ok(());
    };
    render_chart(goal, entries, kind, today(), json)
}

fn render_chart(
    goal: &Goal,
    entries: &[Entry],
    kind: ChartKind,
    today: NaiveDate,
    json: bool,
) -> Result<()> {
    let unit = goal.weight_unit;
    match kind {
        ChartKind::Net => {
            let series = metrics::daily_net(entries, goal, today);
            if json {
                println!("{}", serde_json::to_string_pretty(&series)?);
            } else {
                print_values("Net calories (negative = deficit)", &series);
            }
        }
        ChartKind::Trend => {
            let series = deficit_trend(entries, goal);
            if json {
                println!("{}", serde_json::to_string_pretty(&series)?);
                return Ok(());
            }

            #[derive(Tabled)]
            struct TrendRow {
                #[tabled(rename = "Date")]
                date: String,
                #[tabled(rename = "Deficit")]
                deficit: String,
                #[tabled(rename = "7-day avg")]
                rolling: String,
                #[tabled(rename = "All-time avg")]
                all_time: String,
                #[tabled(rename = "Target")]
                target: String,
            }

            let rows: Vec<TrendRow> = series
                .iter()
                .map(|t| TrendRow {
                    date: t.date.format("%Y-%m-%d").to_string(),
                    deficit: format!("{:.0}", no_neg_zero(t.deficit)),
                    rolling: opt_num(t.rolling_average, 0),
                    all_time: format!("{:.0}", no_neg_zero(t.all_time_average)),
                    target: format!("{:.0}", t.target_deficit),
                })
                .collect();
            println!("Deficit trend (kcal/day)");
            print_rows(&rows, 1);
        }
        ChartKind::Calories => print_progress(
            "Cumulative deficit (kcal)",
            &metrics::calorie_progress(entries, goal, today),
            0,
            json,
        )?,
        ChartKind::Daily => print_progress(
            "Daily deficit vs goal (kcal)",
            &metrics::daily_deficit_vs_expected(entries, goal),
            0,
            json,
        )?,
        ChartKind::Weight => print_progress(
            &format!("Weight lost ({unit})"),
            &metrics::weight_loss_progress(entries, goal, today),
            2,
            json,
        )?,
        ChartKind::Trajectory => print_progress(
            &format!("Weight trajectory ({unit})"),
            &metrics::weight_trajectory(entries, goal),
            1,
            json,
        )?,
    }
    Ok(())
}
