//! Derived metrics over the entry list and the goal.
//!
//! Every function here is pure: the same entries and goal always produce the
//! same series. Anything that depends on the current day takes `today` as an
//! argument. Deficits are positive when more calories were burned than eaten.

use std::collections::HashMap;

use chrono::NaiveDate;
use serde::Serialize;

use crate::models::{CALORIES_PER_LB, Entry, Goal, WeightUnit};

/// Trailing window of the rolling deficit average.
pub const ROLLING_WINDOW: usize = 7;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailyDeficit {
    pub date: NaiveDate,
    pub deficit: f64,
    pub on_target: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatedValue {
    pub date: NaiveDate,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub date: NaiveDate,
    pub deficit: f64,
    /// Mean of the trailing seven entries; `None` until seven exist.
    pub rolling_average: Option<f64>,
    pub all_time_average: f64,
    pub target_deficit: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AdherenceStats {
    pub days_adherent: usize,
    pub days_failed: usize,
    /// Fraction of logged days on target, 0.0 when nothing is logged.
    pub rate: f64,
}

impl AdherenceStats {
    #[must_use]
    pub fn percent(&self) -> i64 {
        (self.rate * 100.0).round() as i64
    }
}

/// One point of an expected-vs-actual series.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressPoint {
    pub date: NaiveDate,
    pub expected: Option<f64>,
    pub actual: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgress {
    pub weight_loss_percent: f64,
    pub calorie_percent: f64,
    pub time_percent: f64,
}

#[must_use]
pub fn net_calories(entry: &Entry) -> f64 {
    entry.net_calories()
}

fn sorted(entries: &[Entry]) -> Vec<&Entry> {
    let mut v: Vec<&Entry> = entries.iter().collect();
    v.sort_by_key(|e| e.date);
    v
}

fn deficit_by_date(entries: &[Entry]) -> HashMap<NaiveDate, f64> {
    entries.iter().map(|e| (e.date, e.deficit())).collect()
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}

#[allow(clippy::cast_precision_loss)]
fn days_between(from: NaiveDate, to: NaiveDate) -> f64 {
    (to - from).num_days() as f64
}

/// Per-day deficits in chronological order. Without a target every day is
/// reported as on target.
#[must_use]
pub fn daily_deficits(entries: &[Entry], target_deficit: Option<f64>) -> Vec<DailyDeficit> {
    sorted(entries)
        .into_iter()
        .map(|e| {
            let deficit = e.deficit();
            DailyDeficit {
                date: e.date,
                deficit,
                on_target: target_deficit.is_none_or(|t| deficit >= t),
            }
        })
        .collect()
}

/// Running sum of daily deficits in chronological order.
#[must_use]
pub fn cumulative_deficits(entries: &[Entry]) -> Vec<DatedValue> {
    let mut total = 0.0;
    sorted(entries)
        .into_iter()
        .map(|e| {
            total += e.deficit();
            DatedValue {
                date: e.date,
                value: total,
            }
        })
        .collect()
}

/// Weight change implied by a cumulative calorie deficit, in `unit`.
#[must_use]
pub fn weight_change_for_deficit(deficit: f64, unit: WeightUnit) -> f64 {
    WeightUnit::Lbs.convert(deficit / CALORIES_PER_LB, unit)
}

/// Expected weight after each entry: start weight minus the loss implied by
/// the cumulative deficit, in the goal's unit.
#[must_use]
pub fn expected_weights(entries: &[Entry], goal: &Goal) -> Vec<DatedValue> {
    cumulative_deficits(entries)
        .into_iter()
        .map(|c| DatedValue {
            date: c.date,
            value: goal.start_weight - weight_change_for_deficit(c.value, goal.weight_unit),
        })
        .collect()
}

#[must_use]
pub fn actual_weights(entries: &[Entry]) -> Vec<DatedValue> {
    sorted(entries)
        .into_iter()
        .filter_map(|e| {
            e.weight.map(|w| DatedValue {
                date: e.date,
                value: w,
            })
        })
        .collect()
}

/// Deficit trend per entry: the raw deficit, the 7-entry trailing mean and
/// the all-time average since the goal start.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn deficit_trend(entries: &[Entry], goal: &Goal) -> Vec<TrendPoint> {
    let deficits: Vec<(NaiveDate, f64)> = sorted(entries)
        .into_iter()
        .map(|e| (e.date, e.deficit()))
        .collect();

    let mut total = 0.0;
    deficits
        .iter()
        .enumerate()
        .map(|(i, &(date, deficit))| {
            total += deficit;
            let rolling_average = (i + 1 >= ROLLING_WINDOW).then(|| {
                let window = &deficits[i + 1 - ROLLING_WINDOW..=i];
                window.iter().map(|(_, d)| d).sum::<f64>() / ROLLING_WINDOW as f64
            });
            let elapsed = (date - goal.start_date).num_days() + 1;
            let divisor = if elapsed >= 1 {
                elapsed as f64
            } else {
                (i + 1) as f64
            };
            TrendPoint {
                date,
                deficit,
                rolling_average,
                all_time_average: total / divisor,
                target_deficit: goal.starting_calorie_deficit,
            }
        })
        .collect()
}

#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn adherence(entries: &[Entry], goal: &Goal) -> AdherenceStats {
    let days = daily_deficits(entries, Some(goal.starting_calorie_deficit));
    let days_adherent = days.iter().filter(|d| d.on_target).count();
    let rate = if days.is_empty() {
        0.0
    } else {
        days_adherent as f64 / days.len() as f64
    };
    AdherenceStats {
        days_adherent,
        days_failed: days.len() - days_adherent,
        rate,
    }
}

/// Every calendar day from `start` to `end`, inclusive.
#[must_use]
pub fn date_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    start.iter_days().take_while(|d| *d <= end).collect()
}

/// Cumulative deficit over the goal window: the planned line grows by the
/// goal deficit every day, the actual line only counts logged days up to
/// `today` and is absent after it.
#[must_use]
pub fn calorie_progress(entries: &[Entry], goal: &Goal, today: NaiveDate) -> Vec<ProgressPoint> {
    let by_date = deficit_by_date(entries);
    let mut expected = 0.0;
    let mut actual = 0.0;
    date_range(goal.start_date, goal.target_date)
        .into_iter()
        .map(|date| {
            expected += goal.starting_calorie_deficit;
            if date <= today {
                actual += by_date.get(&date).copied().unwrap_or(0.0);
            }
            ProgressPoint {
                date,
                expected: Some(expected),
                actual: (date <= today).then_some(actual),
            }
        })
        .collect()
}

/// Daily deficit against the goal deficit for every day of the goal window;
/// unlogged days count as zero.
#[must_use]
pub fn daily_deficit_vs_expected(entries: &[Entry], goal: &Goal) -> Vec<ProgressPoint> {
    let by_date = deficit_by_date(entries);
    date_range(goal.start_date, goal.target_date)
        .into_iter()
        .map(|date| ProgressPoint {
            date,
            expected: Some(goal.starting_calorie_deficit),
            actual: Some(by_date.get(&date).copied().unwrap_or(0.0)),
        })
        .collect()
}

/// Expected weight loss implied by the accumulated deficit against the loss
/// actually measured, both in the goal unit and relative to the start weight.
///
/// The start day is the baseline: its loss is zero and its deficit is not
/// counted. Expected values stop at `today`.
#[must_use]
pub fn weight_loss_progress(
    entries: &[Entry],
    goal: &Goal,
    today: NaiveDate,
) -> Vec<ProgressPoint> {
    let by_date = deficit_by_date(entries);
    let weights: HashMap<NaiveDate, f64> = actual_weights(entries)
        .into_iter()
        .map(|w| (w.date, w.value))
        .collect();

    let mut cumulative = 0.0;
    date_range(goal.start_date, goal.target_date)
        .into_iter()
        .enumerate()
        .map(|(i, date)| {
            if i > 0 && date <= today {
                cumulative += by_date.get(&date).copied().unwrap_or(0.0);
            }
            let actual = if i == 0 {
                Some(0.0)
            } else {
                weights.get(&date).map(|w| round2(goal.start_weight - w))
            };
            ProgressPoint {
                date,
                expected: (date <= today)
                    .then(|| round2(weight_change_for_deficit(cumulative, goal.weight_unit))),
                actual,
            }
        })
        .collect()
}

/// Planned straight-line weight from start to target against the measured
/// weights. Empty when the goal window has no length.
#[must_use]
pub fn weight_trajectory(entries: &[Entry], goal: &Goal) -> Vec<ProgressPoint> {
    let total_days = days_between(goal.start_date, goal.target_date);
    if total_days <= 0.0 {
        return Vec::new();
    }
    let per_day = (goal.start_weight - goal.target_weight) / total_days;
    let weights: HashMap<NaiveDate, f64> = actual_weights(entries)
        .into_iter()
        .map(|w| (w.date, w.value))
        .collect();

    date_range(goal.start_date, goal.target_date)
        .into_iter()
        .map(|date| {
            let actual = if date == goal.start_date {
                Some(goal.start_weight)
            } else {
                weights.get(&date).copied()
            };
            ProgressPoint {
                date,
                expected: Some(goal.start_weight - per_day * days_between(goal.start_date, date)),
                actual,
            }
        })
        .collect()
}

/// Net calories (in minus out) for each logged day of the goal window up to
/// `today`. Surplus days are positive, deficit days negative.
#[must_use]
pub fn daily_net(entries: &[Entry], goal: &Goal, today: NaiveDate) -> Vec<DatedValue> {
    let end = goal.target_date.min(today);
    sorted(entries)
        .into_iter()
        .filter(|e| e.date >= goal.start_date && e.date <= end)
        .map(|e| DatedValue {
            date: e.date,
            value: e.net_calories(),
        })
        .collect()
}

/// Weight, calorie and time progress toward the goal, each clamped to 0-100.
#[must_use]
pub fn goal_progress(entries: &[Entry], goal: &Goal, today: NaiveDate) -> GoalProgress {
    let to_lose = goal.start_weight - goal.target_weight;
    let percent = |done: f64, total: f64| {
        if total > 0.0 {
            (done / total * 100.0).clamp(0.0, 100.0)
        } else {
            0.0
        }
    };

    let weight_loss_percent = actual_weights(entries)
        .last()
        .map_or(0.0, |w| percent(goal.start_weight - w.value, to_lose));

    let needed = to_lose * goal.weight_unit.calories_per_unit();
    let achieved = cumulative_deficits(entries).last().map_or(0.0, |c| c.value);

    GoalProgress {
        weight_loss_percent,
        calorie_percent: percent(achieved, needed),
        time_percent: percent(
            days_between(goal.start_date, today),
            days_between(goal.start_date, goal.target_date),
        ),
    }
}

/// Date by which the weight difference is lost at `daily_deficit` calories a
/// day. `None` unless the target is below the start and the deficit positive.
#[must_use]
pub fn projected_target_date(
    start_weight: f64,
    target_weight: f64,
    unit: WeightUnit,
    daily_deficit: f64,
    start_date: NaiveDate,
) -> Option<NaiveDate> {
    if start_weight <= target_weight || daily_deficit <= 0.0 {
        return None;
    }
    let to_lose_lbs = unit.convert(start_weight - target_weight, WeightUnit::Lbs);
    let days = (to_lose_lbs * CALORIES_PER_LB / daily_deficit).ceil();
    if !days.is_finite() {
        return None;
    }
    // Saturating cast; out-of-range spans are rejected by try_days
    let span = chrono::Duration::try_days(days as i64)?;
    start_date.checked_add_signed(span)
}

/// Days between the goal's start and target dates.
#[must_use]
pub fn timeframe_days(goal: &Goal) -> i64 {
    (goal.target_date - goal.start_date).num_days().abs()
}

/// Daily deficit needed to hit the target weight by the target date, rounded
/// to whole calories.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn required_daily_deficit(goal: &Goal) -> Option<f64> {
    let days = timeframe_days(goal);
    if days == 0 {
        return None;
    }
    let to_lose_lbs = goal
        .weight_unit
        .convert(goal.start_weight - goal.target_weight, WeightUnit::Lbs);
    Some((to_lose_lbs * CALORIES_PER_LB / days as f64).round())
}
