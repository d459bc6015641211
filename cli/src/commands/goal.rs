use anyhow::{Result, bail};

use deficit_core::metrics::{projected_target_date, required_daily_deficit, timeframe_days};
use deficit_core::models::{Goal, WeightUnit};

use super::AppTracker;
use super::helpers::{parse_date, parse_date_str};

pub(crate) struct GoalArgs {
    pub start_weight: f64,
    pub target_weight: f64,
    pub deficit: f64,
    pub start_date: Option<String>,
    pub target_date: Option<String>,
    pub unit: Option<String>,
}

/// Build a goal from CLI input. Without an explicit target date, the date is
/// projected from the weight to lose and the daily deficit.
pub(crate) fn build_goal(args: GoalArgs, default_unit: WeightUnit) -> Result<Goal> {
    let unit = match args.unit {
        Some(u) => u.parse::<WeightUnit>()?,
        None => default_unit,
    };
    let start_date = parse_date(args.start_date)?;
    let target_date = match args.target_date {
        Some(s) => parse_date_str(&s)?,
        None => match projected_target_date(
            args.start_weight,
            args.target_weight,
            unit,
            args.deficit,
            start_date,
        ) {
            Some(d) => d,
            None => bail!(
                "Cannot project a target date: target weight must be below start weight and the deficit greater than 0. Pass --target-date instead"
            ),
        },
    };

    Ok(Goal {
        start_weight: args.start_weight,
        target_weight: args.target_weight,
        start_date,
        target_date,
        starting_calorie_deficit: args.deficit,
        weight_unit: unit,
    })
}

fn goal_json(goal: &Goal) -> serde_json::Value {
    serde_json::json!({
        "goal": goal,
        "timeframe_days": timeframe_days(goal),
        "required_daily_deficit": required_daily_deficit(goal),
    })
}

fn print_goal(goal: &Goal) {
    let unit = goal.weight_unit;
    let to_lose = goal.start_weight - goal.target_weight;
    println!(
        "Start:   {:.1} {unit} on {}",
        goal.start_weight,
        goal.start_date.format("%Y-%m-%d")
    );
    println!(
        "Target:  {:.1} {unit} by {}",
        goal.target_weight,
        goal.target_date.format("%Y-%m-%d")
    );
    println!(
        "Change:  {to_lose:.1} {unit} over {} days",
        timeframe_days(goal)
    );
    println!(
        "Deficit: {:.0} kcal/day planned",
        goal.starting_calorie_deficit
    );
    if let Some(req) = required_daily_deficit(goal) {
        println!("         {req:.0} kcal/day needed to hit the target date");
    }
}

pub(crate) fn cmd_goal_set(tracker: &mut AppTracker, args: GoalArgs, json: bool) -> Result<()> {
    let goal = build_goal(args, tracker.weight_unit())?;
    let previous_unit = tracker.weight_unit();
    tracker.set_goal(goal.clone())?;

    if json {
        println!("{}", serde_json::to_string_pretty(&goal_json(&goal))?);
    } else {
        if previous_unit != goal.weight_unit {
            eprintln!(
                "Converted stored weights from {previous_unit} to {}",
                goal.weight_unit
            );
        }
        println!("Goal saved.\n");
        print_goal(&goal);
    }

    Ok(())
}

pub(crate) fn cmd_goal_show(tracker: &AppTracker, json: bool) -> Result<()> {
    match tracker.goal() {
        Some(goal) if json => println!("{}", serde_json::to_string_pretty(&goal_json(goal))?),
        Some(goal) => print_goal(goal),
        None if json => println!("{}", serde_json::json!({ "goal": null })),
        None => eprintln!("No goal set. Use `deficit goal set` to create one."),
    }
    Ok(())
}

pub(crate) fn cmd_goal_clear(tracker: &mut AppTracker, json: bool) -> Result<()> {
    let cleared = tracker.clear_goal()?;

    if json {
        println!("{}", serde_json::json!({ "cleared": cleared }));
    } else if cleared {
        println!("Goal cleared.");
    } else {
        println!("No goal to clear.");
    }

    Ok(())
}

pub(crate) fn cmd_unit(tracker: &mut AppTracker, unit: Option<&str>, json: bool) -> Result<()> {
    let current = tracker.weight_unit();
    let Some(unit) = unit else {
        if json {
            println!("{}", serde_json::json!({ "weight_unit": current }));
        } else {
            println!("{current}");
        }
        return Ok(());
    };

    let unit = unit.parse::<WeightUnit>()?;
    tracker.set_weight_unit(unit)?;

    if json {
        println!(
            "{}",
            serde_json::json!({ "weight_unit": unit, "previous": current })
        );
    } else if unit == current {
        println!("Weight unit is already {unit}.");
    } else {
        println!("Weight unit changed from {current} to {unit}; stored weights converted.");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use deficit_core::store::SqliteStore;
    use deficit_core::tracker::Tracker;

    fn args() -> GoalArgs {
        GoalArgs {
            start_weight: 200.0,
            target_weight: 190.0,
            deficit: 500.0,
            start_date: Some("2024-01-01".to_string()),
            target_date: None,
            unit: None,
        }
    }

    #[test]
    fn test_build_goal_projects_target_date() {
        let goal = build_goal(args(), WeightUnit::Lbs).unwrap();
        // 10 lbs at 500 kcal/day = 70 days
        assert_eq!(goal.target_date, NaiveDate::from_ymd_opt(2024, 3, 11).unwrap());
        assert_eq!(goal.weight_unit, WeightUnit::Lbs);
    }

    #[test]
    fn test_build_goal_explicit_target_and_unit() {
        let goal = build_goal(
            GoalArgs {
                target_date: Some("2024-06-01".to_string()),
                unit: Some("kg".to_string()),
                ..args()
            },
            WeightUnit::Lbs,
        )
        .unwrap();
        assert_eq!(goal.target_date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
        assert_eq!(goal.weight_unit, WeightUnit::Kg);
    }

    #[test]
    fn test_build_goal_cannot_project_weight_gain() {
        let err = build_goal(
            GoalArgs {
                target_weight: 210.0,
                ..args()
            },
            WeightUnit::Lbs,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_build_goal_tiny_deficit_has_no_target_date() {
        let err = build_goal(
            GoalArgs {
                deficit: 1e-12,
                ..args()
            },
            WeightUnit::Lbs,
        );
        assert!(err.is_err());
    }

    #[test]
    fn test_goal_set_and_clear() {
        let mut tracker = Tracker::load(SqliteStore::open_in_memory().unwrap());
        cmd_goal_set(&mut tracker, args(), true).unwrap();
        assert_eq!(tracker.goal().unwrap().starting_calorie_deficit, 500.0);
        cmd_goal_clear(&mut tracker, true).unwrap();
        assert!(tracker.goal().is_none());
    }

    #[test]
    fn test_unit_switch() {
        let mut tracker = Tracker::load(SqliteStore::open_in_memory().unwrap());
        cmd_unit(&mut tracker, Some("kg"), true).unwrap();
        assert_eq!(tracker.weight_unit(), WeightUnit::Kg);
        assert!(cmd_unit(&mut tracker, Some("stone"), true).is_err());
    }
}
