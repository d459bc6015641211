use std::fmt;
use std::str::FromStr;

use anyhow::{Result, bail};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

pub const KG_PER_LB: f64 = 0.453_592_37;
pub const LBS_PER_KG: f64 = 2.204_622_62;

/// Calorie deficit that corresponds to one pound of body weight.
pub const CALORIES_PER_LB: f64 = 3500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WeightUnit {
    #[default]
    Lbs,
    Kg,
}

impl WeightUnit {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Lbs => "lbs",
            Self::Kg => "kg",
        }
    }

    /// Convert a weight expressed in `self` into `to`.
    #[must_use]
    pub fn convert(self, weight: f64, to: WeightUnit) -> f64 {
        match (self, to) {
            (Self::Lbs, Self::Kg) => weight * KG_PER_LB,
            (Self::Kg, Self::Lbs) => weight * LBS_PER_KG,
            _ => weight,
        }
    }

    /// Calorie deficit needed to lose one unit of weight.
    #[must_use]
    pub fn calories_per_unit(self) -> f64 {
        match self {
            Self::Lbs => CALORIES_PER_LB,
            Self::Kg => CALORIES_PER_LB * LBS_PER_KG,
        }
    }
}

impl fmt::Display for WeightUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for WeightUnit {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "lbs" | "lb" => Ok(Self::Lbs),
            "kg" | "kgs" => Ok(Self::Kg),
            _ => bail!("Invalid unit '{s}'. Use 'lbs' or 'kg'"),
        }
    }
}

/// One logged day. `date` is the unique key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub date: NaiveDate,
    pub calories_in: f64,
    pub calories_out: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weight: Option<f64>,
}

impl Entry {
    #[must_use]
    pub fn net_calories(&self) -> f64 {
        self.calories_in - self.calories_out
    }

    #[must_use]
    pub fn deficit(&self) -> f64 {
        self.calories_out - self.calories_in
    }

    /// Overwrite only the fields present in `new`.
    pub fn merge(&mut self, new: &NewEntry) {
        if let Some(v) = new.calories_in {
            self.calories_in = v;
        }
        if let Some(v) = new.calories_out {
            self.calories_out = v;
        }
        if let Some(w) = new.weight {
            self.weight = Some(w);
        }
    }
}

/// Input for adding an entry. Absent fields keep whatever is already stored
/// for the date, or default to zero calories / no weight for a new date.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NewEntry {
    pub date: NaiveDate,
    pub calories_in: Option<f64>,
    pub calories_out: Option<f64>,
    pub weight: Option<f64>,
}

impl NewEntry {
    #[must_use]
    pub fn into_entry(self) -> Entry {
        Entry {
            date: self.date,
            calories_in: self.calories_in.unwrap_or(0.0),
            calories_out: self.calories_out.unwrap_or(0.0),
            weight: self.weight,
        }
    }
}

impl From<&Entry> for NewEntry {
    fn from(e: &Entry) -> Self {
        Self {
            date: e.date,
            calories_in: Some(e.calories_in),
            calories_out: Some(e.calories_out),
            weight: e.weight,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct UpdateEntry {
    pub calories_in: Option<f64>,
    pub calories_out: Option<f64>,
    /// `Some(None)` clears the stored weight.
    pub weight: Option<Option<f64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    pub start_weight: f64,
    pub target_weight: f64,
    pub start_date: NaiveDate,
    pub target_date: NaiveDate,
    pub starting_calorie_deficit: f64,
    #[serde(default)]
    pub weight_unit: WeightUnit,
}

impl Goal {
    /// Re-express the goal weights in `unit`.
    #[must_use]
    pub fn converted_to(&self, unit: WeightUnit) -> Goal {
        Goal {
            start_weight: self.weight_unit.convert(self.start_weight, unit),
            target_weight: self.weight_unit.convert(self.target_weight, unit),
            weight_unit: unit,
            ..self.clone()
        }
    }
}

/// Full application state as written to the backup slot and JSON exports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    pub entries: Vec<Entry>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub goal: Option<Goal>,
    #[serde(default)]
    pub weight_unit: Option<WeightUnit>,
    #[serde(default)]
    pub timestamp: String,
}

pub fn validate_goal(goal: &Goal) -> Result<()> {
    if !goal.start_weight.is_finite() || goal.start_weight <= 0.0 {
        bail!("Start weight must be greater than 0");
    }
    if !goal.target_weight.is_finite() || goal.target_weight <= 0.0 {
        bail!("Target weight must be greater than 0");
    }
    if goal.target_date <= goal.start_date {
        bail!(
            "Target date {} must be after start date {}",
            goal.target_date,
            goal.start_date
        );
    }
    if !goal.starting_calorie_deficit.is_finite() || goal.starting_calorie_deficit <= 0.0 {
        bail!("Daily calorie deficit must be greater than 0");
    }
    Ok(())
}

pub fn validate_new_entry(entry: &NewEntry) -> Result<()> {
    for (label, value) in [
        ("Calories in", entry.calories_in),
        ("Calories out", entry.calories_out),
    ] {
        if let Some(v) = value {
            if !v.is_finite() || v < 0.0 {
                bail!("{label} must be a non-negative number (got {v})");
            }
        }
    }
    if let Some(w) = entry.weight {
        if !w.is_finite() || w <= 0.0 {
            bail!("Weight must be greater than 0 (got {w})");
        }
    }
    Ok(())
}
