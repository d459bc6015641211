use anyhow::{Context, Result, bail};
use chrono::{Local, NaiveDate};
use tracing::{debug, info, warn};

use crate::import::{self, ImportData, ImportSummary};
use crate::models::{
    Entry, Goal, NewEntry, Snapshot, UpdateEntry, WeightUnit, validate_goal, validate_new_entry,
};
use crate::store::{KeyValueStore, WriteBatch};

pub const ENTRIES_KEY: &str = "weightTrackerEntries";
pub const GOAL_KEY: &str = "weightTrackerGoal";
pub const WEIGHT_UNIT_KEY: &str = "weightTrackerUnit";
pub const BACKUP_KEY: &str = "weightTrackerBackup";
pub const LAST_UPDATED_KEY: &str = "weightTrackerLastUpdated";

const ALL_KEYS: [&str; 5] = [
    ENTRIES_KEY,
    GOAL_KEY,
    WEIGHT_UNIT_KEY,
    BACKUP_KEY,
    LAST_UPDATED_KEY,
];

/// Where [`Tracker::load`] found its state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadSource {
    Primary,
    Backup,
    Empty,
}

#[derive(Debug, Clone, Default)]
struct State {
    entries: Vec<Entry>,
    goal: Option<Goal>,
    weight_unit: WeightUnit,
}

impl State {
    fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.goal.is_none()
    }

    fn snapshot(&self, timestamp: String) -> Snapshot {
        Snapshot {
            entries: self.entries.clone(),
            goal: self.goal.clone(),
            weight_unit: Some(self.weight_unit),
            timestamp,
        }
    }

    /// Re-express every stored weight in `unit`.
    fn convert_to(&mut self, unit: WeightUnit) {
        if unit == self.weight_unit {
            return;
        }
        let from = self.weight_unit;
        for e in &mut self.entries {
            e.weight = e.weight.map(|w| from.convert(w, unit));
        }
        self.goal = self.goal.as_ref().map(|g| g.converted_to(unit));
        self.weight_unit = unit;
    }
}

/// Sort chronologically, keeping the last occurrence of a duplicated date.
fn normalize_entries(mut entries: Vec<Entry>) -> Vec<Entry> {
    entries.sort_by_key(|e| e.date);
    let mut out: Vec<Entry> = Vec::with_capacity(entries.len());
    for e in entries {
        match out.last_mut() {
            Some(last) if last.date == e.date => *last = e,
            _ => out.push(e),
        }
    }
    out
}

fn upsert_entry(entries: &mut Vec<Entry>, new: &NewEntry) {
    match entries.binary_search_by_key(&new.date, |e| e.date) {
        Ok(i) => entries[i].merge(new),
        Err(i) => entries.insert(i, new.clone().into_entry()),
    }
}

/// Whether restoring `backup` recovers something `primary` is missing.
fn backup_adds_data(primary: Option<&State>, backup: &State) -> bool {
    match primary {
        None => !backup.is_empty(),
        Some(p) => !backup.entries.is_empty() || (p.goal.is_none() && backup.goal.is_some()),
    }
}

/// The goal and the chronological entry list, mirrored into a
/// [`KeyValueStore`] after every mutation.
///
/// Each mutation builds the new state, writes it (primary keys, backup
/// snapshot and last-updated stamp in a single batch) and only then swaps it
/// in, so a failed write leaves memory and storage unchanged.
pub struct Tracker<S: KeyValueStore> {
    store: S,
    state: State,
    source: LoadSource,
}

impl<S: KeyValueStore> Tracker<S> {
    /// Load state from `store`.
    ///
    /// When the primary entries are empty or unreadable the backup snapshot
    /// is consulted, and it wins only if it holds data the primary lacks
    /// (entries, or a goal the primary doesn't have). Both failing yields an
    /// empty state. Never errors; problems are logged.
    pub fn load(store: S) -> Self {
        let primary = match Self::read_primary(&store) {
            Ok(state) => Some(state),
            Err(e) => {
                warn!(error = %format!("{e:#}"), "failed to load primary storage");
                None
            }
        };

        if primary.as_ref().is_none_or(|s| s.entries.is_empty()) {
            match Self::read_backup(&store) {
                Ok(Some(backup)) if backup_adds_data(primary.as_ref(), &backup) => {
                    let tracker = Tracker {
                        store,
                        state: backup,
                        source: LoadSource::Backup,
                    };
                    if let Err(e) = tracker.write_state(&tracker.state) {
                        warn!(error = %format!("{e:#}"), "failed to re-save primary storage from backup");
                    }
                    info!(
                        entries = tracker.state.entries.len(),
                        "data restored from backup"
                    );
                    return tracker;
                }
                Ok(_) => {}
                Err(e) => warn!(error = %format!("{e:#}"), "failed to restore from backup"),
            }
        }

        let state = primary.unwrap_or_default();
        if state.is_empty() {
            return Tracker {
                store,
                state,
                source: LoadSource::Empty,
            };
        }

        let tracker = Tracker {
            store,
            state,
            source: LoadSource::Primary,
        };
        if let Err(e) = tracker.write_backup() {
            warn!(error = %format!("{e:#}"), "failed to refresh backup after load");
        }
        debug!(entries = tracker.state.entries.len(), "loaded primary storage");
        tracker
    }

    fn read_primary(store: &S) -> Result<State> {
        let entries = match store.get(ENTRIES_KEY)? {
            Some(raw) => serde_json::from_str::<Vec<Entry>>(&raw)
                .context("Stored entries are not valid JSON")?,
            None => Vec::new(),
        };
        let goal = match store.get(GOAL_KEY)? {
            Some(raw) => Some(serde_json::from_str(&raw).context("Stored goal is not valid JSON")?),
            None => None,
        };
        let weight_unit = match store.get(WEIGHT_UNIT_KEY)? {
            Some(raw) => raw.parse()?,
            None => WeightUnit::default(),
        };
        Ok(State {
            entries: normalize_entries(entries),
            goal,
            weight_unit,
        })
    }

    fn read_backup(store: &S) -> Result<Option<State>> {
        let Some(raw) = store.get(BACKUP_KEY)? else {
            return Ok(None);
        };
        let snapshot: Snapshot =
            serde_json::from_str(&raw).context("Backup snapshot is not valid")?;
        Ok(Some(State {
            entries: normalize_entries(snapshot.entries),
            goal: snapshot.goal,
            weight_unit: snapshot.weight_unit.unwrap_or_default(),
        }))
    }

    fn write_state(&self, state: &State) -> Result<()> {
        let now = Local::now().to_rfc3339();
        let mut batch = WriteBatch::new();
        batch.set(ENTRIES_KEY, serde_json::to_string(&state.entries)?);
        if let Some(goal) = &state.goal {
            batch.set(GOAL_KEY, serde_json::to_string(goal)?);
        } else {
            batch.remove(GOAL_KEY);
        }
        batch.set(WEIGHT_UNIT_KEY, state.weight_unit.as_str());
        batch.set(
            BACKUP_KEY,
            serde_json::to_string(&state.snapshot(now.clone()))?,
        );
        batch.set(LAST_UPDATED_KEY, now);
        self.store.write_batch(&batch).inspect_err(|e| {
            warn!(error = %format!("{e:#}"), "failed to save tracker state");
        })?;
        debug!(entries = state.entries.len(), "saved tracker state");
        Ok(())
    }

    fn write_backup(&self) -> Result<()> {
        let now = Local::now().to_rfc3339();
        let mut batch = WriteBatch::new();
        batch.set(
            BACKUP_KEY,
            serde_json::to_string(&self.state.snapshot(now.clone()))?,
        );
        batch.set(LAST_UPDATED_KEY, now);
        self.store.write_batch(&batch)
    }

    fn commit(&mut self, state: State) -> Result<()> {
        self.write_state(&state)?;
        self.state = state;
        Ok(())
    }

    // --- Accessors ---

    #[must_use]
    pub fn entries(&self) -> &[Entry] {
        &self.state.entries
    }

    #[must_use]
    pub fn entry(&self, date: NaiveDate) -> Option<&Entry> {
        self.state
            .entries
            .binary_search_by_key(&date, |e| e.date)
            .ok()
            .map(|i| &self.state.entries[i])
    }

    #[must_use]
    pub fn goal(&self) -> Option<&Goal> {
        self.state.goal.as_ref()
    }

    #[must_use]
    pub fn weight_unit(&self) -> WeightUnit {
        self.state.weight_unit
    }

    #[must_use]
    pub fn load_source(&self) -> LoadSource {
        self.source
    }

    pub fn last_updated(&self) -> Result<Option<String>> {
        self.store.get(LAST_UPDATED_KEY)
    }

    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_store(self) -> S {
        self.store
    }

    // --- Entries ---

    /// Add an entry, or merge the provided fields into the entry already
    /// stored for that date.
    pub fn add_entry(&mut self, new: NewEntry) -> Result<Entry> {
        validate_new_entry(&new)?;
        let mut state = self.state.clone();
        upsert_entry(&mut state.entries, &new);
        self.commit(state)?;
        self.entry(new.date)
            .cloned()
            .context("Entry not found after insert")
    }

    pub fn update_entry(&mut self, date: NaiveDate, update: &UpdateEntry) -> Result<Entry> {
        let mut state = self.state.clone();
        let Ok(idx) = state.entries.binary_search_by_key(&date, |e| e.date) else {
            bail!("No entry for {date}");
        };
        let entry = &mut state.entries[idx];
        if let Some(v) = update.calories_in {
            entry.calories_in = v;
        }
        if let Some(v) = update.calories_out {
            entry.calories_out = v;
        }
        if let Some(w) = update.weight {
            entry.weight = w;
        }
        validate_new_entry(&NewEntry::from(&*entry))?;
        let updated = entry.clone();
        self.commit(state)?;
        Ok(updated)
    }

    pub fn delete_entry(&mut self, date: NaiveDate) -> Result<bool> {
        let Ok(idx) = self.state.entries.binary_search_by_key(&date, |e| e.date) else {
            return Ok(false);
        };
        let mut state = self.state.clone();
        state.entries.remove(idx);
        self.commit(state)?;
        Ok(true)
    }

    // --- Goal & unit ---

    /// Replace the goal. Stored entry weights are converted when the goal is
    /// expressed in a different unit, which becomes the tracker's unit.
    pub fn set_goal(&mut self, goal: Goal) -> Result<()> {
        validate_goal(&goal)?;
        let mut state = self.state.clone();
        state.convert_to(goal.weight_unit);
        state.goal = Some(goal);
        self.commit(state)
    }

    pub fn clear_goal(&mut self) -> Result<bool> {
        if self.state.goal.is_none() {
            return Ok(false);
        }
        let mut state = self.state.clone();
        state.goal = None;
        self.commit(state)?;
        Ok(true)
    }

    /// Switch units, converting every stored weight.
    pub fn set_weight_unit(&mut self, unit: WeightUnit) -> Result<()> {
        let mut state = self.state.clone();
        state.convert_to(unit);
        self.commit(state)
    }

    // --- Import, backup, restore ---

    /// Merge imported data: every entry goes through the add-entry rule, the
    /// goal is replaced when present.
    pub fn apply_import(&mut self, data: &ImportData) -> Result<ImportSummary> {
        for new in &data.entries {
            validate_new_entry(new).with_context(|| format!("Entry for {}", new.date))?;
        }
        if let Some(goal) = &data.goal {
            validate_goal(goal).context("Imported goal is invalid")?;
        }

        let summary = import::summarize_import(&self.state.entries, data);
        let mut state = self.state.clone();
        if let Some(unit) = data.weight_unit {
            state.convert_to(unit);
        }
        for new in &data.entries {
            upsert_entry(&mut state.entries, new);
        }
        if let Some(goal) = &data.goal {
            state.goal = Some(goal.converted_to(state.weight_unit));
        }
        self.commit(state)?;
        info!(
            added = summary.entries_added,
            updated = summary.entries_updated,
            "import applied"
        );
        Ok(summary)
    }

    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.state.snapshot(Local::now().to_rfc3339())
    }

    /// Serialize the full state as a backup document.
    pub fn backup_data(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.snapshot())?)
    }

    /// Replace the current state with a serialized snapshot.
    ///
    /// The snapshot must carry an `entries` array; `goal` and `weightUnit`
    /// replace the current values only when present. Nothing changes when
    /// the snapshot is rejected.
    pub fn restore_data(&mut self, backup: &str) -> Result<()> {
        let data = import::parse_snapshot_json(backup)?;
        for new in &data.entries {
            validate_new_entry(new).with_context(|| format!("Entry for {}", new.date))?;
        }
        let weight_unit = data.weight_unit.unwrap_or(self.state.weight_unit);
        let goal = data
            .goal
            .or_else(|| self.state.goal.clone())
            .map(|g| g.converted_to(weight_unit));
        if let Some(goal) = &goal {
            validate_goal(goal).context("Backup goal is invalid")?;
        }
        let state = State {
            entries: normalize_entries(data.entries.into_iter().map(NewEntry::into_entry).collect()),
            goal,
            weight_unit,
        };
        self.commit(state)?;
        info!(entries = self.state.entries.len(), "data restored");
        Ok(())
    }

    /// Drop all state and remove every stored key.
    pub fn reset(&mut self) -> Result<()> {
        let mut batch = WriteBatch::new();
        for key in ALL_KEYS {
            batch.remove(key);
        }
        self.store.write_batch(&batch)?;
        self.state = State::default();
        info!("tracker reset");
        Ok(())
    }
}
