mod dashboard;
mod entry;
mod goal;
mod helpers;
mod transfer;

use deficit_core::store::SqliteStore;
use deficit_core::tracker::Tracker;

pub(crate) type AppTracker = Tracker<SqliteStore>;

pub(crate) use dashboard::{ChartKind, cmd_chart, cmd_dashboard};
pub(crate) use entry::{cmd_delete, cmd_entries, cmd_log, cmd_update};
pub(crate) use goal::{GoalArgs, cmd_goal_clear, cmd_goal_set, cmd_goal_show, cmd_unit};
pub(crate) use transfer::{cmd_backup, cmd_export, cmd_import, cmd_reset, cmd_restore};
