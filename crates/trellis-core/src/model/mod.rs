//! Domain model: the four persisted entity types and their wire shapes.
//!
//! Every row is owned by a single account (`owner`) and identified by a
//! `Uuid`. Temporary ids generated for optimistic creates are plain v4
//! uuids, indistinguishable from the canonical ids assigned by the remote
//! store.

mod folder;
mod goal;
mod patch;
mod schedule;
mod task;

pub use folder::{Folder, FolderKind, FolderPatch, NewFolder};
pub use goal::{Goal, GoalPatch, NewGoal};
pub use patch::Patch;
pub use schedule::{NewScheduleBlock, ScheduleBlock, ScheduleBlockPatch, ScheduleKind};
pub use task::{NewTask, Priority, Task, TaskKind, TaskPatch, TaskStatus};

use serde::{Deserialize, Serialize};
use std::fmt;

/// The four remote tables mirrored by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Table {
    Folders,
    Tasks,
    Goals,
    Schedule,
}

impl fmt::Display for Table {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Table::Folders => "folders",
            Table::Tasks => "tasks",
            Table::Goals => "goals",
            Table::Schedule => "schedule",
        };
        f.write_str(name)
    }
}
