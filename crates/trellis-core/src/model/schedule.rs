//! Schedule blocks: timed entries on the day planner, optionally linked
//! to a task.

use super::Patch;
use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScheduleKind {
    Focus,
    Meeting,
    Break,
    Workout,
}

/// A schedule block row.
///
/// Invariant: when the referenced task is removed, every block whose
/// `task_id` matches is removed with it (the mutation engine cascades).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduleBlock {
    pub id: Uuid,
    pub owner: Uuid,
    pub title: String,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    #[serde(rename = "type")]
    pub kind: ScheduleKind,
    pub scheduled_date: NaiveDate,
    pub task_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Caller-supplied fields for an optimistic schedule-block create.
#[derive(Debug, Clone)]
pub struct NewScheduleBlock {
    pub title: String,
    pub time: NaiveTime,
    pub duration_minutes: u32,
    pub kind: Option<ScheduleKind>,
    pub scheduled_date: NaiveDate,
    pub task_id: Option<Uuid>,
}

/// Shallow field patch for a schedule-block update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScheduleBlockPatch {
    pub title: Option<String>,
    pub time: Option<NaiveTime>,
    pub duration_minutes: Option<u32>,
    pub kind: Option<ScheduleKind>,
    pub scheduled_date: Option<NaiveDate>,
    pub task_id: Patch<Uuid>,
}

impl ScheduleBlock {
    pub fn apply_patch(&mut self, patch: &ScheduleBlockPatch) {
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(time) = patch.time {
            self.time = time;
        }
        if let Some(duration) = patch.duration_minutes {
            self.duration_minutes = duration;
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(date) = patch.scheduled_date {
            self.scheduled_date = date;
        }
        patch.task_id.apply_to(&mut self.task_id);
    }
}
