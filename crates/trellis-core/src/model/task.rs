//! Task rows, including the notes and budget-entry projections.

use super::Patch;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What kind of item this row renders as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskKind {
    Task,
    Note,
    Budget,
}

/// Task lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
}

/// A task row. `folder_id == None` means the task lives in the inbox.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: Uuid,
    pub owner: Uuid,
    pub folder_id: Option<Uuid>,
    pub title: String,
    pub content: String,
    #[serde(rename = "type")]
    pub kind: TaskKind,
    pub status: TaskStatus,
    pub done: bool,
    pub pinned: bool,
    pub due_date: Option<NaiveDate>,
    pub scheduled_date: Option<NaiveDate>,
    pub priority: Priority,
    pub tags: Option<Vec<String>>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    /// Whether this task sits in the inbox (no folder).
    pub fn is_inbox(&self) -> bool {
        self.folder_id.is_none()
    }
}

/// Caller-supplied fields for an optimistic task create. Everything
/// omitted gets an engine default: kind Task, status Todo, done and
/// pinned false, priority Medium, empty content.
#[derive(Debug, Clone, Default)]
pub struct NewTask {
    pub title: String,
    pub folder_id: Option<Uuid>,
    pub content: Option<String>,
    pub kind: Option<TaskKind>,
    pub status: Option<TaskStatus>,
    pub due_date: Option<NaiveDate>,
    pub scheduled_date: Option<NaiveDate>,
    pub priority: Option<Priority>,
    pub tags: Option<Vec<String>>,
    /// Omitted means append after the current last sibling.
    pub sort_order: Option<i64>,
}

/// Shallow field patch for a task update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TaskPatch {
    pub folder_id: Patch<Uuid>,
    pub title: Option<String>,
    pub content: Option<String>,
    pub kind: Option<TaskKind>,
    pub status: Option<TaskStatus>,
    pub done: Option<bool>,
    pub pinned: Option<bool>,
    pub due_date: Patch<NaiveDate>,
    pub scheduled_date: Patch<NaiveDate>,
    pub priority: Option<Priority>,
    pub tags: Patch<Vec<String>>,
    pub sort_order: Option<i64>,
}

impl TaskPatch {
    /// Patch that just flips the done flag, the single most common edit.
    pub fn set_done(done: bool) -> Self {
        Self {
            done: Some(done),
            status: Some(if done { TaskStatus::Done } else { TaskStatus::Todo }),
            ..Self::default()
        }
    }
}

impl Task {
    /// Merge a patch into this row. Patched fields overwrite, everything
    /// else is untouched; `updated_at` is bumped by the caller.
    pub fn apply_patch(&mut self, patch: &TaskPatch) {
        patch.folder_id.apply_to(&mut self.folder_id);
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(done) = patch.done {
            self.done = done;
        }
        if let Some(pinned) = patch.pinned {
            self.pinned = pinned;
        }
        patch.due_date.apply_to(&mut self.due_date);
        patch.scheduled_date.apply_to(&mut self.scheduled_date);
        if let Some(priority) = patch.priority {
            self.priority = priority;
        }
        patch.tags.apply_to(&mut self.tags);
        if let Some(sort_order) = patch.sort_order {
            self.sort_order = sort_order;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn task() -> Task {
        Task {
            id: Uuid::new_v4(),
            owner: Uuid::new_v4(),
            folder_id: None,
            title: "write report".into(),
            content: String::new(),
            kind: TaskKind::Task,
            status: TaskStatus::Todo,
            done: false,
            pinned: false,
            due_date: None,
            scheduled_date: None,
            priority: Priority::Medium,
            tags: None,
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn patch_merges_only_named_fields() {
        let mut t = task();
        let before = t.clone();
        t.apply_patch(&TaskPatch {
            title: Some("write the report".into()),
            pinned: Some(true),
            ..TaskPatch::default()
        });
        assert_eq!(t.title, "write the report");
        assert!(t.pinned);
        assert_eq!(t.status, before.status);
        assert_eq!(t.folder_id, before.folder_id);
        assert_eq!(t.sort_order, before.sort_order);
    }

    #[test]
    fn set_done_also_moves_status() {
        let mut t = task();
        t.apply_patch(&TaskPatch::set_done(true));
        assert!(t.done);
        assert_eq!(t.status, TaskStatus::Done);

        t.apply_patch(&TaskPatch::set_done(false));
        assert!(!t.done);
        assert_eq!(t.status, TaskStatus::Todo);
    }

    #[test]
    fn clear_patch_nulls_folder() {
        let mut t = task();
        t.folder_id = Some(Uuid::new_v4());
        t.apply_patch(&TaskPatch {
            folder_id: Patch::Clear,
            ..TaskPatch::default()
        });
        assert!(t.is_inbox());
    }

    #[test]
    fn kind_round_trips_through_type_column() {
        let t = task();
        let json = serde_json::to_value(&t).unwrap();
        assert_eq!(json["type"], "task");
        let back: Task = serde_json::from_value(json).unwrap();
        assert_eq!(back, t);
    }
}
