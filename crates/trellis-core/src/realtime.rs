//! Change-feed wire types.
//!
//! The remote store pushes one ordered stream of row-level change events,
//! scoped server-side to the signed-in owner. The feed includes echoes of
//! this client's own writes alongside writes from other sessions; the
//! workspace's application rules (dedup by id, merge, drop) make both
//! safe.

use crate::model::{Folder, Goal, ScheduleBlock, Table, Task};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row-level operation reported by the feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ChangeKind {
    Insert,
    Update,
    Delete,
}

/// A full row as carried by a change event, tagged with its table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "table", content = "row", rename_all = "camelCase")]
pub enum ChangeRecord {
    Folder(Folder),
    Task(Task),
    Goal(Goal),
    Schedule(ScheduleBlock),
}

impl ChangeRecord {
    pub fn table(&self) -> Table {
        match self {
            ChangeRecord::Folder(_) => Table::Folders,
            ChangeRecord::Task(_) => Table::Tasks,
            ChangeRecord::Goal(_) => Table::Goals,
            ChangeRecord::Schedule(_) => Table::Schedule,
        }
    }

    pub fn id(&self) -> Uuid {
        match self {
            ChangeRecord::Folder(row) => row.id,
            ChangeRecord::Task(row) => row.id,
            ChangeRecord::Goal(row) => row.id,
            ChangeRecord::Schedule(row) => row.id,
        }
    }
}

/// One event on the change feed.
///
/// INSERT and UPDATE carry the new row; DELETE carries the old one. The
/// feed is applied strictly in delivery order and is never reordered or
/// buffered by the reconciler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    #[serde(rename = "eventType")]
    pub kind: ChangeKind,
    pub new_record: Option<ChangeRecord>,
    pub old_record: Option<ChangeRecord>,
}

impl ChangeEvent {
    pub fn insert(record: ChangeRecord) -> Self {
        Self {
            kind: ChangeKind::Insert,
            new_record: Some(record),
            old_record: None,
        }
    }

    pub fn update(record: ChangeRecord) -> Self {
        Self {
            kind: ChangeKind::Update,
            new_record: Some(record),
            old_record: None,
        }
    }

    pub fn delete(record: ChangeRecord) -> Self {
        Self {
            kind: ChangeKind::Delete,
            new_record: None,
            old_record: Some(record),
        }
    }

    /// The table this event touches, from whichever record it carries.
    pub fn table(&self) -> Option<Table> {
        self.new_record
            .as_ref()
            .or(self.old_record.as_ref())
            .map(ChangeRecord::table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FolderKind, Folder};
    use chrono::Utc;

    #[test]
    fn event_serialization_shape() {
        let folder = Folder {
            id: Uuid::new_v4(),
            owner: Uuid::new_v4(),
            parent_id: None,
            title: "inbox".into(),
            kind: FolderKind::Generic,
            color: None,
            icon: None,
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let event = ChangeEvent::insert(ChangeRecord::Folder(folder));
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"eventType\":\"INSERT\""));
        assert!(json.contains("\"table\":\"folder\""));
        assert!(json.contains("\"oldRecord\":null"));

        let back: ChangeEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn table_is_taken_from_either_record() {
        let folder = Folder {
            id: Uuid::new_v4(),
            owner: Uuid::new_v4(),
            parent_id: None,
            title: "f".into(),
            kind: FolderKind::Project,
            color: None,
            icon: None,
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let insert = ChangeEvent::insert(ChangeRecord::Folder(folder.clone()));
        let delete = ChangeEvent::delete(ChangeRecord::Folder(folder));
        assert_eq!(insert.table(), Some(Table::Folders));
        assert_eq!(delete.table(), Some(Table::Folders));
    }
}
