//! RemoteStore trait abstraction for the authoritative backend.
//!
//! Implementations:
//! - `InMemoryRemote` - For testing and offline demos
//! - The production HTTP/websocket client lives with the host app, not in
//!   this crate; the core only ever talks through this trait.
//!
//! Every operation is scoped server-side to rows owned by the signed-in
//! account, so the trait carries no owner parameters.

use crate::model::{
    Folder, FolderPatch, Goal, GoalPatch, ScheduleBlock, ScheduleBlockPatch, Table, Task,
    TaskPatch,
};
use crate::realtime::{ChangeEvent, ChangeRecord};

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashSet;
use std::sync::{Mutex, RwLock};
use thiserror::Error;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("row not found: {0}")]
    NotFound(Uuid),

    #[error("remote store unavailable: {0}")]
    Unavailable(String),

    #[error("remote store error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, RemoteError>;

/// The authoritative store behind the mirror.
///
/// Inserts receive the optimistic row (temp id included) and return the
/// canonical row the store actually persisted — fresh id, server
/// timestamps. Updates are shallow field patches. Deletes of rows that are
/// already gone succeed, so racing sessions cannot fail each other's
/// cleanups. `subscribe` opens the change feed described in
/// [`crate::realtime`].
#[async_trait]
pub trait RemoteStore: Send + Sync {
    async fn select_folders(&self) -> Result<Vec<Folder>>;
    async fn insert_folder(&self, row: Folder) -> Result<Folder>;
    async fn update_folder(&self, id: Uuid, patch: FolderPatch) -> Result<()>;
    async fn delete_folder(&self, id: Uuid) -> Result<()>;

    async fn select_tasks(&self) -> Result<Vec<Task>>;
    async fn insert_task(&self, row: Task) -> Result<Task>;
    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> Result<()>;
    async fn delete_task(&self, id: Uuid) -> Result<()>;

    async fn select_goals(&self) -> Result<Vec<Goal>>;
    async fn insert_goal(&self, row: Goal) -> Result<Goal>;
    async fn update_goal(&self, id: Uuid, patch: GoalPatch) -> Result<()>;
    async fn delete_goal(&self, id: Uuid) -> Result<()>;

    async fn select_schedule(&self) -> Result<Vec<ScheduleBlock>>;
    async fn insert_schedule(&self, row: ScheduleBlock) -> Result<ScheduleBlock>;
    async fn update_schedule(&self, id: Uuid, patch: ScheduleBlockPatch) -> Result<()>;
    async fn delete_schedule(&self, id: Uuid) -> Result<()>;

    /// Open the row-level change feed for this account. Events arrive in
    /// commit order; the receiver side applies them as-is.
    async fn subscribe(&self) -> Result<UnboundedReceiver<ChangeEvent>>;
}

/// Which operation a failure injection targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RemoteOp {
    Select,
    Insert,
    Update,
    Delete,
}

#[derive(Default)]
struct Tables {
    folders: Vec<Folder>,
    tasks: Vec<Task>,
    goals: Vec<Goal>,
    schedule: Vec<ScheduleBlock>,
}

/// In-memory remote store for testing.
///
/// Behaves like the real backend: assigns canonical ids and server
/// timestamps on insert, applies patches, and pushes a change event to
/// every subscriber after each successful write — including the writer's
/// own session, which is how echo events arise in production.
///
/// `fail_next` arms a one-shot failure for a specific table/operation
/// pair, which is how the rollback and resync paths get exercised.
pub struct InMemoryRemote {
    tables: RwLock<Tables>,
    subscribers: Mutex<Vec<UnboundedSender<ChangeEvent>>>,
    failures: Mutex<HashSet<(Table, RemoteOp)>>,
}

impl InMemoryRemote {
    pub fn new() -> Self {
        Self {
            tables: RwLock::new(Tables::default()),
            subscribers: Mutex::new(Vec::new()),
            failures: Mutex::new(HashSet::new()),
        }
    }

    /// Arm a one-shot failure: the next matching operation returns
    /// `RemoteError::Unavailable` instead of touching the tables.
    pub fn fail_next(&self, table: Table, op: RemoteOp) {
        self.failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert((table, op));
    }

    fn take_failure(&self, table: Table, op: RemoteOp) -> Result<()> {
        let armed = self
            .failures
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .remove(&(table, op));
        if armed {
            Err(RemoteError::Unavailable(format!(
                "injected failure: {op:?} on {table}"
            )))
        } else {
            Ok(())
        }
    }

    fn broadcast(&self, event: ChangeEvent) {
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .retain(|tx| tx.send(event.clone()).is_ok());
    }
}

impl Default for InMemoryRemote {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RemoteStore for InMemoryRemote {
    async fn select_folders(&self) -> Result<Vec<Folder>> {
        self.take_failure(Table::Folders, RemoteOp::Select)?;
        Ok(self.tables.read().unwrap_or_else(|e| e.into_inner()).folders.clone())
    }

    async fn insert_folder(&self, row: Folder) -> Result<Folder> {
        self.take_failure(Table::Folders, RemoteOp::Insert)?;
        let mut row = row;
        row.id = Uuid::new_v4();
        row.created_at = Utc::now();
        row.updated_at = row.created_at;
        self.tables
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .folders
            .push(row.clone());
        self.broadcast(ChangeEvent::insert(ChangeRecord::Folder(row.clone())));
        Ok(row)
    }

    async fn update_folder(&self, id: Uuid, patch: FolderPatch) -> Result<()> {
        self.take_failure(Table::Folders, RemoteOp::Update)?;
        let updated = {
            let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
            let row = tables
                .folders
                .iter_mut()
                .find(|row| row.id == id)
                .ok_or(RemoteError::NotFound(id))?;
            row.apply_patch(&patch);
            row.updated_at = Utc::now();
            row.clone()
        };
        self.broadcast(ChangeEvent::update(ChangeRecord::Folder(updated)));
        Ok(())
    }

    async fn delete_folder(&self, id: Uuid) -> Result<()> {
        self.take_failure(Table::Folders, RemoteOp::Delete)?;
        let removed = {
            let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
            match tables.folders.iter().position(|row| row.id == id) {
                Some(index) => Some(tables.folders.remove(index)),
                None => None,
            }
        };
        if let Some(row) = removed {
            self.broadcast(ChangeEvent::delete(ChangeRecord::Folder(row)));
        }
        Ok(())
    }

    async fn select_tasks(&self) -> Result<Vec<Task>> {
        self.take_failure(Table::Tasks, RemoteOp::Select)?;
        Ok(self.tables.read().unwrap_or_else(|e| e.into_inner()).tasks.clone())
    }

    async fn insert_task(&self, row: Task) -> Result<Task> {
        self.take_failure(Table::Tasks, RemoteOp::Insert)?;
        let mut row = row;
        row.id = Uuid::new_v4();
        row.created_at = Utc::now();
        row.updated_at = row.created_at;
        self.tables
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .tasks
            .push(row.clone());
        self.broadcast(ChangeEvent::insert(ChangeRecord::Task(row.clone())));
        Ok(row)
    }

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> Result<()> {
        self.take_failure(Table::Tasks, RemoteOp::Update)?;
        let updated = {
            let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
            let row = tables
                .tasks
                .iter_mut()
                .find(|row| row.id == id)
                .ok_or(RemoteError::NotFound(id))?;
            row.apply_patch(&patch);
            row.updated_at = Utc::now();
            row.clone()
        };
        self.broadcast(ChangeEvent::update(ChangeRecord::Task(updated)));
        Ok(())
    }

    async fn delete_task(&self, id: Uuid) -> Result<()> {
        self.take_failure(Table::Tasks, RemoteOp::Delete)?;
        let removed = {
            let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
            match tables.tasks.iter().position(|row| row.id == id) {
                Some(index) => Some(tables.tasks.remove(index)),
                None => None,
            }
        };
        if let Some(row) = removed {
            self.broadcast(ChangeEvent::delete(ChangeRecord::Task(row)));
        }
        Ok(())
    }

    async fn select_goals(&self) -> Result<Vec<Goal>> {
        self.take_failure(Table::Goals, RemoteOp::Select)?;
        Ok(self.tables.read().unwrap_or_else(|e| e.into_inner()).goals.clone())
    }

    async fn insert_goal(&self, row: Goal) -> Result<Goal> {
        self.take_failure(Table::Goals, RemoteOp::Insert)?;
        let mut row = row;
        row.id = Uuid::new_v4();
        row.created_at = Utc::now();
        row.updated_at = row.created_at;
        self.tables
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .goals
            .push(row.clone());
        self.broadcast(ChangeEvent::insert(ChangeRecord::Goal(row.clone())));
        Ok(row)
    }

    async fn update_goal(&self, id: Uuid, patch: GoalPatch) -> Result<()> {
        self.take_failure(Table::Goals, RemoteOp::Update)?;
        let updated = {
            let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
            let row = tables
                .goals
                .iter_mut()
                .find(|row| row.id == id)
                .ok_or(RemoteError::NotFound(id))?;
            row.apply_patch(&patch);
            row.updated_at = Utc::now();
            row.clone()
        };
        self.broadcast(ChangeEvent::update(ChangeRecord::Goal(updated)));
        Ok(())
    }

    async fn delete_goal(&self, id: Uuid) -> Result<()> {
        self.take_failure(Table::Goals, RemoteOp::Delete)?;
        let removed = {
            let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
            match tables.goals.iter().position(|row| row.id == id) {
                Some(index) => Some(tables.goals.remove(index)),
                None => None,
            }
        };
        if let Some(row) = removed {
            self.broadcast(ChangeEvent::delete(ChangeRecord::Goal(row)));
        }
        Ok(())
    }

    async fn select_schedule(&self) -> Result<Vec<ScheduleBlock>> {
        self.take_failure(Table::Schedule, RemoteOp::Select)?;
        Ok(self
            .tables
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .schedule
            .clone())
    }

    async fn insert_schedule(&self, row: ScheduleBlock) -> Result<ScheduleBlock> {
        self.take_failure(Table::Schedule, RemoteOp::Insert)?;
        let mut row = row;
        row.id = Uuid::new_v4();
        row.created_at = Utc::now();
        self.tables
            .write()
            .unwrap_or_else(|e| e.into_inner())
            .schedule
            .push(row.clone());
        self.broadcast(ChangeEvent::insert(ChangeRecord::Schedule(row.clone())));
        Ok(row)
    }

    async fn update_schedule(&self, id: Uuid, patch: ScheduleBlockPatch) -> Result<()> {
        self.take_failure(Table::Schedule, RemoteOp::Update)?;
        let updated = {
            let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
            let row = tables
                .schedule
                .iter_mut()
                .find(|row| row.id == id)
                .ok_or(RemoteError::NotFound(id))?;
            row.apply_patch(&patch);
            row.clone()
        };
        self.broadcast(ChangeEvent::update(ChangeRecord::Schedule(updated)));
        Ok(())
    }

    async fn delete_schedule(&self, id: Uuid) -> Result<()> {
        self.take_failure(Table::Schedule, RemoteOp::Delete)?;
        let removed = {
            let mut tables = self.tables.write().unwrap_or_else(|e| e.into_inner());
            match tables.schedule.iter().position(|row| row.id == id) {
                Some(index) => Some(tables.schedule.remove(index)),
                None => None,
            }
        };
        if let Some(row) = removed {
            self.broadcast(ChangeEvent::delete(ChangeRecord::Schedule(row)));
        }
        Ok(())
    }

    async fn subscribe(&self) -> Result<UnboundedReceiver<ChangeEvent>> {
        let (tx, rx) = unbounded_channel();
        self.subscribers
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        Ok(rx)
    }
}

// Implement RemoteStore for Arc<T> where T: RemoteStore.
// This allows sharing one remote between multiple Workspaces in tests,
// which is how cross-session convergence is exercised.
#[async_trait]
impl<T: RemoteStore + Send + Sync> RemoteStore for std::sync::Arc<T> {
    async fn select_folders(&self) -> Result<Vec<Folder>> {
        (**self).select_folders().await
    }

    async fn insert_folder(&self, row: Folder) -> Result<Folder> {
        (**self).insert_folder(row).await
    }

    async fn update_folder(&self, id: Uuid, patch: FolderPatch) -> Result<()> {
        (**self).update_folder(id, patch).await
    }

    async fn delete_folder(&self, id: Uuid) -> Result<()> {
        (**self).delete_folder(id).await
    }

    async fn select_tasks(&self) -> Result<Vec<Task>> {
        (**self).select_tasks().await
    }

    async fn insert_task(&self, row: Task) -> Result<Task> {
        (**self).insert_task(row).await
    }

    async fn update_task(&self, id: Uuid, patch: TaskPatch) -> Result<()> {
        (**self).update_task(id, patch).await
    }

    async fn delete_task(&self, id: Uuid) -> Result<()> {
        (**self).delete_task(id).await
    }

    async fn select_goals(&self) -> Result<Vec<Goal>> {
        (**self).select_goals().await
    }

    async fn insert_goal(&self, row: Goal) -> Result<Goal> {
        (**self).insert_goal(row).await
    }

    async fn update_goal(&self, id: Uuid, patch: GoalPatch) -> Result<()> {
        (**self).update_goal(id, patch).await
    }

    async fn delete_goal(&self, id: Uuid) -> Result<()> {
        (**self).delete_goal(id).await
    }

    async fn select_schedule(&self) -> Result<Vec<ScheduleBlock>> {
        (**self).select_schedule().await
    }

    async fn insert_schedule(&self, row: ScheduleBlock) -> Result<ScheduleBlock> {
        (**self).insert_schedule(row).await
    }

    async fn update_schedule(&self, id: Uuid, patch: ScheduleBlockPatch) -> Result<()> {
        (**self).update_schedule(id, patch).await
    }

    async fn delete_schedule(&self, id: Uuid) -> Result<()> {
        (**self).delete_schedule(id).await
    }

    async fn subscribe(&self) -> Result<UnboundedReceiver<ChangeEvent>> {
        (**self).subscribe().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FolderKind, Patch};
    use chrono::Utc;

    fn folder_row(title: &str) -> Folder {
        Folder {
            id: Uuid::new_v4(),
            owner: Uuid::new_v4(),
            parent_id: None,
            title: title.into(),
            kind: FolderKind::Generic,
            color: None,
            icon: None,
            sort_order: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn insert_assigns_a_fresh_canonical_id() {
        let remote = InMemoryRemote::new();
        let optimistic = folder_row("inbox");
        let temp_id = optimistic.id;

        let canonical = remote.insert_folder(optimistic).await.unwrap();
        assert_ne!(canonical.id, temp_id);

        let rows = remote.select_folders().await.unwrap();
        assert_eq!(rows, vec![canonical]);
    }

    #[tokio::test]
    async fn update_patches_and_broadcasts() {
        let remote = InMemoryRemote::new();
        let mut feed = remote.subscribe().await.unwrap();
        let row = remote.insert_folder(folder_row("old")).await.unwrap();
        feed.try_recv().unwrap(); // drop the insert echo

        remote
            .update_folder(
                row.id,
                FolderPatch {
                    title: Some("new".into()),
                    ..FolderPatch::default()
                },
            )
            .await
            .unwrap();

        let event = feed.try_recv().unwrap();
        assert_eq!(event.kind, crate::realtime::ChangeKind::Update);
        match event.new_record {
            Some(ChangeRecord::Folder(folder)) => assert_eq!(folder.title, "new"),
            other => panic!("unexpected record: {other:?}"),
        }
    }

    #[tokio::test]
    async fn update_of_missing_row_is_not_found() {
        let remote = InMemoryRemote::new();
        let missing = Uuid::new_v4();
        let err = remote
            .update_folder(missing, FolderPatch::default())
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::NotFound(id) if id == missing));
    }

    #[tokio::test]
    async fn delete_is_idempotent_and_silent_when_gone() {
        let remote = InMemoryRemote::new();
        let mut feed = remote.subscribe().await.unwrap();
        let row = remote.insert_folder(folder_row("f")).await.unwrap();
        feed.try_recv().unwrap();

        remote.delete_folder(row.id).await.unwrap();
        assert!(feed.try_recv().is_ok(), "first delete broadcasts");

        remote.delete_folder(row.id).await.unwrap();
        assert!(feed.try_recv().is_err(), "second delete is a no-op");
    }

    #[tokio::test]
    async fn fail_next_is_one_shot() {
        let remote = InMemoryRemote::new();
        remote.fail_next(Table::Folders, RemoteOp::Insert);

        let err = remote.insert_folder(folder_row("f")).await.unwrap_err();
        assert!(matches!(err, RemoteError::Unavailable(_)));

        remote.insert_folder(folder_row("f")).await.unwrap();
    }

    #[tokio::test]
    async fn update_with_clear_nulls_the_column() {
        let remote = InMemoryRemote::new();
        let parent = remote.insert_folder(folder_row("parent")).await.unwrap();
        let mut child_row = folder_row("child");
        child_row.parent_id = Some(parent.id);
        let child = remote.insert_folder(child_row).await.unwrap();

        remote
            .update_folder(
                child.id,
                FolderPatch {
                    parent_id: Patch::Clear,
                    ..FolderPatch::default()
                },
            )
            .await
            .unwrap();

        let rows = remote.select_folders().await.unwrap();
        let child_after = rows.iter().find(|f| f.id == child.id).unwrap();
        assert_eq!(child_after.parent_id, None);
    }
}
