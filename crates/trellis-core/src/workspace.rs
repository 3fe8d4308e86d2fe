//! Workspace: owns the mirrored collections and reconciles them with the
//! remote store.
//!
//! The four entity collections are plain vectors behind one `RwLock`,
//! taken only for short synchronous sections and never across an await.
//! Consumers read cloned snapshots and call the mutation functions in
//! [`crate::mutations`]; nothing outside this crate mutates the
//! collections directly.

use crate::config::WorkspaceConfig;
use crate::events::{EventBus, StoreEvent};
use crate::model::{Folder, Goal, ScheduleBlock, Table, Task};
use crate::realtime::{ChangeEvent, ChangeKind, ChangeRecord};
use crate::remote::{RemoteError, RemoteStore};
use crate::tree::{self, FolderNode};

use std::sync::{Arc, Mutex, RwLock};
use thiserror::Error;
use tokio::sync::mpsc::UnboundedReceiver;
use tracing::{debug, info, warn};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum WorkspaceError {
    #[error("remote store error: {0}")]
    Remote(#[from] RemoteError),
}

pub type Result<T> = std::result::Result<T, WorkspaceError>;

/// The flat mirrored collections. Cloneable so reads hand out snapshots.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct State {
    pub folders: Vec<Folder>,
    pub tasks: Vec<Task>,
    pub goals: Vec<Goal>,
    pub schedule: Vec<ScheduleBlock>,
}

/// Record of an optimistic create awaiting its canonical row, so
/// reconciliation on success or failure is a lookup by temp id instead of
/// state captured in a closure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct PendingCreate {
    pub table: Table,
    pub temp_id: Uuid,
}

/// The client mirror of one account's productivity data.
pub struct Workspace<R: RemoteStore> {
    pub(crate) remote: R,
    pub(crate) config: WorkspaceConfig,
    pub(crate) state: RwLock<State>,
    pub(crate) pending: Mutex<Vec<PendingCreate>>,
    pub(crate) events: Arc<EventBus>,
}

impl<R: RemoteStore> Workspace<R> {
    /// Connect to the remote store and (unless configured off) perform
    /// the initial full load of all four collections.
    pub async fn connect(remote: R, config: WorkspaceConfig) -> Result<Self> {
        let workspace = Self {
            remote,
            config,
            state: RwLock::new(State::default()),
            pending: Mutex::new(Vec::new()),
            events: Arc::new(EventBus::new()),
        };
        if workspace.config.load_on_connect {
            workspace.resync().await?;
        }
        Ok(workspace)
    }

    pub fn config(&self) -> &WorkspaceConfig {
        &self.config
    }

    /// Bus for collection-change notifications.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// Open the remote change feed. The host owns the receiver and feeds
    /// each event back through [`Workspace::apply_change`] in delivery
    /// order.
    pub async fn subscribe_changes(&self) -> Result<UnboundedReceiver<ChangeEvent>> {
        Ok(self.remote.subscribe().await?)
    }

    // ------------------------------------------------------------------
    // Read surface
    // ------------------------------------------------------------------

    /// Snapshot of all four collections.
    pub fn snapshot(&self) -> State {
        self.read_state().clone()
    }

    pub fn folders(&self) -> Vec<Folder> {
        self.read_state().folders.clone()
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.read_state().tasks.clone()
    }

    pub fn goals(&self) -> Vec<Goal> {
        self.read_state().goals.clone()
    }

    pub fn schedule(&self) -> Vec<ScheduleBlock> {
        self.read_state().schedule.clone()
    }

    /// Tasks with no folder.
    pub fn inbox_tasks(&self) -> Vec<Task> {
        self.read_state()
            .tasks
            .iter()
            .filter(|task| task.is_inbox())
            .cloned()
            .collect()
    }

    /// The derived folder forest, rebuilt from the current collections.
    pub fn tree(&self) -> Vec<FolderNode> {
        let state = self.read_state();
        tree::build_tree(&state.folders, &state.tasks)
    }

    /// Whether any optimistic create is still awaiting its canonical row.
    pub fn has_pending_creates(&self) -> bool {
        !self.lock_pending().is_empty()
    }

    // ------------------------------------------------------------------
    // Resynchronization
    // ------------------------------------------------------------------

    /// Discard the mirror and refetch every collection from the remote
    /// store. The recovery path for failed updates and moves, and the
    /// initial load.
    pub async fn resync(&self) -> Result<()> {
        let folders = self.remote.select_folders().await?;
        let tasks = self.remote.select_tasks().await?;
        let goals = self.remote.select_goals().await?;
        let schedule = self.remote.select_schedule().await?;

        let counts = (folders.len(), tasks.len(), goals.len(), schedule.len());
        {
            let mut state = self.write_state();
            *state = State {
                folders,
                tasks,
                goals,
                schedule,
            };
        }
        self.lock_pending().clear();

        info!(
            folders = counts.0,
            tasks = counts.1,
            goals = counts.2,
            schedule = counts.3,
            "resynced mirror from remote"
        );
        self.events.emit(StoreEvent::ResyncCompleted {
            folders: counts.0,
            tasks: counts.1,
            goals: counts.2,
            schedule: counts.3,
        });
        Ok(())
    }

    // ------------------------------------------------------------------
    // Realtime reconciliation
    // ------------------------------------------------------------------

    /// Apply one change-feed event to the mirror.
    ///
    /// Events are applied strictly in delivery order, with no buffering
    /// and no conflict resolution beyond these rules:
    /// - INSERT with an id already present (usually the echo of this
    ///   session's own confirmed create) is a no-op;
    /// - UPDATE of a row that is gone locally (raced with a local
    ///   delete) is dropped silently;
    /// - DELETE of a row that is already gone is a no-op.
    pub fn apply_change(&self, event: ChangeEvent) {
        let Some(table) = event.table() else {
            warn!("change event carried no record; dropped");
            return;
        };

        let changed = match event.kind {
            ChangeKind::Insert => match event.new_record {
                Some(record) => self.apply_insert(record),
                None => {
                    warn!(%table, "INSERT event without new record; dropped");
                    false
                }
            },
            ChangeKind::Update => match event.new_record {
                Some(record) => self.apply_update(record),
                None => {
                    warn!(%table, "UPDATE event without new record; dropped");
                    false
                }
            },
            ChangeKind::Delete => match event.old_record {
                Some(record) => self.apply_delete(record),
                None => {
                    warn!(%table, "DELETE event without old record; dropped");
                    false
                }
            },
        };

        if changed {
            self.emit_changed(table);
        }
    }

    fn apply_insert(&self, record: ChangeRecord) -> bool {
        let table = record.table();
        let id = record.id();
        let mut state = self.write_state();
        let inserted = match record {
            ChangeRecord::Folder(row) => insert_missing(&mut state.folders, |r| r.id, row),
            ChangeRecord::Task(row) => insert_missing(&mut state.tasks, |r| r.id, row),
            ChangeRecord::Goal(row) => insert_missing(&mut state.goals, |r| r.id, row),
            ChangeRecord::Schedule(row) => insert_missing(&mut state.schedule, |r| r.id, row),
        };
        if !inserted {
            debug!(%table, %id, "INSERT already present locally; deduped");
        }
        inserted
    }

    fn apply_update(&self, record: ChangeRecord) -> bool {
        let table = record.table();
        let id = record.id();
        let mut state = self.write_state();
        let merged = match record {
            ChangeRecord::Folder(row) => replace_existing(&mut state.folders, |r| r.id, row),
            ChangeRecord::Task(row) => replace_existing(&mut state.tasks, |r| r.id, row),
            ChangeRecord::Goal(row) => replace_existing(&mut state.goals, |r| r.id, row),
            ChangeRecord::Schedule(row) => replace_existing(&mut state.schedule, |r| r.id, row),
        };
        if !merged {
            debug!(%table, %id, "UPDATE for a row not mirrored locally; dropped");
        }
        merged
    }

    fn apply_delete(&self, record: ChangeRecord) -> bool {
        let id = record.id();
        let mut state = self.write_state();
        match record {
            ChangeRecord::Folder(_) => remove_by_id(&mut state.folders, |r| r.id, id),
            ChangeRecord::Task(_) => remove_by_id(&mut state.tasks, |r| r.id, id),
            ChangeRecord::Goal(_) => remove_by_id(&mut state.goals, |r| r.id, id),
            ChangeRecord::Schedule(_) => remove_by_id(&mut state.schedule, |r| r.id, id),
        }
    }

    // ------------------------------------------------------------------
    // Internals shared with the mutation engine
    // ------------------------------------------------------------------

    pub(crate) fn read_state(&self) -> std::sync::RwLockReadGuard<'_, State> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn write_state(&self) -> std::sync::RwLockWriteGuard<'_, State> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn lock_pending(&self) -> std::sync::MutexGuard<'_, Vec<PendingCreate>> {
        self.pending.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub(crate) fn track_pending(&self, table: Table, temp_id: Uuid) {
        self.lock_pending().push(PendingCreate { table, temp_id });
    }

    pub(crate) fn clear_pending(&self, temp_id: Uuid) {
        let mut pending = self.lock_pending();
        if let Some(index) = pending.iter().position(|op| op.temp_id == temp_id) {
            let op = pending.remove(index);
            debug!(table = %op.table, %temp_id, "pending create resolved");
        }
    }

    pub(crate) fn emit_changed(&self, table: Table) {
        self.events.emit(StoreEvent::CollectionChanged { table });
    }
}

fn insert_missing<T>(rows: &mut Vec<T>, id_of: impl Fn(&T) -> Uuid, row: T) -> bool {
    let id = id_of(&row);
    if rows.iter().any(|existing| id_of(existing) == id) {
        return false;
    }
    rows.push(row);
    true
}

fn replace_existing<T>(rows: &mut [T], id_of: impl Fn(&T) -> Uuid, row: T) -> bool {
    let id = id_of(&row);
    match rows.iter_mut().find(|existing| id_of(existing) == id) {
        Some(slot) => {
            *slot = row;
            true
        }
        None => false,
    }
}

fn remove_by_id<T>(rows: &mut Vec<T>, id_of: impl Fn(&T) -> Uuid, id: Uuid) -> bool {
    let before = rows.len();
    rows.retain(|existing| id_of(existing) != id);
    rows.len() != before
}
