//! Optimistic mutation engine.
//!
//! Every mutation has the same shape: the local write lands synchronously
//! before the function returns its future, then the returned future
//! carries the remote persistence and its reconciliation. Callers that
//! only want instant UI feedback can fire-and-forget the future; awaiting
//! it signals persistence completion.
//!
//! Failure semantics per operation:
//! - create: the temp row is discarded entirely, nothing partial survives;
//! - update and folder moves: the whole mirror is refetched (no attempt to
//!   invert the patch, which may already be stacked under later edits);
//! - remove: the pre-delete snapshot of the affected collection(s) is
//!   restored.
//!
//! There is no per-entity queue: overlapping updates on one id race
//! last-write-wins, and nothing here is cancellable once issued.

use crate::events::{MutationKind, StoreEvent};
use crate::guard::can_move;
use crate::model::{
    Folder, FolderKind, FolderPatch, Goal, GoalPatch, NewFolder, NewGoal, NewScheduleBlock,
    NewTask, Patch, Priority, ScheduleBlock, ScheduleBlockPatch, ScheduleKind, Table, Task,
    TaskKind, TaskPatch, TaskStatus,
};
use crate::remote::RemoteStore;
use crate::workspace::{Result, Workspace};

use chrono::Utc;
use std::future::Future;
use tracing::{debug, warn};
use uuid::Uuid;

fn next_sort_order(orders: impl Iterator<Item = i64>) -> i64 {
    orders.max().map(|max| max + 1).unwrap_or(0)
}

impl<R: RemoteStore> Workspace<R> {
    // ------------------------------------------------------------------
    // Folders
    // ------------------------------------------------------------------

    /// Create a folder.
    ///
    /// The row appears in the mirror immediately under a temp id; the
    /// returned future resolves to the canonical row once the remote
    /// store confirms, at which point the temp row has been replaced
    /// wholesale.
    pub fn create_folder(&self, new: NewFolder) -> impl Future<Output = Result<Folder>> + '_ {
        let now = Utc::now();
        let row = {
            let mut state = self.write_state();
            let row = Folder {
                id: Uuid::new_v4(),
                owner: self.config.owner,
                parent_id: new.parent_id,
                title: new.title,
                kind: new.kind.unwrap_or(FolderKind::Generic),
                color: new.color,
                icon: new.icon,
                sort_order: new.sort_order.unwrap_or_else(|| {
                    next_sort_order(
                        state
                            .folders
                            .iter()
                            .filter(|f| f.parent_id == new.parent_id)
                            .map(|f| f.sort_order),
                    )
                }),
                created_at: now,
                updated_at: now,
            };
            state.folders.push(row.clone());
            row
        };
        self.track_pending(Table::Folders, row.id);
        self.emit_changed(Table::Folders);

        let temp_id = row.id;
        async move {
            match self.remote.insert_folder(row).await {
                Ok(canonical) => {
                    self.finish_create_folder(temp_id, canonical.clone());
                    Ok(canonical)
                }
                Err(err) => {
                    self.discard_temp_folder(temp_id);
                    warn!(%temp_id, error = %err, "folder create failed; temp row discarded");
                    self.events.emit(StoreEvent::MutationFailed {
                        table: Table::Folders,
                        mutation: MutationKind::Create,
                    });
                    Err(err.into())
                }
            }
        }
    }

    /// Patch a folder. Failure forces a full resync.
    pub fn update_folder(
        &self,
        id: Uuid,
        patch: FolderPatch,
    ) -> impl Future<Output = Result<()>> + '_ {
        {
            let mut state = self.write_state();
            if let Some(folder) = state.folders.iter_mut().find(|f| f.id == id) {
                folder.apply_patch(&patch);
                folder.updated_at = Utc::now();
            } else {
                debug!(%id, "update for folder not mirrored locally; persisting anyway");
            }
        }
        self.emit_changed(Table::Folders);

        async move {
            match self.remote.update_folder(id, patch).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    self.fail_update(Table::Folders, MutationKind::Update, &err).await?;
                    Err(err.into())
                }
            }
        }
    }

    /// Remove a folder. Children and contained tasks are left in place;
    /// the tree builder promotes them to root or the inbox views.
    pub fn remove_folder(&self, id: Uuid) -> impl Future<Output = Result<()>> + '_ {
        let snapshot = {
            let mut state = self.write_state();
            let snapshot = state.folders.clone();
            state.folders.retain(|f| f.id != id);
            snapshot
        };
        self.emit_changed(Table::Folders);

        async move {
            match self.remote.delete_folder(id).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    {
                        let mut state = self.write_state();
                        state.folders = snapshot;
                    }
                    warn!(%id, error = %err, "folder delete failed; snapshot restored");
                    self.events.emit(StoreEvent::MutationFailed {
                        table: Table::Folders,
                        mutation: MutationKind::Remove,
                    });
                    self.emit_changed(Table::Folders);
                    Err(err.into())
                }
            }
        }
    }

    /// Reparent a folder, gated by the cycle guard.
    ///
    /// Returns `Ok(false)` when the guard refuses the move: no local
    /// change, no network call. An accepted move is an ordinary
    /// optimistic `parent_id` update, except that persistence failure
    /// forces a full resync — a mis-resolved subtree after a failed move
    /// is too hard to repair surgically.
    pub fn move_folder(
        &self,
        id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> impl Future<Output = Result<bool>> + '_ {
        let allowed = {
            let mut state = self.write_state();
            if !can_move(&state.folders, id, new_parent_id) {
                false
            } else {
                if let Some(folder) = state.folders.iter_mut().find(|f| f.id == id) {
                    folder.parent_id = new_parent_id;
                    folder.updated_at = Utc::now();
                }
                true
            }
        };

        if allowed {
            self.emit_changed(Table::Folders);
        } else {
            debug!(%id, ?new_parent_id, "folder move refused by cycle guard");
        }

        async move {
            if !allowed {
                return Ok(false);
            }
            let patch = FolderPatch {
                parent_id: Patch::from(new_parent_id),
                ..FolderPatch::default()
            };
            match self.remote.update_folder(id, patch).await {
                Ok(()) => Ok(true),
                Err(err) => {
                    self.fail_update(Table::Folders, MutationKind::Move, &err).await?;
                    Err(err.into())
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Tasks
    // ------------------------------------------------------------------

    /// Create a task. Omitted fields default to: kind Task, status Todo,
    /// done and pinned false, priority Medium, empty content, sort order
    /// after the last sibling.
    pub fn create_task(&self, new: NewTask) -> impl Future<Output = Result<Task>> + '_ {
        let now = Utc::now();
        let row = {
            let mut state = self.write_state();
            let row = Task {
                id: Uuid::new_v4(),
                owner: self.config.owner,
                folder_id: new.folder_id,
                title: new.title,
                content: new.content.unwrap_or_default(),
                kind: new.kind.unwrap_or(TaskKind::Task),
                status: new.status.unwrap_or(TaskStatus::Todo),
                done: false,
                pinned: false,
                due_date: new.due_date,
                scheduled_date: new.scheduled_date,
                priority: new.priority.unwrap_or(Priority::Medium),
                tags: new.tags,
                sort_order: new.sort_order.unwrap_or_else(|| {
                    next_sort_order(
                        state
                            .tasks
                            .iter()
                            .filter(|t| t.folder_id == new.folder_id)
                            .map(|t| t.sort_order),
                    )
                }),
                created_at: now,
                updated_at: now,
            };
            state.tasks.push(row.clone());
            row
        };
        self.track_pending(Table::Tasks, row.id);
        self.emit_changed(Table::Tasks);

        let temp_id = row.id;
        async move {
            match self.remote.insert_task(row).await {
                Ok(canonical) => {
                    self.finish_create_task(temp_id, canonical.clone());
                    Ok(canonical)
                }
                Err(err) => {
                    self.discard_temp_task(temp_id);
                    warn!(%temp_id, error = %err, "task create failed; temp row discarded");
                    self.events.emit(StoreEvent::MutationFailed {
                        table: Table::Tasks,
                        mutation: MutationKind::Create,
                    });
                    Err(err.into())
                }
            }
        }
    }

    /// Patch a task. Failure forces a full resync.
    pub fn update_task(&self, id: Uuid, patch: TaskPatch) -> impl Future<Output = Result<()>> + '_ {
        {
            let mut state = self.write_state();
            if let Some(task) = state.tasks.iter_mut().find(|t| t.id == id) {
                task.apply_patch(&patch);
                task.updated_at = Utc::now();
            } else {
                debug!(%id, "update for task not mirrored locally; persisting anyway");
            }
        }
        self.emit_changed(Table::Tasks);

        async move {
            match self.remote.update_task(id, patch).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    self.fail_update(Table::Tasks, MutationKind::Update, &err).await?;
                    Err(err.into())
                }
            }
        }
    }

    /// Remove a task and cascade to every schedule block that references
    /// it, locally and remotely. Failure of any remote delete restores
    /// the pre-delete snapshot of both collections.
    pub fn remove_task(&self, id: Uuid) -> impl Future<Output = Result<()>> + '_ {
        let (task_snapshot, schedule_snapshot, cascade) = {
            let mut state = self.write_state();
            let task_snapshot = state.tasks.clone();
            let schedule_snapshot = state.schedule.clone();
            let cascade: Vec<Uuid> = state
                .schedule
                .iter()
                .filter(|block| block.task_id == Some(id))
                .map(|block| block.id)
                .collect();
            state.tasks.retain(|t| t.id != id);
            state.schedule.retain(|block| block.task_id != Some(id));
            (task_snapshot, schedule_snapshot, cascade)
        };
        self.emit_changed(Table::Tasks);
        if !cascade.is_empty() {
            debug!(%id, blocks = cascade.len(), "cascading task removal to schedule blocks");
            self.emit_changed(Table::Schedule);
        }

        async move {
            let mut outcome = Ok(());
            for block_id in &cascade {
                if let Err(err) = self.remote.delete_schedule(*block_id).await {
                    outcome = Err(err);
                    break;
                }
            }
            if outcome.is_ok() {
                outcome = self.remote.delete_task(id).await;
            }

            match outcome {
                Ok(()) => Ok(()),
                Err(err) => {
                    {
                        let mut state = self.write_state();
                        state.tasks = task_snapshot;
                        state.schedule = schedule_snapshot;
                    }
                    warn!(%id, error = %err, "task delete failed; snapshots restored");
                    self.events.emit(StoreEvent::MutationFailed {
                        table: Table::Tasks,
                        mutation: MutationKind::Remove,
                    });
                    self.emit_changed(Table::Tasks);
                    self.emit_changed(Table::Schedule);
                    Err(err.into())
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Goals
    // ------------------------------------------------------------------

    pub fn create_goal(&self, new: NewGoal) -> impl Future<Output = Result<Goal>> + '_ {
        let now = Utc::now();
        let row = {
            let mut state = self.write_state();
            let row = Goal {
                id: Uuid::new_v4(),
                owner: self.config.owner,
                folder_id: new.folder_id,
                title: new.title,
                target_amount: new.target_amount,
                current_amount: new.current_amount.unwrap_or(0.0),
                deadline: new.deadline,
                pinned: new.pinned.unwrap_or(false),
                created_at: now,
                updated_at: now,
            };
            state.goals.push(row.clone());
            row
        };
        self.track_pending(Table::Goals, row.id);
        self.emit_changed(Table::Goals);

        let temp_id = row.id;
        async move {
            match self.remote.insert_goal(row).await {
                Ok(canonical) => {
                    self.finish_create_goal(temp_id, canonical.clone());
                    Ok(canonical)
                }
                Err(err) => {
                    self.discard_temp_goal(temp_id);
                    warn!(%temp_id, error = %err, "goal create failed; temp row discarded");
                    self.events.emit(StoreEvent::MutationFailed {
                        table: Table::Goals,
                        mutation: MutationKind::Create,
                    });
                    Err(err.into())
                }
            }
        }
    }

    pub fn update_goal(&self, id: Uuid, patch: GoalPatch) -> impl Future<Output = Result<()>> + '_ {
        {
            let mut state = self.write_state();
            if let Some(goal) = state.goals.iter_mut().find(|g| g.id == id) {
                goal.apply_patch(&patch);
                goal.updated_at = Utc::now();
            } else {
                debug!(%id, "update for goal not mirrored locally; persisting anyway");
            }
        }
        self.emit_changed(Table::Goals);

        async move {
            match self.remote.update_goal(id, patch).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    self.fail_update(Table::Goals, MutationKind::Update, &err).await?;
                    Err(err.into())
                }
            }
        }
    }

    pub fn remove_goal(&self, id: Uuid) -> impl Future<Output = Result<()>> + '_ {
        let snapshot = {
            let mut state = self.write_state();
            let snapshot = state.goals.clone();
            state.goals.retain(|g| g.id != id);
            snapshot
        };
        self.emit_changed(Table::Goals);

        async move {
            match self.remote.delete_goal(id).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    {
                        let mut state = self.write_state();
                        state.goals = snapshot;
                    }
                    warn!(%id, error = %err, "goal delete failed; snapshot restored");
                    self.events.emit(StoreEvent::MutationFailed {
                        table: Table::Goals,
                        mutation: MutationKind::Remove,
                    });
                    self.emit_changed(Table::Goals);
                    Err(err.into())
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Schedule blocks
    // ------------------------------------------------------------------

    pub fn create_schedule_block(
        &self,
        new: NewScheduleBlock,
    ) -> impl Future<Output = Result<ScheduleBlock>> + '_ {
        let row = {
            let mut state = self.write_state();
            let row = ScheduleBlock {
                id: Uuid::new_v4(),
                owner: self.config.owner,
                title: new.title,
                time: new.time,
                duration_minutes: new.duration_minutes,
                kind: new.kind.unwrap_or(ScheduleKind::Focus),
                scheduled_date: new.scheduled_date,
                task_id: new.task_id,
                created_at: Utc::now(),
            };
            state.schedule.push(row.clone());
            row
        };
        self.track_pending(Table::Schedule, row.id);
        self.emit_changed(Table::Schedule);

        let temp_id = row.id;
        async move {
            match self.remote.insert_schedule(row).await {
                Ok(canonical) => {
                    self.finish_create_schedule(temp_id, canonical.clone());
                    Ok(canonical)
                }
                Err(err) => {
                    self.discard_temp_schedule(temp_id);
                    warn!(%temp_id, error = %err, "schedule create failed; temp row discarded");
                    self.events.emit(StoreEvent::MutationFailed {
                        table: Table::Schedule,
                        mutation: MutationKind::Create,
                    });
                    Err(err.into())
                }
            }
        }
    }

    pub fn update_schedule_block(
        &self,
        id: Uuid,
        patch: ScheduleBlockPatch,
    ) -> impl Future<Output = Result<()>> + '_ {
        {
            let mut state = self.write_state();
            if let Some(block) = state.schedule.iter_mut().find(|b| b.id == id) {
                block.apply_patch(&patch);
            } else {
                debug!(%id, "update for schedule block not mirrored locally; persisting anyway");
            }
        }
        self.emit_changed(Table::Schedule);

        async move {
            match self.remote.update_schedule(id, patch).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    self.fail_update(Table::Schedule, MutationKind::Update, &err).await?;
                    Err(err.into())
                }
            }
        }
    }

    pub fn remove_schedule_block(&self, id: Uuid) -> impl Future<Output = Result<()>> + '_ {
        let snapshot = {
            let mut state = self.write_state();
            let snapshot = state.schedule.clone();
            state.schedule.retain(|b| b.id != id);
            snapshot
        };
        self.emit_changed(Table::Schedule);

        async move {
            match self.remote.delete_schedule(id).await {
                Ok(()) => Ok(()),
                Err(err) => {
                    {
                        let mut state = self.write_state();
                        state.schedule = snapshot;
                    }
                    warn!(%id, error = %err, "schedule delete failed; snapshot restored");
                    self.events.emit(StoreEvent::MutationFailed {
                        table: Table::Schedule,
                        mutation: MutationKind::Remove,
                    });
                    self.emit_changed(Table::Schedule);
                    Err(err.into())
                }
            }
        }
    }

    // ------------------------------------------------------------------
    // Create reconciliation
    // ------------------------------------------------------------------

    fn finish_create_folder(&self, temp_id: Uuid, canonical: Folder) {
        {
            let mut state = self.write_state();
            match state.folders.iter_mut().find(|f| f.id == temp_id) {
                Some(slot) => *slot = canonical,
                // A resync replaced the mirror while the insert was in
                // flight; the select already carried the canonical row
                // or the next realtime INSERT will.
                None => debug!(%temp_id, "temp folder gone before confirm; skipping swap"),
            }
        }
        self.clear_pending(temp_id);
        self.emit_changed(Table::Folders);
    }

    fn discard_temp_folder(&self, temp_id: Uuid) {
        {
            let mut state = self.write_state();
            state.folders.retain(|f| f.id != temp_id);
        }
        self.clear_pending(temp_id);
        self.emit_changed(Table::Folders);
    }

    fn finish_create_task(&self, temp_id: Uuid, canonical: Task) {
        {
            let mut state = self.write_state();
            match state.tasks.iter_mut().find(|t| t.id == temp_id) {
                Some(slot) => *slot = canonical,
                None => debug!(%temp_id, "temp task gone before confirm; skipping swap"),
            }
        }
        self.clear_pending(temp_id);
        self.emit_changed(Table::Tasks);
    }

    fn discard_temp_task(&self, temp_id: Uuid) {
        {
            let mut state = self.write_state();
            state.tasks.retain(|t| t.id != temp_id);
        }
        self.clear_pending(temp_id);
        self.emit_changed(Table::Tasks);
    }

    fn finish_create_goal(&self, temp_id: Uuid, canonical: Goal) {
        {
            let mut state = self.write_state();
            match state.goals.iter_mut().find(|g| g.id == temp_id) {
                Some(slot) => *slot = canonical,
                None => debug!(%temp_id, "temp goal gone before confirm; skipping swap"),
            }
        }
        self.clear_pending(temp_id);
        self.emit_changed(Table::Goals);
    }

    fn discard_temp_goal(&self, temp_id: Uuid) {
        {
            let mut state = self.write_state();
            state.goals.retain(|g| g.id != temp_id);
        }
        self.clear_pending(temp_id);
        self.emit_changed(Table::Goals);
    }

    fn finish_create_schedule(&self, temp_id: Uuid, canonical: ScheduleBlock) {
        {
            let mut state = self.write_state();
            match state.schedule.iter_mut().find(|b| b.id == temp_id) {
                Some(slot) => *slot = canonical,
                None => debug!(%temp_id, "temp schedule block gone before confirm; skipping swap"),
            }
        }
        self.clear_pending(temp_id);
        self.emit_changed(Table::Schedule);
    }

    fn discard_temp_schedule(&self, temp_id: Uuid) {
        {
            let mut state = self.write_state();
            state.schedule.retain(|b| b.id != temp_id);
        }
        self.clear_pending(temp_id);
        self.emit_changed(Table::Schedule);
    }

    /// Shared failure path for updates and moves: log, notify, resync.
    async fn fail_update(
        &self,
        table: Table,
        mutation: MutationKind,
        err: &crate::remote::RemoteError,
    ) -> Result<()> {
        warn!(%table, error = %err, "update failed to persist; forcing full resync");
        self.events.emit(StoreEvent::MutationFailed { table, mutation });
        self.resync().await
    }
}
