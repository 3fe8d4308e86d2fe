//! trellis-core: client mirror of a remote personal-productivity store.
//!
//! This crate provides the core functionality for:
//! - Flat in-memory collections of folders, tasks, goals and schedule
//!   blocks, mirrored from the remote authoritative store
//! - Optimistic create/update/remove with rollback or full resync on
//!   persistence failure
//! - Incremental reconciliation of the remote change feed
//! - The derived folder tree and the cycle guard on folder moves
//! - RemoteStore trait abstraction with an in-memory test implementation

pub mod config;
pub mod events;
pub mod guard;
pub mod model;
pub mod mutations;
pub mod realtime;
pub mod remote;
pub mod tree;
pub mod workspace;

pub use config::WorkspaceConfig;
pub use events::{EventBus, MutationKind, StoreEvent, Subscription};
pub use guard::can_move;
pub use model::{
    Folder, FolderKind, FolderPatch, Goal, GoalPatch, NewFolder, NewGoal, NewScheduleBlock,
    NewTask, Patch, Priority, ScheduleBlock, ScheduleBlockPatch, ScheduleKind, Table, Task,
    TaskKind, TaskPatch, TaskStatus,
};
pub use realtime::{ChangeEvent, ChangeKind, ChangeRecord};
pub use remote::{InMemoryRemote, RemoteError, RemoteOp, RemoteStore};
pub use tree::{build_tree, descendant_ids, find_by_id, flatten, FolderNode};
pub use workspace::{State, Workspace, WorkspaceError};
