//! Folder rows: the self-referential hierarchy everything else hangs off.

use super::Patch;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Closed set of folder flavors.
///
/// The remote column is a plain string; keeping this as an enum makes an
/// unknown flavor a deserialization error instead of a silent fallthrough
/// in rendering dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FolderKind {
    Project,
    Notes,
    Finance,
    Fitness,
    Generic,
}

/// A folder row as stored remotely and mirrored locally.
///
/// Invariant: the `parent_id` chain never contains this folder's own id.
/// The cycle guard enforces this for local moves; corrupted remote data is
/// tolerated by the tree builder (orphan promotion), never repaired here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    pub id: Uuid,
    pub owner: Uuid,
    pub parent_id: Option<Uuid>,
    pub title: String,
    #[serde(rename = "type")]
    pub kind: FolderKind,
    pub color: Option<String>,
    pub icon: Option<String>,
    pub sort_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Caller-supplied fields for an optimistic folder create.
#[derive(Debug, Clone, Default)]
pub struct NewFolder {
    pub title: String,
    pub parent_id: Option<Uuid>,
    pub kind: Option<FolderKind>,
    pub color: Option<String>,
    pub icon: Option<String>,
    /// Omitted means append after the current last sibling.
    pub sort_order: Option<i64>,
}

/// Shallow field patch for a folder update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FolderPatch {
    pub parent_id: Patch<Uuid>,
    pub title: Option<String>,
    pub kind: Option<FolderKind>,
    pub color: Patch<String>,
    pub icon: Patch<String>,
    pub sort_order: Option<i64>,
}

impl Folder {
    /// Merge a patch into this row. Patched fields overwrite, everything
    /// else is untouched; `updated_at` is bumped by the caller.
    pub fn apply_patch(&mut self, patch: &FolderPatch) {
        patch.parent_id.apply_to(&mut self.parent_id);
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(kind) = patch.kind {
            self.kind = kind;
        }
        patch.color.apply_to(&mut self.color);
        patch.icon.apply_to(&mut self.icon);
        if let Some(sort_order) = patch.sort_order {
            self.sort_order = sort_order;
        }
    }
}
