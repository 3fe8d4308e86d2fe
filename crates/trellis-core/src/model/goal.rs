//! Goal rows: long-running targets with a progress amount.

use super::Patch;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: Uuid,
    pub owner: Uuid,
    pub folder_id: Option<Uuid>,
    pub title: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub deadline: Option<NaiveDate>,
    pub pinned: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Goal {
    /// Progress toward the target, clamped to `0.0..=1.0`. A zero target
    /// reads as complete.
    pub fn progress(&self) -> f64 {
        if self.target_amount <= 0.0 {
            return 1.0;
        }
        (self.current_amount / self.target_amount).clamp(0.0, 1.0)
    }
}

/// Caller-supplied fields for an optimistic goal create.
#[derive(Debug, Clone, Default)]
pub struct NewGoal {
    pub title: String,
    pub folder_id: Option<Uuid>,
    pub target_amount: f64,
    pub current_amount: Option<f64>,
    pub deadline: Option<NaiveDate>,
    pub pinned: Option<bool>,
}

/// Shallow field patch for a goal update.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GoalPatch {
    pub folder_id: Patch<Uuid>,
    pub title: Option<String>,
    pub target_amount: Option<f64>,
    pub current_amount: Option<f64>,
    pub deadline: Patch<NaiveDate>,
    pub pinned: Option<bool>,
}

impl Goal {
    pub fn apply_patch(&mut self, patch: &GoalPatch) {
        patch.folder_id.apply_to(&mut self.folder_id);
        if let Some(title) = &patch.title {
            self.title = title.clone();
        }
        if let Some(target) = patch.target_amount {
            self.target_amount = target;
        }
        if let Some(current) = patch.current_amount {
            self.current_amount = current;
        }
        patch.deadline.apply_to(&mut self.deadline);
        if let Some(pinned) = patch.pinned {
            self.pinned = pinned;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn progress_clamps_and_handles_zero_target() {
        let mut goal = Goal {
            id: Uuid::new_v4(),
            owner: Uuid::new_v4(),
            folder_id: None,
            title: "emergency fund".into(),
            target_amount: 1000.0,
            current_amount: 250.0,
            deadline: None,
            pinned: false,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(goal.progress(), 0.25);

        goal.current_amount = 2000.0;
        assert_eq!(goal.progress(), 1.0);

        goal.target_amount = 0.0;
        assert_eq!(goal.progress(), 1.0);
    }
}
