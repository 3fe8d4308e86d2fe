//! Three-state field patch for nullable columns.

/// Update intent for a nullable column.
///
/// A plain `Option` cannot distinguish "leave the column alone" from
/// "set it to NULL", so patches carry this three-state type for every
/// nullable field. Non-nullable fields use `Option<T>` with `None`
/// meaning keep.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Patch<T> {
    /// Leave the current value untouched.
    #[default]
    Keep,
    /// Overwrite with a new value.
    Set(T),
    /// Null out the column.
    Clear,
}

impl<T: Clone> Patch<T> {
    /// Merge this patch into a nullable field.
    pub fn apply_to(&self, slot: &mut Option<T>) {
        match self {
            Patch::Keep => {}
            Patch::Set(value) => *slot = Some(value.clone()),
            Patch::Clear => *slot = None,
        }
    }
}

impl<T> Patch<T> {
    /// Whether this patch changes anything.
    pub fn is_keep(&self) -> bool {
        matches!(self, Patch::Keep)
    }
}

/// Convenience for callers that already hold an `Option`: `Some` becomes
/// `Set`, `None` becomes `Clear`. Note this never produces `Keep`.
impl<T> From<Option<T>> for Patch<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(v) => Patch::Set(v),
            None => Patch::Clear,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keep_leaves_value() {
        let mut slot = Some(3);
        Patch::Keep.apply_to(&mut slot);
        assert_eq!(slot, Some(3));
    }

    #[test]
    fn set_overwrites() {
        let mut slot = Some(3);
        Patch::Set(7).apply_to(&mut slot);
        assert_eq!(slot, Some(7));
    }

    #[test]
    fn clear_nulls_out() {
        let mut slot = Some(3);
        Patch::<i32>::Clear.apply_to(&mut slot);
        assert_eq!(slot, None);
    }

    #[test]
    fn from_option_maps_none_to_clear() {
        assert_eq!(Patch::from(Some(1)), Patch::Set(1));
        assert_eq!(Patch::<i32>::from(None), Patch::Clear);
    }
}
