//! The uncommitted/committed pattern used by every externally-settable
//! knob (binding enabled, output state, window intent), per spec.md §9.

/// A value with a mutable-by-requests side and an observable-by-rest-
/// of-core side. Input/layout code must only ever read `committed`;
/// only `commit()` (called when the window-manager client's `commit`
/// request arrives) promotes `uncommitted` into it.
#[derive(Debug, Clone, Default)]
pub struct DoubleBuffered<T: Clone> {
    uncommitted: T,
    committed: T,
}

impl<T: Clone> DoubleBuffered<T> {
    pub fn new(initial: T) -> Self {
        Self { uncommitted: initial.clone(), committed: initial }
    }

    /// Read the value observable to input/layout code.
    pub fn committed(&self) -> &T {
        &self.committed
    }

    /// Mutate the side a wm request is allowed to touch.
    pub fn uncommitted_mut(&mut self) -> &mut T {
        &mut self.uncommitted
    }

    pub fn uncommitted(&self) -> &T {
        &self.uncommitted
    }

    /// Promote `uncommitted` to `committed`. Returns `true` if the
    /// value actually changed, so callers can decide whether a dirty
    /// flag needs to be set.
    pub fn commit(&mut self) -> bool
    where
        T: PartialEq,
    {
        if self.uncommitted == self.committed {
            return false;
        }
        self.committed = self.uncommitted.clone();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uncommitted_invisible_until_commit() {
        let mut db = DoubleBuffered::new(false);
        *db.uncommitted_mut() = true;
        assert!(!*db.committed(), "committed value must not change before commit()");
        assert!(db.commit());
        assert!(*db.committed());
    }

    #[test]
    fn commit_reports_no_change_when_stable() {
        let mut db = DoubleBuffered::new(5u32);
        assert!(!db.commit());
        *db.uncommitted_mut() = 5;
        assert!(!db.commit());
    }
}
