/// A tentative local change waiting for the store's verdict.
///
/// `apply` snapshots the value and mutates it in place; the caller then either
/// `commit`s the authoritative value or `revert`s to the snapshot.
#[derive(Debug)]
#[must_use = "a pending change must be committed or reverted"]
pub struct Optimistic<T: Clone> {
    snapshot: T,
}

impl<T: Clone> Optimistic<T> {
    pub fn apply(target: &mut T, change: impl FnOnce(&mut T)) -> Self {
        let snapshot = target.clone();
        change(target);
        Self { snapshot }
    }

    /// Replace the tentative value with the authoritative one.
    pub fn commit(self, target: &mut T, authoritative: T) {
        *target = authoritative;
    }

    /// Restore the value captured before the change.
    pub fn revert(self, target: &mut T) {
        *target = self.snapshot;
    }

    pub fn snapshot(&self) -> &T {
        &self.snapshot
    }
}
