//! Id-based cross-references.
//!
//! spec.md §9 calls out the cycle between Window ↔ Seat ↔ Binding and
//! prescribes breaking it with unidirectional ownership plus
//! id-validated cross-references instead of the source's field-offset
//! recovery trick. `Id<T>` is a monotonic, never-reused handle; holders
//! look the target up in the owning container and simply get `None`
//! back once it is gone, instead of dereferencing a dangling pointer.

use std::fmt;
use std::hash::Hash;
use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};

pub struct Id<T> {
    value: u64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub fn value(self) -> u64 {
        self.value
    }

    #[cfg(test)]
    pub fn for_test(value: u64) -> Self {
        Self { value, _marker: PhantomData }
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}
impl<T> Copy for Id<T> {}
impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.value == other.value
    }
}
impl<T> Eq for Id<T> {}
impl<T> Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.value.hash(state);
    }
}
impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Id({})", self.value)
    }
}

/// Monotonic id allocator, one instance per container kind (windows,
/// outputs, bindings, ...).
pub struct IdAllocator<T> {
    next: AtomicU64,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Default for IdAllocator<T> {
    fn default() -> Self {
        Self { next: AtomicU64::new(1), _marker: PhantomData }
    }
}

impl<T> IdAllocator<T> {
    pub fn alloc(&self) -> Id<T> {
        let value = self.next.fetch_add(1, Ordering::Relaxed);
        Id { value, _marker: PhantomData }
    }
}
