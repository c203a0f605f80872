// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Fixed-capacity slab with generation-checked handles.
//!
//! The pool owns every value. A [`Handle`] only names a slot and carries the
//! slot generation it was issued for; once the slot is freed the generation
//! moves on and stale handles resolve to `None`.

use core::fmt;
use core::marker::PhantomData;

use thiserror::Error;

/// Allocation failed because the pool is full.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("pool '{name}' exhausted (capacity {capacity}); increase its configured size")]
pub struct PoolError {
    /// Pool name.
    pub name: &'static str,
    /// Configured capacity.
    pub capacity: usize,
}

/// Typed reference to a pool slot.
pub struct Handle<T> {
    index: u32,
    generation: u32,
    _marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    /// Slot index.
    pub fn index(&self) -> u32 {
        self.index
    }

    /// Generation the handle was issued for.
    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl<T> Clone for Handle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Handle<T> {}

impl<T> PartialEq for Handle<T> {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index && self.generation == other.generation
    }
}

impl<T> Eq for Handle<T> {}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

/// Fixed-size pool of `T`.
pub struct Pool<T> {
    name: &'static str,
    capacity: usize,
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("name", &self.name)
            .field("capacity", &self.capacity)
            .field("len", &self.len)
            .finish()
    }
}

impl<T> Pool<T> {
    /// Empty pool holding at most `capacity` values.
    pub fn new(name: &'static str, capacity: usize) -> Self {
        Self {
            name,
            capacity,
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
        }
    }

    /// Pool name used in errors.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Maximum number of live values.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Number of live values.
    pub fn len(&self) -> usize {
        self.len
    }

    /// `true` when nothing is allocated.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Stores `value` and returns its handle.
    pub fn alloc(&mut self, value: T) -> Result<Handle<T>, PoolError> {
        let index = if let Some(index) = self.free.pop() {
            index
        } else if self.slots.len() < self.capacity {
            let index = u32::try_from(self.slots.len()).map_err(|_| self.exhausted())?;
            self.slots.push(Slot {
                generation: 0,
                value: None,
            });
            index
        } else {
            return Err(self.exhausted());
        };
        let slot = &mut self.slots[index as usize];
        slot.value = Some(value);
        self.len += 1;
        Ok(Handle {
            index,
            generation: slot.generation,
            _marker: PhantomData,
        })
    }

    fn exhausted(&self) -> PoolError {
        PoolError {
            name: self.name,
            capacity: self.capacity,
        }
    }

    fn slot(&self, handle: Handle<T>) -> Option<&Slot<T>> {
        self.slots
            .get(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
    }

    /// Value behind `handle`, or `None` when the handle is stale.
    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.slot(handle).and_then(|s| s.value.as_ref())
    }

    /// Mutable value behind `handle`, or `None` when the handle is stale.
    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)
            .and_then(|s| s.value.as_mut())
    }

    /// Releases the slot and returns its value.
    pub fn free(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self
            .slots
            .get_mut(handle.index as usize)
            .filter(|s| s.generation == handle.generation)?;
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    /// Releases every slot; all outstanding handles become stale.
    pub fn clear(&mut self) {
        self.free.clear();
        for (i, slot) in self.slots.iter_mut().enumerate().rev() {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
            if let Ok(i) = u32::try_from(i) {
                self.free.push(i);
            }
        }
        self.len = 0;
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn exhaustion_is_an_error() {
        let mut pool = Pool::new("test", 2);
        pool.alloc(1).unwrap();
        pool.alloc(2).unwrap();
        let err = pool.alloc(3).unwrap_err();
        assert_eq!(err.capacity, 2);
        assert_eq!(err.name, "test");
    }

    #[test]
    fn freed_handles_go_stale() {
        let mut pool = Pool::new("test", 1);
        let a = pool.alloc("a").unwrap();
        assert_eq!(pool.free(a), Some("a"));
        let b = pool.alloc("b").unwrap();
        assert_eq!(a.index(), b.index());
        assert!(pool.get(a).is_none());
        assert_eq!(pool.get(b), Some(&"b"));
        assert_eq!(pool.free(a), None);
    }

    #[test]
    fn clear_invalidates_everything() {
        let mut pool = Pool::new("test", 3);
        let handles: Vec<_> = (0..3).map(|i| pool.alloc(i).unwrap()).collect();
        pool.clear();
        assert!(pool.is_empty());
        assert!(handles.iter().all(|h| pool.get(*h).is_none()));
        for i in 0..3 {
            pool.alloc(i).unwrap();
        }
        assert_eq!(pool.len(), 3);
    }
}
