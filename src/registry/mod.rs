//! Statement registry
//!
//! Maps opaque caller-visible handles to live prepared-statement
//! resources. A handle is a slot index plus a generation tag; the
//! generation counter is registry-wide and monotonic, so a handle value
//! is never reissued within one gateway lifetime even when its slot is
//! reused. Resolving a released or never-issued handle yields a stale
//! handle error, never a crash.

use serde::Serialize;
use std::fmt;

use crate::error::{Error, Result};

/// Opaque handle to a live prepared statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct StatementHandle {
    index: u32,
    generation: u32,
}

impl fmt::Display for StatementHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stmt-{}.{}", self.index, self.generation)
    }
}

struct Slot<T> {
    generation: u32,
    resource: Option<T>,
}

/// Generation-checked slot map for prepared-statement resources.
pub struct StatementRegistry<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    next_generation: u32,
    live: usize,
}

impl<T> StatementRegistry<T> {
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            next_generation: 0,
            live: 0,
        }
    }

    /// Issue a handle for a resource. O(1) amortized; the returned handle
    /// is guaranteed not currently (or previously) live.
    pub fn register(&mut self, resource: T) -> StatementHandle {
        let generation = self.next_generation;
        self.next_generation += 1;
        self.live += 1;

        let index = match self.free.pop() {
            Some(index) => {
                let slot = &mut self.slots[index as usize];
                slot.generation = generation;
                slot.resource = Some(resource);
                index
            }
            None => {
                self.slots.push(Slot {
                    generation,
                    resource: Some(resource),
                });
                (self.slots.len() - 1) as u32
            }
        };

        StatementHandle { index, generation }
    }

    /// Look up a live resource.
    pub fn resolve(&self, handle: StatementHandle) -> Result<&T> {
        self.slot(handle)
            .and_then(|slot| slot.resource.as_ref())
            .ok_or(Error::StaleHandle(handle))
    }

    /// Look up a live resource for mutation.
    pub fn resolve_mut(&mut self, handle: StatementHandle) -> Result<&mut T> {
        let slot = match self.slot_mut(handle) {
            Some(slot) => slot,
            None => return Err(Error::StaleHandle(handle)),
        };
        slot.resource.as_mut().ok_or(Error::StaleHandle(handle))
    }

    /// Remove a mapping, transferring ownership of the resource to the
    /// caller. Idempotent: releasing an unknown or already-released
    /// handle returns `None` rather than an error, so shutdown sweeps can
    /// call it blindly.
    pub fn release(&mut self, handle: StatementHandle) -> Option<T> {
        let slot = self.slot_mut(handle)?;
        let resource = slot.resource.take()?;
        self.free.push(handle.index);
        self.live -= 1;
        Some(resource)
    }

    /// Remove and return every live resource. Used at gateway shutdown to
    /// reclaim engine resources for statements never explicitly finalized.
    pub fn drain(&mut self) -> Vec<T> {
        let mut resources = Vec::with_capacity(self.live);
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if let Some(resource) = slot.resource.take() {
                self.free.push(index as u32);
                resources.push(resource);
            }
        }
        self.live = 0;
        resources
    }

    /// Number of live handles
    pub fn len(&self) -> usize {
        self.live
    }

    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    fn slot(&self, handle: StatementHandle) -> Option<&Slot<T>> {
        self.slots
            .get(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }

    fn slot_mut(&mut self, handle: StatementHandle) -> Option<&mut Slot<T>> {
        self.slots
            .get_mut(handle.index as usize)
            .filter(|slot| slot.generation == handle.generation)
    }
}

impl<T> Default for StatementRegistry<T> {
    fn default() -> Self {
        Self::new()
    }
}
