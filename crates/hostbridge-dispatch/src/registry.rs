//! Host object registry
//!
//! Host-side values live in a generation-checked slab owned by the host.
//! A removed slot bumps its generation, so ids held by native code go stale
//! instead of aliasing whatever reuses the slot.

use crate::host::HostId;
use std::any::Any;
use std::fmt;
use std::rc::Rc;

/// Generation-checked, host-scoped id of a registered host value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HostObjectId {
    host: HostId,
    index: u32,
    generation: u32,
}

impl HostObjectId {
    pub fn host(&self) -> HostId {
        self.host
    }

    pub fn index(&self) -> u32 {
        self.index
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }
}

impl fmt::Display for HostObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}#{}", self.host, self.index, self.generation)
    }
}

struct Slot {
    generation: u32,
    value: Option<Rc<dyn Any>>,
}

pub(crate) struct HostRegistry {
    host: HostId,
    slots: Vec<Slot>,
    free: Vec<u32>,
    live: usize,
}

impl HostRegistry {
    pub(crate) fn new(host: HostId) -> Self {
        Self {
            host,
            slots: Vec::new(),
            free: Vec::new(),
            live: 0,
        }
    }

    pub(crate) fn insert(&mut self, value: Rc<dyn Any>) -> HostObjectId {
        self.live += 1;
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.value = Some(value);
            return HostObjectId {
                host: self.host,
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            value: Some(value),
        });
        HostObjectId {
            host: self.host,
            index,
            generation: 0,
        }
    }

    pub(crate) fn get(&self, id: HostObjectId) -> Option<Rc<dyn Any>> {
        self.slot(id).and_then(|slot| slot.value.clone())
    }

    pub(crate) fn remove(&mut self, id: HostObjectId) -> Option<Rc<dyn Any>> {
        if self.slot(id).is_none() {
            return None;
        }
        let slot = &mut self.slots[id.index as usize];
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        self.live -= 1;
        Some(value)
    }

    pub(crate) fn len(&self) -> usize {
        self.live
    }

    fn slot(&self, id: HostObjectId) -> Option<&Slot> {
        if id.host != self.host {
            return None;
        }
        self.slots
            .get(id.index as usize)
            .filter(|slot| slot.generation == id.generation)
    }
}
