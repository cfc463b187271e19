//! Generational storage for emitters and particles
//!
//! Removing an entry vacates its slot in place and bumps the slot's
//! generation, so stale [`Handle`]s stop resolving. Vacated slots are reused
//! by later insertions and the vacant tail is trimmed on request. Trimmed
//! slots leave their generation behind, so a slot pushed again at the same
//! index never matches a handle issued before the trim.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

/// Reference to an entry in an [`Arena<T>`]
pub struct Handle<T> {
    index: u32,
    generation: u32,
    marker: PhantomData<fn() -> T>,
}

impl<T> Handle<T> {
    fn new(index: u32, generation: u32) -> Self {
        Self {
            index,
            generation,
            marker: PhantomData,
        }
    }

    pub fn index(self) -> usize {
        self.index as usize
    }

    pub fn generation(self) -> u32 {
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

impl<T> Hash for Handle<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.index.hash(state);
        self.generation.hash(state);
    }
}

impl<T> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({}v{})", self.index, self.generation)
    }
}

#[derive(Debug, Clone)]
struct Slot<T> {
    generation: u32,
    value: Option<T>,
}

#[derive(Debug, Clone)]
pub struct Arena<T> {
    slots: Vec<Slot<T>>,
    free: Vec<u32>,
    len: usize,
    /// Highest generation of any trimmed slot
    retired_generation: u32,
}

impl<T> Default for Arena<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            len: 0,
            retired_generation: 0,
        }
    }
}

impl<T> Arena<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, value: T) -> Handle<T> {
        self.len += 1;
        while let Some(index) = self.free.pop() {
            // Indices past a trimmed tail are stale
            if let Some(slot) = self.slots.get_mut(index as usize) {
                slot.value = Some(value);
                return Handle::new(index, slot.generation);
            }
        }

        let index = self.slots.len() as u32;
        let generation = self.retired_generation;
        self.slots.push(Slot {
            generation,
            value: Some(value),
        });
        Handle::new(index, generation)
    }

    /// Vacate the slot in place. Later lookups through `handle` fail.
    pub fn remove(&mut self, handle: Handle<T>) -> Option<T> {
        let slot = self.slots.get_mut(handle.index())?;
        if slot.generation != handle.generation {
            return None;
        }
        let value = slot.value.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(handle.index);
        self.len -= 1;
        Some(value)
    }

    pub fn get(&self, handle: Handle<T>) -> Option<&T> {
        self.slots
            .get(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_ref())
    }

    pub fn get_mut(&mut self, handle: Handle<T>) -> Option<&mut T> {
        self.slots
            .get_mut(handle.index())
            .filter(|slot| slot.generation == handle.generation)
            .and_then(|slot| slot.value.as_mut())
    }

    pub fn contains(&self, handle: Handle<T>) -> bool {
        self.get(handle).is_some()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of slots, occupied or not
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Handles of occupied slots, in slot order
    pub fn handles(&self) -> Vec<Handle<T>> {
        self.iter().map(|(handle, _)| handle).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Handle<T>, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, slot)| {
            slot.value
                .as_ref()
                .map(|value| (Handle::new(i as u32, slot.generation), value))
        })
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Handle<T>, &mut T)> {
        self.slots.iter_mut().enumerate().filter_map(|(i, slot)| {
            let generation = slot.generation;
            slot.value
                .as_mut()
                .map(|value| (Handle::new(i as u32, generation), value))
        })
    }

    /// Remove every entry for which `keep` returns false
    pub fn retain(&mut self, mut keep: impl FnMut(Handle<T>, &mut T) -> bool) {
        for handle in self.handles() {
            if let Some(value) = self.get_mut(handle)
                && !keep(handle, value)
            {
                self.remove(handle);
            }
        }
    }

    /// Drop vacant slots at the end once more than `threshold` have piled up
    pub fn trim(&mut self, threshold: usize) {
        let vacant_tail = self
            .slots
            .iter()
            .rev()
            .take_while(|slot| slot.value.is_none())
            .count();
        if vacant_tail <= threshold {
            return;
        }
        let new_len = self.slots.len() - vacant_tail;
        if let Some(highest) = self.slots[new_len..].iter().map(|slot| slot.generation).max() {
            self.retired_generation = self.retired_generation.max(highest);
        }
        self.slots.truncate(new_len);
        self.free.retain(|&index| (index as usize) < new_len);
    }

    pub fn clear(&mut self) {
        for slot in &mut self.slots {
            if slot.value.take().is_some() {
                slot.generation = slot.generation.wrapping_add(1);
            }
        }
        self.free = (0..self.slots.len() as u32).rev().collect();
        self.len = 0;
    }
}
