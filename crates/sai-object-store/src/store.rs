//! Fixed-capacity indexed object store.
//!
//! Each ACL object type lives in its own `IndexedStore`, sized from
//! configuration. Allocation is two-phase: [`IndexedStore::reserve`] claims a
//! slot (so the index can be encoded into a handle before the record is
//! built), and [`IndexedStore::set`] fills it. A reserved slot already counts
//! against capacity.
//!
//! # Example
//!
//! ```
//! use sai_object_store::IndexedStore;
//!
//! let mut store: IndexedStore<&str> = IndexedStore::with_capacity("tables", 2);
//! let idx = store.reserve().unwrap();
//! store.set(idx, "ingress").unwrap();
//! assert_eq!(store.get(idx).unwrap(), &"ingress");
//!
//! store.free(idx).unwrap();
//! assert!(store.get(idx).is_err());
//! ```

use log::debug;
use sonic_sai::SaiError;
use thiserror::Error;

/// Error type for store operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("{store}: all {capacity} slots in use")]
    Exhausted { store: &'static str, capacity: u32 },

    #[error("{store}: index {index} out of range")]
    InvalidIndex { store: &'static str, index: u32 },

    #[error("{store}: slot {index} is free")]
    NotAllocated { store: &'static str, index: u32 },

    #[error("{store}: slot {index} is reserved but has no record")]
    NotSet { store: &'static str, index: u32 },

    #[error("{store}: slot {index} already free")]
    AlreadyFree { store: &'static str, index: u32 },

    #[error("{store}: reference count underflow on slot {index}")]
    RefCountUnderflow { store: &'static str, index: u32 },
}

impl From<StoreError> for SaiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Exhausted { .. } => SaiError::insufficient_resources(err.to_string()),
            StoreError::InvalidIndex { .. }
            | StoreError::NotAllocated { .. }
            | StoreError::NotSet { .. }
            | StoreError::AlreadyFree { .. } => SaiError::not_found(err.to_string()),
            StoreError::RefCountUnderflow { .. } => SaiError::failure(err.to_string()),
        }
    }
}

/// State of one slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotState<T> {
    Free,
    Reserved,
    Occupied(T),
}

/// A fixed-capacity array of records addressed by index.
#[derive(Debug, Clone)]
pub struct IndexedStore<T> {
    name: &'static str,
    slots: Vec<SlotState<T>>,
    used: u32,
    /// Search start for the next reservation.
    hint: usize,
}

impl<T> IndexedStore<T> {
    /// Creates a store with `capacity` free slots.
    pub fn with_capacity(name: &'static str, capacity: u32) -> Self {
        let mut slots = Vec::with_capacity(capacity as usize);
        slots.resize_with(capacity as usize, || SlotState::Free);
        Self {
            name,
            slots,
            used: 0,
            hint: 0,
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the number of reserved or occupied slots.
    pub fn len(&self) -> u32 {
        self.used
    }

    pub fn is_empty(&self) -> bool {
        self.used == 0
    }

    pub fn capacity(&self) -> u32 {
        self.slots.len() as u32
    }

    /// Returns the number of free slots.
    pub fn available(&self) -> u32 {
        self.capacity() - self.used
    }

    /// Claims the lowest free slot at or after the last freed/reserved position.
    pub fn reserve(&mut self) -> Result<u32, StoreError> {
        let cap = self.slots.len();
        if self.used as usize >= cap {
            return Err(StoreError::Exhausted {
                store: self.name,
                capacity: cap as u32,
            });
        }
        let found = (0..cap)
            .map(|off| (self.hint + off) % cap)
            .find(|i| matches!(self.slots[*i], SlotState::Free));
        let Some(index) = found else {
            return Err(StoreError::Exhausted {
                store: self.name,
                capacity: cap as u32,
            });
        };
        self.slots[index] = SlotState::Reserved;
        self.used += 1;
        self.hint = (index + 1) % cap;
        debug!("{}: reserved slot {}", self.name, index);
        Ok(index as u32)
    }

    /// Stores a record in a reserved or occupied slot.
    ///
    /// Returns the record previously held, if any.
    pub fn set(&mut self, index: u32, record: T) -> Result<Option<T>, StoreError> {
        let name = self.name;
        let slot = self.slot_mut(index)?;
        match std::mem::replace(slot, SlotState::Occupied(record)) {
            SlotState::Free => {
                *slot = SlotState::Free;
                Err(StoreError::NotAllocated { store: name, index })
            }
            SlotState::Reserved => Ok(None),
            SlotState::Occupied(old) => Ok(Some(old)),
        }
    }

    pub fn get(&self, index: u32) -> Result<&T, StoreError> {
        match self.slot(index)? {
            SlotState::Occupied(record) => Ok(record),
            SlotState::Reserved => Err(StoreError::NotSet {
                store: self.name,
                index,
            }),
            SlotState::Free => Err(StoreError::NotAllocated {
                store: self.name,
                index,
            }),
        }
    }

    pub fn get_mut(&mut self, index: u32) -> Result<&mut T, StoreError> {
        let name = self.name;
        match self.slot_mut(index)? {
            SlotState::Occupied(record) => Ok(record),
            SlotState::Reserved => Err(StoreError::NotSet { store: name, index }),
            SlotState::Free => Err(StoreError::NotAllocated { store: name, index }),
        }
    }

    /// Returns true if the slot holds a record.
    pub fn contains(&self, index: u32) -> bool {
        matches!(self.slot(index), Ok(SlotState::Occupied(_)))
    }

    /// Releases a reserved or occupied slot, returning its record.
    pub fn free(&mut self, index: u32) -> Result<Option<T>, StoreError> {
        let name = self.name;
        let slot = self.slot_mut(index)?;
        let prev = std::mem::replace(slot, SlotState::Free);
        let record = match prev {
            SlotState::Free => return Err(StoreError::AlreadyFree { store: name, index }),
            SlotState::Reserved => None,
            SlotState::Occupied(record) => Some(record),
        };
        self.used -= 1;
        debug!("{}: freed slot {}", name, index);
        Ok(record)
    }

    /// Iterates occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &T)> {
        self.slots.iter().enumerate().filter_map(|(i, s)| match s {
            SlotState::Occupied(record) => Some((i as u32, record)),
            _ => None,
        })
    }

    /// Returns the indices of occupied slots.
    pub fn indices(&self) -> Vec<u32> {
        self.iter().map(|(i, _)| i).collect()
    }

    fn slot(&self, index: u32) -> Result<&SlotState<T>, StoreError> {
        self.slots.get(index as usize).ok_or(StoreError::InvalidIndex {
            store: self.name,
            index,
        })
    }

    fn slot_mut(&mut self, index: u32) -> Result<&mut SlotState<T>, StoreError> {
        let name = self.name;
        self.slots
            .get_mut(index as usize)
            .ok_or(StoreError::InvalidIndex { store: name, index })
    }
}

impl<T: crate::RefCounted> IndexedStore<T> {
    /// Increments the reference count of the record at `index`.
    ///
    /// **This never creates records.**
    pub fn increment_ref(&mut self, index: u32) -> Result<u32, StoreError> {
        Ok(self.get_mut(index)?.increment_ref())
    }

    /// Decrements the reference count of the record at `index`.
    pub fn decrement_ref(&mut self, index: u32) -> Result<u32, StoreError> {
        let name = self.name;
        self.get_mut(index)?
            .decrement_ref()
            .ok_or(StoreError::RefCountUnderflow { store: name, index })
    }

    /// Returns the reference count of the record at `index`.
    pub fn ref_count(&self, index: u32) -> Result<u32, StoreError> {
        Ok(self.get(index)?.ref_count())
    }
}
