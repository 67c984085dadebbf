//! # Bitset Pool
//!
//! Reusable scratch bitsets for visited-set tracking in search loops.
//! Parallel searchers lease a bitset, use it, and hand it back, so the
//! allocation is paid once per concurrent worker instead of once per query.
//!
//! A `Lease` derefs to the bitset and returns it to the pool when freed or
//! dropped. Bitsets are cleared before every handout.

use std::ops::{Deref, DerefMut};

use parking_lot::Mutex;
use roaring::RoaringBitmap;
use tracing::debug;

/// Identifies one pooled bitset for the duration of a lease
pub type LeaseId = usize;

/// Thread-safe pool of reusable bitsets
#[derive(Default)]
pub struct BitsetPool {
    /// `None` while the slot's bitset is leased out
    slots: Mutex<Vec<Option<RoaringBitmap>>>,
}

impl BitsetPool {
    pub fn new() -> Self {
        Self::default()
    }

    /// Lease a free bitset (cleared), registering a new one if none is free
    pub fn get(&self) -> Lease<'_> {
        let mut slots = self.slots.lock();

        for (id, slot) in slots.iter_mut().enumerate() {
            if let Some(mut bits) = slot.take() {
                bits.clear();
                return Lease { pool: self, id, bits };
            }
        }

        let id = slots.len();
        slots.push(None);
        debug!("Bitset pool grew to {} bitsets", slots.len());

        Lease {
            pool: self,
            id,
            bits: RoaringBitmap::new(),
        }
    }

    /// Return a leased bitset. Consuming the lease rules out use after free.
    pub fn free(&self, lease: Lease<'_>) {
        debug_assert!(std::ptr::eq(lease.pool, self), "lease freed into a different pool");
        drop(lease);
    }

    /// Number of registered bitsets
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of bitsets currently free
    pub fn available(&self) -> usize {
        self.slots.lock().iter().filter(|slot| slot.is_some()).count()
    }

    fn release(&self, id: LeaseId, bits: RoaringBitmap) {
        let mut slots = self.slots.lock();
        slots[id] = Some(bits);
    }
}

/// A bitset borrowed from a `BitsetPool`
pub struct Lease<'a> {
    pool: &'a BitsetPool,
    id: LeaseId,
    bits: RoaringBitmap,
}

impl Lease<'_> {
    pub fn id(&self) -> LeaseId {
        self.id
    }
}

impl Deref for Lease<'_> {
    type Target = RoaringBitmap;

    fn deref(&self) -> &RoaringBitmap {
        &self.bits
    }
}

impl DerefMut for Lease<'_> {
    fn deref_mut(&mut self) -> &mut RoaringBitmap {
        &mut self.bits
    }
}

impl Drop for Lease<'_> {
    fn drop(&mut self) {
        let bits = std::mem::take(&mut self.bits);
        self.pool.release(self.id, bits);
    }
}
