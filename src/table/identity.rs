use rustc_hash::FxHashMap as HashMap;

use crate::{Result, SoaError};

/// Maps stable identifiers to the physical slot currently holding their row.
///
/// Identifiers are handed out in increasing order and never reused, so until
/// the first erase an identifier is equal to the slot it was pushed into.
/// Erasing swaps the last row into the hole, after which identifiers and
/// slots drift apart; the identifier is the only stable way to refer to a
/// row.
///
/// Next to the identifier map, `owners` is kept parallel to the columns so
/// the owner of any slot (in particular the last one) is found without a
/// search.
#[derive(Clone, Debug, Default)]
pub struct Indirection {
    slots: HashMap<u32, u32>,
    owners: Vec<u32>,
    next: u32,
}

impl Indirection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new row in `slot`, which must be the slot right after the
    /// last tracked one.
    ///
    /// # Returns
    /// The freshly minted identifier.
    ///
    /// # Errors
    /// [`SoaError::IdentifiersExhausted`] once every `u32` has been handed
    /// out.
    pub fn mint(&mut self, slot: u32) -> Result<u32> {
        debug_assert_eq!(slot as usize, self.owners.len());
        let id = self.next;
        self.next = id.checked_add(1).ok_or(SoaError::IdentifiersExhausted)?;

        self.slots.insert(id, slot);
        self.owners.push(id);
        Ok(id)
    }

    #[inline]
    pub fn slot_of(&self, id: u32) -> Option<u32> {
        self.slots.get(&id).copied()
    }

    #[inline]
    pub fn owner_of(&self, slot: u32) -> Option<u32> {
        self.owners.get(slot as usize).copied()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.slots.contains_key(&id)
    }

    /// Forget `id` and move the owner of the last slot into the slot `id`
    /// occupied.
    ///
    /// When `id` owns the last slot itself nothing is repointed.
    ///
    /// # Returns
    /// The slot that `id` occupied, or `None` if `id` is not tracked.
    pub fn remove(&mut self, id: u32) -> Option<u32> {
        let slot = self.slots.remove(&id)?;
        let last = self.owners.len() as u32 - 1;

        if slot != last {
            let moved = self.owners[last as usize];
            self.slots.insert(moved, slot);
            self.owners[slot as usize] = moved;
        }
        self.owners.pop();

        Some(slot)
    }

    /// The identifiers of every live row, in slot order.
    pub fn owners(&self) -> &[u32] {
        &self.owners
    }

    pub fn len(&self) -> usize {
        self.owners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.owners.is_empty()
    }

    /// Forget every identifier. Minting restarts from zero.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.owners.clear();
        self.next = 0;
    }
}
