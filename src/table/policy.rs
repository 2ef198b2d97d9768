use std::fmt;

use crate::{
    Result,
    buffer::{Arena, Layout},
    table::{Columns, FillColumns, identity::Indirection},
};

/// How a [`Table`] populates its columns and what a push hands back.
///
/// The table engine is shared; a policy only decides the parts that differ
/// between fixed, growable and identity-stable tables.
///
/// [`Table`]: crate::Table
pub trait Policy<C: Columns>: Default + fmt::Debug {
    /// Bind freshly reset `columns` to the regions of `arena`.
    ///
    /// # Returns
    /// The number of rows populated by binding.
    ///
    /// # Safety
    /// `arena` must have been allocated from `layout`, and `layout` planned
    /// from `C::REGIONS` with `capacity` slots. Every column must be empty.
    unsafe fn bind(columns: &mut C, arena: &Arena, layout: &Layout, capacity: u32) -> u32;

    /// Called when the table releases its memory.
    fn reset(&mut self) {}
}

/// A policy for tables that grow on push.
pub trait Growable<C: Columns>: Policy<C> {
    /// Called right before a value lands in `slot`.
    ///
    /// # Returns
    /// The key the caller uses to address the row later on.
    fn admit(&mut self, slot: u32) -> Result<u32>;
}

/// Capacity is fixed at initialisation and every slot is populated with its
/// default value. Rows are addressed by index.
#[derive(Clone, Copy, Debug, Default)]
pub struct Fixed;

impl<C: FillColumns> Policy<C> for Fixed {
    unsafe fn bind(columns: &mut C, arena: &Arena, layout: &Layout, capacity: u32) -> u32 {
        unsafe { columns.bind_filled(arena, layout, capacity) };
        capacity
    }
}

/// Capacity is a reservation and grows by half on demand. Rows are addressed
/// by the index a push returned, which never changes.
#[derive(Clone, Copy, Debug, Default)]
pub struct Dynamic;

impl<C: Columns> Policy<C> for Dynamic {
    unsafe fn bind(columns: &mut C, arena: &Arena, layout: &Layout, _capacity: u32) -> u32 {
        unsafe { columns.bind(arena, layout) };
        0
    }
}

impl<C: Columns> Growable<C> for Dynamic {
    #[inline]
    fn admit(&mut self, slot: u32) -> Result<u32> {
        Ok(slot)
    }
}

/// Grows like [`Dynamic`], but rows are addressed by identifiers that stay
/// valid while other rows are erased and compacted.
#[derive(Clone, Debug, Default)]
pub struct Mutable {
    ids: Indirection,
}

impl Mutable {
    pub fn ids(&self) -> &Indirection {
        &self.ids
    }

    pub(crate) fn ids_mut(&mut self) -> &mut Indirection {
        &mut self.ids
    }
}

impl<C: Columns> Policy<C> for Mutable {
    unsafe fn bind(columns: &mut C, arena: &Arena, layout: &Layout, _capacity: u32) -> u32 {
        unsafe { columns.bind(arena, layout) };
        0
    }

    fn reset(&mut self) {
        self.ids.clear();
    }
}

impl<C: Columns> Growable<C> for Mutable {
    fn admit(&mut self, slot: u32) -> Result<u32> {
        // a slot with an owner is an existing row being filled in by a
        // shorter column
        match self.ids.owner_of(slot) {
            Some(id) => Ok(id),
            None => self.ids.mint(slot),
        }
    }
}
