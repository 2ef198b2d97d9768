pub mod identity;
pub mod macros;
pub mod policy;

use std::fmt;

use tracing::{Level, event};

use crate::{
    Column, GROWTH_DENOMINATOR, GROWTH_NUMERATOR, Result, SizeType, SoaError,
    buffer::{Arena, Layout, Region},
};

pub use identity::Indirection;
pub use policy::{Dynamic, Fixed, Growable, Mutable, Policy};

/// A set of columns that can share one [`Arena`].
///
/// Implemented by the column structs that [`table_spec!`] generates; writing
/// an implementation by hand is possible but every method has to treat the
/// columns in the same order as [`Columns::REGIONS`].
///
/// # Safety
/// `REGIONS` must list exactly one region per column, in the order the
/// columns are bound and migrated, and every method must forward to each
/// column exactly once.
///
/// [`table_spec!`]: crate::table_spec
pub unsafe trait Columns: Default {
    /// One region per column, in declaration order.
    const REGIONS: &'static [Region];

    /// A whole record: one value per column, in declaration order.
    type Row;

    /// Bind every (empty) column to its part of `arena`.
    ///
    /// # Safety
    /// `arena` must be allocated from `layout`, planned from `Self::REGIONS`.
    unsafe fn bind(&mut self, arena: &Arena, layout: &Layout);

    /// Move every column's live elements into its part of `arena`.
    ///
    /// # Safety
    /// As for [`Columns::bind`], with `layout` planned for at least as many
    /// slots as the longest column holds.
    unsafe fn migrate(&mut self, arena: &Arena, layout: &Layout);

    /// Call `visit` with the size of each column.
    fn visit_sizes(&self, visit: &mut dyn FnMut(u32));

    /// Append one value to every column.
    ///
    /// # Safety
    /// Every column must have room for one more element.
    unsafe fn append_row(&mut self, row: Self::Row);

    /// # Safety
    /// See [`Column::destroy_at`].
    unsafe fn destroy_at(&mut self, slot: u32);

    /// # Safety
    /// See [`Column::compact_remove`].
    unsafe fn compact_remove(&mut self, erased: u32, last: u32);

    /// Drop every live element and detach all columns.
    ///
    /// # Safety
    /// The owning table must account for every column becoming empty.
    unsafe fn reset(&mut self);
}

/// Columns whose element types all have a default value, which is what a
/// [`Fixed`] table populates its slots with.
///
/// # Safety
/// Same contract as [`Columns`].
pub unsafe trait FillColumns: Columns {
    /// Bind every (empty) column and fill all `capacity` slots.
    ///
    /// # Safety
    /// As for [`Columns::bind`], with `layout` planned for `capacity` slots.
    unsafe fn bind_filled(&mut self, arena: &Arena, layout: &Layout, capacity: u32);
}

/// The struct-of-arrays engine behind every generated table.
///
/// A table owns one [`Arena`] and the columns bound into it. Whether it can
/// grow, and whether rows are addressed by index or by identifier, is decided
/// by its [`Policy`]:
/// * [`Fixed`]: capacity set once by [`Table::init`], every slot populated.
/// * [`Dynamic`]: append-only, grows by half when a column runs out of room.
/// * [`Mutable`]: grows like [`Dynamic`] and supports O(1)
///   [`erase`](Table::erase) through an identifier indirection.
///
/// Tables are usually declared with [`table_spec!`](crate::table_spec), which
/// wraps a `Table` and adds named accessors per column.
pub struct Table<C: Columns, P: Policy<C> = Dynamic> {
    columns: C,
    arena: Option<Arena>,
    layout: Layout,
    capacity: u32,
    len: u32,
    policy: P,
}

impl<C: Columns, P: Policy<C>> Default for Table<C, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Columns, P: Policy<C>> Table<C, P> {
    /// An uninitialised table. Nothing is allocated until [`Table::init`] (or,
    /// for growable policies, the first push).
    pub fn new() -> Self {
        Self {
            columns: C::default(),
            arena: None,
            layout: Layout::new(),
            capacity: 0,
            len: 0,
            policy: P::default(),
        }
    }

    pub fn with_capacity(capacity: u32) -> Result<Self> {
        let mut table = Self::new();
        table.init(capacity)?;
        Ok(table)
    }

    /// Allocate room for `capacity` rows in a single block.
    ///
    /// Any previous content is dropped and its memory released first.
    ///
    /// # Errors
    /// * [`SoaError::CapacityOverflow`] if the block size overflows.
    /// * [`SoaError::AllocationFailed`] if the allocator gives up.
    pub fn init(&mut self, capacity: u32) -> Result<()> {
        self.release();

        let layout = Layout::plan(C::REGIONS, capacity)?;
        let arena = self.arena.insert(Arena::allocate(&layout)?);
        self.capacity = capacity;

        // SAFETY: the columns were emptied by `release` and `arena` was just
        // allocated from `layout`, planned from `C::REGIONS` for `capacity`.
        self.len = unsafe { P::bind(&mut self.columns, arena, &layout, capacity) };

        event!(
            Level::DEBUG,
            capacity,
            bytes = layout.len(),
            columns = layout.parts(),
            "initialised table"
        );
        self.layout = layout;
        Ok(())
    }

    /// Drop every element and free the backing memory.
    ///
    /// The table returns to its uninitialised state; calling this twice is a
    /// no-op the second time.
    pub fn clear(&mut self) {
        if self.arena.is_some() {
            event!(Level::TRACE, capacity = self.capacity, len = self.len, "releasing table");
        }
        self.release();
    }

    fn release(&mut self) {
        // SAFETY: elements are dropped before the arena they live in, and
        // every counter is reset below.
        unsafe { self.columns.reset() };
        self.arena = None;
        self.layout = Layout::new();
        self.capacity = 0;
        self.len = 0;
        self.policy.reset();
    }

    /// The number of rows, i.e. the size of the longest column.
    #[inline]
    pub fn len(&self) -> u32 {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    #[inline]
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Whether the table currently owns a memory block.
    pub fn is_allocated(&self) -> bool {
        self.arena.is_some()
    }

    /// Where each column currently lives inside the memory block.
    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn columns(&self) -> &C {
        &self.columns
    }

    /// Mutable access to the columns.
    ///
    /// Safe code writes through the `<field>_mut_slice` accessors a
    /// [`table_spec!`](crate::table_spec) table generates instead.
    ///
    /// ```compile_fail,E0133
    /// colonnade::table_spec! {
    ///     struct Pairs: Dynamic { x: u64, y: u64 }
    /// }
    ///
    /// let mut pairs = Pairs::new();
    /// pairs.push((1, 2)).unwrap();
    /// let stolen = std::mem::take(&mut pairs.columns_mut().x);
    /// ```
    ///
    /// # Safety
    /// Every column points into this table's memory block. The caller must
    /// not move, swap or replace a column (or the column set itself) and may
    /// only write elements through the columns' slices. In a [`Mutable`]
    /// table a row's values must stay in the same slot across all columns.
    pub unsafe fn columns_mut(&mut self) -> &mut C {
        &mut self.columns
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// The smallest and largest column sizes.
    pub fn size_bounds(&self) -> (u32, u32) {
        let mut bounds = (u32::MAX, 0);
        self.columns.visit_sizes(&mut |size| {
            bounds = (bounds.0.min(size), bounds.1.max(size));
        });
        bounds
    }
}

impl<C: Columns, P: Growable<C>> Table<C, P> {
    /// Append `value` to the column selected by `column`, growing the table
    /// first if that column is full.
    ///
    /// # Returns
    /// The key of the row the value landed in: its index for [`Dynamic`]
    /// tables, its identifier for [`Mutable`] ones.
    ///
    /// # Safety
    /// `column` must return the same field of the columns it is given on
    /// every call and must not otherwise touch them; see
    /// [`Table::columns_mut`].
    pub unsafe fn push_with<T, F>(&mut self, value: T, column: F) -> Result<u32>
    where
        F: Fn(&mut C) -> &mut Column<T>,
    {
        let slot = column(&mut self.columns).size();
        if slot == self.capacity {
            self.grow()?;
        }
        let key = self.policy.admit(slot)?;

        // SAFETY: `slot < capacity` once grown.
        unsafe { column(&mut self.columns).append(value) };
        self.len = self.len.max(slot + 1);
        Ok(key)
    }

    /// Append a whole record, one value per column.
    ///
    /// # Errors
    /// [`SoaError::Ragged`] if the columns do not all have the same size, as
    /// the values would not end up in the same row.
    pub fn push_row(&mut self, row: C::Row) -> Result<u32> {
        let (shortest, longest) = self.size_bounds();
        if shortest != longest {
            return Err(SoaError::Ragged { shortest, longest });
        }
        if longest == self.capacity {
            self.grow()?;
        }
        let key = self.policy.admit(longest)?;

        // SAFETY: every column holds `longest < capacity` elements.
        unsafe { self.columns.append_row(row) };
        self.len = longest + 1;
        Ok(key)
    }

    /// Move every column into a block half again as large.
    fn grow(&mut self) -> Result<()> {
        let capacity = grown_capacity(self.capacity)?;
        let layout = Layout::plan(C::REGIONS, capacity)?;
        let arena = Arena::allocate(&layout)?;

        // SAFETY: `arena` is planned from `C::REGIONS` and larger than the
        // current block; the old block is only freed after the move.
        unsafe { self.columns.migrate(&arena, &layout) };

        event!(
            Level::DEBUG,
            from = self.capacity,
            to = capacity,
            bytes = layout.len(),
            "grew table"
        );
        self.arena = Some(arena);
        self.layout = layout;
        self.capacity = capacity;
        Ok(())
    }
}

impl<C: Columns> Table<C, Mutable> {
    /// The slot currently holding the row of `id`.
    pub fn slot_of(&self, id: u32) -> Result<u32> {
        self.policy.ids().slot_of(id).ok_or(SoaError::NotFound { id })
    }

    pub fn contains(&self, id: u32) -> bool {
        self.policy.ids().contains(id)
    }

    /// The identifier of every row, parallel to the columns.
    pub fn handles(&self) -> &[u32] {
        self.policy.ids().owners()
    }

    /// The value of `id`'s row in the column selected by `column`.
    ///
    /// `name` only labels the [`SoaError::Vacant`] error.
    pub fn get<T, F>(&self, id: u32, column: F, name: &'static str) -> Result<&T>
    where
        F: FnOnce(&C) -> &Column<T>,
    {
        let slot = self.slot_of(id)?;
        column(&self.columns)
            .get(slot as usize)
            .ok_or(SoaError::Vacant { id, column: name })
    }

    /// Mutable counterpart of [`Table::get`].
    ///
    /// # Safety
    /// `column` must return a field of the columns it is given and must not
    /// otherwise touch them; see [`Table::columns_mut`].
    pub unsafe fn get_mut<T, F>(&mut self, id: u32, column: F, name: &'static str) -> Result<&mut T>
    where
        F: FnOnce(&mut C) -> &mut Column<T>,
    {
        let slot = self.slot_of(id)?;
        column(&mut self.columns)
            .get_mut(slot as usize)
            .ok_or(SoaError::Vacant { id, column: name })
    }

    /// Remove the row of `id` by moving the last row into its place.
    ///
    /// The identifier of the moved row keeps pointing at it; only its slot
    /// changes.
    ///
    /// # Returns
    /// `false` if `id` is not in the table, in which case nothing happens.
    ///
    /// # Errors
    /// [`SoaError::Ragged`] if a column holds a value for `id` but does not
    /// reach the last row, since erasing would leave a hole in it. The table
    /// is left untouched.
    pub fn erase(&mut self, id: u32) -> Result<bool> {
        let Some(slot) = self.policy.ids().slot_of(id) else {
            return Ok(false);
        };
        let last = self.len - 1;

        let mut hole = None;
        self.columns.visit_sizes(&mut |size| {
            if slot < size && size <= last {
                hole = Some(size);
            }
        });
        if let Some(shortest) = hole {
            return Err(SoaError::Ragged {
                shortest,
                longest: self.len,
            });
        }

        self.policy.ids_mut().remove(id);
        // SAFETY: `slot` is live in every column reaching it and is destroyed
        // before the last row is moved over it.
        unsafe {
            self.columns.destroy_at(slot);
            self.columns.compact_remove(slot, last);
        }
        self.len = last;

        event!(Level::TRACE, id, slot, last, "erased row");
        Ok(true)
    }
}

impl<C: Columns, P: Policy<C>> Drop for Table<C, P> {
    fn drop(&mut self) {
        self.release();
    }
}

impl<C: Columns, P: Policy<C>> fmt::Debug for Table<C, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Table")
            .field("len", &self.len)
            .field("capacity", &self.capacity)
            .field("layout", &self.layout)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

/// The next capacity: half again as large, and always at least one more.
fn grown_capacity(capacity: SizeType) -> Result<SizeType> {
    let grown = (capacity as u64 * GROWTH_NUMERATOR as u64 / GROWTH_DENOMINATOR as u64)
        .max(capacity as u64 + 1)
        .min(SizeType::MAX as u64) as SizeType;

    if grown <= capacity {
        return Err(SoaError::CapacityOverflow {
            requested: capacity as u64 + 1,
        });
    }
    Ok(grown)
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    crate::table_spec! {
        #[derive(Debug)]
        struct Pair: Fixed {
            x: i32,
            y: String,
        }
    }

    crate::table_spec! {
        struct Growing: Dynamic {
            x: i32,
            y: String,
        }
    }

    crate::table_spec! {
        struct Tracked: Dynamic {
            token: Rc<()>,
            n: u8,
        }
    }

    crate::table_spec! {
        struct Entities: Mutable {
            x: i32,
            name: String,
        }
    }

    #[test]
    fn growth_is_half_again() {
        let steps: Vec<u32> = [0, 1, 2, 3, 4, 6, 9]
            .into_iter()
            .map(|c| grown_capacity(c).unwrap())
            .collect();

        assert_eq!(steps, [1, 2, 3, 4, 6, 9, 13]);
        assert_eq!(grown_capacity(u32::MAX - 1).unwrap(), u32::MAX);
        assert!(grown_capacity(u32::MAX).is_err());
    }

    #[test]
    fn fixed_set_then_get() {
        let mut pair = Pair::with_capacity(2).unwrap();
        for i in 0..2 {
            pair.set_x(i, i as i32);
            pair.set_y(i, "Hello".to_owned());
        }

        assert_eq!(*pair.get_x(0), 0);
        assert_eq!(*pair.get_x(1), 1);
        assert_eq!(pair.get_y(1), "Hello");
        assert_eq!(pair.len(), 2);
    }

    #[test]
    fn fixed_slots_start_as_defaults() {
        let pair = Pair::with_capacity(3).unwrap();

        assert_eq!(pair.x_slice(), [0, 0, 0]);
        assert!(pair.y_slice().iter().all(String::is_empty));
        assert_eq!(pair.capacity(), 3);
    }

    #[test]
    fn fixed_clear_twice() {
        let mut pair = Pair::with_capacity(2).unwrap();
        pair.clear();
        pair.clear();

        assert!(!pair.is_allocated());
        assert!(pair.x_slice().is_empty());
    }

    #[test]
    fn dynamic_columns_grow_independently() {
        let mut table = Growing::with_capacity(2).unwrap();
        for i in 0..2 {
            table.push_x(i).unwrap();
            table.push_y(i.to_string()).unwrap();
        }
        for x in [3, 9, 9, 9] {
            table.push_x(x).unwrap();
        }
        table.set_x(0, 999);

        assert_eq!(table.x_slice(), [999, 1, 3, 9, 9, 9]);
        assert_eq!(table.y_slice(), ["0", "1"]);
        assert_eq!(table.len(), 6);
        assert_eq!(table.capacity(), 6);
        assert_eq!(table.size_bounds(), (2, 6));
    }

    #[test]
    fn dynamic_push_without_init() {
        let mut table = Growing::new();
        let indices: Vec<u32> = (0..5).map(|x| table.push_x(x).unwrap()).collect();

        assert_eq!(indices, [0, 1, 2, 3, 4]);
        assert_eq!(table.capacity(), 6);
        assert_eq!(table.x_slice(), [0, 1, 2, 3, 4]);
    }

    #[test]
    fn growth_replans_layout() {
        let mut table = Growing::with_capacity(1).unwrap();
        let before = table.layout().len();
        table.push_x(1).unwrap();
        table.push_x(2).unwrap();

        assert_eq!(table.capacity(), 2);
        assert!(table.layout().len() > before);
        assert_eq!(
            table.layout().offset_at(1) % align_of::<String>(),
            0,
            "string column must stay aligned"
        );
    }

    #[test]
    fn mut_slice_writes_survive_growth() {
        let mut table = Growing::with_capacity(1).unwrap();
        table.push((1, "a".to_owned())).unwrap();
        table.x_mut_slice()[0] = 0xAAAA;
        table.y_mut_slice()[0].push('!');

        for x in 2..64 {
            table.push((x, String::new())).unwrap();
        }

        assert_eq!(*table.get_x(0), 0xAAAA);
        assert_eq!(table.get_y(0), "a!");
        assert_eq!(table.x_slice()[63], 64);
    }

    #[test]
    fn push_row_requires_even_columns() {
        let mut table = Growing::new();
        assert_eq!(table.push((1, "one".to_owned())).unwrap(), 0);
        assert_eq!(table.push((2, "two".to_owned())).unwrap(), 1);

        table.push_x(3).unwrap();
        assert_eq!(
            table.push((4, "four".to_owned())),
            Err(SoaError::Ragged {
                shortest: 2,
                longest: 3
            })
        );
        assert_eq!(table.y_slice(), ["one", "two"]);
    }

    #[test]
    fn every_element_dropped_once() {
        let token = Rc::new(());
        let mut table = Tracked::new();
        for n in 0..20 {
            table.push((token.clone(), n)).unwrap();
        }
        assert_eq!(Rc::strong_count(&token), 21);

        table.clear();
        assert_eq!(Rc::strong_count(&token), 1);

        for n in 0..3 {
            table.push((token.clone(), n)).unwrap();
        }
        drop(table);
        assert_eq!(Rc::strong_count(&token), 1);
    }

    #[test]
    fn reinit_releases_previous_rows() {
        let token = Rc::new(());
        let mut table = Tracked::with_capacity(4).unwrap();
        table.push_token(token.clone()).unwrap();
        table.push_token(token.clone()).unwrap();

        table.init(8).unwrap();
        assert_eq!(Rc::strong_count(&token), 1);
        assert!(table.is_empty());
        assert_eq!(table.capacity(), 8);
    }

    #[test]
    fn mutable_erase_keeps_identities() {
        let mut table = Entities::with_capacity(5).unwrap();
        let mut ids = Vec::new();
        for x in [0, 1, 3, 9, 9, 888] {
            ids.push(table.push_x(x).unwrap());
        }
        assert_eq!(ids, [0, 1, 2, 3, 4, 5]);

        assert!(table.erase(0).unwrap());
        assert!(table.erase(2).unwrap());

        assert_eq!(table.len(), 4);
        assert_eq!(*table.get_x(5).unwrap(), 888);
        assert_eq!(*table.get_x(1).unwrap(), 1);
        assert_eq!(*table.get_x(3).unwrap(), 9);
        assert_eq!(*table.get_x(4).unwrap(), 9);
        assert_eq!(table.handles(), [5, 1, 4, 3]);
    }

    #[test]
    fn mutable_erase_last_row() {
        let mut table = Entities::new();
        for (x, name) in [(10, "a"), (20, "b"), (30, "c")] {
            table.push((x, name.to_owned())).unwrap();
        }

        assert!(table.erase(2).unwrap());
        assert_eq!(table.get_x(2), Err(SoaError::NotFound { id: 2 }));
        assert_eq!(table.slot_of(0).unwrap(), 0);
        assert_eq!(table.slot_of(1).unwrap(), 1);
        assert_eq!(table.get_name(1).unwrap(), "b");
        assert_eq!(table.name_slice().len(), 2);
    }

    #[test]
    fn mutable_erase_is_idempotent() {
        let mut table = Entities::new();
        table.push((1, "one".to_owned())).unwrap();
        table.push((2, "two".to_owned())).unwrap();

        assert!(table.erase(0).unwrap());
        assert!(!table.erase(0).unwrap());
        assert!(!table.erase(77).unwrap());
        assert_eq!(table.len(), 1);
        assert_eq!(table.get_name(1).unwrap(), "two");
    }

    #[test]
    fn mutable_set_through_identifier() {
        let mut table = Entities::new();
        let a = table.push((1, "a".to_owned())).unwrap();
        let b = table.push((2, "b".to_owned())).unwrap();
        table.erase(a).unwrap();

        table.set_name(b, "renamed".to_owned()).unwrap();
        *table.get_x_mut(b).unwrap() += 40;

        assert_eq!(table.get_name(b).unwrap(), "renamed");
        assert_eq!(*table.get_x(b).unwrap(), 42);
        assert_eq!(table.set_x(a, 0), Err(SoaError::NotFound { id: a }));
    }

    #[test]
    fn mutable_ids_are_fresh_after_erase() {
        let mut table = Entities::new();
        for x in 0..3 {
            table.push((x, String::new())).unwrap();
        }
        table.erase(1).unwrap();

        let id = table.push((7, "new".to_owned())).unwrap();
        assert_eq!(id, 3);
        assert_eq!(table.slot_of(id).unwrap(), 2);
        assert_eq!(*table.get_x(2).unwrap(), 2);
    }

    #[test]
    fn mutable_shorter_column_fills_existing_rows() {
        let mut table = Entities::new();
        let a = table.push_x(1).unwrap();
        let b = table.push_x(2).unwrap();

        assert_eq!(
            table.get_name(a),
            Err(SoaError::Vacant {
                id: a,
                column: "name"
            })
        );
        assert_eq!(table.push_name("first".to_owned()).unwrap(), a);
        assert_eq!(table.get_name(a).unwrap(), "first");

        // erasing `a` would leave a hole in `name`
        assert_eq!(
            table.erase(a),
            Err(SoaError::Ragged {
                shortest: 1,
                longest: 2
            })
        );
        assert_eq!(table.len(), 2);

        // `b` has no name, nothing to compact there
        assert!(table.erase(b).unwrap());
        assert_eq!(table.len(), 1);
        assert_eq!(table.get_name(a).unwrap(), "first");
    }

    #[test]
    fn mutable_clear_forgets_identifiers() {
        let mut table = Entities::new();
        table.push((1, "a".to_owned())).unwrap();
        table.clear();

        assert!(!table.contains(0));
        assert_eq!(table.push((2, "b".to_owned())).unwrap(), 0);
    }

    #[test]
    fn debug_output_names_policy() {
        let pair = Pair::with_capacity(1).unwrap();
        let debug = format!("{pair:?}");

        assert!(debug.contains("Fixed"));
        assert!(debug.contains("capacity: 1"));
    }
}
