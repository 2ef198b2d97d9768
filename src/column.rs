use std::{
    fmt,
    marker::PhantomData,
    mem,
    ops::{Deref, DerefMut},
    ptr::{self, NonNull},
    slice,
};

/// A dense, typed run of elements living inside a table's shared [`Arena`].
///
/// A column never allocates. It is bound to a region that its table planned
/// and allocated, and it only remembers where that region starts and how many
/// of its slots are initialised. The region's capacity belongs to the table,
/// which is why every primitive that writes past the live elements or moves
/// them around is `unsafe`: the table is the one that knows whether there is
/// room.
///
/// Reading is safe and goes through slices: a column dereferences to `[T]`
/// over its live elements, so iteration, reversal, sorting, binary search and
/// every other slice algorithm work in place.
///
/// The pointer is only meaningful while the owning table keeps the region
/// alive. Growth rebinds every column to a fresh region through
/// [`Column::migrate`].
///
/// [`Arena`]: crate::buffer::Arena
pub struct Column<T> {
    count: u32,
    data: NonNull<T>,
    _owns: PhantomData<T>,
}

// SAFETY: a column owns its live elements exactly like a `Vec<T>` does; the
// raw pointer is only an address inside the table's arena.
unsafe impl<T: Send> Send for Column<T> {}
unsafe impl<T: Sync> Sync for Column<T> {}

impl<T> Default for Column<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Column<T> {
    /// An unbound column with no elements.
    pub const fn new() -> Self {
        Self {
            count: 0,
            data: NonNull::dangling(),
            _owns: PhantomData,
        }
    }

    /// Bind the column to the region starting at `data`.
    ///
    /// # Safety
    /// `data` must be aligned for `T` and valid for as many slots as the table
    /// reserved. The column must not hold live elements, or they are leaked.
    pub unsafe fn bind(&mut self, data: NonNull<T>) {
        debug_assert_eq!(self.count, 0, "rebinding a column with live elements");
        self.data = data;
    }

    /// Bind the column to `data` and populate all `capacity` slots with the
    /// values returned by `fill`.
    ///
    /// Used by fixed tables, where every slot exists from the start.
    ///
    /// # Safety
    /// Same as [`Column::bind`], with `data` valid for `capacity` slots.
    pub unsafe fn bind_filled(&mut self, data: NonNull<T>, capacity: u32, mut fill: impl FnMut() -> T) {
        unsafe { self.bind(data) };
        for _ in 0..capacity {
            // count only covers written slots, a panicking `fill` leaves the
            // column consistent
            unsafe { self.data.add(self.count as usize).write(fill()) };
            self.count += 1;
        }
    }

    /// Place `value` right after the last live element.
    ///
    /// # Returns
    /// The index of the new element.
    ///
    /// # Safety
    /// The bound region must have room for one more element, i.e. the
    /// column's [`size`](Column::size) is below the table's capacity.
    pub unsafe fn append(&mut self, value: T) -> u32 {
        let index = self.count;
        unsafe { self.data.add(index as usize).write(value) };
        self.count += 1;
        index
    }

    /// Move every live element into the region at `data` and rebind to it.
    ///
    /// Every Rust value can be relocated with a plain byte copy, so this is a
    /// single `memcpy` regardless of `T`. Only live elements are copied. The
    /// old region is left holding moved-from bytes that must not be dropped.
    ///
    /// # Safety
    /// `data` must be aligned for `T`, valid for at least `size()` slots and
    /// must not overlap the current region.
    pub unsafe fn migrate(&mut self, data: NonNull<T>) {
        unsafe {
            ptr::copy_nonoverlapping(self.data.as_ptr(), data.as_ptr(), self.count as usize);
        }
        self.data = data;
    }

    /// Run the destructor of the element at `index` in place.
    ///
    /// Does nothing when `T` has no drop glue or `index` is not a live slot.
    /// The count is left untouched.
    ///
    /// # Safety
    /// The slot is left logically uninitialised: the caller must overwrite it
    /// or drop it from the live range (see [`Column::compact_remove`]) before
    /// anything reads it.
    pub unsafe fn destroy_at(&mut self, index: u32) {
        if mem::needs_drop::<T>() && index < self.count {
            unsafe { ptr::drop_in_place(self.data.add(index as usize).as_ptr()) };
        }
    }

    /// Fill the hole at `erased` with the element at `last`.
    ///
    /// The count shrinks only when `last` is this column's final element;
    /// a column that does not reach `last` is left as is.
    ///
    /// # Safety
    /// The element at `erased` must already be destroyed (or be `last`
    /// itself).
    pub unsafe fn compact_remove(&mut self, erased: u32, last: u32) {
        if last >= self.count {
            return;
        }
        if erased != last {
            unsafe {
                ptr::copy_nonoverlapping(
                    self.data.add(last as usize).as_ptr(),
                    self.data.add(erased as usize).as_ptr(),
                    1,
                );
            }
        }
        if last + 1 == self.count {
            self.count -= 1;
        }
    }

    /// Drop all live elements. The binding is kept.
    ///
    /// # Safety
    /// The owning table must account for the column becoming empty.
    pub unsafe fn clear(&mut self) {
        let live = ptr::slice_from_raw_parts_mut(self.data.as_ptr(), self.count as usize);
        self.count = 0;
        unsafe { ptr::drop_in_place(live) };
    }

    /// Drop all live elements and detach from the region.
    ///
    /// # Safety
    /// See [`Column::clear`].
    pub unsafe fn reset(&mut self) {
        unsafe { self.clear() };
        self.data = NonNull::dangling();
    }

    /// Linear search for `value`, starting at index `from`.
    pub fn find(&self, value: &T, from: u32) -> Option<u32>
    where
        T: PartialEq,
    {
        self.as_slice()
            .iter()
            .enumerate()
            .skip(from as usize)
            .find_map(|(index, element)| (element == value).then_some(index as u32))
    }

    pub fn has(&self, value: &T) -> bool
    where
        T: PartialEq,
    {
        self.find(value, 0).is_some()
    }

    /// The number of live elements.
    #[inline]
    pub fn size(&self) -> u32 {
        self.count
    }

    #[inline]
    pub fn as_slice(&self) -> &[T] {
        // SAFETY: slots `[0, count)` are initialised and `data` is aligned and
        // non-null even while unbound.
        unsafe { slice::from_raw_parts(self.data.as_ptr(), self.count as usize) }
    }

    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [T] {
        unsafe { slice::from_raw_parts_mut(self.data.as_ptr(), self.count as usize) }
    }

    pub fn as_ptr(&self) -> *const T {
        self.data.as_ptr()
    }
}

impl<T> Deref for Column<T> {
    type Target = [T];

    fn deref(&self) -> &Self::Target {
        self.as_slice()
    }
}

impl<T> DerefMut for Column<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.as_mut_slice()
    }
}

impl<'col, T> IntoIterator for &'col Column<T> {
    type Item = &'col T;

    type IntoIter = slice::Iter<'col, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_slice().iter()
    }
}

impl<'col, T> IntoIterator for &'col mut Column<T> {
    type Item = &'col mut T;

    type IntoIter = slice::IterMut<'col, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.as_mut_slice().iter_mut()
    }
}

impl<T: fmt::Debug> fmt::Debug for Column<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.as_slice()).finish()
    }
}

#[cfg(feature = "serde")]
impl<T: serde::Serialize> serde::Serialize for Column<T> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.as_slice())
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;
    use crate::buffer::{Arena, Layout};

    fn arena_of<T>(capacity: u32) -> Arena {
        let layout = Layout::new().partition_of::<T>(capacity).unwrap();
        Arena::allocate(&layout).unwrap()
    }

    #[test]
    fn append_then_find() {
        let arena = arena_of::<i32>(4);
        let mut column = Column::<i32>::new();
        unsafe { column.bind(arena.region(0)) };

        let indices: Vec<u32> = [5, 7, 5].into_iter().map(|v| unsafe { column.append(v) }).collect();

        assert_eq!(indices, [0, 1, 2]);
        assert_eq!(column.size(), 3);
        assert_eq!(column.find(&5, 0), Some(0));
        assert_eq!(column.find(&5, 1), Some(2));
        assert_eq!(column.find(&9, 0), None);
        assert!(column.has(&7));
        assert_eq!(column.iter().rev().copied().collect::<Vec<_>>(), [5, 7, 5]);

        unsafe { column.reset() };
    }

    #[test]
    fn migrate_keeps_owned_values() {
        let old = arena_of::<String>(2);
        let mut column = Column::<String>::new();
        unsafe {
            column.bind(old.region(0));
            column.append("Hello".to_owned());
            column.append("there".to_owned());
        }

        let new = arena_of::<String>(3);
        unsafe { column.migrate(new.region(0)) };
        drop(old);

        unsafe { column.append("again".to_owned()) };
        assert_eq!(column.as_slice(), ["Hello", "there", "again"]);
        assert_eq!(column.as_ptr(), new.as_ptr().cast());

        unsafe { column.reset() };
    }

    #[test]
    fn destroy_then_compact_drops_once() {
        let token = Rc::new(());
        let arena = arena_of::<(u32, Rc<()>)>(3);
        let mut column = Column::<(u32, Rc<()>)>::new();
        unsafe {
            column.bind(arena.region(0));
            for i in 0..3 {
                column.append((i, token.clone()));
            }
        }
        assert_eq!(Rc::strong_count(&token), 4);

        unsafe {
            column.destroy_at(0);
            column.compact_remove(0, 2);
        }
        assert_eq!(Rc::strong_count(&token), 3);
        assert_eq!(column.size(), 2);
        assert_eq!(column[0].0, 2);
        assert_eq!(column[1].0, 1);

        unsafe { column.clear() };
        assert_eq!(Rc::strong_count(&token), 1);
        assert!(column.is_empty());
    }

    #[test]
    fn compact_remove_of_last_only_shrinks() {
        let arena = arena_of::<u8>(3);
        let mut column = Column::new();
        unsafe {
            column.bind(arena.region(0));
            column.append(1u8);
            column.append(2u8);
            column.destroy_at(1);
            column.compact_remove(1, 1);
        }

        assert_eq!(column.as_slice(), [1]);
    }

    #[test]
    fn compact_remove_ignores_shorter_column() {
        let arena = arena_of::<u8>(4);
        let mut column = Column::new();
        unsafe {
            column.bind(arena.region(0));
            column.append(1u8);
            column.compact_remove(0, 3);
        }

        assert_eq!(column.as_slice(), [1]);
    }

    #[test]
    fn bind_filled_populates_every_slot() {
        let arena = arena_of::<String>(3);
        let mut column = Column::new();
        unsafe { column.bind_filled(arena.region(0), 3, String::new) };

        assert_eq!(column.size(), 3);
        assert!(column.iter().all(String::is_empty));

        column[1].push_str("filled");
        assert_eq!(column.find(&"filled".to_owned(), 0), Some(1));

        unsafe { column.reset() };
    }

    #[test]
    fn unbound_column_is_an_empty_slice() {
        let column = Column::<u64>::default();

        assert!(column.is_empty());
        assert_eq!(column.iter().count(), 0);
        assert_eq!(format!("{column:?}"), "[]");
    }
}
