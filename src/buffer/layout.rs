use crate::{Result, SoaError};

/// The footprint of one element of a column: its size and the alignment its
/// region must start on.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub size: usize,
    pub align: usize,
}

impl Region {
    pub const fn of<T>() -> Self {
        Self {
            size: size_of::<T>(),
            align: align_of::<T>(),
        }
    }
}

/// The planned placement of every column inside a single allocation.
///
/// Each part is a contiguous run of one element type. Parts are laid out back
/// to back in declaration order, each one starting at the first offset after
/// the previous part that satisfies its own alignment.
///
/// A layout is a pure function of its regions and their counts; a table
/// plans a fresh one every time its capacity changes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Layout {
    last: usize,
    align: usize,
    offsets: Vec<usize>,
    lengths: Vec<usize>,
}

impl Default for Layout {
    fn default() -> Self {
        Self::new()
    }
}

impl Layout {
    pub fn new() -> Self {
        Self::with_parts(0)
    }

    pub fn with_parts(parts: usize) -> Self {
        Self {
            last: 0,
            align: 1,
            offsets: Vec::with_capacity(parts),
            lengths: Vec::with_capacity(parts),
        }
    }

    /// Plan one part per region, each holding `capacity` elements.
    ///
    /// # Errors
    /// [`SoaError::CapacityOverflow`] if the total size does not fit in a
    /// `usize`.
    pub fn plan(regions: &[Region], capacity: u32) -> Result<Self> {
        regions
            .iter()
            .try_fold(Self::with_parts(regions.len()), |layout, &region| {
                layout.partition(region, capacity)
            })
    }

    /// Append a part of `count` elements described by `region`.
    pub fn partition(mut self, region: Region, count: u32) -> Result<Self> {
        debug_assert!(region.align.is_power_of_two());
        let overflow = SoaError::CapacityOverflow {
            requested: count as u64,
        };

        let length = region
            .size
            .checked_mul(count as usize)
            .ok_or(overflow.clone())?;
        let offset = self
            .last
            .checked_add(region.align - 1)
            .map(|end| end & !(region.align - 1))
            .ok_or(overflow.clone())?;
        let last = offset.checked_add(length).ok_or(overflow)?;

        self.offsets.push(offset);
        self.lengths.push(length);
        self.last = last;
        self.align = self.align.max(region.align);

        Ok(self)
    }

    /// Convenience over [`Layout::partition`] for a statically known type.
    pub fn partition_of<T>(self, count: u32) -> Result<Self> {
        self.partition(Region::of::<T>(), count)
    }

    /// The local offset (in bytes) of the part at `index`.
    pub fn offset_at(&self, index: usize) -> usize {
        self.offsets[index]
    }

    /// The length (in bytes) of the part at `index`.
    pub fn length_at(&self, index: usize) -> usize {
        self.lengths[index]
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn parts(&self) -> usize {
        self.offsets.len()
    }

    /// Total length in bytes: the end of the last part.
    pub fn len(&self) -> usize {
        self.last
    }

    pub fn is_empty(&self) -> bool {
        self.last == 0
    }

    /// The strictest alignment among all parts, i.e. the alignment the
    /// backing allocation must have for every part to be aligned.
    pub fn align(&self) -> usize {
        self.align
    }

    /// The allocator layout of the backing memory block.
    pub fn memory(&self) -> Result<std::alloc::Layout> {
        std::alloc::Layout::from_size_align(self.last, self.align).map_err(|_| {
            SoaError::CapacityOverflow {
                requested: self.last as u64,
            }
        })
    }
}
