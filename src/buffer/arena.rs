use std::{alloc, ptr::NonNull};

use tracing::{Level, event};

use crate::{Result, SoaError, buffer::Layout};

/// A single raw memory block shared by every column of a table.
///
/// The arena is the only owner of the allocation: columns hold typed pointers
/// into it but never allocate or free. The memory is uninitialised; what lives
/// in each region is tracked entirely by the columns bound to it.
///
/// Dropping the arena frees the block without running any destructor, so the
/// owning table must drop every live element first.
#[derive(Debug)]
pub struct Arena {
    ptr: NonNull<u8>,
    memory: alloc::Layout,
}

// SAFETY: the arena is plain bytes. Access to typed contents goes through
// `Column`, which carries its own `Send`/`Sync` bounds.
unsafe impl Send for Arena {}
unsafe impl Sync for Arena {}

impl Arena {
    /// Allocate a block large and aligned enough for every part of `layout`.
    ///
    /// A zero-length layout performs no allocation.
    ///
    /// # Errors
    /// * [`SoaError::CapacityOverflow`] if the layout exceeds the allocator's
    ///   limits.
    /// * [`SoaError::AllocationFailed`] if the allocator returns null.
    pub fn allocate(layout: &Layout) -> Result<Self> {
        let memory = layout.memory()?;
        if memory.size() == 0 {
            return Ok(Self {
                ptr: NonNull::dangling(),
                memory,
            });
        }

        // SAFETY: `memory` has a non-zero size.
        let raw = unsafe { alloc::alloc(memory) };
        let ptr = NonNull::new(raw).ok_or(SoaError::AllocationFailed {
            bytes: memory.size(),
            align: memory.align(),
        })?;

        event!(
            Level::TRACE,
            bytes = memory.size(),
            align = memory.align(),
            "allocated arena"
        );
        Ok(Self { ptr, memory })
    }

    /// A typed pointer to the region starting `offset` bytes into the block.
    ///
    /// # Safety
    /// `offset` must come from the [`Layout`] this arena was allocated with,
    /// for a part planned with the alignment of `T`.
    pub unsafe fn region<T>(&self, offset: usize) -> NonNull<T> {
        if self.memory.size() == 0 {
            return NonNull::dangling();
        }
        debug_assert!(offset <= self.memory.size());
        unsafe { self.ptr.add(offset).cast() }
    }

    pub fn as_ptr(&self) -> *const u8 {
        self.ptr.as_ptr()
    }

    pub fn len(&self) -> usize {
        self.memory.size()
    }

    pub fn is_empty(&self) -> bool {
        self.memory.size() == 0
    }

    pub fn align(&self) -> usize {
        self.memory.align()
    }
}

impl Drop for Arena {
    fn drop(&mut self) {
        if self.memory.size() != 0 {
            // SAFETY: allocated in `Arena::allocate` with this exact layout.
            unsafe { alloc::dealloc(self.ptr.as_ptr(), self.memory) };
        }
    }
}
