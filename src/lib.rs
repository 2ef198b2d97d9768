pub mod buffer;
pub mod column;
pub mod error;
pub mod table;

pub use column::Column;
pub use error::{Result, SoaError};
pub use table::{Columns, Dynamic, Fixed, Mutable, Table};

#[doc(hidden)]
pub use paste;

/// Slot counts, capacities and row identifiers.
pub type SizeType = u32;

/// Growth multiplies the capacity by `GROWTH_NUMERATOR / GROWTH_DENOMINATOR`,
/// and always adds at least one slot.
pub const GROWTH_NUMERATOR: SizeType = 3;
pub const GROWTH_DENOMINATOR: SizeType = 2;
