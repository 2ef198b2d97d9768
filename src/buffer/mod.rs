pub mod arena;
pub mod layout;

pub use arena::Arena;
pub use layout::{Layout, Region};
