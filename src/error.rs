use thiserror::Error;

pub type Result<T> = std::result::Result<T, SoaError>;

#[derive(Error, Clone, Debug, PartialEq, Eq)]
pub enum SoaError {
    /// The identifier was never minted by the table, or it has since been
    /// erased.
    #[error("identifier {id} not found")]
    NotFound { id: u32 },

    /// The identifier is live but its row holds no value in `column`, because
    /// that column is shorter than the table.
    #[error("identifier {id} has no value in column '{column}'")]
    Vacant { id: u32, column: &'static str },

    #[error("failed to allocate {bytes} bytes aligned to {align}")]
    AllocationFailed { bytes: usize, align: usize },

    /// The requested capacity cannot be represented, either as a slot count or
    /// as a byte size.
    #[error("capacity overflow: {requested} slots requested")]
    CapacityOverflow { requested: u64 },

    /// The columns do not share one length and the operation needs them to.
    #[error("columns have diverged: shortest {shortest}, longest {longest}")]
    Ragged { shortest: u32, longest: u32 },

    #[error("identifier space exhausted")]
    IdentifiersExhausted,
}
