use core::alloc::Layout;

use thiserror::Error;

/// Errors reported by the containers in this crate.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum Error {
    /// The value did not fit inline and the allocator could not provide a heap block for it.
    #[error("failed to allocate {} bytes aligned to {} for an erased value", .layout.size(), .layout.align())]
    AllocationFailure {
        /// Layout of the value that was being stored.
        layout: Layout,
    },

    /// A typed extraction was requested for a type other than the one held.
    #[error("type mismatch: requested `{expected}` but the container holds `{found}`")]
    TypeMismatch {
        /// Name of the type the caller asked for.
        expected: &'static str,

        /// Name of the type currently held.
        found: &'static str,
    },

    /// A value was offered to a closed-set container whose type list does not include its type.
    #[error("`{found}` is not a member of the variant's type list")]
    InvalidConcreteType {
        /// Name of the rejected type.
        found: &'static str,
    },
}

/// A specialized `Result` type for this crate, returning [`Error`] as the error value.
pub type Result<T> = core::result::Result<T, Error>;
