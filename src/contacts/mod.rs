//! Contact registry: recipient normalization, group membership, and
//! write-through persistence to one text file per group.
//!
//! The `ALL` group is derived: it grows whenever a named group grows and is
//! rebuilt from the named groups whenever one of them is cleared.

pub mod file_format;
pub mod group;
pub mod normalizer;
pub mod registry;

pub use group::Group;
pub use normalizer::{mask, Normalizer, RecipientId};
pub use registry::{AddOutcome, ContactRegistry};

use crate::store::StoreError;

/// Errors from the contacts subsystem.
#[derive(Debug, thiserror::Error)]
pub enum ContactsError {
    /// The group name is not one of the known groups.
    #[error("unknown group: {0}")]
    UnknownGroup(String),

    /// The normalizer was configured with an unusable prefix or suffix.
    #[error("invalid normalizer settings: {0}")]
    InvalidNormalizer(String),

    /// One or more group files could not be written. In-memory state has
    /// already been updated.
    #[error("failed to persist {groups:?}: {source}")]
    Persist {
        /// Groups whose file write failed.
        groups: Vec<Group>,
        /// The first underlying store error.
        source: StoreError,
    },
}
