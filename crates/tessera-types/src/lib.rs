//! # tessera-types
//!
//! Shared domain types used across the Tessera workspace.

pub mod delivery;
pub mod group;
pub mod identity;

pub use delivery::{DeliveryStatus, DeviceDelivery, NotificationResult};
pub use group::{GroupId, GroupMembershipState, JoinOutcome};
pub use identity::Identity;

/// Length of a group identifier in bytes.
pub const GROUP_ID_LEN: usize = 32;

/// Error types for constructing domain values.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypesError {
    /// A group identifier had the wrong length or encoding.
    #[error("invalid group id: {0}")]
    InvalidGroupId(String),

    /// An identity string was empty or malformed.
    #[error("invalid identity: {0}")]
    InvalidIdentity(String),
}

/// Convenience result type for this crate.
pub type Result<T> = std::result::Result<T, TypesError>;
