//! # tessera-join
//!
//! The group join workflow: take a parsed [`GroupInviteLink`], ask the
//! group service to join (or request to join) the group, read the group
//! state back, and classify the caller's resulting membership.
//!
//! ## Modules
//!
//! - [`service`]: The [`GroupService`] collaborator trait and its wire types.
//! - [`workflow`]: [`JoinWorkflow`]: join step, read-back step, classification.
//! - [`memory`]: In-process group directory implementing [`GroupService`].
//! - [`rpc`]: JSON-RPC client implementing [`GroupService`] against the daemon socket.
//!
//! ## Join Flow
//!
//! 1. `service.join(link)`: a single idempotent request.
//! 2. `service.fetch_group_state(group_id)`: read-back; the join reply
//!    alone cannot tell "joined now" from "already a member".
//! 3. Membership is decided from the read-back, never from the join reply.
//! 4. Notification delivery results are passed through untouched.

pub mod memory;
pub mod rpc;
pub mod service;
pub mod workflow;

use std::fmt;

pub use service::{GroupService, GroupState, JoinCallResult, ServiceError};
pub use tessera_invite::GroupInviteLink;
pub use workflow::{classify_membership, run, JoinWorkflow};

/// Step of the workflow at which a service call failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JoinStage {
    /// The join request itself.
    Join,
    /// The state read-back after a successful join.
    FetchState,
}

impl fmt::Display for JoinStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Join => f.write_str("join request"),
            Self::FetchState => f.write_str("group state read-back"),
        }
    }
}

/// Error types for the join workflow.
#[derive(Debug, thiserror::Error)]
pub enum JoinError {
    /// A previous join request was rejected by a group admin.
    #[error("join request was already rejected by a group admin")]
    AlreadyRejected,

    /// The invite link was revoked or rotated.
    #[error("group invite link is not active: {reason}")]
    LinkNotActive {
        /// Reason reported by the service.
        reason: String,
    },

    /// The group service could not be reached or failed mid-call.
    #[error("{stage} failed: {source}")]
    TransportFailure {
        /// Which call failed.
        stage: JoinStage,
        /// The underlying service error.
        #[source]
        source: ServiceError,
    },

    /// The service returned something that cannot happen for a correct service.
    #[error("protocol invariant violated: {0}")]
    ProtocolInvariantViolation(String),
}

impl JoinError {
    /// Whether the caller may retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::TransportFailure { .. })
    }

    /// True when the join call went through but the state read-back did not,
    /// so membership most likely changed but is unknown.
    pub fn join_likely_succeeded(&self) -> bool {
        matches!(
            self,
            Self::TransportFailure {
                stage: JoinStage::FetchState,
                ..
            }
        )
    }
}

/// Convenience result type for join operations.
pub type Result<T> = std::result::Result<T, JoinError>;
