//! The group service collaborator.
//!
//! The service owns the authenticated session, group storage and message
//! delivery. The workflow only ever talks to it through [`GroupService`].

use serde::{Deserialize, Serialize};
use tessera_invite::GroupInviteLink;
use tessera_types::{GroupId, Identity, NotificationResult};

/// Reply to a join request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinCallResult {
    /// Group the service joined.
    pub group_id: GroupId,
    /// The service recorded a join request instead of full membership.
    #[serde(default)]
    pub requested_approval: bool,
    /// Per-recipient results of the notices the join triggered.
    #[serde(default)]
    pub notifications: Vec<NotificationResult>,
}

/// Membership lists of a group as currently stored by the service.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupState {
    pub group_id: GroupId,
    /// Full members.
    #[serde(default)]
    pub members: Vec<Identity>,
    /// Requesters waiting for admin approval.
    #[serde(default)]
    pub pending: Vec<Identity>,
}

impl GroupState {
    pub fn is_member(&self, identity: &Identity) -> bool {
        self.members.contains(identity)
    }

    pub fn is_pending(&self, identity: &Identity) -> bool {
        self.pending.contains(identity)
    }
}

/// Error types reported by a group service.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ServiceError {
    /// The caller's join request was rejected by an admin.
    #[error("join request rejected")]
    RequestRejected,

    /// The link's join secret is no longer accepted.
    #[error("invite link not active: {0}")]
    LinkNotActive(String),

    /// No group with this identifier exists.
    #[error("group {0} not found")]
    GroupNotFound(GroupId),

    /// Network or session failure; the request may not have been processed.
    #[error("transport error: {0}")]
    Transport(String),

    /// The service answered with something that could not be understood.
    #[error("invalid response from group service: {0}")]
    InvalidResponse(String),
}

/// Remote group operations needed to join a group.
///
/// Implementations own retries and any concurrency control over group
/// membership. Both calls block until the service answers.
pub trait GroupService: Send + Sync {
    /// Join the group named by `link`, or record a join request if the
    /// group requires approval.
    ///
    /// Must be idempotent: joining a group the caller already belongs to
    /// succeeds without side effects.
    fn join(&self, link: &GroupInviteLink) -> Result<JoinCallResult, ServiceError>;

    /// Read the current membership lists of a group.
    fn fetch_group_state(&self, group_id: &GroupId) -> Result<GroupState, ServiceError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_group_state_lookup() {
        let alice = Identity::new("alice").expect("identity");
        let bob = Identity::new("bob").expect("identity");
        let state = GroupState {
            group_id: GroupId::from_bytes([1; 32]),
            members: vec![alice.clone()],
            pending: vec![bob.clone()],
        };
        assert!(state.is_member(&alice));
        assert!(!state.is_pending(&alice));
        assert!(state.is_pending(&bob));
        assert!(!state.is_member(&bob));
    }

    #[test]
    fn test_join_reply_defaults() {
        let group = GroupId::from_bytes([2; 32]);
        let json = serde_json::json!({ "group_id": group.to_base64() });
        let reply: JoinCallResult = serde_json::from_value(json).expect("deserialize");
        assert_eq!(reply.group_id, group);
        assert!(!reply.requested_approval);
        assert!(reply.notifications.is_empty());
    }
}
