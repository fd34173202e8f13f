//! Group identifiers, membership states and join outcomes.

use std::fmt;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_with::base64::Base64;
use serde_with::serde_as;

use crate::delivery::NotificationResult;
use crate::{Result, TypesError, GROUP_ID_LEN};

/// Fixed-length opaque group identifier.
///
/// Serialized and displayed as standard base64.
#[serde_as]
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupId(#[serde_as(as = "Base64")] [u8; GROUP_ID_LEN]);

impl GroupId {
    /// Wrap raw identifier bytes.
    pub fn from_bytes(bytes: [u8; GROUP_ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Parse an identifier from a byte slice.
    ///
    /// The slice must be exactly [`GROUP_ID_LEN`] bytes and not all zero;
    /// the all-zero value is reserved and never names a group.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        let raw: [u8; GROUP_ID_LEN] = bytes.try_into().map_err(|_| {
            TypesError::InvalidGroupId(format!(
                "expected {GROUP_ID_LEN} bytes, got {}",
                bytes.len()
            ))
        })?;
        if raw.iter().all(|b| *b == 0) {
            return Err(TypesError::InvalidGroupId("all-zero identifier".to_string()));
        }
        Ok(Self(raw))
    }

    /// Parse an identifier from its base64 form.
    pub fn from_base64(encoded: &str) -> Result<Self> {
        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded)
            .map_err(|e| TypesError::InvalidGroupId(format!("base64 decode error: {e}")))?;
        Self::from_slice(&bytes)
    }

    /// Raw identifier bytes.
    pub fn as_bytes(&self) -> &[u8; GROUP_ID_LEN] {
        &self.0
    }

    /// Standard base64 rendering, as shown to users.
    pub fn to_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.0)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_base64())
    }
}

impl fmt::Debug for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "GroupId({})", self.to_base64())
    }
}

/// The caller's relationship to a group after a join attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupMembershipState {
    /// Full member of the group.
    Member,
    /// Join request recorded, waiting for an admin.
    PendingApproval,
    /// No relationship to the group.
    NotMember,
}

/// Result of a successful join workflow run.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOutcome {
    group_id: GroupId,
    membership_state: GroupMembershipState,
    notification_results: Vec<NotificationResult>,
}

impl JoinOutcome {
    pub fn new(
        group_id: GroupId,
        membership_state: GroupMembershipState,
        notification_results: Vec<NotificationResult>,
    ) -> Self {
        Self {
            group_id,
            membership_state,
            notification_results,
        }
    }

    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    pub fn membership_state(&self) -> GroupMembershipState {
        self.membership_state
    }

    /// Per-recipient delivery results, in the order the service reported them.
    pub fn notification_results(&self) -> &[NotificationResult] {
        &self.notification_results
    }

    /// Delivery results that did not reach their recipient.
    pub fn failed_notifications(&self) -> impl Iterator<Item = &NotificationResult> {
        self.notification_results.iter().filter(|r| !r.is_success())
    }

    pub fn has_notification_failures(&self) -> bool {
        self.failed_notifications().next().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::delivery::DeliveryStatus;
    use crate::Identity;

    fn id(seed: u8) -> GroupId {
        GroupId::from_bytes([seed; GROUP_ID_LEN])
    }

    #[test]
    fn test_group_id_rejects_wrong_length() {
        assert!(matches!(
            GroupId::from_slice(&[1u8; 31]),
            Err(TypesError::InvalidGroupId(_))
        ));
        assert!(GroupId::from_slice(&[1u8; 33]).is_err());
    }

    #[test]
    fn test_group_id_rejects_all_zero() {
        assert!(GroupId::from_slice(&[0u8; GROUP_ID_LEN]).is_err());
    }

    #[test]
    fn test_group_id_base64_display() {
        let group = id(0xAB);
        let shown = group.to_string();
        assert_eq!(GroupId::from_base64(&shown).expect("decode"), group);
    }

    #[test]
    fn test_group_id_json_is_base64_string() {
        let group = id(1);
        let json = serde_json::to_value(group).expect("serialize");
        assert_eq!(json, serde_json::Value::String(group.to_base64()));
        let back: GroupId = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, group);
    }

    #[test]
    fn test_outcome_reports_failed_notifications() {
        let alice = Identity::new("alice").expect("identity");
        let bob = Identity::new("bob").expect("identity");
        let outcome = JoinOutcome::new(
            id(2),
            GroupMembershipState::Member,
            vec![
                NotificationResult::delivered(alice, 10, &[1, 2]),
                NotificationResult::failed(bob.clone(), 10, DeliveryStatus::NetworkFailure),
            ],
        );
        let failed: Vec<_> = outcome.failed_notifications().collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].recipient, bob);
        assert!(outcome.has_notification_failures());
    }

    #[test]
    fn test_membership_state_serde_names() {
        let json = serde_json::to_string(&GroupMembershipState::PendingApproval).expect("serialize");
        assert_eq!(json, "\"pending_approval\"");
    }
}
