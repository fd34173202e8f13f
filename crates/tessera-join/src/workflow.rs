//! Join workflow orchestration.
//!
//! The workflow is a fixed two-call sequence: a join request followed by a
//! read-back of the group state. Membership is classified from the
//! read-back alone, because a successful join reply looks the same whether
//! the caller just joined, was already a member, or only filed a request.

use tessera_crypto::blake3::group_fingerprint;
use tessera_invite::GroupInviteLink;
use tessera_types::{GroupId, GroupMembershipState, Identity, JoinOutcome};
use tracing::{debug, error, info, info_span, warn};

use crate::service::{GroupService, GroupState, JoinCallResult, ServiceError};
use crate::{JoinError, JoinStage, Result};

/// Runs join attempts against a group service.
///
/// Holds no state besides the service reference, so one workflow can serve
/// concurrent joins for different groups and requesters.
pub struct JoinWorkflow<'a, S: GroupService + ?Sized> {
    service: &'a S,
}

impl<'a, S: GroupService + ?Sized> JoinWorkflow<'a, S> {
    pub fn new(service: &'a S) -> Self {
        Self { service }
    }

    /// Join the group named by `link` on behalf of `requester`.
    ///
    /// Issues exactly one join call and one state read. Failed notification
    /// deliveries are reported in the outcome and never fail the run.
    pub fn run(&self, link: &GroupInviteLink, requester: &Identity) -> Result<JoinOutcome> {
        let span = info_span!(
            "join_group",
            group = %group_fingerprint(link.group_id().as_bytes()),
            version = %link.version(),
        );
        let _guard = span.enter();

        info!("requesting to join group");
        let reply = self.join_step(link)?;
        let state = self.read_back(link.group_id())?;

        if !state.is_member(requester) && !state.is_pending(requester) {
            warn!(
                requested_approval = reply.requested_approval,
                "requester missing from group state after successful join, assuming pending approval"
            );
        }
        let membership = classify_membership(&state, requester);

        for failed in reply.notifications.iter().filter(|r| !r.is_success()) {
            warn!(
                recipient = %failed.recipient,
                status = ?failed.status,
                "join notice not delivered"
            );
        }

        info!(membership = ?membership, notices = reply.notifications.len(), "join finished");
        Ok(JoinOutcome::new(
            *link.group_id(),
            membership,
            reply.notifications,
        ))
    }

    /// Send the join request and check the reply refers to the linked group.
    fn join_step(&self, link: &GroupInviteLink) -> Result<JoinCallResult> {
        let reply = self.service.join(link).map_err(|e| match e {
            ServiceError::RequestRejected => JoinError::AlreadyRejected,
            ServiceError::LinkNotActive(reason) => JoinError::LinkNotActive { reason },
            ServiceError::GroupNotFound(_) => JoinError::LinkNotActive {
                reason: "group no longer exists".to_string(),
            },
            e @ ServiceError::Transport(_) => JoinError::TransportFailure {
                stage: JoinStage::Join,
                source: e,
            },
            ServiceError::InvalidResponse(detail) => {
                invariant_violation(format!("unreadable join reply: {detail}"))
            }
        })?;

        if reply.group_id != *link.group_id() {
            return Err(invariant_violation(format!(
                "join reply names group {} instead of the linked group",
                reply.group_id
            )));
        }

        debug!(
            requested_approval = reply.requested_approval,
            notices = reply.notifications.len(),
            "join request accepted"
        );
        Ok(reply)
    }

    /// Read the group state back after a successful join.
    ///
    /// A transport failure here is reported as such; the membership state
    /// is never guessed.
    fn read_back(&self, group_id: &GroupId) -> Result<GroupState> {
        let state = self
            .service
            .fetch_group_state(group_id)
            .map_err(|e| match e {
                e @ ServiceError::Transport(_) => JoinError::TransportFailure {
                    stage: JoinStage::FetchState,
                    source: e,
                },
                ServiceError::GroupNotFound(_) => {
                    invariant_violation("group missing on read-back after a successful join")
                }
                other => invariant_violation(format!("unexpected read-back error: {other}")),
            })?;

        if state.group_id != *group_id {
            return Err(invariant_violation(format!(
                "read-back returned group {} instead of the joined group",
                state.group_id
            )));
        }

        debug!(
            members = state.members.len(),
            pending = state.pending.len(),
            "group state read back"
        );
        Ok(state)
    }
}

/// Join the group named by `link` through `service` on behalf of `requester`.
pub fn run<S: GroupService + ?Sized>(
    link: &GroupInviteLink,
    requester: &Identity,
    service: &S,
) -> Result<JoinOutcome> {
    JoinWorkflow::new(service).run(link, requester)
}

/// Decide the requester's membership from a freshly read group state.
///
/// Full membership wins over a stale pending entry. A requester missing
/// from both lists after a successful join is treated as pending: the
/// stored state is authoritative and full membership cannot be assumed.
pub fn classify_membership(state: &GroupState, requester: &Identity) -> GroupMembershipState {
    if state.is_member(requester) {
        GroupMembershipState::Member
    } else {
        GroupMembershipState::PendingApproval
    }
}

fn invariant_violation(detail: impl Into<String>) -> JoinError {
    let detail = detail.into();
    error!(detail = %detail, "group service broke a protocol invariant");
    JoinError::ProtocolInvariantViolation(detail)
}
