//! In-process group directory.
//!
//! [`GroupDirectory`] stores groups, their members and invite secrets in
//! memory. Each account talks to it through a [`MemoryGroupService`]
//! session, which implements [`GroupService`] with the same semantics a
//! remote service has: joins are idempotent, approval-gated groups record
//! requests, and every new join or request notifies the existing members.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use tessera_invite::GroupInviteLink;
use tessera_types::{DeliveryStatus, GroupId, Identity, NotificationResult};
use tracing::debug;

use crate::service::{GroupService, GroupState, JoinCallResult, ServiceError};

/// Device list given to members that join without registering devices.
const DEFAULT_DEVICES: &[u32] = &[1];

/// A stored group.
#[derive(Debug)]
struct GroupRecord {
    /// Currently accepted invite link; `None` when link joining is disabled.
    active_link: Option<GroupInviteLink>,
    requires_approval: bool,
    members: Vec<Identity>,
    pending: Vec<Identity>,
    rejected: Vec<Identity>,
}

#[derive(Debug, Default)]
struct DirectoryInner {
    groups: HashMap<GroupId, GroupRecord>,
    /// Registered devices per account.
    devices: HashMap<Identity, Vec<u32>>,
    /// Accounts whose notices fail, and how.
    unreachable: HashMap<Identity, DeliveryStatus>,
}

/// Shared in-memory store of groups. Cheap to clone.
#[derive(Clone, Debug, Default)]
pub struct GroupDirectory {
    inner: Arc<Mutex<DirectoryInner>>,
}

impl GroupDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, DirectoryInner>, ServiceError> {
        self.inner
            .lock()
            .map_err(|_| ServiceError::Transport("group directory lock poisoned".to_string()))
    }

    /// Create a group reachable through `link`, with `admin` as its first member.
    pub fn create_group(
        &self,
        link: &GroupInviteLink,
        admin: Identity,
        requires_approval: bool,
    ) -> Result<(), ServiceError> {
        let mut inner = self.lock()?;
        inner.groups.insert(
            *link.group_id(),
            GroupRecord {
                active_link: Some(link.clone()),
                requires_approval,
                members: vec![admin],
                pending: Vec::new(),
                rejected: Vec::new(),
            },
        );
        Ok(())
    }

    /// Add a member directly, bypassing the invite link.
    pub fn add_member(&self, group_id: &GroupId, member: Identity) -> Result<(), ServiceError> {
        let mut inner = self.lock()?;
        let record = group_mut(&mut inner, group_id)?;
        if !record.members.contains(&member) {
            record.members.push(member);
        }
        Ok(())
    }

    /// Register the devices notices to `account` are delivered to.
    pub fn register_devices(&self, account: Identity, device_ids: &[u32]) -> Result<(), ServiceError> {
        self.lock()?.devices.insert(account, device_ids.to_vec());
        Ok(())
    }

    /// Make every notice to `account` fail with `status`.
    pub fn set_unreachable(&self, account: Identity, status: DeliveryStatus) -> Result<(), ServiceError> {
        self.lock()?.unreachable.insert(account, status);
        Ok(())
    }

    /// Replace the group's invite link with a freshly generated one.
    ///
    /// Links handed out before the rotation stop working.
    pub fn rotate_link(&self, group_id: &GroupId) -> Result<GroupInviteLink, ServiceError> {
        let mut inner = self.lock()?;
        let record = group_mut(&mut inner, group_id)?;
        let link = GroupInviteLink::generate(*group_id);
        record.active_link = Some(link.clone());
        Ok(link)
    }

    /// Turn off joining through invite links.
    pub fn disable_link(&self, group_id: &GroupId) -> Result<(), ServiceError> {
        let mut inner = self.lock()?;
        group_mut(&mut inner, group_id)?.active_link = None;
        Ok(())
    }

    /// Approve a pending join request.
    pub fn approve(&self, group_id: &GroupId, requester: &Identity) -> Result<(), ServiceError> {
        let mut inner = self.lock()?;
        let record = group_mut(&mut inner, group_id)?;
        record.pending.retain(|p| p != requester);
        if !record.members.contains(requester) {
            record.members.push(requester.clone());
        }
        Ok(())
    }

    /// Reject a pending join request. Later requests from the account are refused.
    pub fn reject(&self, group_id: &GroupId, requester: &Identity) -> Result<(), ServiceError> {
        let mut inner = self.lock()?;
        let record = group_mut(&mut inner, group_id)?;
        record.pending.retain(|p| p != requester);
        if !record.rejected.contains(requester) {
            record.rejected.push(requester.clone());
        }
        Ok(())
    }

    /// Remove a stored group entirely.
    pub fn delete_group(&self, group_id: &GroupId) -> Result<(), ServiceError> {
        self.lock()?
            .groups
            .remove(group_id)
            .map(|_| ())
            .ok_or(ServiceError::GroupNotFound(*group_id))
    }

    /// Open a session acting as `account`.
    pub fn session(&self, account: Identity) -> MemoryGroupService {
        MemoryGroupService {
            directory: self.clone(),
            account,
        }
    }
}

fn group_mut<'a>(
    inner: &'a mut DirectoryInner,
    group_id: &GroupId,
) -> Result<&'a mut GroupRecord, ServiceError> {
    inner
        .groups
        .get_mut(group_id)
        .ok_or(ServiceError::GroupNotFound(*group_id))
}

fn now_millis() -> u64 {
    let millis = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis();
    u64::try_from(millis).unwrap_or(u64::MAX)
}

/// Build one notice result per recipient, honouring configured failures.
fn notify(inner: &DirectoryInner, recipients: &[Identity]) -> Vec<NotificationResult> {
    let timestamp = now_millis();
    recipients
        .iter()
        .map(|recipient| match inner.unreachable.get(recipient) {
            Some(status) => NotificationResult::failed(recipient.clone(), timestamp, *status),
            None => {
                let devices = inner
                    .devices
                    .get(recipient)
                    .map(Vec::as_slice)
                    .unwrap_or(DEFAULT_DEVICES);
                NotificationResult::delivered(recipient.clone(), timestamp, devices)
            }
        })
        .collect()
}

/// A [`GroupService`] session of one account against a [`GroupDirectory`].
#[derive(Clone, Debug)]
pub struct MemoryGroupService {
    directory: GroupDirectory,
    account: Identity,
}

impl MemoryGroupService {
    /// The account this session acts as.
    pub fn account(&self) -> &Identity {
        &self.account
    }
}

impl GroupService for MemoryGroupService {
    fn join(&self, link: &GroupInviteLink) -> Result<JoinCallResult, ServiceError> {
        let mut inner = self.directory.lock()?;
        let group_id = *link.group_id();
        let record = group_mut(&mut inner, &group_id)?;

        match &record.active_link {
            Some(active) if active.join_secret() == link.join_secret() => {}
            Some(_) => return Err(ServiceError::LinkNotActive("invite link was reset".to_string())),
            None => {
                return Err(ServiceError::LinkNotActive(
                    "joining by link is disabled".to_string(),
                ))
            }
        }

        if record.rejected.contains(&self.account) {
            return Err(ServiceError::RequestRejected);
        }

        // Repeat joins change nothing and notify nobody.
        if record.members.contains(&self.account) || record.pending.contains(&self.account) {
            debug!(account = %self.account, "repeat join, nothing to do");
            return Ok(JoinCallResult {
                group_id,
                requested_approval: record.pending.contains(&self.account),
                notifications: Vec::new(),
            });
        }

        let recipients = record.members.clone();
        let requested_approval = record.requires_approval;
        if requested_approval {
            record.pending.push(self.account.clone());
        } else {
            record.members.push(self.account.clone());
        }

        let notifications = notify(&inner, &recipients);
        debug!(
            account = %self.account,
            requested_approval,
            notices = notifications.len(),
            "join recorded"
        );
        Ok(JoinCallResult {
            group_id,
            requested_approval,
            notifications,
        })
    }

    fn fetch_group_state(&self, group_id: &GroupId) -> Result<GroupState, ServiceError> {
        let inner = self.directory.lock()?;
        let record = inner
            .groups
            .get(group_id)
            .ok_or(ServiceError::GroupNotFound(*group_id))?;
        Ok(GroupState {
            group_id: *group_id,
            members: record.members.clone(),
            pending: record.pending.clone(),
        })
    }
}
