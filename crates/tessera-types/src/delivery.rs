//! Per-recipient notification delivery results.

use serde::{Deserialize, Serialize};

use crate::Identity;

/// Final status of a notification sent to one recipient.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Delivered,
    NetworkFailure,
    UnregisteredRecipient,
    UntrustedIdentity,
}

/// Delivery result for a single device of a recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceDelivery {
    pub device_id: u32,
    pub delivered: bool,
}

/// Result of sending one notification to one recipient.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationResult {
    /// Recipient of the notification.
    pub recipient: Identity,
    /// Send timestamp in milliseconds since the Unix epoch.
    pub timestamp: u64,
    pub status: DeliveryStatus,
    /// Per-device results. Empty when the send failed before reaching any device.
    #[serde(default)]
    pub devices: Vec<DeviceDelivery>,
}

impl NotificationResult {
    /// A notification delivered to every listed device.
    pub fn delivered(recipient: Identity, timestamp: u64, device_ids: &[u32]) -> Self {
        Self {
            recipient,
            timestamp,
            status: DeliveryStatus::Delivered,
            devices: device_ids
                .iter()
                .map(|&device_id| DeviceDelivery {
                    device_id,
                    delivered: true,
                })
                .collect(),
        }
    }

    /// A notification that failed for the whole recipient.
    pub fn failed(recipient: Identity, timestamp: u64, status: DeliveryStatus) -> Self {
        Self {
            recipient,
            timestamp,
            status,
            devices: Vec::new(),
        }
    }

    /// True when the recipient was reached.
    ///
    /// A partially delivered notification (some devices failed) still
    /// counts as reaching the recipient.
    pub fn is_success(&self) -> bool {
        self.status == DeliveryStatus::Delivered
    }

    /// Devices that did not receive the notification.
    pub fn failed_devices(&self) -> impl Iterator<Item = u32> + '_ {
        self.devices
            .iter()
            .filter(|d| !d.delivered)
            .map(|d| d.device_id)
    }
}
