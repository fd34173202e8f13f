//! User-facing messages and exit codes for join results.

use clap::ValueEnum;
use tessera_invite::InviteLinkError;
use tessera_join::JoinError;
use tessera_types::{DeliveryStatus, GroupMembershipState, JoinOutcome, NotificationResult};

/// Process exit codes.
pub mod exit {
    pub const SUCCESS: u8 = 0;
    /// Invalid link, refused join, configuration problems, internal errors.
    pub const FAILURE: u8 = 1;
    /// Joined, but some notices could not be delivered.
    pub const PARTIAL_DELIVERY: u8 = 2;
    /// The group service could not be reached.
    pub const TRANSPORT: u8 = 3;
}

/// How a successful outcome is printed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// One sentence per result.
    #[default]
    Plain,
    /// The outcome as pretty-printed JSON.
    Json,
}

/// Lines to print and the exit code to return.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Report {
    pub stdout: Vec<String>,
    pub stderr: Vec<String>,
    pub exit_code: u8,
}

impl Report {
    fn failure(exit_code: u8, message: String) -> Self {
        Self {
            stdout: Vec::new(),
            stderr: vec![message],
            exit_code,
        }
    }

    /// Print the report and return its exit code.
    pub fn emit(self) -> u8 {
        for line in &self.stdout {
            println!("{line}");
        }
        for line in &self.stderr {
            eprintln!("{line}");
        }
        self.exit_code
    }
}

/// Report a successful join.
pub fn outcome(outcome: &JoinOutcome, format: OutputFormat) -> Report {
    let group_id = outcome.group_id();
    let mut report = match format {
        OutputFormat::Plain => match outcome.membership_state() {
            GroupMembershipState::Member => Report {
                stdout: vec![format!("Joined group \"{group_id}\"")],
                ..Report::default()
            },
            GroupMembershipState::PendingApproval => Report {
                stdout: vec![format!("Requested to join group \"{group_id}\"")],
                ..Report::default()
            },
            GroupMembershipState::NotMember => {
                return Report::failure(
                    exit::FAILURE,
                    format!("Not a member of group \"{group_id}\""),
                )
            }
        },
        OutputFormat::Json => match serde_json::to_string_pretty(outcome) {
            Ok(json) => Report {
                stdout: vec![json],
                ..Report::default()
            },
            Err(e) => return Report::failure(exit::FAILURE, format!("Failed to encode result: {e}")),
        },
    };

    let failures: Vec<String> = outcome
        .failed_notifications()
        .filter_map(delivery_failure_message)
        .collect();
    if !failures.is_empty() {
        report.stderr.push("Failed to send (some) messages:".to_string());
        report.stderr.extend(failures);
        report.exit_code = exit::PARTIAL_DELIVERY;
    }
    report
}

/// Describe a failed notice, or `None` if it was delivered.
pub fn delivery_failure_message(result: &NotificationResult) -> Option<String> {
    let recipient = &result.recipient;
    match result.status {
        DeliveryStatus::Delivered => None,
        DeliveryStatus::NetworkFailure => Some(format!("Network failure for \"{recipient}\"")),
        DeliveryStatus::UnregisteredRecipient => Some(format!("Unregistered user \"{recipient}\"")),
        DeliveryStatus::UntrustedIdentity => {
            Some(format!("Untrusted identity for \"{recipient}\""))
        }
    }
}

/// Report an invite link that could not be parsed.
pub fn link_error(err: &InviteLinkError) -> Report {
    let message = match err {
        InviteLinkError::MalformedLink(reason) => format!("Group link is invalid: {reason}"),
        InviteLinkError::UnsupportedVersion { .. } => {
            format!("Group link was created with an incompatible version: {err}")
        }
        InviteLinkError::NotAGroupLink { .. } => {
            "Link is not a Tessera group invitation link".to_string()
        }
    };
    Report::failure(exit::FAILURE, message)
}

/// Report a failed join.
pub fn join_error(err: &JoinError) -> Report {
    match err {
        JoinError::AlreadyRejected => Report::failure(
            exit::FAILURE,
            "Failed to join group, join request was already rejected".to_string(),
        ),
        JoinError::LinkNotActive { reason } => {
            Report::failure(exit::FAILURE, format!("Group link is not valid: {reason}"))
        }
        JoinError::TransportFailure { .. } => {
            let mut report = Report::failure(
                exit::TRANSPORT,
                format!("Failed to reach the group service: {err}"),
            );
            if err.join_likely_succeeded() {
                report.stderr.push(
                    "The join request was sent; run the command again to check the group state."
                        .to_string(),
                );
            }
            report
        }
        JoinError::ProtocolInvariantViolation(detail) => Report::failure(
            exit::FAILURE,
            format!("Internal consistency error, please report: {detail}"),
        ),
    }
}
