//! # tessera-invite
//!
//! Group invite links: parsing `https://tessera.link/group#…` URIs into a
//! [`GroupInviteLink`] and encoding links back to their canonical URI.
//!
//! ## Link Format
//!
//! ```text
//! https://tessera.link/<kind>#<payload>
//! tessera://<kind>#<payload>
//!
//! payload = base64url_nopad(version || body || checksum)
//! v1 body = group_id (32) || join_secret (16)
//! v2 body = group_id (32) || secret_len (1) || join_secret (secret_len)
//! ```
//!
//! The version byte is inspected before anything else so that links from a
//! newer format are reported as such instead of as corrupt.

pub mod link;
pub mod secret;

use std::fmt;

use tessera_types::GroupId;

pub use link::parse;
pub use secret::JoinSecret;

/// Error types for invite link operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InviteLinkError {
    /// The string does not match the scheme, encoding or checksum of an invite link.
    #[error("malformed link: {0}")]
    MalformedLink(String),

    /// The link was produced by a format version this build does not know.
    #[error("link version {version} is not supported (highest supported: {supported})")]
    UnsupportedVersion {
        /// Version byte found in the payload.
        version: u8,
        /// Highest version this build decodes.
        supported: u8,
    },

    /// The link is a Tessera link, but for a different kind of resource.
    #[error("link points to a {kind:?} resource, not a group")]
    NotAGroupLink {
        /// Resource kind named by the link.
        kind: String,
    },
}

/// Convenience result type for invite link operations.
pub type Result<T> = std::result::Result<T, InviteLinkError>;

/// Invite link format version.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum LinkVersion {
    /// Fixed 16-byte join secret.
    V1,
    /// Length-prefixed join secret (16..=64 bytes).
    V2,
}

impl LinkVersion {
    /// Version used for newly created links.
    pub const CURRENT: LinkVersion = LinkVersion::V2;

    /// Highest version number this build decodes.
    pub const MAX_SUPPORTED: u8 = 2;

    /// Map a wire version number to a known version.
    pub fn from_number(version: u8) -> Result<Self> {
        match version {
            1 => Ok(Self::V1),
            2 => Ok(Self::V2),
            0 => Err(InviteLinkError::MalformedLink(
                "version 0 is reserved".to_string(),
            )),
            other => Err(InviteLinkError::UnsupportedVersion {
                version: other,
                supported: Self::MAX_SUPPORTED,
            }),
        }
    }

    /// Wire version number.
    pub fn number(self) -> u8 {
        match self {
            Self::V1 => 1,
            Self::V2 => 2,
        }
    }

    /// Allowed join secret lengths for this version.
    pub fn secret_len_range(self) -> std::ops::RangeInclusive<usize> {
        match self {
            Self::V1 => secret::V1_SECRET_LEN..=secret::V1_SECRET_LEN,
            Self::V2 => secret::MIN_SECRET_LEN..=secret::MAX_SECRET_LEN,
        }
    }
}

impl fmt::Display for LinkVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "v{}", self.number())
    }
}

/// A decoded group invite link.
///
/// Immutable once constructed; the only ways to obtain one are [`parse`]
/// and [`GroupInviteLink::new`], both of which enforce the version's
/// invariants.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupInviteLink {
    group_id: GroupId,
    version: LinkVersion,
    join_secret: JoinSecret,
}

impl GroupInviteLink {
    /// Create a link, checking the secret length against the version.
    pub fn new(version: LinkVersion, group_id: GroupId, join_secret: JoinSecret) -> Result<Self> {
        let range = version.secret_len_range();
        if !range.contains(&join_secret.len()) {
            return Err(InviteLinkError::MalformedLink(format!(
                "{version} join secret must be {}..={} bytes, got {}",
                range.start(),
                range.end(),
                join_secret.len()
            )));
        }
        Ok(Self {
            group_id,
            version,
            join_secret,
        })
    }

    /// Create a current-format link with a freshly generated join secret.
    pub fn generate(group_id: GroupId) -> Self {
        Self {
            group_id,
            version: LinkVersion::CURRENT,
            join_secret: JoinSecret::generate(),
        }
    }

    /// Create a link in the current format.
    pub fn current(group_id: GroupId, join_secret: JoinSecret) -> Result<Self> {
        Self::new(LinkVersion::CURRENT, group_id, join_secret)
    }

    pub fn group_id(&self) -> &GroupId {
        &self.group_id
    }

    pub fn version(&self) -> LinkVersion {
        self.version
    }

    pub fn join_secret(&self) -> &JoinSecret {
        &self.join_secret
    }

    /// Canonical `https://tessera.link/group#…` URI for this link.
    pub fn to_uri(&self) -> String {
        link::encode(self)
    }
}
