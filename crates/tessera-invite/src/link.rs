//! Invite link URI parsing and encoding.

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use tessera_crypto::blake3::{link_checksum, verify_link_checksum, CHECKSUM_LEN};
use tessera_types::{GroupId, GROUP_ID_LEN};
use tracing::debug;
use zeroize::Zeroizing;

use crate::{GroupInviteLink, InviteLinkError, JoinSecret, LinkVersion, Result};

/// Custom URI scheme for Tessera links.
const LINK_SCHEME: &str = "tessera";

/// Web scheme; only valid together with [`LINK_HOST`].
const WEB_SCHEME: &str = "https";

/// Host serving Tessera web links.
const LINK_HOST: &str = "tessera.link";

/// Resource kind of group invite links.
const GROUP_KIND: &str = "group";

fn malformed(reason: impl Into<String>) -> InviteLinkError {
    InviteLinkError::MalformedLink(reason.into())
}

/// Parse an invite URI into a [`GroupInviteLink`].
///
/// Accepts `https://tessera.link/group#<payload>` and
/// `tessera://group#<payload>`; scheme and host are matched
/// case-insensitively and surrounding whitespace is ignored.
pub fn parse(uri: &str) -> Result<GroupInviteLink> {
    let uri = uri.trim();
    let (scheme, rest) = uri
        .split_once("://")
        .ok_or_else(|| malformed("missing URI scheme"))?;

    let location = match scheme.to_ascii_lowercase().as_str() {
        LINK_SCHEME => rest,
        WEB_SCHEME => strip_link_host(rest)?,
        other => return Err(malformed(format!("unknown scheme {other:?}"))),
    };

    let (path, fragment) = match location.split_once('#') {
        Some((path, fragment)) => (path, Some(fragment)),
        None => (location, None),
    };

    let kind = resource_kind(path)?;
    if !kind.eq_ignore_ascii_case(GROUP_KIND) {
        return Err(InviteLinkError::NotAGroupLink {
            kind: kind.to_ascii_lowercase(),
        });
    }

    let payload = fragment
        .filter(|f| !f.is_empty())
        .ok_or_else(|| malformed("missing link payload"))?;

    decode_payload(payload)
}

/// Encode a link as its canonical web URI.
pub(crate) fn encode(link: &GroupInviteLink) -> String {
    let version = link.version();
    let secret = link.join_secret().as_bytes();

    let mut bytes = Zeroizing::new(Vec::with_capacity(
        1 + GROUP_ID_LEN + 1 + secret.len() + CHECKSUM_LEN,
    ));
    bytes.push(version.number());
    bytes.extend_from_slice(link.group_id().as_bytes());
    if version == LinkVersion::V2 {
        // Bounded by MAX_SECRET_LEN, checked in GroupInviteLink::new.
        bytes.push(secret.len() as u8);
    }
    bytes.extend_from_slice(secret);
    let checksum = link_checksum(&bytes);
    bytes.extend_from_slice(&checksum);

    format!(
        "{WEB_SCHEME}://{LINK_HOST}/{GROUP_KIND}#{}",
        URL_SAFE_NO_PAD.encode(bytes.as_slice())
    )
}

/// Strip `tessera.link` from the authority of a web link.
fn strip_link_host(rest: &str) -> Result<&str> {
    let host_end = rest.find(['/', '#', '?']).unwrap_or(rest.len());
    let (host, remainder) = rest.split_at(host_end);
    if !host.eq_ignore_ascii_case(LINK_HOST) {
        return Err(malformed(format!("unexpected host {host:?}")));
    }
    Ok(remainder.strip_prefix('/').unwrap_or(remainder))
}

/// Extract the single path segment naming the resource kind.
fn resource_kind(path: &str) -> Result<&str> {
    if path.contains('?') {
        return Err(malformed("unexpected query string"));
    }
    let kind = path.trim_end_matches('/');
    if kind.is_empty() {
        return Err(malformed("missing resource kind"));
    }
    if !kind
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(malformed(format!("unexpected path {path:?}")));
    }
    Ok(kind)
}

fn decode_payload(payload: &str) -> Result<GroupInviteLink> {
    let bytes = Zeroizing::new(
        URL_SAFE_NO_PAD
            .decode(payload)
            .map_err(|e| malformed(format!("base64 decode error: {e}")))?,
    );

    // The version decides the layout of everything after it, including
    // the checksum, so nothing else is read for unknown versions.
    let version_byte = *bytes.first().ok_or_else(|| malformed("empty payload"))?;
    let version = LinkVersion::from_number(version_byte)?;

    if bytes.len() < 1 + CHECKSUM_LEN {
        return Err(malformed("payload too short"));
    }
    let (signed, checksum) = bytes.split_at(bytes.len() - CHECKSUM_LEN);
    verify_link_checksum(signed, checksum).map_err(|_| malformed("checksum mismatch"))?;

    let body = &signed[1..];
    let (group_bytes, secret) = match version {
        LinkVersion::V1 => split_v1(body)?,
        LinkVersion::V2 => split_v2(body)?,
    };

    let group_id = GroupId::from_slice(group_bytes).map_err(|e| malformed(e.to_string()))?;
    let link = GroupInviteLink::new(version, group_id, JoinSecret::from_bytes(secret.to_vec()))?;

    debug!(version = %version, "decoded group invite link");
    Ok(link)
}

fn split_v1(body: &[u8]) -> Result<(&[u8], &[u8])> {
    let expected = GROUP_ID_LEN + crate::secret::V1_SECRET_LEN;
    if body.len() != expected {
        return Err(malformed(format!(
            "v1 body must be {expected} bytes, got {}",
            body.len()
        )));
    }
    Ok(body.split_at(GROUP_ID_LEN))
}

fn split_v2(body: &[u8]) -> Result<(&[u8], &[u8])> {
    if body.len() <= GROUP_ID_LEN {
        return Err(malformed("v2 body truncated"));
    }
    let (group_bytes, rest) = body.split_at(GROUP_ID_LEN);
    let (&secret_len, secret) = rest
        .split_first()
        .ok_or_else(|| malformed("v2 body truncated"))?;
    if secret.len() != usize::from(secret_len) {
        return Err(malformed(format!(
            "join secret length prefix {secret_len} does not match {} remaining bytes",
            secret.len()
        )));
    }
    Ok((group_bytes, secret))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn group() -> GroupId {
        GroupId::from_bytes([0x5A; GROUP_ID_LEN])
    }

    /// Build a web URI from raw payload bytes, appending a valid checksum.
    fn uri_with_checksum(unsigned: &[u8]) -> String {
        let mut bytes = unsigned.to_vec();
        bytes.extend_from_slice(&link_checksum(unsigned));
        format!("https://tessera.link/group#{}", URL_SAFE_NO_PAD.encode(bytes))
    }

    fn v2_link() -> GroupInviteLink {
        GroupInviteLink::current(group(), JoinSecret::from_bytes(vec![0x33; 24]))
            .expect("valid link")
    }

    #[test]
    fn test_encoded_v2_link_parses_back() {
        let link = v2_link();
        let uri = link.to_uri();
        assert!(uri.starts_with("https://tessera.link/group#"));
        assert_eq!(parse(&uri).expect("parse"), link);
    }

    #[test]
    fn test_encoded_v1_link_parses_back() {
        let link = GroupInviteLink::new(
            LinkVersion::V1,
            group(),
            JoinSecret::from_bytes(vec![0x01; 16]),
        )
        .expect("valid link");
        let parsed = parse(&link.to_uri()).expect("parse");
        assert_eq!(parsed.version(), LinkVersion::V1);
        assert_eq!(parsed, link);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let uri = v2_link().to_uri();
        assert_eq!(parse(&uri), parse(&uri));
        let bad = "ftp://tessera.link/group#AAAA";
        assert_eq!(parse(bad), parse(bad));
    }

    #[test]
    fn test_unknown_scheme_is_malformed() {
        let uri = v2_link().to_uri().replacen("https", "gopher", 1);
        assert!(matches!(parse(&uri), Err(InviteLinkError::MalformedLink(_))));
    }

    #[test]
    fn test_missing_scheme_is_malformed() {
        assert!(matches!(
            parse("tessera.link/group#AAAA"),
            Err(InviteLinkError::MalformedLink(_))
        ));
        assert!(matches!(parse(""), Err(InviteLinkError::MalformedLink(_))));
    }

    #[test]
    fn test_wrong_host_is_malformed() {
        let uri = v2_link().to_uri().replace("tessera.link", "example.com");
        assert!(matches!(parse(&uri), Err(InviteLinkError::MalformedLink(_))));
    }

    #[test]
    fn test_scheme_and_host_case_insensitive() {
        let uri = v2_link()
            .to_uri()
            .replace("https://tessera.link", "HTTPS://Tessera.Link");
        assert_eq!(parse(&uri).expect("parse"), v2_link());
    }

    #[test]
    fn test_custom_scheme_accepted() {
        let uri = v2_link()
            .to_uri()
            .replace("https://tessera.link/group", "tessera://group");
        assert_eq!(parse(&uri).expect("parse"), v2_link());

        let with_slash = v2_link()
            .to_uri()
            .replace("https://tessera.link/group", "tessera://group/");
        assert_eq!(parse(&with_slash).expect("parse"), v2_link());
    }

    #[test]
    fn test_surrounding_whitespace_ignored() {
        let uri = format!("  {}\n", v2_link().to_uri());
        assert!(parse(&uri).is_ok());
    }

    #[test]
    fn test_contact_link_is_not_a_group_link() {
        let uri = v2_link().to_uri().replace("/group#", "/contact#");
        assert_eq!(
            parse(&uri),
            Err(InviteLinkError::NotAGroupLink {
                kind: "contact".to_string()
            })
        );
        assert!(matches!(
            parse("tessera://Channel#whatever"),
            Err(InviteLinkError::NotAGroupLink { kind }) if kind == "channel"
        ));
    }

    #[test]
    fn test_missing_kind_or_payload_is_malformed() {
        assert!(matches!(
            parse("https://tessera.link/#AAAA"),
            Err(InviteLinkError::MalformedLink(_))
        ));
        assert!(matches!(
            parse("https://tessera.link/group"),
            Err(InviteLinkError::MalformedLink(_))
        ));
        assert!(matches!(
            parse("https://tessera.link/group#"),
            Err(InviteLinkError::MalformedLink(_))
        ));
    }

    #[test]
    fn test_extra_path_or_query_is_malformed() {
        let uri = v2_link().to_uri().replace("/group#", "/group/extra#");
        assert!(matches!(parse(&uri), Err(InviteLinkError::MalformedLink(_))));
        let uri = v2_link().to_uri().replace("/group#", "/group?x=1#");
        assert!(matches!(parse(&uri), Err(InviteLinkError::MalformedLink(_))));
    }

    #[test]
    fn test_invalid_base64_is_malformed() {
        assert!(matches!(
            parse("https://tessera.link/group#not*base64!"),
            Err(InviteLinkError::MalformedLink(_))
        ));
    }

    #[test]
    fn test_future_version_unsupported_without_decoding() {
        // No checksum and a nonsense body: only the version byte is read.
        let payload = URL_SAFE_NO_PAD.encode([3u8, 0xFF, 0x00]);
        let uri = format!("https://tessera.link/group#{payload}");
        assert_eq!(
            parse(&uri),
            Err(InviteLinkError::UnsupportedVersion {
                version: 3,
                supported: 2
            })
        );

        let payload = URL_SAFE_NO_PAD.encode([200u8]);
        let uri = format!("tessera://group#{payload}");
        assert!(matches!(
            parse(&uri),
            Err(InviteLinkError::UnsupportedVersion { version: 200, .. })
        ));
    }

    #[test]
    fn test_checksum_mismatch_is_malformed() {
        let uri = v2_link().to_uri();
        let (prefix, payload) = uri.split_once('#').expect("fragment");
        let mut bytes = URL_SAFE_NO_PAD.decode(payload).expect("decode");
        bytes[5] ^= 0x01;
        let tampered = format!("{prefix}#{}", URL_SAFE_NO_PAD.encode(bytes));
        assert_eq!(
            parse(&tampered),
            Err(InviteLinkError::MalformedLink("checksum mismatch".to_string()))
        );
    }

    #[test]
    fn test_truncated_v1_body_is_malformed() {
        let mut unsigned = vec![1u8];
        unsigned.extend_from_slice(&[0x5A; GROUP_ID_LEN]);
        unsigned.extend_from_slice(&[0x01; 10]);
        assert!(matches!(
            parse(&uri_with_checksum(&unsigned)),
            Err(InviteLinkError::MalformedLink(_))
        ));
    }

    #[test]
    fn test_v2_length_prefix_mismatch_is_malformed() {
        let mut unsigned = vec![2u8];
        unsigned.extend_from_slice(&[0x5A; GROUP_ID_LEN]);
        unsigned.push(20);
        unsigned.extend_from_slice(&[0x01; 18]);
        assert!(matches!(
            parse(&uri_with_checksum(&unsigned)),
            Err(InviteLinkError::MalformedLink(_))
        ));
    }

    #[test]
    fn test_v2_short_secret_is_malformed() {
        let mut unsigned = vec![2u8];
        unsigned.extend_from_slice(&[0x5A; GROUP_ID_LEN]);
        unsigned.push(4);
        unsigned.extend_from_slice(&[0x01; 4]);
        assert!(matches!(
            parse(&uri_with_checksum(&unsigned)),
            Err(InviteLinkError::MalformedLink(_))
        ));
    }

    #[test]
    fn test_zero_group_id_is_malformed() {
        let mut unsigned = vec![1u8];
        unsigned.extend_from_slice(&[0u8; GROUP_ID_LEN]);
        unsigned.extend_from_slice(&[0x01; 16]);
        assert!(matches!(
            parse(&uri_with_checksum(&unsigned)),
            Err(InviteLinkError::MalformedLink(_))
        ));
    }

    #[test]
    fn test_version_zero_is_malformed() {
        let mut unsigned = vec![0u8];
        unsigned.extend_from_slice(&[0x5A; GROUP_ID_LEN]);
        assert!(matches!(
            parse(&uri_with_checksum(&unsigned)),
            Err(InviteLinkError::MalformedLink(_))
        ));
    }
}
