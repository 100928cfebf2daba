//! Capability records (§3 "Capability", §4.D).

use crate::curve::Point;
use crate::error::{CapabilityErrorKind, CoreError, CoreResult};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CapabilityType {
    Read,
    Write,
    Publish,
    Delete,
    Delegate,
}

impl CapabilityType {
    pub fn parse(s: &str) -> CoreResult<Self> {
        match s {
            "read" => Ok(Self::Read),
            "write" => Ok(Self::Write),
            "publish" => Ok(Self::Publish),
            "delete" => Ok(Self::Delete),
            "delegate" => Ok(Self::Delegate),
            other => Err(CoreError::capability(CapabilityErrorKind::UnknownType(
                other.to_string(),
            ))),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Publish => "publish",
            Self::Delete => "delete",
            Self::Delegate => "delegate",
        }
    }
}

/// `(count, periodSeconds)`, both `>= 1` (§4.D "Parsing rules").
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RateLimitQuota {
    pub count: u32,
    pub period_seconds: u32,
}

/// Optional narrowing conditions on a capability (§3 "Capability.qualifiers").
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Qualifiers {
    pub kinds: Option<Vec<u16>>,
    pub required_tags: Option<Vec<(String, String)>>,
    pub excluded_tags: Option<Vec<(String, String)>>,
}

/// An immutable capability record derived from a signed grant or delegate
/// event (§3 "Ownership and lifecycle": "derived from a signed grant event;
/// ... logically destroyed by a subsequent revocation record, never
/// mutated"). Revocation is tracked by the holder of this set (Component E's
/// `GroupState`), not by this type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Capability {
    /// The id of the event that created this capability — what a
    /// subsequent revocation or delegation references.
    pub event_id: [u8; 32],
    pub cap_type: CapabilityType,
    pub holder: Point,
    /// The group public key, copied unchanged through a delegation chain
    /// (§4.D "the group key remains the trust root").
    pub issuer: Point,
    pub qualifiers: Qualifiers,
    pub issued_at: u64,
    pub expires_at: Option<u64>,
    /// `(delegator, delegatee, bindingEventId)` triples, oldest first.
    pub delegation_chain: Vec<(Point, Point, [u8; 32])>,
    pub rate_limit: Option<RateLimitQuota>,
}

impl Capability {
    /// The core exposes the quota but never maintains counters against it
    /// (§4.D, Open Question (d)) — enforcement is the collaborator's job.
    pub fn rate_limit_quota(&self) -> Option<RateLimitQuota> {
        self.rate_limit
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_type_parse_roundtrip() {
        for t in [
            CapabilityType::Read,
            CapabilityType::Write,
            CapabilityType::Publish,
            CapabilityType::Delete,
            CapabilityType::Delegate,
        ] {
            assert_eq!(CapabilityType::parse(t.as_str()).unwrap(), t);
        }
    }

    #[test]
    fn unknown_capability_type_is_rejected() {
        assert!(CapabilityType::parse("admin").is_err());
    }
}
