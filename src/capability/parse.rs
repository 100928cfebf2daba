//! Parsing grant/revoke/delegate events into [`Capability`] records and
//! chaining delegations onto an original grant (§4.D "Parsing rules",
//! "Delegation subset check").

use crate::curve::point_decompress;
use crate::error::{CapabilityErrorKind, CoreError, CoreResult};
use crate::event::Event;

use super::types::{Capability, CapabilityType, Qualifiers, RateLimitQuota};

fn decode_pubkey(hex_str: &str) -> CoreResult<crate::curve::Point> {
    let bytes = hex::decode(hex_str).map_err(|_| CoreError::invalid("malformed pubkey hex"))?;
    point_decompress(&bytes)
}

fn parse_qualifiers(event: &Event) -> CoreResult<Qualifiers> {
    let kinds = event
        .tags
        .iter()
        .find(|t| t.first().map(String::as_str) == Some("kinds"))
        .map(|t| {
            t[1..]
                .iter()
                .map(|s| {
                    s.parse::<u16>()
                        .map_err(|_| CoreError::invalid("malformed kinds qualifier"))
                })
                .collect::<CoreResult<Vec<u16>>>()
        })
        .transpose()?;

    let required_tags = collect_tag_pairs(event, "required-tags");
    let excluded_tags = collect_tag_pairs(event, "excluded-tags");

    Ok(Qualifiers {
        kinds,
        required_tags,
        excluded_tags,
    })
}

fn collect_tag_pairs(event: &Event, name: &str) -> Option<Vec<(String, String)>> {
    let pairs: Vec<(String, String)> = event
        .tags
        .iter()
        .filter(|t| t.first().map(String::as_str) == Some(name))
        .filter_map(|t| Some((t.get(1)?.clone(), t.get(2)?.clone())))
        .collect();
    if pairs.is_empty() {
        None
    } else {
        Some(pairs)
    }
}

fn parse_rate_limit(event: &Event) -> CoreResult<Option<RateLimitQuota>> {
    event
        .tags
        .iter()
        .find(|t| t.first().map(String::as_str) == Some("rate-limit"))
        .map(|t| {
            let count: u32 = t
                .get(1)
                .and_then(|s| s.parse().ok())
                .filter(|c| *c >= 1)
                .ok_or_else(|| CoreError::capability(CapabilityErrorKind::InvalidRateLimit))?;
            let period_seconds: u32 = t
                .get(2)
                .and_then(|s| s.parse().ok())
                .filter(|p| *p >= 1)
                .ok_or_else(|| CoreError::capability(CapabilityErrorKind::InvalidRateLimit))?;
            Ok(RateLimitQuota {
                count,
                period_seconds,
            })
        })
        .transpose()
}

fn parse_expiry(event: &Event) -> CoreResult<Option<u64>> {
    event
        .tag_value("expiration")
        .map(|s| {
            s.parse::<u64>()
                .map_err(|_| CoreError::invalid("malformed expiration tag"))
        })
        .transpose()
}

/// Parses a grant event (kind `29000`) into a [`Capability`] whose `issuer`
/// is the grant's signer. The caller is responsible for having already
/// checked that signer is the group key (§4.E step 3) — this function only
/// parses structure.
pub fn parse_grant(event: &Event) -> CoreResult<Capability> {
    let holder_hex = event
        .tag_value("p")
        .ok_or_else(|| CoreError::capability(CapabilityErrorKind::MissingHolder))?;
    let holder = decode_pubkey(holder_hex)?;

    let type_str = event
        .tag_value("capability")
        .ok_or_else(|| CoreError::invalid("missing capability type tag"))?;
    let cap_type = CapabilityType::parse(type_str)?;

    Ok(Capability {
        event_id: event.id,
        cap_type,
        holder,
        issuer: event.pubkey,
        qualifiers: parse_qualifiers(event)?,
        issued_at: event.created_at,
        expires_at: parse_expiry(event)?,
        delegation_chain: Vec::new(),
        rate_limit: parse_rate_limit(event)?,
    })
}

/// Parses a revoke event (kind `29001`), returning the id of the grant it revokes.
pub fn parse_revoke(event: &Event) -> CoreResult<[u8; 32]> {
    let referenced = event
        .tag_value("e")
        .ok_or_else(|| CoreError::invalid("revoke missing referenced grant id"))?;
    let bytes =
        hex::decode(referenced).map_err(|_| CoreError::invalid("malformed referenced id"))?;
    bytes
        .try_into()
        .map_err(|_| CoreError::invalid("referenced id must be 32 bytes"))
}

/// Parses a delegate event (kind `29002`) against the `original` grant it
/// delegates from, enforcing every rule in §4.D "Delegation subset check".
pub fn parse_delegate(event: &Event, original: &Capability) -> CoreResult<Capability> {
    if original.cap_type != CapabilityType::Delegate {
        return Err(CoreError::capability(CapabilityErrorKind::NotDelegateType));
    }
    if event.pubkey != original.holder {
        return Err(CoreError::capability(CapabilityErrorKind::SignerMismatch));
    }
    let referenced = parse_revoke_like_reference(event)?;
    if referenced != original.event_id {
        return Err(CoreError::capability(CapabilityErrorKind::ReferenceMismatch));
    }

    let holder_hex = event
        .tag_value("p")
        .ok_or_else(|| CoreError::capability(CapabilityErrorKind::MissingHolder))?;
    let holder = decode_pubkey(holder_hex)?;

    let type_str = event
        .tag_value("capability")
        .ok_or_else(|| CoreError::invalid("missing capability type tag"))?;
    let cap_type = CapabilityType::parse(type_str)?;

    let qualifiers = parse_qualifiers(event)?;
    if let Some(parent_kinds) = &original.qualifiers.kinds {
        match &qualifiers.kinds {
            Some(kinds) if kinds.iter().all(|k| parent_kinds.contains(k)) => {}
            _ => return Err(CoreError::capability(CapabilityErrorKind::KindsNotSubset)),
        }
    }

    let expires_at = parse_expiry(event)?;
    if let Some(parent_expiry) = original.expires_at {
        match expires_at {
            Some(e) if e <= parent_expiry => {}
            _ => return Err(CoreError::capability(CapabilityErrorKind::ExpiryExceedsParent)),
        }
    }

    let mut delegation_chain = original.delegation_chain.clone();
    delegation_chain.push((original.holder, holder, event.id));

    Ok(Capability {
        event_id: event.id,
        cap_type,
        holder,
        issuer: original.issuer,
        qualifiers,
        issued_at: event.created_at,
        expires_at,
        delegation_chain,
        rate_limit: parse_rate_limit(event)?,
    })
}

fn parse_revoke_like_reference(event: &Event) -> CoreResult<[u8; 32]> {
    let referenced = event
        .tag_value("e")
        .ok_or_else(|| CoreError::invalid("delegate missing referenced grant id"))?;
    let bytes =
        hex::decode(referenced).map_err(|_| CoreError::invalid("malformed referenced id"))?;
    bytes
        .try_into()
        .map_err(|_| CoreError::invalid("referenced id must be 32 bytes"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{generator, rand_scalar_nonzero};
    use rand::SeedableRng;

    fn bare_event(pubkey: crate::curve::Point, kind: u16, tags: Vec<Vec<String>>) -> Event {
        let mut event = Event {
            id: [0u8; 32],
            pubkey,
            created_at: 1_700_000_000,
            kind,
            tags,
            content: String::new(),
            sig: [0u8; 64],
        };
        event.id = event.compute_id();
        event
    }

    #[test]
    fn parse_grant_reads_holder_type_and_qualifiers() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(50);
        let issuer = generator() * rand_scalar_nonzero(&mut rng);
        let holder = generator() * rand_scalar_nonzero(&mut rng);

        let event = bare_event(
            issuer,
            29000,
            vec![
                vec!["p".into(), hex::encode(crate::curve::point_compress(&holder))],
                vec!["capability".into(), "write".into()],
                vec!["kinds".into(), "9".into(), "10".into()],
                vec!["expiration".into(), "1800000000".into()],
            ],
        );

        let cap = parse_grant(&event).unwrap();
        assert_eq!(cap.cap_type, CapabilityType::Write);
        assert_eq!(cap.holder, holder);
        assert_eq!(cap.qualifiers.kinds, Some(vec![9, 10]));
        assert_eq!(cap.expires_at, Some(1_800_000_000));
    }

    #[test]
    fn unknown_type_tag_fails_parse() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(51);
        let issuer = generator() * rand_scalar_nonzero(&mut rng);
        let holder = generator() * rand_scalar_nonzero(&mut rng);
        let event = bare_event(
            issuer,
            29000,
            vec![
                vec!["p".into(), hex::encode(crate::curve::point_compress(&holder))],
                vec!["capability".into(), "admin".into()],
            ],
        );
        assert!(parse_grant(&event).is_err());
    }

    #[test]
    fn delegation_exceeding_parent_kinds_is_rejected() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(52);
        let issuer = generator() * rand_scalar_nonzero(&mut rng);
        let delegate_holder = generator() * rand_scalar_nonzero(&mut rng);
        let sub_holder = generator() * rand_scalar_nonzero(&mut rng);

        let grant_event = bare_event(
            issuer,
            29000,
            vec![
                vec![
                    "p".into(),
                    hex::encode(crate::curve::point_compress(&delegate_holder)),
                ],
                vec!["capability".into(), "delegate".into()],
                vec!["kinds".into(), "9".into()],
            ],
        );
        let original = parse_grant(&grant_event).unwrap();

        let delegate_event = bare_event(
            delegate_holder,
            29002,
            vec![
                vec!["e".into(), hex::encode(grant_event.id)],
                vec!["p".into(), hex::encode(crate::curve::point_compress(&sub_holder))],
                vec!["capability".into(), "write".into()],
                vec!["kinds".into(), "9".into(), "10".into()],
            ],
        );

        assert!(parse_delegate(&delegate_event, &original).is_err());
    }

    #[test]
    fn valid_delegation_builds_chain() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(53);
        let issuer = generator() * rand_scalar_nonzero(&mut rng);
        let delegate_holder = generator() * rand_scalar_nonzero(&mut rng);
        let sub_holder = generator() * rand_scalar_nonzero(&mut rng);

        let grant_event = bare_event(
            issuer,
            29000,
            vec![
                vec![
                    "p".into(),
                    hex::encode(crate::curve::point_compress(&delegate_holder)),
                ],
                vec!["capability".into(), "delegate".into()],
                vec!["kinds".into(), "9".into(), "10".into()],
                vec!["expiration".into(), "2000000000".into()],
            ],
        );
        let original = parse_grant(&grant_event).unwrap();

        let delegate_event = bare_event(
            delegate_holder,
            29002,
            vec![
                vec!["e".into(), hex::encode(grant_event.id)],
                vec!["p".into(), hex::encode(crate::curve::point_compress(&sub_holder))],
                vec!["capability".into(), "write".into()],
                vec!["kinds".into(), "9".into()],
                vec!["expiration".into(), "1900000000".into()],
            ],
        );

        let delegated = parse_delegate(&delegate_event, &original).unwrap();
        assert_eq!(delegated.issuer, issuer);
        assert_eq!(
            delegated.delegation_chain,
            vec![(delegate_holder, sub_holder, delegate_event.id)]
        );
    }
}
