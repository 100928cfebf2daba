//! The capability decision function (§4.D "Authorization decision").

use crate::curve::Point;

use super::types::{Capability, CapabilityType};

/// Picks the first capability in `capabilities` that authorizes `holder` to
/// perform `action`, applying expiry and qualifier checks in order. Returns
/// the index into `capabilities` of the winning record, or `None` if every
/// candidate is expired, mismatched, or absent ("denied, no capability").
///
/// `event_kind_and_tags` carries the kind and tags of the event being
/// authorized, when `action` is being checked against a specific event
/// (publish/delete); pass `None` for actions with no event to qualify
/// against (e.g. checking a bare `Read` grant).
pub fn authorize(
    capabilities: &[Capability],
    holder: &Point,
    action: CapabilityType,
    now: u64,
    event_kind_and_tags: Option<(u16, &[Vec<String>])>,
) -> Option<usize> {
    capabilities.iter().position(|cap| {
        if cap.holder != *holder || cap.cap_type != action {
            return false;
        }
        if let Some(expires_at) = cap.expires_at {
            if now >= expires_at {
                return false;
            }
        }
        if let Some((kind, tags)) = event_kind_and_tags {
            if let Some(kinds) = &cap.qualifiers.kinds {
                if !kinds.contains(&kind) {
                    return false;
                }
            }
            if let Some(required) = &cap.qualifiers.required_tags {
                let has_all = required.iter().all(|(name, value)| {
                    tags.iter()
                        .any(|t| t.first().map(String::as_str) == Some(name.as_str()) && t.get(1).map(String::as_str) == Some(value.as_str()))
                });
                if !has_all {
                    return false;
                }
            }
            if let Some(excluded) = &cap.qualifiers.excluded_tags {
                let has_any = excluded.iter().any(|(name, value)| {
                    tags.iter()
                        .any(|t| t.first().map(String::as_str) == Some(name.as_str()) && t.get(1).map(String::as_str) == Some(value.as_str()))
                });
                if has_any {
                    return false;
                }
            }
        }
        true
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{generator, rand_scalar_nonzero};
    use rand::SeedableRng;

    fn sample_cap(
        holder: Point,
        issuer: Point,
        cap_type: CapabilityType,
        expires_at: Option<u64>,
        kinds: Option<Vec<u16>>,
    ) -> Capability {
        Capability {
            event_id: [0u8; 32],
            cap_type,
            holder,
            issuer,
            qualifiers: super::super::types::Qualifiers {
                kinds,
                required_tags: None,
                excluded_tags: None,
            },
            issued_at: 0,
            expires_at,
            delegation_chain: Vec::new(),
            rate_limit: None,
        }
    }

    #[test]
    fn picks_matching_unexpired_capability() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(60);
        let issuer = generator() * rand_scalar_nonzero(&mut rng);
        let holder = generator() * rand_scalar_nonzero(&mut rng);
        let caps = vec![sample_cap(holder, issuer, CapabilityType::Write, Some(2000), None)];

        let found = authorize(&caps, &holder, CapabilityType::Write, 1000, None);
        assert_eq!(found, Some(0));
    }

    #[test]
    fn expired_capability_is_skipped() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(61);
        let issuer = generator() * rand_scalar_nonzero(&mut rng);
        let holder = generator() * rand_scalar_nonzero(&mut rng);
        let caps = vec![sample_cap(holder, issuer, CapabilityType::Write, Some(500), None)];

        assert_eq!(authorize(&caps, &holder, CapabilityType::Write, 1000, None), None);
    }

    #[test]
    fn kind_qualifier_excludes_mismatched_event() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(62);
        let issuer = generator() * rand_scalar_nonzero(&mut rng);
        let holder = generator() * rand_scalar_nonzero(&mut rng);
        let caps = vec![sample_cap(
            holder,
            issuer,
            CapabilityType::Publish,
            None,
            Some(vec![9]),
        )];

        assert_eq!(
            authorize(&caps, &holder, CapabilityType::Publish, 1000, Some((10, &[]))),
            None
        );
        assert_eq!(
            authorize(&caps, &holder, CapabilityType::Publish, 1000, Some((9, &[]))),
            Some(0)
        );
    }

    #[test]
    fn no_matching_capability_denies() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(63);
        let holder = generator() * rand_scalar_nonzero(&mut rng);
        assert_eq!(authorize(&[], &holder, CapabilityType::Read, 0, None), None);
    }
}
