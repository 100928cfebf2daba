//! Component E — the relay authorization core (§4.E). Deliberately
//! single-writer state: every method takes `&mut self` and there is no
//! internal locking, matching §5's "the authorization decision must be made
//! on the writer" — whatever transport drives this is responsible for
//! funneling all mutation through one task.

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use tracing::{info, warn};

use crate::capability::{authorize, parse, Capability, CapabilityType};
use crate::curve::{point_compress, Point};
use crate::error::{CoreError, CoreResult};
use crate::event::{Event, Filter};

use super::config::RelayConfig;
use super::group::GroupState;
use super::moderation;

const RECENT_ID_WINDOW: usize = 1000;

fn pubkey_hex(p: &Point) -> String {
    hex::encode(point_compress(p))
}

/// Holds everything §4.E says the core must maintain: capabilities indexed
/// by holder and by event id, revoked ids, per-group admin/member state, and
/// the recent-id window used to validate `previous` tag references.
pub struct AuthorizationCore {
    config: RelayConfig,
    group_public_key: Point,
    groups: BTreeMap<String, GroupState>,
    capabilities_by_holder: BTreeMap<String, Vec<Capability>>,
    capabilities_by_event_id: BTreeMap<[u8; 32], Capability>,
    revoked_ids: BTreeSet<[u8; 32]>,
    recent_event_ids: VecDeque<[u8; 32]>,
}

impl AuthorizationCore {
    pub fn new(group_public_key: Point, config: RelayConfig) -> Self {
        Self {
            config,
            group_public_key,
            groups: BTreeMap::new(),
            capabilities_by_holder: BTreeMap::new(),
            capabilities_by_event_id: BTreeMap::new(),
            revoked_ids: BTreeSet::new(),
            recent_event_ids: VecDeque::new(),
        }
    }

    pub fn create_group(&mut self, id: impl Into<String>, open: bool) {
        let group = GroupState::new(id, open);
        self.groups.insert(group.id.clone(), group);
    }

    pub fn group(&self, id: &str) -> Option<&GroupState> {
        self.groups.get(id)
    }

    /// Runs the six-step admission pipeline (§4.E) against one inbound
    /// event. On `Ok`, the event has been applied to the store (capability
    /// state updated, membership updated, recent-id window advanced) and is
    /// ready to broadcast via [`Self::broadcast_targets`].
    pub fn admit_event(&mut self, event: &Event, now: u64) -> CoreResult<()> {
        match self.admit_event_inner(event, now) {
            Ok(()) => {
                info!(event_id = %hex::encode(event.id), kind = event.kind, "event admitted");
                Ok(())
            }
            Err(err) => {
                warn!(event_id = %hex::encode(event.id), kind = event.kind, %err, "event rejected");
                Err(err)
            }
        }
    }

    fn admit_event_inner(&mut self, event: &Event, now: u64) -> CoreResult<()> {
        event.verify()?;

        let size = serde_json::to_vec(event)
            .map(|bytes| bytes.len())
            .map_err(|_| CoreError::invalid("event does not serialize"))?;
        if size > self.config.max_event_size {
            return Err(CoreError::invalid("event too large"));
        }

        if moderation::requires_group_key_signer(event.kind) && event.pubkey != self.group_public_key {
            return Err(CoreError::restricted(
                "capability events must be signed by the group key",
            ));
        }

        if moderation::is_group_user_kind(event.kind) {
            self.check_group_membership_preconditions(event, now)?;
        }

        self.authorize(event)?;
        self.apply_side_effects(event)?;
        self.remember_event_id(event.id);
        Ok(())
    }

    fn check_group_membership_preconditions(&self, event: &Event, now: u64) -> CoreResult<()> {
        let group_id = event
            .group_id()
            .ok_or_else(|| CoreError::invalid("missing group id tag"))?;

        if !moderation::is_group_creation_kind(event.kind) && !self.groups.contains_key(group_id) {
            return Err(CoreError::invalid("unknown group"));
        }

        if !moderation::is_group_creation_kind(event.kind) {
            let previous_refs: Vec<&str> = event
                .tags
                .iter()
                .filter(|t| t.first().map(String::as_str) == Some("previous"))
                .filter_map(|t| t.get(1).map(String::as_str))
                .collect();
            if previous_refs.len() < self.config.min_previous_refs {
                return Err(CoreError::invalid("insufficient previous-event references"));
            }
            for prefix in previous_refs {
                if !self.is_known_prefix(prefix) {
                    return Err(CoreError::invalid("unknown previous-event reference"));
                }
            }
        }

        if now.saturating_sub(event.created_at) > self.config.late_publication_window {
            return Err(CoreError::invalid("event outside late-publication window"));
        }

        Ok(())
    }

    fn is_known_prefix(&self, prefix: &str) -> bool {
        self.recent_event_ids
            .iter()
            .any(|id| hex::encode(id).starts_with(prefix))
    }

    fn authorize(&self, event: &Event) -> CoreResult<()> {
        if moderation::is_chat_kind(event.kind) {
            let group_id = event.group_id();
            let is_member = group_id
                .and_then(|g| self.groups.get(g))
                .is_some_and(|g| g.is_member(&pubkey_hex(&event.pubkey)));
            let has_write = self.holder_has_capability(&event.pubkey, CapabilityType::Write, event);
            if !is_member && !has_write {
                return Err(CoreError::restricted("not a group member and no write capability"));
            }
            return Ok(());
        }

        if moderation::is_moderation_kind(event.kind) {
            let group_id = event
                .group_id()
                .ok_or_else(|| CoreError::invalid("missing group id tag"))?;
            let permission = moderation::required_permission(event.kind)
                .ok_or_else(|| CoreError::blocked("unsupported moderation kind"))?;
            let is_admin = self
                .groups
                .get(group_id)
                .is_some_and(|g| g.has_admin_permission(&pubkey_hex(&event.pubkey), permission));
            if !is_admin {
                return Err(CoreError::restricted("caller is not an admin with this permission"));
            }
            return Ok(());
        }

        // Join/leave requests, capability events, DKG frames, and relay-
        // signed metadata have already had their preconditions checked
        // above (or have none); §4.E step 5 names no further check for them.
        Ok(())
    }

    fn holder_has_capability(&self, holder: &Point, action: CapabilityType, event: &Event) -> bool {
        let caps = match self.capabilities_by_holder.get(&pubkey_hex(holder)) {
            Some(caps) => caps,
            None => return false,
        };
        authorize(
            caps,
            holder,
            action,
            event.created_at,
            Some((event.kind, &event.tags)),
        )
        .is_some()
    }

    fn apply_side_effects(&mut self, event: &Event) -> CoreResult<()> {
        match event.kind {
            29000 => {
                let cap = parse::parse_grant(event)?;
                self.store_capability(cap);
            }
            29001 => {
                let referenced = parse::parse_revoke(event)?;
                self.revoke_capability(referenced);
            }
            29002 => {
                let referenced_hex = event
                    .tag_value("e")
                    .ok_or_else(|| CoreError::invalid("delegate missing referenced grant id"))?;
                let referenced_bytes =
                    hex::decode(referenced_hex).map_err(|_| CoreError::invalid("malformed referenced id"))?;
                let referenced: [u8; 32] = referenced_bytes
                    .try_into()
                    .map_err(|_| CoreError::invalid("referenced id must be 32 bytes"))?;
                let original = self
                    .capabilities_by_event_id
                    .get(&referenced)
                    .cloned()
                    .ok_or_else(|| CoreError::invalid("delegate references unknown grant"))?;
                let delegated = parse::parse_delegate(event, &original)?;
                self.store_capability(delegated);
            }
            k if k == moderation::JOIN_REQUEST_KIND => {
                if let Some(group_id) = event.group_id() {
                    let holder = pubkey_hex(&event.pubkey);
                    if let Some(group) = self.groups.get_mut(group_id) {
                        if group.open {
                            group.add_member(holder);
                        } else {
                            group.record_join_request(holder);
                        }
                    }
                }
            }
            k if k == moderation::LEAVE_REQUEST_KIND => {
                if let Some(group_id) = event.group_id() {
                    let holder = pubkey_hex(&event.pubkey);
                    if let Some(group) = self.groups.get_mut(group_id) {
                        group.remove_member(&holder);
                    }
                }
            }
            k if moderation::is_group_creation_kind(k) => {
                if let Some(group_id) = event.group_id() {
                    if !self.groups.contains_key(group_id) {
                        self.create_group(group_id.to_string(), false);
                    }
                    let holder = pubkey_hex(&event.pubkey);
                    if let Some(group) = self.groups.get_mut(group_id) {
                        group.add_member(holder);
                    }
                }
            }
            _ => {}
        }
        Ok(())
    }

    fn store_capability(&mut self, cap: Capability) {
        self.capabilities_by_event_id.insert(cap.event_id, cap.clone());
        self.capabilities_by_holder
            .entry(pubkey_hex(&cap.holder))
            .or_default()
            .push(cap);
    }

    fn revoke_capability(&mut self, referenced_id: [u8; 32]) {
        self.revoked_ids.insert(referenced_id);
        if let Some(cap) = self.capabilities_by_event_id.remove(&referenced_id) {
            let holder = pubkey_hex(&cap.holder);
            if let Some(caps) = self.capabilities_by_holder.get_mut(&holder) {
                caps.retain(|c| c.event_id != referenced_id);
            }
        }
    }

    fn remember_event_id(&mut self, id: [u8; 32]) {
        self.recent_event_ids.push_back(id);
        if self.recent_event_ids.len() > RECENT_ID_WINDOW {
            self.recent_event_ids.pop_front();
        }
    }

    /// Returns the ids of subscriptions whose filters match `event`, each
    /// appearing at most once even if several of its filters match (§4.E
    /// "suppresses duplicate deliveries within a single event dispatch").
    pub fn broadcast_targets<'a>(
        &self,
        event: &Event,
        subscriptions: impl IntoIterator<Item = (&'a str, &'a [Filter])>,
    ) -> Vec<String> {
        subscriptions
            .into_iter()
            .filter(|(_, filters)| filters.iter().any(|f| f.matches(event)))
            .map(|(id, _)| id.to_string())
            .collect()
    }
}
