//! Per-group membership and admin state (§4.E, §6 kinds 39000-39002).

use std::collections::{BTreeMap, BTreeSet};

/// Admin and member sets for one group, keyed by group id. Pubkeys are
/// tracked as their hex encoding (the same encoding `Event::pubkey` uses on
/// the wire) rather than raw `Point`s, since `Point` has no total order to
/// put it in a `BTreeMap` key.
#[derive(Clone, Debug)]
pub struct GroupState {
    pub id: String,
    pub open: bool,
    pub members: BTreeSet<String>,
    /// Admin pubkey hex -> the set of moderation permission strings they hold.
    pub admins: BTreeMap<String, BTreeSet<String>>,
    pub pending_join_requests: BTreeSet<String>,
}

impl GroupState {
    pub fn new(id: impl Into<String>, open: bool) -> Self {
        Self {
            id: id.into(),
            open,
            members: BTreeSet::new(),
            admins: BTreeMap::new(),
            pending_join_requests: BTreeSet::new(),
        }
    }

    pub fn is_member(&self, pubkey_hex: &str) -> bool {
        self.members.contains(pubkey_hex)
    }

    pub fn add_member(&mut self, pubkey_hex: impl Into<String>) {
        self.members.insert(pubkey_hex.into());
    }

    pub fn remove_member(&mut self, pubkey_hex: &str) {
        self.members.remove(pubkey_hex);
    }

    pub fn grant_admin_permission(&mut self, pubkey_hex: impl Into<String>, permission: impl Into<String>) {
        self.admins
            .entry(pubkey_hex.into())
            .or_default()
            .insert(permission.into());
    }

    pub fn has_admin_permission(&self, pubkey_hex: &str, permission: &str) -> bool {
        self.admins
            .get(pubkey_hex)
            .is_some_and(|perms| perms.contains(permission))
    }

    pub fn record_join_request(&mut self, pubkey_hex: impl Into<String>) {
        self.pending_join_requests.insert(pubkey_hex.into());
    }
}
