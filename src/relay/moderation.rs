//! Event kind classification and the moderation permission table (§6).

pub const CHAT_KINDS: [u16; 4] = [9, 10, 11, 12];

pub const JOIN_REQUEST_KIND: u16 = 9021;
pub const LEAVE_REQUEST_KIND: u16 = 9022;

pub fn is_chat_kind(kind: u16) -> bool {
    CHAT_KINDS.contains(&kind)
}

pub fn is_moderation_kind(kind: u16) -> bool {
    (9000..=9020).contains(&kind)
        && kind != JOIN_REQUEST_KIND
        && kind != LEAVE_REQUEST_KIND
        && !is_group_creation_kind(kind)
}

pub fn is_group_user_kind(kind: u16) -> bool {
    is_chat_kind(kind)
        || is_moderation_kind(kind)
        || kind == JOIN_REQUEST_KIND
        || kind == LEAVE_REQUEST_KIND
        || is_group_creation_kind(kind)
}

pub fn is_capability_kind(kind: u16) -> bool {
    (29000..=29002).contains(&kind)
}

/// Capability kinds whose signer must be the group key: grants and revokes
/// only. Delegate events (29002) are signed by the delegating holder, not
/// the group key (§4.D).
pub fn requires_group_key_signer(kind: u16) -> bool {
    kind == 29000 || kind == 29001
}

pub fn is_group_creation_kind(kind: u16) -> bool {
    kind == 9007
}

/// Permission string required of the calling admin for a moderation kind,
/// per §6's moderation permission table. `None` for kinds not in the table
/// (still moderation-range, but without a defined permission — rejected).
pub fn required_permission(kind: u16) -> Option<&'static str> {
    match kind {
        9000 => Some("add-user"),
        9001 => Some("remove-user"),
        9002 => Some("edit-metadata"),
        9005 => Some("delete-event"),
        9008 => Some("delete-group"),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn join_and_leave_are_not_classified_as_moderation() {
        assert!(!is_moderation_kind(JOIN_REQUEST_KIND));
        assert!(!is_moderation_kind(LEAVE_REQUEST_KIND));
        assert!(is_group_user_kind(JOIN_REQUEST_KIND));
    }

    #[test]
    fn known_moderation_kinds_have_permissions() {
        assert_eq!(required_permission(9000), Some("add-user"));
        assert_eq!(required_permission(9008), Some("delete-group"));
        assert_eq!(required_permission(9999.min(9020)), None);
    }
}
