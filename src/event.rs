//! The signed-event wire type and subscription filters (§6 "External
//! interfaces"). This crate implements the data types and the pure
//! functions that consume them; it does not open a socket — the transport,
//! reconnect/backoff policy, and CLI/config plumbing are out of scope (§1).

use serde::de::Error as _;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest, Sha256};

use crate::curve::{point_compress, point_decompress, Point};
use crate::error::{CoreError, CoreResult};
use crate::keys::GroupKey;
use crate::sign;

/// A signed event (§6). `id` is the SHA-256 of the canonical serialization;
/// `sig` is a 64-byte Schnorr signature over `id` (§4.C).
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Event {
    pub id: [u8; 32],
    pub pubkey: Point,
    pub created_at: u64,
    pub kind: u16,
    pub tags: Vec<Vec<String>>,
    pub content: String,
    pub sig: [u8; 64],
}

impl Event {
    /// The canonical NIP-01-style preimage: `[0, pubkey, created_at, kind, tags, content]`.
    fn preimage(&self) -> Vec<u8> {
        let value = serde_json::json!([
            0,
            hex::encode(point_compress(&self.pubkey)),
            self.created_at,
            self.kind,
            self.tags,
            self.content,
        ]);
        serde_json::to_vec(&value).expect("canonical event preimage always serializes")
    }

    pub fn compute_id(&self) -> [u8; 32] {
        let digest = Sha256::digest(self.preimage());
        let mut id = [0u8; 32];
        id.copy_from_slice(&digest);
        id
    }

    /// Checks `id == SHA256(preimage)` and that `sig` verifies over `id`
    /// under `pubkey` (§4.E step 1 "Signature verify; fail-fast").
    pub fn verify(&self) -> CoreResult<()> {
        if self.compute_id() != self.id {
            return Err(CoreError::invalid("event id does not match its content"));
        }
        sign::verify(&GroupKey(self.pubkey), &self.id, &self.sig)
            .map_err(|_| CoreError::invalid("bad signature"))
    }

    /// The first value of the first tag named `name`, e.g. `tag_value("h")`
    /// for the group id.
    pub fn tag_value(&self, name: &str) -> Option<&str> {
        self.tags
            .iter()
            .find(|t| t.first().map(String::as_str) == Some(name))
            .and_then(|t| t.get(1))
            .map(String::as_str)
    }

    pub fn has_tag(&self, name: &str, value: &str) -> bool {
        self.tags
            .iter()
            .any(|t| t.first().map(String::as_str) == Some(name) && t.get(1).map(String::as_str) == Some(value))
    }

    pub fn group_id(&self) -> Option<&str> {
        self.tag_value("h")
    }
}

#[derive(Serialize, Deserialize)]
struct EventWire {
    id: String,
    pubkey: String,
    created_at: u64,
    kind: u16,
    tags: Vec<Vec<String>>,
    content: String,
    sig: String,
}

impl Serialize for Event {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        EventWire {
            id: hex::encode(self.id),
            pubkey: hex::encode(point_compress(&self.pubkey)),
            created_at: self.created_at,
            kind: self.kind,
            tags: self.tags.clone(),
            content: self.content.clone(),
            sig: hex::encode(self.sig),
        }
        .serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Event {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let wire = EventWire::deserialize(deserializer)?;

        let id_bytes = hex::decode(&wire.id).map_err(D::Error::custom)?;
        let id: [u8; 32] = id_bytes
            .try_into()
            .map_err(|_| D::Error::custom("event id must be 32 bytes"))?;

        let pubkey_bytes = hex::decode(&wire.pubkey).map_err(D::Error::custom)?;
        let pubkey = point_decompress(&pubkey_bytes).map_err(D::Error::custom)?;

        let sig_bytes = hex::decode(&wire.sig).map_err(D::Error::custom)?;
        let sig: [u8; 64] = sig_bytes
            .try_into()
            .map_err(|_| D::Error::custom("event sig must be 64 bytes"))?;

        Ok(Event {
            id,
            pubkey,
            created_at: wire.created_at,
            kind: wire.kind,
            tags: wire.tags,
            content: wire.content,
            sig,
        })
    }
}

/// A subscription filter (§6 "Filter fields"). All fields are conjunctive;
/// within a field, membership is disjunctive (matches any listed value).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Filter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ids: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kinds: Option<Vec<u16>>,
    #[serde(rename = "#e", skip_serializing_if = "Option::is_none")]
    pub e: Option<Vec<String>>,
    #[serde(rename = "#p", skip_serializing_if = "Option::is_none")]
    pub p: Option<Vec<String>>,
    #[serde(rename = "#h", skip_serializing_if = "Option::is_none")]
    pub h: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub since: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub until: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl Filter {
    pub fn matches(&self, event: &Event) -> bool {
        let id_hex = hex::encode(event.id);
        let author_hex = hex::encode(point_compress(&event.pubkey));

        if let Some(ids) = &self.ids {
            if !ids.iter().any(|prefix| id_hex.starts_with(prefix)) {
                return false;
            }
        }
        if let Some(authors) = &self.authors {
            if !authors.iter().any(|prefix| author_hex.starts_with(prefix)) {
                return false;
            }
        }
        if let Some(kinds) = &self.kinds {
            if !kinds.contains(&event.kind) {
                return false;
            }
        }
        if let Some(since) = self.since {
            if event.created_at < since {
                return false;
            }
        }
        if let Some(until) = self.until {
            if event.created_at > until {
                return false;
            }
        }
        if let Some(values) = &self.e {
            if !values.iter().any(|v| event.has_tag("e", v)) {
                return false;
            }
        }
        if let Some(values) = &self.p {
            if !values.iter().any(|v| event.has_tag("p", v)) {
                return false;
            }
        }
        if let Some(values) = &self.h {
            if !values.iter().any(|v| event.has_tag("h", v)) {
                return false;
            }
        }
        true
    }
}
