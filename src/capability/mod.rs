//! Component D — the capability model (§3 "Capability", §4.D).

pub mod authorize;
pub mod parse;
pub mod types;

pub use authorize::authorize;
pub use types::{Capability, CapabilityType, Qualifiers, RateLimitQuota};
