//! A threshold-shared root identity: Pedersen DKG and FROST-style Schnorr
//! signing over secp256k1, NIP-29-style capability delegation, and a relay
//! authorization core that admits events against both (§1 "Purpose and
//! scope").
//!
//! - [`dkg`] — Component B: distributed key generation.
//! - [`sign`] — Component C: threshold signing sessions.
//! - [`capability`] — Component D: capability grant/revoke/delegate model.
//! - [`relay`] — Component E: event admission and authorization.
//!
//! [`curve`], [`keys`], [`error`], and [`event`] underlie all four.

pub mod capability;
pub mod curve;
pub mod dkg;
pub mod error;
pub mod event;
pub mod keys;
pub mod relay;
pub mod sign;

pub use error::{CoreError, CoreResult};
pub use event::{Event, Filter};
pub use keys::{GroupKey, IndividualSigningKey, IndividualVerifyingKey, KeyPackage};
