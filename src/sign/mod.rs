//! Component C — the threshold signing engine (§4.C).

pub mod precomputation;
pub mod session;

#[cfg(feature = "insecure-single-party")]
pub mod simple;

pub use session::{verify, SigningSession};
