//! Component E — the relay authorization core (§4.E, §6).

pub mod config;
pub mod core;
pub mod group;
pub mod moderation;

pub use config::RelayConfig;
pub use core::AuthorizationCore;
pub use group::GroupState;
