//! Session protocol: wire records, marshalling and the config handshake.

pub mod coordinator;
pub mod marshal;
pub mod wire;

pub use coordinator::{ConfigCoordinator, ConfigStatus, Request};
pub use wire::{STATUS_RESUBMIT, STATUS_UNKNOWN, WireConfig, WirePlan, WireState};
