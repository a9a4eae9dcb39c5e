//! Adreward Engine - Click-out detection, token lifecycle, and claim coordination

pub mod cooldown;
pub mod detector;
pub mod readiness;
pub mod slot;

pub use cooldown::Cooldown;
pub use detector::{ClickOut, ClickOutDetector};
pub use readiness::{AdReadiness, ReadinessProbe};
pub use slot::{spawn_slot, SlotEvent, SlotHandle, SlotSnapshot};
