//! Abstraction traits used by the CAN bridge (bus driver and pacing timer).
pub mod bridge_timer;
pub mod can_bus;
