//! `n2k-vereg` library: a `no_std` CAN stack combining J1939 addressing,
//! NMEA 2000 Fast Packet transport and the VE.Reg register protocol.
//! The crate exposes the infrastructure modules (variant codec, frame queues),
//! protocol logic (identifiers, reassembly, address management, device
//! registry, register engine) and the stack instances tying them together.
#![no_std]
//==================================================================================
/// Core data types shared by the codec and the protocol layers.
pub mod core;
/// Domain and low-level errors (identifier construction, codec, reassembly,
/// registry, register protocol).
pub mod error;
/// Byte streams, the variant codec and interrupt-safe frame queues.
pub mod infra;
/// J1939 / NMEA 2000 protocol implementation: CAN transport, fast packets,
/// address management, device registry and VE.Reg.
pub mod protocol;
//==================================================================================
