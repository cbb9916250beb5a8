//! Infrastructure shared by the protocol layers: byte streams, the variant
//! codec and the interrupt-safe frame queues.
pub mod codec;
pub mod frame_queue;
