//! Transport layer: CAN frame representations, 29-bit identifier management,
//! Fast Packet encoding, queued PGN transmission and the async bus bridge.
//!
//! The stack itself only fills and drains [`FrameQueue`](crate::infra::frame_queue::FrameQueue)s.
//! Timing on the wire is the bridge's and the driver's business; the constants
//! below are what they should honour.

pub mod bridge;
pub mod can_frame;
pub mod can_id;
pub mod fast_packet;
pub mod pgn_sender;
pub mod traits;

/// Gap inserted by [`CanBridge`](bridge::CanBridge) between consecutive
/// transmissions (ms).
///
/// Fast Packet frames may legally go out back to back, but controllers with a
/// shallow TX mailbox (three frames on an ESP32 TWAI) and slow receivers drop
/// frames when they do. 1 ms is the floor; raise it for constrained peers.
pub const FAST_PACKET_INTER_FRAME_DELAY_MS: u32 = 2;

/// Upper bound a [`CanBus`](traits::can_bus::CanBus) driver should put on a
/// single `send()` (ms).
///
/// One 8-byte frame takes about 0.5 ms at 250 kbit/s; arbitration losses and
/// retransmissions push that to 10-20 ms. Past this bound the bus is treated as
/// faulty and the driver returns its error, which stops
/// [`CanBridge::run`](bridge::CanBridge::run).
///
/// ```rust,ignore
/// use embassy_time::{with_timeout, Duration};
/// use n2k_vereg::protocol::transport::CAN_SEND_TIMEOUT_MS;
///
/// async fn send(&mut self, frame: &CanFrame) -> Result<(), Self::Error> {
///     with_timeout(
///         Duration::from_millis(CAN_SEND_TIMEOUT_MS as u64),
///         self.driver.transmit(&to_hal_frame(frame)),
///     )
///     .await
///     .map_err(|_| BusError::Timeout)?
/// }
/// ```
pub const CAN_SEND_TIMEOUT_MS: u32 = 100;
