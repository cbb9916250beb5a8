//! NMEA 2000 Fast Packet support: encapsulates payloads larger than eight bytes
//! across successive CAN frames.
//!
//! Frame 0 carries `[counter, total_len, 6 data bytes]`, later frames carry
//! `[counter, 7 data bytes]`. The counter byte holds the 3-bit session id in
//! its high bits and the 5-bit frame index in its low bits.
use embassy_time::Duration;

/// Maximum payload a Fast Packet can transport once reassembled.
pub const MAX_FAST_PACKET_PAYLOAD: usize = crate::core::MAX_PAYLOAD_BYTES;

/// Payload bytes carried by the first frame of a session.
pub const FIRST_FRAME_DATA: usize = 6;
/// Payload bytes carried by every following frame.
pub const NEXT_FRAME_DATA: usize = 7;

/// Default window in which a session must complete.
pub const DEFAULT_REASSEMBLY_TIMEOUT: Duration = Duration::from_millis(750);

/// Number of CAN frames needed to carry `len` payload bytes.
pub const fn frame_count(len: usize) -> usize {
    if len <= FIRST_FRAME_DATA {
        1
    } else {
        1 + (len - FIRST_FRAME_DATA).div_ceil(NEXT_FRAME_DATA)
    }
}

/// Splits a counter byte into `(session id, frame index)`.
#[inline]
pub(crate) fn split_counter(counter: u8) -> (u8, u8) {
    ((counter >> 5) & 0x07, counter & 0x1F)
}

pub mod assembler;
pub mod builder;
