//! Queue-backed PGN transmission: builds the single frame or the Fast Packet
//! sequence for a payload and queues it for the CAN driver.
//!
//! Sends are all-or-nothing. When the transmit queue cannot take every frame
//! of a message nothing is queued and the caller retries on a later tick.
use crate::error::{FastPacketError, StackError};
use crate::infra::frame_queue::FrameSink;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::{CanId, IdFields};
use crate::protocol::transport::fast_packet::builder::FastPacketBuilder;

/// Sender owning the rolling Fast Packet session id of one stack instance.
#[derive(Debug, Default)]
pub struct PgnSender {
    sequence_id: u8,
}

impl PgnSender {
    pub const fn new() -> Self {
        Self { sequence_id: 0 }
    }

    /// Session id the next Fast Packet message will use.
    pub fn sequence_id(&self) -> u8 {
        self.sequence_id
    }

    /// Queue `payload` under `header`.
    ///
    /// `fast_packet` selects Fast Packet framing; otherwise the payload must
    /// fit a single frame.
    pub fn send<T: FrameSink>(
        &mut self,
        tx: &T,
        header: &IdFields,
        fast_packet: bool,
        payload: &[u8],
    ) -> Result<(), StackError> {
        if !fast_packet {
            let id = CanId::from_fields(header)?;
            let frame = CanFrame::new(id, payload).ok_or(FastPacketError::PayloadTooLarge {
                len: payload.len(),
            })?;
            tx.try_push(frame)?;
            return Ok(());
        }

        let builder = FastPacketBuilder::new(header.pgn, header.source, header.destination, payload)
            .with_priority(header.priority)
            .with_sequence_id(self.sequence_id);
        if builder.frame_count() > tx.free_capacity() {
            #[cfg(feature = "defmt")]
            defmt::debug!(
                "tx busy: pgn={} needs {} frames, {} free",
                header.pgn,
                builder.frame_count(),
                tx.free_capacity()
            );
            return Err(StackError::TransmitBusy);
        }
        for frame in builder.build()? {
            tx.try_push(frame)?;
        }
        self.sequence_id = (self.sequence_id + 1) & 0x07;
        Ok(())
    }
}
