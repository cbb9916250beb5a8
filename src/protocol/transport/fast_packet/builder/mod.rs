//! CAN frame generator for Fast Packet messages. Builds the frame sequence
//! for an application payload, one frame at a time.
use crate::error::FastPacketError;
use crate::protocol::transport::can_frame::CanFrame;
use crate::protocol::transport::can_id::CanId;
use crate::protocol::transport::fast_packet::{
    frame_count, FIRST_FRAME_DATA, MAX_FAST_PACKET_PAYLOAD, NEXT_FRAME_DATA,
};

#[derive(Debug)]
/// Shared parameters for all frames composing a Fast Packet message.
pub struct FastPacketBuilder<'a> {
    pgn: u32,
    priority: u8,
    source_address: u8,
    destination: Option<u8>,
    payload: &'a [u8],
    sequence_id: u8,
}

/// Lazy iterator returning frames one by one as they are encoded.
#[derive(Debug)]
pub struct FrameIterator<'a> {
    id: CanId,
    payload: &'a [u8],
    sequence_id: u8,
    frame_index: u8,
    bytes_sent: usize,
}

impl<'a> FrameIterator<'a> {
    /// Frames still to be produced.
    pub fn remaining_frames(&self) -> usize {
        if self.bytes_sent >= self.payload.len() {
            0
        } else if self.bytes_sent == 0 {
            frame_count(self.payload.len())
        } else {
            (self.payload.len() - self.bytes_sent).div_ceil(NEXT_FRAME_DATA)
        }
    }
}

impl<'a> Iterator for FrameIterator<'a> {
    type Item = CanFrame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.bytes_sent >= self.payload.len() {
            return None;
        }

        let header = ((self.sequence_id & 0x07) << 5) | (self.frame_index & 0x1F);
        let mut data = [0xFF; 8];
        // Byte 0: session id and frame index.
        data[0] = header;

        let len = if self.bytes_sent == 0 {
            // Byte 1: total useful payload length, then six data bytes.
            data[1] = self.payload.len() as u8;
            let bytes_to_copy = FIRST_FRAME_DATA.min(self.payload.len());
            data[2..2 + bytes_to_copy].copy_from_slice(&self.payload[..bytes_to_copy]);
            self.bytes_sent += bytes_to_copy;
            2 + bytes_to_copy
        } else {
            let remaining_bytes = self.payload.len() - self.bytes_sent;
            let bytes_to_copy = NEXT_FRAME_DATA.min(remaining_bytes);
            data[1..1 + bytes_to_copy]
                .copy_from_slice(&self.payload[self.bytes_sent..self.bytes_sent + bytes_to_copy]);
            self.bytes_sent += bytes_to_copy;
            1 + bytes_to_copy
        };

        self.frame_index = self.frame_index.wrapping_add(1);

        Some(CanFrame {
            id: self.id,
            data,
            len,
        })
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.remaining_frames();
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for FrameIterator<'_> {}

impl<'a> FastPacketBuilder<'a> {
    /// Create a Fast Packet encoder for `payload`.
    ///
    /// The session id starts at 0; senders keep their own rolling counter and
    /// pass it through [`with_sequence_id`](Self::with_sequence_id).
    pub fn new(pgn: u32, source_address: u8, destination: Option<u8>, payload: &'a [u8]) -> Self {
        Self {
            pgn,
            priority: 6,
            source_address,
            destination,
            payload,
            sequence_id: 0,
        }
    }

    /// Override the 3-bit Fast Packet sequence identifier.
    pub fn with_sequence_id(mut self, sequence_id: u8) -> Self {
        self.sequence_id = sequence_id & 0x07;
        self
    }

    /// Sets the CAN priority used by every frame.
    pub fn with_priority(mut self, priority: u8) -> Self {
        self.priority = priority & 0x07;
        self
    }

    /// Number of frames the payload will occupy.
    pub fn frame_count(&self) -> usize {
        frame_count(self.payload.len())
    }

    /// Validate the payload and identifier, then start the iteration; each
    /// call to `next` yields the next frame.
    pub fn build(self) -> Result<FrameIterator<'a>, FastPacketError> {
        if self.payload.is_empty() {
            return Err(FastPacketError::EmptyPayload);
        }
        if self.payload.len() > MAX_FAST_PACKET_PAYLOAD {
            return Err(FastPacketError::PayloadTooLarge {
                len: self.payload.len(),
            });
        }

        let mut id_builder =
            CanId::builder(self.pgn, self.source_address).with_priority(self.priority);
        if let Some(destination) = self.destination {
            id_builder = id_builder.to_destination(destination);
        }
        let id = id_builder.build()?;

        Ok(FrameIterator {
            id,
            payload: self.payload,
            sequence_id: self.sequence_id,
            frame_index: 0,
            bytes_sent: 0,
        })
    }
}
