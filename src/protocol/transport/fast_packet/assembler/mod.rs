//! NMEA 2000 Fast Packet assembler: rebuilds application messages by
//! aggregating the CAN frames of a multi-packet session.
//!
//! Sessions are keyed by `(source address, PGN)`. A session is discarded, never
//! partially delivered, when a frame arrives out of order or when it does not
//! complete before its deadline.
use embassy_time::{Duration, Instant};

use super::{split_counter, FIRST_FRAME_DATA, MAX_FAST_PACKET_PAYLOAD, NEXT_FRAME_DATA};
use crate::core::PayloadBytes;

//==================================================================================Enums and Structs
#[derive(Debug, PartialEq, Eq)]
pub enum ProcessResult {
    /// Frame not recognized as Fast Packet or discarded (invalid sequence,
    /// session pool exhausted, expired session, etc.).
    Ignored,
    /// Frame successfully integrated but additional fragments are still missing.
    FragmentConsumed,
    /// All expected fragments were received; the complete message is now available.
    MessageComplete(CompletedMessage),
}

/// Safe container returning a reassembled message without exposing
/// the assembler's internal buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompletedMessage {
    /// Sender of the message.
    pub source_address: u8,
    /// Parameter group the message belongs to.
    pub pgn: u32,
    /// Reassembled payload.
    pub payload: PayloadBytes,
}

/// Possible states for a reassembly session.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum SessionState {
    Inactive,
    InProgress,
}

/// Internal structure tracking the state of a Fast Packet session.
#[derive(Debug, Clone, Copy)]
struct FastPacketSession {
    state: SessionState,
    source_address: u8,
    pgn: u32,
    sequence_id: u8,
    buffer: [u8; MAX_FAST_PACKET_PAYLOAD],
    expected_size: usize,
    current_size: usize,
    last_frame_index: u8,
    deadline: Instant,
}

impl FastPacketSession {
    /// Create a session in the inactive state.
    const fn new() -> Self {
        Self {
            state: SessionState::Inactive,
            source_address: 0,
            pgn: 0,
            sequence_id: 0,
            buffer: [0; MAX_FAST_PACKET_PAYLOAD],
            expected_size: 0,
            current_size: 0,
            last_frame_index: 0,
            deadline: Instant::from_ticks(0),
        }
    }

    /// Reset the session and make it available again.
    fn reset(&mut self) {
        self.state = SessionState::Inactive;
        self.sequence_id = 0;
        self.expected_size = 0;
        self.current_size = 0;
        self.last_frame_index = 0;
        // No need to wipe the buffer; upcoming copies will overwrite it.
    }

    fn is_for(&self, source_address: u8, pgn: u32) -> bool {
        self.state == SessionState::InProgress
            && self.source_address == source_address
            && self.pgn == pgn
    }

    fn append(&mut self, bytes: &[u8]) {
        let end = self.current_size + bytes.len();
        self.buffer[self.current_size..end].copy_from_slice(bytes);
        self.current_size = end;
    }

    /// Hands out the payload once every byte is in, releasing the session.
    fn take_if_complete(&mut self) -> ProcessResult {
        if self.current_size < self.expected_size {
            return ProcessResult::FragmentConsumed;
        }
        let mut payload = PayloadBytes::new();
        payload.data[..self.expected_size].copy_from_slice(&self.buffer[..self.expected_size]);
        payload.len = self.expected_size;
        let message = CompletedMessage {
            source_address: self.source_address,
            pgn: self.pgn,
            payload,
        };
        self.reset();
        ProcessResult::MessageComplete(message)
    }
}

/// Main assembler: owns a fixed pool of reusable sessions.
#[derive(Debug, Copy, Clone)]
pub struct FastPacketAssembler<const SESSIONS: usize = 4> {
    sessions: [FastPacketSession; SESSIONS],
    timeout: Duration,
}

impl<const SESSIONS: usize> Default for FastPacketAssembler<SESSIONS> {
    fn default() -> Self {
        Self::new(super::DEFAULT_REASSEMBLY_TIMEOUT)
    }
}

impl<const SESSIONS: usize> FastPacketAssembler<SESSIONS> {
    /// Instantiate the assembler with an inactive session pool.
    pub const fn new(timeout: Duration) -> Self {
        Self {
            sessions: [FastPacketSession::new(); SESSIONS],
            timeout,
        }
    }

    /// Number of sessions currently collecting frames.
    pub fn active_sessions(&self) -> usize {
        self.sessions
            .iter()
            .filter(|s| s.state == SessionState::InProgress)
            .count()
    }

    //==================================================================================Process Functions
    /// Process a CAN frame that may belong to a Fast Packet session.
    ///
    /// * `source_address`, `pgn` – session key
    /// * `data` – payload of the received CAN frame
    /// * `now` – reception time, checked against the session deadline
    ///
    /// Returns a `ProcessResult` indicating whether the frame was ignored,
    /// consumed, or completed the message.
    pub fn process_frame(
        &mut self,
        source_address: u8,
        pgn: u32,
        data: &[u8],
        now: Instant,
    ) -> ProcessResult {
        let Some(&counter) = data.first() else {
            return ProcessResult::Ignored;
        };
        let (sequence_id, frame_index) = split_counter(counter);

        if frame_index == 0 {
            self.start_session(source_address, pgn, sequence_id, data, now)
        } else {
            self.continue_session(source_address, pgn, sequence_id, frame_index, data, now)
        }
    }

    /// Discard every session whose deadline has passed.
    ///
    /// Returns the number of sessions dropped.
    pub fn expire(&mut self, now: Instant) -> usize {
        let mut dropped = 0;
        for session in self
            .sessions
            .iter_mut()
            .filter(|s| s.state == SessionState::InProgress && now > s.deadline)
        {
            #[cfg(feature = "defmt")]
            defmt::debug!(
                "fast packet timeout: src={} pgn={}",
                session.source_address,
                session.pgn
            );
            session.reset();
            dropped += 1;
        }
        dropped
    }

    fn start_session(
        &mut self,
        source_address: u8,
        pgn: u32,
        sequence_id: u8,
        data: &[u8],
        now: Instant,
    ) -> ProcessResult {
        // A new first frame always supersedes a pending session for the same key.
        if let Some(pending) = self
            .sessions
            .iter_mut()
            .find(|s| s.is_for(source_address, pgn))
        {
            pending.reset();
        }

        let Some(&declared) = data.get(1) else {
            return ProcessResult::Ignored;
        };
        let expected_size = declared as usize;
        if !(1..=MAX_FAST_PACKET_PAYLOAD).contains(&expected_size) {
            return ProcessResult::Ignored;
        }
        let copy_len = expected_size.min(FIRST_FRAME_DATA);
        let Some(first_bytes) = data.get(2..2 + copy_len) else {
            return ProcessResult::Ignored;
        };

        let Some(session) = self
            .sessions
            .iter_mut()
            .find(|s| s.state == SessionState::Inactive)
        else {
            #[cfg(feature = "defmt")]
            defmt::warn!("fast packet pool exhausted: src={} pgn={}", source_address, pgn);
            return ProcessResult::Ignored;
        };

        session.state = SessionState::InProgress;
        session.source_address = source_address;
        session.pgn = pgn;
        session.sequence_id = sequence_id;
        session.expected_size = expected_size;
        session.current_size = 0;
        session.last_frame_index = 0;
        session.deadline = now.checked_add(self.timeout).unwrap_or(Instant::MAX);
        session.append(first_bytes);

        session.take_if_complete()
    }

    fn continue_session(
        &mut self,
        source_address: u8,
        pgn: u32,
        sequence_id: u8,
        frame_index: u8,
        data: &[u8],
        now: Instant,
    ) -> ProcessResult {
        let Some(session) = self
            .sessions
            .iter_mut()
            .find(|s| s.is_for(source_address, pgn))
        else {
            return ProcessResult::Ignored;
        };

        // The whole counter byte is the sequence: a foreign session id breaks it.
        if sequence_id != session.sequence_id {
            #[cfg(feature = "defmt")]
            defmt::debug!(
                "fast packet session mismatch: src={} pgn={} got={} expected={}",
                source_address,
                pgn,
                sequence_id,
                session.sequence_id
            );
            session.reset();
            return ProcessResult::Ignored;
        }

        if now > session.deadline {
            #[cfg(feature = "defmt")]
            defmt::debug!("fast packet late frame: src={} pgn={}", source_address, pgn);
            session.reset();
            return ProcessResult::Ignored;
        }

        if frame_index != session.last_frame_index.wrapping_add(1) {
            #[cfg(feature = "defmt")]
            defmt::debug!(
                "fast packet sequence error: src={} pgn={} got={} expected={}",
                source_address,
                pgn,
                frame_index,
                session.last_frame_index.wrapping_add(1)
            );
            session.reset();
            return ProcessResult::Ignored;
        }

        let copy_len = (session.expected_size - session.current_size).min(NEXT_FRAME_DATA);
        let Some(bytes) = data.get(1..1 + copy_len) else {
            // Truncated continuation frame.
            session.reset();
            return ProcessResult::Ignored;
        };

        session.last_frame_index = frame_index;
        session.append(bytes);
        session.take_if_complete()
    }
}

#[cfg(test)]
#[path = "tests.rs"]
mod tests;
