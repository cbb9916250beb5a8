//! VE.Reg protocol engine: builds requests, answers incoming commands through
//! the application's [`RegisterHandler`] and tracks our pending reads.
//!
//! Every accepted command gets an answer. Answers that find the transmit queue
//! full are parked and retried on tick, oldest first; the ones that cannot
//! even be parked are counted in [`VeRegEngine::dropped_responses`].
use crate::core::{Variant, VariantTag};
use crate::error::{CodecError, StackError, VeRegError};
use crate::infra::codec::stream::ByteReader;
use crate::infra::codec::traits::FromPayload;
use crate::infra::codec::variant;
use crate::infra::frame_queue::FrameSink;
use crate::protocol::transport::can_id::IdFields;
use crate::protocol::transport::pgn_sender::PgnSender;
use crate::protocol::vereg::register::{
    lookup, CommandKind, RegisterCommand, RegisterDescriptor, RegisterHandler,
};
use crate::protocol::vereg::{
    capacity_for_page, pgn_for_page, AckCode, OutgoingMessage, VeRegCommand, VeRegMessage,
    HEADER_LEN, REG_ACK, REG_REQUEST, WIRE_ORDER,
};

/// Answers waiting for room in the transmit queue.
pub const DEFERRED_RESPONSES: usize = 4;
/// Reads we may have in flight at once.
pub const OUTSTANDING_READS: usize = 8;
/// Priority of VE.Reg traffic.
pub const VEREG_PRIORITY: u8 = 6;

//==================================================================================EVENTS
/// Something the application should hear about after an incoming message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegisterEvent {
    /// Value of a register we asked `source` for.
    Value {
        source: u8,
        register: u16,
        value: Variant,
    },
    /// `source` acknowledged one of our commands.
    Ack {
        source: u8,
        register: u16,
        ack: AckCode,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct PendingRead {
    target: u8,
    register: u16,
}

//==================================================================================ENGINE
/// Per-instance VE.Reg state.
#[derive(Debug)]
pub struct VeRegEngine {
    registers: &'static [RegisterDescriptor],
    /// Parked answers, packed at the front in arrival order.
    deferred: [Option<OutgoingMessage>; DEFERRED_RESPONSES],
    outstanding: [Option<PendingRead>; OUTSTANDING_READS],
    dropped: u32,
}

impl VeRegEngine {
    /// Engine answering for the registers of `registers`.
    pub const fn new(registers: &'static [RegisterDescriptor]) -> Self {
        Self {
            registers,
            deferred: [None; DEFERRED_RESPONSES],
            outstanding: [None; OUTSTANDING_READS],
            dropped: 0,
        }
    }

    /// Register table in use.
    pub fn registers(&self) -> &'static [RegisterDescriptor] {
        self.registers
    }

    /// Answers still waiting for the transmit queue.
    pub fn deferred_len(&self) -> usize {
        self.deferred.iter().flatten().count()
    }

    /// Answers given up on: deferred list full, or discarded by [`reset`](Self::reset).
    pub fn dropped_responses(&self) -> u32 {
        self.dropped
    }

    /// Checks whether a read of `register` from `target` is awaiting its value.
    pub fn is_outstanding(&self, target: u8, register: u16) -> bool {
        self.outstanding
            .iter()
            .flatten()
            .any(|p| p.target == target && p.register == register)
    }

    //==================================================================================OUTGOING
    /// Open a message to `target` for `register`.
    ///
    /// Returns `None` while we have no address or the transmit queue is full;
    /// the caller retries later.
    pub fn prepare_request<T: FrameSink>(
        &self,
        tx: &T,
        source: Option<u8>,
        target: u8,
        data_page: u8,
        register: u16,
    ) -> Option<OutgoingMessage> {
        source?;
        if tx.free_capacity() == 0 {
            return None;
        }
        Some(OutgoingMessage::new(target, data_page, register))
    }

    /// Queue a prepared message, every frame or none.
    pub fn send<T: FrameSink>(
        &mut self,
        tx: &T,
        sender: &mut PgnSender,
        source: u8,
        message: &OutgoingMessage,
    ) -> Result<(), StackError> {
        let header = IdFields {
            priority: VEREG_PRIORITY,
            pgn: pgn_for_page(message.data_page()),
            source,
            destination: Some(message.target()),
        };
        sender.send(tx, &header, message.data_page() == 1, message.payload())
    }

    /// Write `value` into `register` of `target`.
    ///
    /// Values fitting a single frame use data page 0, larger ones a Fast Packet.
    pub fn send_register<T: FrameSink>(
        &mut self,
        tx: &T,
        sender: &mut PgnSender,
        source: Option<u8>,
        target: u8,
        register: u16,
        value: &Variant,
    ) -> Result<(), VeRegError> {
        let data_page = if HEADER_LEN + value.width() <= capacity_for_page(0) {
            0
        } else {
            1
        };
        let address = source.ok_or(StackError::NoAddress)?;
        let mut message = self
            .prepare_request(tx, source, target, data_page, register)
            .ok_or(StackError::TransmitBusy)?;
        message.push(value)?;
        self.send(tx, sender, address, &message)?;
        Ok(())
    }

    /// Ask `target` for the value of `register`.
    pub fn request_register<T: FrameSink>(
        &mut self,
        tx: &T,
        sender: &mut PgnSender,
        source: Option<u8>,
        target: u8,
        register: u16,
    ) -> Result<(), VeRegError> {
        self.send_register(tx, sender, source, target, REG_REQUEST, &Variant::Un16(register))?;
        self.track(PendingRead { target, register });
        Ok(())
    }

    /// Retry parked answers, oldest first, stopping at the first one that
    /// still does not fit.
    pub fn tick<T: FrameSink>(&mut self, tx: &T, sender: &mut PgnSender, source: Option<u8>) {
        let Some(address) = source else {
            return;
        };
        while let Some(message) = self.deferred[0] {
            if self.send(tx, sender, address, &message).is_err() {
                break;
            }
            self.deferred.rotate_left(1);
            self.deferred[DEFERRED_RESPONSES - 1] = None;
        }
    }

    /// Forget parked answers and pending reads (address lost).
    pub fn reset(&mut self) {
        self.dropped = self.dropped.wrapping_add(self.deferred_len() as u32);
        self.deferred = [None; DEFERRED_RESPONSES];
        self.outstanding = [None; OUTSTANDING_READS];
    }

    //==================================================================================INCOMING
    /// Interpret a VE.Reg payload received from `from`.
    ///
    /// Foreign vendor tags and malformed messages are ignored. Commands are
    /// answered (value or acknowledgement) from `source`; answers to our own
    /// requests come back as events.
    pub fn handle_incoming<T: FrameSink, H: RegisterHandler>(
        &mut self,
        tx: &T,
        sender: &mut PgnSender,
        source: u8,
        from: u8,
        payload: &[u8],
        handler: &mut H,
    ) -> Option<RegisterEvent> {
        let message = match VeRegMessage::from_payload(payload) {
            Ok(message) => message,
            Err(_err) => {
                #[cfg(feature = "defmt")]
                defmt::trace!("ignoring payload from {}: {}", from, defmt::Debug2Format(&_err));
                return None;
            }
        };

        match message.command() {
            Ok(VeRegCommand::Request { register }) => {
                self.answer_read(tx, sender, source, from, register, handler);
                None
            }
            Ok(VeRegCommand::Ack { register, code }) => {
                self.untrack(from, register);
                Some(RegisterEvent::Ack {
                    source: from,
                    register,
                    ack: code,
                })
            }
            Ok(VeRegCommand::Value { register, body }) if self.is_outstanding(from, register) => {
                self.untrack(from, register);
                let value = match lookup(self.registers, register) {
                    Some(descriptor) => decode_exact(descriptor.tag, body).ok()?,
                    None => Variant::bytes(body).ok()?,
                };
                Some(RegisterEvent::Value {
                    source: from,
                    register,
                    value,
                })
            }
            Ok(VeRegCommand::Value { register, body }) => {
                self.answer_write(tx, sender, source, from, register, body, handler);
                None
            }
            Err(_err) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("malformed command from {}: {}", from, defmt::Debug2Format(&_err));
                None
            }
        }
    }

    fn answer_read<T: FrameSink, H: RegisterHandler>(
        &mut self,
        tx: &T,
        sender: &mut PgnSender,
        source: u8,
        from: u8,
        register: u16,
        handler: &mut H,
    ) {
        let Some(descriptor) = lookup(self.registers, register) else {
            return self.respond_ack(tx, sender, source, from, register, AckCode::UnknownRegister);
        };
        if !descriptor.readable() {
            return self.respond_ack(tx, sender, source, from, register, AckCode::AccessDenied);
        }

        let reply = handler.handle_register(RegisterCommand {
            kind: CommandKind::Read,
            source: from,
            register: descriptor,
            value: Variant::None,
        });
        if reply.ack != AckCode::Ok {
            return self.respond_ack(tx, sender, source, from, register, reply.ack);
        }
        let Ok(value) = reply.value.retag(descriptor.tag) else {
            return self.respond_ack(tx, sender, source, from, register, AckCode::InvalidData);
        };

        let data_page = if HEADER_LEN + value.width() <= capacity_for_page(0) {
            0
        } else {
            1
        };
        let mut message = OutgoingMessage::new(from, data_page, register);
        if message.push(&value).is_err() {
            return self.respond_ack(tx, sender, source, from, register, AckCode::InvalidData);
        }
        self.respond(tx, sender, source, message);
    }

    #[allow(clippy::too_many_arguments)]
    fn answer_write<T: FrameSink, H: RegisterHandler>(
        &mut self,
        tx: &T,
        sender: &mut PgnSender,
        source: u8,
        from: u8,
        register: u16,
        body: &[u8],
        handler: &mut H,
    ) {
        let Some(descriptor) = lookup(self.registers, register) else {
            return self.respond_ack(tx, sender, source, from, register, AckCode::UnknownRegister);
        };
        if !descriptor.writable() {
            return self.respond_ack(tx, sender, source, from, register, AckCode::AccessDenied);
        }
        let Ok(value) = decode_exact(descriptor.tag, body) else {
            return self.respond_ack(tx, sender, source, from, register, AckCode::InvalidData);
        };

        let reply = handler.handle_register(RegisterCommand {
            kind: CommandKind::Write,
            source: from,
            register: descriptor,
            value,
        });
        self.respond_ack(tx, sender, source, from, register, reply.ack);
    }

    fn respond_ack<T: FrameSink>(
        &mut self,
        tx: &T,
        sender: &mut PgnSender,
        source: u8,
        to: u8,
        register: u16,
        ack: AckCode,
    ) {
        let mut message = OutgoingMessage::new(to, 0, REG_ACK);
        // Two Un16 after the header fill a single frame exactly.
        let pushed = message
            .push(&Variant::Un16(register))
            .and_then(|_| message.push(&Variant::Un16(ack as u16)));
        if pushed.is_ok() {
            self.respond(tx, sender, source, message);
        }
    }

    fn respond<T: FrameSink>(
        &mut self,
        tx: &T,
        sender: &mut PgnSender,
        source: u8,
        message: OutgoingMessage,
    ) {
        // Keep answers in order behind earlier parked ones.
        if self.deferred_len() == 0 && self.send(tx, sender, source, &message).is_ok() {
            return;
        }
        match self.deferred.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => {
                #[cfg(feature = "defmt")]
                defmt::debug!("answer for register {} deferred", message.register());
                *slot = Some(message);
            }
            None => {
                #[cfg(feature = "defmt")]
                defmt::warn!("answer for register {} dropped", message.register());
                self.dropped = self.dropped.wrapping_add(1);
            }
        }
    }

    fn track(&mut self, read: PendingRead) {
        if self.is_outstanding(read.target, read.register) {
            return;
        }
        // The oldest read is overwritten when every slot is in use.
        match self.outstanding.iter_mut().find(|slot| slot.is_none()) {
            Some(slot) => *slot = Some(read),
            None => {
                self.outstanding.rotate_left(1);
                self.outstanding[OUTSTANDING_READS - 1] = Some(read);
            }
        }
    }

    fn untrack(&mut self, target: u8, register: u16) {
        for slot in self.outstanding.iter_mut() {
            if slot.is_some_and(|p| p.target == target && p.register == register) {
                *slot = None;
            }
        }
    }
}

/// Decode a value that must fill `body` exactly.
fn decode_exact(tag: VariantTag, body: &[u8]) -> Result<Variant, VeRegError> {
    let mut reader = ByteReader::new(body, WIRE_ORDER);
    let value = variant::decode(tag, &mut reader)?;
    if reader.remaining() != 0 {
        return Err(CodecError::BufferTooLong { len: body.len() }.into());
    }
    Ok(value)
}
