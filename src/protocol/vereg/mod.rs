//! VE.Reg register protocol carried in proprietary parameter groups.
//!
//! # Payload layout (little endian)
//!
//! ```text
//! Bytes 0-1 : vendor tag (0x9966: manufacturer 358, marine industry group)
//! Bytes 2-3 : register id
//! Bytes 4-  : value, encoded by the variant codec with the register's tag
//! ```
//!
//! Two register ids are reserved for commands:
//! - [`REG_REQUEST`] asks the peer for a register; value is the `Un16` id.
//! - [`REG_ACK`] acknowledges a command; value is `Un16` id then `Un16` code.
//!
//! Any other id carries a value: a write command, or the answer to one of
//! our requests.
use crate::core::{ByteOrder, PayloadBytes, Variant, MAX_PAYLOAD_BYTES};
use crate::error::{CodecError, VeRegError};
use crate::infra::codec::stream::{ByteReader, ByteWriter};
use crate::infra::codec::traits::FromPayload;
use crate::infra::codec::variant;

pub mod engine;
pub mod register;

/// Vendor tag opening every VE.Reg payload.
pub const VENDOR_TAG: u16 = 0x9966;
/// Proprietary A, single frame (data page 0).
pub const PGN_SINGLE_FRAME: u32 = 0xEF00;
/// Proprietary A2, Fast Packet (data page 1).
pub const PGN_FAST_PACKET: u32 = 0x1_EF00;
/// Register id of a read request.
pub const REG_REQUEST: u16 = 0x0200;
/// Register id of an acknowledgement.
pub const REG_ACK: u16 = 0x0201;
/// Vendor tag and register id.
pub const HEADER_LEN: usize = 4;
/// VE.Reg messages travel little endian.
pub const WIRE_ORDER: ByteOrder = ByteOrder::Little;

/// Payload capacity for a data page: one frame on page 0, a Fast Packet on page 1.
pub const fn capacity_for_page(data_page: u8) -> usize {
    if data_page == 0 {
        8
    } else {
        MAX_PAYLOAD_BYTES
    }
}

/// Transport parameter group for a data page.
pub const fn pgn_for_page(data_page: u8) -> u32 {
    if data_page == 0 {
        PGN_SINGLE_FRAME
    } else {
        PGN_FAST_PACKET
    }
}

//==================================================================================ACK_CODE
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u16)]
/// Result of a register command, returned to the requesting peer.
pub enum AckCode {
    Ok = 0,
    UnknownRegister = 1,
    AccessDenied = 2,
    InvalidData = 3,
    OutOfRange = 4,
    /// Processing, retry later.
    Busy = 5,
}

impl TryFrom<u16> for AckCode {
    type Error = VeRegError;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Ok(match code {
            0 => AckCode::Ok,
            1 => AckCode::UnknownRegister,
            2 => AckCode::AccessDenied,
            3 => AckCode::InvalidData,
            4 => AckCode::OutOfRange,
            5 => AckCode::Busy,
            code => return Err(VeRegError::UnknownAck { code }),
        })
    }
}

//==================================================================================VEREG_MESSAGE
/// Parsed or to-be-sent VE.Reg payload: register id and undecoded value bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VeRegMessage {
    pub register: u16,
    pub body: PayloadBytes,
}

/// Meaning of a message, depending on its register id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VeRegCommand<'a> {
    Request { register: u16 },
    Ack { register: u16, code: AckCode },
    Value { register: u16, body: &'a [u8] },
}

impl VeRegMessage {
    /// Classify the message and decode command arguments.
    pub fn command(&self) -> Result<VeRegCommand<'_>, VeRegError> {
        let mut reader = ByteReader::new(self.body.as_slice(), WIRE_ORDER);
        match self.register {
            REG_REQUEST => Ok(VeRegCommand::Request {
                register: reader.read_u16().map_err(CodecError::from)?,
            }),
            REG_ACK => {
                let register = reader.read_u16().map_err(CodecError::from)?;
                let code = reader.read_u16().map_err(CodecError::from)?;
                Ok(VeRegCommand::Ack {
                    register,
                    code: AckCode::try_from(code)?,
                })
            }
            register => Ok(VeRegCommand::Value {
                register,
                body: self.body.as_slice(),
            }),
        }
    }
}

impl FromPayload for VeRegMessage {
    type Error = VeRegError;

    fn from_payload(bytes_slice: &[u8]) -> Result<Self, Self::Error> {
        if bytes_slice.len() < HEADER_LEN {
            return Err(VeRegError::TooShort {
                len: bytes_slice.len(),
            });
        }
        let mut reader = ByteReader::new(bytes_slice, WIRE_ORDER);
        let tag = reader.read_u16().map_err(CodecError::from)?;
        if tag != VENDOR_TAG {
            return Err(VeRegError::ForeignTag { tag });
        }
        let register = reader.read_u16().map_err(CodecError::from)?;
        let body = PayloadBytes::from_slice(reader.rest())
            .ok_or(CodecError::BufferTooLong { len: bytes_slice.len() })?;
        Ok(Self { register, body })
    }
}

//==================================================================================OUTGOING_MESSAGE
/// Message under construction, bound to a target and a data page.
///
/// Obtained from [`engine::VeRegEngine::prepare_request`]; values are
/// appended with [`push`](Self::push) and the whole is handed back to the
/// engine for transmission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutgoingMessage {
    target: u8,
    data_page: u8,
    len: usize,
    buffer: [u8; MAX_PAYLOAD_BYTES],
}

impl OutgoingMessage {
    pub(crate) fn new(target: u8, data_page: u8, register: u16) -> Self {
        let mut buffer = [0u8; MAX_PAYLOAD_BYTES];
        buffer[0..2].copy_from_slice(&VENDOR_TAG.to_le_bytes());
        buffer[2..4].copy_from_slice(&register.to_le_bytes());
        Self {
            target,
            data_page: data_page & 0x01,
            len: HEADER_LEN,
            buffer,
        }
    }

    /// Destination address.
    pub fn target(&self) -> u8 {
        self.target
    }

    /// Data page selecting single frame (0) or Fast Packet (1) transport.
    pub fn data_page(&self) -> u8 {
        self.data_page
    }

    /// Register id written after the vendor tag.
    pub fn register(&self) -> u16 {
        u16::from_le_bytes([self.buffer[2], self.buffer[3]])
    }

    /// Bytes still available for values.
    pub fn remaining(&self) -> usize {
        capacity_for_page(self.data_page) - self.len
    }

    /// Append a value; nothing is written when it does not fit.
    pub fn push(&mut self, value: &Variant) -> Result<(), CodecError> {
        let end = capacity_for_page(self.data_page);
        let mut writer = ByteWriter::resume(&mut self.buffer[..end], self.len, WIRE_ORDER);
        variant::encode(value, &mut writer)?;
        self.len = writer.position();
        Ok(())
    }

    /// Complete payload, header included.
    pub fn payload(&self) -> &[u8] {
        &self.buffer[..self.len]
    }
}
