//! Error definitions shared across library modules.
//! Each type models a specific failure scenario (CAN ID construction,
//! stream access, variant encoding, fast packet framing, device table, stack
//! configuration, register protocol).
use crate::core::VariantTag;
use thiserror_no_std::Error;

#[derive(Error, Debug, PartialEq, Eq)]
/// Errors that can occur while building a 29-bit CAN identifier.
pub enum CanIdBuildError {
    /// Provided parameters do not produce a valid identifier.
    #[error("Invalid data")]
    InvalidData,
    /// Attempt to build a broadcast message (PDU2) with PF < 240.
    #[error("Invalid for broadcast message: PF is too low")]
    InvalidForBroadcast,
    /// Attempt to send an addressed message (PDU1) with PF ≥ 240.
    #[error("Invalid for addressed message: PF is too high: {pgn}")]
    InvalidForFocusedMessage { pgn: u8 },
    /// In PDU1 the lower 8 bits of the PGN must remain zero.
    #[error("PDU1 PGNs require PS = 0")]
    PsFocusMessageMustBeNull,
    /// PGN does not fit the 18 bits available in the identifier.
    #[error("PGN {pgn:#X} exceeds 18 bits")]
    PgnOutOfRange { pgn: u32 },
}

#[derive(Error, Debug, PartialEq, Eq)]
/// Failures while extracting information from a raw CAN frame.
pub enum ExtractionError {
    /// The frame does not carry the expected PGN.
    #[error("Invalid incoming frame")]
    InvalidIncomingFrame,
    /// Payload length does not match the PGN layout.
    #[error("Invalid data length for PGN")]
    InvalidDataLen,
}

//==================================================================================STREAM_ERROR
#[derive(Error, Debug, PartialEq, Eq)]
/// Errors raised by the byte reader/writer.
pub enum StreamError {
    /// Attempted to read or write past the end of the buffer.
    #[error("Attempted to access out of bounds -> asked: {asked}, available: {available}")]
    OutOfBounds { asked: usize, available: usize },
}

//==================================================================================CODEC_ERROR
#[derive(Error, Debug, PartialEq, Eq)]
/// Failures of the variant codec.
pub enum CodecError {
    /// Not enough bytes left in the source, or not enough room in the target.
    #[error("Stream error: {0}")]
    Stream(#[from] StreamError),
    /// Buffer variants are limited to `MAX_VARIANT_BYTES`.
    #[error("Buffer of {len} bytes exceeds variant capacity")]
    BufferTooLong { len: usize },
    /// The value cannot be represented with the requested tag.
    #[error("Value does not fit {target:?}")]
    ValueOutOfRange { target: VariantTag },
    /// Conversion between the two tags is not defined.
    #[error("Cannot convert {from:?} into {to:?}")]
    TagMismatch { from: VariantTag, to: VariantTag },
}

//==================================================================================FAST_PACKET_ERROR
#[derive(Error, Debug, PartialEq, Eq)]
/// Errors raised while fragmenting an outgoing payload.
pub enum FastPacketError {
    /// Payload is empty: nothing to fragment.
    #[error("Payload is empty: unable to build")]
    EmptyPayload,
    /// Payload exceeds the 223 bytes a fast packet session can carry.
    #[error("Payload of {len} bytes exceeds fast packet capacity")]
    PayloadTooLarge { len: usize },
    /// Unable to build the CAN identifier.
    #[error(transparent)]
    Id(#[from] CanIdBuildError),
}

//==================================================================================QUEUE_ERROR
#[derive(Error, Debug, PartialEq, Eq)]
/// Errors raised by the frame queues.
pub enum QueueError {
    /// No free slot: the caller must retry later.
    #[error("Frame queue is full")]
    Full,
}

//==================================================================================REGISTRY_ERROR
#[derive(Error, Debug, PartialEq, Eq)]
/// Errors raised by the functional device registry.
pub enum RegistryError {
    /// Every slot of the fixed-size device table is in use.
    #[error("Device table is full")]
    TableFull,
    /// No record exists for the requested NAME.
    #[error("Device not found")]
    NotFound,
}

//==================================================================================STACK_ERROR
#[derive(Error, Debug, PartialEq, Eq)]
/// Errors raised by the stack instances and their manager.
pub enum StackError {
    /// Selected stack instance does not exist.
    #[error("Stack instance {index} out of range (configured: {configured})")]
    InstanceOutOfRange { index: usize, configured: usize },
    /// The instance has no claimed address yet.
    #[error("No address claimed")]
    NoAddress,
    /// Transmit queue cannot take the frames right now.
    #[error("Transmit queue busy")]
    TransmitBusy,
    /// Fragmentation failed.
    #[error(transparent)]
    FastPacket(#[from] FastPacketError),
    /// Unable to build the CAN identifier.
    #[error(transparent)]
    Id(#[from] CanIdBuildError),
    /// Device table failure.
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

impl From<QueueError> for StackError {
    fn from(_: QueueError) -> Self {
        StackError::TransmitBusy
    }
}

//==================================================================================VEREG_ERROR
#[derive(Error, Debug, PartialEq, Eq)]
/// Errors raised while building or parsing VE.Reg messages.
pub enum VeRegError {
    /// Message is shorter than the vendor tag and register id.
    #[error("VE.Reg message too short: {len} bytes")]
    TooShort { len: usize },
    /// Message belongs to another protocol sharing the PGN.
    #[error("Foreign vendor tag {tag:#06X}")]
    ForeignTag { tag: u16 },
    /// Acknowledgement code outside the known set.
    #[error("Unknown acknowledgement code {code}")]
    UnknownAck { code: u16 },
    /// Value does not fit the message buffer or cannot be decoded.
    #[error("Codec error: {0}")]
    Codec(#[from] CodecError),
    /// Transmission failed.
    #[error(transparent)]
    Stack(#[from] StackError),
}
