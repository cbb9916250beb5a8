//! Public traits exposed by the codec. They decouple protocol message
//! structures from the buffers they arrive in.

//==================================================================================FROM_PAYLOAD
/// Deserialize a sequence of bytes into a data structure.
pub trait FromPayload: Sized {
    /// Error raised when `bytes_slice` is malformed.
    type Error;
    /// Deserialize a byte slice to produce a new instance.
    fn from_payload(bytes_slice: &[u8]) -> Result<Self, Self::Error>;
}
