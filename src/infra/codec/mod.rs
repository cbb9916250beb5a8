//! Byte-level codec: cursor-based readers/writers with an explicit byte order
//! and the type-tagged variant encoder/decoder built on top of them.
pub mod stream;
pub mod traits;
pub mod variant;
