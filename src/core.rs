//! Data contract shared by the codec and the protocol layers: fixed-capacity
//! payload buffers, byte order selection and the tagged `Variant` value
//! carried by VE.Reg messages.
use crate::error::CodecError;

/// Maximum payload size once a Fast Packet session is reassembled.
pub const MAX_PAYLOAD_BYTES: usize = 223;

/// Maximum length of a buffer/string variant.
pub const MAX_VARIANT_BYTES: usize = 32;

//==================================================================================BYTE_ORDER
/// Byte order used when moving multi-byte integers through a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ByteOrder {
    /// Least significant byte first (NMEA 2000 / J1939 wire order).
    Little,
    /// Most significant byte first.
    Big,
}

//==================================================================================BUFFERS
/// Fixed-capacity byte buffer with an explicit fill length.
/// Equality only looks at the populated bytes.
#[derive(Debug, Clone, Copy)]
pub struct Bytes<const N: usize> {
    pub len: usize,
    pub data: [u8; N],
}

/// Buffer able to hold a complete reassembled message.
pub type PayloadBytes = Bytes<MAX_PAYLOAD_BYTES>;
/// Buffer carried by `Variant::Bytes`.
pub type VariantBytes = Bytes<MAX_VARIANT_BYTES>;

impl<const N: usize> PartialEq for Bytes<N> {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}

impl<const N: usize> Eq for Bytes<N> {}

impl<const N: usize> Default for Bytes<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Bytes<N> {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self { len: 0, data: [0; N] }
    }

    /// Build a buffer holding a copy of `slice`; `None` when it does not fit.
    pub fn from_slice(slice: &[u8]) -> Option<Self> {
        if slice.len() > N {
            return None;
        }
        let mut bytes = Self::new();
        bytes.data[..slice.len()].copy_from_slice(slice);
        bytes.len = slice.len();
        Some(bytes)
    }

    /// Number of valid bytes stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Total capacity.
    #[inline]
    pub const fn capacity(&self) -> usize {
        N
    }

    /// Reset the buffer.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Immutable view over the populated bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Mutable view over the populated bytes.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }
}

//==================================================================================VARIANT_TAG
/// Type tag of a `Variant`. The tag alone fixes the encoded byte width.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum VariantTag {
    /// No value (zero bytes).
    None,
    Un8,
    Un16,
    Un32,
    Un64,
    Sn8,
    Sn16,
    Sn32,
    Sn64,
    /// Signed 16-bit raw value scaled by `10^-scale`.
    Decimal16 { scale: u8 },
    /// Signed 32-bit raw value scaled by `10^-scale`.
    Decimal32 { scale: u8 },
    /// Fixed-length byte buffer or string; the length is agreed out-of-band.
    Bytes { len: u8 },
}

impl VariantTag {
    /// Number of bytes consumed/produced by the codec for this tag.
    pub const fn width(&self) -> usize {
        match self {
            VariantTag::None => 0,
            VariantTag::Un8 | VariantTag::Sn8 => 1,
            VariantTag::Un16 | VariantTag::Sn16 | VariantTag::Decimal16 { .. } => 2,
            VariantTag::Un32 | VariantTag::Sn32 | VariantTag::Decimal32 { .. } => 4,
            VariantTag::Un64 | VariantTag::Sn64 => 8,
            VariantTag::Bytes { len } => *len as usize,
        }
    }
}

//==================================================================================VARIANT
/// Tagged value moved by the variant codec.
///
/// A variant never changes tag in place; [`Variant::retag`] produces a new
/// value when an explicit conversion is wanted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    None,
    Un8(u8),
    Un16(u16),
    Un32(u32),
    Un64(u64),
    Sn8(i8),
    Sn16(i16),
    Sn32(i32),
    Sn64(i64),
    Decimal16 { raw: i16, scale: u8 },
    Decimal32 { raw: i32, scale: u8 },
    Bytes(VariantBytes),
}

impl Variant {
    /// Build a buffer variant; fails when `slice` exceeds `MAX_VARIANT_BYTES`.
    pub fn bytes(slice: &[u8]) -> Result<Self, CodecError> {
        VariantBytes::from_slice(slice)
            .map(Variant::Bytes)
            .ok_or(CodecError::BufferTooLong { len: slice.len() })
    }

    /// Tag describing this value.
    pub fn tag(&self) -> VariantTag {
        match self {
            Variant::None => VariantTag::None,
            Variant::Un8(_) => VariantTag::Un8,
            Variant::Un16(_) => VariantTag::Un16,
            Variant::Un32(_) => VariantTag::Un32,
            Variant::Un64(_) => VariantTag::Un64,
            Variant::Sn8(_) => VariantTag::Sn8,
            Variant::Sn16(_) => VariantTag::Sn16,
            Variant::Sn32(_) => VariantTag::Sn32,
            Variant::Sn64(_) => VariantTag::Sn64,
            Variant::Decimal16 { scale, .. } => VariantTag::Decimal16 { scale: *scale },
            Variant::Decimal32 { scale, .. } => VariantTag::Decimal32 { scale: *scale },
            Variant::Bytes(bytes) => VariantTag::Bytes {
                len: bytes.len() as u8,
            },
        }
    }

    /// Encoded width in bytes.
    pub fn width(&self) -> usize {
        self.tag().width()
    }

    /// Integer view of numeric variants (raw value for decimals).
    fn as_i128(&self) -> Option<i128> {
        match *self {
            Variant::Un8(v) => Some(v as i128),
            Variant::Un16(v) => Some(v as i128),
            Variant::Un32(v) => Some(v as i128),
            Variant::Un64(v) => Some(v as i128),
            Variant::Sn8(v) => Some(v as i128),
            Variant::Sn16(v) => Some(v as i128),
            Variant::Sn32(v) => Some(v as i128),
            Variant::Sn64(v) => Some(v as i128),
            Variant::Decimal16 { raw, .. } => Some(raw as i128),
            Variant::Decimal32 { raw, .. } => Some(raw as i128),
            Variant::None | Variant::Bytes(_) => None,
        }
    }

    /// Convert into another tag.
    ///
    /// Integer tags convert between each other when the value fits. Decimals
    /// only convert to another decimal of the same scale (raw value copied, no
    /// rescaling). Buffers and `None` only convert to their own tag.
    pub fn retag(&self, target: VariantTag) -> Result<Variant, CodecError> {
        let from = self.tag();
        if from == target {
            return Ok(*self);
        }
        let decimal_scale = match from {
            VariantTag::Decimal16 { scale } | VariantTag::Decimal32 { scale } => Some(scale),
            _ => None,
        };
        let value = self
            .as_i128()
            .ok_or(CodecError::TagMismatch { from, to: target })?;

        let converted = match target {
            VariantTag::Un8 if decimal_scale.is_none() => {
                u8::try_from(value).map(Variant::Un8).ok()
            }
            VariantTag::Un16 if decimal_scale.is_none() => {
                u16::try_from(value).map(Variant::Un16).ok()
            }
            VariantTag::Un32 if decimal_scale.is_none() => {
                u32::try_from(value).map(Variant::Un32).ok()
            }
            VariantTag::Un64 if decimal_scale.is_none() => {
                u64::try_from(value).map(Variant::Un64).ok()
            }
            VariantTag::Sn8 if decimal_scale.is_none() => {
                i8::try_from(value).map(Variant::Sn8).ok()
            }
            VariantTag::Sn16 if decimal_scale.is_none() => {
                i16::try_from(value).map(Variant::Sn16).ok()
            }
            VariantTag::Sn32 if decimal_scale.is_none() => {
                i32::try_from(value).map(Variant::Sn32).ok()
            }
            VariantTag::Sn64 if decimal_scale.is_none() => {
                i64::try_from(value).map(Variant::Sn64).ok()
            }
            VariantTag::Decimal16 { scale } if decimal_scale == Some(scale) => {
                i16::try_from(value)
                    .map(|raw| Variant::Decimal16 { raw, scale })
                    .ok()
            }
            VariantTag::Decimal32 { scale } if decimal_scale == Some(scale) => {
                i32::try_from(value)
                    .map(|raw| Variant::Decimal32 { raw, scale })
                    .ok()
            }
            _ => return Err(CodecError::TagMismatch { from, to: target }),
        };

        converted.ok_or(CodecError::ValueOutOfRange { target })
    }
}
