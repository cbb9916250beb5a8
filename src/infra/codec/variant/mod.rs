//! Variant codec: moves a [`Variant`] to and from a byte stream.
//!
//! The tag alone decides how many bytes are consumed or produced; there is no
//! length prefix and no variable-length encoding. Decimal variants are moved
//! as raw integers, the scale travels out-of-band with the tag.
use crate::core::{Variant, VariantBytes, VariantTag, MAX_VARIANT_BYTES};
use crate::error::{CodecError, StreamError};
use crate::infra::codec::stream::{ByteReader, ByteWriter};

/// Decode one value of type `tag` from the reader, advancing its cursor by
/// exactly `tag.width()` bytes.
///
/// On failure nothing is consumed.
pub fn decode(tag: VariantTag, reader: &mut ByteReader<'_>) -> Result<Variant, CodecError> {
    let width = tag.width();
    if width > reader.remaining() {
        return Err(CodecError::Stream(StreamError::OutOfBounds {
            asked: width,
            available: reader.remaining(),
        }));
    }

    let value = match tag {
        VariantTag::None => Variant::None,
        VariantTag::Un8 => Variant::Un8(reader.read_u8()?),
        VariantTag::Un16 => Variant::Un16(reader.read_u16()?),
        VariantTag::Un32 => Variant::Un32(reader.read_u32()?),
        VariantTag::Un64 => Variant::Un64(reader.read_u64()?),
        VariantTag::Sn8 => Variant::Sn8(reader.read_i8()?),
        VariantTag::Sn16 => Variant::Sn16(reader.read_i16()?),
        VariantTag::Sn32 => Variant::Sn32(reader.read_i32()?),
        VariantTag::Sn64 => Variant::Sn64(reader.read_i64()?),
        VariantTag::Decimal16 { scale } => Variant::Decimal16 {
            raw: reader.read_i16()?,
            scale,
        },
        VariantTag::Decimal32 { scale } => Variant::Decimal32 {
            raw: reader.read_i32()?,
            scale,
        },
        VariantTag::Bytes { len } => {
            let len = len as usize;
            if len > MAX_VARIANT_BYTES {
                return Err(CodecError::BufferTooLong { len });
            }
            let slice = reader.read_slice(len)?;
            let mut bytes = VariantBytes::new();
            bytes.data[..len].copy_from_slice(slice);
            bytes.len = len;
            Variant::Bytes(bytes)
        }
    };
    Ok(value)
}

/// Append `value` to the writer, producing exactly `value.width()` bytes.
///
/// On failure nothing is written.
pub fn encode(value: &Variant, writer: &mut ByteWriter<'_>) -> Result<(), CodecError> {
    let width = value.width();
    if width > writer.remaining() {
        return Err(CodecError::Stream(StreamError::OutOfBounds {
            asked: width,
            available: writer.remaining(),
        }));
    }

    match *value {
        Variant::None => {}
        Variant::Un8(v) => writer.write_u8(v)?,
        Variant::Un16(v) => writer.write_u16(v)?,
        Variant::Un32(v) => writer.write_u32(v)?,
        Variant::Un64(v) => writer.write_u64(v)?,
        Variant::Sn8(v) => writer.write_i8(v)?,
        Variant::Sn16(v) => writer.write_i16(v)?,
        Variant::Sn32(v) => writer.write_i32(v)?,
        Variant::Sn64(v) => writer.write_i64(v)?,
        Variant::Decimal16 { raw, .. } => writer.write_i16(raw)?,
        Variant::Decimal32 { raw, .. } => writer.write_i32(raw)?,
        Variant::Bytes(ref bytes) => writer.write_slice(bytes.as_slice())?,
    }
    Ok(())
}
