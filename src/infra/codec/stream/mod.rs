//! Cursor-based byte access for CAN payloads. A single reader/writer pair
//! serves both byte orders: the order is chosen when the stream is created
//! and every multi-byte access goes through it.
use crate::core::ByteOrder;
use crate::error::StreamError;

macro_rules! read_int {
    ($name:ident, $ty:ty) => {
        #[doc = concat!("Read a `", stringify!($ty), "` in the stream byte order.")]
        pub fn $name(&mut self) -> Result<$ty, StreamError> {
            const WIDTH: usize = core::mem::size_of::<$ty>();
            let mut raw = [0u8; WIDTH];
            raw.copy_from_slice(self.read_slice(WIDTH)?);
            Ok(match self.order {
                ByteOrder::Little => <$ty>::from_le_bytes(raw),
                ByteOrder::Big => <$ty>::from_be_bytes(raw),
            })
        }
    };
}

macro_rules! write_int {
    ($name:ident, $ty:ty) => {
        #[doc = concat!("Write a `", stringify!($ty), "` in the stream byte order.")]
        pub fn $name(&mut self, value: $ty) -> Result<(), StreamError> {
            let raw = match self.order {
                ByteOrder::Little => value.to_le_bytes(),
                ByteOrder::Big => value.to_be_bytes(),
            };
            self.write_slice(&raw)
        }
    };
}

//==================================================================================BYTE_READER
/// Reader extracting values from a `&[u8]` without copying the buffer.
pub struct ByteReader<'a> {
    /// Shared source buffer (typically a reassembled payload).
    buffer: &'a [u8],
    /// Number of bytes consumed from the beginning.
    cursor: usize,
    order: ByteOrder,
}

impl<'a> ByteReader<'a> {
    /// Create a reader positioned at the start of the provided buffer.
    pub fn new(buffer: &'a [u8], order: ByteOrder) -> Self {
        Self {
            buffer,
            cursor: 0,
            order,
        }
    }

    /// Byte order applied to multi-byte reads.
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Bytes consumed so far.
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Bytes left to read.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    /// Unread tail of the buffer (cursor unchanged).
    pub fn rest(&self) -> &'a [u8] {
        &self.buffer[self.cursor..]
    }

    /// Return a slice of `len` bytes from the current position.
    pub fn read_slice(&mut self, len: usize) -> Result<&'a [u8], StreamError> {
        if len > self.remaining() {
            return Err(StreamError::OutOfBounds {
                asked: len,
                available: self.remaining(),
            });
        }
        let slice = &self.buffer[self.cursor..self.cursor + len];
        self.cursor += len;
        Ok(slice)
    }

    /// Read a single byte.
    pub fn read_u8(&mut self) -> Result<u8, StreamError> {
        Ok(self.read_slice(1)?[0])
    }

    /// Read a single signed byte.
    pub fn read_i8(&mut self) -> Result<i8, StreamError> {
        Ok(self.read_u8()? as i8)
    }

    read_int!(read_u16, u16);
    read_int!(read_u32, u32);
    read_int!(read_u64, u64);
    read_int!(read_i16, i16);
    read_int!(read_i32, i32);
    read_int!(read_i64, i64);
}

//==================================================================================BYTE_WRITER
/// Writer laying values into a `&mut [u8]`; used to build VE.Reg payloads.
pub struct ByteWriter<'a> {
    /// Target buffer.
    buffer: &'a mut [u8],
    /// Number of bytes written so far.
    cursor: usize,
    order: ByteOrder,
}

impl<'a> ByteWriter<'a> {
    /// Create a writer positioned at the start of the buffer.
    pub fn new(buffer: &'a mut [u8], order: ByteOrder) -> Self {
        Self {
            buffer,
            cursor: 0,
            order,
        }
    }

    /// Create a writer that appends after `already_written` bytes.
    pub fn resume(buffer: &'a mut [u8], already_written: usize, order: ByteOrder) -> Self {
        let cursor = already_written.min(buffer.len());
        Self {
            buffer,
            cursor,
            order,
        }
    }

    /// Byte order applied to multi-byte writes.
    pub fn order(&self) -> ByteOrder {
        self.order
    }

    /// Bytes written so far (final payload length).
    pub fn position(&self) -> usize {
        self.cursor
    }

    /// Free room left in the buffer.
    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.cursor
    }

    /// Copy a byte slice into the buffer.
    pub fn write_slice(&mut self, slice: &[u8]) -> Result<(), StreamError> {
        if slice.len() > self.remaining() {
            return Err(StreamError::OutOfBounds {
                asked: slice.len(),
                available: self.remaining(),
            });
        }
        self.buffer[self.cursor..self.cursor + slice.len()].copy_from_slice(slice);
        self.cursor += slice.len();
        Ok(())
    }

    /// Write a single byte.
    pub fn write_u8(&mut self, value: u8) -> Result<(), StreamError> {
        self.write_slice(&[value])
    }

    /// Write a single signed byte.
    pub fn write_i8(&mut self, value: i8) -> Result<(), StreamError> {
        self.write_u8(value as u8)
    }

    write_int!(write_u16, u16);
    write_int!(write_u32, u32);
    write_int!(write_u64, u64);
    write_int!(write_i16, i16);
    write_int!(write_i32, i32);
    write_int!(write_i64, i64);
}
