use std::fmt::{Debug, Formatter};

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::messaging::codec_error::CodecError;

macro_rules! put_impl {
    ($putter: ident, $ty:ty, $buf_putter: ident) => {
        pub fn $putter(&mut self, value: $ty) -> anyhow::Result<()> {
            self.ensure_writable(size_of::<$ty>())?;
            self.buf.$buf_putter(value);
            Ok(())
        }
    }
}

macro_rules! get_impl {
    ($getter: ident, $ty:ty, $buf_getter: ident) => {
        pub fn $getter(&mut self) -> anyhow::Result<$ty> {
            let mut raw = self.readable(size_of::<$ty>())?;
            Ok(raw.$buf_getter())
        }
    }
}

/// A fixed-capacity byte buffer for a single message's payload. Writes append at the end of the
///  written region, reads start at a separate read index that can be rewound with
///  [Payload::reset_index].
///
/// All numbers are little-endian. Nothing ever grows beyond the capacity given at construction:
///  an access that does not fit fails with [CodecError::OutOfBounds].
#[derive(Clone, Eq, PartialEq)]
pub struct Payload {
    buf: BytesMut,
    capacity: usize,
    read_index: usize,
}

impl Debug for Payload {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Payload{{{}/{}: {:02X?}}}", self.buf.len(), self.capacity, self.buf.as_ref())
    }
}

impl Payload {
    pub fn with_capacity(capacity: usize) -> Payload {
        Payload {
            buf: BytesMut::with_capacity(capacity),
            capacity,
            read_index: 0,
        }
    }

    /// wraps received bytes - the payload is full, reading past its end fails
    pub fn from_received(data: &[u8]) -> Payload {
        Payload {
            buf: BytesMut::from(data),
            capacity: data.len(),
            read_index: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// number of bytes written (or received) so far
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn read_index(&self) -> usize {
        self.read_index
    }

    pub fn as_slice(&self) -> &[u8] {
        self.buf.as_ref()
    }

    pub fn to_bytes(&self) -> Bytes {
        Bytes::copy_from_slice(&self.buf)
    }

    pub fn reset_index(&mut self) {
        self.read_index = 0;
    }

    fn ensure_writable(&self, len: usize) -> anyhow::Result<()> {
        if self.buf.len() + len > self.capacity {
            return Err(CodecError::OutOfBounds {
                requested: len,
                position: self.buf.len(),
                limit: self.capacity,
            }.into());
        }
        Ok(())
    }

    fn readable(&mut self, len: usize) -> anyhow::Result<&[u8]> {
        if self.read_index + len > self.buf.len() {
            return Err(CodecError::OutOfBounds {
                requested: len,
                position: self.read_index,
                limit: self.buf.len(),
            }.into());
        }
        let start = self.read_index;
        self.read_index += len;
        Ok(&self.buf[start..self.read_index])
    }

    put_impl!(put_u8, u8, put_u8);
    put_impl!(put_i8, i8, put_i8);
    put_impl!(put_u16, u16, put_u16_le);
    put_impl!(put_i16, i16, put_i16_le);
    put_impl!(put_u32, u32, put_u32_le);
    put_impl!(put_i32, i32, put_i32_le);
    put_impl!(put_u64, u64, put_u64_le);
    put_impl!(put_i64, i64, put_i64_le);
    put_impl!(put_f32, f32, put_f32_le);
    put_impl!(put_f64, f64, put_f64_le);

    get_impl!(get_u8, u8, get_u8);
    get_impl!(get_i8, i8, get_i8);
    get_impl!(get_u16, u16, get_u16_le);
    get_impl!(get_i16, i16, get_i16_le);
    get_impl!(get_u32, u32, get_u32_le);
    get_impl!(get_i32, i32, get_i32_le);
    get_impl!(get_u64, u64, get_u64_le);
    get_impl!(get_i64, i64, get_i64_le);
    get_impl!(get_f32, f32, get_f32_le);
    get_impl!(get_f64, f64, get_f64_le);

    pub fn put_slice(&mut self, data: &[u8]) -> anyhow::Result<()> {
        self.ensure_writable(data.len())?;
        self.buf.put_slice(data);
        Ok(())
    }

    pub fn get_bytes(&mut self, len: usize) -> anyhow::Result<Vec<u8>> {
        Ok(self.readable(len)?.to_vec())
    }
}
