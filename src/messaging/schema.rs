//! Declarative description of a message's wire layout, and the one routine that moves a
//!  message's fields into and out of a [Payload] based on that description.
//!
//! A message type is a [MessageSchema]: its id, its `crc_extra` seed and an ordered table of
//!  [FieldDef]s. Field order and widths *are* the wire contract - reordering a table breaks
//!  interoperability with every peer.

use crate::messaging::codec_error::CodecError;
use crate::messaging::payload::Payload;

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub enum FieldType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    /// fixed-length byte array, used as raw bytes or as a null padded ASCII string
    Bytes(usize),
}

impl FieldType {
    pub const fn wire_len(&self) -> usize {
        match self {
            FieldType::U8 | FieldType::I8 => 1,
            FieldType::U16 | FieldType::I16 => 2,
            FieldType::U32 | FieldType::I32 | FieldType::F32 => 4,
            FieldType::U64 | FieldType::I64 | FieldType::F64 => 8,
            FieldType::Bytes(len) => *len,
        }
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq)]
pub struct FieldDef {
    pub name: &'static str,
    pub ty: FieldType,
}

#[derive(Debug, Eq, PartialEq)]
pub struct MessageSchema {
    pub id: u8,
    pub name: &'static str,
    pub crc_extra: u8,
    pub fields: &'static [FieldDef],
}

impl MessageSchema {
    pub const fn payload_len(&self) -> usize {
        let mut result = 0;
        let mut i = 0;
        while i < self.fields.len() {
            result += self.fields[i].ty.wire_len();
            i += 1;
        }
        result
    }
}

/// A single field's value, decoupled from the Rust type of the message record it belongs to
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    U8(u8),
    I8(i8),
    U16(u16),
    I16(i16),
    U32(u32),
    I32(i32),
    U64(u64),
    I64(i64),
    F32(f32),
    F64(f64),
    Bytes(Vec<u8>),
}

/// Maps a Rust type to its wire representation. Implemented for the primitive numbers and for
///  fixed-size byte arrays, which is everything a message record may contain.
pub trait WireField: Sized {
    const FIELD_TYPE: FieldType;

    fn into_value(self) -> FieldValue;
    fn from_value(value: FieldValue) -> Option<Self>;
}

macro_rules! wire_field_impl {
    ($ty:ty, $variant: ident) => {
        impl WireField for $ty {
            const FIELD_TYPE: FieldType = FieldType::$variant;

            fn into_value(self) -> FieldValue {
                FieldValue::$variant(self)
            }

            fn from_value(value: FieldValue) -> Option<Self> {
                match value {
                    FieldValue::$variant(v) => Some(v),
                    _ => None,
                }
            }
        }
    }
}

wire_field_impl!(u8, U8);
wire_field_impl!(i8, I8);
wire_field_impl!(u16, U16);
wire_field_impl!(i16, I16);
wire_field_impl!(u32, U32);
wire_field_impl!(i32, I32);
wire_field_impl!(u64, U64);
wire_field_impl!(i64, I64);
wire_field_impl!(f32, F32);
wire_field_impl!(f64, F64);

impl <const N: usize> WireField for [u8; N] {
    const FIELD_TYPE: FieldType = FieldType::Bytes(N);

    fn into_value(self) -> FieldValue {
        FieldValue::Bytes(self.to_vec())
    }

    fn from_value(value: FieldValue) -> Option<Self> {
        match value {
            FieldValue::Bytes(v) => v.try_into().ok(),
            _ => None,
        }
    }
}

/// Writes field values to a payload in the schema's declared order. The values must match the
///  schema entry by entry, both in kind and (for byte arrays) in length.
pub fn write_fields(schema: &MessageSchema, values: &[FieldValue], payload: &mut Payload) -> anyhow::Result<()> {
    if values.len() != schema.fields.len() {
        return Err(CodecError::FieldMismatch { message: schema.name, field: "*" }.into());
    }

    for (def, value) in schema.fields.iter().zip(values) {
        match (def.ty, value) {
            (FieldType::U8, FieldValue::U8(v)) => payload.put_u8(*v)?,
            (FieldType::I8, FieldValue::I8(v)) => payload.put_i8(*v)?,
            (FieldType::U16, FieldValue::U16(v)) => payload.put_u16(*v)?,
            (FieldType::I16, FieldValue::I16(v)) => payload.put_i16(*v)?,
            (FieldType::U32, FieldValue::U32(v)) => payload.put_u32(*v)?,
            (FieldType::I32, FieldValue::I32(v)) => payload.put_i32(*v)?,
            (FieldType::U64, FieldValue::U64(v)) => payload.put_u64(*v)?,
            (FieldType::I64, FieldValue::I64(v)) => payload.put_i64(*v)?,
            (FieldType::F32, FieldValue::F32(v)) => payload.put_f32(*v)?,
            (FieldType::F64, FieldValue::F64(v)) => payload.put_f64(*v)?,
            (FieldType::Bytes(len), FieldValue::Bytes(v)) if v.len() == len => payload.put_slice(v)?,
            _ => return Err(CodecError::FieldMismatch { message: schema.name, field: def.name }.into()),
        }
    }
    Ok(())
}

/// Reads all of a schema's fields from the payload's current read index. Byte arrays are read
///  for their full declared length, there is no length prefix on the wire.
pub fn read_fields(schema: &MessageSchema, payload: &mut Payload) -> anyhow::Result<Vec<FieldValue>> {
    let mut result = Vec::with_capacity(schema.fields.len());
    for def in schema.fields {
        let value = match def.ty {
            FieldType::U8 => FieldValue::U8(payload.get_u8()?),
            FieldType::I8 => FieldValue::I8(payload.get_i8()?),
            FieldType::U16 => FieldValue::U16(payload.get_u16()?),
            FieldType::I16 => FieldValue::I16(payload.get_i16()?),
            FieldType::U32 => FieldValue::U32(payload.get_u32()?),
            FieldType::I32 => FieldValue::I32(payload.get_i32()?),
            FieldType::U64 => FieldValue::U64(payload.get_u64()?),
            FieldType::I64 => FieldValue::I64(payload.get_i64()?),
            FieldType::F32 => FieldValue::F32(payload.get_f32()?),
            FieldType::F64 => FieldValue::F64(payload.get_f64()?),
            FieldType::Bytes(len) => FieldValue::Bytes(payload.get_bytes(len)?),
        };
        result.push(value);
    }
    Ok(result)
}

/// Stores a string in a fixed-length byte array: at most `field.len()` characters, one byte
///  (the character's low byte) each, with every unused trailing byte set to zero.
pub fn set_string_field(field: &mut [u8], text: &str) {
    let mut len = 0;
    for (dest, c) in field.iter_mut().zip(text.chars()) {
        *dest = c as u32 as u8;
        len += 1;
    }
    field[len..].fill(0);
}

/// Reads a string from a fixed-length byte array, stopping at the first zero byte. Each byte is
///  one character, so the field is effectively ASCII-only.
pub fn get_string_field(field: &[u8]) -> String {
    field.iter()
        .take_while(|&&b| b != 0)
        .map(|&b| b as char)
        .collect()
}

#[cfg(test)]
mod test {
    use rstest::rstest;

    use super::*;

    const SAMPLE: MessageSchema = MessageSchema {
        id: 99,
        name: "SAMPLE",
        crc_extra: 0,
        fields: &[
            FieldDef { name: "a", ty: FieldType::I16 },
            FieldDef { name: "b", ty: FieldType::U8 },
            FieldDef { name: "c", ty: FieldType::Bytes(3) },
        ],
    };

    #[test]
    fn test_payload_len() {
        assert_eq!(SAMPLE.payload_len(), 6);
    }

    #[test]
    fn test_write_read_fields() {
        let values = vec![FieldValue::I16(-3), FieldValue::U8(200), FieldValue::Bytes(vec![1, 0, 2])];
        let mut payload = Payload::with_capacity(SAMPLE.payload_len());
        write_fields(&SAMPLE, &values, &mut payload).unwrap();
        assert_eq!(payload.as_slice(), &[0xfd, 0xff, 200, 1, 0, 2]);

        assert_eq!(read_fields(&SAMPLE, &mut payload).unwrap(), values);
    }

    #[rstest]
    #[case::wrong_kind(vec![FieldValue::U16(3), FieldValue::U8(200), FieldValue::Bytes(vec![1, 0, 2])], "a")]
    #[case::wrong_array_len(vec![FieldValue::I16(3), FieldValue::U8(200), FieldValue::Bytes(vec![1, 0])], "c")]
    #[case::missing_value(vec![FieldValue::I16(3)], "*")]
    fn test_write_fields_mismatch(#[case] values: Vec<FieldValue>, #[case] field: &str) {
        let mut payload = Payload::with_capacity(SAMPLE.payload_len());
        let err = write_fields(&SAMPLE, &values, &mut payload).unwrap_err();
        match err.downcast_ref::<CodecError>() {
            Some(CodecError::FieldMismatch { message, field: actual }) => {
                assert_eq!(*message, "SAMPLE");
                assert_eq!(*actual, field);
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_read_fields_short_payload() {
        let mut payload = Payload::from_received(&[1, 2, 3, 4]);
        let err = read_fields(&SAMPLE, &mut payload).unwrap_err();
        assert!(matches!(err.downcast_ref::<CodecError>(), Some(CodecError::OutOfBounds { .. })));
    }

    #[rstest]
    #[case::short("abc", b"abc\0\0", "abc")]
    #[case::exact("abcde", b"abcde", "abcde")]
    #[case::truncated("abcdefgh", b"abcde", "abcde")]
    #[case::empty("", b"\0\0\0\0\0", "")]
    fn test_string_field(#[case] text: &str, #[case] expected_raw: &[u8; 5], #[case] expected_text: &str) {
        let mut field = [0xffu8; 5];
        set_string_field(&mut field, text);
        assert_eq!(&field, expected_raw);
        assert_eq!(get_string_field(&field), expected_text);
    }

    #[test]
    fn test_get_string_field_stops_at_first_zero() {
        assert_eq!(get_string_field(b"ab\0cd"), "ab");
    }

    #[test]
    fn test_set_string_field_overwrites_previous_content() {
        let mut field = [0u8; 6];
        set_string_field(&mut field, "secret");
        set_string_field(&mut field, "ab");
        assert_eq!(&field, b"ab\0\0\0\0");
    }
}
