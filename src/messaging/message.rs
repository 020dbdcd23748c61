use std::fmt::Debug;

use crate::messaging::codec_error::CodecError;
use crate::messaging::packet::MavPacket;
use crate::messaging::payload::Payload;
use crate::messaging::schema::{read_fields, write_fields, FieldValue, MessageSchema, WireField};

/// A typed message record. Each implementation is a plain struct whose fields are described by
///  its [MessageSchema]; packing and unpacking is driven entirely by that schema, so there is no
///  per-type serialization code.
///
/// Implementations are normally generated with [crate::mav_message].
pub trait Message: Debug + Clone + Send + Sync + 'static {
    const SCHEMA: &'static MessageSchema;

    /// the record's field values, in schema order
    fn to_fields(&self) -> Vec<FieldValue>;

    fn from_fields(fields: Vec<FieldValue>) -> anyhow::Result<Self>;

    fn pack(&self) -> anyhow::Result<MavPacket> {
        let schema = Self::SCHEMA;
        let mut packet = MavPacket::new(schema.id, u8::try_from(schema.payload_len())?);
        write_fields(schema, &self.to_fields(), &mut packet.payload)?;
        Ok(packet)
    }

    /// Decodes a record from a payload, starting from the beginning of the payload regardless of
    ///  previous reads. Either all fields are read successfully, or an error is returned.
    fn unpack(payload: &mut Payload) -> anyhow::Result<Self> {
        payload.reset_index();
        let fields = read_fields(Self::SCHEMA, payload)?;
        Self::from_fields(fields)
    }
}

/// helper for generated [Message::from_fields] implementations
pub fn next_field<T: WireField>(fields: &mut impl Iterator<Item=FieldValue>, schema: &'static MessageSchema, name: &'static str) -> anyhow::Result<T> {
    fields.next()
        .and_then(T::from_value)
        .ok_or_else(|| CodecError::FieldMismatch { message: schema.name, field: name }.into())
}

/// Declares a message record struct together with its [MessageSchema] and [Message]
///  implementation. Fields must be listed in wire order, and their types must implement
///  [WireField].
///
/// ```ignore
/// mav_message! {
///     /// doc
///     Heartbeat, "HEARTBEAT", id: 0, crc_extra: 50, {
///         custom_mode: u32,
///         mav_type: u8,
///     }
/// }
/// ```
#[macro_export]
macro_rules! mav_message {
    (
        $(#[$meta:meta])*
        $name:ident, $wire_name:literal, id: $id:expr, crc_extra: $crc_extra:expr, {
            $( $(#[$field_meta:meta])* $field:ident : $ty:ty ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq)]
        pub struct $name {
            $(
                $(#[$field_meta])*
                pub $field: $ty,
            )*
        }

        impl $crate::messaging::message::Message for $name {
            const SCHEMA: &'static $crate::messaging::schema::MessageSchema = &$crate::messaging::schema::MessageSchema {
                id: $id,
                name: $wire_name,
                crc_extra: $crc_extra,
                fields: &[
                    $(
                        $crate::messaging::schema::FieldDef {
                            name: stringify!($field),
                            ty: <$ty as $crate::messaging::schema::WireField>::FIELD_TYPE,
                        },
                    )*
                ],
            };

            fn to_fields(&self) -> Vec<$crate::messaging::schema::FieldValue> {
                vec![
                    $(
                        $crate::messaging::schema::WireField::into_value(self.$field.clone()),
                    )*
                ]
            }

            fn from_fields(fields: Vec<$crate::messaging::schema::FieldValue>) -> anyhow::Result<Self> {
                #[allow(unused_mut)]
                let mut fields = fields.into_iter();
                Ok($name {
                    $(
                        $field: $crate::messaging::message::next_field(&mut fields, Self::SCHEMA, stringify!($field))?,
                    )*
                })
            }
        }
    }
}
