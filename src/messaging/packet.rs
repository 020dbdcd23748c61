use std::fmt::{Debug, Formatter};

use bytes::{Buf, BufMut, BytesMut};
use crc::Crc;

use crate::messaging::codec_error::CodecError;
use crate::messaging::messages::crc_extra_for;
use crate::messaging::payload::Payload;

pub const PACKET_START_MARKER: u8 = 0xFE;
/// start marker, len, seq, sysid, compid, msgid
pub const HEADER_LEN: usize = 6;
pub const CHECKSUM_LEN: usize = 2;

/// sender identity of a ground control station - this is what all packed messages carry
pub const GCS_SYSTEM_ID: u8 = 255;
pub const GCS_COMPONENT_ID: u8 = 190;

const X25: Crc<u16> = Crc::<u16>::new(&crc::CRC_16_MCRF4XX);

#[derive(Clone, Copy, Eq, PartialEq)]
pub struct Checksum(pub u16);
impl Debug for Checksum {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:04x?}", self.0)
    }
}
impl Checksum {
    /// The checksum covers the header (without start marker) and the payload, and it is seeded
    ///  with a per-message `crc_extra` byte so that peers with diverging message definitions
    ///  reject each other's packets.
    pub fn new(header: &[u8], payload: &[u8], crc_extra: u8) -> Checksum {
        let mut digest = X25.digest();
        digest.update(header);
        digest.update(payload);
        digest.update(&[crc_extra]);
        Checksum(digest.finalize())
    }
}

/// The envelope around a single message's payload as it is exchanged with the transport: MAVLink
///  v1 framing with routing metadata.
///
/// A packet is created fresh for every outbound message (see
///  [crate::messaging::message::Message::pack]) and for every inbound frame.
#[derive(Clone, Eq, PartialEq)]
pub struct MavPacket {
    pub len: u8,
    pub seq: u8,
    pub sysid: u8,
    pub compid: u8,
    pub msgid: u8,
    pub payload: Payload,
}

impl Debug for MavPacket {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MavPacket{{msgid:{}, len:{}, seq:{}, from:{}/{}}}", self.msgid, self.len, self.seq, self.sysid, self.compid)
    }
}

impl MavPacket {
    pub fn new(msgid: u8, len: u8) -> MavPacket {
        MavPacket {
            len,
            seq: 0,
            sysid: GCS_SYSTEM_ID,
            compid: GCS_COMPONENT_ID,
            msgid,
            payload: Payload::with_capacity(len as usize),
        }
    }

    pub fn with_seq(self, seq: u8) -> MavPacket {
        MavPacket {
            seq,
            ..self
        }
    }

    pub fn frame_len(&self) -> usize {
        HEADER_LEN + self.len as usize + CHECKSUM_LEN
    }

    fn header(&self) -> [u8; HEADER_LEN] {
        [PACKET_START_MARKER, self.len, self.seq, self.sysid, self.compid, self.msgid]
    }

    /// Serializes the complete frame. Fails if the payload was not completely written or if the
    ///  message id is not part of the catalog (there is no `crc_extra` for it then).
    pub fn ser(&self, buf: &mut BytesMut) -> anyhow::Result<()> {
        if self.payload.len() != self.len as usize {
            return Err(CodecError::Framing {
                declared: self.len as usize,
                available: self.payload.len(),
            }.into());
        }
        let crc_extra = crc_extra_for(self.msgid)
            .ok_or(CodecError::UnknownMessageId(self.msgid))?;

        let header = self.header();
        let checksum = Checksum::new(&header[1..], self.payload.as_slice(), crc_extra);

        buf.reserve(self.frame_len());
        buf.put_slice(&header);
        buf.put_slice(self.payload.as_slice());
        buf.put_u16_le(checksum.0);
        Ok(())
    }

    /// Reads a complete frame starting at the buffer's current position, verifying the start
    ///  marker and the checksum. On success, the buffer is advanced past the frame.
    pub fn try_read(buf: &mut impl Buf) -> anyhow::Result<MavPacket> {
        if buf.remaining() < HEADER_LEN {
            return Err(CodecError::Framing {
                declared: HEADER_LEN,
                available: buf.remaining(),
            }.into());
        }

        let mut header = [0u8; HEADER_LEN];
        buf.copy_to_slice(&mut header);
        let [start_marker, len, seq, sysid, compid, msgid] = header;

        if start_marker != PACKET_START_MARKER {
            return Err(CodecError::InvalidStartMarker(start_marker).into());
        }
        if buf.remaining() < len as usize + CHECKSUM_LEN {
            return Err(CodecError::Framing {
                declared: len as usize,
                available: buf.remaining().saturating_sub(CHECKSUM_LEN),
            }.into());
        }

        let payload = buf.copy_to_bytes(len as usize);
        let actual = Checksum(buf.get_u16_le());

        let crc_extra = crc_extra_for(msgid)
            .ok_or(CodecError::UnknownMessageId(msgid))?;
        let expected = Checksum::new(&header[1..], &payload, crc_extra);
        if actual != expected {
            return Err(CodecError::ChecksumMismatch {
                msgid,
                expected: expected.0,
                actual: actual.0,
            }.into());
        }

        Ok(MavPacket {
            len,
            seq,
            sysid,
            compid,
            msgid,
            payload: Payload::from_received(&payload),
        })
    }
}
