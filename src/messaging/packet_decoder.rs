use bytes::{Buf, BytesMut};
use tracing::{debug, trace};

use crate::messaging::packet::{MavPacket, CHECKSUM_LEN, HEADER_LEN, PACKET_START_MARKER};

/// Splits an unbounded byte stream into packets.
///
/// Bytes are appended as they arrive from the transport, regardless of packet boundaries. The
///  decoder skips anything before a start marker, waits until a complete frame is buffered, and
///  drops a frame that fails to parse by discarding its start marker and searching for the next
///  one - a corrupt frame never yields a partial packet.
#[derive(Default)]
pub struct PacketDecoder {
    buf: BytesMut,
}

impl PacketDecoder {
    pub fn new() -> PacketDecoder {
        Default::default()
    }

    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    pub fn buffered_len(&self) -> usize {
        self.buf.len()
    }

    /// Returns the next packet if there is a complete one, `None` if more data is needed, and
    ///  an error if a frame was dropped. Call repeatedly until it returns `None`.
    pub fn next_packet(&mut self) -> Option<anyhow::Result<MavPacket>> {
        self.skip_to_start_marker();

        if self.buf.len() < HEADER_LEN {
            return None;
        }
        let frame_len = HEADER_LEN + self.buf[1] as usize + CHECKSUM_LEN;
        if self.buf.len() < frame_len {
            trace!("waiting for {} more bytes", frame_len - self.buf.len());
            return None;
        }

        let mut frame = &self.buf[..frame_len];
        match MavPacket::try_read(&mut frame) {
            Ok(packet) => {
                self.buf.advance(frame_len);
                Some(Ok(packet))
            }
            Err(e) => {
                self.buf.advance(1);
                Some(Err(e))
            }
        }
    }

    fn skip_to_start_marker(&mut self) {
        let skipped = self.buf.iter()
            .position(|&b| b == PACKET_START_MARKER)
            .unwrap_or(self.buf.len());
        if skipped > 0 {
            debug!("skipping {} bytes before start marker", skipped);
            self.buf.advance(skipped);
        }
    }
}

#[cfg(test)]
mod test {
    use bytes::BufMut;

    use crate::messaging::codec_error::CodecError;
    use crate::messaging::message::Message;
    use crate::messaging::messages::{AnyMessage, MagCalProgress};
    use crate::test_util::message::{test_progress, test_report};

    use super::*;

    fn frame(msg: &impl Message, seq: u8) -> BytesMut {
        let mut buf = BytesMut::new();
        msg.pack().unwrap().with_seq(seq).ser(&mut buf).unwrap();
        buf
    }

    fn drain(decoder: &mut PacketDecoder) -> Vec<anyhow::Result<MavPacket>> {
        let mut result = Vec::new();
        while let Some(p) = decoder.next_packet() {
            result.push(p);
        }
        result
    }

    #[test]
    fn test_several_packets_in_one_chunk() {
        let mut decoder = PacketDecoder::new();
        let mut data = frame(&test_progress(1, 10), 1);
        data.put_slice(&frame(&test_report(2, 3.0), 2));
        decoder.extend(&data);

        let packets = drain(&mut decoder);
        assert_eq!(packets.len(), 2);
        assert_eq!(packets[0].as_ref().unwrap().seq, 1);
        assert_eq!(packets[1].as_ref().unwrap().seq, 2);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_packet_split_across_chunks() {
        let mut decoder = PacketDecoder::new();
        let data = frame(&test_progress(3, 50), 9);

        decoder.extend(&data[..4]);
        assert!(decoder.next_packet().is_none());
        decoder.extend(&data[4..20]);
        assert!(decoder.next_packet().is_none());
        decoder.extend(&data[20..]);

        let mut packet = decoder.next_packet().unwrap().unwrap();
        assert_eq!(AnyMessage::decode(&mut packet).unwrap(), AnyMessage::MagCalProgress(test_progress(3, 50)));
    }

    #[test]
    fn test_garbage_before_packet() {
        let mut decoder = PacketDecoder::new();
        decoder.extend(b"\x01\x02garbage");
        decoder.extend(&frame(&test_progress(1, 10), 0));

        let packets = drain(&mut decoder);
        assert_eq!(packets.len(), 1);
        assert_eq!(packets[0].as_ref().unwrap().msgid, MagCalProgress::SCHEMA.id);
    }

    #[test]
    fn test_corrupt_packet_is_dropped() {
        let mut decoder = PacketDecoder::new();
        let mut corrupt = frame(&test_progress(1, 10), 0);
        let len = corrupt.len();
        corrupt[len - 2..].copy_from_slice(&[0, 0]);
        decoder.extend(&corrupt);
        decoder.extend(&frame(&test_report(4, 1.0), 1));

        let packets = drain(&mut decoder);
        let errors = packets.iter().filter(|p| p.is_err()).count();
        let good = packets.into_iter().filter_map(|p| p.ok()).collect::<Vec<_>>();

        assert_eq!(errors, 1);
        assert_eq!(good.len(), 1);
        assert_eq!(good[0].seq, 1);
        assert_eq!(decoder.buffered_len(), 0);
    }

    #[test]
    fn test_unknown_message_id_is_dropped() {
        let mut decoder = PacketDecoder::new();
        decoder.extend(&[PACKET_START_MARKER, 0, 0, 1, 1, 250, 0, 0]);

        let err = decoder.next_packet().unwrap().unwrap_err();
        assert_eq!(err.downcast_ref::<CodecError>(), Some(&CodecError::UnknownMessageId(250)));
        assert!(decoder.next_packet().is_none());
    }
}
