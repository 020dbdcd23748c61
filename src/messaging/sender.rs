use std::fmt::Debug;
use std::sync::atomic::{AtomicU8, Ordering};

use anyhow::anyhow;
use bytes::{Bytes, BytesMut};
use tokio::sync::mpsc;
use tracing::trace;

use crate::messaging::packet::MavPacket;

/// This is where outbound packets leave the core. Implementations hand them to a transport, and
///  they must not block: sending is fire-and-forget from the caller's point of view.
pub trait PacketSender: Debug + Send + Sync + 'static {
    fn send_packet(&self, packet: MavPacket) -> anyhow::Result<()>;
}

/// Assigns consecutive (wrapping) sequence numbers, serializes packets and passes the raw frames
///  to a channel that is drained by the transport's send loop.
#[derive(Debug)]
pub struct ChannelPacketSender {
    next_seq: AtomicU8,
    channel: mpsc::UnboundedSender<Bytes>,
}

impl ChannelPacketSender {
    pub fn new() -> (ChannelPacketSender, mpsc::UnboundedReceiver<Bytes>) {
        let (send, recv) = mpsc::unbounded_channel();
        let sender = ChannelPacketSender {
            next_seq: AtomicU8::new(0),
            channel: send,
        };
        (sender, recv)
    }
}

impl PacketSender for ChannelPacketSender {
    fn send_packet(&self, packet: MavPacket) -> anyhow::Result<()> {
        let seq = self.next_seq.fetch_add(1, Ordering::AcqRel);
        let packet = packet.with_seq(seq);
        trace!("sending {:?}", packet);

        let mut buf = BytesMut::with_capacity(packet.frame_len());
        packet.ser(&mut buf)?;

        self.channel.send(buf.freeze())
            .map_err(|_| anyhow!("link is closed"))
    }
}
