use std::fmt::{Debug, Formatter};
use std::io::{self, ErrorKind};
use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::{mpsc, RwLock};
use tracing::{debug, error, trace, warn};

use crate::config::MavConfig;
use crate::messaging::messages::AnyMessage;
use crate::messaging::packet::MavPacket;
use crate::messaging::packet_decoder::PacketDecoder;

/// This trait decouples the link (receiving and framing bytes) from what happens to a decoded
///  message once it is received.
///
/// It is passed around as an `Arc<dyn ...>` to minimize dependencies of link implementations.
#[async_trait]
pub trait MessageHandler: Sync + Send {
    async fn on_message(&self, packet: &MavPacket, message: AnyMessage);
}

/// The connection to a vehicle over UDP.
pub struct UdpLink {
    socket: UdpSocket,
    configured_peer: Option<SocketAddr>,
    learned_peer: RwLock<Option<SocketAddr>>,
    max_datagram_size: usize,
}

impl Debug for UdpLink {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "UdpLink{{{:?}}}", self.socket.local_addr().ok())
    }
}

impl UdpLink {
    pub async fn bind(config: &MavConfig) -> anyhow::Result<UdpLink> {
        let socket = UdpSocket::bind(config.bind_addr).await?;
        debug!("bound UDP link to {:?}", socket.local_addr()?);

        Ok(UdpLink {
            socket,
            configured_peer: config.vehicle_addr,
            learned_peer: Default::default(),
            max_datagram_size: config.max_datagram_size,
        })
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(self.socket.local_addr()?)
    }

    pub async fn peer(&self) -> Option<SocketAddr> {
        match self.configured_peer {
            Some(addr) => Some(addr),
            None => *self.learned_peer.read().await,
        }
    }

    pub async fn send(&self, buf: &[u8]) -> anyhow::Result<()> {
        let peer = self.peer().await
            .ok_or_else(|| anyhow!("no vehicle address known yet"))?;
        self.socket.send_to(buf, peer).await?;
        Ok(())
    }

    /// Sends frames from the channel until all of its senders are gone. Failures are logged and
    ///  the frame is dropped - there is no resending at this level.
    pub async fn send_loop(&self, outgoing: &mut mpsc::UnboundedReceiver<Bytes>) {
        while let Some(frame) = outgoing.recv().await {
            self.send_logged(&frame).await;
        }
        debug!("outgoing channel closed - shutting down send loop");
    }

    /// Sends the frames that are queued right now, without waiting for more.
    pub async fn flush(&self, outgoing: &mut mpsc::UnboundedReceiver<Bytes>) {
        while let Ok(frame) = outgoing.try_recv() {
            self.send_logged(&frame).await;
        }
    }

    async fn send_logged(&self, frame: &[u8]) {
        if let Err(e) = self.send(frame).await {
            error!("error sending packet: {}", e);
        }
    }

    /// Receives datagrams, splits them into packets and passes decoded messages to the handler.
    ///  Corrupt packets and messages outside the catalog are logged and skipped. Returns only if
    ///  the socket fails with an error that is not specific to a single datagram.
    pub async fn recv_loop(&self, handler: Arc<dyn MessageHandler>) -> anyhow::Result<()> {
        let mut decoder = PacketDecoder::new();
        let mut buf = vec![0u8; self.max_datagram_size];

        loop {
            let (n, from) = match self.socket.recv_from(&mut buf).await {
                Ok(r) => r,
                Err(e) if is_transient(&e) => {
                    warn!("error receiving datagram: {}", e);
                    continue;
                }
                Err(e) => {
                    error!("socket failed, shutting down receive loop: {}", e);
                    return Err(e.into());
                }
            };
            trace!("received {} bytes from {:?}", n, from);

            if self.configured_peer.is_none() {
                self.learn_peer(from).await;
            }

            decoder.extend(&buf[..n]);
            while let Some(packet) = decoder.next_packet() {
                match packet {
                    Ok(mut packet) => {
                        match AnyMessage::decode(&mut packet) {
                            Ok(msg) => handler.on_message(&packet, msg).await,
                            Err(e) => warn!("dropping {:?}: {}", packet, e),
                        }
                    }
                    Err(e) => warn!("dropping corrupt packet: {}", e),
                }
            }
        }
    }

    async fn learn_peer(&self, from: SocketAddr) {
        if *self.learned_peer.read().await == Some(from) {
            return;
        }
        debug!("vehicle address is {:?}", from);
        *self.learned_peer.write().await = Some(from);
    }
}

/// ICMP errors from earlier sends surface on UDP receives, and they do not affect the socket
fn is_transient(e: &io::Error) -> bool {
    matches!(e.kind(),
        ErrorKind::ConnectionRefused | ErrorKind::ConnectionReset | ErrorKind::Interrupted | ErrorKind::WouldBlock | ErrorKind::TimedOut)
}
