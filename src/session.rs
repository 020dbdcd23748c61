use std::net::SocketAddr;
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use tokio::select;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, trace};

use crate::calibration::lifecycle::run_lifecycle_bridge;
use crate::calibration::tracker::MagnetometerCalibration;
use crate::config::MavConfig;
use crate::link::heartbeat_watchdog::run_heartbeat_watchdog;
use crate::link::udp_link::{MessageHandler, UdpLink};
use crate::link::{LinkEvent, LinkEventNotifier};
use crate::messaging::messages::{AnyMessage, Heartbeat};
use crate::messaging::packet::MavPacket;
use crate::messaging::sender::ChannelPacketSender;

/// Everything needed to calibrate a single vehicle's compasses over a UDP link: the link itself,
///  heartbeat supervision, and the calibration tracker that is cancelled when the link is lost.
///
/// Get hold of [VehicleSession::calibration] (and possibly [VehicleSession::link_events] and
///  [VehicleSession::shutdown_handle]) before calling [VehicleSession::run], which consumes the
///  session.
pub struct VehicleSession {
    config: Arc<MavConfig>,
    link: Arc<UdpLink>,
    calibration: Arc<MagnetometerCalibration>,
    events: Arc<LinkEventNotifier>,
    outgoing: mpsc::UnboundedReceiver<Bytes>,
    shutdown: Arc<watch::Sender<bool>>,
}

/// Ends a running [VehicleSession]. Requesting shutdown before the session runs makes it end
///  immediately after it started.
#[derive(Clone, Debug)]
pub struct SessionShutdown {
    requested: Arc<watch::Sender<bool>>,
}

impl SessionShutdown {
    pub fn shutdown(&self) {
        debug!("vehicle session shutdown requested");
        self.requested.send_replace(true);
    }
}

impl VehicleSession {
    pub async fn connect(config: Arc<MavConfig>) -> anyhow::Result<VehicleSession> {
        config.validate()?;

        let link = Arc::new(UdpLink::bind(&config).await?);
        let (sender, outgoing) = ChannelPacketSender::new();
        let calibration = Arc::new(MagnetometerCalibration::new(config.clone(), Arc::new(sender)));
        let events = Arc::new(LinkEventNotifier::new(config.event_channel_capacity));

        Ok(VehicleSession {
            config,
            link,
            calibration,
            events,
            outgoing,
            shutdown: Arc::new(watch::channel(false).0),
        })
    }

    pub fn shutdown_handle(&self) -> SessionShutdown {
        SessionShutdown {
            requested: self.shutdown.clone(),
        }
    }

    pub fn calibration(&self) -> Arc<MagnetometerCalibration> {
        self.calibration.clone()
    }

    pub fn link_events(&self) -> Arc<LinkEventNotifier> {
        self.events.clone()
    }

    pub fn local_addr(&self) -> anyhow::Result<SocketAddr> {
        self.link.local_addr()
    }

    /// Runs until shutdown is requested or the link's socket fails. Either way, the session ends
    ///  with [LinkEvent::Disconnected] and the calibration is cancelled, like for any other loss
    ///  of the link.
    pub async fn run(self) -> anyhow::Result<()> {
        let VehicleSession { config, link, calibration, events, mut outgoing, shutdown } = self;
        let shutdown_requested = shutdown.subscribe();

        let (heartbeat_send, heartbeat_recv) = mpsc::channel(16);
        let handler = Arc::new(VehicleMessageHandler {
            target_system: config.target_system,
            calibration: calibration.clone(),
            heartbeats: heartbeat_send,
        });

        let bridge_events = events.subscribe();
        events.send_event(LinkEvent::Connected);
        info!("vehicle session started on {:?}", link.local_addr()?);

        let result = select! {
            r = link.recv_loop(handler) => r,
            _ = link.send_loop(&mut outgoing) => Ok(()),
            r = run_heartbeat_watchdog(config.clone(), heartbeat_recv, events.clone()) => r,
            _ = run_lifecycle_bridge(calibration.clone(), bridge_events) => Ok(()),
            _ = wait_for_shutdown(shutdown_requested) => Ok(()),
        };

        info!("vehicle session ended");
        events.send_event(LinkEvent::Disconnected);
        calibration.on_link_event(&LinkEvent::Disconnected);
        link.flush(&mut outgoing).await;
        result
    }
}

async fn wait_for_shutdown(mut requested: watch::Receiver<bool>) {
    let _ = requested.wait_for(|&r| r).await;
}

struct VehicleMessageHandler {
    target_system: u8,
    calibration: Arc<MagnetometerCalibration>,
    heartbeats: mpsc::Sender<Heartbeat>,
}

#[async_trait]
impl MessageHandler for VehicleMessageHandler {
    async fn on_message(&self, packet: &MavPacket, message: AnyMessage) {
        if packet.sysid != self.target_system {
            trace!("ignoring {:?} from system {}", packet, packet.sysid);
            return;
        }

        match message {
            AnyMessage::Heartbeat(heartbeat) => {
                if self.heartbeats.send(heartbeat).await.is_err() {
                    debug!("heartbeat watchdog is gone - ignoring heartbeat");
                }
            }
            msg @ (AnyMessage::MagCalProgress(_) | AnyMessage::MagCalReport(_)) => {
                self.calibration.process_calibration_message(&msg);
            }
            other => {
                trace!("no handler for {:?}", other);
            }
        }
    }
}

#[cfg(test)]
mod test {
    use std::str::FromStr;
    use std::time::Duration;

    use bytes::BytesMut;
    use tokio::net::UdpSocket;

    use crate::calibration::commands::{MAV_CMD_DO_CANCEL_MAG_CAL, MAV_CMD_DO_START_MAG_CAL};
    use crate::messaging::message::Message;
    use crate::messaging::messages::CommandLong;
    use crate::test_util::message::{test_heartbeat, test_progress};
    use crate::test_util::sender::TrackingPacketSender;

    use super::*;

    fn config() -> MavConfig {
        MavConfig::new(SocketAddr::from_str("127.0.0.1:0").unwrap())
    }

    fn packet_from(sysid: u8, msg: &impl Message) -> MavPacket {
        let mut packet = msg.pack().unwrap();
        packet.sysid = sysid;
        packet
    }

    #[tokio::test]
    async fn test_handler_dispatch() {
        let config = Arc::new(config());
        let calibration = Arc::new(MagnetometerCalibration::new(config.clone(), Arc::new(TrackingPacketSender::new())));
        let (send, mut recv) = mpsc::channel(4);
        let handler = VehicleMessageHandler {
            target_system: 1,
            calibration: calibration.clone(),
            heartbeats: send,
        };

        handler.on_message(&packet_from(1, &test_progress(2, 5)), AnyMessage::MagCalProgress(test_progress(2, 5))).await;
        handler.on_message(&packet_from(9, &test_progress(3, 5)), AnyMessage::MagCalProgress(test_progress(3, 5))).await;
        handler.on_message(&packet_from(1, &test_heartbeat()), AnyMessage::Heartbeat(test_heartbeat())).await;
        handler.on_message(&packet_from(9, &test_heartbeat()), AnyMessage::Heartbeat(test_heartbeat())).await;

        assert!(calibration.entry(2).is_some());
        assert!(calibration.entry(3).is_none());
        assert_eq!(recv.try_recv().unwrap(), test_heartbeat());
        assert!(recv.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_session_round_trip() {
        let session = VehicleSession::connect(Arc::new(config())).await.unwrap();
        let calibration = session.calibration();
        let gcs_addr = session.local_addr().unwrap();
        let mut link_events = session.link_events().subscribe();
        let session_task = tokio::spawn(session.run());

        let vehicle = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut buf = BytesMut::new();
        packet_from(1, &test_heartbeat()).ser(&mut buf).unwrap();
        packet_from(1, &test_progress(3, 25)).with_seq(1).ser(&mut buf).unwrap();
        vehicle.send_to(&buf, gcs_addr).await.unwrap();

        for _ in 0..100 {
            if calibration.entry(3).is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(calibration.entry(3).unwrap().progress, Some(test_progress(3, 25)));
        assert_eq!(link_events.recv().await.unwrap(), LinkEvent::Connected);
        assert_eq!(link_events.recv().await.unwrap(), LinkEvent::HeartbeatFirst);

        calibration.start_calibration(false, true, 0).unwrap();

        let mut datagram = [0u8; 512];
        let (n, _) = tokio::time::timeout(Duration::from_secs(5), vehicle.recv_from(&mut datagram)).await.unwrap().unwrap();
        let mut packet = MavPacket::try_read(&mut &datagram[..n]).unwrap();
        assert_eq!(packet.sysid, 255);
        let command = CommandLong::unpack(&mut packet.payload).unwrap();
        assert_eq!(command.command, MAV_CMD_DO_START_MAG_CAL);
        assert_eq!(command.param3, 1.0);

        session_task.abort();
    }

    #[tokio::test]
    async fn test_shutdown_disconnects_and_cancels() {
        let vehicle = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let mut config = config();
        config.vehicle_addr = Some(vehicle.local_addr().unwrap());

        let session = VehicleSession::connect(Arc::new(config)).await.unwrap();
        let calibration = session.calibration();
        let shutdown = session.shutdown_handle();
        let mut link_events = session.link_events().subscribe();
        let session_task = tokio::spawn(session.run());

        assert_eq!(link_events.recv().await.unwrap(), LinkEvent::Connected);
        assert!(!calibration.is_cancelled());

        shutdown.shutdown();
        tokio::time::timeout(Duration::from_secs(5), session_task).await.unwrap().unwrap().unwrap();

        assert_eq!(link_events.recv().await.unwrap(), LinkEvent::Disconnected);
        assert!(calibration.is_cancelled());

        let mut datagram = [0u8; 512];
        let (n, _) = tokio::time::timeout(Duration::from_secs(5), vehicle.recv_from(&mut datagram)).await.unwrap().unwrap();
        let mut packet = MavPacket::try_read(&mut &datagram[..n]).unwrap();
        let command = CommandLong::unpack(&mut packet.payload).unwrap();
        assert_eq!(command.command, MAV_CMD_DO_CANCEL_MAG_CAL);
    }

    #[tokio::test]
    async fn test_shutdown_before_run() {
        let session = VehicleSession::connect(Arc::new(config())).await.unwrap();
        let calibration = session.calibration();
        session.shutdown_handle().shutdown();

        tokio::time::timeout(Duration::from_secs(5), session.run()).await.unwrap().unwrap();
        assert!(calibration.is_cancelled());
    }
}
