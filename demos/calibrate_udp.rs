use std::net::SocketAddr;
use std::sync::Arc;

use clap::Parser;
use clap_derive::Parser;
use tracing::{error, info, warn, Level};

use mavcal::calibration::listener::CalibrationListener;
use mavcal::config::MavConfig;
use mavcal::link::LinkEvent;
use mavcal::messaging::messages::{MagCalProgress, MagCalReport};
use mavcal::session::VehicleSession;

#[derive(Parser)]
struct Args {
    /// local address to listen on, e.g. 0.0.0.0:14550
    bind_address: String,

    /// vehicle address; learned from the first datagram if omitted
    #[clap(long)]
    vehicle: Option<String>,

    #[clap(long, default_value_t = 1)]
    target_system: u8,

    #[clap(long, default_value_t = false)]
    retry: bool,

    #[clap(long, default_value_t = false)]
    autosave: bool,

    /// seconds before the vehicle starts sampling
    #[clap(long, default_value_t = 0)]
    delay: u16,

    #[clap(short, long, default_value_t = false)]
    verbose: bool,

    #[clap(long, default_value_t = false)]
    very_verbose: bool,
}

struct PrintingListener;

impl CalibrationListener for PrintingListener {
    fn on_calibration_cancelled(&self) {
        warn!("calibration cancelled");
    }

    fn on_calibration_progress(&self, progress: &MagCalProgress) {
        info!("compass {}: {}% ({:?}, attempt {})", progress.compass_id, progress.completion_pct, progress.status(), progress.attempt);
    }

    fn on_calibration_completed(&self, report: &MagCalReport) {
        info!("compass {} done: {:?}, fitness {}, offsets ({}, {}, {}), autosaved: {}",
            report.compass_id, report.status(), report.fitness, report.ofs_x, report.ofs_y, report.ofs_z, report.autosaved != 0);
    }
}

#[tokio::main]
pub async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let level = match (args.verbose, args.very_verbose) {
        (_, true) => Level::TRACE,
        (true, _) => Level::DEBUG,
        (false, false) => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_max_level(level)
        .try_init()
        .ok();

    let bind_addr: SocketAddr = args.bind_address.parse()?;
    let mut config = MavConfig::new(bind_addr);
    config.target_system = args.target_system;
    if let Some(vehicle) = &args.vehicle {
        config.vehicle_addr = Some(vehicle.parse()?);
    }

    let session = VehicleSession::connect(Arc::new(config)).await?;
    let calibration = session.calibration();
    calibration.set_listener(Some(Arc::new(PrintingListener)));
    let mut link_events = session.link_events().subscribe();
    let shutdown = session.shutdown_handle();

    let session_task = tokio::spawn(session.run());

    info!("waiting for a vehicle heartbeat");
    loop {
        match link_events.recv().await? {
            LinkEvent::HeartbeatFirst => break,
            evt => info!("link event: {:?}", evt),
        }
    }

    info!("starting magnetometer calibration");
    calibration.start_calibration(args.retry, args.autosave, args.delay)?;

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("interrupted - shutting down, which cancels the calibration");
            shutdown.shutdown();
        }
    });

    if let Err(e) = session_task.await? {
        error!("session failed: {}", e);
    }
    Ok(())
}
