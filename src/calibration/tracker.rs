use std::fmt::{Debug, Formatter};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use rustc_hash::FxHashMap;
use tracing::{debug, info, trace};

use crate::calibration::commands::{accept_mag_cal, cancel_mag_cal, start_mag_cal};
use crate::calibration::listener::CalibrationListener;
use crate::config::MavConfig;
use crate::messaging::message::Message;
use crate::messaging::messages::{AnyMessage, CommandLong, MagCalProgress, MagCalReport};
use crate::messaging::sender::PacketSender;

/// The latest calibration state reported for a single compass. Both slots are replaced by newer
///  messages, they are never merged.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CalibrationEntry {
    pub progress: Option<MagCalProgress>,
    pub report: Option<MagCalReport>,
}

/// Tracks a magnetometer calibration run on the vehicle, per compass.
///
/// There is no explicit run object: the state of a run is the set of per-compass entries plus a
///  cancellation flag. Starting a run clears both; entries are created lazily for every compass
///  id that reports, and they survive cancellation.
///
/// Commands are fire-and-forget, and nothing here checks whether a run is actually in progress:
///  cancelling or accepting without a run still sends the command (and cancelling still sets the
///  flag and notifies the listener).
pub struct MagnetometerCalibration {
    config: Arc<MavConfig>,
    sender: Arc<dyn PacketSender>,
    entries: Mutex<FxHashMap<u8, CalibrationEntry>>,
    listener: RwLock<Option<Arc<dyn CalibrationListener>>>,
    cancelled: AtomicBool,
}

impl Debug for MagnetometerCalibration {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "MagnetometerCalibration{{cancelled:{}}}", self.is_cancelled())
    }
}

impl MagnetometerCalibration {
    pub fn new(config: Arc<MavConfig>, sender: Arc<dyn PacketSender>) -> MagnetometerCalibration {
        MagnetometerCalibration {
            config,
            sender,
            entries: Default::default(),
            listener: Default::default(),
            cancelled: AtomicBool::new(false),
        }
    }

    /// Registers the listener, silently replacing a previous one. `None` removes it.
    pub fn set_listener(&self, listener: Option<Arc<dyn CalibrationListener>>) {
        *self.listener.write().unwrap_or_else(PoisonError::into_inner) = listener;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::Acquire)
    }

    pub fn entry(&self, compass_id: u8) -> Option<CalibrationEntry> {
        self.lock_entries()
            .get(&compass_id)
            .cloned()
    }

    pub fn entries(&self) -> FxHashMap<u8, CalibrationEntry> {
        self.lock_entries().clone()
    }

    /// Starts a new run, discarding everything known about the previous one. Overlapping starts
    ///  are not serialized, callers must not issue them.
    pub fn start_calibration(&self, retry_on_failure: bool, save_automatically: bool, start_delay: u16) -> anyhow::Result<()> {
        info!("starting magnetometer calibration (retry: {}, autosave: {}, delay: {}s)", retry_on_failure, save_automatically, start_delay);

        self.lock_entries().clear();
        self.cancelled.store(false, Ordering::Release);

        self.send_command(start_mag_cal(self.config.target_system, self.config.target_component, retry_on_failure, save_automatically, start_delay))
    }

    /// Flag and listener are updated even if sending the command fails; the send error is
    ///  returned afterwards.
    pub fn cancel_calibration(&self) -> anyhow::Result<()> {
        info!("cancelling magnetometer calibration");

        let send_result = self.send_command(cancel_mag_cal(self.config.target_system, self.config.target_component));

        self.cancelled.store(true, Ordering::Release);

        if let Some(listener) = self.current_listener() {
            listener.on_calibration_cancelled();
        }
        send_result
    }

    pub fn accept_calibration(&self) -> anyhow::Result<()> {
        info!("accepting magnetometer calibration");
        self.send_command(accept_mag_cal(self.config.target_system, self.config.target_component))
    }

    /// Consumes calibration telemetry; every other message is ignored.
    pub fn process_calibration_message(&self, message: &AnyMessage) {
        match message {
            AnyMessage::MagCalProgress(progress) => {
                trace!("compass {}: {}% complete", progress.compass_id, progress.completion_pct);
                self.lock_entries()
                    .entry(progress.compass_id)
                    .or_default()
                    .progress = Some(progress.clone());

                if let Some(listener) = self.current_listener() {
                    listener.on_calibration_progress(progress);
                }
            }
            AnyMessage::MagCalReport(report) => {
                debug!("compass {}: calibration finished with status {:?}, fitness {}", report.compass_id, report.status(), report.fitness);
                self.lock_entries()
                    .entry(report.compass_id)
                    .or_default()
                    .report = Some(report.clone());

                if let Some(listener) = self.current_listener() {
                    listener.on_calibration_completed(report);
                }
            }
            _ => {}
        }
    }

    fn send_command(&self, command: CommandLong) -> anyhow::Result<()> {
        self.sender.send_packet(command.pack()?)
    }

    fn current_listener(&self) -> Option<Arc<dyn CalibrationListener>> {
        self.listener.read().unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock_entries(&self) -> MutexGuard<'_, FxHashMap<u8, CalibrationEntry>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
