#[cfg(test)] use mockall::automock;

use crate::messaging::messages::{MagCalProgress, MagCalReport};

/// Receives calibration updates from [crate::calibration::tracker::MagnetometerCalibration].
///  Callbacks run synchronously on the thread that delivered the message (or raised the
///  cancellation), so they should return quickly.
#[cfg_attr(test, automock)]
pub trait CalibrationListener: Send + Sync {
    fn on_calibration_cancelled(&self);

    fn on_calibration_progress(&self, progress: &MagCalProgress);

    fn on_calibration_completed(&self, report: &MagCalReport);
}
