//! The message catalog: the messages the calibration workflow exchanges with a vehicle, plus
//!  CHANGE_OPERATOR_CONTROL. Field lists are in wire order (MAVLink sorts fields by size), which
//!  is not necessarily the order of the protocol's XML definitions.

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::mav_message;
use crate::messaging::codec_error::CodecError;
use crate::messaging::message::Message;
use crate::messaging::packet::MavPacket;
use crate::messaging::schema::{get_string_field, set_string_field, MessageSchema};

mav_message! {
    /// Sent periodically by every component to signal presence; the link's liveness is derived
    ///  from it.
    Heartbeat, "HEARTBEAT", id: 0, crc_extra: 50, {
        custom_mode: u32,
        mav_type: u8,
        autopilot: u8,
        base_mode: u8,
        system_status: u8,
        mavlink_version: u8,
    }
}

mav_message! {
    /// Request to control this MAV
    ChangeOperatorControl, "CHANGE_OPERATOR_CONTROL", id: 5, crc_extra: 217, {
        /// System the GCS requests control for
        target_system: u8,
        /// 0: request control of this MAV, 1: release control of this MAV
        control_request: u8,
        /// 0: key as plaintext, 1-255: hashing / encryption variants
        version: u8,
        /// ASCII, null padded; use [ChangeOperatorControl::set_passkey] and
        ///  [ChangeOperatorControl::passkey] to access it as text
        passkey: [u8; 25],
    }
}

impl ChangeOperatorControl {
    pub fn set_passkey(&mut self, passkey: &str) {
        set_string_field(&mut self.passkey, passkey);
    }

    pub fn passkey(&self) -> String {
        get_string_field(&self.passkey)
    }
}

mav_message! {
    /// Generic command with up to seven float parameters
    CommandLong, "COMMAND_LONG", id: 76, crc_extra: 152, {
        param1: f32,
        param2: f32,
        param3: f32,
        param4: f32,
        param5: f32,
        param6: f32,
        param7: f32,
        command: u16,
        target_system: u8,
        target_component: u8,
        /// 0 for the first transmission, incremented for retransmissions
        confirmation: u8,
    }
}

mav_message! {
    /// Progress of an ongoing magnetometer calibration, reported per compass
    MagCalProgress, "MAG_CAL_PROGRESS", id: 191, crc_extra: 92, {
        direction_x: f32,
        direction_y: f32,
        direction_z: f32,
        compass_id: u8,
        /// bitmask of compasses being calibrated
        cal_mask: u8,
        cal_status: u8,
        /// attempt number, starting at 1
        attempt: u8,
        completion_pct: u8,
        /// bitmask of the sphere sections that have been sampled
        completion_mask: [u8; 10],
    }
}

impl MagCalProgress {
    pub fn status(&self) -> Option<MagCalStatus> {
        MagCalStatus::try_from(self.cal_status).ok()
    }
}

mav_message! {
    /// Result of a finished magnetometer calibration for one compass
    MagCalReport, "MAG_CAL_REPORT", id: 192, crc_extra: 36, {
        /// RMS milligauss residuals
        fitness: f32,
        ofs_x: f32,
        ofs_y: f32,
        ofs_z: f32,
        diag_x: f32,
        diag_y: f32,
        diag_z: f32,
        offdiag_x: f32,
        offdiag_y: f32,
        offdiag_z: f32,
        compass_id: u8,
        cal_mask: u8,
        cal_status: u8,
        /// 0 if the calibration must still be accepted, 1 if it was saved automatically
        autosaved: u8,
    }
}

impl MagCalReport {
    pub fn status(&self) -> Option<MagCalStatus> {
        MagCalStatus::try_from(self.cal_status).ok()
    }
}

#[repr(u8)]
#[derive(Debug, Copy, Clone, Eq, PartialEq, TryFromPrimitive, IntoPrimitive)]
pub enum MagCalStatus {
    NotStarted = 0,
    WaitingToStart = 1,
    RunningStepOne = 2,
    RunningStepTwo = 3,
    Success = 4,
    Failed = 5,
}

const CATALOG: [&MessageSchema; 5] = [
    Heartbeat::SCHEMA,
    ChangeOperatorControl::SCHEMA,
    CommandLong::SCHEMA,
    MagCalProgress::SCHEMA,
    MagCalReport::SCHEMA,
];

pub fn schema_for(msgid: u8) -> Option<&'static MessageSchema> {
    CATALOG.iter()
        .find(|s| s.id == msgid)
        .copied()
}

pub fn crc_extra_for(msgid: u8) -> Option<u8> {
    schema_for(msgid)
        .map(|s| s.crc_extra)
}

/// Any message of the catalog, as it is dispatched on the receiving side
#[derive(Debug, Clone, PartialEq)]
pub enum AnyMessage {
    Heartbeat(Heartbeat),
    ChangeOperatorControl(ChangeOperatorControl),
    CommandLong(CommandLong),
    MagCalProgress(MagCalProgress),
    MagCalReport(MagCalReport),
}

impl AnyMessage {
    pub fn msgid(&self) -> u8 {
        match self {
            AnyMessage::Heartbeat(_) => Heartbeat::SCHEMA.id,
            AnyMessage::ChangeOperatorControl(_) => ChangeOperatorControl::SCHEMA.id,
            AnyMessage::CommandLong(_) => CommandLong::SCHEMA.id,
            AnyMessage::MagCalProgress(_) => MagCalProgress::SCHEMA.id,
            AnyMessage::MagCalReport(_) => MagCalReport::SCHEMA.id,
        }
    }

    /// Decodes a packet's payload based on its message id. The packet's length must match the
    ///  message's schema exactly, surplus bytes are not ignored.
    pub fn decode(packet: &mut MavPacket) -> anyhow::Result<AnyMessage> {
        let schema = schema_for(packet.msgid)
            .ok_or(CodecError::UnknownMessageId(packet.msgid))?;
        if packet.len as usize != schema.payload_len() {
            return Err(CodecError::LengthMismatch {
                msgid: packet.msgid,
                expected: schema.payload_len(),
                actual: packet.len as usize,
            }.into());
        }

        let payload = &mut packet.payload;
        let msg = match packet.msgid {
            0 => AnyMessage::Heartbeat(Heartbeat::unpack(payload)?),
            5 => AnyMessage::ChangeOperatorControl(ChangeOperatorControl::unpack(payload)?),
            76 => AnyMessage::CommandLong(CommandLong::unpack(payload)?),
            191 => AnyMessage::MagCalProgress(MagCalProgress::unpack(payload)?),
            192 => AnyMessage::MagCalReport(MagCalReport::unpack(payload)?),
            msgid => return Err(CodecError::UnknownMessageId(msgid).into()),
        };
        Ok(msg)
    }

    pub fn pack(&self) -> anyhow::Result<MavPacket> {
        match self {
            AnyMessage::Heartbeat(m) => m.pack(),
            AnyMessage::ChangeOperatorControl(m) => m.pack(),
            AnyMessage::CommandLong(m) => m.pack(),
            AnyMessage::MagCalProgress(m) => m.pack(),
            AnyMessage::MagCalReport(m) => m.pack(),
        }
    }
}
