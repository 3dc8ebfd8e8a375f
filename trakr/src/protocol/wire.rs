//! Logical wire records exchanged with the robot controller.
//!
//! Field names follow the controller's schema verbatim, including the
//! mixed-case heartbeat fields (`enable_CAN`, `CAN_timeout`, ...). They are
//! a compatibility contract, not a naming choice. Byte encoding is left to
//! the [`Transport`](crate::net::Transport) implementation.
//!
//! ```text
//! client ──WirePlan──▶ robot     torso, joint, config (status = request flag)
//! client ◀─WireState── robot     torso, joint, imu, power, config (status = ack)
//! ```

use serde::{Deserialize, Serialize};

use crate::data::NDOF;

/// Status register value before any telemetry has been decoded.
pub const STATUS_UNKNOWN: i32 = -1;

/// Status register value asking the client to resubmit its configuration.
pub const STATUS_RESUBMIT: i32 = -2;

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireTorso {
    pub pos: [f32; 6],
    pub vel: [f32; 6],
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireJoint {
    pub pos: [f32; NDOF],
    pub vel: [f32; NDOF],
    pub tor: [f32; NDOF],
    pub kp: [f32; NDOF],
    pub kd: [f32; NDOF],
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireImu {
    pub acc: [f32; 3],
    pub gyro: [f32; 3],
    pub mag: [f32; 3],
    pub euler: [f32; 3],
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireBattery {
    pub voltage: f32,
    pub current: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireMaster {
    pub shutdown: bool,
    pub exit: bool,
    pub killed: bool,
}

/// `{type, seq}` pair shared by the gesture and strategy selections.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireMotionBase {
    #[serde(rename = "type")]
    pub kind: i32,
    pub seq: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireMotion {
    pub planner: i32,
    pub sequence: WireMotionBase,
    pub strategy: WireMotionBase,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireJointSafety {
    pub enabled: bool,
    pub jpos: bool,
    pub jvel: bool,
    pub jtor: bool,
    pub dtor: bool,
    pub lim_jpos_min: [f32; NDOF],
    pub lim_jpos_max: [f32; NDOF],
    pub lim_jvel: [f32; NDOF],
    pub lim_jtor: [f32; NDOF],
    pub lim_dtor: [f32; NDOF],
}

#[allow(non_snake_case)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WireHeartbeat {
    pub enabled: bool,
    pub init_disable_time: i32,
    pub enable_CAN: bool,
    pub CAN_timeout: i32,
    pub observe_jpos: bool,
    pub observe_jvel: bool,
    pub observe_jtor: bool,
    pub enable_IMU: bool,
    pub IMU_timeout: i32,
    pub observe_accel: bool,
    pub observe_gyro: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireTorsoSafety {
    pub enabled: bool,
    pub observe_roll: bool,
    pub roll_limit: f32,
    pub observe_pitch: bool,
    pub pitch_limit: f32,
    pub observe_gyro: bool,
    pub gyro_limit: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireSafety {
    pub llsafety: WireJointSafety,
    pub llheartbeat: WireHeartbeat,
    pub torso: WireTorsoSafety,
}

/// Configuration block carried in both directions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WireConfig {
    /// Request flag (client → robot) or acknowledgement (robot → client).
    pub status: i32,
    pub master: WireMaster,
    pub motion: WireMotion,
    pub safety: WireSafety,
}

impl Default for WireConfig {
    fn default() -> Self {
        Self {
            status: STATUS_UNKNOWN,
            master: WireMaster::default(),
            motion: WireMotion::default(),
            safety: WireSafety::default(),
        }
    }
}

/// Command packet, client → robot.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WirePlan {
    pub torso: WireTorso,
    pub joint: WireJoint,
    pub config: WireConfig,
}

/// Telemetry packet, robot → client.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct WireState {
    pub torso: WireTorso,
    pub joint: WireJoint,
    pub imu: WireImu,
    pub power: WireBattery,
    pub config: WireConfig,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_records_start_unknown() {
        assert_eq!(WireState::default().config.status, STATUS_UNKNOWN);
        assert_eq!(WirePlan::default().config.status, STATUS_UNKNOWN);
    }

    #[test]
    fn records_fit_a_datagram() {
        let mut buf = [0u8; 2048];
        let state = postcard::to_slice(&WireState::default(), &mut buf).unwrap().len();
        let mut buf = [0u8; 2048];
        let plan = postcard::to_slice(&WirePlan::default(), &mut buf).unwrap().len();
        assert!(state < 1472 && plan < 1472, "state {state} plan {plan}");
    }
}
