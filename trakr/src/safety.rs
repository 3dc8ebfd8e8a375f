//! Safety envelope enforced by the robot controller.
//!
//! Nothing here is enforced locally. The envelope is configuration data: it
//! is validated before submission and marshalled to the controller, which
//! trips the corresponding safety when a limit or heartbeat is violated.
//!
//! Local field names differ from the wire names in several places (for
//! example `check_joints` is `enable_CAN` on the wire). The mapping lives in
//! [`crate::protocol::marshal`] and is part of the protocol contract.

use thiserror::Error;

use crate::data::{JointVector, NDOF};

/// Lower joint position bounds (rad), per leg: hip, thigh, knee.
pub const JPOS_LIMIT_MIN: JointVector = [
    -0.785, -1.57, -3.20, //
    -0.785, -1.57, -3.20, //
    -0.785, -1.57, -3.20, //
    -0.785, -1.57, -3.20,
];

/// Upper joint position bounds (rad), per leg: hip, thigh, knee.
pub const JPOS_LIMIT_MAX: JointVector = [
    0.785, 3.5, 0.0, //
    0.785, 3.5, 0.0, //
    0.785, 3.5, 0.0, //
    0.785, 3.5, 0.0,
];

/// Default joint velocity limit (rad/s).
pub const BASE_VEL_LIMIT: f64 = 40.0;

/// Hard joint torque ceiling of the actuators (N·m).
pub const BASE_TORQUE_LIMIT: f64 = 50.0;

/// Default joint torque and torque-derivative limit (N·m).
pub const BASE_TORQUE_RECOMMENDED: f64 = 40.0;

/// Default joint-channel heartbeat timeout (ms).
pub const JOINTS_TIMEOUT_MS: i32 = 100;

/// Default IMU heartbeat timeout (ms).
pub const IMU_TIMEOUT_MS: i32 = 200;

/// Errors reported by [`SafetyConfig::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum SafetyError {
    /// A joint's lower position bound exceeds its upper bound.
    #[error("joint {joint}: position min {min} exceeds max {max}")]
    InvertedBounds { joint: usize, min: f64, max: f64 },
    /// An enabled joint limit is zero, negative or NaN.
    #[error("joint {joint}: {field} must be positive, got {value}")]
    NonPositiveLimit {
        field: &'static str,
        joint: usize,
        value: f64,
    },
    /// An enabled torso limit is zero, negative or NaN.
    #[error("torso {field} must be positive, got {value}")]
    NonPositiveTorsoLimit { field: &'static str, value: f64 },
    /// An enabled heartbeat check has a non-positive timeout.
    #[error("{field} must be positive, got {value} ms")]
    NonPositiveTimeout { field: &'static str, value: i32 },
}

/// Per-joint position, velocity, torque and torque-rate limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointSafetyConfig {
    pub enabled: bool,
    pub check_jpos: bool,
    pub check_jvel: bool,
    pub check_jtor: bool,
    pub check_dtor: bool,
    pub lim_jpos_min: JointVector,
    pub lim_jpos_max: JointVector,
    pub lim_jvel: JointVector,
    pub lim_jtor: JointVector,
    pub lim_dtor: JointVector,
}

impl Default for JointSafetyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_jpos: true,
            check_jvel: true,
            check_jtor: true,
            check_dtor: true,
            lim_jpos_min: JPOS_LIMIT_MIN,
            lim_jpos_max: JPOS_LIMIT_MAX,
            lim_jvel: [BASE_VEL_LIMIT; NDOF],
            lim_jtor: [BASE_TORQUE_RECOMMENDED; NDOF],
            lim_dtor: [BASE_TORQUE_RECOMMENDED; NDOF],
        }
    }
}

impl JointSafetyConfig {
    fn validate(&self) -> Result<(), SafetyError> {
        for joint in 0..NDOF {
            let (min, max) = (self.lim_jpos_min[joint], self.lim_jpos_max[joint]);
            // `!(min <= max)` also rejects NaN bounds.
            if !(min <= max) {
                return Err(SafetyError::InvertedBounds { joint, min, max });
            }
        }

        if !self.enabled {
            return Ok(());
        }

        let checks = [
            (self.check_jvel, "lim_jvel", &self.lim_jvel),
            (self.check_jtor, "lim_jtor", &self.lim_jtor),
            (self.check_dtor, "lim_dtor", &self.lim_dtor),
        ];
        for (field, limits) in checks
            .into_iter()
            .filter_map(|(on, field, limits)| on.then_some((field, limits)))
        {
            if let Some((joint, &value)) = limits.iter().enumerate().find(|(_, v)| !(**v > 0.0)) {
                return Err(SafetyError::NonPositiveLimit {
                    field,
                    joint,
                    value,
                });
            }
        }

        Ok(())
    }
}

/// Liveness checks on the joint (CAN) and IMU channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HeartbeatConfig {
    pub enabled: bool,
    pub check_joints: bool,
    /// Joint-channel timeout in milliseconds.
    pub joints_timeout: i32,
    pub check_imu: bool,
    /// IMU timeout in milliseconds.
    pub imu_timeout: i32,
}

impl Default for HeartbeatConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_joints: true,
            joints_timeout: JOINTS_TIMEOUT_MS,
            check_imu: true,
            imu_timeout: IMU_TIMEOUT_MS,
        }
    }
}

impl HeartbeatConfig {
    fn validate(&self) -> Result<(), SafetyError> {
        if !self.enabled {
            return Ok(());
        }
        if self.check_joints && self.joints_timeout <= 0 {
            return Err(SafetyError::NonPositiveTimeout {
                field: "joints_timeout",
                value: self.joints_timeout,
            });
        }
        if self.check_imu && self.imu_timeout <= 0 {
            return Err(SafetyError::NonPositiveTimeout {
                field: "imu_timeout",
                value: self.imu_timeout,
            });
        }
        Ok(())
    }
}

/// Torso attitude and angular-rate limits.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TorsoSafetyConfig {
    pub enabled: bool,
    pub check_roll: bool,
    /// rad
    pub roll_limit: f64,
    pub check_pitch: bool,
    /// rad
    pub pitch_limit: f64,
    pub check_gyro: bool,
    /// rad/s
    pub gyro_limit: f64,
}

impl Default for TorsoSafetyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            check_roll: true,
            roll_limit: 1.2,
            check_pitch: true,
            pitch_limit: 1.2,
            check_gyro: false,
            gyro_limit: 5.0,
        }
    }
}

impl TorsoSafetyConfig {
    fn validate(&self) -> Result<(), SafetyError> {
        if !self.enabled {
            return Ok(());
        }
        let checks = [
            (self.check_roll, "roll_limit", self.roll_limit),
            (self.check_pitch, "pitch_limit", self.pitch_limit),
            (self.check_gyro, "gyro_limit", self.gyro_limit),
        ];
        for (on, field, value) in checks {
            if on && !(value > 0.0) {
                return Err(SafetyError::NonPositiveTorsoLimit { field, value });
            }
        }
        Ok(())
    }
}

/// The complete safety envelope.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SafetyConfig {
    pub joint: JointSafetyConfig,
    pub heartbeat: HeartbeatConfig,
    pub torso: TorsoSafetyConfig,
}

macro_rules! toggles {
    ($($ty:ty),+) => {
        $(
            impl $ty {
                pub fn enable(&mut self) {
                    self.enabled = true;
                }

                pub fn disable(&mut self) {
                    self.enabled = false;
                }
            }
        )+
    };
}

toggles!(JointSafetyConfig, HeartbeatConfig, TorsoSafetyConfig);

impl SafetyConfig {
    pub fn disable_all(&mut self) {
        self.joint.disable();
        self.heartbeat.disable();
        self.torso.disable();
    }

    /// Checks the envelope invariants.
    ///
    /// Position bounds must satisfy `min <= max` for every joint. Limits and
    /// timeouts belonging to an enabled check must be strictly positive.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> Result<(), SafetyError> {
        self.joint.validate()?;
        self.heartbeat.validate()?;
        self.torso.validate()
    }
}
