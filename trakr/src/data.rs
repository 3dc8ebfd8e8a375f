//! Continuous command and telemetry streams exchanged with the robot.
//!
//! [`Plan`] flows client → robot every tick, [`State`] flows robot → client.
//! Values are SI units: radians, rad/s, N·m for joints; metres and m/s for
//! the torso.

/// Number of actuated joints (4 legs × hip/thigh/knee).
pub const NDOF: usize = 12;

/// One value per joint, ordered leg by leg (hip, thigh, knee).
pub type JointVector = [f64; NDOF];

/// Six-component torso vector.
pub type Vector6 = [f64; 6];

pub type Vector3 = [f64; 3];

/// Joint-space command or feedback.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct JointState {
    pub pos: JointVector,
    pub vel: JointVector,
    pub tor: JointVector,
    pub kp: JointVector,
    pub kd: JointVector,
}

/// Cartesian torso command or EKF estimate.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TorsoState {
    pub pos: Vector6,
    pub vel: Vector6,
}

impl TorsoState {
    /// Euclidean norm of the torso velocity vector.
    #[must_use]
    pub fn speed(&self) -> f64 {
        self.vel.iter().map(|v| v * v).sum::<f64>().sqrt()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ImuState {
    pub acc: Vector3,
    pub gyro: Vector3,
    pub mag: Vector3,
    pub euler: Vector3,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BatteryState {
    pub voltage: f64,
    pub current: f64,
}

/// Desired command sent to the robot each tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Plan {
    /// High-level commands.
    pub torso: TorsoState,
    /// Low-level commands.
    pub joint: JointState,
}

/// Telemetry decoded from the robot each tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct State {
    pub torso: TorsoState,
    pub joint: JointState,
    pub imu: ImuState,
    pub power: BatteryState,
    /// Raw config-status register as decoded from the wire.
    ///
    /// Negative values are bring-up sentinels; see
    /// [`ConfigStatus`](crate::protocol::ConfigStatus) for the steady-state
    /// interpretation.
    pub status: i32,
}
