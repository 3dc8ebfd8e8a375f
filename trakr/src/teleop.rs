//! Operator command table.
//!
//! Numeric operator codes map to [`TeleopCommand`]s. Unknown codes stop the
//! robot. Velocity commands write the torso velocity vector: yaw rate in
//! `vel[2]`, lateral in `vel[3]`, forward in `vel[4]`.

use crate::config::{ConfigSet, Gait, GestureType, MotionMode, TaskType};
use crate::data::Plan;
use crate::protocol::marshal::GAIT_TROT_THRESHOLD;

pub const FORWARD_VEL: f64 = 0.3;
pub const FORWARD_RUN: f64 = 0.6;
pub const FORWARD_DASH: f64 = 0.8;
pub const FORWARD_NEXT: f64 = 1.0;
pub const BACKWARD_VEL: f64 = -0.3;
/// Walking in place: just above the stance threshold.
pub const TROT_VEL: f64 = GAIT_TROT_THRESHOLD + 0.001;
pub const RIGHT_VEL: f64 = 0.3;
pub const LEFT_VEL: f64 = -0.3;
pub const SMALL_TURN: f64 = 0.05;
pub const BIG_TURN: f64 = 0.5;

/// Torso velocity component an operator command drives.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Axis {
    Yaw,
    Lateral,
    Forward,
}

impl Axis {
    /// Index into the torso velocity vector.
    #[must_use]
    pub const fn index(self) -> usize {
        match self {
            Self::Yaw => 2,
            Self::Lateral => 3,
            Self::Forward => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum TeleopCommand {
    /// Zero torso velocity.
    Stop,
    /// Replace the velocity vector with a single component.
    Velocity { axis: Axis, value: f64 },
    /// Adjust one component, keeping the rest of the vector.
    Nudge { axis: Axis, value: f64 },
    Gesture(GestureType),
    Strategy(MotionMode),
    Exit,
    Shutdown,
    Kill,
}

impl TeleopCommand {
    /// Lookup table `code → command`. Total: unknown codes are [`Self::Stop`].
    #[must_use]
    pub fn from_code(code: i32) -> Self {
        use Axis::{Forward, Lateral, Yaw};
        use TeleopCommand::{Exit, Gesture, Kill, Nudge, Shutdown, Stop, Strategy, Velocity};

        match code {
            1 => Velocity { axis: Forward, value: FORWARD_VEL },
            2 => Velocity { axis: Forward, value: BACKWARD_VEL },
            3 => Velocity { axis: Forward, value: TROT_VEL },
            4 => Velocity { axis: Lateral, value: RIGHT_VEL },
            5 => Velocity { axis: Lateral, value: LEFT_VEL },
            6 => Nudge { axis: Yaw, value: SMALL_TURN },
            7 => Nudge { axis: Yaw, value: -SMALL_TURN },
            8 => Velocity { axis: Yaw, value: BIG_TURN },
            9 => Velocity { axis: Yaw, value: -BIG_TURN },
            93 => Velocity { axis: Forward, value: FORWARD_RUN },
            94 => Velocity { axis: Forward, value: FORWARD_DASH },
            95 => Velocity { axis: Forward, value: FORWARD_NEXT },
            31 => Gesture(GestureType::Orientation),
            32 => Strategy(MotionMode::Classical),
            33 => Strategy(MotionMode::Ai),
            34 => Strategy(MotionMode::Developer),
            39 => Exit,
            41 => Gesture(GestureType::LeftShakeHand),
            42 => Gesture(GestureType::RightShakeHand),
            90 => Shutdown,
            101 => Kill,
            _ => Stop,
        }
    }

    /// Applies the command to the operator's working copies.
    ///
    /// Returns `true` when `config` was edited and should be submitted.
    pub fn apply(self, plan: &mut Plan, config: &mut ConfigSet) -> bool {
        let vel = &mut plan.torso.vel;
        match self {
            Self::Stop => {
                *vel = [0.0; 6];
                false
            }
            Self::Velocity { axis, value } => {
                *vel = [0.0; 6];
                vel[axis.index()] = value;
                false
            }
            Self::Nudge { axis, value } => {
                vel[axis.index()] = value;
                false
            }
            Self::Gesture(kind) => {
                config.motion.planner = TaskType::Gesture;
                config.motion.sequence.kind = kind;
                true
            }
            Self::Strategy(mode) => {
                config.motion.planner = TaskType::Motion;
                config.motion.strategy.mode = mode;
                if mode == MotionMode::Classical {
                    config.motion.strategy.gait = Gait::Stance;
                }
                true
            }
            Self::Exit => {
                config.master.do_exit();
                true
            }
            Self::Shutdown => {
                config.master.do_shutdown();
                true
            }
            Self::Kill => {
                config.master.kill();
                true
            }
        }
    }
}
