//! Mapping between user-facing types and wire records.
//!
//! Encoders write into caller-owned records so the control loop never
//! allocates. Decoders are total: unknown enum codes degrade to the
//! fallback declared by [`WireCode`] and are logged.
//!
//! | Local                           | Wire                          |
//! |---------------------------------|-------------------------------|
//! | `joint.check_jpos` / `_jvel` .. | `llsafety.jpos` / `jvel` ..   |
//! | `heartbeat.check_joints`        | `llheartbeat.enable_CAN`      |
//! | `heartbeat.joints_timeout`      | `llheartbeat.CAN_timeout`     |
//! | `heartbeat.check_imu`           | `llheartbeat.enable_IMU`      |
//! | `heartbeat.imu_timeout`         | `llheartbeat.IMU_timeout`     |
//! | `torso.check_roll` / `_pitch`   | `torso.observe_roll` / `_pitch` |
//! | `torso.check_gyro`              | `torso.observe_gyro`          |

use crate::config::{
    ConfigSet, Gait, GestureConfig, GestureType, MasterConfig, MotionConfig, MotionMode,
    StrategyConfig, TaskType, WireCode,
};
use crate::data::{JointState, Plan, State, TorsoState, Vector6};
use crate::protocol::wire::{
    WireConfig, WireHeartbeat, WireJoint, WireJointSafety, WireMaster, WireMotion,
    WireMotionBase, WirePlan, WireSafety, WireState, WireTorso, WireTorsoSafety,
};
use crate::safety::{HeartbeatConfig, JointSafetyConfig, SafetyConfig, TorsoSafetyConfig};
use crate::trace::warn;

/// Torso speed the classical planner must exceed to trot.
pub const GAIT_TROT_THRESHOLD: f64 = 0.02;

/// Heartbeat grace period after controller init; fixed by the client.
const HEARTBEAT_INIT_DISABLE_TIME: i32 = 1;

/// Gait implied by a torso velocity command.
///
/// Trot only once the velocity norm exceeds [`GAIT_TROT_THRESHOLD`]; a
/// command sitting exactly on the threshold keeps the robot in stance.
#[must_use]
pub fn derive_gait(vel: &Vector6) -> Gait {
    let speed = TorsoState { pos: [0.0; 6], vel: *vel }.speed();
    if speed <= GAIT_TROT_THRESHOLD {
        Gait::Stance
    } else {
        Gait::Trot
    }
}

/// Re-derives the classical gait from the plan.
///
/// Returns `true` when the rule applies (motion planner in classical mode),
/// in which case the caller must treat the result as a configuration edit,
/// whether or not the gait actually changed.
pub fn apply_gait_rule(config: &mut ConfigSet, plan: &Plan) -> bool {
    if !config.motion.derives_gait() {
        return false;
    }
    config.motion.strategy.gait = derive_gait(&plan.torso.vel);
    true
}

fn narrow<const N: usize>(src: &[f64; N]) -> [f32; N] {
    src.map(|v| v as f32)
}

fn widen<const N: usize>(src: &[f32; N]) -> [f64; N] {
    src.map(f64::from)
}

fn decode_code<T: WireCode>(code: i32) -> T {
    T::from_code(code).unwrap_or_else(|| {
        warn!(field = T::NAME, code, "unknown config code, using fallback");
        T::FALLBACK
    })
}

fn encode_torso(torso: &TorsoState) -> WireTorso {
    WireTorso {
        pos: narrow(&torso.pos),
        vel: narrow(&torso.vel),
    }
}

fn decode_torso(wire: &WireTorso) -> TorsoState {
    TorsoState {
        pos: widen(&wire.pos),
        vel: widen(&wire.vel),
    }
}

fn encode_joint(joint: &JointState) -> WireJoint {
    WireJoint {
        pos: narrow(&joint.pos),
        vel: narrow(&joint.vel),
        tor: narrow(&joint.tor),
        kp: narrow(&joint.kp),
        kd: narrow(&joint.kd),
    }
}

fn decode_joint(wire: &WireJoint) -> JointState {
    JointState {
        pos: widen(&wire.pos),
        vel: widen(&wire.vel),
        tor: widen(&wire.tor),
        kp: widen(&wire.kp),
        kd: widen(&wire.kd),
    }
}

/// Writes the torso and joint commands into the outgoing record.
pub fn encode_plan(plan: &Plan, out: &mut WirePlan) {
    out.torso = encode_torso(&plan.torso);
    out.joint = encode_joint(&plan.joint);
}

/// Decodes continuous telemetry and the raw status register.
pub fn decode_telemetry(wire: &WireState, state: &mut State) {
    state.torso = decode_torso(&wire.torso);
    state.joint = decode_joint(&wire.joint);
    state.imu.acc = widen(&wire.imu.acc);
    state.imu.gyro = widen(&wire.imu.gyro);
    state.imu.mag = widen(&wire.imu.mag);
    state.imu.euler = widen(&wire.imu.euler);
    state.power.voltage = f64::from(wire.power.voltage);
    state.power.current = f64::from(wire.power.current);
    state.status = wire.config.status;
}

/// Writes `config` into the outgoing config block. The status register is
/// left untouched; it belongs to the config coordinator.
pub fn encode_config(config: &ConfigSet, out: &mut WireConfig) {
    let MasterConfig {
        shutdown,
        exit,
        killed,
    } = config.master;
    out.master = WireMaster {
        shutdown,
        exit,
        killed,
    };
    out.motion = encode_motion(&config.motion);
    out.safety = encode_safety(&config.safety);
}

/// Decodes the remote's current configuration.
#[must_use]
pub fn decode_config(wire: &WireConfig) -> ConfigSet {
    ConfigSet {
        master: MasterConfig {
            shutdown: wire.master.shutdown,
            exit: wire.master.exit,
            killed: wire.master.killed,
        },
        motion: decode_motion(&wire.motion),
        safety: decode_safety(&wire.safety),
    }
}

fn encode_motion(motion: &MotionConfig) -> WireMotion {
    let seq = match motion.strategy.mode {
        MotionMode::Classical => motion.strategy.gait.code(),
        _ => 0,
    };
    WireMotion {
        planner: motion.planner.code(),
        sequence: WireMotionBase {
            kind: motion.sequence.kind.code(),
            seq: 0,
        },
        strategy: WireMotionBase {
            kind: motion.strategy.mode.code(),
            seq,
        },
    }
}

fn decode_motion(wire: &WireMotion) -> MotionConfig {
    MotionConfig {
        planner: decode_code::<TaskType>(wire.planner),
        sequence: GestureConfig {
            kind: decode_code::<GestureType>(wire.sequence.kind),
            seq: 0,
        },
        strategy: StrategyConfig {
            mode: decode_code::<MotionMode>(wire.strategy.kind),
            gait: decode_code::<Gait>(wire.strategy.seq),
        },
    }
}

fn encode_safety(safety: &SafetyConfig) -> WireSafety {
    let joint = &safety.joint;
    let heartbeat = &safety.heartbeat;
    let torso = &safety.torso;

    WireSafety {
        llsafety: WireJointSafety {
            enabled: joint.enabled,
            jpos: joint.check_jpos,
            jvel: joint.check_jvel,
            jtor: joint.check_jtor,
            dtor: joint.check_dtor,
            lim_jpos_min: narrow(&joint.lim_jpos_min),
            lim_jpos_max: narrow(&joint.lim_jpos_max),
            lim_jvel: narrow(&joint.lim_jvel),
            lim_jtor: narrow(&joint.lim_jtor),
            lim_dtor: narrow(&joint.lim_dtor),
        },
        llheartbeat: WireHeartbeat {
            enabled: heartbeat.enabled,
            init_disable_time: HEARTBEAT_INIT_DISABLE_TIME,
            enable_CAN: heartbeat.check_joints,
            CAN_timeout: heartbeat.joints_timeout,
            observe_jpos: false,
            observe_jvel: true,
            observe_jtor: true,
            enable_IMU: heartbeat.check_imu,
            IMU_timeout: heartbeat.imu_timeout,
            observe_accel: true,
            observe_gyro: true,
        },
        torso: WireTorsoSafety {
            enabled: torso.enabled,
            observe_roll: torso.check_roll,
            roll_limit: torso.roll_limit as f32,
            observe_pitch: torso.check_pitch,
            pitch_limit: torso.pitch_limit as f32,
            observe_gyro: torso.check_gyro,
            gyro_limit: torso.gyro_limit as f32,
        },
    }
}

fn decode_safety(wire: &WireSafety) -> SafetyConfig {
    let joint = &wire.llsafety;
    let heartbeat = &wire.llheartbeat;
    let torso = &wire.torso;

    SafetyConfig {
        joint: JointSafetyConfig {
            enabled: joint.enabled,
            check_jpos: joint.jpos,
            check_jvel: joint.jvel,
            check_jtor: joint.jtor,
            check_dtor: joint.dtor,
            lim_jpos_min: widen(&joint.lim_jpos_min),
            lim_jpos_max: widen(&joint.lim_jpos_max),
            lim_jvel: widen(&joint.lim_jvel),
            lim_jtor: widen(&joint.lim_jtor),
            lim_dtor: widen(&joint.lim_dtor),
        },
        heartbeat: HeartbeatConfig {
            enabled: heartbeat.enabled,
            check_joints: heartbeat.enable_CAN,
            joints_timeout: heartbeat.CAN_timeout,
            check_imu: heartbeat.enable_IMU,
            imu_timeout: heartbeat.IMU_timeout,
        },
        torso: TorsoSafetyConfig {
            enabled: torso.enabled,
            check_roll: torso.observe_roll,
            roll_limit: f64::from(torso.roll_limit),
            check_pitch: torso.observe_pitch,
            pitch_limit: f64::from(torso.pitch_limit),
            check_gyro: torso.observe_gyro,
            gyro_limit: f64::from(torso.gyro_limit),
        },
    }
}
