//! Robot configuration set: master flags, motion selection and safeties.
//!
//! Enumerations travel over the link as small integers. Every enum here
//! implements [`WireCode`], whose [`decode`](WireCode::decode) is total: an
//! unknown integer maps to the documented fallback instead of failing.

use crate::safety::SafetyConfig;

/// Integer representation of a configuration enum on the wire.
pub trait WireCode: Sized + Copy {
    /// Human-readable name used in diagnostics.
    const NAME: &'static str;
    /// Value substituted for unknown codes.
    const FALLBACK: Self;

    /// Returns the wire integer for this value.
    fn code(self) -> i32;

    /// Returns the value for `code`, or `None` if the code is unknown.
    fn from_code(code: i32) -> Option<Self>;

    /// Total decode: unknown codes map to [`Self::FALLBACK`].
    #[must_use]
    fn decode(code: i32) -> Self {
        Self::from_code(code).unwrap_or(Self::FALLBACK)
    }
}

macro_rules! wire_enum {
    (
        $(#[$meta:meta])*
        $name:ident ($label:literal, fallback = $fallback:ident) {
            $($(#[$vmeta:meta])* $variant:ident = $code:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(i32)]
        pub enum $name {
            $($(#[$vmeta])* $variant = $code,)+
        }

        impl WireCode for $name {
            const NAME: &'static str = $label;
            const FALLBACK: Self = Self::$fallback;

            fn code(self) -> i32 {
                self as i32
            }

            fn from_code(code: i32) -> Option<Self> {
                match code {
                    $($code => Some(Self::$variant),)+
                    _ => None,
                }
            }
        }
    };
}

wire_enum! {
    /// Which planner drives the robot.
    TaskType("planner", fallback = Gesture) {
        /// Scripted sequences (stand up, sit down, hand shakes).
        Gesture = 0,
        /// Continuous locomotion driven by the torso plan.
        Motion = 1,
    }
}

wire_enum! {
    /// Scripted gesture sequences.
    GestureType("gesture", fallback = None) {
        None = 0,
        StandUp = 1,
        SitDown = 2,
        Orientation = 3,
        LeftShakeHand = 4,
        RightShakeHand = 5,
        Reserved = 6,
    }
}

wire_enum! {
    /// Locomotion strategy used by the motion planner.
    MotionMode("strategy", fallback = None) {
        /// Do not use.
        None = 0,
        Classical = 1,
        Ai = 2,
        Developer = 3,
    }
}

wire_enum! {
    /// Gaits available in [`MotionMode::Classical`].
    Gait("gait", fallback = Stance) {
        Stance = 0,
        Trot = 1,
    }
}

/// Robot master flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MasterConfig {
    pub shutdown: bool,
    pub exit: bool,
    pub killed: bool,
}

impl MasterConfig {
    /// Request a shutdown followed by controller exit.
    pub fn do_exit(&mut self) {
        self.shutdown = true;
        self.exit = true;
    }

    pub fn do_shutdown(&mut self) {
        self.shutdown = true;
    }

    pub fn kill(&mut self) {
        self.killed = true;
    }
}

/// Gesture planner selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GestureConfig {
    pub kind: GestureType,
    pub seq: i32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            kind: GestureType::StandUp,
            seq: 0,
        }
    }
}

/// Motion planner selection.
///
/// `gait` is only meaningful in [`MotionMode::Classical`]; other modes send
/// it as zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StrategyConfig {
    pub mode: MotionMode,
    pub gait: Gait,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        Self {
            mode: MotionMode::Classical,
            gait: Gait::Stance,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MotionConfig {
    pub planner: TaskType,
    pub sequence: GestureConfig,
    pub strategy: StrategyConfig,
}

impl Default for MotionConfig {
    fn default() -> Self {
        Self {
            planner: TaskType::Gesture,
            sequence: GestureConfig::default(),
            strategy: StrategyConfig::default(),
        }
    }
}

impl MotionConfig {
    /// Whether the gait is derived from the torso velocity every tick.
    #[must_use]
    pub fn derives_gait(&self) -> bool {
        self.planner == TaskType::Motion && self.strategy.mode == MotionMode::Classical
    }
}

/// Complete robot configuration.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConfigSet {
    pub master: MasterConfig,
    pub motion: MotionConfig,
    pub safety: SafetyConfig,
}
