//! Configuration change handshake.
//!
//! The client raises [`Request::Pending`] in the outgoing status register
//! whenever the desired configuration changes. The robot answers in its own
//! status register with [`ConfigStatus::Accepted`] or
//! [`ConfigStatus::Rejected`]; either answer settles the request. Settles are
//! latched until the application reads them, once.
//!
//! ```text
//!   submit() ──▶ Pending ──(robot: 1|2)──▶ Idle, latched = 1|2
//!                                          take_status() ──▶ 1|2, then 0
//! ```

use std::fmt;
use std::mem;

use crate::config::ConfigSet;
use crate::data::Plan;
use crate::protocol::marshal;
use crate::protocol::wire::WireConfig;
use crate::trace::debug;

/// Settle state reported by the robot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum ConfigStatus {
    #[default]
    NoChange = 0,
    Accepted = 1,
    Rejected = 2,
}

impl ConfigStatus {
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }

    /// Total decode. Any code other than 1 or 2 reads as `NoChange`,
    /// including the negative bring-up sentinels.
    #[must_use]
    pub fn decode(code: i32) -> Self {
        match code {
            1 => Self::Accepted,
            2 => Self::Rejected,
            _ => Self::NoChange,
        }
    }
}

impl fmt::Display for ConfigStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::NoChange => "no-change",
            Self::Accepted => "accepted",
            Self::Rejected => "rejected",
        };
        f.write_str(s)
    }
}

/// Outgoing request flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[repr(i32)]
pub enum Request {
    #[default]
    Idle = 0,
    Pending = 1,
}

impl Request {
    #[must_use]
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Tracks the desired configuration, the in-flight request and the latched
/// settle.
///
/// Only one request is ever in flight: a submit while `Pending` overwrites
/// the desired configuration and the robot only ever sees the latest one.
#[derive(Debug, Clone)]
pub struct ConfigCoordinator {
    desired: ConfigSet,
    request: Request,
    latched: ConfigStatus,
    last_settle: Option<ConfigStatus>,
    settles: u64,
}

impl ConfigCoordinator {
    #[must_use]
    pub fn new(initial: ConfigSet) -> Self {
        Self {
            desired: initial,
            request: Request::Idle,
            latched: ConfigStatus::NoChange,
            last_settle: None,
            settles: 0,
        }
    }

    /// Replaces the desired configuration and marks it pending.
    pub fn submit(&mut self, config: ConfigSet, out: &mut WireConfig) {
        if self.request == Request::Pending {
            debug!("config superseded before settle");
        }
        self.desired = config;
        marshal::encode_config(&self.desired, out);
        self.request = Request::Pending;
        self.stamp(out);
    }

    /// Re-derives the classical gait from `plan`.
    ///
    /// Every application counts as an edit and raises `Pending`, even when
    /// the gait is unchanged. Returns whether the rule applied.
    pub fn apply_gait_rule(&mut self, plan: &Plan, out: &mut WireConfig) -> bool {
        if !marshal::apply_gait_rule(&mut self.desired, plan) {
            return false;
        }
        marshal::encode_config(&self.desired, out);
        self.request = Request::Pending;
        self.stamp(out);
        true
    }

    /// Feeds the robot's status register through the settle rule.
    ///
    /// A non-`NoChange` status is latched and clears the pending request,
    /// whether it accepts or rejects. Returns the settle, if any.
    pub fn observe(&mut self, raw: i32) -> Option<ConfigStatus> {
        let status = ConfigStatus::decode(raw);
        if status == ConfigStatus::NoChange {
            return None;
        }
        if self.request == Request::Idle {
            debug!(%status, "settle without a pending request");
        }
        self.latched = status;
        self.last_settle = Some(status);
        self.request = Request::Idle;
        self.settles += 1;
        Some(status)
    }

    /// Returns the latched settle and resets it to `NoChange`.
    ///
    /// A settle that is never taken is overwritten by the next one.
    pub fn take_status(&mut self) -> ConfigStatus {
        mem::replace(&mut self.latched, ConfigStatus::NoChange)
    }

    /// Overrides the request flag. Used by the bring-up handshake.
    pub fn force(&mut self, request: Request) {
        self.request = request;
    }

    /// Writes the current request flag into the outgoing status register.
    pub fn stamp(&self, out: &mut WireConfig) {
        out.status = self.request.code();
    }

    #[must_use]
    pub fn request(&self) -> Request {
        self.request
    }

    #[must_use]
    pub fn desired(&self) -> &ConfigSet {
        &self.desired
    }

    /// Most recent settle, whether or not it has been taken.
    #[must_use]
    pub fn last_settle(&self) -> Option<ConfigStatus> {
        self.last_settle
    }

    /// Number of settles observed since construction.
    #[must_use]
    pub fn settles(&self) -> u64 {
        self.settles
    }
}
