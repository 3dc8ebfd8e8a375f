//! Lock-free exchange between a command producer and the control loop.
//!
//! The producer never blocks: it merges its edit into the pending command
//! with an RCU update. The loop takes the whole pending command at the start
//! of a tick, leaving the slot empty. Unconsumed edits are overwritten, so
//! the loop only ever acts on the latest plan and the latest config.
//!
//! In the other direction the loop publishes a [`Snapshot`] after every tick.

use std::sync::Arc;

use arc_swap::{ArcSwap, ArcSwapOption};

use crate::config::ConfigSet;
use crate::data::{Plan, State};
use crate::protocol::ConfigStatus;
use crate::safety::SafetyError;
use crate::session::SessionState;

/// Pending edits for the next tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Command {
    pub plan: Option<Plan>,
    /// Submitted through the config handshake when taken.
    pub config: Option<ConfigSet>,
}

/// Loop-side view published after each tick.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Snapshot {
    pub state: State,
    pub session: SessionState,
    pub tick: u64,
    /// Most recent settle. Not consumed by reading it.
    pub last_settle: Option<ConfigStatus>,
    /// Total settles observed; a change means a new settle arrived.
    pub settles: u64,
    /// Handed-off configs dropped by the loop because their safety
    /// envelope did not validate. They never reach the robot.
    pub rejected_configs: u64,
    pub last_rejection: Option<SafetyError>,
}

#[derive(Debug, Default)]
pub struct CommandSlot {
    command: ArcSwapOption<Command>,
    snapshot: ArcSwap<Snapshot>,
}

impl CommandSlot {
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn publish_plan(&self, plan: Plan) {
        self.merge(|cmd| cmd.plan = Some(plan));
    }

    pub fn publish_config(&self, config: ConfigSet) {
        self.merge(|cmd| cmd.config = Some(config));
    }

    /// Publishes both halves at once.
    pub fn publish(&self, command: Command) {
        self.merge(|cmd| {
            if command.plan.is_some() {
                cmd.plan = command.plan;
            }
            if command.config.is_some() {
                cmd.config = command.config;
            }
        });
    }

    fn merge(&self, edit: impl Fn(&mut Command)) {
        self.command.rcu(|current| {
            let mut next = current.as_deref().copied().unwrap_or_default();
            edit(&mut next);
            Some(Arc::new(next))
        });
    }

    /// Takes the pending command, leaving the slot empty.
    pub fn take(&self) -> Option<Command> {
        self.command.swap(None).map(|cmd| *cmd)
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.snapshot.load_full()
    }

    pub fn store_snapshot(&self, snapshot: Snapshot) {
        self.snapshot.store(Arc::new(snapshot));
    }
}
