//! Bring-up handshake run by [`Session::setup`].
//!
//! The controller reports `-1` while it boots and `-2` when it wants the
//! client to resubmit its configuration. The handshake exchanges one frame
//! per poll until the status register becomes non-negative.
//!
//! ```text
//! poll  1..first_active-1   exchange only
//! poll  first_active..      -2  -> resubmit remote config, request = Pending
//!                           else -> request = Idle
//! exit  status >= 0         request = Idle
//! ```

use std::thread;
use std::time::Duration;

use minstant::Instant;

use crate::net::Transport;
use crate::protocol::{Request, STATUS_RESUBMIT, STATUS_UNKNOWN, marshal};
use crate::session::{Session, SessionError};
use crate::trace::{debug, info};

/// Timing of the bring-up handshake.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BringUpConfig {
    /// Delay between polls.
    ///
    /// **Default**: 10 ms
    pub poll_interval: Duration,
    /// First poll that reacts to the status register. Earlier polls only
    /// keep the link warm while the controller boots.
    ///
    /// **Default**: 10
    pub first_active_poll: u32,
    /// Give up after this long. `None` waits forever.
    ///
    /// **Default**: 30 s
    pub timeout: Option<Duration>,
}

impl Default for BringUpConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(10),
            first_active_poll: 10,
            timeout: Some(Duration::from_secs(30)),
        }
    }
}

impl BringUpConfig {
    /// Waits for the controller however long it takes.
    #[must_use]
    pub fn unbounded() -> Self {
        Self {
            timeout: None,
            ..Self::default()
        }
    }

    /// Tight polling for simulators and tests.
    #[must_use]
    pub fn fast() -> Self {
        Self {
            poll_interval: Duration::from_millis(1),
            first_active_poll: 10,
            timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// Outcome of a completed bring-up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BringUpReport {
    pub polls: u32,
    /// Times the remote configuration was resubmitted on request.
    pub resubmissions: u32,
    pub elapsed: Duration,
}

impl<T: Transport> Session<T> {
    pub(super) fn bring_up(&mut self) -> Result<BringUpReport, SessionError> {
        let config = self.config.bringup;
        let start = Instant::now();
        let mut polls = 0u32;
        let mut resubmissions = 0u32;

        self.incoming.config.status = STATUS_UNKNOWN;
        info!("waiting for robot bring-up");

        while self.incoming.config.status < 0 {
            polls += 1;
            self.exchange().map_err(|err| match err {
                SessionError::Read(e) | SessionError::Write(e) => SessionError::BringUp(e),
                other => other,
            })?;

            if polls >= config.first_active_poll {
                if self.incoming.config.status == STATUS_RESUBMIT {
                    let remote = marshal::decode_config(&self.incoming.config);
                    self.coordinator.submit(remote, &mut self.outgoing.config);
                    resubmissions += 1;
                    debug!(polls, "robot asked for config resubmission");
                } else {
                    self.coordinator.force(Request::Idle);
                }
            }

            if let Some(timeout) = config.timeout {
                if self.incoming.config.status < 0 && start.elapsed() >= timeout {
                    return Err(SessionError::BringUpTimeout { polls, timeout });
                }
            }

            if self.incoming.config.status < 0 && !config.poll_interval.is_zero() {
                thread::sleep(config.poll_interval);
            }
        }

        self.coordinator.force(Request::Idle);
        self.coordinator.stamp(&mut self.outgoing.config);

        let report = BringUpReport {
            polls,
            resubmissions,
            elapsed: start.elapsed(),
        };
        info!(
            polls,
            resubmissions,
            elapsed = ?report.elapsed,
            "robot bring-up completed"
        );
        Ok(report)
    }
}
