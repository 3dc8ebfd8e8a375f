//! Session with one robot controller.
//!
//! A [`Session`] owns the transport, the outgoing command record and the
//! config handshake. It is driven from a single control thread, normally by
//! a [`Scheduler`](crate::runtime::Scheduler) through its [`Tick`] impl.
//!
//! ```text
//! Disconnected ──setup──▶ Connecting ──connect ok──▶ AwaitingBringUp
//!      ▲                      │                          │ status >= 0
//!      │                 connect err                     ▼
//!      └──────────────────────┘                     Operational
//!      ▲                                                 │ read/write err
//!      └───────────── shutdown (from any state) ─── Faulted ◀┘
//! ```

mod bringup;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

pub use bringup::{BringUpConfig, BringUpReport};

use crate::config::ConfigSet;
use crate::data::{Plan, State};
use crate::net::{Endpoint, Transport, TransportError};
use crate::protocol::{ConfigCoordinator, ConfigStatus, Request, WirePlan, WireState, marshal};
use crate::runtime::{CommandSlot, Snapshot, Tick};
use crate::safety::SafetyError;
use crate::trace::{error, info, warn};

/// Connection lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Disconnected,
    Connecting,
    AwaitingBringUp,
    Operational,
    /// A read or write failed. Only [`Session::shutdown`] leaves this state.
    Faulted,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Disconnected => "disconnected",
            Self::Connecting => "connecting",
            Self::AwaitingBringUp => "awaiting-bring-up",
            Self::Operational => "operational",
            Self::Faulted => "faulted",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("session setup failed: {0}")]
    Setup(TransportError),
    #[error("invalid safety configuration: {0}")]
    Safety(#[from] SafetyError),
    #[error("setup called while {0}")]
    AlreadyStarted(SessionState),
    #[error("bring-up failed: {0}")]
    BringUp(TransportError),
    #[error("robot did not come up after {polls} polls ({timeout:?})")]
    BringUpTimeout { polls: u32, timeout: Duration },
    #[error("failed to read telemetry: {0}")]
    Read(TransportError),
    #[error("failed to send command: {0}")]
    Write(TransportError),
    #[error("session is {0}, not operational")]
    NotOperational(SessionState),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionConfig {
    pub endpoint: Endpoint,
    pub bringup: BringUpConfig,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new(Endpoint::robot_default())
    }
}

impl SessionConfig {
    #[must_use]
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            bringup: BringUpConfig::default(),
        }
    }

    #[must_use]
    pub fn with_bringup(mut self, bringup: BringUpConfig) -> Self {
        self.bringup = bringup;
        self
    }
}

pub struct Session<T: Transport> {
    transport: T,
    config: SessionConfig,
    state: SessionState,
    outgoing: WirePlan,
    incoming: WireState,
    plan: Plan,
    telemetry: State,
    coordinator: ConfigCoordinator,
    slot: Option<Arc<CommandSlot>>,
    ticks: u64,
    rejected_configs: u64,
    last_rejection: Option<SafetyError>,
}

impl<T: Transport> Session<T> {
    #[must_use]
    pub fn new(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            state: SessionState::Disconnected,
            outgoing: WirePlan::default(),
            incoming: WireState::default(),
            plan: Plan::default(),
            telemetry: State::default(),
            coordinator: ConfigCoordinator::new(ConfigSet::default()),
            slot: None,
            ticks: 0,
            rejected_configs: 0,
            last_rejection: None,
        }
    }

    /// Connects to the robot and runs the bring-up handshake.
    ///
    /// On success the session is [`Operational`](SessionState::Operational).
    ///
    /// # Errors
    ///
    /// - [`SessionError::Setup`] if the transport cannot be set up or
    ///   connected; the session stays `Disconnected`.
    /// - [`SessionError::BringUp`] or [`SessionError::BringUpTimeout`]; the
    ///   session is `Faulted`.
    pub fn setup(&mut self, initial: ConfigSet, plan: Plan) -> Result<BringUpReport, SessionError> {
        if self.state != SessionState::Disconnected {
            return Err(SessionError::AlreadyStarted(self.state));
        }
        initial.safety.validate()?;

        self.transport.setup().map_err(SessionError::Setup)?;

        self.plan = plan;
        self.coordinator = ConfigCoordinator::new(initial);
        marshal::encode_config(&initial, &mut self.outgoing.config);
        marshal::encode_plan(&self.plan, &mut self.outgoing);
        self.coordinator.force(Request::Idle);
        self.coordinator.stamp(&mut self.outgoing.config);

        self.state = SessionState::Connecting;
        let endpoint = self.config.endpoint;
        // The first frame announces the client to the controller.
        let connected = self
            .transport
            .connect(endpoint)
            .and_then(|()| self.transport.write_frame(&self.outgoing));
        if let Err(err) = connected {
            warn!(%endpoint, error = %err, "failed to connect to robot");
            self.transport.shutdown();
            self.state = SessionState::Disconnected;
            return Err(SessionError::Setup(err));
        }
        info!(%endpoint, "connected to robot");

        self.state = SessionState::AwaitingBringUp;
        match self.bring_up() {
            Ok(report) => {
                self.state = SessionState::Operational;
                self.publish_snapshot();
                Ok(report)
            }
            Err(err) => Err(self.fault(err)),
        }
    }

    /// One control tick: apply handed-off commands, derive the gait, then
    /// exchange one frame with the robot.
    ///
    /// # Errors
    ///
    /// [`SessionError::NotOperational`] outside `Operational`. A read or
    /// write failure faults the session; the caller must stop ticking.
    pub fn run(&mut self) -> Result<(), SessionError> {
        if self.state != SessionState::Operational {
            return Err(SessionError::NotOperational(self.state));
        }

        self.apply_handoff();
        self.coordinator
            .apply_gait_rule(&self.plan, &mut self.outgoing.config);

        if let Err(err) = self.exchange() {
            return Err(self.fault(err));
        }
        self.ticks += 1;
        self.publish_snapshot();
        Ok(())
    }

    /// Read, decode, settle, encode, write.
    fn exchange(&mut self) -> Result<(), SessionError> {
        self.transport
            .read_frame(&mut self.incoming)
            .map_err(SessionError::Read)?;
        marshal::decode_telemetry(&self.incoming, &mut self.telemetry);
        self.coordinator.observe(self.incoming.config.status);

        marshal::encode_plan(&self.plan, &mut self.outgoing);
        self.coordinator.stamp(&mut self.outgoing.config);
        self.transport
            .write_frame(&self.outgoing)
            .map_err(SessionError::Write)
    }

    fn fault(&mut self, err: SessionError) -> SessionError {
        error!(state = %self.state, error = %err, "session faulted");
        self.state = SessionState::Faulted;
        self.publish_snapshot();
        err
    }

    fn apply_handoff(&mut self) {
        let Some(command) = self.slot.as_ref().and_then(|slot| slot.take()) else {
            return;
        };
        if let Some(plan) = command.plan {
            self.plan = plan;
        }
        if let Some(config) = command.config {
            match config.safety.validate() {
                Ok(()) => self.coordinator.submit(config, &mut self.outgoing.config),
                Err(err) => {
                    warn!(error = %err, "dropping handed-off config");
                    self.rejected_configs += 1;
                    self.last_rejection = Some(err);
                }
            }
        }
    }

    fn publish_snapshot(&self) {
        if let Some(slot) = &self.slot {
            slot.store_snapshot(Snapshot {
                state: self.telemetry,
                session: self.state,
                tick: self.ticks,
                last_settle: self.coordinator.last_settle(),
                settles: self.coordinator.settles(),
                rejected_configs: self.rejected_configs,
                last_rejection: self.last_rejection,
            });
        }
    }

    /// Whether the transport still has a link. Loop continuation predicate.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.transport.is_connected()
    }

    #[must_use]
    pub fn plan(&self) -> &Plan {
        &self.plan
    }

    /// Replaces the command sent from the next tick on.
    pub fn set_plan(&mut self, plan: Plan) {
        self.plan = plan;
    }

    /// Telemetry decoded on the last tick.
    #[must_use]
    pub fn telemetry(&self) -> &State {
        &self.telemetry
    }

    /// Configuration the robot reported on the last tick.
    #[must_use]
    pub fn remote_config(&self) -> ConfigSet {
        marshal::decode_config(&self.incoming.config)
    }

    /// Submits `config` through the config handshake. Overwrites any request
    /// still in flight.
    ///
    /// # Errors
    ///
    /// Returns [`SessionError::Safety`] if the envelope is invalid; nothing is
    /// submitted in that case.
    pub fn set_config(&mut self, config: ConfigSet) -> Result<(), SessionError> {
        config.safety.validate()?;
        self.coordinator.submit(config, &mut self.outgoing.config);
        Ok(())
    }

    /// Returns the latest settle once, then `NoChange` until the next one.
    pub fn config_status(&mut self) -> ConfigStatus {
        self.coordinator.take_status()
    }

    #[must_use]
    pub fn desired_config(&self) -> &ConfigSet {
        self.coordinator.desired()
    }

    /// Whether a config request awaits its settle.
    #[must_use]
    pub fn config_pending(&self) -> bool {
        self.coordinator.request() == Request::Pending
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    #[must_use]
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Routes `slot`'s commands into this session and publishes snapshots
    /// back through it.
    pub fn attach(&mut self, slot: Arc<CommandSlot>) {
        self.slot = Some(slot);
        self.publish_snapshot();
    }

    #[must_use]
    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Closes the link. The session returns to `Disconnected`.
    pub fn shutdown(&mut self) {
        if self.state != SessionState::Disconnected {
            info!(state = %self.state, ticks = self.ticks, "session shutting down");
        }
        self.transport.shutdown();
        self.state = SessionState::Disconnected;
        self.publish_snapshot();
    }
}

impl<T: Transport> Tick for Session<T> {
    type Error = SessionError;

    fn tick(&mut self) -> Result<(), SessionError> {
        self.run()
    }

    fn is_alive(&self) -> bool {
        Session::is_alive(self)
    }
}

impl<T: Transport> Drop for Session<T> {
    fn drop(&mut self) {
        if self.transport.is_connected() {
            self.shutdown();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::VecDeque;

    use super::*;
    use crate::config::{Gait, MotionMode, TaskType};
    use crate::protocol::STATUS_UNKNOWN;

    /// Transport fed by a script of status values. Every read returns the
    /// next status; the last one repeats once the script runs out.
    #[derive(Default)]
    struct MockTransport {
        statuses: VecDeque<i32>,
        last: i32,
        remote: WireState,
        writes: Vec<WirePlan>,
        connected: bool,
        refuse_connect: bool,
        fail_read_after: Option<usize>,
        reads: usize,
    }

    impl MockTransport {
        fn scripted(statuses: impl IntoIterator<Item = i32>) -> Self {
            Self {
                statuses: statuses.into_iter().collect(),
                last: 0,
                ..Self::default()
            }
        }
    }

    impl Transport for MockTransport {
        fn setup(&mut self) -> Result<(), TransportError> {
            Ok(())
        }

        fn connect(&mut self, _endpoint: Endpoint) -> Result<(), TransportError> {
            if self.refuse_connect {
                return Err(TransportError::Io(std::io::ErrorKind::ConnectionRefused.into()));
            }
            self.connected = true;
            Ok(())
        }

        fn is_connected(&self) -> bool {
            self.connected
        }

        fn read_frame(&mut self, state: &mut WireState) -> Result<(), TransportError> {
            self.reads += 1;
            if self.fail_read_after.is_some_and(|n| self.reads > n) {
                self.connected = false;
                return Err(TransportError::Timeout(Duration::from_millis(100)));
            }
            if let Some(status) = self.statuses.pop_front() {
                self.last = status;
            }
            *state = self.remote;
            state.config.status = self.last;
            Ok(())
        }

        fn write_frame(&mut self, plan: &WirePlan) -> Result<(), TransportError> {
            self.writes.push(*plan);
            Ok(())
        }

        fn shutdown(&mut self) {
            self.connected = false;
        }
    }

    fn session(transport: MockTransport) -> Session<MockTransport> {
        let config = SessionConfig::new(Endpoint::localhost(15251)).with_bringup(BringUpConfig {
            poll_interval: Duration::ZERO,
            ..BringUpConfig::fast()
        });
        Session::new(transport, config)
    }

    fn operational(transport: MockTransport) -> Session<MockTransport> {
        let mut session = session(transport);
        session.setup(ConfigSet::default(), Plan::default()).unwrap();
        session
    }

    #[test]
    fn bring_up_resubmits_once_then_goes_operational() {
        let mut statuses = vec![STATUS_UNKNOWN; 10];
        statuses.extend([-2, 1]);
        let mut transport = MockTransport::scripted(statuses);
        transport.remote.config.safety.llheartbeat.IMU_timeout = 321;

        let mut session = session(transport);
        let report = session.setup(ConfigSet::default(), Plan::default()).unwrap();

        assert_eq!(report.resubmissions, 1);
        assert_eq!(report.polls, 12);
        assert_eq!(session.state(), SessionState::Operational);
        assert_eq!(session.desired_config().safety.heartbeat.imu_timeout, 321);
        assert!(!session.config_pending());

        let writes = &session.transport().writes;
        // Announcement plus one frame per poll.
        assert_eq!(writes.len(), 13);
        assert_eq!(writes[11].config.safety.llheartbeat.IMU_timeout, crate::safety::IMU_TIMEOUT_MS);
        assert_eq!(writes[12].config.safety.llheartbeat.IMU_timeout, 321);
        // The ack arrived in the same exchange, so the request never went out.
        assert!(writes.iter().all(|w| w.config.status == 0));
    }

    #[test]
    fn resubmission_is_flagged_until_the_robot_answers() {
        let mut statuses = vec![STATUS_UNKNOWN; 10];
        statuses.extend([-2, STATUS_UNKNOWN, 0]);
        let session = operational(MockTransport::scripted(statuses));

        let writes = &session.transport().writes;
        assert_eq!(writes.len(), 14);
        assert_eq!(writes[12].config.status, 1);
        assert_eq!(writes[13].config.status, 0);
        assert_eq!(
            writes.iter().filter(|w| w.config.status == 1).count(),
            1
        );
    }

    #[test]
    fn early_resubmit_requests_are_ignored() {
        let mut statuses = vec![-2; 3];
        statuses.extend([STATUS_UNKNOWN; 6]);
        statuses.push(0);
        let session = operational(MockTransport::scripted(statuses));
        assert_eq!(session.transport().writes.len(), 11);
        assert!(session.transport().writes.iter().all(|w| w.config.status == 0));
    }

    #[test]
    fn bring_up_times_out() {
        let transport = MockTransport::scripted([STATUS_UNKNOWN]);
        let config = SessionConfig::new(Endpoint::localhost(15251)).with_bringup(BringUpConfig {
            poll_interval: Duration::from_millis(1),
            first_active_poll: 10,
            timeout: Some(Duration::from_millis(20)),
        });
        let mut session = Session::new(transport, config);
        let err = session
            .setup(ConfigSet::default(), Plan::default())
            .unwrap_err();
        assert!(matches!(err, SessionError::BringUpTimeout { .. }));
        assert_eq!(session.state(), SessionState::Faulted);
    }

    #[test]
    fn connect_failure_stays_disconnected() {
        let transport = MockTransport {
            refuse_connect: true,
            ..MockTransport::default()
        };
        let mut session = session(transport);
        let err = session
            .setup(ConfigSet::default(), Plan::default())
            .unwrap_err();
        assert!(matches!(err, SessionError::Setup(_)));
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn invalid_envelope_is_rejected_before_connecting() {
        let mut config = ConfigSet::default();
        config.safety.joint.lim_jpos_min[0] = 1.0;
        let mut session = session(MockTransport::scripted([0]));
        assert!(matches!(
            session.setup(config, Plan::default()),
            Err(SessionError::Safety(_))
        ));
        assert!(session.transport().writes.is_empty());
    }

    #[test]
    fn run_requires_operational() {
        let mut session = session(MockTransport::scripted([0]));
        assert!(matches!(
            session.run(),
            Err(SessionError::NotOperational(SessionState::Disconnected))
        ));
    }

    #[test]
    fn setup_twice_is_rejected() {
        let mut session = operational(MockTransport::scripted([0]));
        assert!(matches!(
            session.setup(ConfigSet::default(), Plan::default()),
            Err(SessionError::AlreadyStarted(SessionState::Operational))
        ));
    }

    #[test]
    fn read_failure_faults() {
        let transport = MockTransport {
            fail_read_after: Some(1),
            ..MockTransport::scripted([0])
        };
        let mut session = operational(transport);
        assert!(matches!(session.run(), Err(SessionError::Read(_))));
        assert_eq!(session.state(), SessionState::Faulted);
        assert!(!session.is_alive());
        assert!(matches!(
            session.run(),
            Err(SessionError::NotOperational(SessionState::Faulted))
        ));

        session.shutdown();
        assert_eq!(session.state(), SessionState::Disconnected);
    }

    #[test]
    fn config_settle_is_reported_once() {
        let mut session = operational(MockTransport::scripted([0, 0, 1, 0]));
        session.set_config(ConfigSet::default()).unwrap();
        assert!(session.config_pending());

        session.run().unwrap();
        assert_eq!(session.config_status(), ConfigStatus::NoChange);
        assert_eq!(session.transport().writes.last().unwrap().config.status, 1);

        session.run().unwrap();
        assert!(!session.config_pending());
        assert_eq!(session.transport().writes.last().unwrap().config.status, 0);

        session.run().unwrap();
        assert_eq!(session.config_status(), ConfigStatus::Accepted);
        assert_eq!(session.config_status(), ConfigStatus::NoChange);
    }

    #[test]
    fn gait_follows_plan_every_tick() {
        let mut session = operational(MockTransport::scripted([0]));
        let mut config = ConfigSet::default();
        config.motion.planner = TaskType::Motion;
        config.motion.strategy.mode = MotionMode::Classical;
        session.set_config(config).unwrap();

        let mut plan = Plan::default();
        plan.torso.vel[4] = 0.3;
        session.set_plan(plan);
        session.run().unwrap();

        let sent = session.transport().writes.last().unwrap();
        assert_eq!(sent.config.motion.strategy.seq, Gait::Trot as i32);
        assert_eq!(sent.config.status, 1);
        assert!((sent.torso.vel[4] - 0.3).abs() < 1e-6);
        assert_eq!(session.desired_config().motion.strategy.gait, Gait::Trot);
    }

    #[test]
    fn handoff_commands_apply_at_tick_start() {
        let slot = CommandSlot::new();
        let mut session = operational(MockTransport::scripted([0]));
        session.attach(Arc::clone(&slot));

        let mut plan = Plan::default();
        plan.torso.vel[3] = -0.3;
        slot.publish_plan(plan);
        let mut config = ConfigSet::default();
        config.master.do_shutdown();
        slot.publish_config(config);

        session.run().unwrap();
        assert_eq!(session.plan(), &plan);
        assert!(session.desired_config().master.shutdown);
        let sent = session.transport().writes.last().unwrap();
        assert!(sent.config.master.shutdown);
        assert_eq!(sent.config.status, 1);

        let snap = slot.snapshot();
        assert_eq!(snap.tick, 1);
        assert_eq!(snap.session, SessionState::Operational);
        assert_eq!(snap.rejected_configs, 0);
    }

    #[test]
    fn invalid_handoff_config_is_reported_in_snapshot() {
        let slot = CommandSlot::new();
        let mut session = operational(MockTransport::scripted([0]));
        session.attach(Arc::clone(&slot));

        let mut config = ConfigSet::default();
        config.master.do_shutdown();
        config.safety.joint.lim_jpos_min[0] = 1.0;
        config.safety.joint.lim_jpos_max[0] = -1.0;
        slot.publish_config(config);
        session.run().unwrap();

        assert!(!session.desired_config().master.shutdown);
        assert!(!session.config_pending());
        let sent = session.transport().writes.last().unwrap();
        assert!(!sent.config.master.shutdown);
        assert_eq!(sent.config.status, 0);

        let snap = slot.snapshot();
        assert_eq!(snap.rejected_configs, 1);
        assert!(snap.last_rejection.is_some());

        // A valid follow-up goes through; the count is kept.
        slot.publish_config(ConfigSet::default());
        session.run().unwrap();
        assert!(session.config_pending());
        assert_eq!(slot.snapshot().rejected_configs, 1);
    }
}
