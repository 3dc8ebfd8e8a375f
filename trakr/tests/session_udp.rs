//! Session against a simulated controller over loopback UDP.
//!
//! The simulated robot answers every command datagram with one telemetry
//! datagram. It boots like the real controller: `-1` for the first ten
//! answers, then `-2` until the client resubmits its configuration, then it
//! acknowledges config requests as they arrive.
//!
//! ```bash
//! RUST_LOG=trakr=debug cargo test --test session_udp -- --nocapture
//! ```

use std::net::UdpSocket;
use std::sync::Once;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use trakr::config::{Gait, MotionMode, TaskType};
use trakr::protocol::{STATUS_RESUBMIT, STATUS_UNKNOWN, WirePlan, WireState};
use trakr::runtime::Scheduler;
use trakr::{
    BringUpConfig, ConfigSet, ConfigStatus, Endpoint, Plan, Session, SessionConfig, SessionError,
    SessionState, UdpConfig, UdpTransport,
};

use serial_test::serial;

static INIT_TRACING: Once = Once::new();

fn init_test_tracing() {
    INIT_TRACING.call_once(trakr::init_tracing);
}

const BOOT_ANSWERS: usize = 10;

/// Runs the simulated robot until the client goes quiet. Returns every
/// command it received.
fn spawn_robot() -> (Endpoint, JoinHandle<Vec<WirePlan>>) {
    let socket = UdpSocket::bind("127.0.0.1:0").expect("bind robot");
    socket
        .set_read_timeout(Some(Duration::from_millis(300)))
        .expect("robot timeout");
    let endpoint = Endpoint::from(socket.local_addr().expect("robot addr"));

    let handle = thread::spawn(move || {
        let mut received = Vec::new();
        let mut buf = [0u8; 4096];
        let mut booted = false;

        while let Ok((n, client)) = socket.recv_from(&mut buf) {
            let Ok(cmd) = postcard::from_bytes::<WirePlan>(&buf[..n]) else {
                continue;
            };
            received.push(cmd);

            let status = if received.len() <= BOOT_ANSWERS {
                STATUS_UNKNOWN
            } else if !booted {
                if cmd.config.status == 1 {
                    booted = true;
                    1
                } else if received.len() == BOOT_ANSWERS + 1 {
                    STATUS_RESUBMIT
                } else {
                    STATUS_UNKNOWN
                }
            } else {
                // Accept whatever is requested.
                cmd.config.status
            };

            let mut state = WireState::default();
            state.torso.vel = cmd.torso.vel;
            state.power.voltage = 48.0;
            state.config = cmd.config;
            state.config.status = status;

            let bytes = postcard::to_allocvec(&state).expect("encode telemetry");
            if socket.send_to(&bytes, client).is_err() {
                break;
            }
        }
        received
    });

    (endpoint, handle)
}

fn udp_session(robot: Endpoint) -> Session<UdpTransport> {
    let transport = UdpTransport::new(UdpConfig {
        read_timeout: Duration::from_millis(200),
        ..UdpConfig::loopback()
    });
    Session::new(
        transport,
        SessionConfig::new(robot).with_bringup(BringUpConfig::fast()),
    )
}

#[test]
#[serial]
fn bring_up_and_drive_over_udp() {
    init_test_tracing();
    let (robot, handle) = spawn_robot();
    let mut session = udp_session(robot);

    let report = session
        .setup(ConfigSet::default(), Plan::default())
        .expect("bring-up");
    assert_eq!(report.resubmissions, 1);
    assert_eq!(session.state(), SessionState::Operational);
    // The resubmission itself was accepted during bring-up.
    assert_eq!(session.config_status(), ConfigStatus::Accepted);

    let mut config = ConfigSet::default();
    config.motion.planner = TaskType::Motion;
    config.motion.strategy.mode = MotionMode::Classical;
    session.set_config(config).expect("valid config");

    let mut plan = Plan::default();
    plan.torso.vel[4] = 0.3;
    session.set_plan(plan);

    let scheduler = Scheduler::default();
    let stop = scheduler.stop_flag();
    let mut accepted = 0;
    let loop_report = scheduler
        .run_with(&mut session, |session| {
            if session.config_status() == ConfigStatus::Accepted {
                accepted += 1;
            }
            if session.ticks() >= 40 {
                stop.store(true, std::sync::atomic::Ordering::Relaxed);
            }
        })
        .expect("control loop");
    assert_eq!(loop_report.ticks, 40);
    assert!(accepted > 0);

    let telemetry = session.telemetry();
    assert!((telemetry.torso.vel[4] - 0.3).abs() < 1e-6);
    assert_eq!(telemetry.power.voltage, 48.0);
    assert_eq!(session.remote_config().motion.strategy.gait, Gait::Trot);

    session.shutdown();
    assert!(!session.is_alive());

    let received = handle.join().expect("robot thread");
    let resubmits = received
        .iter()
        .take_while(|cmd| cmd.config.status != 1)
        .count();
    assert!(resubmits > BOOT_ANSWERS);
    let last = received.last().expect("commands");
    assert_eq!(last.config.motion.planner, TaskType::Motion as i32);
    assert_eq!(last.config.motion.strategy.seq, Gait::Trot as i32);
}

#[test]
#[serial]
fn silent_robot_faults_bring_up() {
    init_test_tracing();
    // Bound but never answers.
    let robot = UdpSocket::bind("127.0.0.1:0").expect("bind robot");
    let endpoint = Endpoint::from(robot.local_addr().expect("robot addr"));

    let transport = UdpTransport::new(UdpConfig {
        read_timeout: Duration::from_millis(30),
        ..UdpConfig::loopback()
    });
    let mut session = Session::new(
        transport,
        SessionConfig::new(endpoint).with_bringup(BringUpConfig::fast()),
    );

    let err = session
        .setup(ConfigSet::default(), Plan::default())
        .expect_err("robot never answers");
    assert!(matches!(err, SessionError::BringUp(_)), "{err}");
    assert_eq!(session.state(), SessionState::Faulted);
}
