//! Keyboard teleoperation for the Trakr quadruped.
//!
//! Reads numeric command codes from stdin, one per line, and drives the robot
//! through a session running at a fixed rate. See [`trakr::teleop`] for the
//! code table. End of input stops the loop.
//!
//! # Usage
//!
//! ```sh
//! trakr-teleop --robot 192.168.3.50:15251 --frequency 400
//! ```

use std::io::{self, BufRead};
use std::num::NonZeroU32;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::Duration;

use clap::Parser;

use trakr::data::Plan;
use trakr::teleop::TeleopCommand;
use trakr::{
    BringUpConfig, CommandSlot, ConfigSet, ConfigStatus, Endpoint, Scheduler, Session,
    SessionConfig, SessionError, UdpConfig, UdpTransport,
};

#[derive(Debug, Parser)]
#[command(name = "trakr-teleop", version, about = "Drive a Trakr quadruped from stdin")]
struct Args {
    /// Robot controller address (`ip` or `ip:port`).
    #[arg(long, default_value_t = Endpoint::robot_default())]
    robot: Endpoint,

    /// Local bind address.
    #[arg(long, default_value_t = Endpoint::any(0))]
    bind: Endpoint,

    /// Control loop rate in Hz.
    #[arg(long, default_value = "400")]
    frequency: NonZeroU32,

    /// Give up on bring-up after this many seconds. 0 waits forever.
    #[arg(long, default_value_t = 30)]
    bringup_timeout_secs: u64,

    /// Telemetry read timeout in milliseconds.
    #[arg(long, default_value_t = 100)]
    read_timeout_ms: u64,

    /// Turn off the joint and IMU heartbeat safeties.
    #[arg(long)]
    disable_heartbeat: bool,

    /// Log filter used when `RUST_LOG` is unset.
    #[arg(long, default_value = trakr::DEFAULT_LOG_FILTER)]
    log: String,
}

fn main() {
    let args = Args::parse();
    trakr::init_tracing_with(&args.log);
    if let Err(e) = run(args) {
        eprintln!("trakr-teleop: {e}");
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<(), SessionError> {
    let transport = UdpTransport::new(UdpConfig {
        bind: args.bind,
        read_timeout: Duration::from_millis(args.read_timeout_ms),
        socket_buffer: None,
    });
    let bringup = BringUpConfig {
        timeout: (args.bringup_timeout_secs > 0)
            .then(|| Duration::from_secs(args.bringup_timeout_secs)),
        ..BringUpConfig::default()
    };
    let mut session = Session::new(transport, SessionConfig::new(args.robot).with_bringup(bringup));

    let mut config = ConfigSet::default();
    if args.disable_heartbeat {
        config.safety.heartbeat.disable();
    }

    eprintln!("trakr-teleop: connecting to {}", args.robot);
    let report = session.setup(config, Plan::default())?;
    eprintln!(
        "trakr-teleop: robot up after {} polls ({:?})",
        report.polls, report.elapsed
    );

    let slot = CommandSlot::new();
    session.attach(Arc::clone(&slot));

    let scheduler = Scheduler::with_frequency(args.frequency);
    spawn_operator(Arc::clone(&slot), config, scheduler.stop_flag());

    let result = scheduler.run_with(&mut session, |session| match session.config_status() {
        ConfigStatus::NoChange => {}
        status => eprintln!("trakr-teleop: config {status}"),
    });
    session.shutdown();

    let report = result?;
    eprintln!(
        "trakr-teleop: stopped after {} ticks ({} overruns)",
        report.ticks, report.overruns
    );
    Ok(())
}

/// Reads operator codes on their own thread so stdin never blocks the loop.
fn spawn_operator(slot: Arc<CommandSlot>, mut config: ConfigSet, stop: Arc<AtomicBool>) {
    let on_exit = Arc::clone(&stop);
    let spawned = thread::Builder::new()
        .name("operator".into())
        .spawn(move || {
            let mut plan = Plan::default();
            for line in io::stdin().lock().lines() {
                let Ok(line) = line else { break };
                // Unparseable input counts as code 0: stop.
                let code = line.trim().parse::<i32>().unwrap_or(0);
                let command = TeleopCommand::from_code(code);
                if command.apply(&mut plan, &mut config) {
                    slot.publish_config(config);
                }
                slot.publish_plan(plan);
            }
            on_exit.store(true, Ordering::Relaxed);
        });
    if let Err(e) = spawned {
        eprintln!("trakr-teleop: failed to spawn operator thread: {e}");
        stop.store(true, Ordering::Relaxed);
    }
}
