//! Client for the Trakr quadruped controller.
//!
//! A [`Session`] connects to the controller over a [`Transport`], runs the
//! bring-up handshake and then exchanges one command frame for one telemetry
//! frame per tick. Configuration edits go through an asynchronous
//! request/settle handshake that is independent of the tick rate.
//!
//! ```no_run
//! use trakr::{ConfigSet, Plan, Scheduler, Session, SessionConfig, UdpConfig, UdpTransport};
//!
//! let transport = UdpTransport::new(UdpConfig::default());
//! let mut session = Session::new(transport, SessionConfig::default());
//! session.setup(ConfigSet::default(), Plan::default())?;
//! Scheduler::default().run(&mut session)?;
//! # Ok::<(), trakr::SessionError>(())
//! ```

pub mod config;
pub mod data;
pub mod net;
pub mod protocol;
pub mod runtime;
pub mod safety;
pub mod session;
pub mod teleop;

mod trace;

pub use config::{ConfigSet, WireCode};
pub use data::{NDOF, Plan, State};
pub use net::{Endpoint, Transport, TransportError, UdpConfig, UdpTransport};
pub use protocol::ConfigStatus;
pub use runtime::{CommandSlot, Scheduler, Tick};
pub use safety::{SafetyConfig, SafetyError};
pub use session::{BringUpConfig, BringUpReport, Session, SessionConfig, SessionError, SessionState};
pub use trace::{DEFAULT_FILTER as DEFAULT_LOG_FILTER, init_tracing, init_tracing_with};
