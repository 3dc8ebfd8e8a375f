//! Network transport.
//!
//! [`Transport`] is the seam the session talks through. [`UdpTransport`] is
//! the mio-based implementation used against real robots and simulators.

pub mod endpoint;
pub mod socket;
pub mod transport;
pub mod udp;

pub use endpoint::{Endpoint, ROBOT_PORT};
pub use socket::UdpSocket;
pub use transport::{Transport, TransportError};
pub use udp::{UdpConfig, UdpTransport};
