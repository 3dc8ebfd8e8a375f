//! Reference [`Transport`] over a connected UDP socket.
//!
//! Each record travels in one datagram, postcard-encoded. Reads drain the
//! socket and keep only the newest telemetry datagram.

use std::time::Duration;

use minstant::Instant;
use mio::{Events, Interest, Poll, Token};

use crate::net::transport::{Transport, TransportError};
use crate::net::{Endpoint, UdpSocket};
use crate::protocol::wire::{WirePlan, WireState};
use crate::trace::{debug, info, trace, warn};

const SOCKET: Token = Token(0);

/// Largest encoded record accepted in either direction.
pub const MAX_DATAGRAM_SIZE: usize = 4096;

#[derive(Debug, Clone, Copy)]
pub struct UdpConfig {
    /// Local bind address. Port 0 lets the OS choose.
    pub bind: Endpoint,
    /// How long [`Transport::read_frame`] waits for telemetry.
    pub read_timeout: Duration,
    /// Send and receive buffer size. `None` keeps the kernel default.
    pub socket_buffer: Option<usize>,
}

impl Default for UdpConfig {
    fn default() -> Self {
        Self {
            bind: Endpoint::any(0),
            read_timeout: Duration::from_millis(100),
            socket_buffer: None,
        }
    }
}

impl UdpConfig {
    /// Loopback bind, for tests and simulators on the same host.
    #[must_use]
    pub fn loopback() -> Self {
        Self {
            bind: Endpoint::localhost(0),
            ..Self::default()
        }
    }
}

struct Link {
    socket: UdpSocket,
    poll: Poll,
    events: Events,
}

pub struct UdpTransport {
    config: UdpConfig,
    link: Option<Link>,
    connected: bool,
    buf: Vec<u8>,
}

impl UdpTransport {
    #[must_use]
    pub fn new(config: UdpConfig) -> Self {
        Self {
            config,
            link: None,
            connected: false,
            buf: vec![0u8; MAX_DATAGRAM_SIZE],
        }
    }

    /// Address the socket is bound to, once [`Transport::setup`] has run.
    #[must_use]
    pub fn local_endpoint(&self) -> Option<Endpoint> {
        self.link
            .as_ref()
            .and_then(|link| link.socket.local_addr().ok())
    }

    fn fail(&mut self, err: std::io::Error) -> TransportError {
        warn!(error = %err, "udp link failed");
        self.connected = false;
        TransportError::Io(err)
    }
}

impl Transport for UdpTransport {
    fn setup(&mut self) -> Result<(), TransportError> {
        if self.link.is_some() {
            return Ok(());
        }

        let mut socket = UdpSocket::bind(self.config.bind)?;
        if let Some(size) = self.config.socket_buffer {
            socket.set_send_buffer_size(size)?;
            socket.set_recv_buffer_size(size)?;
        }

        let poll = Poll::new()?;
        poll.registry()
            .register(&mut socket, SOCKET, Interest::READABLE)?;

        debug!(local = ?socket.local_addr().ok(), "udp transport bound");
        self.link = Some(Link {
            socket,
            poll,
            events: Events::with_capacity(8),
        });
        Ok(())
    }

    fn connect(&mut self, endpoint: Endpoint) -> Result<(), TransportError> {
        let link = self.link.as_ref().ok_or(TransportError::Closed)?;
        link.socket.connect(endpoint)?;
        self.connected = true;
        info!(%endpoint, "udp transport connected");
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    fn read_frame(&mut self, state: &mut WireState) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        let timeout = self.config.read_timeout;
        let deadline = Instant::now() + timeout;

        loop {
            let Some(link) = self.link.as_mut() else {
                return Err(TransportError::Closed);
            };

            // Drain to the newest datagram; older telemetry is stale.
            let mut latest = None;
            let mut dropped = 0u32;
            loop {
                match link.socket.try_recv(&mut self.buf) {
                    Ok(Some(n)) => {
                        if latest.is_some() {
                            dropped += 1;
                        }
                        latest = Some(n);
                    }
                    Ok(None) => break,
                    Err(err) => return Err(self.fail(err)),
                }
            }

            if let Some(n) = latest {
                if dropped > 0 {
                    trace!(dropped, "skipped stale telemetry");
                }
                *state = postcard::from_bytes(&self.buf[..n]).map_err(TransportError::Decode)?;
                return Ok(());
            }

            let remaining = deadline
                .checked_duration_since(Instant::now())
                .filter(|d| !d.is_zero())
                .ok_or(TransportError::Timeout(timeout))?;

            match link.poll.poll(&mut link.events, Some(remaining)) {
                Ok(()) => {}
                Err(err) if err.kind() == std::io::ErrorKind::Interrupted => {}
                Err(err) => return Err(self.fail(err)),
            }
        }
    }

    fn write_frame(&mut self, plan: &WirePlan) -> Result<(), TransportError> {
        if !self.connected {
            return Err(TransportError::NotConnected);
        }
        let Some(link) = self.link.as_ref() else {
            return Err(TransportError::Closed);
        };

        let bytes = postcard::to_slice(plan, &mut self.buf).map_err(TransportError::Encode)?;
        match link.socket.send(bytes) {
            Ok(_) => Ok(()),
            Err(err) => Err(self.fail(err)),
        }
    }

    fn shutdown(&mut self) {
        if let Some(mut link) = self.link.take() {
            let _ = link.poll.registry().deregister(&mut link.socket);
            info!("udp transport shut down");
        }
        self.connected = false;
    }
}
