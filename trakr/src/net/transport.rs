//! Byte-level transport seam.

use std::io;
use std::time::Duration;

use thiserror::Error;

use crate::net::Endpoint;
use crate::protocol::wire::{WirePlan, WireState};

/// Errors surfaced by a [`Transport`].
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    /// No telemetry arrived within the read timeout.
    #[error("no telemetry within {0:?}")]
    Timeout(Duration),
    #[error("failed to encode command: {0}")]
    Encode(postcard::Error),
    #[error("failed to decode telemetry: {0}")]
    Decode(postcard::Error),
    #[error("transport not connected")]
    NotConnected,
    /// Used before [`Transport::setup`] or after [`Transport::shutdown`].
    #[error("transport closed")]
    Closed,
}

/// Moves wire records to and from the robot controller.
///
/// Implementations own the byte encoding. The session calls
/// [`read_frame`](Self::read_frame) then [`write_frame`](Self::write_frame)
/// once per tick from a single thread.
pub trait Transport {
    /// Acquires local resources. Called once before [`connect`](Self::connect).
    ///
    /// # Errors
    ///
    /// Returns an error if local resources cannot be acquired.
    fn setup(&mut self) -> Result<(), TransportError>;

    /// # Errors
    ///
    /// Returns an error if the link to `endpoint` cannot be established.
    fn connect(&mut self, endpoint: Endpoint) -> Result<(), TransportError>;

    fn is_connected(&self) -> bool;

    /// Blocks until the next telemetry record, decoding it into `state`.
    ///
    /// # Errors
    ///
    /// Returns an error on timeout, decode failure or I/O failure.
    fn read_frame(&mut self, state: &mut WireState) -> Result<(), TransportError>;

    /// # Errors
    ///
    /// Returns an error on encode failure or I/O failure.
    fn write_frame(&mut self, plan: &WirePlan) -> Result<(), TransportError>;

    /// Releases the link. Idempotent.
    fn shutdown(&mut self);
}
