//! # Error Taxonomy
//!
//! Purpose: One workspace-wide error type covering transport, protocol,
//! command, queue, and discovery failures.
//!
//! ## Design Principles
//! 1. **Local Propagation**: Command and discovery errors stay with the
//!    operation that produced them; only connection-level failures fan out.
//! 2. **Fail Fast**: Queue errors resolve synchronously, never touching I/O.
//! 3. **Fatal Framing**: A protocol violation condemns the whole socket.

use thiserror::Error;

/// Result type for the whole workspace.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by the client and its building blocks.
#[derive(Debug, Error)]
pub enum Error {
    /// Network or IO failure while connecting, reading, or writing.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed reply framing. Fatal for the socket that produced it.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// Error reply returned by the server for a single command.
    #[error("server error: {0}")]
    Server(String),

    /// The connection dropped while the command was in flight.
    #[error("server connection lost")]
    ConnectionLost,

    /// The client was terminated; no further commands are accepted.
    #[error("client has been ended")]
    ClientEnded,

    /// The offline buffer is at capacity.
    #[error("offline queue is full")]
    OfflineQueueFull,

    /// A command was submitted without a name.
    #[error("no command name provided")]
    EmptyCommand,

    /// The host could not be resolved to a socket address.
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    /// The server answered the introspection handshake but is still
    /// loading its dataset.
    #[error("server is still loading")]
    ServerLoading,

    /// Sentinel discovery was requested with an empty sentinel set.
    #[error("no sentinels configured")]
    NoSentinels,

    /// Every sentinel failed or returned an empty primary address.
    #[error("unable to determine primary from sentinels for {name}")]
    NoPrimary {
        /// Logical primary name the sentinels were asked about.
        name: String,
    },

    /// The discovered candidate does not report the primary role.
    #[error("unable to obtain primary connection")]
    NotPrimary,
}
