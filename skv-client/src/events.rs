//! Typed output streams for out-of-band traffic.
//!
//! Push-mode replies (subscriber/monitor) and connection lifecycle
//! notifications each get their own stream instead of sharing an
//! overloaded event name.

use std::time::Duration;

use skv_common::{Host, Value};

/// Connection lifecycle notifications, delivered on a lossy broadcast
/// channel for observability.
#[derive(Debug, Clone)]
pub enum ConnectionEvent {
    /// TCP connect succeeded; the introspection handshake is starting.
    Connected {
        /// Endpoint the socket reached.
        host: Host,
    },
    /// Handshake accepted; buffered commands are being served.
    Ready {
        /// Endpoint serving the connection.
        host: Host,
    },
    /// A connection attempt failed before reaching ready.
    ConnectFailed {
        /// Rendered failure cause.
        error: String,
    },
    /// An established connection dropped; in-flight commands were failed.
    ConnectionLost {
        /// Rendered failure cause.
        error: String,
    },
    /// A reconnect attempt was scheduled.
    RetryScheduled {
        /// Configured fixed retry delay.
        delay: Duration,
    },
    /// The client reached its terminal state.
    Ended,
}

/// Replies diverted out of the request/response stream.
#[derive(Debug, Clone)]
pub enum PushEvent {
    /// Message published to a subscribed channel.
    Message {
        /// Channel the message arrived on.
        channel: Vec<u8>,
        /// Published payload.
        payload: Vec<u8>,
    },
    /// Message published to a channel matched by a subscribed pattern.
    PMessage {
        /// Pattern that matched.
        pattern: Vec<u8>,
        /// Concrete channel the message arrived on.
        channel: Vec<u8>,
        /// Published payload.
        payload: Vec<u8>,
    },
    /// Reply observed while the connection is in monitor mode.
    Monitor(Value),
}
