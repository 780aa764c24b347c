//! # SentinelKV Client
//!
//! Purpose: Provide an async, pipelined client for RESP-speaking in-memory
//! stores, with offline buffering, automatic reconnection, and
//! sentinel-driven primary discovery.
//!
//! ## Design Principles
//! 1. **Actor-Owned Socket**: One background task per client owns the
//!    socket, decoder, and queues; handles communicate over channels.
//! 2. **Strict FIFO Pipelining**: Replies resolve continuations in exactly
//!    the order their commands hit the socket.
//! 3. **Offline Buffering**: Commands issued without a ready connection are
//!    buffered (bounded) and replayed in order on reconnect.
//! 4. **Resolver-Driven Connects**: Every attempt asks a resolution
//!    strategy for its endpoint, so sentinel failover and fixed hosts share
//!    one transport.

mod client;
mod commands;
mod connection;
mod events;
mod queue;
mod resolver;

pub use client::{Client, Options};
pub use commands::COMMANDS;
pub use events::{ConnectionEvent, PushEvent};

// Re-export the protocol building blocks for direct use.
pub use skv_common::{
    encode_command, Arg, ConnectTarget, Error, Host, ReplyReader, Result, SentinelConfig,
    ServerInfo, Value, DEFAULT_PORT,
};
