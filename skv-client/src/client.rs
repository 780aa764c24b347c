//! # Client Façade
//!
//! Purpose: Compose transport, queues, and host resolution behind a small
//! handle that dispatches commands and controls the connection lifecycle.
//!
//! ## Design Principles
//! 1. **Channel-Backed Handle**: The handle holds no socket state; it talks
//!    to the connection task, so it is cheap to share behind an `Arc`.
//! 2. **Fail Fast After End**: Once terminated, every dispatch resolves
//!    synchronously without touching the network.
//! 3. **One Continuation Per Command**: Each dispatch carries its own
//!    oneshot reply channel; there is no per-command timeout by design.

use std::sync::Mutex;
use std::time::Duration;

use tokio::sync::{broadcast, mpsc, oneshot};

use skv_common::{Arg, ConnectTarget, Error, Result, Value};

use crate::connection::{Connection, Op};
use crate::events::{ConnectionEvent, PushEvent};
use crate::resolver::Resolver;

/// Tunables for a client and its transport.
#[derive(Debug, Clone)]
pub struct Options {
    /// Fixed delay between reconnect attempts. `None` disables
    /// reconnection, making a lost connection terminal.
    pub retry_delay: Option<Duration>,
    /// Offline buffer capacity; 0 means unbounded.
    pub max_offline_queue: usize,
    /// Gap between successive sentinel query starts during discovery.
    pub sentinel_stagger: Duration,
    /// Disable Nagle's algorithm on new sockets.
    pub no_delay: bool,
    /// Enable TCP keepalive on new sockets.
    pub keep_alive: bool,
}

impl Default for Options {
    fn default() -> Self {
        Options {
            retry_delay: Some(Duration::from_millis(2500)),
            max_offline_queue: 0,
            sentinel_stagger: Duration::from_millis(300),
            no_delay: true,
            keep_alive: true,
        }
    }
}

/// Handle to one logical connection.
///
/// All socket state lives in a background task; dropping the last handle
/// (or calling [`Client::end`]) terminates it.
pub struct Client {
    ops: mpsc::UnboundedSender<Op>,
    events: broadcast::Sender<ConnectionEvent>,
    push: Mutex<Option<mpsc::UnboundedReceiver<PushEvent>>>,
}

impl Client {
    /// Connects with default options.
    ///
    /// `target` accepts a `"host:port"` string, a [`skv_common::Host`], or a
    /// [`skv_common::SentinelConfig`]. Must be called within a tokio
    /// runtime; the connection itself is established in the background.
    pub fn connect(target: impl Into<ConnectTarget>) -> Client {
        Client::with_options(target, Options::default())
    }

    /// Connects with explicit options.
    pub fn with_options(target: impl Into<ConnectTarget>, opts: Options) -> Client {
        let (ops_tx, ops_rx) = mpsc::unbounded_channel();
        let (push_tx, push_rx) = mpsc::unbounded_channel();
        let (events_tx, _) = broadcast::channel(32);

        let resolver = Resolver::for_target(target.into(), &opts);
        let connection = Connection::new(resolver, opts, push_tx, events_tx.clone());
        tokio::spawn(connection.run(ops_rx));

        Client {
            ops: ops_tx,
            events: events_tx,
            push: Mutex::new(Some(push_rx)),
        }
    }

    /// Dispatches a command by name.
    ///
    /// The command goes out immediately on a ready connection or into the
    /// offline buffer otherwise. The returned future resolves with the
    /// server's reply, a connection-lost error if the socket drops first,
    /// or a queue error if the command never reached a socket.
    pub async fn send(&self, cmd: &str, args: Vec<Arg>) -> Result<Value> {
        if cmd.is_empty() {
            return Err(Error::EmptyCommand);
        }
        let (tx, rx) = oneshot::channel();
        let op = Op::Send {
            cmd: cmd.to_ascii_uppercase(),
            args,
            tx,
        };
        self.ops.send(op).map_err(|_| Error::ClientEnded)?;
        rx.await.map_err(|_| Error::ClientEnded)?
    }

    /// Marks the connection as intentionally ending and issues QUIT.
    ///
    /// When the server drops the link afterwards, no reconnect is
    /// scheduled.
    pub async fn quit(&self) -> Result<Value> {
        let (tx, rx) = oneshot::channel();
        self.ops.send(Op::Quit { tx }).map_err(|_| Error::ClientEnded)?;
        rx.await.map_err(|_| Error::ClientEnded)?
    }

    /// Terminates immediately: cancels any scheduled reconnect, closes the
    /// active socket, and fails all queued and in-flight work.
    pub fn end(&self) {
        let _ = self.ops.send(Op::End);
    }

    /// Subscribes to connection lifecycle events.
    ///
    /// The stream is a lossy broadcast: slow consumers skip events rather
    /// than applying backpressure to the connection.
    pub fn events(&self) -> broadcast::Receiver<ConnectionEvent> {
        self.events.subscribe()
    }

    /// Takes the push-event stream carrying subscriber and monitor
    /// traffic. Returns `None` after the first call.
    pub fn push_events(&self) -> Option<mpsc::UnboundedReceiver<PushEvent>> {
        self.push.lock().expect("push receiver lock").take()
    }
}
