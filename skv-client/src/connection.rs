//! # Connection Transport
//!
//! Purpose: Own one socket at a time, run the reconnection state machine,
//! and route decoded replies back to waiting callers.
//!
//! ## Design Principles
//! 1. **Actor-Owned State**: One task owns socket, decoder, queues, and mode
//!    flags; callers reach it only through channels.
//! 2. **Sequential States**: Offline, connecting, connected, ready, ended,
//!    with ended absorbing.
//! 3. **Fixed-Delay Retries**: Reconnects use the configured delay with no
//!    backoff and no attempt cap until the client is explicitly ended.
//! 4. **Fatal Framing**: Any decode failure tears the socket down; the
//!    stream is never resynchronized.
//!
//! The run loop realizes the states as phases: `establish` covers resolving
//! and the introspection handshake (offline sends buffer meanwhile), `serve`
//! is the ready phase, and `wait_retry` is the offline pause between
//! attempts. Every phase stays responsive to caller operations so `end`
//! cancels a pending retry timer or an in-progress connect immediately.

use std::net::SocketAddr;
use std::time::Duration;

use bytes::BytesMut;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{lookup_host, TcpSocket, TcpStream};
use tokio::sync::{broadcast, mpsc};
use tokio::time::sleep;
use tracing::{debug, info, warn};

use skv_common::{encode_command, Arg, Error, Host, ReplyReader, Result, ServerInfo, Value};

use crate::client::Options;
use crate::events::{ConnectionEvent, PushEvent};
use crate::queue::{CommandQueue, ReplySender};
use crate::resolver::Resolver;

/// Operations accepted by the connection task.
pub(crate) enum Op {
    /// Dispatch a command.
    Send {
        cmd: String,
        args: Vec<Arg>,
        tx: ReplySender,
    },
    /// Disable reconnection, then dispatch QUIT through the normal path.
    Quit { tx: ReplySender },
    /// Terminate immediately.
    End,
}

enum Establish {
    Ready(Link),
    Failed(Error),
    Ended,
}

enum Serve {
    Lost(Error),
    Ended,
}

/// One live socket with its decoder and read accumulation buffer.
struct Link {
    host: Host,
    stream: TcpStream,
    reader: ReplyReader,
    buf: BytesMut,
}

impl Link {
    fn new(host: Host, stream: TcpStream) -> Self {
        Link {
            host,
            stream,
            reader: ReplyReader::new(),
            buf: BytesMut::with_capacity(16 * 1024),
        }
    }

    /// Issues the introspection command on the fresh socket and waits for
    /// its reply. Runs before the link serves any queued traffic.
    async fn handshake(&mut self) -> Result<ServerInfo> {
        self.write_frame("INFO", &[]).await?;
        loop {
            if let Some(value) = self.reader.next()? {
                return match value {
                    Value::Bulk(Some(payload)) => Ok(ServerInfo::parse(&payload)),
                    Value::Error(message) => Err(server_error(message)),
                    _ => Err(Error::Protocol("unexpected introspection reply".to_string())),
                };
            }
            let n = self.stream.read_buf(&mut self.buf).await?;
            if n == 0 {
                return Err(Error::ConnectionLost);
            }
            self.reader.feed(&self.buf);
            self.buf.clear();
        }
    }

    async fn write_frame(&mut self, cmd: &str, args: &[Arg]) -> Result<()> {
        for segment in encode_command(cmd, args) {
            self.stream.write_all(&segment).await?;
        }
        Ok(())
    }
}

/// The connection actor.
pub(crate) struct Connection {
    resolver: Resolver,
    opts: Options,
    queue: CommandQueue,
    push: mpsc::UnboundedSender<PushEvent>,
    events: broadcast::Sender<ConnectionEvent>,
    quitting: bool,
    subscriber: bool,
    monitor: bool,
}

impl Connection {
    pub fn new(
        resolver: Resolver,
        opts: Options,
        push: mpsc::UnboundedSender<PushEvent>,
        events: broadcast::Sender<ConnectionEvent>,
    ) -> Self {
        let queue = CommandQueue::new(opts.max_offline_queue);
        Connection {
            resolver,
            opts,
            queue,
            push,
            events,
            quitting: false,
            subscriber: false,
            monitor: false,
        }
    }

    pub async fn run(mut self, mut ops: mpsc::UnboundedReceiver<Op>) {
        loop {
            match self.establish(&mut ops).await {
                Establish::Ready(link) => match self.serve(&mut ops, link).await {
                    Serve::Lost(error) => {
                        warn!(error = %error, "connection lost");
                        self.queue.fail_in_flight();
                        self.emit(ConnectionEvent::ConnectionLost {
                            error: error.to_string(),
                        });
                    }
                    Serve::Ended => break,
                },
                Establish::Failed(error) => {
                    debug!(error = %error, "connection attempt failed");
                    self.emit(ConnectionEvent::ConnectFailed {
                        error: error.to_string(),
                    });
                }
                Establish::Ended => break,
            }

            if self.quitting {
                break;
            }
            let Some(delay) = self.opts.retry_delay else {
                // Retries disabled: a failed connection is terminal.
                break;
            };
            self.emit(ConnectionEvent::RetryScheduled { delay });
            if !self.wait_retry(&mut ops, delay).await {
                break;
            }
        }
        self.shutdown(&mut ops);
    }

    /// Resolves a host, connects, and runs the introspection handshake,
    /// buffering caller operations until the link is ready.
    async fn establish(&mut self, ops: &mut mpsc::UnboundedReceiver<Op>) -> Establish {
        let Connection {
            resolver,
            opts,
            queue,
            quitting,
            events,
            ..
        } = self;

        let connect = open_link(resolver, opts, events);
        tokio::pin!(connect);

        loop {
            tokio::select! {
                result = &mut connect => {
                    return match result {
                        Ok(link) => Establish::Ready(link),
                        Err(error) => Establish::Failed(error),
                    };
                }
                op = ops.recv() => match op {
                    None | Some(Op::End) => return Establish::Ended,
                    Some(Op::Quit { tx }) => {
                        *quitting = true;
                        queue.buffer("QUIT".to_string(), Vec::new(), tx);
                    }
                    Some(Op::Send { cmd, args, tx }) => queue.buffer(cmd, args, tx),
                },
            }
        }
    }

    /// Ready phase: replays the offline buffer, then pumps caller
    /// operations and socket data until the link drops or the client ends.
    async fn serve(&mut self, ops: &mut mpsc::UnboundedReceiver<Op>, mut link: Link) -> Serve {
        info!(host = %link.host, "connection ready");
        self.emit(ConnectionEvent::Ready {
            host: link.host.clone(),
        });

        // Commands buffered while offline replay ahead of any new traffic.
        for entry in self.queue.take_offline() {
            if let Err(error) = self.transmit(&mut link, entry.cmd, entry.args, entry.tx).await {
                return Serve::Lost(error);
            }
        }

        loop {
            tokio::select! {
                op = ops.recv() => match op {
                    None | Some(Op::End) => return Serve::Ended,
                    Some(Op::Quit { tx }) => {
                        self.quitting = true;
                        if let Err(error) = self.transmit(&mut link, "QUIT".to_string(), Vec::new(), tx).await {
                            return Serve::Lost(error);
                        }
                    }
                    Some(Op::Send { cmd, args, tx }) => {
                        if let Err(error) = self.transmit(&mut link, cmd, args, tx).await {
                            return Serve::Lost(error);
                        }
                    }
                },
                read = link.stream.read_buf(&mut link.buf) => match read {
                    Ok(0) => return Serve::Lost(Error::ConnectionLost),
                    Ok(_) => {
                        link.reader.feed(&link.buf);
                        link.buf.clear();
                        loop {
                            match link.reader.next() {
                                Ok(Some(value)) => {
                                    if let Err(error) = self.route(value) {
                                        return Serve::Lost(error);
                                    }
                                }
                                Ok(None) => break,
                                Err(error) => return Serve::Lost(error),
                            }
                        }
                    }
                    Err(error) => return Serve::Lost(error.into()),
                },
            }
        }
    }

    /// Writes one command, recording it in-flight as its bytes go out.
    async fn transmit(
        &mut self,
        link: &mut Link,
        cmd: String,
        args: Vec<Arg>,
        tx: ReplySender,
    ) -> Result<()> {
        let segments = encode_command(&cmd, &args);
        self.queue.push_in_flight(cmd, tx);
        for segment in segments {
            link.stream.write_all(&segment).await?;
        }
        Ok(())
    }

    /// Routes one decoded reply: push traffic in subscriber/monitor mode,
    /// FIFO matching otherwise. Errors here condemn the socket.
    fn route(&mut self, value: Value) -> Result<()> {
        if self.monitor {
            let _ = self.push.send(PushEvent::Monitor(value));
            return Ok(());
        }
        if self.subscriber {
            if let Some(event) = as_push_event(&value)? {
                let _ = self.push.send(event);
                return Ok(());
            }
        }

        let Some(pending) = self.queue.pop_reply() else {
            return Err(Error::Protocol("reply without a pending command".to_string()));
        };

        match value {
            Value::Error(message) => {
                let _ = pending.tx.send(Err(server_error(message)));
            }
            value => {
                match pending.cmd.as_str() {
                    "SUBSCRIBE" | "UNSUBSCRIBE" | "PSUBSCRIBE" | "PUNSUBSCRIBE" => {
                        // The third element reports the remaining
                        // subscription count for this connection.
                        let active = value
                            .as_items()
                            .and_then(|items| items.get(2))
                            .and_then(Value::as_int);
                        if let Some(active) = active {
                            self.subscriber = active > 0;
                        }
                    }
                    "MONITOR" => self.monitor = true,
                    _ => {}
                }
                let _ = pending.tx.send(Ok(value));
            }
        }
        Ok(())
    }

    /// Offline pause between attempts. Returns false when the client ends
    /// before the timer fires.
    async fn wait_retry(&mut self, ops: &mut mpsc::UnboundedReceiver<Op>, delay: Duration) -> bool {
        debug!(delay_ms = delay.as_millis() as u64, "reconnect scheduled");
        let timer = sleep(delay);
        tokio::pin!(timer);
        loop {
            tokio::select! {
                _ = &mut timer => return true,
                op = ops.recv() => match op {
                    None | Some(Op::End) => return false,
                    Some(Op::Quit { tx }) => {
                        self.quitting = true;
                        self.queue.buffer("QUIT".to_string(), Vec::new(), tx);
                    }
                    Some(Op::Send { cmd, args, tx }) => self.queue.buffer(cmd, args, tx),
                },
            }
        }
    }

    /// Terminal transition: fails all outstanding work, drains operations
    /// still in the channel, and releases resolver resources.
    fn shutdown(&mut self, ops: &mut mpsc::UnboundedReceiver<Op>) {
        self.queue.fail_in_flight();
        self.queue.flush_offline(|| Error::ClientEnded);
        ops.close();
        while let Ok(op) = ops.try_recv() {
            match op {
                Op::Send { tx, .. } | Op::Quit { tx } => {
                    let _ = tx.send(Err(Error::ClientEnded));
                }
                Op::End => {}
            }
        }
        self.resolver.end();
        self.emit(ConnectionEvent::Ended);
        info!("client ended");
    }

    fn emit(&self, event: ConnectionEvent) {
        let _ = self.events.send(event);
    }
}

/// Full connect sequence: resolve, dial, tune the socket, handshake, and
/// let the resolver validate the candidate.
async fn open_link(
    resolver: &Resolver,
    opts: &Options,
    events: &broadcast::Sender<ConnectionEvent>,
) -> Result<Link> {
    let host = resolver.resolve().await?;
    debug!(%host, "connecting");
    let stream = connect_stream(&host, opts).await?;
    let _ = events.send(ConnectionEvent::Connected { host: host.clone() });

    let mut link = Link::new(host, stream);
    let info = link.handshake().await?;
    if info.is_loading() {
        return Err(Error::ServerLoading);
    }
    resolver.confirm(&info)?;
    Ok(link)
}

async fn connect_stream(host: &Host, opts: &Options) -> Result<TcpStream> {
    let mut addrs = lookup_host((host.host.as_str(), host.port)).await?;
    let addr = addrs
        .next()
        .ok_or_else(|| Error::InvalidAddress(host.to_string()))?;
    let socket = match addr {
        SocketAddr::V4(_) => TcpSocket::new_v4()?,
        SocketAddr::V6(_) => TcpSocket::new_v6()?,
    };
    socket.set_keepalive(opts.keep_alive)?;
    let stream = socket.connect(addr).await?;
    stream.set_nodelay(opts.no_delay)?;
    Ok(stream)
}

/// Classifies a reply as subscriber push traffic.
///
/// `Ok(None)` means the reply belongs to the request/response stream. A
/// push-tagged frame with the wrong shape is stream corruption.
fn as_push_event(value: &Value) -> Result<Option<PushEvent>> {
    let Some(items) = value.as_items() else {
        return Ok(None);
    };
    let Some(tag) = items.first().and_then(Value::as_bulk) else {
        return Ok(None);
    };

    match tag {
        b"message" => {
            let channel = items.get(1).and_then(Value::as_bulk);
            let payload = items.get(2).and_then(Value::as_bulk);
            let (Some(channel), Some(payload)) = (channel, payload) else {
                return Err(Error::Protocol("malformed message push".to_string()));
            };
            Ok(Some(PushEvent::Message {
                channel: channel.to_vec(),
                payload: payload.to_vec(),
            }))
        }
        b"pmessage" => {
            let pattern = items.get(1).and_then(Value::as_bulk);
            let channel = items.get(2).and_then(Value::as_bulk);
            let payload = items.get(3).and_then(Value::as_bulk);
            let (Some(pattern), Some(channel), Some(payload)) = (pattern, channel, payload) else {
                return Err(Error::Protocol("malformed pmessage push".to_string()));
            };
            Ok(Some(PushEvent::PMessage {
                pattern: pattern.to_vec(),
                channel: channel.to_vec(),
                payload: payload.to_vec(),
            }))
        }
        _ => Ok(None),
    }
}

fn server_error(message: Vec<u8>) -> Error {
    Error::Server(String::from_utf8_lossy(&message).into_owned())
}
