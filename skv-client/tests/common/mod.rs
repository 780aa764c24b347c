#![allow(dead_code)]

//! In-process mock servers for exercising the client end to end.

use std::future::Future;
use std::pin::Pin;
use std::task::Poll;
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tokio::time::timeout;

use skv_client::{ConnectionEvent, ReplyReader};

pub const PRIMARY_INFO: &str = "role:master\r\nloading:0\r\n";
pub const REPLICA_INFO: &str = "role:slave\r\nloading:0\r\n";
pub const SENTINEL_INFO: &str = "role:sentinel\r\n";
pub const LOADING_INFO: &str = "role:master\r\nloading:1\r\n";

pub async fn bind() -> (TcpListener, String) {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr").to_string();
    (listener, addr)
}

/// One accepted client connection, parsed with the real codec.
pub struct Peer {
    stream: TcpStream,
    reader: ReplyReader,
    scratch: Vec<u8>,
}

impl Peer {
    pub async fn accept(listener: &TcpListener) -> Peer {
        let (stream, _) = listener.accept().await.expect("accept");
        Peer {
            stream,
            reader: ReplyReader::new(),
            scratch: vec![0u8; 4096],
        }
    }

    /// Reads one command frame (an array of bulk strings).
    pub async fn read_command(&mut self) -> Vec<Vec<u8>> {
        loop {
            if let Some(value) = self.reader.next().expect("well-formed command") {
                let items = value.as_items().expect("command array");
                return items
                    .iter()
                    .map(|item| item.as_bulk().expect("bulk argument").to_vec())
                    .collect();
            }
            let n = self.stream.read(&mut self.scratch).await.expect("read");
            assert!(n > 0, "client closed while a command was expected");
            self.reader.feed(&self.scratch[..n]);
        }
    }

    pub async fn write_raw(&mut self, bytes: &[u8]) {
        self.stream.write_all(bytes).await.expect("write");
    }

    pub async fn write_simple(&mut self, text: &str) {
        self.write_raw(format!("+{text}\r\n").as_bytes()).await;
    }

    pub async fn write_error(&mut self, text: &str) {
        self.write_raw(format!("-{text}\r\n").as_bytes()).await;
    }

    pub async fn write_integer(&mut self, value: i64) {
        self.write_raw(format!(":{value}\r\n").as_bytes()).await;
    }

    pub async fn write_bulk(&mut self, data: &[u8]) {
        let mut frame = format!("${}\r\n", data.len()).into_bytes();
        frame.extend_from_slice(data);
        frame.extend_from_slice(b"\r\n");
        self.write_raw(&frame).await;
    }

    pub async fn write_nil_array(&mut self) {
        self.write_raw(b"*-1\r\n").await;
    }

    /// Answers the INFO handshake issued on every fresh connection.
    pub async fn serve_info(&mut self, payload: &str) {
        let cmd = self.read_command().await;
        assert_eq!(cmd[0], b"INFO");
        self.write_bulk(payload.as_bytes()).await;
    }
}

/// Waits for the next lifecycle event matching the predicate, skipping
/// everything else.
pub async fn wait_event(
    events: &mut broadcast::Receiver<ConnectionEvent>,
    mut pred: impl FnMut(&ConnectionEvent) -> bool,
) -> ConnectionEvent {
    timeout(Duration::from_secs(5), async {
        loop {
            let event = events.recv().await.expect("events stream");
            if pred(&event) {
                return event;
            }
        }
    })
    .await
    .expect("event within deadline")
}

/// Polls a future exactly once so the operation it carries is enqueued
/// without waiting for its reply. Submission order stays deterministic.
pub async fn poll_once<F: Future + ?Sized>(fut: &mut Pin<Box<F>>) {
    std::future::poll_fn(|cx| {
        let _ = fut.as_mut().poll(cx);
        Poll::Ready(())
    })
    .await;
}
