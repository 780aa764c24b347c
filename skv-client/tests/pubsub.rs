mod common;

use std::time::Duration;

use tokio::time::timeout;

use common::{bind, wait_event, Peer, PRIMARY_INFO};
use skv_client::{Client, ConnectionEvent, Options, PushEvent};

fn fast_options() -> Options {
    Options {
        retry_delay: Some(Duration::from_millis(50)),
        ..Options::default()
    }
}

async fn next_push(pushes: &mut tokio::sync::mpsc::UnboundedReceiver<PushEvent>) -> PushEvent {
    timeout(Duration::from_secs(5), pushes.recv())
        .await
        .expect("push within deadline")
        .expect("push stream open")
}

#[tokio::test]
async fn subscriber_mode_diverts_published_messages() {
    let (listener, addr) = bind().await;
    let client = Client::with_options(addr.as_str(), fast_options());
    let mut events = client.events();
    let mut pushes = client.push_events().expect("push stream");
    assert!(client.push_events().is_none(), "stream is take-once");

    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        peer.serve_info(PRIMARY_INFO).await;

        let cmd = peer.read_command().await;
        assert_eq!(cmd, vec![b"SUBSCRIBE".to_vec(), b"news".to_vec()]);
        peer.write_raw(b"*3\r\n$9\r\nsubscribe\r\n$4\r\nnews\r\n:1\r\n")
            .await;
        peer.write_raw(b"*3\r\n$7\r\nmessage\r\n$4\r\nnews\r\n$5\r\nhello\r\n")
            .await;

        let cmd = peer.read_command().await;
        assert_eq!(cmd[0], b"UNSUBSCRIBE");
        peer.write_raw(b"*3\r\n$11\r\nunsubscribe\r\n$4\r\nnews\r\n:0\r\n")
            .await;

        let cmd = peer.read_command().await;
        assert_eq!(cmd[0], b"GET");
        peer.write_bulk(b"plain").await;
    });

    wait_event(&mut events, |e| matches!(e, ConnectionEvent::Ready { .. })).await;

    let confirm = client.subscribe(["news"]).await.expect("subscribe");
    assert_eq!(confirm.as_items().unwrap()[2].as_int(), Some(1));

    match next_push(&mut pushes).await {
        PushEvent::Message { channel, payload } => {
            assert_eq!(channel, b"news");
            assert_eq!(payload, b"hello");
        }
        other => panic!("unexpected push: {other:?}"),
    }

    // Dropping the last subscription restores request/response routing.
    client.unsubscribe(["news"]).await.expect("unsubscribe");
    let value = client.get("key").await.expect("back in band");
    assert_eq!(value.as_bulk(), Some(&b"plain"[..]));

    server.await.unwrap();
    client.end();
}

#[tokio::test]
async fn pattern_messages_carry_the_pattern() {
    let (listener, addr) = bind().await;
    let client = Client::with_options(addr.as_str(), fast_options());
    let mut events = client.events();
    let mut pushes = client.push_events().expect("push stream");

    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        peer.serve_info(PRIMARY_INFO).await;

        let cmd = peer.read_command().await;
        assert_eq!(cmd, vec![b"PSUBSCRIBE".to_vec(), b"news.*".to_vec()]);
        peer.write_raw(b"*3\r\n$10\r\npsubscribe\r\n$6\r\nnews.*\r\n:1\r\n")
            .await;
        peer.write_raw(
            b"*4\r\n$8\r\npmessage\r\n$6\r\nnews.*\r\n$8\r\nnews.iot\r\n$2\r\nhi\r\n",
        )
        .await;
    });

    wait_event(&mut events, |e| matches!(e, ConnectionEvent::Ready { .. })).await;
    client.psubscribe(["news.*"]).await.expect("psubscribe");

    match next_push(&mut pushes).await {
        PushEvent::PMessage {
            pattern,
            channel,
            payload,
        } => {
            assert_eq!(pattern, b"news.*");
            assert_eq!(channel, b"news.iot");
            assert_eq!(payload, b"hi");
        }
        other => panic!("unexpected push: {other:?}"),
    }

    server.await.unwrap();
    client.end();
}

#[tokio::test]
async fn monitor_mode_diverts_all_replies() {
    let (listener, addr) = bind().await;
    let client = Client::with_options(addr.as_str(), fast_options());
    let mut events = client.events();
    let mut pushes = client.push_events().expect("push stream");

    let server = tokio::spawn(async move {
        let mut peer = Peer::accept(&listener).await;
        peer.serve_info(PRIMARY_INFO).await;

        let cmd = peer.read_command().await;
        assert_eq!(cmd, vec![b"MONITOR".to_vec()]);
        peer.write_simple("OK").await;
        peer.write_simple("1700000000.123456 [0 127.0.0.1:51200] \"GET\" \"key\"")
            .await;
        peer.write_simple("1700000000.223456 [0 127.0.0.1:51200] \"SET\" \"key\" \"v\"")
            .await;
    });

    wait_event(&mut events, |e| matches!(e, ConnectionEvent::Ready { .. })).await;
    let ack = client.monitor().await.expect("monitor ack");
    assert_eq!(ack.as_simple(), Some(&b"OK"[..]));

    for expected in ["\"GET\"", "\"SET\""] {
        match next_push(&mut pushes).await {
            PushEvent::Monitor(value) => {
                let line = value.as_simple().expect("monitor line");
                assert!(String::from_utf8_lossy(line).contains(expected));
            }
            other => panic!("unexpected push: {other:?}"),
        }
    }

    server.await.unwrap();
    client.end();
}
