mod common;

use std::time::Duration;

use tokio::net::TcpListener;
use tokio::time::timeout;

use common::{bind, wait_event, Peer, PRIMARY_INFO, REPLICA_INFO, SENTINEL_INFO};
use skv_client::{Client, ConnectionEvent, Error, Host, Options, SentinelConfig};

fn sentinel_options() -> Options {
    Options {
        retry_delay: Some(Duration::from_millis(50)),
        sentinel_stagger: Duration::from_millis(50),
        ..Options::default()
    }
}

enum SentinelReply {
    /// Answer with the given primary address.
    Addr(String, u16),
    /// Answer with a nil array (primary unknown).
    Nil,
    /// Accept the query but never answer.
    Hold,
}

/// Serves one sentinel endpoint: handshake, one discovery query, then
/// holds the socket open so the sentinel client idles quietly.
async fn sentinel_peer(listener: TcpListener, name: &'static [u8], reply: SentinelReply) {
    let mut peer = Peer::accept(&listener).await;
    peer.serve_info(SENTINEL_INFO).await;

    let cmd = peer.read_command().await;
    assert_eq!(cmd[0], b"SENTINEL");
    assert_eq!(cmd[1], b"get-master-addr-by-name");
    assert_eq!(cmd[2], name);

    match reply {
        SentinelReply::Addr(host, port) => {
            let port = port.to_string();
            peer.write_raw(
                format!(
                    "*2\r\n${}\r\n{}\r\n${}\r\n{}\r\n",
                    host.len(),
                    host,
                    port.len(),
                    port
                )
                .as_bytes(),
            )
            .await;
        }
        SentinelReply::Nil => peer.write_nil_array().await,
        SentinelReply::Hold => {}
    }
    std::future::pending::<()>().await;
}

#[tokio::test]
async fn discovery_uses_first_successful_sentinel() {
    let (primary_listener, _) = bind().await;
    let primary_addr = primary_listener.local_addr().unwrap();

    let (s1, s1_addr) = bind().await;
    let (s2, s2_addr) = bind().await;
    let (s3, s3_addr) = bind().await;

    // The first sentinel does not know the primary; the second does. The
    // third never answers, so resolution must not wait for it.
    tokio::spawn(sentinel_peer(s1, b"mymaster", SentinelReply::Nil));
    tokio::spawn(sentinel_peer(
        s2,
        b"mymaster",
        SentinelReply::Addr(primary_addr.ip().to_string(), primary_addr.port()),
    ));
    tokio::spawn(sentinel_peer(s3, b"mymaster", SentinelReply::Hold));

    let primary = tokio::spawn(async move {
        let mut peer = Peer::accept(&primary_listener).await;
        peer.serve_info(PRIMARY_INFO).await;
        let cmd = peer.read_command().await;
        assert_eq!(cmd, vec![b"GET".to_vec(), b"key".to_vec()]);
        peer.write_bulk(b"from-primary").await;
    });

    let config = SentinelConfig {
        name: "mymaster".to_string(),
        hosts: vec![
            Host::parse(&s1_addr),
            Host::parse(&s2_addr),
            Host::parse(&s3_addr),
        ],
    };
    let client = Client::with_options(config, sentinel_options());

    let value = timeout(Duration::from_secs(5), client.get("key"))
        .await
        .expect("resolution must not wait for the silent sentinel")
        .expect("get");
    assert_eq!(value.as_bulk(), Some(&b"from-primary"[..]));

    primary.await.unwrap();
    client.end();
}

#[tokio::test]
async fn non_primary_candidate_fails_resolution() {
    let (replica_listener, _) = bind().await;
    let replica_addr = replica_listener.local_addr().unwrap();

    let (s1, s1_addr) = bind().await;
    tokio::spawn(sentinel_peer(
        s1,
        b"mymaster",
        SentinelReply::Addr(replica_addr.ip().to_string(), replica_addr.port()),
    ));

    // The sentinel's answer is stale: the node it names is a replica.
    let replica = tokio::spawn(async move {
        let mut peer = Peer::accept(&replica_listener).await;
        peer.serve_info(REPLICA_INFO).await;
    });

    let config = SentinelConfig {
        name: "mymaster".to_string(),
        hosts: vec![Host::parse(&s1_addr)],
    };
    let opts = Options {
        retry_delay: None,
        sentinel_stagger: Duration::from_millis(50),
        ..Options::default()
    };
    let client = Client::with_options(config, opts);
    let mut events = client.events();

    let failed = wait_event(&mut events, |e| {
        matches!(e, ConnectionEvent::ConnectFailed { .. })
    })
    .await;
    if let ConnectionEvent::ConnectFailed { error } = failed {
        assert!(
            error.contains("unable to obtain primary connection"),
            "unexpected failure: {error}"
        );
    }

    wait_event(&mut events, |e| matches!(e, ConnectionEvent::Ended)).await;
    assert!(matches!(client.get("k").await, Err(Error::ClientEnded)));
    replica.await.unwrap();
}

#[tokio::test]
async fn exhausted_sentinels_fail_resolution() {
    let (s1, s1_addr) = bind().await;
    let (s2, s2_addr) = bind().await;
    tokio::spawn(sentinel_peer(s1, b"jobs", SentinelReply::Nil));
    tokio::spawn(sentinel_peer(s2, b"jobs", SentinelReply::Nil));

    let config = SentinelConfig {
        name: "jobs".to_string(),
        hosts: vec![Host::parse(&s1_addr), Host::parse(&s2_addr)],
    };
    let opts = Options {
        retry_delay: None,
        sentinel_stagger: Duration::from_millis(50),
        ..Options::default()
    };
    let client = Client::with_options(config, opts);
    let mut events = client.events();

    let failed = wait_event(&mut events, |e| {
        matches!(e, ConnectionEvent::ConnectFailed { .. })
    })
    .await;
    if let ConnectionEvent::ConnectFailed { error } = failed {
        assert!(
            error.contains("unable to determine primary from sentinels for jobs"),
            "unexpected failure: {error}"
        );
    }
    wait_event(&mut events, |e| matches!(e, ConnectionEvent::Ended)).await;
}

#[tokio::test]
async fn empty_sentinel_set_is_an_error() {
    let config = SentinelConfig {
        name: "mymaster".to_string(),
        hosts: Vec::new(),
    };
    let opts = Options {
        retry_delay: None,
        ..Options::default()
    };
    let client = Client::with_options(config, opts);
    let mut events = client.events();

    let failed = wait_event(&mut events, |e| {
        matches!(e, ConnectionEvent::ConnectFailed { .. })
    })
    .await;
    if let ConnectionEvent::ConnectFailed { error } = failed {
        assert!(error.contains("no sentinels configured"));
    }
    wait_event(&mut events, |e| matches!(e, ConnectionEvent::Ended)).await;
}
