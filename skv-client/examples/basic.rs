//! Minimal end-to-end demo: connect, issue a few commands, watch lifecycle
//! events.
//!
//! Run against a local server with:
//! `RUST_LOG=skv_client=debug cargo run --example basic`

use skv_client::Client;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let client = Client::connect("127.0.0.1:6379");

    let mut events = client.events();
    tokio::spawn(async move {
        while let Ok(event) = events.recv().await {
            eprintln!("event: {event:?}");
        }
    });

    client.set("greeting", "hello").await?;
    let value = client.get("greeting").await?;
    match value.as_bulk() {
        Some(data) => println!("greeting = {}", String::from_utf8_lossy(data)),
        None => println!("greeting is unset"),
    }

    client.incr("visits").await?;
    let visits = client.get("visits").await?;
    println!("visits = {:?}", visits.as_bulk().map(String::from_utf8_lossy));

    client.quit().await?;
    Ok(())
}
