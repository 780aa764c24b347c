//! # Host Resolution Strategies
//!
//! Purpose: Decide which endpoint a connection attempt should target.
//!
//! ## Design Principles
//! 1. **Closed Variant Set**: Static and sentinel resolution share one
//!    interface through an enum rather than inheritance.
//! 2. **First Success Wins**: Sentinel polling returns the first non-empty
//!    answer; it is deliberately not a quorum.
//! 3. **Validation Hook**: The resolver confirms the candidate's role after
//!    the transport's introspection handshake, so a stale sentinel answer
//!    fails the attempt instead of silently connecting to a replica.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinSet;
use tracing::{debug, warn};

use skv_common::{
    ConnectTarget, Error, Host, Result, SentinelConfig, ServerInfo, Value, DEFAULT_PORT,
};

use crate::client::{Client, Options};

/// Strategy producing the endpoint for each connection attempt.
pub(crate) enum Resolver {
    /// Fixed endpoint.
    Static(StaticResolver),
    /// Sentinel-driven primary discovery.
    Sentinel(SentinelResolver),
}

impl Resolver {
    pub fn for_target(target: ConnectTarget, opts: &Options) -> Resolver {
        match target {
            ConnectTarget::Host(host) => Resolver::Static(StaticResolver { host }),
            ConnectTarget::Sentinel(config) => {
                Resolver::Sentinel(SentinelResolver::new(config, opts.sentinel_stagger))
            }
        }
    }

    /// Produces the host for the next connection attempt.
    pub async fn resolve(&self) -> Result<Host> {
        match self {
            Resolver::Static(fixed) => Ok(fixed.host.clone()),
            Resolver::Sentinel(sentinel) => sentinel.resolve().await,
        }
    }

    /// Validates the candidate's introspection reply before it serves
    /// traffic.
    pub fn confirm(&self, info: &ServerInfo) -> Result<()> {
        match self {
            Resolver::Static(_) => Ok(()),
            Resolver::Sentinel(_) => {
                if info.is_primary() {
                    Ok(())
                } else {
                    Err(Error::NotPrimary)
                }
            }
        }
    }

    /// Tears down any resources owned by the strategy.
    pub fn end(&self) {
        if let Resolver::Sentinel(sentinel) = self {
            sentinel.end();
        }
    }
}

/// Fixed-endpoint resolution.
pub(crate) struct StaticResolver {
    host: Host,
}

/// Sentinel-backed primary discovery.
///
/// Owns one full client per configured sentinel. Those clients keep their
/// own reconnect loops and offline buffers, so a sentinel that is briefly
/// down answers the next resolution instead of being dropped.
pub(crate) struct SentinelResolver {
    name: String,
    stagger: Duration,
    sentinels: Vec<Arc<Client>>,
}

impl SentinelResolver {
    fn new(config: SentinelConfig, stagger: Duration) -> Self {
        let sentinels = config
            .hosts
            .into_iter()
            .map(|host| Arc::new(Client::connect(host)))
            .collect();
        SentinelResolver {
            name: config.name,
            stagger,
            sentinels,
        }
    }

    async fn resolve(&self) -> Result<Host> {
        if self.sentinels.is_empty() {
            return Err(Error::NoSentinels);
        }

        let mut queries = JoinSet::new();
        for (idx, sentinel) in self.sentinels.iter().enumerate() {
            let sentinel = Arc::clone(sentinel);
            let name = self.name.clone();
            let delay = self.stagger * idx as u32;
            queries.spawn(async move {
                // Staggered starts let a fast sentinel short-circuit the rest.
                tokio::time::sleep(delay).await;
                sentinel
                    .send("SENTINEL", vec!["get-master-addr-by-name".into(), name.into()])
                    .await
            });
        }

        while let Some(joined) = queries.join_next().await {
            match joined {
                Ok(Ok(reply)) => {
                    if let Some(host) = primary_from_reply(&reply) {
                        debug!(%host, name = %self.name, "sentinel reported primary");
                        // Dropping the set aborts the queries still pending.
                        return Ok(host);
                    }
                }
                Ok(Err(error)) => warn!(error = %error, "sentinel query failed"),
                Err(_) => {}
            }
        }

        Err(Error::NoPrimary {
            name: self.name.clone(),
        })
    }

    fn end(&self) {
        for sentinel in &self.sentinels {
            sentinel.end();
        }
    }
}

/// Extracts a `[host, port]` pair from a sentinel reply.
///
/// Nil arrays and malformed replies count as "no answer" so the poll moves
/// on to the next sentinel.
fn primary_from_reply(reply: &Value) -> Option<Host> {
    let items = reply.as_items()?;
    let host = std::str::from_utf8(items.first()?.as_bulk()?).ok()?;
    let port = std::str::from_utf8(items.get(1)?.as_bulk()?).ok()?;
    if host.is_empty() {
        return None;
    }
    let port = port.parse::<u16>().ok().filter(|&p| p != 0).unwrap_or(DEFAULT_PORT);
    Some(Host::new(host, port))
}
