//! Command table.
//!
//! A static mapping from method names to wire command names and call
//! shapes, expanded into convenience methods on [`Client`]. The core
//! transport and queueing layers never consult this table; new commands can
//! always be issued through [`Client::send`] directly.

use skv_common::{Arg, Result, Value};

use crate::client::Client;

macro_rules! command_table {
    ($(
        $(#[$meta:meta])*
        $method:ident => $name:literal ( $($arg:ident),* ) $([ $rest:ident ])? ;
    )*) => {
        /// Wire names of every command with a generated method.
        pub const COMMANDS: &[&str] = &[$($name),*];

        impl Client {
            $(
                $(#[$meta])*
                pub async fn $method(
                    &self
                    $(, $arg: impl Into<Arg>)*
                    $(, $rest: impl IntoIterator<Item = impl Into<Arg>>)?
                ) -> Result<Value> {
                    #[allow(unused_mut)]
                    let mut args: Vec<Arg> = Vec::new();
                    $( args.push($arg.into()); )*
                    $( args.extend($rest.into_iter().map(Into::into)); )?
                    self.send($name, args).await
                }
            )*
        }
    };
}

command_table! {
    /// Checks connection liveness.
    ping => "PING" ();
    echo => "ECHO" (message);
    select => "SELECT" (index);
    dbsize => "DBSIZE" ();
    flushdb => "FLUSHDB" ();
    flushall => "FLUSHALL" ();
    /// Fetches the raw introspection payload.
    info => "INFO" ();
    /// Diverts this connection into monitor mode; all further replies
    /// arrive as push events.
    monitor => "MONITOR" ();
    bgsave => "BGSAVE" ();
    lastsave => "LASTSAVE" ();

    get => "GET" (key);
    set => "SET" (key, value);
    setnx => "SETNX" (key, value);
    setex => "SETEX" (key, seconds, value);
    getset => "GETSET" (key, value);
    append => "APPEND" (key, value);
    strlen => "STRLEN" (key);
    incr => "INCR" (key);
    decr => "DECR" (key);
    incrby => "INCRBY" (key, delta);
    decrby => "DECRBY" (key, delta);
    mget => "MGET" () [keys];
    mset => "MSET" () [pairs];

    del => "DEL" () [keys];
    exists => "EXISTS" (key);
    expire => "EXPIRE" (key, seconds);
    persist => "PERSIST" (key);
    ttl => "TTL" (key);
    key_type => "TYPE" (key);
    keys => "KEYS" (pattern);
    rename => "RENAME" (source, destination);

    lpush => "LPUSH" (key) [values];
    rpush => "RPUSH" (key) [values];
    lpop => "LPOP" (key);
    rpop => "RPOP" (key);
    llen => "LLEN" (key);
    lindex => "LINDEX" (key, index);
    lrange => "LRANGE" (key, start, stop);

    hset => "HSET" (key, field, value);
    hget => "HGET" (key, field);
    hdel => "HDEL" (key) [fields];
    hgetall => "HGETALL" (key);

    sadd => "SADD" (key) [members];
    srem => "SREM" (key) [members];
    scard => "SCARD" (key);
    sismember => "SISMEMBER" (key, member);
    smembers => "SMEMBERS" (key);

    zadd => "ZADD" (key, score, member);
    zrem => "ZREM" (key) [members];
    zcard => "ZCARD" (key);
    zscore => "ZSCORE" (key, member);
    zrange => "ZRANGE" (key, start, stop);

    publish => "PUBLISH" (channel, message);
    /// Enters subscriber mode; published messages arrive as push events
    /// until every subscription is released.
    subscribe => "SUBSCRIBE" () [channels];
    unsubscribe => "UNSUBSCRIBE" () [channels];
    psubscribe => "PSUBSCRIBE" () [patterns];
    punsubscribe => "PUNSUBSCRIBE" () [patterns];
}
