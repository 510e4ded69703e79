#![deny(missing_docs)]
//! A multithreaded, in-memory key-value node that speaks the RESP protocol, with
//! append-only persistence and clustering.
//!
//! Keys map to one of three kinds of values: binary safe strings, lists and sets. Clients
//! talk to a [`KvServer`] over TCP using the RESP wire format, the same one used by Redis
//! clients, and every command line they send is executed by a [`Database`] engine.
//!
//! ## Engines
//! [`StandaloneEngine`] is the brains of this entire operation. It is responsible for:
//! - holding a fixed number of independent, numbered databases, each a [`ConcurrentStore`]
//! - looking commands up in its [`CommandTable`], checking their argument counts and
//! executing them against the database selected by the client's [`Connection`]
//! - recording every command that changed a database in the append-only file and
//! replaying that file at start-up
//!
//! [`ClusterEngine`] wraps a standalone engine when the node is one member of a cluster. It
//! hashes keys onto the nodes of the cluster and relays each command to the node that
//! owns its key(s), over pooled connections.
//!
//! ## Supported commands
//! - keys: `DEL`, `EXISTS`, `TYPE`, `RENAME`, `RENAMENX`, `FLUSHDB`, `RANDOMKEY`
//! - strings: `GET`, `SET`, `SETNX`, `GETSET`, `MSET`, `MGET`, `MSETNX`, `INCR`, `INCRBY`,
//! `DECR`, `DECRBY`, `STRLEN`, `APPEND`, `SETRANGE`, `GETRANGE`
//! - lists: `LPUSH`, `LPUSHX`, `RPUSH`, `RPUSHX`, `LPOP`, `RPOP`, `RPOPLPUSH`, `LREM`,
//! `LLEN`, `LINDEX`, `LSET`, `LRANGE`
//! - sets: `SADD`, `SISMEMBER`, `SREM`, `SPOP`, `SCARD`, `SMEMBERS`, `SINTER`, `SUNION`,
//! `SDIFF`, `SINTERSTORE`, `SUNIONSTORE`, `SDIFFSTORE`, `SRANDMEMBER`
//! - connection: `PING`, `SELECT`
//!
//! ## Append-only file
//! The file is a plain concatenation of RESP arrays, one per command, with a `SELECT` frame
//! written whenever the target database changes. Commands that did not change anything are
//! not recorded.
//!
//! ### Client / Server executables
//! The `kvnode-server` binary starts a node, `kvnode-cli` sends a single command to one.

pub use client::PeerClient;
pub use cluster::ClusterEngine;
pub use command::{Arity, CommandTable, ExecFn};
pub use config::{Config, DEFAULT_ADDRESS};
pub use connection::Connection;
pub use engine::{Database, Db, StandaloneEngine};
pub use error::{KvError, Result};
pub use resp::{CmdLine, Reply};
pub use server::KvServer;
pub use store::{ConcurrentStore, Entity};
pub use thread_pool::{NaiveThreadPool, SharedQueueThreadPool, ThreadPool};

pub mod aof;
mod client;
pub mod cluster;
pub mod command;
pub mod commands;
mod config;
mod connection;
pub mod engine;
mod error;
pub mod resp;
mod server;
pub mod store;
pub mod thread_pool;
