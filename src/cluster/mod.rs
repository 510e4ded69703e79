//! Running a node as one member of a cluster.
//!
//! Keys are spread over the nodes with a consistent hash ring. Every node accepts every
//! command: the [`ClusterEngine`] executes it locally when this node owns the key(s) and
//! otherwise relays it, over a pooled connection, to the node that does. `DEL` and
//! `FLUSHDB` are broadcast to all nodes.
use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::engine::guarded;
use crate::{commands, Config, Connection, Database, KvError, Reply, Result, StandaloneEngine};

mod pool;
mod ring;

pub use self::pool::{build_pool, PeerConnectionManager, PeerPool};
pub use self::ring::{NodeRing, DEFAULT_REPLICAS};

/// Prefix of a command a node relays to its peers when broadcasting.
///
/// `_local del k1 k2` runs `del k1 k2` against the receiving node's own databases, where
/// a plain `del` would be broadcast again.
pub const LOCAL_EXEC: &str = "_local";

// the commands a peer accepts behind LOCAL_EXEC
const BROADCAST_COMMANDS: &[&str] = &["del", "flushdb"];

// how a command is executed in cluster mode. `line` includes the command name
type RouteFn = fn(&Cluster, &mut Connection, &[Vec<u8>]) -> Result<Reply>;

/// An engine that routes every command to the node owning its key.
///
/// It wraps the [`StandaloneEngine`] holding this node's share of the keys. Cloning the
/// engine is cheap, all clones share the databases and the peer pools.
#[derive(Clone)]
pub struct ClusterEngine {
    inner: Arc<Cluster>,
}

struct Cluster {
    self_addr: String,
    // every node, self included
    nodes: Vec<String>,
    ring: NodeRing,
    pools: HashMap<String, PeerPool>,
    db: StandaloneEngine,
    router: HashMap<&'static str, RouteFn>,
}

impl ClusterEngine {
    /// opens this node's local databases and prepares (lazy) connection pools to its peers
    pub fn open(config: &Config) -> Result<ClusterEngine> {
        config.validate()?;
        let db = StandaloneEngine::open(config)?;
        ClusterEngine::with_engine(config, db)
    }

    /// makes `db` the local engine of a cluster node configured by `config`
    #[instrument(skip(config, db), fields(self_addr = ?config.self_addr))]
    pub fn with_engine(config: &Config, db: StandaloneEngine) -> Result<ClusterEngine> {
        let self_addr = config
            .self_addr
            .clone()
            .ok_or_else(|| KvError::Config("self_addr is required in cluster mode".to_string()))?;
        let mut nodes = config.peers.clone();
        nodes.push(self_addr.clone());
        let ring = NodeRing::new(&nodes, DEFAULT_REPLICAS);
        let pools = config
            .peers
            .iter()
            .map(|peer| (peer.clone(), build_pool(peer, config)))
            .collect();
        info!("cluster node started with {} peers", config.peers.len());

        Ok(ClusterEngine {
            inner: Arc::new(Cluster {
                self_addr,
                nodes,
                ring,
                pools,
                db,
                router: make_router(),
            }),
        })
    }

    /// the address of this node
    pub fn self_addr(&self) -> &str {
        &self.inner.self_addr
    }

    /// the addresses of every node, this one included
    pub fn nodes(&self) -> &[String] {
        &self.inner.nodes
    }

    /// the node owning `key`
    pub fn pick_node(&self, key: &[u8]) -> &str {
        self.inner.pick_node(key)
    }

    /// the engine holding this node's share of the keys
    pub fn local(&self) -> &StandaloneEngine {
        &self.inner.db
    }
}

impl Database for ClusterEngine {
    fn exec(&self, conn: &mut Connection, line: &[Vec<u8>]) -> Reply {
        guarded(line, || self.inner.exec(conn, line))
    }

    fn close(&self) {
        self.inner.db.close();
    }
}

impl Cluster {
    fn exec(&self, conn: &mut Connection, line: &[Vec<u8>]) -> Result<Reply> {
        let name = match line.first() {
            Some(name) => String::from_utf8_lossy(name).to_lowercase(),
            None => return Err(KvError::Protocol("empty command".to_string())),
        };
        let route = self.router.get(name.as_str()).ok_or_else(|| {
            KvError::Routing(format!(
                "unknown command '{}', or not supported in cluster mode",
                name
            ))
        })?;
        route(self, conn, line)
    }

    fn pick_node(&self, key: &[u8]) -> &str {
        // the ring always holds at least this node
        self.ring.pick_node(key).unwrap_or(&self.self_addr)
    }

    /// executes `line` on `peer`, in the database selected by `conn`
    fn relay(&self, peer: &str, conn: &mut Connection, line: &[Vec<u8>]) -> Result<Reply> {
        if peer == self.self_addr {
            return self.db.exec_unguarded(conn, line);
        }
        let pool = self
            .pools
            .get(peer)
            .ok_or_else(|| KvError::Routing(format!("no connection pool for {}", peer)))?;
        let mut client = pool
            .get()
            .map_err(|e| KvError::Routing(format!("could not reach {}: {}", peer, e)))?;
        debug!("relaying to {}", peer);

        let select = [b"SELECT".to_vec(), conn.db_index().to_string().into_bytes()];
        let selected = client
            .send(&select)
            .map_err(|e| KvError::Routing(format!("connection to {} failed: {}", peer, e)))?;
        if selected.is_error() {
            return Ok(selected);
        }
        client
            .send(line)
            .map_err(|e| KvError::Routing(format!("connection to {} failed: {}", peer, e)))
    }

    /// executes `line` against the local databases of every node, in node order
    fn broadcast(&self, conn: &mut Connection, line: &[Vec<u8>]) -> Vec<(&str, Result<Reply>)> {
        let mut local_line = Vec::with_capacity(line.len() + 1);
        local_line.push(LOCAL_EXEC.as_bytes().to_vec());
        local_line.extend_from_slice(line);
        self.nodes
            .iter()
            .map(|node| {
                let reply = if *node == self.self_addr {
                    self.db.exec_unguarded(conn, line)
                } else {
                    self.relay(node, conn, &local_line)
                };
                (node.as_str(), reply)
            })
            .collect()
    }

    /// the node owning every key in `keys`, or a cross-slot error naming `command`
    fn pick_single_node(&self, command: &str, keys: &[&[u8]]) -> Result<&str> {
        let mut owners = keys.iter().map(|key| self.pick_node(key));
        let first = owners
            .next()
            .ok_or_else(|| KvError::WrongArgCount(command.to_string()))?;
        if owners.all(|owner| owner == first) {
            Ok(first)
        } else {
            Err(KvError::Routing(format!(
                "{} must within one slot in cluster mode",
                command
            )))
        }
    }
}

fn command_name(line: &[Vec<u8>]) -> String {
    line.first()
        .map(|n| String::from_utf8_lossy(n).to_lowercase())
        .unwrap_or_default()
}

// the keys a multi-key command touches
fn keys_of<'a>(name: &str, args: &'a [Vec<u8>]) -> Vec<&'a [u8]> {
    match name {
        "mset" | "msetnx" => args.iter().step_by(2).map(Vec::as_slice).collect(),
        _ => args.iter().map(Vec::as_slice).collect(),
    }
}

fn exec_local(cluster: &Cluster, conn: &mut Connection, line: &[Vec<u8>]) -> Result<Reply> {
    cluster.db.exec_unguarded(conn, line)
}

/// runs the share of a broadcast command that belongs to this node
fn exec_broadcast_share(cluster: &Cluster, conn: &mut Connection, line: &[Vec<u8>]) -> Result<Reply> {
    let share = &line[1..];
    let name = command_name(share);
    if !BROADCAST_COMMANDS.contains(&name.as_str()) {
        return Err(KvError::Routing(format!("'{}' is not a broadcast command", name)));
    }
    cluster.db.exec_unguarded(conn, share)
}

fn exec_by_key(cluster: &Cluster, conn: &mut Connection, line: &[Vec<u8>]) -> Result<Reply> {
    let key = line
        .get(1)
        .ok_or_else(|| KvError::WrongArgCount(command_name(line)))?;
    let peer = cluster.pick_node(key);
    cluster.relay(peer, conn, line)
}

fn exec_same_slot(cluster: &Cluster, conn: &mut Connection, line: &[Vec<u8>]) -> Result<Reply> {
    let name = command_name(line);
    let keys = keys_of(&name, &line[1..]);
    let peer = cluster.pick_single_node(&name, &keys)?;
    cluster.relay(peer, conn, line)
}

fn exec_rename(cluster: &Cluster, conn: &mut Connection, line: &[Vec<u8>]) -> Result<Reply> {
    let name = command_name(line);
    if line.len() != 3 {
        return Err(KvError::WrongArgCount(name));
    }
    let peer = cluster.pick_single_node(&name, &[line[1].as_slice(), line[2].as_slice()])?;
    cluster.relay(peer, conn, line)
}

/// removes the keys from every node, replying with the total number removed
///
/// Nodes that already removed their keys keep them removed if another node fails.
fn exec_del(cluster: &Cluster, conn: &mut Connection, line: &[Vec<u8>]) -> Result<Reply> {
    if line.len() < 2 {
        return Err(KvError::WrongArgCount("del".to_string()));
    }
    let mut deleted = 0;
    for (node, reply) in cluster.broadcast(conn, line) {
        match reply {
            Ok(Reply::Int(n)) => deleted += n,
            Ok(Reply::Error(msg)) => return Err(KvError::Routing(format!("error occurs: {}", msg))),
            Ok(other) => {
                return Err(KvError::Routing(format!(
                    "error occurs: unexpected reply from {}: {:?}",
                    node, other
                )))
            }
            Err(e) => return Err(KvError::Routing(format!("error occurs: {}", e))),
        }
    }
    Ok(Reply::Int(deleted))
}

fn exec_flush_db(cluster: &Cluster, conn: &mut Connection, line: &[Vec<u8>]) -> Result<Reply> {
    for (_, reply) in cluster.broadcast(conn, line) {
        match reply {
            Ok(Reply::Error(msg)) => return Err(KvError::Routing(format!("error occurs: {}", msg))),
            Ok(_) => {}
            Err(e) => return Err(KvError::Routing(format!("error occurs: {}", e))),
        }
    }
    Ok(Reply::ok())
}

fn make_router() -> HashMap<&'static str, RouteFn> {
    let mut router: HashMap<&'static str, RouteFn> = HashMap::new();
    router.insert("select", exec_local);
    router.insert(LOCAL_EXEC, exec_broadcast_share);
    for &(name, _, _) in commands::COMMANDS {
        let route: RouteFn = match name {
            "ping" | "randomkey" => exec_local,
            "del" => exec_del,
            "flushdb" => exec_flush_db,
            "rename" | "renamenx" => exec_rename,
            "mset" | "msetnx" | "mget" | "exists" | "rpoplpush" | "sinter" | "sinterstore"
            | "sunion" | "sunionstore" | "sdiff" | "sdiffstore" => exec_same_slot,
            _ => exec_by_key,
        };
        router.insert(name, route);
    }
    router
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_command_has_a_route() {
        let router = make_router();
        for &(name, _, _) in commands::COMMANDS {
            assert!(router.contains_key(name), "{} is not routed", name);
        }
        assert!(router.contains_key("select"));
        assert!(router.contains_key(LOCAL_EXEC));
    }

    #[test]
    fn broadcast_commands_are_routed_as_broadcasts() {
        let router = make_router();
        for name in BROADCAST_COMMANDS {
            assert!(router.contains_key(name));
            assert!(commands::COMMANDS.iter().any(|&(n, _, _)| n == *name));
        }
    }

    #[test]
    fn mset_keys_are_every_other_argument() {
        let args: Vec<Vec<u8>> = vec![b"a".to_vec(), b"1".to_vec(), b"b".to_vec(), b"2".to_vec()];
        assert_eq!(keys_of("mset", &args), vec![&b"a"[..], &b"b"[..]]);
        assert_eq!(keys_of("mget", &args).len(), 4);
    }
}
