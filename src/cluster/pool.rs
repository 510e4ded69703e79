//! Pooled connections to the other nodes of the cluster.
use std::time::Duration;

use tracing::debug;

use crate::{Config, KvError, PeerClient, Result};

/// a bounded pool of connections to one peer
pub type PeerPool = r2d2::Pool<PeerConnectionManager>;

/// An [`r2d2::ManageConnection`] that opens [`PeerClient`] connections to a single peer.
///
/// A connection is handed out without a health check. Once a command sent over it failed at
/// the transport level it reports itself as broken and the pool discards it instead of
/// taking it back.
#[derive(Debug, Clone)]
pub struct PeerConnectionManager {
    addr: String,
    timeout: Option<Duration>,
}

impl PeerConnectionManager {
    /// a manager for connections to `addr`, `timeout` bounds connecting, reads and writes
    pub fn new(addr: impl Into<String>, timeout: Option<Duration>) -> Self {
        PeerConnectionManager {
            addr: addr.into(),
            timeout,
        }
    }

    /// the address of the peer
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl r2d2::ManageConnection for PeerConnectionManager {
    type Connection = PeerClient;
    type Error = KvError;

    fn connect(&self) -> Result<PeerClient> {
        debug!("opening connection to peer {}", self.addr);
        PeerClient::connect_with_timeout(self.addr.as_str(), self.timeout)
    }

    fn is_valid(&self, _conn: &mut PeerClient) -> Result<()> {
        Ok(())
    }

    fn has_broken(&self, conn: &mut PeerClient) -> bool {
        conn.is_broken()
    }
}

/// Builds the pool for `peer`.
///
/// No connection is opened up front, the first borrow connects.
pub fn build_pool(peer: &str, config: &Config) -> PeerPool {
    let timeout = Duration::from_millis(config.peer_timeout_ms);
    r2d2::Pool::builder()
        .max_size(config.peer_pool_size)
        .min_idle(Some(0))
        .test_on_check_out(false)
        .connection_timeout(timeout)
        .build_unchecked(PeerConnectionManager::new(peer, Some(timeout)))
}
