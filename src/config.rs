use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::debug;

use crate::{KvError, Result};

/// the address a node listens on when none is configured
pub const DEFAULT_ADDRESS: &str = "127.0.0.1:6399";

/// Settings of one node.
///
/// Every field has a default, so a configuration file only needs to list what it changes.
///
/// ```json
/// {
///     "bind": "127.0.0.1:6399",
///     "append_only": true,
///     "self_addr": "127.0.0.1:6399",
///     "peers": ["127.0.0.1:6400", "127.0.0.1:6401"]
/// }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Config {
    /// the address the server listens on
    pub bind: String,
    /// the number of databases
    pub databases: usize,
    /// whether mutating commands are recorded in the append-only file
    pub append_only: bool,
    /// path of the append-only file
    pub append_filename: PathBuf,
    /// the address other nodes use to reach this node, required for cluster mode
    pub self_addr: Option<String>,
    /// the addresses of the other nodes of the cluster
    pub peers: Vec<String>,
    /// maximum number of concurrently served clients, 0 serves each client on its own thread
    pub max_clients: u32,
    /// maximum number of pooled connections to each peer
    pub peer_pool_size: u32,
    /// how long (in milliseconds) to wait for a pooled peer connection
    pub peer_timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind: DEFAULT_ADDRESS.to_string(),
            databases: 16,
            append_only: false,
            append_filename: PathBuf::from("appendonly.aof"),
            self_addr: None,
            peers: Vec::new(),
            max_clients: 0,
            peer_pool_size: 8,
            peer_timeout_ms: 3000,
        }
    }
}

impl Config {
    /// reads a JSON configuration file
    pub fn from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        debug!(?path, ?config, "configuration loaded");
        Ok(config)
    }

    /// returns true if this node is part of a cluster
    pub fn is_cluster(&self) -> bool {
        self.self_addr.is_some() && !self.peers.is_empty()
    }

    /// checks that the settings can be used to start a node
    pub fn validate(&self) -> Result<()> {
        if self.databases == 0 {
            return Err(KvError::Config("databases must be at least 1".to_string()));
        }
        if !self.peers.is_empty() && self.self_addr.is_none() {
            return Err(KvError::Config("peers are configured but self_addr is not".to_string()));
        }
        if let Some(self_addr) = &self.self_addr {
            if self.peers.contains(self_addr) {
                return Err(KvError::Config(format!("{} is listed as its own peer", self_addr)));
            }
        }
        if self.peer_pool_size == 0 {
            return Err(KvError::Config("peer_pool_size must be at least 1".to_string()));
        }
        Ok(())
    }
}
