use std::net::SocketAddr;

/// Per-client state the engine needs while executing commands.
///
/// Replaying the append-only file uses a connection without a peer address, which tracks
/// its selected database exactly like a real client does.
#[derive(Debug, Default, Clone)]
pub struct Connection {
    peer_addr: Option<SocketAddr>,
    db_index: usize,
}

impl Connection {
    /// state for a client connected from `peer_addr`
    pub fn new(peer_addr: SocketAddr) -> Self {
        Connection {
            peer_addr: Some(peer_addr),
            db_index: 0,
        }
    }

    /// a placeholder connection, used when no real client is involved
    pub fn fake() -> Self {
        Connection::default()
    }

    /// the address of the remote client, `None` for a placeholder connection
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// the index of the currently selected database
    pub fn db_index(&self) -> usize {
        self.db_index
    }

    /// switches the selected database
    pub fn select_db(&mut self, index: usize) {
        self.db_index = index;
    }
}
