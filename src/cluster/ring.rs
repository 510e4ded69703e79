//! Consistent hashing of keys onto nodes.
use std::collections::HashMap;

/// the number of points each node occupies on the ring
pub const DEFAULT_REPLICAS: usize = 160;

/// A consistent hash ring over a fixed set of nodes.
///
/// Each node is placed on the ring `replicas` times, at the CRC-32 of its address prefixed
/// by the replica number. A key belongs to the first node point at or after the key's own
/// hash, wrapping around at the end of the ring.
#[derive(Debug, Clone)]
pub struct NodeRing {
    points: Vec<u32>,
    owners: HashMap<u32, String>,
}

impl NodeRing {
    /// builds a ring over `nodes`
    pub fn new<S: AsRef<str>>(nodes: &[S], replicas: usize) -> Self {
        let mut points = Vec::with_capacity(nodes.len() * replicas);
        let mut owners = HashMap::with_capacity(nodes.len() * replicas);
        for node in nodes {
            let node = node.as_ref();
            for i in 0..replicas {
                let point = crc32fast::hash(format!("{}{}", i, node).as_bytes());
                // first node wins a (rare) collision
                if !owners.contains_key(&point) {
                    owners.insert(point, node.to_string());
                    points.push(point);
                }
            }
        }
        points.sort_unstable();
        NodeRing { points, owners }
    }

    /// returns true if the ring holds no nodes
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// the node that owns `key`, `None` if the ring is empty
    pub fn pick_node(&self, key: &[u8]) -> Option<&str> {
        if self.points.is_empty() {
            return None;
        }
        let hash = crc32fast::hash(key);
        let mut idx = self.points.partition_point(|&p| p < hash);
        if idx == self.points.len() {
            idx = 0;
        }
        self.owners.get(&self.points[idx]).map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ring_owns_nothing() {
        let ring = NodeRing::new::<&str>(&[], DEFAULT_REPLICAS);
        assert!(ring.is_empty());
        assert_eq!(ring.pick_node(b"key"), None);
    }

    #[test]
    fn single_node_owns_every_key() {
        let ring = NodeRing::new(&["a:1"], DEFAULT_REPLICAS);
        for i in 0..100 {
            assert_eq!(ring.pick_node(format!("k{}", i).as_bytes()), Some("a:1"));
        }
    }

    #[test]
    fn picks_are_deterministic() {
        let nodes = ["127.0.0.1:7001", "127.0.0.1:7002", "127.0.0.1:7003"];
        let a = NodeRing::new(&nodes, DEFAULT_REPLICAS);
        let mut reversed = nodes;
        reversed.reverse();
        let b = NodeRing::new(&reversed, DEFAULT_REPLICAS);
        for i in 0..1000 {
            let key = format!("key:{}", i);
            assert_eq!(a.pick_node(key.as_bytes()), b.pick_node(key.as_bytes()));
        }
    }

    #[test]
    fn keys_spread_over_every_node() {
        let nodes = ["127.0.0.1:7001", "127.0.0.1:7002", "127.0.0.1:7003"];
        let ring = NodeRing::new(&nodes, DEFAULT_REPLICAS);
        let mut counts: HashMap<&str, usize> = HashMap::new();
        let total = 30_000;
        for i in 0..total {
            let node = ring.pick_node(format!("key:{}", i).as_bytes()).unwrap();
            *counts.entry(node).or_default() += 1;
        }
        assert_eq!(counts.len(), 3);
        for (node, count) in counts {
            // a third each, give or take
            assert!(count > total / 6 && count < total / 2, "{} owns {} keys", node, count);
        }
    }
}
