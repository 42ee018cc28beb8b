// MIT License

// Copyright (c) 2016 Jerome Froelich

// Permission is hereby granted, free of charge, to any person obtaining a copy
// of this software and associated documentation files (the "Software"), to deal
// in the Software without restriction, including without limitation the rights
// to use, copy, modify, merge, publish, distribute, sublicense, and/or sell
// copies of the Software, and to permit persons to whom the Software is
// furnished to do so, subject to the following conditions:

// The above copyright notice and this permission notice shall be included in
// all copies or substantial portions of the Software.

// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR
// IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
// FITNESS FOR A PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT SHALL THE
// AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER
// LIABILITY, WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM,
// OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE
// SOFTWARE.

//! A thread-safe consistent hash ring with virtual nodes.
//!
//! `HashRing` maps string keys onto a changing set of node identifiers so that
//! adding or removing a node only remaps a small share of the keys. Every node
//! is placed on a 32-bit ring `replicas` times (its virtual nodes), which
//! smooths out the size of the arc each node ends up owning.
//!
//! The ring's API consists of `add` and `remove` for changing membership, and
//! `get` and `get_n` for routing a key to one node or to a preference-ordered
//! list of distinct nodes. All methods take `&self`; share the ring between
//! threads with an `Arc`.
//!
//! ## Example
//!
//! ``` rust
//! use {std::sync::Arc, vnode_ring::HashRing};
//!
//! let ring = Arc::new(HashRing::new(100));
//! ring.add(["10.0.0.1:7000", "10.0.0.2:7000", "10.0.0.3:7000"]);
//!
//! let owner = ring.get("user:1001");
//! assert!(ring.contains(&owner));
//!
//! let replicas = ring.get_n("user:1001", 2);
//! assert_eq!(replicas.len(), 2);
//! assert_eq!(replicas[0], owner);
//!
//! ring.remove(["10.0.0.2:7000"]);
//! assert_eq!(ring.len(), 2);
//! ```

use {
    parking_lot::RwLock,
    std::collections::{HashMap, HashSet},
    tracing::{debug, trace},
};

pub use {
    config::{RingConfig, DEFAULT_REPLICAS},
    hasher::{DefaultHashBuilder, RingHasher, SipRingHasher},
};

pub mod config;
pub mod hasher;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum Error {
    #[error("Node not found")]
    NodeNotFound,
}

/// Ring contents, guarded as a single unit by the ring's lock.
#[derive(Debug, Default)]
struct State {
    /// Sorted, strictly ascending virtual node positions.
    positions: Vec<u32>,
    /// Position -> owning node. Exactly one entry per element of `positions`.
    owners: HashMap<u32, String>,
    members: HashSet<String>,
}

impl State {
    /// Index of the first position at or after `hash`, wrapping to 0 past the
    /// last one. `None` if there are no positions.
    #[inline]
    fn find_index(&self, hash: u32) -> Option<usize> {
        if self.positions.is_empty() {
            return None;
        }

        let index = self.positions.partition_point(|pos| *pos < hash);

        Some(if index == self.positions.len() { 0 } else { index })
    }
}

pub struct HashRing<S: RingHasher = DefaultHashBuilder> {
    hash_builder: S,
    replicas: usize,
    state: RwLock<State>,
}

impl Default for HashRing {
    fn default() -> Self {
        HashRing::new(DEFAULT_REPLICAS)
    }
}

impl HashRing {
    /// Creates an empty `HashRing` using the SHA-256 based default hasher.
    /// A `replicas` of 0 selects `DEFAULT_REPLICAS`.
    pub fn new(replicas: usize) -> Self {
        HashRing::with_hasher(replicas, DefaultHashBuilder)
    }

    pub fn from_config(config: &RingConfig) -> Self {
        HashRing::new(config.effective_replicas())
    }
}

impl<S: RingHasher> std::fmt::Debug for HashRing<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();

        f.debug_struct("HashRing")
            .field("replicas", &self.replicas)
            .field("members", &state.members.len())
            .field("vnodes", &state.positions.len())
            .finish_non_exhaustive()
    }
}

impl<S: RingHasher> HashRing<S> {
    /// Creates an empty `HashRing` which will use the given hasher.
    pub fn with_hasher(replicas: usize, hash_builder: S) -> Self {
        HashRing {
            hash_builder,
            replicas: RingConfig::new(replicas).effective_replicas(),
            state: RwLock::new(State::default()),
        }
    }

    /// Number of virtual nodes placed per member.
    #[inline]
    pub fn replicas(&self) -> usize {
        self.replicas
    }

    /// Get the number of members in the hash ring.
    #[inline]
    pub fn len(&self) -> usize {
        self.state.read().members.len()
    }

    /// Returns true if the ring has no members.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.state.read().members.is_empty()
    }

    pub fn contains(&self, node: &str) -> bool {
        self.state.read().members.contains(node)
    }

    /// Returns the current members in no particular order.
    pub fn nodes(&self) -> Vec<String> {
        self.state.read().members.iter().cloned().collect()
    }

    /// Number of virtual node positions currently on the ring.
    pub fn vnode_count(&self) -> usize {
        self.state.read().positions.len()
    }

    /// Snapshot of the sorted virtual node positions.
    pub fn positions(&self) -> Vec<u32> {
        self.state.read().positions.clone()
    }

    /// Hashes `data` and returns its position on the ring.
    #[inline]
    pub fn key<K: AsRef<[u8]>>(&self, data: K) -> u32 {
        self.hash_builder.hash(data.as_ref())
    }

    /// Adds every node in `nodes` to the ring. Empty identifiers and nodes
    /// that are already members are skipped.
    pub fn add<I>(&self, nodes: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut state = self.state.write();
        let mut changed = false;

        for node in nodes {
            let node = node.as_ref();

            if node.is_empty() || state.members.contains(node) {
                trace!(node, "skipping add");
                continue;
            }

            state.members.insert(node.to_owned());

            for index in 0..self.replicas {
                let pos = self.vnode_position(node, index);

                // On a collision the later node takes over the slot.
                if state.owners.insert(pos, node.to_owned()).is_none() {
                    state.positions.push(pos);
                }
            }

            changed = true;
            debug!(node, replicas = self.replicas, "added node to ring");
        }

        if changed {
            state.positions.sort_unstable();
        }
    }

    /// Removes every node in `nodes` from the ring. Identifiers that are not
    /// members are skipped.
    pub fn remove<I>(&self, nodes: I)
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut state = self.state.write();
        let mut changed = false;

        for node in nodes {
            let node = node.as_ref();

            if !state.members.remove(node) {
                trace!(node, "skipping remove");
                continue;
            }

            for index in 0..self.replicas {
                let pos = self.vnode_position(node, index);
                state.owners.remove(&pos);
            }

            changed = true;
            debug!(node, replicas = self.replicas, "removed node from ring");
        }

        if changed {
            let mut positions: Vec<u32> = state.owners.keys().copied().collect();
            positions.sort_unstable();
            state.positions = positions;
        }
    }

    /// Returns the node owning `key`, or an empty string if the ring is empty.
    pub fn get<K: AsRef<[u8]>>(&self, key: K) -> String {
        self.try_get(key).unwrap_or_default()
    }

    /// Returns the node owning `key`, or an error if the ring is empty.
    pub fn try_get<K: AsRef<[u8]>>(&self, key: K) -> Result<String, Error> {
        let hash = self.key(key);
        let state = self.state.read();

        if state.members.is_empty() {
            return Err(Error::NodeNotFound);
        }

        state
            .find_index(hash)
            .and_then(|index| state.owners.get(&state.positions[index]))
            .cloned()
            .ok_or(Error::NodeNotFound)
    }

    /// Returns up to `n` distinct nodes for `key`, in the order they are met
    /// walking clockwise from the key's position. The first element is the
    /// node `get` would return. Empty if the ring is empty.
    pub fn get_n<K: AsRef<[u8]>>(&self, key: K, n: usize) -> Vec<String> {
        self.try_get_n(key, n).unwrap_or_default()
    }

    /// Same as `get_n`, but returns an error if the ring is empty.
    pub fn try_get_n<K: AsRef<[u8]>>(&self, key: K, n: usize) -> Result<Vec<String>, Error> {
        let hash = self.key(key);
        let state = self.state.read();

        if state.members.is_empty() {
            return Err(Error::NodeNotFound);
        }

        let n = n.min(state.members.len());
        let Some(start) = state.find_index(hash) else {
            return Err(Error::NodeNotFound);
        };

        let mut nodes: Vec<String> = Vec::with_capacity(n);
        if n == 0 {
            return Ok(nodes);
        }

        let (before, after) = state.positions.split_at(start);

        for pos in after.iter().chain(before) {
            let Some(owner) = state.owners.get(pos) else {
                continue;
            };

            if !nodes.contains(owner) {
                nodes.push(owner.clone());
                if nodes.len() == n {
                    break;
                }
            }
        }

        Ok(nodes)
    }

    /// Position of the `index`th virtual node of `node`, hashed from
    /// `"<node>#<index>"`.
    #[inline]
    fn vnode_position(&self, node: &str, index: usize) -> u32 {
        self.key(format!("{node}#{index}"))
    }
}
