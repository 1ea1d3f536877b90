//! # Buffer State Model
//!
//! Symbolic per-node buffers. No data moves and nothing is summed: a
//! [`Chunk`] only records which payload slice it is, where it came from, what
//! state it is in and how many contributions have been folded into it.
//!
//! Buffers are mutated in place while a timeline is being built and copied
//! out with [`BufferState::snapshot`] at every checkpoint, so a snapshot never
//! observes later mutation.

use crate::types::{NodeId, SimTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// =============================================================================
// CHUNK IDENTITY
// =============================================================================

/// Symbolic tags for chunks that stand for a whole buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum AggregateTag {
    /// A node's entire payload.
    All,
    /// A payload that has left the node and is waiting on the fabric.
    Pending,
    /// The fully combined result.
    Result,
}

/// Identity of a chunk: a numbered slice or a whole-buffer aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChunkId {
    Numbered(usize),
    Aggregate(AggregateTag),
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChunkId::Numbered(id) => write!(f, "c{}", id),
            ChunkId::Aggregate(AggregateTag::All) => f.write_str("all"),
            ChunkId::Aggregate(AggregateTag::Pending) => f.write_str("pending"),
            ChunkId::Aggregate(AggregateTag::Result) => f.write_str("result"),
        }
    }
}

/// Lifecycle state of a chunk as shown by the renderer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChunkState {
    Local,
    Partial,
    Reduced,
    Received,
    Final,
    Sent,
    Gathered,
    Source,
    InSwitch,
    ToSend,
}

// =============================================================================
// CHUNK
// =============================================================================

/// One tracked slice of a node's buffer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub id: ChunkId,
    pub state: ChunkState,
    /// Contributions folded so far, `1..=N`.
    pub reduction_count: usize,
    /// Node whose contribution this is, for payloads that are moved but never
    /// combined (gathers and all-to-all).
    pub origin: Option<NodeId>,
}

impl Chunk {
    /// A chunk holding only the local contribution.
    #[must_use]
    pub fn new(id: ChunkId, state: ChunkState) -> Self {
        Self {
            id,
            state,
            reduction_count: 1,
            origin: None,
        }
    }

    /// A numbered chunk in the `Local` state.
    #[must_use]
    pub fn local(id: usize) -> Self {
        Self::new(ChunkId::Numbered(id), ChunkState::Local)
    }

    /// Attach the contributing node.
    #[must_use]
    pub fn from_origin(mut self, origin: NodeId) -> Self {
        self.origin = Some(origin);
        self
    }

    /// Set the reduction count.
    #[must_use]
    pub fn with_count(mut self, count: usize) -> Self {
        self.reduction_count = count;
        self
    }

    /// Set the state.
    #[must_use]
    pub fn with_state(mut self, state: ChunkState) -> Self {
        self.state = state;
        self
    }

    /// Ordering key inside a node buffer: by id, then by origin.
    fn key(&self) -> (ChunkId, Option<NodeId>) {
        (self.id, self.origin)
    }
}

// =============================================================================
// BUFFER STATE
// =============================================================================

/// Every node's ordered chunk list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferState {
    nodes: BTreeMap<NodeId, Vec<Chunk>>,
}

impl BufferState {
    /// Empty buffers for `node_count` nodes.
    #[must_use]
    pub fn new(node_count: usize) -> Self {
        Self {
            nodes: (0..node_count).map(|i| (NodeId(i), Vec::new())).collect(),
        }
    }

    /// Buffers where every node holds the chunks produced by `init`.
    #[must_use]
    pub fn filled(node_count: usize, init: impl Fn(NodeId) -> Vec<Chunk>) -> Self {
        let mut state = Self::new(node_count);
        for i in 0..node_count {
            let node = NodeId(i);
            for chunk in init(node) {
                state.upsert(node, chunk);
            }
        }
        state
    }

    /// Chunks held by a node, in order.
    #[must_use]
    pub fn chunks(&self, node: NodeId) -> &[Chunk] {
        self.nodes.get(&node).map(Vec::as_slice).unwrap_or_default()
    }

    /// Look up a chunk by id (first match when several origins share the id).
    #[must_use]
    pub fn chunk(&self, node: NodeId, id: ChunkId) -> Option<&Chunk> {
        self.chunks(node).iter().find(|c| c.id == id)
    }

    /// Mutable lookup by id.
    pub fn chunk_mut(&mut self, node: NodeId, id: ChunkId) -> Option<&mut Chunk> {
        self.nodes
            .get_mut(&node)
            .and_then(|chunks| chunks.iter_mut().find(|c| c.id == id))
    }

    /// Insert a chunk, replacing any chunk with the same id and origin.
    pub fn upsert(&mut self, node: NodeId, chunk: Chunk) {
        let chunks = self.nodes.entry(node).or_default();
        match chunks.binary_search_by(|c| c.key().cmp(&chunk.key())) {
            Ok(pos) => chunks[pos] = chunk,
            Err(pos) => chunks.insert(pos, chunk),
        }
    }

    /// Remove and return every chunk matching `pred`.
    pub fn take(&mut self, node: NodeId, pred: impl Fn(&Chunk) -> bool) -> Vec<Chunk> {
        let Some(chunks) = self.nodes.get_mut(&node) else {
            return Vec::new();
        };
        let (taken, kept): (Vec<_>, Vec<_>) = chunks.drain(..).partition(|c| pred(c));
        *chunks = kept;
        taken
    }

    /// Keep only the chunks matching `pred` on a node.
    pub fn retain(&mut self, node: NodeId, pred: impl Fn(&Chunk) -> bool) {
        if let Some(chunks) = self.nodes.get_mut(&node) {
            chunks.retain(|c| pred(c));
        }
    }

    /// Drop every chunk held by a node.
    pub fn clear_node(&mut self, node: NodeId) {
        if let Some(chunks) = self.nodes.get_mut(&node) {
            chunks.clear();
        }
    }

    /// Set the state of every chunk on every node.
    pub fn set_all_states(&mut self, state: ChunkState) {
        for chunk in self.nodes.values_mut().flatten() {
            chunk.state = state;
        }
    }

    /// Set the state of every chunk on one node.
    pub fn set_node_state(&mut self, node: NodeId, state: ChunkState) {
        if let Some(chunks) = self.nodes.get_mut(&node) {
            for chunk in chunks {
                chunk.state = state;
            }
        }
    }

    /// Number of nodes tracked.
    #[must_use]
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Total chunks across all nodes.
    #[must_use]
    pub fn total_chunks(&self) -> usize {
        self.nodes.values().map(Vec::len).sum()
    }

    /// Deep copy tagged with the time it was taken.
    #[must_use]
    pub fn snapshot(&self, time: SimTime) -> BufferSnapshot {
        BufferSnapshot {
            time,
            nodes: self.nodes.clone(),
        }
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// An immutable copy of every buffer at one instant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BufferSnapshot {
    pub time: SimTime,
    pub nodes: BTreeMap<NodeId, Vec<Chunk>>,
}

impl BufferSnapshot {
    /// Chunks held by a node at this instant.
    #[must_use]
    pub fn chunks(&self, node: NodeId) -> &[Chunk] {
        self.nodes.get(&node).map(Vec::as_slice).unwrap_or_default()
    }

    /// Every retained chunk across all nodes.
    pub fn all_chunks(&self) -> impl Iterator<Item = &Chunk> {
        self.nodes.values().flatten()
    }

    /// Whether every retained chunk has been folded from exactly `count`
    /// contributions.
    #[must_use]
    pub fn fully_reduced(&self, count: usize) -> bool {
        self.all_chunks().all(|c| c.reduction_count == count)
    }
}

// =============================================================================
// TESTS
// =============================================================================
