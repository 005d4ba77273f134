//! Node identifiers.
//!
//! # Generation-checked handle
//! Registry の node は arena の slot に置かれ、`NodeKey` は
//! (slot index, generation) の組で node を指します。
//!
//! slot が解放されると generation が進むため、古い `NodeKey` は
//! 二度と一致しません。これが「tombstone」の役割を果たし、
//! 同じ node に対する cleanup が二回走ることを防ぎます。

use std::fmt;

/// Handle to one registration inside a cleaner's registry.
///
/// Cheap to copy. A key outlives its node: once the node is removed the key
/// simply stops matching anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeKey {
    index: usize,
    generation: u64,
}

impl NodeKey {
    pub(crate) fn new(index: usize, generation: u64) -> Self {
        Self { index, generation }
    }

    /// Slot index inside the registry arena.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Generation of the slot at the time the node was linked.
    pub fn generation(&self) -> u64 {
        self.generation
    }
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node-{}.{}", self.index, self.generation)
    }
}
