//! Ordered slot → node map.

use crate::node::NodeId;
use std::collections::BTreeMap;

/// Maps hash slots to the node that currently owns them.
///
/// A plain `BTreeMap<u16, NodeId>` already gives the total order a
/// byte-lexicographic radix tree keyed on a big-endian slot would give,
/// since integer comparison over `u16` agrees with big-endian byte order.
#[derive(Default)]
pub struct SlotTable {
    slots: BTreeMap<u16, NodeId>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self {
            slots: BTreeMap::new(),
        }
    }

    pub fn insert(&mut self, slot: u16, node: NodeId) {
        self.slots.insert(slot, node);
    }

    pub fn remove(&mut self, slot: u16) -> Option<NodeId> {
        self.slots.remove(&slot)
    }

    pub fn lookup_exact(&self, slot: u16) -> Option<NodeId> {
        self.slots.get(&slot).copied()
    }

    /// Smallest slot with key >= `slot`, mirroring a radix-tree seek `>=`.
    pub fn seek_ge(&self, slot: u16) -> Option<(u16, NodeId)> {
        self.slots.range(slot..).next().map(|(s, n)| (*s, *n))
    }

    /// First (smallest) mapped slot, mirroring a radix-tree seek `^`.
    pub fn first(&self) -> Option<(u16, NodeId)> {
        self.slots.iter().next().map(|(s, n)| (*s, *n))
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (u16, NodeId)> + '_ {
        self.slots.iter().map(|(s, n)| (*s, *n))
    }
}
