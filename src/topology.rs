//! The in-memory cluster topology: nodes, slot ownership, and parked
//! requests awaiting replay across a reconfiguration.

use crate::config::Credential;
use crate::node::{Node, NodeId};
use crate::request::{ProxyCallbacks, Request, RequestHandle};
use crate::slot_hash::slot_of;
use crate::slot_table::SlotTable;

use indexmap::IndexMap;
use parking_lot::Mutex;
use slotmap::SlotMap as Arena;
use std::sync::{Arc, Weak};
use tracing::debug;

pub type TopologyHandle<Req> = Arc<Mutex<TopologyInner<Req>>>;

/// Owns the node set and slot map for one worker thread's view of the
/// cluster.
pub struct NodeRegistry<Req> {
    arena: Arena<NodeId, Node<Req>>,
    /// Insertion order, independent of the arena's own (unspecified) order.
    order: Vec<NodeId>,
}

impl<Req> NodeRegistry<Req> {
    fn new() -> Self {
        Self {
            arena: Arena::with_key(),
            order: Vec::new(),
        }
    }

    pub fn create_node(&mut self, ip: impl Into<String>, port: u16) -> NodeId {
        let id = self.arena.insert(Node::new(ip, port));
        self.order.push(id);
        id
    }

    /// Insert an already-constructed node, e.g. one produced by
    /// [`crate::duplicate::duplicate`].
    pub fn insert_node(&mut self, node: Node<Req>) -> NodeId {
        let id = self.arena.insert(node);
        self.order.push(id);
        id
    }

    /// Remove a node. Idempotent: removing an unknown id is a no-op.
    ///
    /// Fires `on_node_disconnection`, then releases any queued requests via
    /// `free_request_list` before dropping the node from the arena.
    pub fn free_node<C: ProxyCallbacks<Req>>(&mut self, id: NodeId, callbacks: &C) -> Option<Node<Req>>
    where
        Req: Request,
    {
        self.order.retain(|&o| o != id);
        let mut node = self.arena.remove(id)?;
        callbacks.on_node_disconnection(id);
        node.connection.disconnect();

        let mut queued: Vec<RequestHandle<Req>> =
            node.connection.requests_pending.drain(..).collect();
        queued.extend(node.connection.requests_to_send.drain(..));
        if !queued.is_empty() {
            callbacks.free_request_list(queued);
        }

        Some(node)
    }

    pub fn get(&self, id: NodeId) -> Option<&Node<Req>> {
        self.arena.get(id)
    }

    pub fn get_mut(&mut self, id: NodeId) -> Option<&mut Node<Req>> {
        self.arena.get_mut(id)
    }

    pub fn find_by_name(&self, name: &str) -> Option<NodeId> {
        self.order
            .iter()
            .copied()
            .find(|&id| self.arena.get(id).map(|n| n.name.as_str()) == Some(name))
    }

    /// Nodes in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (NodeId, &Node<Req>)> {
        self.order.iter().map(move |&id| (id, &self.arena[id]))
    }

    /// Visit every node in insertion order with a mutable borrow.
    pub fn for_each_mut<F: FnMut(NodeId, &mut Node<Req>)>(&mut self, mut f: F) {
        for &id in &self.order {
            if let Some(node) = self.arena.get_mut(id) {
                f(id, node);
            }
        }
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

impl<Req> Default for NodeRegistry<Req> {
    fn default() -> Self {
        Self::new()
    }
}

fn reprocess_key<Req: Request>(req: &Req) -> String {
    format!("{}:{}", req.client_id(), req.request_id())
}

pub struct TopologyInner<Req> {
    pub nodes: NodeRegistry<Req>,
    pub slot_table: SlotTable,
    /// Requests parked across a reconfiguration, insertion-ordered so replay
    /// preserves submission order.
    pub requests_to_reprocess: IndexMap<String, RequestHandle<Req>>,
    pub is_updating: bool,
    pub update_required: bool,
    pub broken: bool,
    /// Opaque identity of the worker thread that owns this topology.
    pub thread_id: usize,
    /// Remembered seed address, used to re-fetch topology on reconfiguration.
    pub seed: Option<(String, u16)>,
    /// Remembered credential, presented to every node reconnected on a
    /// re-fetch so reconfiguration doesn't silently drop auth.
    pub credential: Option<Credential>,
    pub duplicated_from: Option<Weak<Mutex<TopologyInner<Req>>>>,
    pub duplicates: Vec<Weak<Mutex<TopologyInner<Req>>>>,
}

impl<Req: Request> TopologyInner<Req> {
    pub fn new(thread_id: usize) -> TopologyHandle<Req> {
        Arc::new(Mutex::new(Self {
            nodes: NodeRegistry::new(),
            slot_table: SlotTable::new(),
            requests_to_reprocess: IndexMap::new(),
            is_updating: false,
            update_required: false,
            broken: false,
            thread_id,
            seed: None,
            credential: None,
            duplicated_from: None,
            duplicates: Vec::new(),
        }))
    }

    /// Wipe nodes and slot table; keeps `requests_to_reprocess`, `seed`,
    /// `credential`, and the duplicate back-links.
    ///
    /// Frees every node through [`NodeRegistry::free_node`] so the
    /// disconnection and queue-release hooks fire for each one, rather than
    /// silently dropping the registry.
    pub fn reset<C: ProxyCallbacks<Req>>(&mut self, callbacks: &C) {
        let ids: Vec<NodeId> = self.nodes.iter().map(|(id, _)| id).collect();
        for id in ids {
            self.nodes.free_node(id, callbacks);
        }
        self.slot_table.clear();
    }

    pub fn get_node_by_slot(&self, slot: u16) -> Option<NodeId> {
        self.slot_table.lookup_exact(slot)
    }

    pub fn get_node_by_key(&self, key: &[u8]) -> Option<(NodeId, u16)> {
        let slot = slot_of(key);
        self.get_node_by_slot(slot).map(|node| (node, slot))
    }

    pub fn get_first_mapped_node(&self) -> Option<NodeId> {
        self.slot_table.first().map(|(_, node)| node)
    }

    pub fn clear_broken(&mut self) {
        self.broken = false;
    }

    /// Park a request for replay after the next successful reconfiguration.
    pub fn add_request_to_reprocess(&mut self, req: RequestHandle<Req>) {
        {
            let mut guard = req.lock();
            guard.set_need_reprocessing(true);
            guard.set_node(None);
            guard.set_slot(None);
            guard.set_written(0);
        }
        let key = reprocess_key(&*req.lock());
        self.requests_to_reprocess.insert(key, req);
    }

    /// Withdraw a previously parked request, e.g. because its client
    /// disconnected before replay. No-op if the request was never parked.
    pub fn remove_request_to_reprocess(&mut self, req: &RequestHandle<Req>) {
        let key = reprocess_key(&*req.lock());
        self.requests_to_reprocess.shift_remove(&key);
    }
}

impl<Req> Drop for TopologyInner<Req> {
    fn drop(&mut self) {
        debug!(thread_id = self.thread_id, "dropping topology");
        // `duplicates`/`duplicated_from` are Weak: once this value is gone
        // every held Weak naturally upgrades to None. No destructor-side
        // walk-and-null is required.
    }
}
