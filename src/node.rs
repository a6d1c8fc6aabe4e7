//! Backend node model.

use crate::connection::Connection;

slotmap::new_key_type! {
    /// Stable, generation-checked handle to a [`Node`] inside a topology's
    /// [`crate::topology::NodeRegistry`]. A key whose node has since been
    /// freed simply fails to resolve — there is no dangling-pointer state to
    /// guard against.
    pub struct NodeId;
}

/// One backend instance: its identity, slot ownership, and connection.
pub struct Node<Req> {
    pub ip: String,
    pub port: u16,
    /// Opaque identity string, first learned from the node's own
    /// self-description (the `name` field of a `CLUSTER NODES` record).
    pub name: String,
    pub is_replica: bool,
    /// Identity of the primary this node replicates, if any.
    pub primary_id: Option<String>,
    /// Slots this node currently owns (kept in sync with the owning
    /// topology's `SlotTable`; sparse, not a dense 16384-entry array).
    pub slots: Vec<u16>,
    /// (slot, destination node identity) pairs mid-migration out.
    pub migrating: Vec<(u16, String)>,
    /// (slot, source node identity) pairs mid-migration in.
    pub importing: Vec<(u16, String)>,
    pub connection: Connection<Req>,
    /// If this node was produced by `duplicate()`, the identity of the node
    /// it was copied from in the source topology.
    pub source_node_id: Option<NodeId>,
}

impl<Req> Node<Req> {
    pub fn new(ip: impl Into<String>, port: u16) -> Self {
        Self {
            ip: ip.into(),
            port,
            name: String::new(),
            is_replica: false,
            primary_id: None,
            slots: Vec::new(),
            migrating: Vec::new(),
            importing: Vec::new(),
            connection: Connection::new(),
            source_node_id: None,
        }
    }

    pub fn addr(&self) -> String {
        format!("{}:{}", self.ip, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::tests::MockRequest;

    #[test]
    fn new_node_is_empty() {
        let node: Node<MockRequest> = Node::new("127.0.0.1", 7000);
        assert_eq!(node.addr(), "127.0.0.1:7000");
        assert!(node.slots.is_empty());
        assert!(node.migrating.is_empty());
        assert!(node.importing.is_empty());
        assert!(!node.is_replica);
        assert!(!node.connection.connected);
    }
}
