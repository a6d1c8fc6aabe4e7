//! Deep-copies a topology, e.g. to hand a worker thread its own routing view
//! while keeping it informed of reconfigurations applied to the original.

use crate::connection::Connection;
use crate::node::Node;
use crate::request::Request;
use crate::slot_table::SlotTable;
use crate::topology::{NodeRegistry, TopologyHandle, TopologyInner};

use parking_lot::Mutex;
use std::sync::Arc;

fn duplicate_node<Req>(source: &Node<Req>) -> Node<Req> {
    Node {
        ip: source.ip.clone(),
        port: source.port,
        name: source.name.clone(),
        is_replica: source.is_replica,
        primary_id: source.primary_id.clone(),
        slots: source.slots.clone(),
        migrating: source.migrating.clone(),
        importing: source.importing.clone(),
        connection: Connection::new(),
        source_node_id: None,
    }
}

/// Produce an independent copy of `source`'s nodes and slot table, linked
/// back to it via a weak reference so a later free of `source` is observed
/// rather than dangling.
pub fn duplicate<Req: Request>(source: &TopologyHandle<Req>) -> TopologyHandle<Req> {
    let src = source.lock();

    let mut nodes = NodeRegistry::default();
    let mut slot_table = SlotTable::new();
    let mut id_map = std::collections::HashMap::new();

    for (old_id, node) in src.nodes.iter() {
        let mut copy = duplicate_node(node);
        copy.source_node_id = Some(old_id);
        let new_id = nodes.insert_node(copy);
        id_map.insert(old_id, new_id);
    }

    for (slot, old_id) in src.slot_table.iter() {
        if let Some(&new_id) = id_map.get(&old_id) {
            slot_table.insert(slot, new_id);
        }
    }

    let new_handle = Arc::new(Mutex::new(TopologyInner {
        nodes,
        slot_table,
        requests_to_reprocess: Default::default(),
        is_updating: false,
        update_required: false,
        broken: src.broken,
        thread_id: src.thread_id,
        seed: src.seed.clone(),
        credential: src.credential.clone(),
        duplicated_from: Some(Arc::downgrade(source)),
        duplicates: Vec::new(),
    }));

    drop(src);
    source.lock().duplicates.push(Arc::downgrade(&new_handle));

    new_handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::tests::MockRequest;
    use crate::topology::TopologyInner;

    #[test]
    fn duplicate_copies_nodes_and_slots() {
        let source = TopologyInner::<MockRequest>::new(0);
        {
            let mut t = source.lock();
            let id = t.nodes.create_node("127.0.0.1", 7000);
            t.slot_table.insert(42, id);
            t.nodes.get_mut(id).unwrap().slots.push(42);
        }

        let copy = duplicate(&source);
        let c = copy.lock();
        assert_eq!(c.nodes.len(), 1);
        let (_, node) = c.nodes.iter().next().unwrap();
        assert_eq!(node.addr(), "127.0.0.1:7000");
        assert_eq!(node.slots, vec![42]);
        assert!(c.get_node_by_slot(42).is_some());
    }

    #[test]
    fn duplicate_links_back_to_source() {
        let source = TopologyInner::<MockRequest>::new(0);
        let copy = duplicate(&source);
        assert!(copy.lock().duplicated_from.is_some());
        assert_eq!(source.lock().duplicates.len(), 1);

        drop(copy);
        // The weak link in `source.duplicates` can no longer upgrade.
        let s = source.lock();
        assert!(s.duplicates[0].upgrade().is_none());
    }

    #[test]
    fn duplicate_is_independent_of_source_mutation() {
        let source = TopologyInner::<MockRequest>::new(0);
        let id = source.lock().nodes.create_node("127.0.0.1", 7000);
        let copy = duplicate(&source);
        source.lock().nodes.free_node(id, &crate::request::tests::NoopCallbacks);
        assert_eq!(copy.lock().nodes.len(), 1);
    }
}
