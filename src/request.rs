//! The request shape the embedding application must provide.
//!
//! The core never constructs or parses client requests itself; it only
//! tracks routing metadata on them and hands them back to
//! [`ProxyCallbacks::process_request`] for resubmission.

use crate::node::NodeId;
use parking_lot::Mutex;
use std::sync::Arc;

/// A request object shared across the connection queues that reference it
/// and the topology's parked-request map.
pub type RequestHandle<Req> = Arc<Mutex<Req>>;

/// Routing metadata every client request must expose.
pub trait Request: Send + 'static {
    /// Identifies the client this request belongs to.
    fn client_id(&self) -> u64;
    /// Identifies this request within its client (unique per client).
    fn request_id(&self) -> u64;

    fn node(&self) -> Option<NodeId>;
    fn set_node(&mut self, node: Option<NodeId>);

    fn slot(&self) -> Option<u16>;
    fn set_slot(&mut self, slot: Option<u16>);

    /// Bytes already written to the node's socket for this request, if any.
    fn written(&self) -> usize;
    fn set_written(&mut self, written: usize);

    fn need_reprocessing(&self) -> bool;
    fn set_need_reprocessing(&mut self, val: bool);

    /// True while this request is mid-write on its connection — such a
    /// request cannot simply be re-queued, the reconfigurator must wait for
    /// the write to finish.
    fn has_write_handler(&self) -> bool;

    /// The request this one was split off, if it is part of a scatter-gather
    /// command fanned out across several nodes.
    fn parent_request(&self) -> Option<RequestHandle<Self>>
    where
        Self: Sized;
    fn set_parent_request(&mut self, parent: Option<RequestHandle<Self>>)
    where
        Self: Sized;

    /// Sub-requests this one was fanned out into, if any.
    fn child_requests(&self) -> Vec<RequestHandle<Self>>
    where
        Self: Sized;
    fn set_child_requests(&mut self, children: Vec<RequestHandle<Self>>)
    where
        Self: Sized;
}

/// Callbacks the embedding application supplies; invoked by the
/// reconfigurator and node registry at the points named in each method.
pub trait ProxyCallbacks<Req: Request> {
    /// A node's connection was torn down; cancel or re-park requests tied to it.
    fn on_node_disconnection(&self, node: NodeId);
    /// Resubmit a request, optionally pinned to a specific node.
    fn process_request(&self, req: RequestHandle<Req>, node: Option<NodeId>);
    /// Release a list of requests that can no longer be serviced.
    fn free_request_list(&self, requests: Vec<RequestHandle<Req>>);
}
