//! Cluster topology and routing core: slot hashing, node discovery, and the
//! reconfiguration state machine that keeps a routing view in sync with a
//! live cluster.
//!
//! This crate owns none of its own event loop or client protocol; the
//! embedding application drives [`discoverer::fetch_topology`] and
//! [`reconfigure::update_topology`] from whatever executor it already runs,
//! and supplies routing metadata on its own request type via [`request::Request`].

pub mod config;
pub mod connection;
pub mod discoverer;
pub mod duplicate;
pub mod error;
pub mod loader;
pub mod node;
pub mod reconfigure;
pub mod request;
pub mod resp;
pub mod slot_hash;
pub mod slot_table;
pub mod topology;
pub mod transport;

pub use config::{Credential, ProxyConfig};
pub use discoverer::fetch_topology;
pub use duplicate::duplicate;
pub use error::{ClusterError, Result};
pub use node::{Node, NodeId};
pub use reconfigure::{update_topology, ReconfigSignal};
pub use request::{ProxyCallbacks, Request, RequestHandle};
pub use slot_hash::{slot_of, SLOT_COUNT};
pub use topology::{TopologyHandle, TopologyInner};
