//! Topology discovery: contact a seed, walk the cluster, load peers.

use crate::config::Credential;
use crate::error::{ClusterError, Result};
use crate::loader::apply_nodes_text;
use crate::node::NodeId;
use crate::request::{ProxyCallbacks, Request};
use crate::topology::TopologyHandle;
use crate::transport::Transport;

use tracing::{info, warn};

/// Connect to a seed node, populate `topology` with it, then connect to and
/// load every peer the seed reports.
///
/// `unix_socket` is accepted for interface fidelity but always rejected:
/// this crate only implements TCP seeds. `credential`, if given, is also
/// stashed on `topology` so a later reconfiguration can re-authenticate
/// without the caller having to remember it.
pub async fn fetch_topology<Req, C>(
    topology: &TopologyHandle<Req>,
    ip: &str,
    port: u16,
    unix_socket: Option<&str>,
    credential: Option<&Credential>,
    callbacks: &C,
) -> Result<()>
where
    Req: Request,
    C: ProxyCallbacks<Req>,
{
    if unix_socket.is_some() {
        return Err(ClusterError::configuration(
            "unix-domain seed sockets are not implemented",
        ));
    }

    let mut transport = Transport::connect(&format!("{ip}:{port}")).await?;
    authenticate(&mut transport, credential).await;

    let seed_id = {
        let mut t = topology.lock();
        let id = t.nodes.create_node(ip, port);
        t.seed = Some((ip.to_string(), port));
        t.credential = credential.cloned();
        id
    };

    let text = transport.cluster_nodes().await?;
    let mut friends: Vec<NodeId> = Vec::new();
    {
        let mut t = topology.lock();
        apply_nodes_text(&mut t, seed_id, &text, Some(&mut friends))?;
    }
    info!(seed = %format!("{ip}:{port}"), friends = friends.len(), "loaded seed node");

    for friend_id in friends {
        let (fip, fport) = {
            let t = topology.lock();
            let node = t
                .nodes
                .get(friend_id)
                .expect("friend just created in this call");
            (node.ip.clone(), node.port)
        };

        let connect_result = Transport::connect(&format!("{fip}:{fport}")).await;
        let mut friend_transport = match connect_result {
            Ok(t) => t,
            Err(e) => {
                topology.lock().nodes.free_node(friend_id, callbacks);
                return Err(e);
            }
        };
        authenticate(&mut friend_transport, credential).await;

        let text_result = friend_transport.cluster_nodes().await;
        let text = match text_result {
            Ok(text) => text,
            Err(e) => {
                topology.lock().nodes.free_node(friend_id, callbacks);
                return Err(e);
            }
        };

        let mut t = topology.lock();
        if let Err(e) = apply_nodes_text(&mut t, friend_id, &text, None) {
            t.nodes.free_node(friend_id, callbacks);
            return Err(e);
        }
    }

    Ok(())
}

async fn authenticate(transport: &mut Transport, credential: Option<&Credential>) {
    let Some(cred) = credential else { return };
    if let Err(e) = transport.auth(cred.username.as_deref(), &cred.password).await {
        warn!(error = %e, "auth failed during discovery, continuing");
    }
}
