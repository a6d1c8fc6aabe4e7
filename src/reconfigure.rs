//! Drives a topology through reconfiguration: drain in-flight requests,
//! re-fetch from the seed, replay parked requests.

use crate::discoverer::fetch_topology;
use crate::request::{ProxyCallbacks, Request};
use crate::topology::TopologyHandle;

use tracing::{debug, warn};

/// Outcome of one call to [`update_topology`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconfigSignal {
    /// Requests are still draining; call again once outstanding work settles.
    Wait,
    /// Reconfiguration began: topology reset and re-fetch is under way.
    Started,
    /// Reconfiguration completed and parked requests were replayed.
    Ended,
    /// The topology is marked broken and cannot currently be reconfigured.
    Err,
}

/// Advance a topology's reconfiguration state machine by one step.
///
/// Mirrors the node-side update loop: first drain anything mid-flight
/// (parking requests that can be safely re-sent, waiting on ones that
/// can't), then once the node set is quiescent, re-fetch from the
/// remembered seed and replay what was parked.
pub async fn update_topology<Req, C>(
    topology: &TopologyHandle<Req>,
    callbacks: &C,
) -> ReconfigSignal
where
    Req: Request,
    C: ProxyCallbacks<Req>,
{
    let seed;
    {
        let mut t = topology.lock();
        if t.broken {
            return ReconfigSignal::Err;
        }

        let mut outstanding = 0usize;
        let mut to_park = Vec::new();
        t.nodes.for_each_mut(|_, node| {
            if node.is_replica {
                return;
            }
            outstanding += node.connection.requests_pending.len();
            let queue = std::mem::take(&mut node.connection.requests_to_send);
            for req in queue {
                let writing = req.lock().has_write_handler();
                if writing {
                    outstanding += 1;
                    node.connection.requests_to_send.push_back(req);
                } else {
                    to_park.push(req);
                }
            }
        });

        for req in to_park {
            t.add_request_to_reprocess(req);
        }

        if outstanding > 0 {
            t.is_updating = true;
            t.update_required = true;
            return ReconfigSignal::Wait;
        }

        t.is_updating = true;
        seed = t.seed.clone();
    }

    let Some((ip, port)) = seed else {
        topology.lock().broken = true;
        warn!("no seed remembered, cannot reconfigure");
        return ReconfigSignal::Err;
    };

    let credential = topology.lock().credential.clone();
    topology.lock().reset(callbacks);

    if let Err(e) = fetch_topology(topology, &ip, port, None, credential.as_ref(), callbacks).await
    {
        let mut t = topology.lock();
        t.broken = true;
        t.is_updating = false;
        warn!(error = %e, "reconfiguration fetch failed");
        return ReconfigSignal::Err;
    }

    let parked = {
        let mut t = topology.lock();
        let keys: Vec<String> = t.requests_to_reprocess.keys().cloned().collect();
        let mut parked = Vec::with_capacity(keys.len());
        for key in keys {
            if let Some(req) = t.requests_to_reprocess.shift_remove(&key) {
                parked.push(req);
            }
        }
        t.is_updating = false;
        t.update_required = false;
        parked
    };

    debug!(count = parked.len(), "replaying parked requests");
    for req in parked {
        let (parent, children) = {
            let mut guard = req.lock();
            guard.set_need_reprocessing(false);
            guard.set_written(0);
            guard.set_slot(None);
            (guard.parent_request(), guard.child_requests())
        };
        if let Some(parent) = parent {
            parent.lock().set_node(None);
        }
        for child in children {
            child.lock().set_node(None);
        }
        callbacks.process_request(req, None);
    }

    ReconfigSignal::Ended
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::request::tests::{MockRequest, NoopCallbacks};
    use crate::topology::TopologyInner;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[tokio::test]
    async fn broken_topology_returns_err() {
        let topology = TopologyInner::<MockRequest>::new(0);
        topology.lock().broken = true;
        let signal = update_topology(&topology, &NoopCallbacks).await;
        assert_eq!(signal, ReconfigSignal::Err);
    }

    #[tokio::test]
    async fn no_seed_marks_broken() {
        let topology = TopologyInner::<MockRequest>::new(0);
        let signal = update_topology(&topology, &NoopCallbacks).await;
        assert_eq!(signal, ReconfigSignal::Err);
        assert!(topology.lock().broken);
    }

    #[tokio::test]
    async fn pending_requests_on_primary_wait() {
        let topology = TopologyInner::<MockRequest>::new(0);
        {
            let mut t = topology.lock();
            let id = t.nodes.create_node("127.0.0.1", 7000);
            let req = Arc::new(Mutex::new(MockRequest::new(1, 1)));
            t.nodes
                .get_mut(id)
                .unwrap()
                .connection
                .requests_pending
                .push_back(req);
        }
        let signal = update_topology(&topology, &NoopCallbacks).await;
        assert_eq!(signal, ReconfigSignal::Wait);
        assert!(topology.lock().is_updating);
    }

    #[tokio::test]
    async fn queued_non_writing_request_is_parked_not_blocking() {
        let topology = TopologyInner::<MockRequest>::new(0);
        {
            let mut t = topology.lock();
            let id = t.nodes.create_node("127.0.0.1", 7000);
            let req = Arc::new(Mutex::new(MockRequest::new(2, 2)));
            t.nodes
                .get_mut(id)
                .unwrap()
                .connection
                .requests_to_send
                .push_back(req);
            t.seed = Some(("127.0.0.1".to_string(), 1));
        }
        // No live seed server behind port 1: the fetch will fail and the
        // topology is marked broken, but the point under test is that the
        // queued non-writing request did not block on `Wait`.
        let signal = update_topology(&topology, &NoopCallbacks).await;
        assert_eq!(signal, ReconfigSignal::Err);
    }

    /// Spawns a one-shot server that answers an optional `AUTH` with `+OK`
    /// before replying to `CLUSTER NODES` with `nodes_reply`.
    async fn seed_server(nodes_reply: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};
        use tokio::net::TcpListener;

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            if buf[..n].windows(4).any(|w| w.eq_ignore_ascii_case(b"AUTH")) {
                socket.write_all(b"+OK\r\n").await.unwrap();
                let _ = socket.read(&mut buf).await.unwrap();
            }
            let resp = format!("${}\r\n{}\r\n", nodes_reply.len(), nodes_reply);
            socket.write_all(resp.as_bytes()).await.unwrap();
        });
        addr
    }

    #[tokio::test]
    async fn replay_clears_parent_and_child_node_refs() {
        let reply = "a1 127.0.0.1:7000@17000 myself,master - 0 0 1 connected 0-16383\n";
        let addr = seed_server(reply).await;
        let (host, port_str) = addr.rsplit_once(':').unwrap();
        let port: u16 = port_str.parse().unwrap();

        let topology = TopologyInner::<MockRequest>::new(0);
        let parent = Arc::new(Mutex::new(MockRequest::new(3, 1)));
        let child = Arc::new(Mutex::new(MockRequest::new(3, 2)));
        let req = Arc::new(Mutex::new(MockRequest::new(3, 3)));
        {
            let mut t = topology.lock();
            let stale_id = t.nodes.create_node("10.0.0.1", 6380);
            parent.lock().set_node(Some(stale_id));
            child.lock().set_node(Some(stale_id));
            req.lock().set_parent_request(Some(parent.clone()));
            req.lock().set_child_requests(vec![child.clone()]);
            t.add_request_to_reprocess(req.clone());
            t.seed = Some((host.to_string(), port));
        }

        let signal = update_topology(&topology, &NoopCallbacks).await;
        assert_eq!(signal, ReconfigSignal::Ended);
        assert_eq!(parent.lock().node(), None);
        assert_eq!(child.lock().node(), None);
    }

    #[tokio::test]
    async fn reconfiguration_reauthenticates_with_remembered_credential() {
        let reply = "a1 127.0.0.1:7000@17000 myself,master - 0 0 1 connected 0-16383\n";
        let addr = seed_server(reply).await;
        let (host, port_str) = addr.rsplit_once(':').unwrap();
        let port: u16 = port_str.parse().unwrap();

        let topology = TopologyInner::<MockRequest>::new(0);
        {
            let mut t = topology.lock();
            t.seed = Some((host.to_string(), port));
            t.credential = Some(crate::config::Credential {
                username: None,
                password: "hunter2".to_string(),
            });
        }

        let signal = update_topology(&topology, &NoopCallbacks).await;
        assert_eq!(signal, ReconfigSignal::Ended);
        assert_eq!(
            topology.lock().credential.as_ref().unwrap().password,
            "hunter2"
        );
    }
}
