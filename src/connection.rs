//! Per-node connection state: transport handle, request queues, auth flags.

use crate::error::Result;
use crate::request::RequestHandle;
use crate::transport::Transport;
use std::collections::VecDeque;

/// Per-node connection state.
///
/// Exactly one `Connection` exists per [`crate::node::Node`], for its whole
/// lifetime; it is never shared or pooled (unlike the teacher's
/// multi-connection `ConnectionPool`, which this core has no use for since a
/// node here is always addressed through exactly one socket).
pub struct Connection<Req> {
    transport: Option<Transport>,
    pub connected: bool,
    pub authenticating: bool,
    pub authenticated: bool,
    /// Requests written to the socket, awaiting a reply.
    pub requests_pending: VecDeque<RequestHandle<Req>>,
    /// Requests queued to be written.
    pub requests_to_send: VecDeque<RequestHandle<Req>>,
}

impl<Req> Connection<Req> {
    pub fn new() -> Self {
        Self {
            transport: None,
            connected: false,
            authenticating: false,
            authenticated: false,
            requests_pending: VecDeque::new(),
            requests_to_send: VecDeque::new(),
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub async fn connect(&mut self, ip: &str, port: u16) -> Result<()> {
        let transport = Transport::connect(&format!("{ip}:{port}")).await?;
        self.transport = Some(transport);
        self.connected = true;
        Ok(())
    }

    /// Tear down the transport and clear auth state. Queued requests are
    /// left untouched for the caller to redistribute or free.
    pub fn disconnect(&mut self) {
        self.transport = None;
        self.connected = false;
        self.authenticating = false;
        self.authenticated = false;
    }

    /// Issue a single `AUTH` exchange on an already-connected transport.
    pub async fn authenticate(&mut self, username: Option<&str>, password: &str) -> Result<()> {
        self.authenticating = true;
        let transport = self
            .transport
            .as_mut()
            .ok_or_else(|| crate::error::ClusterError::configuration("not connected"))?;
        let result = transport.auth(username, password).await;
        self.authenticating = false;
        match result {
            Ok(()) => {
                self.authenticated = true;
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    pub fn transport_mut(&mut self) -> Option<&mut Transport> {
        self.transport.as_mut()
    }
}

impl<Req> Default for Connection<Req> {
    fn default() -> Self {
        Self::new()
    }
}
