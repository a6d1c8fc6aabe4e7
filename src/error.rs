use std::fmt;
use std::io;

/// All error variants produced by the cluster core.
#[derive(Debug)]
pub enum ClusterError {
    /// TCP / IO level errors talking to a node.
    Transport(io::Error),
    /// Malformed reply or malformed `CLUSTER NODES` record.
    Protocol(String),
    /// RESP parser needs more data — not a real error, used as control flow.
    Incomplete,
    /// Bad address list, bad credential, or internally inconsistent config.
    Configuration(String),
    /// AUTH was rejected by a node.
    Auth(String),
    /// Topology-level failure (no node for slot, cluster marked broken, …).
    Cluster(String),
}

impl ClusterError {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }

    pub fn cluster(msg: impl Into<String>) -> Self {
        Self::Cluster(msg.into())
    }
}

impl fmt::Display for ClusterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::Protocol(msg) => write!(f, "protocol error: {msg}"),
            Self::Incomplete => write!(f, "incomplete RESP message"),
            Self::Configuration(msg) => write!(f, "configuration error: {msg}"),
            Self::Auth(msg) => write!(f, "auth error: {msg}"),
            Self::Cluster(msg) => write!(f, "cluster error: {msg}"),
        }
    }
}

impl std::error::Error for ClusterError {}

impl From<io::Error> for ClusterError {
    fn from(e: io::Error) -> Self {
        Self::Transport(e)
    }
}

pub type Result<T> = std::result::Result<T, ClusterError>;
