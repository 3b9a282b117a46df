//! Node types, identity ordering and address derivation
//!
//! A node is identified by `(broadcast_address, tcp_port)`. All other fields
//! are descriptive and may change on re-registration.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

// =============================================================================
// NodeInfo
// =============================================================================

/// Information about a broker node referenced by the lookup tier
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct NodeInfo {
    /// Address the node connected from
    pub remote_address: String,
    /// Hostname declared by the node
    pub hostname: String,
    /// Address advertised by the node (host, optionally with a port)
    pub broadcast_address: String,
    /// Port accepting TCP connections
    pub tcp_port: u16,
    /// Port accepting HTTP requests
    pub http_port: u16,
    /// Version of the broker software
    pub version: String,
}

impl NodeInfo {
    /// Create node info from its identity and HTTP port
    pub fn new(broadcast_address: impl Into<String>, tcp_port: u16, http_port: u16) -> Self {
        Self {
            broadcast_address: broadcast_address.into(),
            tcp_port,
            http_port,
            ..Default::default()
        }
    }

    /// Set the address the node connected from
    pub fn with_remote_address(mut self, remote_address: impl Into<String>) -> Self {
        self.remote_address = remote_address.into();
        self
    }

    /// Set the declared hostname
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    /// Set the broker version
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// The node's identity
    pub fn key(&self) -> NodeKey {
        NodeKey {
            broadcast_address: self.broadcast_address.clone(),
            tcp_port: self.tcp_port,
        }
    }

    /// Compare two nodes by identity only
    pub fn cmp_identity(&self, other: &NodeInfo) -> Ordering {
        self.broadcast_address
            .cmp(&other.broadcast_address)
            .then(self.tcp_port.cmp(&other.tcp_port))
    }

    /// Effective TCP endpoint (`host:tcp_port`)
    pub fn tcp_address(&self) -> String {
        broadcast_address(&self.broadcast_address, self.tcp_port)
    }

    /// Effective HTTP endpoint (`host:http_port`)
    pub fn http_address(&self) -> String {
        broadcast_address(&self.broadcast_address, self.http_port)
    }
}

// =============================================================================
// NodeKey
// =============================================================================

/// Identity of a node: `(broadcast_address, tcp_port)`
///
/// Ordering is lexicographic on the address, then numeric on the port.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct NodeKey {
    /// Advertised address
    pub broadcast_address: String,
    /// TCP port
    pub tcp_port: u16,
}

impl fmt::Display for NodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.broadcast_address, self.tcp_port)
    }
}

// =============================================================================
// EngineInfo
// =============================================================================

/// Static descriptor of a registry backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineInfo {
    /// Type of the engine ("memory", ...)
    #[serde(rename = "type")]
    pub engine_type: String,
    /// Version of the engine
    pub version: String,
}

impl EngineInfo {
    /// Create an engine descriptor
    pub fn new(engine_type: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            engine_type: engine_type.into(),
            version: version.into(),
        }
    }
}

// =============================================================================
// Ordering helpers
// =============================================================================

/// Sort nodes ascending by identity
pub fn sort_nodes(mut nodes: Vec<NodeInfo>) -> Vec<NodeInfo> {
    nodes.sort_by(NodeInfo::cmp_identity);
    nodes
}

/// Sort names lexicographically and drop duplicates
pub fn sort_strings(mut names: Vec<String>) -> Vec<String> {
    names.sort();
    names.dedup();
    names
}

// =============================================================================
// Address derivation
// =============================================================================

/// Split `host:port`, accepting bracketed IPv6 hosts (`[::1]:4150`)
///
/// Returns `None` when `addr` has no port component or is malformed
/// (e.g. a bare IPv6 address with several colons).
pub fn split_host_port(addr: &str) -> Option<(&str, &str)> {
    if let Some(rest) = addr.strip_prefix('[') {
        let end = rest.find(']')?;
        let host = &rest[..end];
        let port = rest[end + 1..].strip_prefix(':')?;
        if port.contains(|c: char| matches!(c, '[' | ']' | ':')) {
            return None;
        }
        return Some((host, port));
    }

    let (host, port) = addr.rsplit_once(':')?;
    if host.contains(|c: char| matches!(c, ':' | '[' | ']'))
        || port.contains(|c: char| matches!(c, '[' | ']'))
    {
        return None;
    }
    Some((host, port))
}

/// Join a host and port, bracketing hosts that contain a colon
pub fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

/// Build an endpoint from an advertised address and an explicit port
///
/// A port embedded in `addr` is discarded in favor of `port`. When `addr` has
/// no port component it is used verbatim as the host.
pub fn broadcast_address(addr: &str, port: u16) -> String {
    let host = match split_host_port(addr) {
        Some((host, _)) if !host.is_empty() => host,
        _ => addr,
    };
    join_host_port(host, port)
}
