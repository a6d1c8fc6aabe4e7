//! Proxy configuration and seed-list URL parsing.
//!
//! Supports a single URL scheme: `cluster://[user:pass@]host[:port][,host[:port]…]`

use crate::error::{ClusterError, Result};

/// Default node port when a seed omits one.
pub const DEFAULT_PORT: u16 = 6379;

/// Credential presented to a node during an `AUTH` exchange.
#[derive(Debug, Clone)]
pub struct Credential {
    pub username: Option<String>,
    pub password: String,
}

/// Everything needed to discover and maintain a cluster topology.
#[derive(Debug, Clone)]
pub struct ProxyConfig {
    /// Seed nodes tried in order until one answers.
    pub seeds: Vec<(String, u16)>,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Connect timeout in milliseconds.
    pub connect_timeout_ms: u64,
    /// Maximum read buffer size per connection in bytes.
    pub max_buffer_size: usize,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            seeds: vec![("127.0.0.1".to_string(), DEFAULT_PORT)],
            username: None,
            password: None,
            connect_timeout_ms: 5000,
            max_buffer_size: crate::transport::MAX_BUF_SIZE,
        }
    }
}

impl ProxyConfig {
    /// Parse a `cluster://` URL into a `ProxyConfig`.
    pub fn from_url(url: &str) -> Result<Self> {
        let mut config = Self::default();
        config.seeds.clear();

        let rest = url.strip_prefix("cluster://").ok_or_else(|| {
            ClusterError::configuration(format!("invalid URL, expected cluster://: {url}"))
        })?;

        let (host_part, _path) = split_path(rest);

        let hosts_str = if let Some((userinfo, hp)) = host_part.rsplit_once('@') {
            parse_userinfo(&mut config, userinfo)?;
            hp
        } else {
            host_part
        };

        for addr in hosts_str.split(',') {
            let addr = addr.trim();
            if addr.is_empty() {
                continue;
            }
            let mut host = String::new();
            let mut port = DEFAULT_PORT;
            parse_host_port(addr, DEFAULT_PORT, &mut host, &mut port)?;
            config.seeds.push((host, port));
        }

        if config.seeds.is_empty() {
            return Err(ClusterError::configuration(
                "cluster URL must include at least one node",
            ));
        }

        Ok(config)
    }

    pub fn credential(&self) -> Option<Credential> {
        self.password.as_ref().map(|password| Credential {
            username: self.username.clone(),
            password: password.clone(),
        })
    }
}

/// Split `rest` into (before_path, Some(path)) or (rest, None).
fn split_path(rest: &str) -> (&str, Option<&str>) {
    match rest.split_once('/') {
        Some((before, after)) if !after.is_empty() => (before, Some(after)),
        Some((before, _)) => (before, None),
        None => (rest, None),
    }
}

/// Parse `user:pass` or `:pass` into config.
fn parse_userinfo(config: &mut ProxyConfig, userinfo: &str) -> Result<()> {
    match userinfo.split_once(':') {
        Some((user, pass)) => {
            if !user.is_empty() {
                config.username = Some(user.to_string());
            }
            if !pass.is_empty() {
                config.password = Some(pass.to_string());
            }
        }
        None => {
            if !userinfo.is_empty() {
                config.password = Some(userinfo.to_string());
            }
        }
    }
    Ok(())
}

/// Parse `host[:port]` or `[ipv6]:port` into host/port variables.
fn parse_host_port(s: &str, default_port: u16, host: &mut String, port: &mut u16) -> Result<()> {
    if s.starts_with('[') {
        let close = s
            .find(']')
            .ok_or_else(|| ClusterError::configuration(format!("unclosed IPv6 bracket: {s}")))?;
        *host = s[1..close].to_string();
        let after = &s[close + 1..];
        if let Some(port_str) = after.strip_prefix(':') {
            *port = port_str
                .parse()
                .map_err(|_| ClusterError::configuration(format!("invalid port: {port_str}")))?;
        } else {
            *port = default_port;
        }
    } else if let Some((h, p)) = s.rsplit_once(':') {
        match p.parse::<u16>() {
            Ok(parsed_port) => {
                *host = h.to_string();
                *port = parsed_port;
            }
            Err(_) => {
                if h.contains(':') {
                    *host = s.to_string();
                    *port = default_port;
                } else {
                    return Err(ClusterError::configuration(format!("invalid port: {p}")));
                }
            }
        }
    } else {
        *host = s.to_string();
        *port = default_port;
    }

    if host.is_empty() {
        *host = "127.0.0.1".to_string();
    }

    Ok(())
}
