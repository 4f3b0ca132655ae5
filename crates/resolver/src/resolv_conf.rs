//! resolv.conf loading.
//!
//! Supports `nameserver`, `domain`, `search` and `options` (`timeout:`,
//! `attempts:`, `ndots:`). A nameserver entry may carry its own port as
//! `addr#port`, which overrides the default port for that entry only, and a
//! link-local IPv6 entry may name its zone as `addr%iface` or `addr%index`.

use std::{
    net::{IpAddr, Ipv6Addr, SocketAddr, SocketAddrV6},
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

/// Port used for nameservers without an explicit one.
pub const DEFAULT_PORT: u16 = 53;

/// Separator between address and port in a nameserver entry.
const PORT_SEPARATOR: char = '#';

/// Separator between an IPv6 address and its zone.
const SCOPE_SEPARATOR: char = '%';

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed resolv.conf at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// A single `nameserver` entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Nameserver {
    pub ip: IpAddr,
    /// IPv6 zone index given with `%scope`, zero when absent.
    pub scope_id: u32,
    /// Port given with `#port`, if any.
    pub port: Option<u16>,
}

impl Nameserver {
    pub fn socket_addr(&self, default_port: u16) -> SocketAddr {
        let port = self.port.unwrap_or(default_port);
        match self.ip {
            IpAddr::V6(ip) => SocketAddrV6::new(ip, port, 0, self.scope_id).into(),
            IpAddr::V4(ip) => SocketAddr::new(ip.into(), port),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameserverError {
    #[error("{0}")]
    Invalid(String),
    /// The `%scope` names an interface this host does not have.
    #[error("unknown interface {0:?}")]
    UnknownInterface(String),
}

impl FromStr for Nameserver {
    type Err = NameserverError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (host, port) = match s.split_once(PORT_SEPARATOR) {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|_| {
                    NameserverError::Invalid(format!("invalid port in nameserver entry {s:?}"))
                })?;
                (host, Some(port))
            }
            None => (s, None),
        };

        let Some((addr, scope)) = host.split_once(SCOPE_SEPARATOR) else {
            let ip = host.parse::<IpAddr>().map_err(|_| {
                NameserverError::Invalid(format!("invalid nameserver address {host:?}"))
            })?;
            return Ok(Self {
                ip,
                scope_id: 0,
                port,
            });
        };

        let ip = addr.parse::<Ipv6Addr>().map_err(|_| {
            NameserverError::Invalid(format!("invalid scoped nameserver address {host:?}"))
        })?;
        let scope_id = match scope.parse::<u32>() {
            Ok(index) => index,
            Err(_) if scope.is_empty() => {
                return Err(NameserverError::Invalid(format!(
                    "empty scope in nameserver address {host:?}"
                )));
            }
            Err(_) => interface_index(scope)
                .ok_or_else(|| NameserverError::UnknownInterface(scope.to_string()))?,
        };

        Ok(Self {
            ip: IpAddr::V6(ip),
            scope_id,
            port,
        })
    }
}

/// Index of the network interface called `name`.
#[cfg(unix)]
fn interface_index(name: &str) -> Option<u32> {
    let name = std::ffi::CString::new(name).ok()?;
    // SAFETY: `name` is a valid NUL-terminated string for the duration of the call.
    let index = unsafe { libc::if_nametoindex(name.as_ptr()) };
    (index != 0).then_some(index)
}

#[cfg(not(unix))]
fn interface_index(_name: &str) -> Option<u32> {
    None
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvConf {
    /// Nameservers in the order they were configured.
    pub servers: Vec<Nameserver>,
    pub search: Vec<String>,
    pub port: u16,
    pub ndots: u32,
    /// Per-query timeout in seconds.
    pub timeout: u32,
    pub attempts: u32,
}

impl Default for ResolvConf {
    fn default() -> Self {
        Self {
            servers: Vec::new(),
            search: Vec::new(),
            port: DEFAULT_PORT,
            ndots: 1,
            timeout: 5,
            attempts: 2,
        }
    }
}

impl ResolvConf {
    /// Load and parse the file at `path`.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        content.parse()
    }

    /// Nameservers as socket addresses, in configured order.
    pub fn nameservers(&self) -> Vec<SocketAddr> {
        self.servers
            .iter()
            .map(|ns| ns.socket_addr(self.port))
            .collect()
    }

    /// Per-query timeout.
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout as u64)
    }
}

impl FromStr for ResolvConf {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut conf = ResolvConf::default();

        for (idx, line) in s.lines().enumerate() {
            let line_no = idx + 1;
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
                continue;
            }

            let malformed = |reason: String| ConfigError::Malformed {
                line: line_no,
                reason,
            };

            let mut fields = line.split_whitespace();
            let Some(directive) = fields.next() else {
                continue;
            };

            match directive {
                "nameserver" => {
                    let entry = fields
                        .next()
                        .ok_or_else(|| malformed("nameserver without address".into()))?;
                    match entry.parse::<Nameserver>() {
                        Ok(ns) => conf.servers.push(ns),
                        Err(NameserverError::UnknownInterface(iface)) => {
                            tracing::warn!(
                                line = line_no,
                                entry,
                                interface = %iface,
                                "skipping nameserver on unknown interface"
                            );
                        }
                        Err(NameserverError::Invalid(reason)) => return Err(malformed(reason)),
                    }
                }
                "domain" => {
                    conf.search = fields.next().map(String::from).into_iter().collect();
                }
                "search" => {
                    conf.search = fields.map(String::from).collect();
                }
                "options" => {
                    for option in fields {
                        apply_option(&mut conf, option).map_err(malformed)?;
                    }
                }
                _ => {}
            }
        }

        Ok(conf)
    }
}

fn apply_option(conf: &mut ResolvConf, option: &str) -> Result<(), String> {
    let Some((name, value)) = option.split_once(':') else {
        // flags like `rotate` or `edns0` carry no value and are not used here.
        return Ok(());
    };

    let parse = || {
        value
            .parse::<u32>()
            .map_err(|_| format!("invalid value for option {name}: {value:?}"))
    };

    match name {
        "timeout" => conf.timeout = parse()?.max(1),
        "attempts" => conf.attempts = parse()?.max(1),
        "ndots" => conf.ndots = parse()?.min(15),
        _ => {}
    }

    Ok(())
}

#[cfg(test)]
#[path = "resolv_conf_tests.rs"]
mod resolv_conf_tests;
