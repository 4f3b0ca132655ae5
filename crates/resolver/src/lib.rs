use async_trait::async_trait;
use hickory_proto::op::Message;

pub use fwdns_context::Transport;

mod error;
pub mod forwarder;
pub mod resolv_conf;

pub use error::{ResolutionError, ResolveError};
pub use forwarder::{Exchange, NetExchange, Resolver};
pub use resolv_conf::{ConfigError, Nameserver, NameserverError, ResolvConf};

#[async_trait]
pub trait DnsResolver: Send + Sync {
    /// Resolve `request` upstream over `transport`.
    async fn lookup(&self, transport: Transport, request: &Message) -> Result<Message, ResolveError>;
}

/// Strip a single trailing root label separator. Only meant for display.
pub fn normalize_name(name: &str) -> &str {
    name.strip_suffix('.').unwrap_or(name)
}
