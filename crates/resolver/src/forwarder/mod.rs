//! Forwarding to the configured upstream nameservers.

mod exchange;
mod resolver;
mod tcp;
mod udp;
mod upstream;

pub use exchange::{Exchange, NetExchange};
pub use resolver::{DEFAULT_INTERVAL, EDNS_MAX_PAYLOAD, Resolver};
