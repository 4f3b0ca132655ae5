use std::sync::Arc;

use fwdns_resolver::DnsResolver;

/// Global state shared across all requests.
pub struct Global {
    pub resolver: Arc<dyn DnsResolver>,
}

impl Global {
    pub fn new(resolver: Arc<dyn DnsResolver>) -> Self {
        Self { resolver }
    }
}
