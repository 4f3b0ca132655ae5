use std::{net::SocketAddr, sync::Arc};

use futures::FutureExt;
use fwdns_context::MiddlewareContainer;

mod tcp;
mod udp;

pub use tcp::{TcpResponseWriter, run_tcp, serve_tcp};
pub use udp::{UdpResponseWriter, run_udp, serve_udp};

/// DNS Server
///
/// Every request received on either transport is run through the same
/// middleware container with a fresh local state.
pub struct DnsServer<G, L> {
    bind_addr: SocketAddr,
    container: Arc<MiddlewareContainer<G, L>>,
    global: Arc<G>,
}

impl<G, L> DnsServer<G, L>
where
    G: Send + Sync + 'static,
    L: Default + Send + Sync + 'static,
{
    pub fn new(bind_addr: SocketAddr, container: MiddlewareContainer<G, L>, global: Arc<G>) -> Self {
        Self {
            bind_addr,
            container: Arc::new(container),
            global,
        }
    }

    /// Run the DNS server, listening for incoming requests.
    pub async fn run(self) -> anyhow::Result<()> {
        let udp_future = run_udp(
            self.bind_addr,
            Arc::clone(&self.container),
            Arc::clone(&self.global),
        )
        .boxed();

        let tcp_future = run_tcp(self.bind_addr, self.container, self.global).boxed();

        futures::future::try_join_all(vec![udp_future, tcp_future]).await?;

        Ok(())
    }
}
