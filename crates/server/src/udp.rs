use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use async_trait::async_trait;
use bytes::BytesMut;
use fwdns_context::{DnsRequestCtx, MiddlewareContainer, ResponseWriter, Transport};
use hickory_proto::op::Message;
use tokio::net::UdpSocket;

/// Receive buffer size, large enough for any EDNS0 payload.
const RECV_SIZE: usize = 65_535;

/// Sends replies back to the client a datagram came from.
pub struct UdpResponseWriter {
    socket: Arc<UdpSocket>,
    client: SocketAddr,
}

impl UdpResponseWriter {
    pub fn new(socket: Arc<UdpSocket>, client: SocketAddr) -> Self {
        Self { socket, client }
    }
}

#[async_trait]
impl ResponseWriter for UdpResponseWriter {
    async fn write(&self, response: &Message) -> anyhow::Result<()> {
        let bytes = response.to_vec().context("failed to encode response")?;
        self.socket.send_to(&bytes, self.client).await?;
        Ok(())
    }
}

/// Run the DNS server over UDP.
pub async fn run_udp<G, L>(
    bind_addr: SocketAddr,
    container: Arc<MiddlewareContainer<G, L>>,
    global: Arc<G>,
) -> anyhow::Result<()>
where
    G: Send + Sync + 'static,
    L: Default + Send + Sync + 'static,
{
    let socket = UdpSocket::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind udp socket on {bind_addr}"))?;
    serve_udp(socket, container, global).await
}

/// Serve requests arriving on an already bound socket, one task per datagram.
pub async fn serve_udp<G, L>(
    socket: UdpSocket,
    container: Arc<MiddlewareContainer<G, L>>,
    global: Arc<G>,
) -> anyhow::Result<()>
where
    G: Send + Sync + 'static,
    L: Default + Send + Sync + 'static,
{
    let socket = Arc::new(socket);
    let mut buffer = BytesMut::with_capacity(RECV_SIZE);

    tracing::info!("UDP listening on {}", socket.local_addr()?);

    loop {
        buffer.resize(RECV_SIZE, 0);
        let (len, client) = socket.recv_from(&mut buffer[..]).await?;
        let raw = buffer.split_to(len).freeze();

        let writer = Arc::new(UdpResponseWriter::new(Arc::clone(&socket), client));
        let container = Arc::clone(&container);
        let global = Arc::clone(&global);

        tokio::spawn(async move {
            let ctx = DnsRequestCtx::new(Transport::Udp, client, raw, writer, global, L::default());
            container.dispatch(&ctx).await;

            if !ctx.responded() {
                tracing::debug!(client = %client, "udp request finished without a response");
            }
        });
    }
}

#[cfg(test)]
#[path = "udp_tests.rs"]
mod udp_tests;
