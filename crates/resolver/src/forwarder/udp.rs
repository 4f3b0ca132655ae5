use std::net::SocketAddr;

use anyhow::Context;
use bytes::{Bytes, BytesMut};
use tokio::{net::UdpSocket, time::Instant};

/// Largest datagram we accept, matching the advertised EDNS payload size.
const MAX_DATAGRAM_SIZE: usize = 65_535;

/// Length of a DNS header.
const HEADER_LEN: usize = 12;

/// A single UDP socket connected to an upstream server.
#[derive(Debug)]
pub(crate) struct UdpConn {
    socket: UdpSocket,
}

impl UdpConn {
    /// Bind an ephemeral socket of the upstream's address family and connect it.
    pub async fn new(upstream_addr: SocketAddr) -> anyhow::Result<Self> {
        let bind_addr = if upstream_addr.is_ipv4() {
            SocketAddr::from(([0, 0, 0, 0], 0))
        } else {
            SocketAddr::from(([0u16; 8], 0))
        };
        let socket = UdpSocket::bind(bind_addr).await?;
        socket.connect(upstream_addr).await?;
        Ok(Self { socket })
    }

    /// Send a query and wait for the reply carrying `want_id`.
    pub async fn send_and_receive(
        &self,
        query: &[u8],
        want_id: u16,
        deadline: Instant,
    ) -> anyhow::Result<Bytes> {
        tokio::time::timeout_at(deadline, self.socket.send(query))
            .await
            .context("send timeout")??;

        let mut buf = BytesMut::zeroed(MAX_DATAGRAM_SIZE);

        // skip stray datagrams that are not a reply to this query.
        loop {
            let n = tokio::time::timeout_at(deadline, self.socket.recv(&mut buf))
                .await
                .context("recv timeout")??;

            if n >= HEADER_LEN {
                let got_id = u16::from_be_bytes([buf[0], buf[1]]);
                let qr = (buf[2] & 0x80) != 0;
                if qr && got_id == want_id {
                    buf.truncate(n);
                    return Ok(buf.freeze());
                }
            }
        }
    }
}
