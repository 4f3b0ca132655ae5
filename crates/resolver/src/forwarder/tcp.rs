use std::net::SocketAddr;

use anyhow::Context;
use bytes::{Bytes, BytesMut};
use tokio::{
    io::{AsyncReadExt, AsyncWriteExt},
    net::TcpStream,
    time::{Instant, timeout_at},
};

/// A TCP connection to an upstream server, used for a single exchange.
pub(crate) struct TcpConn {
    stream: TcpStream,
}

impl TcpConn {
    pub async fn connect(addr: SocketAddr, deadline: Instant) -> anyhow::Result<Self> {
        let stream = timeout_at(deadline, TcpStream::connect(addr))
            .await
            .context("tcp connect timeout")??;

        // length prefix and body are written separately.
        stream.set_nodelay(true)?;

        Ok(Self { stream })
    }

    /// Send a length-prefixed query and read the length-prefixed reply.
    pub async fn send_and_receive(
        &mut self,
        query: &[u8],
        deadline: Instant,
    ) -> anyhow::Result<Bytes> {
        if query.len() > u16::MAX as usize {
            anyhow::bail!("query too large for DNS/TCP: {}", query.len());
        }

        let lenb = (query.len() as u16).to_be_bytes();
        timeout_at(deadline, self.stream.write_all(&lenb))
            .await
            .context("write len timeout")??;

        timeout_at(deadline, self.stream.write_all(query))
            .await
            .context("write body timeout")??;

        let mut resp_lenb = [0u8; 2];
        timeout_at(deadline, self.stream.read_exact(&mut resp_lenb))
            .await
            .context("read len timeout")??;
        let n = u16::from_be_bytes(resp_lenb) as usize;

        let mut buf = BytesMut::zeroed(n);
        timeout_at(deadline, self.stream.read_exact(&mut buf[..]))
            .await
            .context("read body timeout")??;

        Ok(buf.freeze())
    }
}
