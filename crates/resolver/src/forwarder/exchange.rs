use std::{net::SocketAddr, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use fwdns_context::Transport;
use hickory_proto::op::Message;
use rand::Rng;
use tokio::time::Instant;

use super::{tcp::TcpConn, udp::UdpConn};

/// Sends one query to one server and waits for the decoded reply.
#[async_trait]
pub trait Exchange: Send + Sync {
    /// Returns the reply and the round-trip time.
    async fn exchange(
        &self,
        request: &Message,
        server: SocketAddr,
        transport: Transport,
        timeout: Duration,
    ) -> anyhow::Result<(Message, Duration)>;
}

/// [`Exchange`] over plain UDP and TCP sockets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NetExchange;

#[async_trait]
impl Exchange for NetExchange {
    async fn exchange(
        &self,
        request: &Message,
        server: SocketAddr,
        transport: Transport,
        timeout: Duration,
    ) -> anyhow::Result<(Message, Duration)> {
        let started = Instant::now();
        let deadline = started + timeout;
        let (query, tid) = with_random_tid(request)?;

        let mut reply = match transport {
            Transport::Udp => {
                let conn = UdpConn::new(server).await?;
                let raw = conn.send_and_receive(&query, tid, deadline).await?;
                let reply = decode_reply(&raw, tid)?;
                if reply.truncated() {
                    tracing::debug!(upstream = %server, "truncated udp reply, retrying over tcp");
                    exchange_tcp(&query, tid, server, deadline).await?
                } else {
                    reply
                }
            }
            Transport::Tcp => exchange_tcp(&query, tid, server, deadline).await?,
        };

        reply.set_id(request.id());
        Ok((reply, started.elapsed()))
    }
}

async fn exchange_tcp(
    query: &[u8],
    tid: u16,
    server: SocketAddr,
    deadline: Instant,
) -> anyhow::Result<Message> {
    let mut conn = TcpConn::connect(server, deadline).await?;
    let raw = conn.send_and_receive(query, deadline).await?;
    decode_reply(&raw, tid)
}

fn decode_reply(raw: &[u8], want_id: u16) -> anyhow::Result<Message> {
    let reply = Message::from_vec(raw).context("failed to decode upstream reply")?;
    if reply.id() != want_id {
        anyhow::bail!(
            "transaction id mismatch: expected {}, got {}",
            want_id,
            reply.id()
        );
    }
    Ok(reply)
}

/// Encode `request` under a random transaction id to make spoofed replies harder to land.
fn with_random_tid(request: &Message) -> anyhow::Result<(Vec<u8>, u16)> {
    let tid = rand::rng().random::<u16>();

    let mut outgoing = request.clone();
    outgoing.set_id(tid);
    let bytes = outgoing.to_vec().context("failed to encode query")?;

    Ok((bytes, tid))
}

#[cfg(test)]
#[path = "exchange_tests.rs"]
mod exchange_tests;
