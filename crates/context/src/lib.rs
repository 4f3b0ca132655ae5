use std::{
    fmt,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};

use async_trait::async_trait;
use bytes::Bytes;
use hickory_proto::op::Message;
use once_cell::sync::OnceCell;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};

pub mod chain;

pub use chain::{Chain, DnsMiddleware, MiddlewareContainer, Next};

/// The transport a DNS request arrived on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transport {
    /// Datagram
    Udp,
    /// Stream
    Tcp,
}

impl Transport {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Udp => "udp",
            Self::Tcp => "tcp",
        }
    }
}

impl fmt::Display for Transport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Sink for the reply to a single request.
#[async_trait]
pub trait ResponseWriter: Send + Sync {
    async fn write(&self, response: &Message) -> anyhow::Result<()>;
}

pub struct DnsRequestCtx<G, L> {
    transport: Transport,
    client: SocketAddr,
    raw: Bytes,
    message: OnceCell<Message>,
    writer: Arc<dyn ResponseWriter>,
    responded: AtomicBool,
    global: Arc<G>,
    local: RwLock<L>,
}

impl<G, L> DnsRequestCtx<G, L> {
    pub fn new(
        transport: Transport,
        client: SocketAddr,
        raw: Bytes,
        writer: Arc<dyn ResponseWriter>,
        global: Arc<G>,
        local: L,
    ) -> Self {
        Self {
            transport,
            client,
            raw,
            message: OnceCell::new(),
            writer,
            responded: AtomicBool::new(false),
            global,
            local: RwLock::new(local),
        }
    }

    /// Transport the request arrived on.
    pub fn transport(&self) -> Transport {
        self.transport
    }

    /// Address of the requesting client.
    pub fn client(&self) -> SocketAddr {
        self.client
    }

    /// Lazily decode and return the DNS message.
    pub fn message(&self) -> anyhow::Result<&Message> {
        self.message
            .get_or_try_init(|| Message::from_vec(&self.raw).map_err(anyhow::Error::from))
    }

    /// Raw request bytes
    pub fn raw(&self) -> Bytes {
        self.raw.clone()
    }

    /// Send a reply to the client.
    pub async fn write_response(&self, response: &Message) -> anyhow::Result<()> {
        self.writer.write(response).await?;
        self.responded.store(true, Ordering::Release);
        Ok(())
    }

    /// Whether a reply has been written for this request.
    pub fn responded(&self) -> bool {
        self.responded.load(Ordering::Acquire)
    }

    /// Global context
    pub fn global(&self) -> &G {
        &self.global
    }

    /// Local context
    pub fn local(&self) -> RwLockReadGuard<'_, L> {
        self.local.read()
    }

    /// Mutable local context
    pub fn local_mut(&self) -> RwLockWriteGuard<'_, L> {
        self.local.write()
    }
}
