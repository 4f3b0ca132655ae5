use std::{net::SocketAddr, sync::Arc, time::Duration};

use anyhow::Context;
use async_trait::async_trait;
use bytes::Bytes;
use fwdns_context::{DnsRequestCtx, MiddlewareContainer, ResponseWriter, Transport};
use hickory_proto::op::Message;
use tokio::{
    io::{AsyncRead, AsyncReadExt, AsyncWriteExt},
    net::{TcpListener, TcpStream, tcp::OwnedWriteHalf},
    sync::Mutex,
};

/// How long a connection may sit idle between queries.
const IDLE_TIMEOUT: Duration = Duration::from_secs(10);

/// Writes length-prefixed replies on a client connection.
pub struct TcpResponseWriter {
    stream: Arc<Mutex<OwnedWriteHalf>>,
}

impl TcpResponseWriter {
    pub fn new(stream: Arc<Mutex<OwnedWriteHalf>>) -> Self {
        Self { stream }
    }
}

#[async_trait]
impl ResponseWriter for TcpResponseWriter {
    async fn write(&self, response: &Message) -> anyhow::Result<()> {
        let bytes = response.to_vec().context("failed to encode response")?;
        let len = u16::try_from(bytes.len()).context("response too large for tcp framing")?;

        let mut stream = self.stream.lock().await;
        stream.write_all(&len.to_be_bytes()).await?;
        stream.write_all(&bytes).await?;
        stream.flush().await?;

        Ok(())
    }
}

/// Run the DNS server over TCP.
pub async fn run_tcp<G, L>(
    bind_addr: SocketAddr,
    container: Arc<MiddlewareContainer<G, L>>,
    global: Arc<G>,
) -> anyhow::Result<()>
where
    G: Send + Sync + 'static,
    L: Default + Send + Sync + 'static,
{
    let listener = TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("failed to bind tcp listener on {bind_addr}"))?;
    serve_tcp(listener, container, global).await
}

/// Serve connections accepted on an already bound listener, one task per connection.
pub async fn serve_tcp<G, L>(
    listener: TcpListener,
    container: Arc<MiddlewareContainer<G, L>>,
    global: Arc<G>,
) -> anyhow::Result<()>
where
    G: Send + Sync + 'static,
    L: Default + Send + Sync + 'static,
{
    tracing::info!("TCP listening on {}", listener.local_addr()?);

    loop {
        let (stream, client) = listener.accept().await?;

        let container = Arc::clone(&container);
        let global = Arc::clone(&global);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(stream, client, container, global).await {
                tracing::warn!(client = %client, error = %e, "tcp connection failed");
            }
        });
    }
}

/// Read length-prefixed queries until the client closes the connection.
async fn handle_connection<G, L>(
    stream: TcpStream,
    client: SocketAddr,
    container: Arc<MiddlewareContainer<G, L>>,
    global: Arc<G>,
) -> anyhow::Result<()>
where
    G: Send + Sync + 'static,
    L: Default + Send + Sync + 'static,
{
    stream.set_nodelay(true)?;
    let (mut reader, writer) = stream.into_split();
    let writer = Arc::new(Mutex::new(writer));

    loop {
        let Some(raw) = read_frame(&mut reader).await? else {
            return Ok(());
        };

        let ctx = DnsRequestCtx::new(
            Transport::Tcp,
            client,
            raw,
            Arc::new(TcpResponseWriter::new(Arc::clone(&writer))),
            Arc::clone(&global),
            L::default(),
        );
        container.dispatch(&ctx).await;

        if !ctx.responded() {
            tracing::debug!(client = %client, "tcp request finished without a response");
        }
    }
}

/// Read one framed message. `None` when the peer closed or went idle between frames.
async fn read_frame<R>(reader: &mut R) -> anyhow::Result<Option<Bytes>>
where
    R: AsyncRead + Unpin,
{
    let mut len_buf = [0u8; 2];
    match tokio::time::timeout(IDLE_TIMEOUT, reader.read_exact(&mut len_buf)).await {
        Ok(Ok(_)) => {}
        Ok(Err(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Ok(Err(e)) => return Err(e.into()),
        Err(_) => return Ok(None),
    }

    let mut buf = vec![0; u16::from_be_bytes(len_buf) as usize];
    reader
        .read_exact(&mut buf)
        .await
        .context("failed to read query body")?;

    Ok(Some(Bytes::from(buf)))
}

#[cfg(test)]
#[path = "tcp_tests.rs"]
mod tcp_tests;
