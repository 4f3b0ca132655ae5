use std::{net::SocketAddr, sync::Arc, time::Duration};

use fwdns_context::Transport;
use hickory_proto::op::{Message, ResponseCode};
use tokio::sync::mpsc;

use super::exchange::Exchange;
use crate::normalize_name;

/// One lookup attempt against one nameserver.
pub(crate) struct Attempt {
    pub exchange: Arc<dyn Exchange>,
    pub request: Arc<Message>,
    pub qname: Arc<str>,
    pub server: SocketAddr,
    pub transport: Transport,
    pub timeout: Duration,
}

impl Attempt {
    /// Query the server and offer an acceptable reply to `answers`.
    pub async fn run(self, answers: mpsc::Sender<Message>) {
        let qname = normalize_name(&self.qname);

        let (reply, rtt) = match self
            .exchange
            .exchange(&self.request, self.server, self.transport, self.timeout)
            .await
        {
            Ok(r) => r,
            Err(e) => {
                tracing::warn!(
                    qname,
                    upstream = %self.server,
                    transport = %self.transport,
                    error = %e,
                    "upstream exchange failed"
                );
                return;
            }
        };

        let rcode = reply.response_code();
        if rcode != ResponseCode::NoError {
            tracing::debug!(
                qname,
                upstream = %self.server,
                transport = %self.transport,
                rcode = ?rcode,
                "upstream returned no valid answer"
            );
            // SERVFAIL means this server is unusable. Any other code is a
            // definitive answer that asking other servers would not change.
            if rcode == ResponseCode::ServFail {
                return;
            }
        } else {
            tracing::debug!(
                qname,
                upstream = %self.server,
                transport = %self.transport,
                rtt_ms = rtt.as_millis() as u64,
                "resolved"
            );
        }

        // a full slot means another attempt already won.
        let _ = answers.try_send(reply);
    }
}
