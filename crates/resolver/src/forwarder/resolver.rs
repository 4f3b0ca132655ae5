use std::{net::SocketAddr, path::Path, sync::Arc, time::Duration};

use async_trait::async_trait;
use fwdns_context::Transport;
use hickory_proto::op::{Edns, Message};
use tokio::{
    sync::mpsc,
    time::{Instant, interval_at},
};

use super::{
    exchange::{Exchange, NetExchange},
    upstream::Attempt,
};
use crate::{ConfigError, DnsResolver, ResolutionError, ResolveError, ResolvConf};

/// Stagger interval used when none is configured.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(200);

/// Payload size advertised in the EDNS0 record of outgoing UDP queries.
pub const EDNS_MAX_PAYLOAD: u16 = 65_535;

/// Resolver that races the configured nameservers.
///
/// Nameservers are queried in configured order, one more every stagger
/// interval, until one of them produces an acceptable answer.
pub struct Resolver {
    nameservers: Arc<[SocketAddr]>,
    interval: Duration,
    timeout: Duration,
    set_edns0: bool,
    exchange: Arc<dyn Exchange>,
}

impl Resolver {
    /// Create a resolver from the resolv.conf file at `resolv_conf`.
    ///
    /// An `interval_ms` of zero selects [`DEFAULT_INTERVAL`].
    pub fn new(
        resolv_conf: impl AsRef<Path>,
        interval_ms: u32,
        set_edns0: bool,
    ) -> Result<Self, ConfigError> {
        let config = ResolvConf::from_path(resolv_conf)?;
        Ok(Self::with_exchange(
            config,
            interval_ms,
            set_edns0,
            Arc::new(NetExchange),
        ))
    }

    /// Create a resolver over a custom [`Exchange`].
    pub fn with_exchange(
        config: ResolvConf,
        interval_ms: u32,
        set_edns0: bool,
        exchange: Arc<dyn Exchange>,
    ) -> Self {
        if config.servers.is_empty() {
            tracing::warn!(
                "No nameservers configured for resolver, it will not be able to resolve any queries!"
            );
        }

        let interval = match interval_ms {
            0 => DEFAULT_INTERVAL,
            ms => Duration::from_millis(ms as u64),
        };

        Self {
            nameservers: Arc::from(config.nameservers()),
            timeout: config.timeout(),
            interval,
            set_edns0,
            exchange,
        }
    }

    /// Nameservers with ports applied, in configured order.
    pub fn nameservers(&self) -> &[SocketAddr] {
        &self.nameservers
    }

    /// Delay between starting successive nameserver attempts.
    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// Timeout of a single exchange.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Resolve `request` over `transport`.
    ///
    /// Returns the first acceptable answer. A SERVFAIL reply or an exchange
    /// error rules a server out; any other response code is accepted as final.
    pub async fn lookup(
        &self,
        transport: Transport,
        request: &Message,
    ) -> Result<Message, ResolveError> {
        let Some(question) = request.queries().first() else {
            return Err(ResolveError::InvalidRequest(
                "request contains no question".into(),
            ));
        };
        let qname: Arc<str> = Arc::from(question.name().to_string());

        let mut outgoing = request.clone();
        if transport == Transport::Udp && self.set_edns0 {
            set_edns0(&mut outgoing);
        }
        let outgoing = Arc::new(outgoing);

        let (answer_tx, mut answer_rx) = mpsc::channel::<Message>(1);
        let mut attempts = Vec::with_capacity(self.nameservers.len());

        let mut stagger = interval_at(Instant::now() + self.interval, self.interval);

        for &server in self.nameservers.iter() {
            let attempt = Attempt {
                exchange: Arc::clone(&self.exchange),
                request: Arc::clone(&outgoing),
                qname: Arc::clone(&qname),
                server,
                transport,
                timeout: self.timeout,
            };
            attempts.push(tokio::spawn(attempt.run(answer_tx.clone())));

            // return early if we have an answer, abandoning attempts still in flight.
            tokio::select! {
                Some(answer) = answer_rx.recv() => return Ok(answer),
                _ = stagger.tick() => {}
            }
        }

        drop(answer_tx);
        for res in futures::future::join_all(attempts).await {
            if let Err(e) = res {
                tracing::error!(qname = %qname, error = %e, "lookup attempt panicked");
            }
        }

        answer_rx.try_recv().map_err(|_| {
            ResolveError::from(ResolutionError {
                qname: qname.to_string(),
                transport,
                nameservers: self.nameservers.to_vec(),
            })
        })
    }
}

#[async_trait]
impl DnsResolver for Resolver {
    async fn lookup(&self, transport: Transport, request: &Message) -> Result<Message, ResolveError> {
        Resolver::lookup(self, transport, request).await
    }
}

/// Advertise [`EDNS_MAX_PAYLOAD`] on `message`, keeping any EDNS record it already has.
fn set_edns0(message: &mut Message) {
    let mut edns = message.extensions().clone().unwrap_or_else(Edns::new);
    edns.set_max_payload(EDNS_MAX_PAYLOAD);
    edns.set_dnssec_ok(true);
    message.set_edns(edns);
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod resolver_tests;
