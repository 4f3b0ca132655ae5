use async_trait::async_trait;
use fwdns_context::{DnsMiddleware, DnsRequestCtx, Next};
use fwdns_resolver::normalize_name;

use crate::{global::Global, local::Local};

/// Logs every query and the outcome of the rest of the pipeline.
pub struct QueryLogMiddleware;

#[async_trait]
impl DnsMiddleware<Global, Local> for QueryLogMiddleware {
    async fn on_query(
        &self,
        ctx: &DnsRequestCtx<Global, Local>,
        next: Next<'_, Global, Local>,
    ) -> anyhow::Result<()> {
        let (qname, qtype) = match ctx.message().map(|m| m.queries().first()) {
            Ok(Some(q)) => (q.name().to_string(), q.query_type().to_string()),
            Ok(None) => (String::new(), String::new()),
            Err(e) => {
                tracing::debug!(client = %ctx.client(), error = %e, "undecodable query");
                (String::new(), String::new())
            }
        };

        tracing::info!(
            client = %ctx.client(),
            transport = %ctx.transport(),
            qname = normalize_name(&qname),
            qtype,
            "query"
        );

        let res = next.run(ctx).await;

        let (rcode, elapsed) = {
            let local = ctx.local();
            (local.rcode, local.time_elapsed())
        };

        match rcode {
            Some(rcode) => tracing::info!(
                client = %ctx.client(),
                qname = normalize_name(&qname),
                rcode = ?rcode,
                elapsed_ms = elapsed.as_millis() as u64,
                "answered"
            ),
            None => tracing::warn!(
                client = %ctx.client(),
                qname = normalize_name(&qname),
                elapsed_ms = elapsed.as_millis() as u64,
                "query left unanswered"
            ),
        }

        res
    }
}
