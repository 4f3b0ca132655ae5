use async_trait::async_trait;
use fwdns_context::{DnsMiddleware, DnsRequestCtx, Next};
use fwdns_resolver::DnsResolver;
use hickory_proto::op::{Message, MessageType, ResponseCode};

use crate::{global::Global, local::Local};

/// Terminal middleware that answers the query from the upstream resolver.
pub struct ForwardMiddleware;

#[async_trait]
impl DnsMiddleware<Global, Local> for ForwardMiddleware {
    async fn on_query(
        &self,
        ctx: &DnsRequestCtx<Global, Local>,
        _next: Next<'_, Global, Local>,
    ) -> anyhow::Result<()> {
        let request = match ctx.message() {
            Ok(m) => m,
            Err(e) => {
                let Some(id) = extract_transaction_id(&ctx.raw()) else {
                    return Err(e.context("query too short to answer"));
                };
                tracing::debug!(client = %ctx.client(), error = %e, "malformed query");

                let mut reply = Message::new();
                reply
                    .set_id(id)
                    .set_message_type(MessageType::Response)
                    .set_response_code(ResponseCode::FormErr);
                return respond(ctx, reply).await;
            }
        };

        let reply = match ctx.global().resolver.lookup(ctx.transport(), request).await {
            Ok(mut answer) => {
                answer.set_id(request.id());
                answer
            }
            Err(e) => {
                tracing::warn!(
                    client = %ctx.client(),
                    transport = %ctx.transport(),
                    error = %e,
                    "lookup failed"
                );
                error_response(request, e.response_code())
            }
        };

        respond(ctx, reply).await
    }
}

async fn respond(ctx: &DnsRequestCtx<Global, Local>, reply: Message) -> anyhow::Result<()> {
    ctx.local_mut().rcode = Some(reply.response_code());
    ctx.write_response(&reply).await
}

/// Build an empty reply to `request` carrying `rcode`.
fn error_response(request: &Message, rcode: ResponseCode) -> Message {
    let mut reply = Message::new();
    reply
        .set_id(request.id())
        .set_message_type(MessageType::Response)
        .set_op_code(request.op_code())
        .set_recursion_desired(request.recursion_desired())
        .set_recursion_available(true)
        .set_checking_disabled(request.checking_disabled())
        .set_response_code(rcode)
        .add_queries(request.queries().to_vec());
    reply
}

/// Transaction id of a raw message, if it is long enough to carry one.
fn extract_transaction_id(raw: &[u8]) -> Option<u16> {
    raw.get(..2).map(|b| u16::from_be_bytes([b[0], b[1]]))
}

#[cfg(test)]
#[path = "forward_tests.rs"]
mod forward_tests;
