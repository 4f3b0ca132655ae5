#[cfg(test)]
mod tests {
    use std::{net::SocketAddr, sync::Arc};

    use async_trait::async_trait;
    use bytes::Bytes;
    use fwdns_context::{DnsRequestCtx, MiddlewareContainer, ResponseWriter, Transport};
    use fwdns_resolver::{DnsResolver, ResolutionError, ResolveError};
    use hickory_proto::{
        op::{Message, MessageType, Query, ResponseCode},
        rr::{Name, RecordType},
    };
    use parking_lot::Mutex;

    use crate::{
        global::Global,
        local::Local,
        middleware::{ForwardMiddleware, QueryLogMiddleware},
    };

    /// Resolver with a canned outcome that records the transports it saw.
    struct Canned {
        rcode: Option<ResponseCode>,
        transports: Mutex<Vec<Transport>>,
    }

    impl Canned {
        fn answering(rcode: ResponseCode) -> Arc<Self> {
            Arc::new(Self {
                rcode: Some(rcode),
                transports: Mutex::new(Vec::new()),
            })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self {
                rcode: None,
                transports: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl DnsResolver for Canned {
        async fn lookup(
            &self,
            transport: Transport,
            request: &Message,
        ) -> Result<Message, ResolveError> {
            self.transports.lock().push(transport);

            let Some(rcode) = self.rcode else {
                return Err(ResolutionError {
                    qname: "example.com.".into(),
                    transport,
                    nameservers: vec!["10.0.0.1:53".parse().unwrap()],
                }
                .into());
            };

            // upstream replies carry their own id.
            let mut answer = request.clone();
            answer
                .set_id(request.id().wrapping_add(1))
                .set_message_type(MessageType::Response)
                .set_response_code(rcode);
            Ok(answer)
        }
    }

    #[derive(Default)]
    struct Recorder {
        written: Mutex<Vec<Message>>,
    }

    #[async_trait]
    impl ResponseWriter for Recorder {
        async fn write(&self, response: &Message) -> anyhow::Result<()> {
            self.written.lock().push(response.clone());
            Ok(())
        }
    }

    fn client() -> SocketAddr {
        "192.0.2.10:40000".parse().unwrap()
    }

    fn query_bytes(id: u16) -> Bytes {
        let mut message = Message::new();
        message
            .set_id(id)
            .set_recursion_desired(true)
            .add_query(Query::query(
                Name::from_ascii("example.com.").unwrap(),
                RecordType::A,
            ));
        Bytes::from(message.to_vec().unwrap())
    }

    fn ctx(
        transport: Transport,
        raw: Bytes,
        resolver: Arc<Canned>,
        writer: Arc<Recorder>,
    ) -> DnsRequestCtx<Global, Local> {
        DnsRequestCtx::new(
            transport,
            client(),
            raw,
            writer,
            Arc::new(Global::new(resolver)),
            Local::default(),
        )
    }

    fn pipeline() -> MiddlewareContainer<Global, Local> {
        let mut container = MiddlewareContainer::new();
        container.add_middleware(QueryLogMiddleware);
        container.add_middleware(ForwardMiddleware);
        container
    }

    #[tokio::test]
    async fn test_answer_is_written_with_client_id() {
        let resolver = Canned::answering(ResponseCode::NoError);
        let writer = Arc::new(Recorder::default());
        let ctx = ctx(Transport::Udp, query_bytes(500), resolver.clone(), writer.clone());

        pipeline().dispatch(&ctx).await;

        let written = writer.written.lock().clone();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].id(), 500);
        assert_eq!(written[0].response_code(), ResponseCode::NoError);

        assert!(ctx.responded());
        assert_eq!(ctx.local().rcode, Some(ResponseCode::NoError));
        assert_eq!(*resolver.transports.lock(), vec![Transport::Udp]);
    }

    #[tokio::test]
    async fn test_transport_is_passed_to_resolver() {
        let resolver = Canned::answering(ResponseCode::NXDomain);
        let writer = Arc::new(Recorder::default());
        let ctx = ctx(Transport::Tcp, query_bytes(9), resolver.clone(), writer.clone());

        pipeline().dispatch(&ctx).await;

        assert_eq!(*resolver.transports.lock(), vec![Transport::Tcp]);
        assert_eq!(ctx.local().rcode, Some(ResponseCode::NXDomain));
    }

    #[tokio::test]
    async fn test_resolution_failure_writes_servfail() {
        let resolver = Canned::failing();
        let writer = Arc::new(Recorder::default());
        let ctx = ctx(Transport::Udp, query_bytes(77), resolver, writer.clone());

        pipeline().dispatch(&ctx).await;

        let written = writer.written.lock().clone();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].id(), 77);
        assert_eq!(written[0].message_type(), MessageType::Response);
        assert_eq!(written[0].response_code(), ResponseCode::ServFail);
        assert_eq!(written[0].queries().len(), 1);
        assert!(written[0].answers().is_empty());
    }

    #[tokio::test]
    async fn test_malformed_query_gets_formerr() {
        let resolver = Canned::answering(ResponseCode::NoError);
        let writer = Arc::new(Recorder::default());
        let raw = Bytes::from_static(&[0x12, 0x34, 0x01]);
        let ctx = ctx(Transport::Udp, raw, resolver.clone(), writer.clone());

        pipeline().dispatch(&ctx).await;

        let written = writer.written.lock().clone();
        assert_eq!(written.len(), 1);
        assert_eq!(written[0].id(), 0x1234);
        assert_eq!(written[0].response_code(), ResponseCode::FormErr);
        assert!(resolver.transports.lock().is_empty());
    }

    #[tokio::test]
    async fn test_truncated_header_gets_no_reply() {
        let resolver = Canned::answering(ResponseCode::NoError);
        let writer = Arc::new(Recorder::default());
        let ctx = ctx(
            Transport::Udp,
            Bytes::from_static(&[0x12]),
            resolver,
            writer.clone(),
        );

        pipeline().dispatch(&ctx).await;

        assert!(writer.written.lock().is_empty());
        assert!(!ctx.responded());
        assert_eq!(ctx.local().rcode, None);
    }
}
