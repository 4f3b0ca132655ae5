#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use async_trait::async_trait;
    use fwdns_context::{DnsMiddleware, DnsRequestCtx, MiddlewareContainer, Next, Transport};
    use hickory_proto::{
        op::{Message, MessageType, Query, ResponseCode},
        rr::{Name, RecordType},
    };
    use parking_lot::Mutex;
    use tokio::net::UdpSocket;

    use crate::serve_udp;

    #[derive(Default)]
    struct Seen {
        transports: Mutex<Vec<Transport>>,
    }

    /// Answers every query with NXDOMAIN.
    struct NxDomain;

    #[async_trait]
    impl DnsMiddleware<Seen, ()> for NxDomain {
        async fn on_query(
            &self,
            ctx: &DnsRequestCtx<Seen, ()>,
            _next: Next<'_, Seen, ()>,
        ) -> anyhow::Result<()> {
            ctx.global().transports.lock().push(ctx.transport());

            let query = ctx.message()?;
            let mut reply = Message::new();
            reply
                .set_id(query.id())
                .set_message_type(MessageType::Response)
                .set_response_code(ResponseCode::NXDomain)
                .add_queries(query.queries().to_vec());
            ctx.write_response(&reply).await
        }
    }

    /// Never answers.
    struct Silent;

    #[async_trait]
    impl DnsMiddleware<Seen, ()> for Silent {
        async fn on_query(
            &self,
            ctx: &DnsRequestCtx<Seen, ()>,
            _next: Next<'_, Seen, ()>,
        ) -> anyhow::Result<()> {
            ctx.global().transports.lock().push(ctx.transport());
            Ok(())
        }
    }

    fn query(id: u16) -> Vec<u8> {
        let mut message = Message::new();
        message.set_id(id).add_query(Query::query(
            Name::from_ascii("nope.example.").unwrap(),
            RecordType::AAAA,
        ));
        message.to_vec().unwrap()
    }

    async fn start<M>(middleware: M) -> (std::net::SocketAddr, Arc<Seen>)
    where
        M: DnsMiddleware<Seen, ()> + 'static,
    {
        let socket = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = socket.local_addr().unwrap();

        let mut container = MiddlewareContainer::new();
        container.add_middleware(middleware);
        let global = Arc::new(Seen::default());

        tokio::spawn(serve_udp(socket, Arc::new(container), Arc::clone(&global)));
        (addr, global)
    }

    #[tokio::test]
    async fn test_udp_request_is_answered_by_pipeline() {
        let (addr, global) = start(NxDomain).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(&query(31), addr).await.unwrap();

        let mut buf = vec![0u8; 512];
        let (n, from) = tokio::time::timeout(Duration::from_secs(2), client.recv_from(&mut buf))
            .await
            .unwrap()
            .unwrap();

        let reply = Message::from_vec(&buf[..n]).unwrap();
        assert_eq!(from, addr);
        assert_eq!(reply.id(), 31);
        assert_eq!(reply.response_code(), ResponseCode::NXDomain);
        assert_eq!(*global.transports.lock(), vec![Transport::Udp]);
    }

    #[tokio::test]
    async fn test_udp_request_without_response_gets_nothing() {
        let (addr, global) = start(Silent).await;

        let client = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        client.send_to(&query(32), addr).await.unwrap();

        let mut buf = vec![0u8; 512];
        let res =
            tokio::time::timeout(Duration::from_millis(200), client.recv_from(&mut buf)).await;

        assert!(res.is_err());
        assert_eq!(*global.transports.lock(), vec![Transport::Udp]);
    }
}
