use std::{env, sync::Arc};

use config::{DEFAULT_CONFIG_PATH, load_config};
use fwdns_context::MiddlewareContainer;
use fwdns_resolver::Resolver;
use fwdns_server::DnsServer;
use global::Global;
use local::Local;
use middleware::{ForwardMiddleware, QueryLogMiddleware};
use tokio::signal;
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking;
use tracing_subscriber::{Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod global;
mod local;
mod middleware;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (nb, _guard) = non_blocking(std::io::stdout());

    let config_path = env::var("FWDNS_CONFIG").unwrap_or(DEFAULT_CONFIG_PATH.to_string());

    let config = load_config(&config_path)?;

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_writer(nb)
                .with_target(false)
                .with_filter(LevelFilter::from(config.server.log_level)),
        )
        .init();

    let server_addr = config.server.socket_addr()?;

    let resolver = Resolver::new(
        &config.resolver.resolv_conf,
        config.resolver.interval_ms,
        config.resolver.edns0,
    )?;
    tracing::info!(
        nameservers = ?resolver.nameservers(),
        interval_ms = resolver.interval().as_millis() as u64,
        edns0 = config.resolver.edns0,
        "resolver loaded from {}",
        config.resolver.resolv_conf
    );

    let global = Arc::new(Global::new(Arc::new(resolver)));

    let mut container = MiddlewareContainer::<Global, Local>::new();
    container.add_middleware(QueryLogMiddleware);
    container.add_middleware(ForwardMiddleware);

    let server = DnsServer::new(server_addr, container, global);

    tokio::select! {
        r = server.run() => {
            if let Err(e) = r {
                tracing::error!("DNS server exited with error: {}", e);
            }
        },
        _ = signal::ctrl_c() => {
            tracing::info!("Shutting down DNS server...");
        },
    }

    Ok(())
}
