//! Ordered middleware pipeline.
//!
//! Handlers are registered once into a [`MiddlewareContainer`]. Every
//! dispatched request gets its own [`Chain`], a cursor into the shared
//! handler list, and each handler decides whether the rest of the pipeline
//! runs by consuming or dropping the [`Next`] it is handed.

use std::sync::Arc;

use async_trait::async_trait;

use crate::DnsRequestCtx;

#[async_trait]
pub trait DnsMiddleware<G, L>: Send + Sync {
    /// Process the request. Call `next.run(ctx)` to hand over to the
    /// following handler; returning without it ends the pipeline.
    async fn on_query(&self, ctx: &DnsRequestCtx<G, L>, next: Next<'_, G, L>)
    -> anyhow::Result<()>;
}

type Middlewares<G, L> = Arc<Vec<Arc<dyn DnsMiddleware<G, L>>>>;

/// Registration-ordered list of middlewares, shared by every pipeline pass.
pub struct MiddlewareContainer<G, L> {
    middlewares: Middlewares<G, L>,
}

impl<G, L> MiddlewareContainer<G, L> {
    pub fn new() -> Self {
        Self {
            middlewares: Arc::new(Vec::new()),
        }
    }

    /// Append a middleware. `None` is ignored.
    pub fn register(&mut self, middleware: Option<Arc<dyn DnsMiddleware<G, L>>>) {
        let Some(middleware) = middleware else {
            return;
        };
        Arc::make_mut(&mut self.middlewares).push(middleware);
    }

    pub fn add_middleware<M>(&mut self, middleware: M)
    where
        M: DnsMiddleware<G, L> + 'static,
    {
        self.register(Some(Arc::new(middleware)));
    }

    /// Number of registered middlewares.
    pub fn len(&self) -> usize {
        self.middlewares.len()
    }

    pub fn is_empty(&self) -> bool {
        self.middlewares.is_empty()
    }

    /// Run one pipeline pass for `ctx`, starting at the first registered middleware.
    pub async fn dispatch(&self, ctx: &DnsRequestCtx<G, L>) {
        if self.middlewares.is_empty() {
            return;
        }

        let mut chain = Chain::new(Arc::clone(&self.middlewares));
        if let Err(e) = chain.advance(ctx).await {
            tracing::warn!(
                client = %ctx.client(),
                transport = %ctx.transport(),
                error = %e,
                "middleware pipeline failed"
            );
        }
    }
}

impl<G, L> Default for MiddlewareContainer<G, L> {
    fn default() -> Self {
        Self::new()
    }
}

impl<G, L> Clone for MiddlewareContainer<G, L> {
    fn clone(&self) -> Self {
        Self {
            middlewares: Arc::clone(&self.middlewares),
        }
    }
}

/// Cursor for a single pipeline pass.
pub struct Chain<G, L> {
    middlewares: Middlewares<G, L>,
    cursor: usize,
}

impl<G, L> Chain<G, L> {
    fn new(middlewares: Middlewares<G, L>) -> Self {
        Self {
            middlewares,
            cursor: 0,
        }
    }

    /// Whether every middleware of this pass has been entered.
    pub(crate) fn is_done(&self) -> bool {
        self.cursor >= self.middlewares.len()
    }

    /// Run the middleware under the cursor. A no-op once the end is reached.
    pub async fn advance(&mut self, ctx: &DnsRequestCtx<G, L>) -> anyhow::Result<()> {
        let Some(middleware) = self.middlewares.get(self.cursor).cloned() else {
            return Ok(());
        };
        // move past this node before entering it, so it is never run twice in a pass.
        self.cursor += 1;
        middleware.on_query(ctx, Next { chain: self }).await
    }
}

/// Continuation handed to a middleware. Consumed by [`Next::run`].
pub struct Next<'a, G, L> {
    chain: &'a mut Chain<G, L>,
}

impl<G, L> Next<'_, G, L> {
    /// Run the rest of the pipeline and return its result.
    pub async fn run(self, ctx: &DnsRequestCtx<G, L>) -> anyhow::Result<()> {
        self.chain.advance(ctx).await
    }
}

#[cfg(test)]
#[path = "chain_tests.rs"]
mod chain_tests;
