pub mod forward;
pub mod query_log;

pub use forward::ForwardMiddleware;
pub use query_log::QueryLogMiddleware;
