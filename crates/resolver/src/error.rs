use std::{fmt, net::SocketAddr};

use fwdns_context::Transport;
use hickory_proto::op::ResponseCode;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
}

impl ResolveError {
    /// Response code to report back to the client.
    pub fn response_code(&self) -> ResponseCode {
        match self {
            Self::InvalidRequest(_) => ResponseCode::FormErr,
            Self::Resolution(_) => ResponseCode::ServFail,
        }
    }
}

/// No configured nameserver produced an acceptable answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionError {
    pub qname: String,
    pub transport: Transport,
    pub nameservers: Vec<SocketAddr>,
}

impl fmt::Display for ResolutionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} resolve failed on ", self.qname)?;
        for (i, ns) in self.nameservers.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{ns}")?;
        }
        write!(f, " ({})", self.transport)
    }
}

impl std::error::Error for ResolutionError {}
