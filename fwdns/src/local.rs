use std::time::{Duration, Instant};

use hickory_proto::op::ResponseCode;

/// Local state for a DNS request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Local {
    /// When the request was started
    pub time_started: Instant,

    /// Response code written to the client, if any.
    pub rcode: Option<ResponseCode>,
}

impl Local {
    pub fn time_elapsed(&self) -> Duration {
        self.time_started.elapsed()
    }
}

impl Default for Local {
    fn default() -> Self {
        Self {
            time_started: Instant::now(),
            rcode: None,
        }
    }
}

#[cfg(test)]
#[path = "local_tests.rs"]
mod local_tests;
