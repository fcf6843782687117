//! The query pipeline: cache, roster, request building, response
//! interpretation and the engine that drives them.
//!
//! The flow for a single query: the engine consults the
//! [`ResponseCache`] by question fingerprint; on a miss it builds a
//! request and iterates the server roster, running a retry loop per
//! server over UDP. Each response is classified; truncation triggers a
//! one-shot TCP pass; successes land in the cache with a TTL derived from
//! the smallest record TTL.

pub use self::audit::{AuditEvent, AuditSink, LogAuditSink};
pub use self::cache::{cache_key, ResponseCache};
pub use self::discovery::{ResolvConf, ServerDiscovery};
pub use self::engine::Resolver;
pub use self::options::{QueryOptions, ResolverSettings, MAX_TIMEOUT};
pub use self::roster::{NameServer, ServerRoster, DNS_PORT};

mod audit;
mod cache;
mod discovery;
mod engine;
mod options;
mod request;
mod interpret;
mod roster;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation for in-flight queries.
///
/// Clone the token, hand one clone to the query and trip the other from
/// anywhere. The engine checks it before every transport invocation and
/// aborts with [`Error::Cancelled`](crate::Error::Cancelled); cancellation
/// wins over the timeout deadline.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> CancelToken {
        CancelToken::default()
    }

    /// Trips the token. Every query holding a clone aborts at its next
    /// check.
    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cancel_token_trips_all_clones() {
        let token = CancelToken::new();
        let clone = token.clone();

        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }
}
