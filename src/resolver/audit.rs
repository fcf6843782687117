//! Structured audit trail for query execution.
//!
//! When `enable_audit_trail` is set, the engine narrates each step of a
//! query to an [`AuditSink`]. The events are structured; how (or whether)
//! a sink renders them to text is its own business.

use crate::clients::Protocol;
use crate::types::{Question, Rcode};
use std::fmt;
use std::net::SocketAddr;
use std::sync::Arc;

/// One step in the life of a query.
#[derive(Clone, Debug)]
pub enum AuditEvent {
    /// A query is about to run against `servers` candidate servers.
    QueryStarted { question: Question, servers: usize },

    /// Answered straight from the cache.
    CacheHit { key: String },

    /// A request is going out on the wire.
    Attempt {
        server: SocketAddr,
        protocol: Protocol,
        attempt: u32,
        id: u16,
    },

    /// A response came back (of any quality).
    Response {
        server: SocketAddr,
        rcode: Rcode,
        answers: usize,
        truncated: bool,
    },

    /// An attempt failed; `error` is the rendered failure.
    AttemptFailed { server: SocketAddr, error: String },

    /// The UDP pass was truncated, re-running over TCP.
    TcpFallback,

    /// A DNS error response was recorded as a negative cache entry.
    NegativeCached { key: String },

    /// The query finished; `error` is set when it failed.
    Finished { error: Option<String> },
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEvent::QueryStarted { question, servers } => write!(
                f,
                "query {} {} {} over {} server(s)",
                question.name, question.class, question.r#type, servers
            ),
            AuditEvent::CacheHit { key } => write!(f, "cache hit for {}", key),
            AuditEvent::Attempt {
                server,
                protocol,
                attempt,
                id,
            } => write!(
                f,
                "attempt {} to {} over {} (id {:#06x})",
                attempt, server, protocol, id
            ),
            AuditEvent::Response {
                server,
                rcode,
                answers,
                truncated,
            } => write!(
                f,
                "response from {}: {} with {} answer(s){}",
                server,
                rcode,
                answers,
                if *truncated { ", truncated" } else { "" }
            ),
            AuditEvent::AttemptFailed { server, error } => {
                write!(f, "attempt to {} failed: {}", server, error)
            }
            AuditEvent::TcpFallback => write!(f, "truncated response, retrying over TCP"),
            AuditEvent::NegativeCached { key } => write!(f, "negative cache entry for {}", key),
            AuditEvent::Finished { error: None } => write!(f, "query finished"),
            AuditEvent::Finished { error: Some(e) } => write!(f, "query failed: {}", e),
        }
    }
}

/// Receives audit events. Implementations must be cheap; the engine calls
/// them inline.
pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// The default sink: forwards events to the `log` facade at debug level.
#[derive(Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, event: &AuditEvent) {
        log::debug!(target: "audit", "{}", event);
    }
}

/// Per-query handle; a disabled trail drops events without building them.
#[derive(Clone)]
pub(crate) struct Audit {
    sink: Option<Arc<dyn AuditSink>>,
}

impl Audit {
    pub fn new(enabled: bool, sink: &Arc<dyn AuditSink>) -> Audit {
        Audit {
            sink: if enabled { Some(sink.clone()) } else { None },
        }
    }

    pub fn emit(&self, event: impl FnOnce() -> AuditEvent) {
        if let Some(sink) = &self.sink {
            sink.record(&event());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        events: Mutex<Vec<String>>,
    }

    impl AuditSink for RecordingSink {
        fn record(&self, event: &AuditEvent) {
            self.events.lock().unwrap().push(event.to_string());
        }
    }

    #[test]
    fn disabled_trail_is_silent() {
        let sink = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn AuditSink> = sink.clone();

        let audit = Audit::new(false, &dyn_sink);
        audit.emit(|| AuditEvent::TcpFallback);

        assert!(sink.events.lock().unwrap().is_empty());
    }

    #[test]
    fn enabled_trail_records() {
        let sink = Arc::new(RecordingSink::default());
        let dyn_sink: Arc<dyn AuditSink> = sink.clone();

        let audit = Audit::new(true, &dyn_sink);
        audit.emit(|| AuditEvent::CacheHit {
            key: "example.com.:A:IN".to_string(),
        });

        let events = sink.events.lock().unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].contains("example.com.:A:IN"));
    }
}
