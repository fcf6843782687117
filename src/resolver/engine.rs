//! The resolver engine: server loop, retry loop and transport fallback.

use crate::clients::{Exchanger, Protocol};
use crate::resolver::audit::{Audit, AuditEvent, AuditSink, LogAuditSink};
use crate::resolver::cache::{cache_key, ResponseCache};
use crate::resolver::interpret::{apply_edns_hint, classify, Disposition};
use crate::resolver::options::{QueryOptions, ResolverSettings};
use crate::resolver::request::{build_request, refresh_id};
use crate::resolver::roster::{dedup_servers, NameServer, ServerRoster};
use crate::resolver::CancelToken;
use crate::types::{Class, Message, Question, Type};
use crate::Error;
use rand::seq::SliceRandom;
use std::collections::HashSet;
use std::net::IpAddr;
use std::sync::Arc;

/// UDP datagrams at or below this size that fail to decode are assumed to
/// have been cut short in flight and are retried over TCP.
const IMPLICIT_TRUNCATION_LIMIT: usize = 512;

/// How a pass over the server list ended, short of a hard failure.
enum LoopOutcome {
    /// A response to hand to the caller.
    Answered(Message),

    /// Every usable response was truncated; the driver escalates.
    Truncated,
}

/// A stub DNS resolver.
///
/// Dispatches questions to a roster of recursive name servers over UDP
/// (falling back to TCP on truncation, or TCP-only if configured), caches
/// answers by TTL, and applies a retry policy per server. The two type
/// parameters are the UDP-shaped and TCP-shaped transports; production
/// code uses [`UdpClient`](crate::clients::UdpClient) and
/// [`TcpClient`](crate::clients::TcpClient), tests substitute mocks.
///
/// A resolver is cheap to clone and safe to share; the cache and roster
/// are shared between clones, everything else is per-call.
///
/// # Example
///
/// ```no_run
/// use stubdns::resolver::Resolver;
/// use stubdns::types::{Class, Type};
///
/// # fn main() -> Result<(), stubdns::Error> {
/// let resolver = Resolver::new("8.8.8.8:53")?;
/// let response = resolver.query("bramp.net", Type::A, Class::Internet)?;
///
/// println!("{}", response);
/// # Ok(())
/// # }
/// ```
pub struct Resolver<U, T> {
    udp: Arc<U>,
    tcp: Arc<T>,

    settings: ResolverSettings,

    cache: Arc<ResponseCache>,
    roster: Arc<ServerRoster>,

    sink: Arc<dyn AuditSink>,
}

impl<U, T> Clone for Resolver<U, T> {
    fn clone(&self) -> Self {
        Resolver {
            udp: self.udp.clone(),
            tcp: self.tcp.clone(),
            settings: self.settings.clone(),
            cache: self.cache.clone(),
            roster: self.roster.clone(),
            sink: self.sink.clone(),
        }
    }
}

impl<U: Exchanger, T: Exchanger> Resolver<U, T> {
    /// Creates a resolver from explicit transports and a roster.
    pub fn with_exchangers(udp: U, tcp: T, roster: ServerRoster) -> Resolver<U, T> {
        Resolver {
            udp: Arc::new(udp),
            tcp: Arc::new(tcp),
            settings: ResolverSettings::default(),
            cache: Arc::new(ResponseCache::new()),
            roster: Arc::new(roster),
            sink: Arc::new(LogAuditSink),
        }
    }

    /// The client-level settings new queries start from.
    pub fn settings(&self) -> &ResolverSettings {
        &self.settings
    }

    /// Mutable access to the client-level settings. Queries already in
    /// flight keep the snapshot they started with.
    pub fn settings_mut(&mut self) -> &mut ResolverSettings {
        &mut self.settings
    }

    /// The response cache shared by every clone of this resolver.
    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// The server roster shared by every clone of this resolver.
    pub fn roster(&self) -> &ServerRoster {
        &self.roster
    }

    /// Replaces the audit sink events are delivered to.
    pub fn set_audit_sink(&mut self, sink: Arc<dyn AuditSink>) {
        self.sink = sink;
    }

    /// Resolves a single question with the client-level settings.
    pub fn query(&self, name: &str, r#type: Type, class: Class) -> Result<Message, Error> {
        let question = Question {
            name: Message::normalise_domain(name)?,
            r#type,
            class,
        };

        self.query_with(&question, &QueryOptions::new(self.settings.clone()))
    }

    /// Resolves `question` with explicit per-query options.
    pub fn query_with(
        &self,
        question: &Question,
        options: &QueryOptions,
    ) -> Result<Message, Error> {
        self.query_with_cancel(question, options, &CancelToken::new())
    }

    /// Like [`query_with`](Self::query_with), aborting with
    /// [`Error::Cancelled`] as soon as `cancel` trips. The token is checked
    /// before every transport invocation.
    pub fn query_with_cancel(
        &self,
        question: &Question,
        options: &QueryOptions,
        cancel: &CancelToken,
    ) -> Result<Message, Error> {
        let settings = &options.settings;
        settings.validate()?;

        // Per-query servers replace the roster outright. They are not
        // merged with auto-discovered servers; see the module docs.
        let mut servers = match &options.servers {
            Some(list) => dedup_servers(list.iter().cloned().map(Arc::new)),
            None => {
                self.roster.refresh();
                self.roster.snapshot(settings.auto_resolve_name_servers)
            }
        };

        if servers.is_empty() {
            return Err(Error::EmptyServers);
        }

        if settings.use_random_name_server && servers.len() > 1 {
            servers.shuffle(&mut rand::thread_rng());
        }

        self.resolve(question, settings, &servers, cancel)
    }

    /// Resolves a name into one or more IP addresses, querying A and AAAA.
    ///
    /// A DNS error on either query surfaces as [`Error::Dns`].
    pub fn lookup(&self, name: &str) -> Result<Vec<IpAddr>, Error> {
        use crate::resource::Resource;

        let mut results = HashSet::new();

        for r#type in &[Type::A, Type::AAAA] {
            let response = self.query(name, *r#type, Class::Internet)?;

            if response.rcode != crate::types::Rcode::NoError {
                return Err(Error::Dns(response.rcode));
            }

            for answer in response.answers {
                match answer.resource {
                    Resource::A(ip4) => results.insert(IpAddr::V4(ip4)),
                    Resource::AAAA(ip6) => results.insert(IpAddr::V6(ip6)),
                    _ => false, // Ignore other types
                };
            }
        }

        Ok(results.into_iter().collect())
    }

    /// Runs the state machine: a UDP pass over the servers, escalating to
    /// one TCP pass on truncation (or TCP from the start with
    /// `use_tcp_only`).
    fn resolve(
        &self,
        question: &Question,
        settings: &ResolverSettings,
        servers: &[Arc<NameServer>],
        cancel: &CancelToken,
    ) -> Result<Message, Error> {
        let audit = Audit::new(settings.enable_audit_trail, &self.sink);
        audit.emit(|| AuditEvent::QueryStarted {
            question: question.clone(),
            servers: servers.len(),
        });

        let mut request = build_request(question, settings);
        let key = if settings.use_cache {
            Some(cache_key(question))
        } else {
            None
        };

        let result = if settings.use_tcp_only {
            match self.server_loop(
                &*self.tcp,
                Protocol::Tcp,
                &mut request,
                question,
                settings,
                servers,
                key.as_deref(),
                cancel,
                &audit,
            )? {
                LoopOutcome::Answered(response) => Ok(response),
                LoopOutcome::Truncated => Err(Error::UnexpectedTruncatedOverTcp),
            }
        } else {
            match self.server_loop(
                &*self.udp,
                Protocol::Udp,
                &mut request,
                question,
                settings,
                servers,
                key.as_deref(),
                cancel,
                &audit,
            )? {
                LoopOutcome::Answered(response) => Ok(response),
                LoopOutcome::Truncated if !settings.use_tcp_fallback => {
                    Err(Error::TruncatedFallbackDisabled)
                }
                LoopOutcome::Truncated => {
                    audit.emit(|| AuditEvent::TcpFallback);
                    refresh_id(&mut request);

                    match self.server_loop(
                        &*self.tcp,
                        Protocol::Tcp,
                        &mut request,
                        question,
                        settings,
                        servers,
                        key.as_deref(),
                        cancel,
                        &audit,
                    )? {
                        LoopOutcome::Answered(response) => Ok(response),
                        LoopOutcome::Truncated => Err(Error::UnexpectedTruncatedOverTcp),
                    }
                }
            }
        };

        audit.emit(|| AuditEvent::Finished {
            error: result.as_ref().err().map(|e| e.to_string()),
        });

        result
    }

    /// One pass over the server list with a single transport.
    ///
    /// Iterates servers in order; per server runs `retries + 1` attempts.
    /// The request id is refreshed between any two physical sends. Every
    /// outcome is classified and dispatched per the error policy; only a
    /// truncation sentinel escapes back to the driver.
    #[allow(clippy::too_many_arguments)]
    fn server_loop<E: Exchanger>(
        &self,
        client: &E,
        protocol: Protocol,
        request: &mut Message,
        question: &Question,
        settings: &ResolverSettings,
        servers: &[Arc<NameServer>],
        key: Option<&str>,
        cancel: &CancelToken,
        audit: &Audit,
    ) -> Result<LoopOutcome, Error> {
        for (index, server) in servers.iter().enumerate() {
            let last_server = index + 1 == servers.len();

            if index > 0 {
                refresh_id(request);
            }

            // Another call may have populated the cache since the last
            // server was tried, so look again per server.
            if let Some(key) = key {
                if let Some(hit) = self.cache.get(key) {
                    audit.emit(|| AuditEvent::CacheHit {
                        key: key.to_string(),
                    });
                    return Ok(LoopOutcome::Answered(hit));
                }
            }

            let attempts = settings.retries + 1;
            let mut attempt = 0;

            while attempt < attempts {
                attempt += 1;
                let last_try = attempt == attempts;

                if attempt > 1 {
                    refresh_id(request);
                }

                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }

                audit.emit(|| AuditEvent::Attempt {
                    server: server.addr(),
                    protocol,
                    attempt,
                    id: request.id,
                });

                let exchanged = client
                    .exchange(server, request, settings.timeout)
                    .and_then(|response| {
                        // Transports check this too, but mocks and future
                        // implementations go through here as well.
                        if response.id != request.id {
                            Err(Error::XidMismatch {
                                expected: request.id,
                                got: response.id,
                            })
                        } else {
                            Ok(response)
                        }
                    });

                let response = match exchanged {
                    Ok(response) => response,
                    Err(error) => {
                        audit.emit(|| AuditEvent::AttemptFailed {
                            server: server.addr(),
                            error: error.to_string(),
                        });

                        match self.dispatch_failure(
                            error, protocol, last_try, last_server,
                        )? {
                            FailureAction::RetrySameServer => continue,
                            FailureAction::NextServer => break,
                            FailureAction::Truncated => return Ok(LoopOutcome::Truncated),
                        }
                    }
                };

                audit.emit(|| AuditEvent::Response {
                    server: server.addr(),
                    rcode: response.rcode,
                    answers: response.answers.len(),
                    truncated: response.tc,
                });

                apply_edns_hint(&response, server);

                match classify(question, &response, settings.continue_on_empty_response) {
                    Disposition::Truncated => return Ok(LoopOutcome::Truncated),

                    Disposition::Failed(rcode) => {
                        if !settings.continue_on_dns_error {
                            return self.settle_dns_error(rcode, response, key, settings, audit);
                        }

                        // Server-side errors are worth another shot at the
                        // same server; anything else rotates immediately.
                        if rcode.is_server_error() && !last_try {
                            continue;
                        }

                        if !last_server {
                            break;
                        }

                        return self.settle_dns_error(rcode, response, key, settings, audit);
                    }

                    Disposition::Unanswered => {
                        if !last_server {
                            // This server has nothing for us; the next one
                            // might. Retries are for failures, not for a
                            // server that answered emptily.
                            break;
                        }

                        self.cache_success(key, &response, settings);
                        return Ok(LoopOutcome::Answered(response));
                    }

                    Disposition::Answered => {
                        self.cache_success(key, &response, settings);
                        return Ok(LoopOutcome::Answered(response));
                    }
                }
            }
        }

        // Every last-server branch above returns; the loop can only be
        // left early.
        unreachable!("server loop ended without a verdict")
    }

    /// Applies the per-error-kind policy for failed exchanges.
    fn dispatch_failure(
        &self,
        error: Error,
        protocol: Protocol,
        last_try: bool,
        last_server: bool,
    ) -> Result<FailureAction, Error> {
        // First decide whether to keep going; `None` means surface the
        // error below.
        let action = match &error {
            // Flaky-network kinds: exhaust the tries on this server, then
            // rotate, then give up.
            Error::Timeout | Error::TransientIo(_) | Error::XidMismatch { .. } => {
                if !last_try {
                    Some(FailureAction::RetrySameServer)
                } else if !last_server {
                    Some(FailureAction::NextServer)
                } else {
                    None
                }
            }

            Error::Malformed {
                read_length,
                index,
                data_length,
            } => {
                // A UDP datagram that fits the unextended limit, or that
                // the decoder ran off the end of, was likely truncated in
                // flight without the TC bit surviving.
                let cut_short =
                    *read_length <= IMPLICIT_TRUNCATION_LIMIT || index >= data_length;

                if protocol == Protocol::Udp && cut_short {
                    Some(FailureAction::Truncated)
                } else if !last_server {
                    Some(FailureAction::NextServer)
                } else {
                    None
                }
            }

            Error::Cancelled => None,

            _ if error.is_argument() => None,

            // Anything else is unexpected; never retried on the same
            // server.
            _ => {
                if !last_server {
                    Some(FailureAction::NextServer)
                } else {
                    None
                }
            }
        };

        match action {
            Some(action) => Ok(action),
            None => match error {
                // An unexpected I/O failure on the last server surfaces as
                // a connection failure; everything else keeps its kind.
                Error::Io(io) => Err(Error::ConnectionFailure(io)),
                other => Err(other),
            },
        }
    }

    /// Final disposition of a DNS error response: throw or hand it back,
    /// negatively caching on the hand-back path.
    fn settle_dns_error(
        &self,
        rcode: crate::types::Rcode,
        response: Message,
        key: Option<&str>,
        settings: &ResolverSettings,
        audit: &Audit,
    ) -> Result<LoopOutcome, Error> {
        if settings.throw_dns_errors {
            return Err(Error::Dns(rcode));
        }

        if settings.cache_failed_results {
            if let Some(key) = key {
                self.cache.put(key, &response, true, settings);
                audit.emit(|| AuditEvent::NegativeCached {
                    key: key.to_string(),
                });
            }
        }

        Ok(LoopOutcome::Answered(response))
    }

    fn cache_success(&self, key: Option<&str>, response: &Message, settings: &ResolverSettings) {
        if let Some(key) = key {
            self.cache.put(key, response, false, settings);
        }
    }
}

enum FailureAction {
    RetrySameServer,
    NextServer,
    Truncated,
}

#[cfg(all(feature = "udp", feature = "tcp"))]
mod system {
    use super::*;
    use crate::clients::{TcpClient, UdpClient};
    use crate::resolver::discovery::ResolvConf;
    use std::io;
    use std::net::ToSocketAddrs;

    impl Resolver<UdpClient, TcpClient> {
        /// Creates a resolver over the given servers with the stock UDP
        /// and TCP transports.
        pub fn new<A: ToSocketAddrs>(servers: A) -> io::Result<Resolver<UdpClient, TcpClient>> {
            let servers = servers
                .to_socket_addrs()?
                .map(NameServer::from)
                .collect::<Vec<_>>();

            Ok(Resolver::with_exchangers(
                UdpClient::default(),
                TcpClient::default(),
                ServerRoster::new(servers),
            ))
        }

        /// Creates a resolver that discovers the system's name servers
        /// from resolv.conf, refreshed periodically.
        pub fn from_system() -> Resolver<UdpClient, TcpClient> {
            Resolver::with_exchangers(
                UdpClient::default(),
                TcpClient::default(),
                ServerRoster::with_discovery(Vec::new(), Box::new(ResolvConf::default())),
            )
        }
    }

    /// Defaults to Google's public DNS servers.
    impl Default for Resolver<UdpClient, TcpClient> {
        fn default() -> Self {
            Resolver::with_exchangers(
                UdpClient::default(),
                TcpClient::default(),
                ServerRoster::new(crate::clients::GOOGLE.clone()),
            )
        }
    }
}

#[cfg(feature = "async")]
mod awaitable {
    use super::*;

    impl<U, T> Resolver<U, T>
    where
        U: Exchanger + Send + Sync + 'static,
        T: Exchanger + Send + Sync + 'static,
    {
        /// Awaitable shape of [`query`](Resolver::query).
        ///
        /// The blocking engine runs on the blocking pool; the state
        /// machine is the same one the synchronous entry points drive.
        pub async fn query_async(
            &self,
            name: &str,
            r#type: Type,
            class: Class,
        ) -> Result<Message, Error> {
            let this = self.clone();
            let name = name.to_string();

            tokio::task::spawn_blocking(move || this.query(&name, r#type, class))
                .await
                .map_err(|e| {
                    Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
                })?
        }

        /// Awaitable shape of [`lookup`](Resolver::lookup).
        pub async fn lookup_async(&self, name: &str) -> Result<Vec<IpAddr>, Error> {
            let this = self.clone();
            let name = name.to_string();

            tokio::task::spawn_blocking(move || this.lookup(&name))
                .await
                .map_err(|e| {
                    Error::Io(std::io::Error::new(std::io::ErrorKind::Other, e))
                })?
        }
    }
}
