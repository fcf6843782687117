//! The set of name servers a resolver dispatches queries to.

use crate::resolver::discovery::ServerDiscovery;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::sync::atomic::{AtomicU16, AtomicU64, Ordering};
use std::sync::Arc;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// The default DNS port.
pub const DNS_PORT: u16 = 53;

/// A single name server endpoint.
///
/// Besides the address this carries the UDP payload size the server last
/// advertised via EDNS, which is remembered across queries as a sizing
/// hint.
#[derive(Debug)]
pub struct NameServer {
    addr: SocketAddr,

    /// Last EDNS payload size advertised by this server. Zero means the
    /// server has not told us yet.
    udp_payload: AtomicU16,
}

impl NameServer {
    pub fn new(addr: SocketAddr) -> NameServer {
        NameServer {
            addr,
            udp_payload: AtomicU16::new(0),
        }
    }

    /// The server's socket address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// A server is dispatchable iff it has a real address and port.
    /// The any-address ("0.0.0.0" / "::") is what a misconfigured
    /// interface reports, not somewhere we can send a datagram.
    pub fn is_valid(&self) -> bool {
        !self.addr.ip().is_unspecified() && self.addr.port() != 0
    }

    /// The UDP payload size this server advertised in a previous
    /// exchange, if any.
    pub fn advertised_payload_size(&self) -> Option<u16> {
        match self.udp_payload.load(Ordering::Relaxed) {
            0 => None,
            size => Some(size),
        }
    }

    /// Remembers the payload size found in a response's OPT record.
    pub(crate) fn note_payload_size(&self, size: u16) {
        self.udp_payload.store(size, Ordering::Relaxed);
    }
}

impl From<SocketAddr> for NameServer {
    fn from(addr: SocketAddr) -> Self {
        NameServer::new(addr)
    }
}

impl From<IpAddr> for NameServer {
    fn from(ip: IpAddr) -> Self {
        NameServer::new(SocketAddr::new(ip, DNS_PORT))
    }
}

/// Parses "ip" or "ip:port" forms, defaulting to port 53.
impl FromStr for NameServer {
    type Err = std::net::AddrParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.parse::<SocketAddr>() {
            Ok(addr) => Ok(NameServer::new(addr)),
            Err(_) => {
                let ip: IpAddr = s.parse()?;
                Ok(NameServer::from(ip))
            }
        }
    }
}

impl Clone for NameServer {
    fn clone(&self) -> Self {
        NameServer {
            addr: self.addr,
            udp_payload: AtomicU16::new(self.udp_payload.load(Ordering::Relaxed)),
        }
    }
}

impl PartialEq for NameServer {
    fn eq(&self, other: &Self) -> bool {
        self.addr == other.addr
    }
}

impl Eq for NameServer {}

impl Hash for NameServer {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr.hash(state)
    }
}

impl fmt::Display for NameServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.addr.fmt(f)
    }
}

/// Minimum time between two discovery refreshes.
const REFRESH_INTERVAL: Duration = Duration::from_secs(60);

/// The ordered, validated, deduplicated set of servers eligible for
/// dispatch.
///
/// Combines the user-supplied list with the most recent discovery result.
/// Reads take a cheap snapshot; the only exclusive access is the pointer
/// swap when a refresh lands.
pub struct ServerRoster {
    user: Vec<Arc<NameServer>>,

    discovered: RwLock<Vec<Arc<NameServer>>>,

    discovery: Option<Box<dyn ServerDiscovery + Send + Sync>>,

    /// Seconds-since-`epoch` of the last refresh, plus one so that zero can
    /// mean "never". Concurrent refreshes race on this with a
    /// compare-and-swap; losers skip.
    last_refresh: AtomicU64,
    epoch: Instant,
}

impl ServerRoster {
    /// A roster over a fixed server list, no discovery.
    pub fn new(servers: Vec<NameServer>) -> ServerRoster {
        ServerRoster {
            user: servers.into_iter().map(Arc::new).collect(),
            discovered: RwLock::new(Vec::new()),
            discovery: None,
            last_refresh: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    /// A roster that augments `servers` with whatever `discovery` reports.
    pub fn with_discovery(
        servers: Vec<NameServer>,
        discovery: Box<dyn ServerDiscovery + Send + Sync>,
    ) -> ServerRoster {
        ServerRoster {
            user: servers.into_iter().map(Arc::new).collect(),
            discovered: RwLock::new(Vec::new()),
            discovery: Some(discovery),
            last_refresh: AtomicU64::new(0),
            epoch: Instant::now(),
        }
    }

    /// Re-runs discovery, at most once per minute.
    ///
    /// Concurrent callers collapse to a single refresh; the winner is
    /// decided by a compare-and-swap on the last-run tick. A failing
    /// discovery keeps the previous list.
    pub fn refresh(&self) {
        let discovery = match &self.discovery {
            Some(d) => d,
            None => return,
        };

        let tick = self.epoch.elapsed().as_secs() + 1;
        let last = self.last_refresh.load(Ordering::Acquire);

        if last != 0 && tick.saturating_sub(last) < REFRESH_INTERVAL.as_secs() {
            return;
        }

        if self
            .last_refresh
            .compare_exchange(last, tick, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            // Someone else won the race and is refreshing.
            return;
        }

        match discovery.discover() {
            Ok(servers) => {
                let servers: Vec<Arc<NameServer>> =
                    servers.into_iter().map(Arc::new).collect();
                log::debug!("discovered {} name servers", servers.len());
                *self.discovered.write().unwrap() = servers;
            }
            Err(e) => {
                // Keep whatever we had.
                log::warn!("name server discovery failed: {}", e);
            }
        }
    }

    /// The effective server list: user servers first, then discovered ones
    /// (when `include_discovered`), invalid entries dropped, duplicates
    /// removed keeping the first occurrence.
    pub fn snapshot(&self, include_discovered: bool) -> Vec<Arc<NameServer>> {
        let discovered = if include_discovered {
            self.discovered.read().unwrap().clone()
        } else {
            Vec::new()
        };

        dedup_servers(self.user.iter().chain(discovered.iter()).cloned())
    }
}

/// Drops invalid servers and duplicate addresses, preserving order.
pub(crate) fn dedup_servers(
    servers: impl Iterator<Item = Arc<NameServer>>,
) -> Vec<Arc<NameServer>> {
    let mut seen = HashSet::new();

    servers
        .filter(|s| s.is_valid())
        .filter(|s| seen.insert(s.addr()))
        .collect()
}
