//! Per-client and per-query resolver settings.

use crate::io::clamp;
use crate::resolver::roster::NameServer;
use crate::Error;
use std::time::Duration;

/// The largest finite duration any of the timing knobs accept.
// i32::MAX milliseconds, a little under 25 days.
pub const MAX_TIMEOUT: Duration = Duration::from_millis(i32::MAX as u64);

/// Smallest and largest EDNS buffer sizes a request will advertise.
pub const MIN_EDNS_BUFFER_SIZE: u16 = 512;
pub const MAX_EDNS_BUFFER_SIZE: u16 = 4096;

/// Everything that shapes how a query is carried out.
///
/// A value of this type is snapshotted per query, so mutating a resolver's
/// settings never changes the behavior of a call already in flight.
///
/// The defaults match common stub-resolver behavior: recurse, cache, retry
/// twice per server, fall back to TCP on truncation.
#[derive(Clone, Debug, PartialEq)]
pub struct ResolverSettings {
    /// Sets the RD (recursion desired) bit on requests.
    pub recursion: bool,

    /// Read and write the response cache.
    pub use_cache: bool,

    /// Emit structured audit events for every step of a query.
    pub enable_audit_trail: bool,

    /// Additional tries per server. Total attempts per server is
    /// `retries + 1`.
    pub retries: u32,

    /// Surface DNS error responses as [`Error::Dns`] instead of returning
    /// the response.
    pub throw_dns_errors: bool,

    /// Deadline for each single transport call. `None` means wait forever.
    pub timeout: Option<Duration>,

    /// Retry over TCP when a UDP response is truncated.
    pub use_tcp_fallback: bool,

    /// Skip UDP entirely and query over TCP.
    pub use_tcp_only: bool,

    /// On a DNS error response, move on to the next server instead of
    /// settling for the error.
    pub continue_on_dns_error: bool,

    /// When a response carries no error but does not answer the question,
    /// move on to the next server.
    pub continue_on_empty_response: bool,

    /// Shuffle the server list once per query.
    pub use_random_name_server: bool,

    /// Requested EDNS buffer size. Values above 512 (or
    /// [`request_dnssec_records`](Self::request_dnssec_records)) switch
    /// EDNS on; the advertised size is clamped to `[512, 4096]`.
    pub extended_dns_buffer_size: u16,

    /// Set the DNSSEC OK flag and force EDNS on. No validation is done;
    /// this only asks the server to include DNSSEC records.
    pub request_dnssec_records: bool,

    /// Cache DNS error responses as negative entries.
    pub cache_failed_results: bool,

    /// How long a negative cache entry lives.
    pub failed_results_cache_duration: Duration,

    /// Lower clamp applied to record TTLs before caching. Zero or `None`
    /// means no lower clamp.
    pub minimum_cache_ttl: Option<Duration>,

    /// Upper clamp applied to record TTLs before caching. Zero or `None`
    /// means no upper clamp.
    pub maximum_cache_ttl: Option<Duration>,

    /// Augment the configured servers with discovery-provided ones.
    pub auto_resolve_name_servers: bool,
}

impl Default for ResolverSettings {
    fn default() -> Self {
        ResolverSettings {
            recursion: true,
            use_cache: true,
            enable_audit_trail: false,
            retries: 2,
            throw_dns_errors: false,
            timeout: Some(Duration::from_secs(5)),
            use_tcp_fallback: true,
            use_tcp_only: false,
            continue_on_dns_error: true,
            continue_on_empty_response: true,
            use_random_name_server: true,
            extended_dns_buffer_size: MAX_EDNS_BUFFER_SIZE,
            request_dnssec_records: false,
            cache_failed_results: false,
            failed_results_cache_duration: Duration::from_secs(5),
            minimum_cache_ttl: None,
            maximum_cache_ttl: None,
            auto_resolve_name_servers: true,
        }
    }
}

impl ResolverSettings {
    /// Checks every timing knob is strictly positive and finite (or the
    /// infinite sentinel `None`). Called by the engine before any I/O.
    pub fn validate(&self) -> Result<(), Error> {
        validate_duration("timeout", self.timeout)?;
        validate_duration(
            "failed_results_cache_duration",
            Some(self.failed_results_cache_duration),
        )?;

        // Zero clamp bounds mean "unset" and are fine.
        for (name, bound) in &[
            ("minimum_cache_ttl", self.minimum_cache_ttl),
            ("maximum_cache_ttl", self.maximum_cache_ttl),
        ] {
            if let Some(d) = bound {
                if *d > MAX_TIMEOUT {
                    return Err(Error::InvalidOptions(format!(
                        "{} must be at most {:?}",
                        name, MAX_TIMEOUT
                    )));
                }
            }
        }

        Ok(())
    }

    /// True when requests should carry an EDNS OPT record.
    pub(crate) fn wants_edns(&self) -> bool {
        self.extended_dns_buffer_size > MIN_EDNS_BUFFER_SIZE || self.request_dnssec_records
    }

    /// The EDNS buffer size to advertise, clamped to the permitted range.
    pub(crate) fn edns_buffer_size(&self) -> u16 {
        clamp(
            self.extended_dns_buffer_size,
            MIN_EDNS_BUFFER_SIZE,
            MAX_EDNS_BUFFER_SIZE,
        )
    }

    /// The lower TTL clamp, with zero meaning unset.
    pub(crate) fn effective_minimum_ttl(&self) -> Option<Duration> {
        self.minimum_cache_ttl.filter(|d| *d > Duration::ZERO)
    }

    /// The upper TTL clamp, with zero meaning unset.
    pub(crate) fn effective_maximum_ttl(&self) -> Option<Duration> {
        self.maximum_cache_ttl.filter(|d| *d > Duration::ZERO)
    }
}

fn validate_duration(name: &str, d: Option<Duration>) -> Result<(), Error> {
    if let Some(d) = d {
        if d == Duration::ZERO {
            return Err(Error::InvalidOptions(format!(
                "{} must be strictly positive",
                name
            )));
        }
        if d > MAX_TIMEOUT {
            return Err(Error::InvalidOptions(format!(
                "{} must be at most {:?}",
                name, MAX_TIMEOUT
            )));
        }
    }

    Ok(())
}

/// Per-query settings: a full [`ResolverSettings`] snapshot, plus an
/// optional server list that replaces the resolver's roster for this one
/// call.
///
/// Query-supplied servers are used as given (validated and deduplicated,
/// shuffled if configured) and are never merged with auto-discovered
/// servers.
#[derive(Clone, Debug, Default)]
pub struct QueryOptions {
    pub settings: ResolverSettings,

    /// Servers to use for this query only.
    pub servers: Option<Vec<NameServer>>,
}

impl QueryOptions {
    pub fn new(settings: ResolverSettings) -> QueryOptions {
        QueryOptions {
            settings,
            servers: None,
        }
    }

    /// Replaces the roster with `servers` for this query.
    pub fn with_servers(mut self, servers: Vec<NameServer>) -> QueryOptions {
        self.servers = Some(servers);
        self
    }
}

impl From<ResolverSettings> for QueryOptions {
    fn from(settings: ResolverSettings) -> Self {
        QueryOptions::new(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let s = ResolverSettings::default();

        assert!(s.recursion);
        assert!(s.use_cache);
        assert_eq!(s.retries, 2);
        assert_eq!(s.timeout, Some(Duration::from_secs(5)));
        assert!(s.use_tcp_fallback);
        assert!(!s.use_tcp_only);
        assert_eq!(s.extended_dns_buffer_size, 4096);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn zero_timeout_rejected() {
        let s = ResolverSettings {
            timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        assert!(matches!(s.validate(), Err(Error::InvalidOptions(_))));
    }

    #[test]
    fn oversized_timeout_rejected() {
        let s = ResolverSettings {
            timeout: Some(MAX_TIMEOUT + Duration::from_secs(1)),
            ..Default::default()
        };
        assert!(s.validate().is_err());
    }

    #[test]
    fn infinite_timeout_allowed() {
        let s = ResolverSettings {
            timeout: None,
            ..Default::default()
        };
        assert!(s.validate().is_ok());
    }

    #[test]
    fn zero_clamp_bounds_are_unset() {
        let s = ResolverSettings {
            minimum_cache_ttl: Some(Duration::ZERO),
            maximum_cache_ttl: Some(Duration::ZERO),
            ..Default::default()
        };

        assert!(s.validate().is_ok());
        assert_eq!(s.effective_minimum_ttl(), None);
        assert_eq!(s.effective_maximum_ttl(), None);
    }

    #[test]
    fn edns_rules() {
        let mut s = ResolverSettings::default();
        assert!(s.wants_edns()); // default buffer is 4096

        s.extended_dns_buffer_size = 512;
        assert!(!s.wants_edns());

        s.request_dnssec_records = true;
        assert!(s.wants_edns());

        s.extended_dns_buffer_size = 9000;
        assert_eq!(s.edns_buffer_size(), 4096);

        s.extended_dns_buffer_size = 100;
        assert_eq!(s.edns_buffer_size(), 512);
    }
}
