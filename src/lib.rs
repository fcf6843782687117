//! stubdns is a client-side stub DNS resolver library: it asks the
//! recursive name servers you point it at, and gives applications a way to
//! perform lookups without going through the host's synchronous system
//! resolver.
//!
//! # Features
//! * A full query pipeline: server rotation, per-server retries, UDP with
//!   automatic TCP fallback on truncation, and a TTL-bounded response
//!   cache with negative caching.
//! * Parsing and generating the following record types:
//!   * A,
//!   * AAAA,
//!   * CNAME,
//!   * MX,
//!   * NS,
//!   * SOA,
//!   * PTR,
//!   * TXT, and
//!   * SRV
//! * Extension Mechanisms for DNS ([EDNS(0)]), including the DNSSEC DO
//!   flag and per-server payload size hints.
//! * Name server discovery from `/etc/resolv.conf`, refreshed
//!   periodically.
//! * Structured audit trail of every step a query takes.
//! * Cancellation tokens and optional awaitable entry points (feature
//!   `async`).
//!
//! # Usage
//!
//! ```no_run
//! use stubdns::resolver::Resolver;
//! use stubdns::types::{Class, Type};
//!
//! fn main() -> Result<(), stubdns::Error> {
//!     // Query the system's resolvers, discovered from resolv.conf.
//!     let resolver = Resolver::from_system();
//!
//!     let response = resolver.query("bramp.net", Type::A, Class::Internet)?;
//!
//!     // Print the response in `dig` style.
//!     println!("{}", response);
//!
//!     // A second identical query within the TTL is answered from cache.
//!     let _cached = resolver.query("bramp.net", Type::A, Class::Internet)?;
//!
//!     Ok(())
//! }
//! ```
//!
//! If successful something like the following will be printed:
//!
//! ```text
//! ;; ->>HEADER<<- opcode: Query, status: NoError, id: 44857
//! ;; flags: qr rd ra ad; QUERY: 1, ANSWER: 2, AUTHORITY: 0, ADDITIONAL: 1
//!
//! ;; OPT PSEUDOSECTION:
//! ; EDNS: version: 0, flags:; udp: 4096
//! ;; QUESTION SECTION:
//! ; bramp.net.              IN   A
//!
//! ; ANSWER SECTION:
//! bramp.net.            299 IN   A      104.21.62.200
//! bramp.net.            299 IN   A      172.67.138.196
//! ```
//!
//! # Tuning
//!
//! Every knob lives on [`ResolverSettings`](resolver::ResolverSettings):
//! retries, timeouts, TCP-only operation, cache clamps, negative caching,
//! DNSSEC records, server shuffling, and more. Per-query overrides go
//! through [`QueryOptions`](resolver::QueryOptions), which can also carry
//! a one-off server list.
//!
//! # Testing
//!
//! ```shell
//! $ cargo test --all-features
//! ```
//!
//! The resolver is exercised end to end against mock transports; see
//! `tests/resolver.rs`.
//!
//! ## Reference
//!
//! * [rfc1034]: DOMAIN NAMES - CONCEPTS AND FACILITIES
//! * [rfc1035]: DOMAIN NAMES - IMPLEMENTATION AND SPECIFICATION
//! * [rfc6891]: Extension Mechanisms for DNS (EDNS(0))
//! * [IANA Domain Name System (DNS) Parameters](https://www.iana.org/assignments/dns-parameters/dns-parameters.xhtml)
//!
//! [EDNS(0)]: https://en.wikipedia.org/wiki/Extension_Mechanisms_for_DNS
//! [rfc1034]: https://datatracker.ietf.org/doc/html/rfc1034
//! [rfc1035]: https://datatracker.ietf.org/doc/html/rfc1035
//! [rfc6891]: https://datatracker.ietf.org/doc/html/rfc6891

pub mod clients;
mod display;
mod dns;
mod errors;
mod io;
pub mod resolver;
pub mod resource;
pub mod types;

#[macro_use]
extern crate num_derive;

#[macro_use]
extern crate lazy_static;

// Pull up the various types that should be on the front page of the docs.
#[doc(inline)]
pub use crate::types::*;

#[doc(inline)]
pub use crate::resource::*;

#[doc(inline)]
pub use crate::resolver::Resolver;

pub use crate::errors::Error;
pub use crate::errors::ParseError;
