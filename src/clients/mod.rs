//! Blocking DNS transports and the [`Exchanger`] trait the resolver
//! dispatches through.

#[cfg(feature = "tcp")]
pub use self::tcp::TcpClient;

#[cfg(feature = "udp")]
pub use self::udp::UdpClient;

#[cfg(feature = "udp")]
pub use self::udp::GOOGLE;

#[cfg(feature = "tcp")]
mod tcp;

#[cfg(feature = "udp")]
mod udp;

use crate::resolver::NameServer;
use crate::types::Message;
use crate::Error;
use std::time::Duration;
use strum_macros::{Display, EnumString};

/// The transport a request goes out on.
#[derive(Copy, Clone, Debug, Display, EnumString, PartialEq)]
pub enum Protocol {
    #[strum(serialize = "UDP")]
    Udp,

    #[strum(serialize = "TCP")]
    Tcp,
}

/// A single request/response exchange with one name server.
///
/// Implementations perform one send and one receive with `timeout` applied
/// to each blocking operation (`None` waits forever). Retries, server
/// rotation and truncation handling all live in the resolver, not here.
///
/// An implementation must verify the response echoes the request's id and
/// report [`Error::XidMismatch`] otherwise, and must map undecodable
/// payloads to [`Error::Malformed`] so the resolver can decide whether the
/// payload was cut short in flight.
pub trait Exchanger {
    fn exchange(
        &self,
        server: &NameServer,
        query: &Message,
        timeout: Option<Duration>,
    ) -> Result<Message, Error>;
}

/// Checks a decoded response against the request that produced it.
#[cfg(any(feature = "udp", feature = "tcp"))]
pub(crate) fn check_response_id(query: &Message, response: &Message) -> Result<(), Error> {
    if response.id != query.id {
        return Err(Error::XidMismatch {
            expected: query.id,
            got: response.id,
        });
    }
    Ok(())
}
