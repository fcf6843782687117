use crate::clients::check_response_id;
use crate::clients::Exchanger;
use crate::resolver::NameServer;
use crate::types::Message;
use crate::types::StatsBuilder;
use crate::Error;
use std::net::{SocketAddr, UdpSocket};
use std::time::Duration;

lazy_static! {
    /// Google's public DNS servers, used when nothing better is known.
    pub static ref GOOGLE: Vec<NameServer> = [
        "8.8.8.8",
        "8.8.4.4",
        "2001:4860:4860::8888",
        "2001:4860:4860::8844",
    ]
    .iter()
    .map(|ip| ip.parse().expect("valid address literal"))
    .collect();
}

/// A UDP DNS client.
///
/// Sends one datagram per request and reads one datagram back, sized to
/// whatever the request's EDNS record advertised (or the classic 512
/// bytes). See <https://datatracker.ietf.org/doc/html/rfc1035#section-4.2.1>
///
/// # Example
///
/// ```no_run
/// use stubdns::types::*;
/// use stubdns::clients::{Exchanger, UdpClient};
/// use std::time::Duration;
///
/// # fn main() -> Result<(), stubdns::Error> {
/// let mut query = Message::default();
/// query.add_question("bramp.net", Type::A, Class::Internet)?;
///
/// let server = "8.8.8.8:53".parse::<std::net::SocketAddr>().unwrap().into();
/// let response = UdpClient::default()
///     .exchange(&server, &query, Some(Duration::new(5, 0)))?;
///
/// println!("{}", response);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct UdpClient;

impl UdpClient {
    /// The local any-address of the right family for `server`, so v6
    /// servers get a v6 socket.
    fn local_addr_for(server: SocketAddr) -> SocketAddr {
        if server.is_ipv4() {
            "0.0.0.0:0".parse().unwrap()
        } else {
            "[::]:0".parse().unwrap()
        }
    }
}

impl Exchanger for UdpClient {
    /// Sends the [`Message`] to `server` via UDP and returns the response.
    fn exchange(
        &self,
        server: &NameServer,
        query: &Message,
        timeout: Option<Duration>,
    ) -> Result<Message, Error> {
        let socket =
            UdpSocket::bind(UdpClient::local_addr_for(server.addr())).map_err(Error::from_io)?;
        socket.set_read_timeout(timeout).map_err(Error::from_io)?;

        // Connect to the server, meaning recv will only receive directly
        // from it.
        socket.connect(server.addr()).map_err(Error::from_io)?;

        let req = query.to_vec()?;

        let stats = StatsBuilder::start(req.len());
        socket.send(&req).map_err(Error::from_io)?;

        // The response cannot be larger than what the request advertised.
        let payload_size = match &query.extension {
            Some(ext) => ext.payload_size.max(512),
            None => 512,
        };

        let mut buf = vec![0; payload_size as usize];
        let len = socket.recv(&mut buf).map_err(Error::from_io)?;

        let mut resp =
            Message::from_slice(&buf[0..len]).map_err(|e| Error::from_parse(e, len))?;

        check_response_id(query, &resp)?;

        resp.stats = Some(stats.end(server.addr(), len));

        Ok(resp)
    }
}
