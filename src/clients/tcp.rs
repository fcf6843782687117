use crate::clients::check_response_id;
use crate::clients::Exchanger;
use crate::resolver::NameServer;
use crate::types::Message;
use crate::types::StatsBuilder;
use crate::Error;
use std::io::Read;
use std::io::Write;
use std::net::TcpStream;
use std::time::Duration;

/// A TCP DNS client.
///
/// Messages are framed with a two byte network-order length prefix, in
/// both directions.
/// See <https://datatracker.ietf.org/doc/html/rfc1035#section-4.2.2>
///
/// # Example
///
/// ```no_run
/// use stubdns::types::*;
/// use stubdns::clients::{Exchanger, TcpClient};
/// use std::time::Duration;
///
/// # fn main() -> Result<(), stubdns::Error> {
/// let mut query = Message::default();
/// query.add_question("bramp.net", Type::A, Class::Internet)?;
///
/// let server = "8.8.8.8:53".parse::<std::net::SocketAddr>().unwrap().into();
/// let response = TcpClient::default()
///     .exchange(&server, &query, Some(Duration::new(5, 0)))?;
///
/// println!("{}", response);
/// # Ok(())
/// # }
/// ```
#[derive(Default)]
pub struct TcpClient;

impl Exchanger for TcpClient {
    /// Sends the [`Message`] to `server` via TCP and returns the response.
    fn exchange(
        &self,
        server: &NameServer,
        query: &Message,
        timeout: Option<Duration>,
    ) -> Result<Message, Error> {
        let stream = match timeout {
            Some(t) => TcpStream::connect_timeout(&server.addr(), t),
            None => TcpStream::connect(server.addr()),
        };
        let mut stream = stream.map_err(Error::from_io)?;

        // We send discrete packets, so write as soon as possible.
        stream.set_nodelay(true).map_err(Error::from_io)?;
        stream.set_read_timeout(timeout).map_err(Error::from_io)?;
        stream.set_write_timeout(timeout).map_err(Error::from_io)?;

        let message = query.to_vec()?;
        let stats = StatsBuilder::start(message.len());

        // Two byte length prefix followed by the message.
        stream
            .write_all(&(message.len() as u16).to_be_bytes())
            .map_err(Error::from_io)?;
        stream.write_all(&message).map_err(Error::from_io)?;

        // Now receive a two byte length
        let buf = &mut [0; 2];
        stream.read_exact(buf).map_err(Error::from_io)?;
        let len = u16::from_be_bytes(*buf);

        // and finally the message
        let mut buf = vec![0; len.into()];
        stream.read_exact(&mut buf).map_err(Error::from_io)?;

        let mut resp =
            Message::from_slice(&buf).map_err(|e| Error::from_parse(e, buf.len()))?;

        check_response_id(query, &resp)?;

        resp.stats = Some(stats.end(server.addr(), buf.len() + 2));

        Ok(resp)
    }
}
