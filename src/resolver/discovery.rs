//! Discovering name servers from the operating system.

use crate::resolver::roster::NameServer;
use std::fs;
use std::io;
use std::path::PathBuf;

/// Source of name servers outside the user's explicit configuration.
///
/// The roster periodically asks its discovery for a fresh list; see
/// [`ServerRoster::refresh`](crate::resolver::ServerRoster::refresh).
pub trait ServerDiscovery {
    fn discover(&self) -> io::Result<Vec<NameServer>>;
}

/// Reads `nameserver` entries from a resolv.conf style file.
///
/// This is the conventional source of the system's resolvers on Unix-like
/// platforms.
pub struct ResolvConf {
    path: PathBuf,
}

impl Default for ResolvConf {
    fn default() -> Self {
        ResolvConf {
            path: PathBuf::from("/etc/resolv.conf"),
        }
    }
}

impl ResolvConf {
    pub fn new(path: impl Into<PathBuf>) -> ResolvConf {
        ResolvConf { path: path.into() }
    }
}

impl ServerDiscovery for ResolvConf {
    fn discover(&self) -> io::Result<Vec<NameServer>> {
        let contents = fs::read_to_string(&self.path)?;
        Ok(parse_resolv_conf(&contents))
    }
}

/// Pulls the `nameserver` lines out of a resolv.conf document. Lines that
/// do not parse are skipped, matching what other resolvers on the host do.
fn parse_resolv_conf(contents: &str) -> Vec<NameServer> {
    let mut servers = Vec::new();

    for line in contents.lines() {
        let line = match line.find(&['#', ';'][..]) {
            Some(comment) => &line[..comment],
            None => line,
        };

        let mut tokens = line.split_whitespace();
        if tokens.next() != Some("nameserver") {
            continue;
        }

        let address = match tokens.next() {
            Some(a) => a,
            None => continue,
        };

        match address.parse::<NameServer>() {
            Ok(server) => servers.push(server),
            Err(_) => log::debug!("skipping unparseable nameserver entry '{}'", address),
        }
    }

    servers
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_nameserver_lines() {
        let conf = "# generated by NetworkManager\n\
                    search localdomain\n\
                    nameserver 192.168.1.1\n\
                    nameserver 2606:4700:4700::1111\n\
                    nameserver not-an-address\n\
                    options edns0\n";

        let servers = parse_resolv_conf(conf);
        assert_eq!(servers.len(), 2);
        assert_eq!(servers[0].addr(), "192.168.1.1:53".parse().unwrap());
        assert_eq!(
            servers[1].addr(),
            "[2606:4700:4700::1111]:53".parse().unwrap()
        );
    }

    #[test]
    fn comments_are_stripped() {
        let servers = parse_resolv_conf("nameserver 10.0.0.1 # primary\n;nameserver 10.0.0.2\n");
        assert_eq!(servers.len(), 1);
        assert_eq!(servers[0].addr(), "10.0.0.1:53".parse().unwrap());
    }

    #[test]
    fn empty_document() {
        assert!(parse_resolv_conf("").is_empty());
    }
}
