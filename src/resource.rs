//! Typed RDATA for the record types this crate understands.

use crate::bail;
use crate::io::DnsReadExt;
use crate::types::{Class, Record, Type};
use byteorder::{ReadBytesExt, BE};
use std::io;
use std::io::Cursor;
use std::io::Read;
use std::io::Seek;
use std::io::SeekFrom;
use std::net::{Ipv4Addr, Ipv6Addr};
use std::time::Duration;

/// Resource Record definitions.
// This should be kept in sync with Type.
#[allow(clippy::upper_case_acronyms)]
#[derive(Clone, Debug, PartialEq)]
pub enum Resource {
    A(Ipv4Addr),
    AAAA(Ipv6Addr),

    CNAME(String),
    NS(String),
    PTR(String),

    /// One or more character strings. Kept as raw bytes, the encoding is
    /// the zone owner's business.
    TXT(Vec<Vec<u8>>),

    MX(MX),
    SOA(SOA),
    SRV(SRV),
}

impl Resource {
    pub fn r#type(&self) -> Type {
        match self {
            Resource::A(_) => Type::A,
            Resource::AAAA(_) => Type::AAAA,
            Resource::CNAME(_) => Type::CNAME,
            Resource::NS(_) => Type::NS,
            Resource::PTR(_) => Type::PTR,
            Resource::TXT(_) => Type::TXT,
            Resource::MX(_) => Type::MX,
            Resource::SOA(_) => Type::SOA,
            Resource::SRV(_) => Type::SRV,
        }
    }
}

/// Mail exchange record, see [rfc1035].
///
/// [rfc1035]: https://datatracker.ietf.org/doc/html/rfc1035
#[derive(Clone, Debug, PartialEq)]
pub struct MX {
    /// The preference given to this RR among others at the same owner.
    /// Lower values are preferred.
    pub preference: u16,

    /// A host willing to act as a mail exchange for the owner name.
    pub exchange: String,
}

/// Start of authority record, see [rfc1035].
///
/// [rfc1035]: https://datatracker.ietf.org/doc/html/rfc1035
#[derive(Clone, Debug, PartialEq)]
pub struct SOA {
    /// The name server that was the original or primary source of data for
    /// this zone.
    pub mname: String,

    /// The mailbox of the person responsible for this zone.
    pub rname: String,

    pub serial: u32,
    pub refresh: Duration,
    pub retry: Duration,
    pub expire: Duration,
    pub minimum: Duration,
}

/// Server selection record, see [rfc2782].
///
/// [rfc2782]: https://datatracker.ietf.org/doc/html/rfc2782
#[derive(Clone, Debug, PartialEq)]
pub struct SRV {
    pub priority: u16,
    pub weight: u16,
    pub port: u16,
    pub name: String,
}

impl Record {
    /// Parses the TTL, RDLENGTH and RDATA portion of a resource record.
    /// The name, type and class have already been consumed by the caller.
    pub(crate) fn parse(
        cur: &mut Cursor<&[u8]>,
        name: String,
        r#type: Type,
        class: Class,
    ) -> io::Result<Record> {
        let ttl = cur.read_u32::<BE>()?;

        // The most significant bit of a TTL is always zero on the wire;
        // anything else is treated as zero. (rfc2181 section 8)
        let ttl = if ttl > i32::MAX as u32 { 0 } else { ttl };

        let rd_len = cur.read_u16::<BE>()?;
        let end = cur.position() + rd_len as u64;

        let resource = Resource::parse(cur, r#type, rd_len)?;

        if cur.position() != end {
            bail!(
                InvalidData,
                "record rdata length {} does not match the {} bytes consumed",
                rd_len,
                cur.position().saturating_sub(end - rd_len as u64),
            );
        }

        Ok(Record {
            name,
            class,
            ttl: Duration::from_secs(ttl.into()),
            resource,
        })
    }
}

impl Resource {
    fn parse(cur: &mut Cursor<&[u8]>, r#type: Type, rd_len: u16) -> io::Result<Resource> {
        let rd_len = rd_len as usize;

        Ok(match r#type {
            Type::A => {
                if rd_len != 4 {
                    bail!(InvalidData, "invalid A record length ({}) expected 4", rd_len);
                }
                let mut ip = [0_u8; 4];
                cur.read_exact(&mut ip)?;
                Resource::A(Ipv4Addr::from(ip))
            }

            Type::AAAA => {
                if rd_len != 16 {
                    bail!(
                        InvalidData,
                        "invalid AAAA record length ({}) expected 16",
                        rd_len
                    );
                }
                let mut ip = [0_u8; 16];
                cur.read_exact(&mut ip)?;
                Resource::AAAA(Ipv6Addr::from(ip))
            }

            Type::CNAME => Resource::CNAME(cur.read_qname()?),
            Type::NS => Resource::NS(cur.read_qname()?),
            Type::PTR => Resource::PTR(cur.read_qname()?),

            Type::TXT => Resource::TXT(parse_txt(cur, rd_len)?),

            Type::MX => Resource::MX(MX {
                preference: cur.read_u16::<BE>()?,
                exchange: cur.read_qname()?,
            }),

            Type::SOA => Resource::SOA(SOA {
                mname: cur.read_qname()?,
                rname: cur.read_qname()?,
                serial: cur.read_u32::<BE>()?,
                refresh: Duration::from_secs(cur.read_u32::<BE>()?.into()),
                retry: Duration::from_secs(cur.read_u32::<BE>()?.into()),
                expire: Duration::from_secs(cur.read_u32::<BE>()?.into()),
                minimum: Duration::from_secs(cur.read_u32::<BE>()?.into()),
            }),

            Type::SRV => Resource::SRV(SRV {
                priority: cur.read_u16::<BE>()?,
                weight: cur.read_u16::<BE>()?,
                port: cur.read_u16::<BE>()?,
                name: cur.read_qname()?,
            }),

            // The pseudo types never appear as an answer record. OPT is
            // handled by the message parser before we get here.
            Type::Reserved | Type::OPT | Type::AXFR | Type::ANY => {
                bail!(InvalidData, "unexpected record of type {}", r#type)
            }
        })
    }
}

/// Reads the sequence of length-prefixed character strings in a TXT record.
fn parse_txt(cur: &mut Cursor<&[u8]>, rd_len: usize) -> io::Result<Vec<Vec<u8>>> {
    let end = cur.position() + rd_len as u64;
    let mut txts = Vec::new();

    while cur.position() < end {
        let len = cur.read_u8()? as u64;
        if cur.position() + len > end {
            bail!(InvalidData, "TXT record string overruns the rdata");
        }

        let mut txt = vec![0; len as usize];
        cur.read_exact(&mut txt)?;
        txts.push(txt);
    }

    // Reached exactly `end` by construction.
    cur.seek(SeekFrom::Start(end))?;

    Ok(txts)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record_from(buf: &[u8], r#type: Type) -> io::Result<Record> {
        let mut cur = Cursor::new(buf);
        Record::parse(&mut cur, "example.com.".to_string(), r#type, Class::Internet)
    }

    #[test]
    fn parse_a() {
        // ttl=60, rdlen=4, 93.184.216.34
        let buf = b"\x00\x00\x00\x3c\x00\x04\x5d\xb8\xd8\x22";
        let r = record_from(buf, Type::A).unwrap();
        assert_eq!(r.ttl, Duration::from_secs(60));
        assert_eq!(r.resource, Resource::A("93.184.216.34".parse().unwrap()));
        assert_eq!(r.r#type(), Type::A);
    }

    #[test]
    fn parse_a_wrong_length() {
        let buf = b"\x00\x00\x00\x3c\x00\x03\x5d\xb8\xd8";
        assert!(record_from(buf, Type::A).is_err());
    }

    #[test]
    fn parse_txt() {
        // ttl=30, rdlen=7, "hi" + "yo!"
        let buf = b"\x00\x00\x00\x1e\x00\x07\x02hi\x03yo!";
        let r = record_from(buf, Type::TXT).unwrap();
        assert_eq!(
            r.resource,
            Resource::TXT(vec![b"hi".to_vec(), b"yo!".to_vec()])
        );
    }

    #[test]
    fn parse_mx() {
        // ttl=600, rdlen=9, preference=10, exchange=mx.com.
        let buf = b"\x00\x00\x02\x58\x00\x09\x00\x0a\x02mx\x03com\x00";
        let r = record_from(buf, Type::MX).unwrap();
        assert_eq!(
            r.resource,
            Resource::MX(MX {
                preference: 10,
                exchange: "mx.com.".to_string(),
            })
        );
    }

    #[test]
    fn parse_rdlen_mismatch_rejected() {
        // rdlen says 12 but the name consumes 9 bytes.
        let buf = b"\x00\x00\x02\x58\x00\x0c\x00\x0a\x02mx\x03com\x00";
        assert!(record_from(buf, Type::MX).is_err());
    }

    #[test]
    fn negative_ttl_treated_as_zero() {
        let buf = b"\xff\xff\xff\xff\x00\x04\x5d\xb8\xd8\x22";
        let r = record_from(buf, Type::A).unwrap();
        assert_eq!(r.ttl, Duration::from_secs(0));
    }
}
