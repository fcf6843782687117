//! The wire codec: decoding responses and encoding requests.

use crate::bail;
use crate::errors::ParseError;
use crate::io::{DnsReadExt, SeekExt};
use crate::types::*;
use byteorder::{ReadBytesExt, BE};
use num_traits::FromPrimitive;
use rand::Rng;
use std::io;
use std::io::BufRead;
use std::io::Cursor;

#[derive(Copy, Clone, PartialEq)]
enum RecordSection {
    Answers,
    Authorities,
    Additionals,
}

/// A helper class to hold state while the parsing is happening.
pub(crate) struct MessageParser<'a> {
    cur: Cursor<&'a [u8]>,

    m: Message,
}

impl<'a> MessageParser<'a> {
    fn new(buf: &[u8]) -> MessageParser {
        MessageParser {
            cur: Cursor::new(buf),
            m: Message::default(),
        }
    }

    /// Fills in the [`Message`] from the cursor. On failure the cursor is
    /// left at the position decoding stopped.
    fn parse(&mut self) -> io::Result<()> {
        self.m.id = self.cur.read_u16::<BE>()?;

        let b = self.cur.read_u8()?;
        self.m.qr = QR::from_bool(0b1000_0000 & b != 0);
        let opcode = (0b0111_1000 & b) >> 3;
        self.m.aa = (0b0000_0100 & b) != 0;
        self.m.tc = (0b0000_0010 & b) != 0;
        self.m.rd = (0b0000_0001 & b) != 0;

        self.m.opcode = match FromPrimitive::from_u8(opcode) {
            Some(t) => t,
            None => bail!(InvalidData, "invalid Opcode({})", opcode),
        };

        let b = self.cur.read_u8()?;
        self.m.ra = (0b1000_0000 & b) != 0;
        self.m.z = (0b0100_0000 & b) != 0; // Unused
        self.m.ad = (0b0010_0000 & b) != 0;
        self.m.cd = (0b0001_0000 & b) != 0;
        let rcode = 0b0000_1111 & b;

        self.m.rcode = match FromPrimitive::from_u8(rcode) {
            Some(t) => t,
            None => bail!(InvalidData, "invalid RCode({})", rcode),
        };

        let qd_count = self.cur.read_u16::<BE>()?;
        let an_count = self.cur.read_u16::<BE>()?;
        let ns_count = self.cur.read_u16::<BE>()?;
        let ar_count = self.cur.read_u16::<BE>()?;

        self.read_questions(qd_count)?;
        self.read_records(an_count, RecordSection::Answers)?;
        self.read_records(ns_count, RecordSection::Authorities)?;
        self.read_records(ar_count, RecordSection::Additionals)?;

        if self.cur.remaining()? > 0 {
            bail!(
                Other,
                "finished parsing with {} bytes left over",
                self.cur.remaining()?
            );
        }

        Ok(())
    }

    fn read_questions(&mut self, count: u16) -> io::Result<()> {
        self.m.questions.reserve_exact(count.into());

        for _ in 0..count {
            let name = self.cur.read_qname()?;
            let r#type = self.cur.read_type()?;
            let class = self.cur.read_class()?;

            self.m.questions.push(Question {
                name,
                r#type,
                class,
            });
        }

        Ok(())
    }

    fn read_records(&mut self, count: u16, section: RecordSection) -> io::Result<()> {
        for _ in 0..count {
            let name = self.cur.read_qname()?;
            let r#type = self.cur.read_type()?;

            if section == RecordSection::Additionals && r#type == Type::OPT {
                if self.m.extension.is_some() {
                    bail!(
                        InvalidData,
                        "multiple EDNS(0) extensions. Expected only one."
                    );
                }

                let ext = Extension::parse(&mut self.cur, name, r#type)?;

                self.m.extension = Some(ext);
            } else {
                let class = self.cur.read_class()?;
                let record = Record::parse(&mut self.cur, name, r#type, class)?;

                let records = match section {
                    RecordSection::Answers => &mut self.m.answers,
                    RecordSection::Authorities => &mut self.m.authorities,
                    RecordSection::Additionals => &mut self.m.additionals,
                };
                records.push(record);
            }
        }

        Ok(())
    }
}

/// Defaults to a [`Message`] with sensible values for querying.
impl Default for Message {
    fn default() -> Self {
        Message {
            id: Message::random_id(),
            rd: true,
            tc: false,
            aa: false,
            opcode: Opcode::Query,
            qr: QR::Query,
            rcode: Rcode::NoError,
            cd: false,
            ad: true,
            z: false,
            ra: false,

            questions: Vec::default(),
            answers: Vec::default(),
            authorities: Vec::default(),
            additionals: Vec::default(),
            extension: None,
            stats: None,
        }
    }
}

impl Message {
    /// Returns a random u16 suitable for the [`Message`] id field.
    ///
    /// This is generated with the [`rand::rngs::StdRng`] which is a suitable
    /// cryptographically secure pseudorandom number generator.
    pub fn random_id() -> u16 {
        rand::thread_rng().gen()
    }

    /// Decodes the supplied buffer and returns a [`Message`].
    ///
    /// On failure the [`ParseError`] records how far decoding got, which
    /// the transports use to spot payloads that were cut short in flight.
    pub fn from_slice(buf: &[u8]) -> Result<Message, ParseError> {
        let mut parser = MessageParser::new(buf);

        match parser.parse() {
            Ok(()) => Ok(parser.m),
            Err(source) => Err(ParseError {
                index: parser.cur.position() as usize,
                data_length: buf.len(),
                source,
            }),
        }
    }

    /// Takes a unicode domain, converts to ascii, and back to unicode.
    /// This has the effect of normalising it, so its easier to compare
    /// what was queried, and what was returned.
    pub(crate) fn normalise_domain(domain: &str) -> Result<String, crate::Error> {
        let ascii = idna::domain_to_ascii(domain)
            .map_err(|_| crate::Error::InvalidName(domain.to_string()))?;

        let (mut unicode, result) = idna::domain_to_unicode(&ascii);
        match result {
            Ok(_) => {
                if !unicode.ends_with('.') {
                    unicode.push('.')
                }
                Ok(unicode)
            }
            Err(_) => Err(crate::Error::InvalidName(domain.to_string())),
        }
    }

    /// Adds a question to the message, normalising the domain name.
    pub fn add_question(
        &mut self,
        domain: &str,
        r#type: Type,
        class: Class,
    ) -> Result<(), crate::Error> {
        let domain = Message::normalise_domain(domain)?;

        let q = Question {
            name: domain,
            r#type,
            class,
        };

        self.questions.push(q);
        Ok(())
    }

    /// Adds a EDNS(0) extension record, as defined by [rfc6891].
    ///
    /// [rfc6891]: https://datatracker.ietf.org/doc/html/rfc6891
    pub fn add_extension(&mut self, ext: Extension) {
        self.extension = Some(ext);
    }

    /// Encodes this DNS [`Message`] as a [`Vec<u8>`] ready to be sent, as
    /// defined by [rfc1035]. Only query messages (questions plus an
    /// optional extension) can be encoded.
    ///
    /// [rfc1035]: https://datatracker.ietf.org/doc/html/rfc1035
    pub fn to_vec(&self) -> io::Result<Vec<u8>> {
        if !self.answers.is_empty() || !self.authorities.is_empty() || !self.additionals.is_empty()
        {
            bail!(InvalidInput, "encoding answer records is not supported");
        }

        let mut req = Vec::<u8>::with_capacity(512);

        req.extend_from_slice(&self.id.to_be_bytes());

        let mut b = 0_u8;
        b |= if self.qr.to_bool() { 0b1000_0000 } else { 0 };
        b |= ((self.opcode as u8) << 3) & 0b0111_1000;
        b |= if self.aa { 0b0000_0100 } else { 0 };
        b |= if self.tc { 0b0000_0010 } else { 0 };
        b |= if self.rd { 0b0000_0001 } else { 0 };
        req.push(b);

        let mut b = 0_u8;
        b |= if self.ra { 0b1000_0000 } else { 0 };
        b |= if self.z { 0b0100_0000 } else { 0 };
        b |= if self.ad { 0b0010_0000 } else { 0 };
        b |= if self.cd { 0b0001_0000 } else { 0 };
        b |= (self.rcode as u8) & 0b0000_1111;

        req.push(b);

        let ar_count = self.extension.is_some() as u16;

        req.extend_from_slice(&(self.questions.len() as u16).to_be_bytes());
        req.extend_from_slice(&0_u16.to_be_bytes());
        req.extend_from_slice(&0_u16.to_be_bytes());
        req.extend_from_slice(&ar_count.to_be_bytes());

        for question in &self.questions {
            Message::write_qname(&mut req, &question.name)?;

            req.extend_from_slice(&(question.r#type as u16).to_be_bytes());
            req.extend_from_slice(&(question.class as u16).to_be_bytes());
        }

        if let Some(e) = &self.extension {
            e.write(&mut req)?
        }

        Ok(req)
    }

    /// Writes a Unicode domain name into the supplied [`Vec<u8>`] as
    /// length-prefixed ASCII labels.
    // Compression is never applied; a request carries a single name, so
    // there is nothing to point back to.
    fn write_qname(buf: &mut Vec<u8>, domain: &str) -> io::Result<()> {
        let domain = match idna::domain_to_ascii(domain) {
            Err(e) => {
                bail!(InvalidData, "invalid dns name '{0}': {1}", domain, e);
            }
            Ok(domain) => domain,
        };

        if !domain.is_empty() && domain != "." {
            let start = buf.len();

            for label in domain.split_terminator('.') {
                if label.is_empty() {
                    bail!(InvalidData, "empty label in domain name '{}'", domain);
                }

                if label.len() > 63 {
                    bail!(InvalidData, "label '{0}' longer than 63 characters", label);
                }

                // Write the length.
                buf.push(label.len() as u8);

                // Then the actual label.
                buf.extend_from_slice(label.as_bytes());
            }

            // 255 octets maximum, including length octets and terminator.
            if buf.len() - start + 1 > 255 {
                bail!(InvalidData, "domain name '{}' longer than 255 octets", domain);
            }
        }

        buf.push(0);

        Ok(())
    }
}

impl Extension {
    pub(crate) fn parse(
        cur: &mut Cursor<&[u8]>,
        domain: String,
        r#type: Type,
    ) -> io::Result<Extension> {
        assert!(r#type == Type::OPT);

        if domain != "." {
            bail!(
                InvalidData,
                "expected root domain for EDNS(0) extension, got '{}'",
                domain
            );
        }

        let payload_size = cur.read_u16::<BE>()?;
        let extend_rcode = cur.read_u8()?;

        let version = cur.read_u8()?;
        let b = cur.read_u8()?;
        let dnssec_ok = b & 0b1000_0000 == 0b1000_0000;

        let _z = cur.read_u8()?;

        // Skip any EDNS options; none are interpreted here.
        let rd_len = cur.read_u16::<BE>()?;
        cur.consume(rd_len.into());

        Ok(Extension {
            payload_size,
            extend_rcode,
            version,
            dnssec_ok,
        })
    }

    pub(crate) fn write(&self, buf: &mut Vec<u8>) -> io::Result<()> {
        buf.push(0); // A single "." domain name
        buf.extend_from_slice(&(Type::OPT as u16).to_be_bytes());
        buf.extend_from_slice(&self.payload_size.to_be_bytes());

        buf.push(self.extend_rcode);
        buf.push(self.version);

        let mut b = 0_u8;
        b |= if self.dnssec_ok { 0b1000_0000 } else { 0 };

        // 16 bits of flags.
        buf.push(b);
        buf.push(0);

        // 16 bit RDLEN, no options carried.
        buf.push(0);
        buf.push(0);

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    /// Hand-built response for `example.com A` with a single A record.
    fn sample_response(id: u16) -> Vec<u8> {
        let mut buf = Vec::new();
        buf.extend_from_slice(&id.to_be_bytes());
        buf.extend_from_slice(&[0x81, 0x80]); // qr rd ra, NoError
        buf.extend_from_slice(&[0, 1, 0, 1, 0, 0, 0, 0]);

        // Question: example.com A IN
        buf.extend_from_slice(b"\x07example\x03com\x00");
        buf.extend_from_slice(&[0, 1, 0, 1]);

        // Answer: pointer to the question name, A IN ttl=60
        buf.extend_from_slice(&[0xC0, 0x0C]);
        buf.extend_from_slice(&[0, 1, 0, 1]);
        buf.extend_from_slice(&[0, 0, 0, 60]);
        buf.extend_from_slice(&[0, 4, 93, 184, 216, 34]);

        buf
    }

    #[test]
    fn decode_response() {
        let m = Message::from_slice(&sample_response(0x1234)).unwrap();

        assert_eq!(m.id, 0x1234);
        assert_eq!(m.qr, QR::Response);
        assert_eq!(m.rcode, Rcode::NoError);
        assert_eq!(m.questions.len(), 1);
        assert_eq!(m.questions[0].name, "example.com.");
        assert_eq!(m.answers.len(), 1);
        assert_eq!(m.answers[0].name, "example.com.");
        assert_eq!(m.answers[0].ttl.as_secs(), 60);
    }

    #[test]
    fn decode_truncated_header_reports_position() {
        let buf = &sample_response(7)[..8];
        let err = Message::from_slice(buf).unwrap_err();

        assert_eq!(err.data_length, 8);
        assert!(err.overran());
    }

    #[test]
    fn decode_cut_short_mid_record_overruns() {
        let full = sample_response(7);
        let err = Message::from_slice(&full[..full.len() - 4]).unwrap_err();

        assert!(err.overran());
    }

    #[test]
    fn encode_decode_query_round_trip() {
        let mut m = Message::default();
        m.add_question("Example.COM", Type::A, Class::Internet).unwrap();
        m.add_extension(Extension {
            payload_size: 4096,
            ..Default::default()
        });

        let wire = m.to_vec().unwrap();
        let decoded = Message::from_slice(&wire).unwrap();

        assert_eq!(decoded.id, m.id);
        assert_eq!(decoded.questions, m.questions);
        assert_eq!(decoded.questions[0].name, "example.com.");
        assert_eq!(decoded.extension, m.extension);

        // Encoding what we decoded gives the same bytes back.
        assert_eq!(decoded.to_vec().unwrap(), wire);
    }

    #[test]
    fn decode_nxdomain_from_hex() {
        // Captured shape of an NXDOMAIN response to `example.com A`.
        let raw = hex::decode(concat!(
            "1234", "8183", "0001", "0000", "0000", "0000",
            "076578616d706c6503636f6d00", "0001", "0001",
        ))
        .unwrap();

        let m = Message::from_slice(&raw).unwrap();

        assert_eq!(m.id, 0x1234);
        assert_eq!(m.rcode, Rcode::NXDomain);
        assert!(m.ra);
        assert!(m.answers.is_empty());
        assert_eq!(m.questions[0].name, "example.com.");
    }

    #[test]
    fn trailing_bytes_rejected() {
        let mut buf = sample_response(1);
        buf.push(0);
        assert!(Message::from_slice(&buf).is_err());
    }

    #[test]
    fn question_name_normalised() {
        let mut m = Message::default();
        m.add_question("BRAMP.net", Type::A, Class::Internet).unwrap();
        assert_eq!(m.questions[0].name, "bramp.net.");
    }

    #[test]
    fn invalid_name_rejected() {
        let mut m = Message::default();
        let overlong = "a".repeat(64);
        assert!(m
            .add_question(&overlong, Type::A, Class::Internet)
            .and_then(|_| m.to_vec().map(|_| ()).map_err(crate::Error::Io))
            .is_err());
    }
}
