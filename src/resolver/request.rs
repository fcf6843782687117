//! Turning a question plus settings into a request message.

use crate::resolver::options::ResolverSettings;
use crate::types::{Extension, Message, Question};

/// Builds the request for `question` under `settings`.
///
/// The settings decide the RD bit and whether an EDNS OPT record rides
/// along. The id starts out random and is refreshed by the engine before
/// every retransmission.
pub(crate) fn build_request(question: &Question, settings: &ResolverSettings) -> Message {
    let mut request = Message {
        rd: settings.recursion,
        ..Message::default()
    };

    request.questions.push(question.clone());

    if settings.wants_edns() {
        request.add_extension(Extension {
            payload_size: settings.edns_buffer_size(),
            extend_rcode: 0,
            version: 0,
            dnssec_ok: settings.request_dnssec_records,
        });
    }

    request
}

/// Replaces the request id with a fresh one, guaranteed to differ from the
/// id currently on the message. Called between every two physical sends.
pub(crate) fn refresh_id(request: &mut Message) {
    loop {
        let id = Message::random_id();
        if id != request.id {
            request.id = id;
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Class, Type};

    fn question() -> Question {
        Question {
            name: "example.com.".to_string(),
            r#type: Type::A,
            class: Class::Internet,
        }
    }

    #[test]
    fn request_mirrors_recursion() {
        let mut settings = ResolverSettings::default();
        assert!(build_request(&question(), &settings).rd);

        settings.recursion = false;
        assert!(!build_request(&question(), &settings).rd);
    }

    #[test]
    fn edns_included_for_large_buffer() {
        let settings = ResolverSettings::default(); // buffer 4096
        let request = build_request(&question(), &settings);

        let ext = request.extension.expect("EDNS expected");
        assert_eq!(ext.payload_size, 4096);
        assert_eq!(ext.version, 0);
        assert!(!ext.dnssec_ok);
    }

    #[test]
    fn edns_omitted_for_plain_512() {
        let settings = ResolverSettings {
            extended_dns_buffer_size: 512,
            ..Default::default()
        };

        assert_eq!(build_request(&question(), &settings).extension, None);
    }

    #[test]
    fn dnssec_forces_edns_and_do_flag() {
        let settings = ResolverSettings {
            extended_dns_buffer_size: 512,
            request_dnssec_records: true,
            ..Default::default()
        };

        let ext = build_request(&question(), &settings)
            .extension
            .expect("EDNS expected");
        assert!(ext.dnssec_ok);
        assert_eq!(ext.payload_size, 512);
    }

    #[test]
    fn buffer_size_clamped() {
        let settings = ResolverSettings {
            extended_dns_buffer_size: u16::MAX,
            ..Default::default()
        };

        let ext = build_request(&question(), &settings).extension.unwrap();
        assert_eq!(ext.payload_size, 4096);
    }

    #[test]
    fn refresh_never_repeats_the_current_id() {
        let mut request = build_request(&question(), &ResolverSettings::default());

        let mut previous = request.id;
        for _ in 0..100 {
            refresh_id(&mut request);
            assert_ne!(request.id, previous);
            previous = request.id;
        }
    }

    #[test]
    fn request_encodes_single_question() {
        let request = build_request(&question(), &ResolverSettings::default());
        let wire = request.to_vec().unwrap();

        // qdcount 1, ancount/nscount 0, arcount 1 (OPT).
        assert_eq!(&wire[4..12], &[0, 1, 0, 0, 0, 0, 0, 1]);
    }
}
