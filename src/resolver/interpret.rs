//! Deciding what a parsed response means for the query in progress.

use crate::resolver::roster::NameServer;
use crate::types::{Message, Question, Rcode, Type};

/// What a response amounts to. The engine consumes this to pick a branch;
/// no control flow is carried by errors inside the retry loop.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Disposition {
    /// A usable response; hand it to the caller (and the cache).
    Answered,

    /// No error, but the question was not answered. Only produced when
    /// `continue_on_empty_response` is set.
    Unanswered,

    /// TC bit set; the driver escalates to TCP.
    Truncated,

    /// The server reported an error code.
    Failed(Rcode),
}

/// Classifies `response` relative to the question that produced it.
pub(crate) fn classify(
    question: &Question,
    response: &Message,
    check_unanswered: bool,
) -> Disposition {
    if response.tc {
        return Disposition::Truncated;
    }

    if response.rcode != Rcode::NoError {
        return Disposition::Failed(response.rcode);
    }

    if check_unanswered && !question_answered(question, response) {
        return Disposition::Unanswered;
    }

    Disposition::Answered
}

/// Whether `response` actually answers `question`.
///
/// A CNAME counts as an answer for address queries, and a delegation in
/// the authority section counts for NS queries. Set queries (ANY, AXFR)
/// are taken at face value.
fn question_answered(question: &Question, response: &Message) -> bool {
    if response.answers.is_empty() {
        return false;
    }

    if question.r#type.is_set_query() {
        return true;
    }

    let answer_types = || response.answers.iter().map(|r| r.r#type());

    match question.r#type {
        Type::A | Type::AAAA if answer_types().any(|t| t == Type::CNAME) => true,
        Type::NS if !response.authorities.is_empty() => true,
        wanted => answer_types().any(|t| t == wanted),
    }
}

/// Remembers the UDP payload size a server advertised in its OPT record.
pub(crate) fn apply_edns_hint(response: &Message, server: &NameServer) {
    if let Some(ext) = &response.extension {
        server.note_payload_size(ext.payload_size);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;
    use crate::types::{Class, Record};
    use std::time::Duration;

    fn question(r#type: Type) -> Question {
        Question {
            name: "example.com.".to_string(),
            r#type,
            class: Class::Internet,
        }
    }

    fn record(resource: Resource) -> Record {
        Record {
            name: "example.com.".to_string(),
            class: Class::Internet,
            ttl: Duration::from_secs(60),
            resource,
        }
    }

    fn response_with(answers: Vec<Record>) -> Message {
        let mut m = Message::default();
        m.answers = answers;
        m
    }

    #[test]
    fn truncation_beats_everything() {
        let mut m = Message::default();
        m.tc = true;
        m.rcode = Rcode::ServFail;

        assert_eq!(
            classify(&question(Type::A), &m, true),
            Disposition::Truncated
        );
    }

    #[test]
    fn error_rcode_fails() {
        let mut m = Message::default();
        m.rcode = Rcode::NXDomain;

        assert_eq!(
            classify(&question(Type::A), &m, true),
            Disposition::Failed(Rcode::NXDomain)
        );
    }

    #[test]
    fn empty_answers_unanswered() {
        let m = response_with(vec![]);

        assert_eq!(
            classify(&question(Type::A), &m, true),
            Disposition::Unanswered
        );

        // The heuristic is off when the caller will not rotate anyway.
        assert_eq!(
            classify(&question(Type::A), &m, false),
            Disposition::Answered
        );
    }

    #[test]
    fn cname_answers_address_query() {
        let m = response_with(vec![record(Resource::CNAME("a.example.com.".to_string()))]);

        assert_eq!(
            classify(&question(Type::A), &m, true),
            Disposition::Answered
        );
        assert_eq!(
            classify(&question(Type::AAAA), &m, true),
            Disposition::Answered
        );

        // But a CNAME does not answer an MX query.
        assert_eq!(
            classify(&question(Type::MX), &m, true),
            Disposition::Unanswered
        );
    }

    #[test]
    fn set_queries_taken_at_face_value() {
        let m = response_with(vec![record(Resource::NS("ns.example.com.".to_string()))]);

        assert_eq!(
            classify(&question(Type::ANY), &m, true),
            Disposition::Answered
        );
        assert_eq!(
            classify(&question(Type::AXFR), &m, true),
            Disposition::Answered
        );
    }

    #[test]
    fn ns_query_with_authorities() {
        let mut m = response_with(vec![record(Resource::A("127.0.0.1".parse().unwrap()))]);
        m.authorities
            .push(record(Resource::NS("ns.example.com.".to_string())));

        assert_eq!(
            classify(&question(Type::NS), &m, true),
            Disposition::Answered
        );
    }

    #[test]
    fn matching_type_answers() {
        let m = response_with(vec![record(Resource::A("127.0.0.1".parse().unwrap()))]);

        assert_eq!(
            classify(&question(Type::A), &m, true),
            Disposition::Answered
        );
        assert_eq!(
            classify(&question(Type::TXT), &m, true),
            Disposition::Unanswered
        );
    }

    #[test]
    fn edns_hint_recorded() {
        let server: NameServer = "8.8.8.8".parse().unwrap();
        let mut m = Message::default();

        apply_edns_hint(&m, &server);
        assert_eq!(server.advertised_payload_size(), None);

        m.extension = Some(crate::types::Extension {
            payload_size: 1232,
            ..Default::default()
        });
        apply_edns_hint(&m, &server);
        assert_eq!(server.advertised_payload_size(), Some(1232));
    }
}
