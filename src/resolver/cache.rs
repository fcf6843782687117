//! TTL-bounded cache of responses, keyed by question fingerprint.

use crate::resolver::options::ResolverSettings;
use crate::types::{Message, Question, Record};
use dashmap::DashMap;
use std::time::{Duration, Instant};

/// Canonical fingerprint for a question: `lowercase(name):type:class`.
pub fn cache_key(question: &Question) -> String {
    format!(
        "{}:{}:{}",
        question.name.to_lowercase(),
        question.r#type,
        question.class
    )
}

#[derive(Clone, Debug)]
struct CacheEntry {
    response: Message,
    expires_at: Instant,
    negative: bool,
}

impl CacheEntry {
    fn is_valid(&self, now: Instant) -> bool {
        now < self.expires_at
    }
}

/// Maps question fingerprints to their last successful (or negative)
/// response until the response's TTL runs out.
///
/// Shared by every query on the same resolver. Writers serialize per key
/// only; there is no global lock on the lookup path. Entries are immutable
/// once inserted, replacement is insert-over.
#[derive(Default)]
pub struct ResponseCache {
    entries: DashMap<String, CacheEntry>,
}

impl ResponseCache {
    pub fn new() -> ResponseCache {
        ResponseCache::default()
    }

    /// Returns a valid entry's response, or nothing. An expired entry is
    /// removed on observation and reports a miss.
    pub fn get(&self, key: &str) -> Option<Message> {
        let now = Instant::now();

        if let Some(entry) = self.entries.get(key) {
            if entry.is_valid(now) {
                return Some(entry.response.clone());
            }
        }

        // Reap the expired entry, unless a writer already replaced it.
        self.entries.remove_if(key, |_, entry| !entry.is_valid(now));
        None
    }

    /// Inserts `response` with a lifetime derived from its records.
    ///
    /// The lifetime is the smallest TTL across all record sections, or
    /// `failed_results_cache_duration` for a negative entry, clamped to the
    /// configured bounds. A zero-TTL positive response is not cached at
    /// all.
    pub fn put(
        &self,
        key: &str,
        response: &Message,
        negative: bool,
        settings: &ResolverSettings,
    ) {
        let mut ttl = if negative {
            settings.failed_results_cache_duration
        } else {
            min_record_ttl(response)
        };

        if ttl == Duration::ZERO && !negative {
            // Only usable for the transaction in progress; nothing to keep.
            return;
        }

        if let Some(min) = settings.effective_minimum_ttl() {
            ttl = ttl.max(min);
        }
        if let Some(max) = settings.effective_maximum_ttl() {
            ttl = ttl.min(max);
        }

        let entry = CacheEntry {
            response: response.clone(),
            expires_at: Instant::now() + ttl,
            negative,
        };

        self.entries.insert(key.to_string(), entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drops every entry.
    pub fn clear(&self) {
        self.entries.clear()
    }

    /// How much longer the entry under `key` is valid for, if present.
    pub fn time_to_live(&self, key: &str) -> Option<Duration> {
        let entry = self.entries.get(key)?;
        entry.expires_at.checked_duration_since(Instant::now())
    }

    /// Whether the entry under `key` is a negative one.
    pub fn is_negative(&self, key: &str) -> Option<bool> {
        self.entries.get(key).map(|e| e.negative)
    }
}

/// The smallest TTL over every record in the message, or zero when there
/// are none. The OPT pseudo-record never participates.
fn min_record_ttl(response: &Message) -> Duration {
    record_sections(response)
        .map(|r| r.ttl)
        .min()
        .unwrap_or(Duration::ZERO)
}

fn record_sections(response: &Message) -> impl Iterator<Item = &Record> {
    response
        .answers
        .iter()
        .chain(response.authorities.iter())
        .chain(response.additionals.iter())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::Resource;
    use crate::types::{Class, Type};
    use std::thread::sleep;

    fn answer(ttl: Duration) -> Message {
        let mut m = Message::default();
        m.answers.push(Record {
            name: "example.com.".to_string(),
            class: Class::Internet,
            ttl,
            resource: Resource::A("93.184.216.34".parse().unwrap()),
        });
        m
    }

    fn question() -> Question {
        Question {
            name: "example.com.".to_string(),
            r#type: Type::A,
            class: Class::Internet,
        }
    }

    #[test]
    fn key_is_case_insensitive() {
        let mut q = question();
        q.name = "EXAMPLE.Com.".to_string();

        assert_eq!(cache_key(&q), "example.com.:A:IN");
        assert_eq!(cache_key(&q), cache_key(&question()));
    }

    #[test]
    fn key_depends_on_type_and_class() {
        let mut q = question();
        q.r#type = Type::AAAA;
        assert_ne!(cache_key(&q), cache_key(&question()));

        let mut q = question();
        q.class = Class::Chaos;
        assert_ne!(cache_key(&q), cache_key(&question()));
    }

    #[test]
    fn get_returns_inserted_response() {
        let cache = ResponseCache::new();
        let settings = ResolverSettings::default();
        let response = answer(Duration::from_secs(60));

        cache.put("k", &response, false, &settings);

        let hit = cache.get("k").expect("expected a cache hit");
        assert_eq!(hit.answers, response.answers);

        let ttl = cache.time_to_live("k").unwrap();
        assert!(ttl <= Duration::from_secs(60));
        assert!(ttl > Duration::from_secs(59));
    }

    #[test]
    fn zero_ttl_not_cached() {
        let cache = ResponseCache::new();
        cache.put(
            "k",
            &answer(Duration::ZERO),
            false,
            &ResolverSettings::default(),
        );

        assert!(cache.is_empty());
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn empty_response_not_cached() {
        let cache = ResponseCache::new();
        cache.put("k", &Message::default(), false, &ResolverSettings::default());
        assert!(cache.is_empty());
    }

    #[test]
    fn negative_entry_uses_configured_duration() {
        let cache = ResponseCache::new();
        let settings = ResolverSettings {
            failed_results_cache_duration: Duration::from_millis(40),
            ..Default::default()
        };

        // A zero-TTL (recordless) error response still gets cached when
        // negative.
        cache.put("k", &Message::default(), true, &settings);

        assert_eq!(cache.is_negative("k"), Some(true));
        assert!(cache.get("k").is_some());

        sleep(Duration::from_millis(60));
        assert_eq!(cache.get("k"), None);
        assert!(cache.is_empty(), "expired entry is reaped on observation");
    }

    #[test]
    fn expired_entry_is_a_miss() {
        let cache = ResponseCache::new();
        cache.put(
            "k",
            &answer(Duration::from_millis(30)),
            false,
            &ResolverSettings::default(),
        );

        assert!(cache.get("k").is_some());
        sleep(Duration::from_millis(50));
        assert_eq!(cache.get("k"), None);
    }

    #[test]
    fn ttl_clamped_to_bounds() {
        let cache = ResponseCache::new();
        let settings = ResolverSettings {
            minimum_cache_ttl: Some(Duration::from_secs(120)),
            ..Default::default()
        };

        cache.put("k", &answer(Duration::from_secs(1)), false, &settings);
        assert!(cache.time_to_live("k").unwrap() > Duration::from_secs(100));

        let settings = ResolverSettings {
            maximum_cache_ttl: Some(Duration::from_secs(10)),
            ..Default::default()
        };

        cache.put("k", &answer(Duration::from_secs(3600)), false, &settings);
        assert!(cache.time_to_live("k").unwrap() <= Duration::from_secs(10));
    }

    #[test]
    fn min_ttl_across_sections() {
        let mut m = answer(Duration::from_secs(300));
        m.authorities.push(Record {
            name: "example.com.".to_string(),
            class: Class::Internet,
            ttl: Duration::from_secs(30),
            resource: Resource::NS("ns1.example.com.".to_string()),
        });

        assert_eq!(min_record_ttl(&m), Duration::from_secs(30));
    }

    #[test]
    fn later_put_replaces_earlier() {
        let cache = ResponseCache::new();
        let settings = ResolverSettings::default();

        cache.put("k", &answer(Duration::from_secs(300)), false, &settings);
        cache.put("k", &answer(Duration::from_secs(5)), false, &settings);

        assert_eq!(cache.len(), 1);
        assert!(cache.time_to_live("k").unwrap() <= Duration::from_secs(5));
    }
}
