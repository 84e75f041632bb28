//! Event enrichment
//!
//! Stamps every accepted trade with a server identity and timestamp,
//! discarding whatever the client sent in those fields.

use chrono::{DateTime, SecondsFormat, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use tradecast_core::TradeAction;

/// Clock-derived trade id source
///
/// Ids are nanoseconds since the Unix epoch, bumped past the last issued id
/// when the clock has not advanced, so they stay unique within the process.
#[derive(Debug, Default)]
pub struct TradeIdGenerator {
    last: AtomicU64,
}

impl TradeIdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Next id for a trade observed at `now`
    pub fn next_id(&self, now: DateTime<Utc>) -> u64 {
        let now_nanos = now.timestamp_nanos_opt().unwrap_or_default().max(0) as u64;

        // fetch_update hands back the value it replaced, so recompute the winner.
        let previous = self
            .last
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |last| {
                Some(now_nanos.max(last + 1))
            })
            .unwrap_or_else(|last| last);
        now_nanos.max(previous + 1)
    }
}

/// Assigns server-side identity to inbound trades
#[derive(Debug, Default)]
pub struct Enricher {
    ids: TradeIdGenerator,
}

impl Enricher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enrich using the current wall clock
    pub fn enrich(&self, raw: &TradeAction) -> TradeAction {
        self.enrich_at(raw, Utc::now())
    }

    pub fn enrich_at(&self, raw: &TradeAction, now: DateTime<Utc>) -> TradeAction {
        let id = self.ids.next_id(now);
        raw.with_identity(
            id.to_string(),
            now.to_rfc3339_opts(SecondsFormat::Secs, true),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::collections::HashSet;
    use std::sync::Arc;

    fn raw_trade() -> TradeAction {
        TradeAction {
            id: "client-id".to_string(),
            timestamp: "client-ts".to_string(),
            price: 1.5,
            volume: 10,
            trader: "x".to_string(),
            action: "buy".to_string(),
        }
    }

    #[test]
    fn test_enrich_overwrites_identity_only() {
        let enricher = Enricher::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        let enriched = enricher.enrich_at(&raw_trade(), now);

        assert_eq!(enriched.timestamp, "2024-03-01T12:30:00Z");
        assert_eq!(enriched.id, now.timestamp_nanos_opt().unwrap().to_string());
        assert_eq!(enriched.price, 1.5);
        assert_eq!(enriched.volume, 10);
        assert_eq!(enriched.trader, "x");
        assert_eq!(enriched.action, "buy");
    }

    #[test]
    fn test_ids_unique_when_clock_stalls() {
        let enricher = Enricher::new();
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();

        let ids: HashSet<_> = (0..1000)
            .map(|_| enricher.enrich_at(&raw_trade(), now).id)
            .collect();

        assert_eq!(ids.len(), 1000);
    }

    #[test]
    fn test_ids_monotonic_when_clock_steps_back() {
        let ids = TradeIdGenerator::new();
        let later = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap();
        let earlier = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();

        let first = ids.next_id(later);
        let second = ids.next_id(earlier);

        assert!(second > first);
    }

    #[test]
    fn test_ids_unique_across_threads() {
        let enricher = Arc::new(Enricher::new());

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let enricher = Arc::clone(&enricher);
                std::thread::spawn(move || {
                    (0..500)
                        .map(|_| enricher.enrich(&raw_trade()).id)
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut ids = HashSet::new();
        for handle in handles {
            for id in handle.join().unwrap() {
                assert!(ids.insert(id));
            }
        }
        assert_eq!(ids.len(), 4000);
    }
}
