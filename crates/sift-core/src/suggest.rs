//! Popular-query log backing `GET /suggest`. Process-wide, TTL-bounded,
//! capped in size; entries are advisory and lost on restart.

use dashmap::DashMap;
use std::time::{Duration, Instant};

const DEFAULT_TTL: Duration = Duration::from_secs(7 * 24 * 3600);
const DEFAULT_CAPACITY: usize = 5_000;

struct QueryStat {
    display: String,
    count: u64,
    last_seen: Instant,
}

pub struct QueryLog {
    entries: DashMap<String, QueryStat>,
    ttl: Duration,
    capacity: usize,
}

impl Default for QueryLog {
    fn default() -> Self {
        Self::new(DEFAULT_TTL, DEFAULT_CAPACITY)
    }
}

impl QueryLog {
    pub fn new(ttl: Duration, capacity: usize) -> Self {
        Self {
            entries: DashMap::new(),
            ttl,
            capacity: capacity.max(1),
        }
    }

    fn normalize(query: &str) -> String {
        query
            .to_lowercase()
            .split_whitespace()
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Record a served query. Called on every successful search.
    pub fn record(&self, query: &str) {
        let key = Self::normalize(query);
        if key.is_empty() {
            return;
        }
        match self.entries.get_mut(&key) {
            Some(mut stat) => {
                stat.count += 1;
                stat.last_seen = Instant::now();
            }
            None => {
                if self.entries.len() >= self.capacity {
                    self.evict_one();
                }
                self.entries.insert(
                    key,
                    QueryStat {
                        display: query.trim().to_string(),
                        count: 1,
                        last_seen: Instant::now(),
                    },
                );
            }
        }
    }

    /// Completions for a prefix, most popular first, expired entries
    /// skipped. Falls back to substring matches when prefix matches are
    /// scarce.
    pub fn suggest(&self, prefix: &str, limit: usize) -> Vec<String> {
        let needle = Self::normalize(prefix);
        if needle.is_empty() {
            return Vec::new();
        }
        let now = Instant::now();
        let mut prefix_matches: Vec<(u64, String)> = Vec::new();
        let mut substring_matches: Vec<(u64, String)> = Vec::new();

        for entry in self.entries.iter() {
            if now.duration_since(entry.last_seen) > self.ttl {
                continue;
            }
            if entry.key() == &needle {
                continue;
            }
            if entry.key().starts_with(&needle) {
                prefix_matches.push((entry.count, entry.display.clone()));
            } else if entry.key().contains(&needle) {
                substring_matches.push((entry.count, entry.display.clone()));
            }
        }

        let sort = |matches: &mut Vec<(u64, String)>| {
            matches.sort_unstable_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
        };
        sort(&mut prefix_matches);
        sort(&mut substring_matches);

        let mut suggestions: Vec<String> = prefix_matches.into_iter().map(|(_, q)| q).collect();
        suggestions.extend(substring_matches.into_iter().map(|(_, q)| q));
        suggestions.truncate(limit);
        suggestions
    }

    /// Drop the least-recently-seen entry to make room.
    fn evict_one(&self) {
        let oldest = self
            .entries
            .iter()
            .min_by_key(|e| e.last_seen)
            .map(|e| e.key().clone());
        if let Some(key) = oldest {
            self.entries.remove(&key);
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn popular_queries_rank_first() {
        let log = QueryLog::default();
        log.record("coating services");
        log.record("coating services");
        log.record("coating materials");
        let suggestions = log.suggest("coating", 5);
        assert_eq!(suggestions[0], "coating services");
        assert_eq!(suggestions[1], "coating materials");
    }

    #[test]
    fn exact_query_is_not_its_own_suggestion() {
        let log = QueryLog::default();
        log.record("coatings");
        assert!(log.suggest("coatings", 5).is_empty());
    }

    #[test]
    fn substring_matches_fall_behind_prefix_matches() {
        let log = QueryLog::default();
        log.record("industrial coatings");
        log.record("coatings overview");
        let suggestions = log.suggest("coatings", 5);
        assert_eq!(suggestions[0], "coatings overview");
        assert_eq!(suggestions[1], "industrial coatings");
    }

    #[test]
    fn capacity_is_enforced() {
        let log = QueryLog::new(Duration::from_secs(3600), 2);
        log.record("first query");
        log.record("second query");
        log.record("third query");
        assert_eq!(log.len(), 2);
    }
}
