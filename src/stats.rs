use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;

use crate::domain::{DomainKey, SENTINEL};

/// Per-invocation tally of domain keys. Written by exactly one aggregator.
#[derive(Debug, Default)]
pub struct FrequencyTable {
    counts: HashMap<DomainKey, u64>,
    records: u64,
}

impl FrequencyTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn increment(&mut self, key: DomainKey) {
        *self.counts.entry(key).or_insert(0) += 1;
        self.records += 1;
    }

    pub fn get(&self, key: &str) -> u64 {
        self.counts.get(key).copied().unwrap_or(0)
    }

    /// Distinct keys, sentinel included.
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Total number of keys folded in.
    pub fn records(&self) -> u64 {
        self.records
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DomainCount {
    pub domain: String,
    pub count: u64,
}

impl DomainCount {
    pub fn new(domain: impl Into<String>, count: u64) -> Self {
        Self {
            domain: domain.into(),
            count,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Tally {
    /// Distinct domains in byte-wise ascending order.
    pub domains: Vec<DomainCount>,
    pub records: u64,
    /// Records whose transform produced the sentinel.
    pub malformed: u64,
}

impl Tally {
    pub fn as_pairs(&self) -> Vec<(&str, u64)> {
        self.domains
            .iter()
            .map(|entry| (entry.domain.as_str(), entry.count))
            .collect()
    }

    /// The `n` most frequent domains, ties broken by name.
    pub fn top(&self, n: usize) -> Vec<&DomainCount> {
        let mut ranked: Vec<&DomainCount> = self.domains.iter().collect();
        ranked.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.domain.cmp(&b.domain)));
        ranked.truncate(n);
        ranked
    }
}

/// Freezes the table into the ordered result, dropping the sentinel entry.
pub fn finalize(table: FrequencyTable) -> Tally {
    let FrequencyTable {
        mut counts,
        records,
    } = table;
    let malformed = counts.remove(SENTINEL).unwrap_or(0);

    let mut domains: Vec<DomainCount> = counts
        .into_iter()
        .map(|(domain, count)| DomainCount { domain, count })
        .collect();

    // Keys are unique, so an unstable sort is deterministic.
    domains.par_sort_unstable_by(|a, b| a.domain.as_bytes().cmp(b.domain.as_bytes()));

    Tally {
        domains,
        records,
        malformed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table_from(keys: &[&str]) -> FrequencyTable {
        let mut table = FrequencyTable::new();
        for key in keys {
            table.increment(key.to_string());
        }
        table
    }

    #[test]
    fn increment_creates_and_counts() {
        let table = table_from(&["zdnet.com", "yahoo.com", "zdnet.com"]);
        assert_eq!(table.get("zdnet.com"), 2);
        assert_eq!(table.get("yahoo.com"), 1);
        assert_eq!(table.get("about.com"), 0);
        assert_eq!(table.records(), 3);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn finalize_sorts_by_domain() {
        let mut keys = vec!["zdnet.com"; 5];
        keys.extend(vec!["about.com"; 13]);
        keys.extend(vec!["google.com"; 7]);

        let tally = finalize(table_from(&keys));
        assert_eq!(
            tally.as_pairs(),
            vec![("about.com", 13), ("google.com", 7), ("zdnet.com", 5)]
        );
    }

    #[test]
    fn finalize_drops_sentinel_and_reports_it() {
        let tally = finalize(table_from(&["", "a.com", "", ""]));
        assert_eq!(tally.as_pairs(), vec![("a.com", 1)]);
        assert_eq!(tally.malformed, 3);
        assert_eq!(tally.records, 4);
    }

    #[test]
    fn ordering_is_case_sensitive_bytewise() {
        let tally = finalize(table_from(&["b.com", "B.com", "a.com", "A.com"]));
        let names: Vec<&str> = tally.domains.iter().map(|d| d.domain.as_str()).collect();
        assert_eq!(names, vec!["A.com", "B.com", "a.com", "b.com"]);
    }

    #[test]
    fn empty_table_finalizes_to_empty_tally() {
        let tally = finalize(FrequencyTable::new());
        assert!(tally.domains.is_empty());
        assert_eq!(tally.malformed, 0);
    }

    #[test]
    fn top_ranks_by_count_then_name() {
        let tally = finalize(table_from(&["b.com", "a.com", "c.com", "c.com"]));
        let top: Vec<&str> = tally.top(2).iter().map(|d| d.domain.as_str()).collect();
        assert_eq!(top, vec!["c.com", "a.com"]);
        assert_eq!(tally.top(10).len(), 3);
    }
}
