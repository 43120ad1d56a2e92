//! Per-developer streaming statistics.
//!
//! Numeric fields carry streaming means (no history kept); categorical
//! fields use a fixed-capacity counted top-K so memory stays bounded no
//! matter how many distinct kinds a developer produces. Profiles are only
//! ever advanced, never silently reset.

use serde::{Deserialize, Serialize};

use crate::extract::CodeMetrics;

/// Fixed capacity of the top-K counters.
pub const TOP_K_CAPACITY: usize = 8;

/// One counted category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TopEntry {
    pub name: String,
    pub count: u64,
    /// Observation sequence number of the most recent occurrence.
    pub last_seen: u64,
}

/// Fixed-capacity counted top-K structure.
///
/// When full, a new category evicts the entry with the minimum count,
/// breaking ties toward the least recently seen. Reads order by count,
/// then by most recent occurrence.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TopK {
    entries: Vec<TopEntry>,
}

impl TopK {
    /// Count one occurrence of a category.
    pub fn observe(&mut self, name: &str, seq: u64) {
        if let Some(entry) = self.entries.iter_mut().find(|e| e.name == name) {
            entry.count += 1;
            entry.last_seen = seq;
            return;
        }
        if self.entries.len() < TOP_K_CAPACITY {
            self.entries.push(TopEntry {
                name: name.to_string(),
                count: 1,
                last_seen: seq,
            });
            return;
        }
        // Evict the weakest entry for the newcomer.
        if let Some(idx) = self
            .entries
            .iter()
            .enumerate()
            .min_by_key(|(_, e)| (e.count, e.last_seen))
            .map(|(i, _)| i)
        {
            self.entries[idx] = TopEntry {
                name: name.to_string(),
                count: 1,
                last_seen: seq,
            };
        }
    }

    /// Entries ordered by count, ties broken by most recent occurrence.
    pub fn ranked(&self) -> Vec<TopEntry> {
        let mut out = self.entries.clone();
        out.sort_by(|a, b| {
            (b.count, b.last_seen, &a.name).cmp(&(a.count, a.last_seen, &b.name))
        });
        out
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Persistent per-developer profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeveloperProfile {
    pub developer_id: String,
    /// Exactly the number of analyses performed for this id.
    pub analyses_count: u64,
    /// Streaming mean of quality scores.
    pub avg_quality: f64,
    /// Streaming mean of per-file doc ratios.
    pub doc_ratio_avg: f64,
    /// Streaming mean of per-file average argument counts.
    pub avg_args: f64,
    /// Streaming mean of per-file max cyclomatic complexity.
    pub avg_complexity: f64,
    /// Most frequent construct kinds observed.
    pub top_patterns: TopK,
    /// Most frequent finding kinds raised.
    pub top_issues: TopK,
    /// Epoch seconds of the latest analysis.
    pub last_updated: u64,
}

impl DeveloperProfile {
    pub fn new(developer_id: &str) -> Self {
        DeveloperProfile {
            developer_id: developer_id.to_string(),
            analyses_count: 0,
            avg_quality: 0.0,
            doc_ratio_avg: 0.0,
            avg_args: 0.0,
            avg_complexity: 0.0,
            top_patterns: TopK::default(),
            top_issues: TopK::default(),
            last_updated: 0,
        }
    }

    /// Fold one analysis into the profile.
    pub fn record_analysis(
        &mut self,
        quality_score: f64,
        metrics: &CodeMetrics,
        pattern_kinds: &[&str],
        issue_kinds: &[&str],
        now: u64,
    ) {
        self.analyses_count += 1;
        let n = self.analyses_count as f64;
        self.avg_quality += (quality_score - self.avg_quality) / n;
        self.doc_ratio_avg += (metrics.doc_ratio - self.doc_ratio_avg) / n;
        self.avg_args += (metrics.avg_args - self.avg_args) / n;
        self.avg_complexity += (metrics.cyclomatic_max as f64 - self.avg_complexity) / n;

        let seq = self.analyses_count;
        for kind in pattern_kinds {
            self.top_patterns.observe(kind, seq);
        }
        for kind in issue_kinds {
            self.top_issues.observe(kind, seq);
        }
        self.last_updated = now;
    }
}
