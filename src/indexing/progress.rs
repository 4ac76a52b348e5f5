//! Indexing statistics for operational visibility

use crate::{Generation, IndexValidity};
use parking_lot::Mutex;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};

/// Running counters updated by the write pipeline
#[derive(Debug, Default)]
pub struct IndexCounters {
    jobs_submitted: AtomicU64,
    records_indexed: AtomicU64,
    records_skipped: AtomicU64,
    records_failed: AtomicU64,
    failed_commits: AtomicU64,
    field_counts: Mutex<BTreeMap<&'static str, u64>>,
}

impl IndexCounters {
    pub fn job_submitted(&self) {
        self.jobs_submitted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_indexed(&self) {
        self.records_indexed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.records_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failed(&self) {
        self.records_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn commit_failed(&self) {
        self.failed_commits.fetch_add(1, Ordering::Relaxed);
    }

    /// Count one value per field name written into a document
    pub fn fields_written(&self, fields: &[&'static str]) {
        let mut counts = self.field_counts.lock();
        for field in fields {
            *counts.entry(*field).or_default() += 1;
        }
    }

    pub fn jobs_submitted(&self) -> u64 {
        self.jobs_submitted.load(Ordering::Relaxed)
    }

    /// Fill the counter half of an [`IndexStats`]
    pub fn apply_to(&self, stats: &mut IndexStats) {
        stats.jobs_submitted = self.jobs_submitted.load(Ordering::Relaxed);
        stats.records_indexed = self.records_indexed.load(Ordering::Relaxed);
        stats.records_skipped = self.records_skipped.load(Ordering::Relaxed);
        stats.records_failed = self.records_failed.load(Ordering::Relaxed);
        stats.failed_commits = self.failed_commits.load(Ordering::Relaxed);
        stats.field_counts = self
            .field_counts
            .lock()
            .iter()
            .map(|(name, count)| (name.to_string(), *count))
            .collect();
    }
}

/// Snapshot of index state and pipeline activity
#[derive(Debug, Clone, Serialize)]
pub struct IndexStats {
    pub validity: IndexValidity,
    pub reindex_required: bool,
    /// Documents visible to readers (includes superseded versions)
    pub documents: u64,
    pub visible_generation: Generation,
    pub jobs_submitted: u64,
    pub records_indexed: u64,
    pub records_skipped: u64,
    pub records_failed: u64,
    /// Batches in which at least one record failed
    pub failed_commits: u64,
    pub field_counts: BTreeMap<String, u64>,
}

impl IndexStats {
    pub fn new(validity: IndexValidity) -> Self {
        Self {
            validity,
            reindex_required: false,
            documents: 0,
            visible_generation: 0,
            jobs_submitted: 0,
            records_indexed: 0,
            records_skipped: 0,
            records_failed: 0,
            failed_commits: 0,
            field_counts: BTreeMap::new(),
        }
    }

    /// Display the statistics in a human-readable format
    pub fn display(&self) {
        println!("Index Statistics:");
        println!("  Validity: {}", self.validity);
        if self.reindex_required {
            println!("  Reindex required: yes");
        }
        println!("  Documents: {}", self.documents);
        println!("  Visible generation: {}", self.visible_generation);
        println!("  Jobs submitted: {}", self.jobs_submitted);
        println!("  Records indexed: {}", self.records_indexed);
        println!("  Records skipped: {}", self.records_skipped);
        println!("  Records failed: {}", self.records_failed);
        if self.failed_commits > 0 {
            println!("  Batches with failures: {}", self.failed_commits);
        }

        if !self.field_counts.is_empty() {
            println!("\nField values written:");
            for (name, count) in &self.field_counts {
                println!("  {name}: {count}");
            }
        }
    }
}
