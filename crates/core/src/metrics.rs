//! Counters and reporting for save transfers.
//!
//! Tracks what the orchestrator did over its lifetime:
//! - Saves encoded and bytes written to the artifact root
//! - Loads issued, completed and timed out
//! - Artifacts removed and removals that failed
//! - Actor lookups and how many found a pawn
//!
//! # Thread Safety
//!
//! `TransferMetrics` is plain data owned by one orchestrator, whose transfer
//! methods take `&mut self`. Share a snapshot with `Clone` when reporting
//! from elsewhere.

use std::time::{Duration, Instant};

/// Lifetime counters for one orchestrator.
#[derive(Debug, Clone)]
pub struct TransferMetrics {
    /// When counting started
    pub start_time: Instant,

    // === Encoding ===
    /// Saves encoded into artifacts
    pub saves_encoded: u64,

    /// Total encoded bytes written to the artifact root
    pub bytes_written: u64,

    /// Bricks across all encoded saves
    pub bricks_encoded: u64,

    // === Loads ===
    /// `Bricks.Load` commands issued
    pub loads_issued: u64,

    /// Loads whose completion line was observed
    pub loads_completed: u64,

    /// Loads that hit the deadline
    pub loads_timed_out: u64,

    /// Loads that failed for any other reason
    pub loads_failed: u64,

    /// Bricks the server reported reading
    pub bricks_read: u64,

    /// Sum of completed load latencies
    pub load_time: Duration,

    // === Artifacts ===
    /// Artifacts baked for repeated placement
    pub artifacts_baked: u64,

    /// Artifacts deleted after use
    pub artifacts_removed: u64,

    /// Deletions that failed and were only logged
    pub cleanup_failures: u64,

    // === Lookups ===
    /// Actor lookups issued
    pub lookups_issued: u64,

    /// Lookups that found a pawn
    pub lookups_found: u64,
}

impl TransferMetrics {
    /// Create zeroed metrics with start time set to now.
    pub fn new() -> Self {
        Self {
            start_time: Instant::now(),
            saves_encoded: 0,
            bytes_written: 0,
            bricks_encoded: 0,
            loads_issued: 0,
            loads_completed: 0,
            loads_timed_out: 0,
            loads_failed: 0,
            bricks_read: 0,
            load_time: Duration::ZERO,
            artifacts_baked: 0,
            artifacts_removed: 0,
            cleanup_failures: 0,
            lookups_issued: 0,
            lookups_found: 0,
        }
    }

    /// Time since the metrics were created.
    pub fn uptime(&self) -> Duration {
        self.start_time.elapsed()
    }

    /// Fraction of issued loads that completed.
    ///
    /// Returns 0.0 if no load was issued.
    pub fn completion_rate(&self) -> f64 {
        if self.loads_issued == 0 {
            0.0
        } else {
            self.loads_completed as f64 / self.loads_issued as f64
        }
    }

    /// Fraction of issued loads that timed out.
    pub fn timeout_rate(&self) -> f64 {
        if self.loads_issued == 0 {
            0.0
        } else {
            self.loads_timed_out as f64 / self.loads_issued as f64
        }
    }

    /// Mean latency of completed loads.
    pub fn mean_load_time(&self) -> Duration {
        match u32::try_from(self.loads_completed) {
            Ok(0) | Err(_) => Duration::ZERO,
            Ok(n) => self.load_time / n,
        }
    }

    /// Print a human-readable summary to stdout.
    pub fn print_summary(&self) {
        println!("\n=== Transfer Summary ===");
        println!("Uptime: {} ms", self.uptime().as_millis());
        println!();

        println!("=== Encoding ===");
        println!("Saves encoded: {}", self.saves_encoded);
        println!("Bricks encoded: {}", self.bricks_encoded);
        println!("Bytes written: {} ({:.2} KiB)", self.bytes_written, self.bytes_written as f64 / 1024.0);
        println!();

        println!("=== Loads ===");
        println!("Issued: {}", self.loads_issued);
        println!("Completed: {} ({:.1}%)", self.loads_completed, self.completion_rate() * 100.0);
        println!("Timed out: {} ({:.1}%)", self.loads_timed_out, self.timeout_rate() * 100.0);
        println!("Failed: {}", self.loads_failed);
        println!("Bricks read: {}", self.bricks_read);
        println!("Mean load time: {} ms", self.mean_load_time().as_millis());
        println!();

        println!("=== Artifacts ===");
        println!("Baked: {}", self.artifacts_baked);
        println!("Removed: {}", self.artifacts_removed);
        println!("Cleanup failures: {}", self.cleanup_failures);

        if self.lookups_issued > 0 {
            println!();
            println!("=== Lookups ===");
            println!("Issued: {}", self.lookups_issued);
            println!("Found: {}", self.lookups_found);
        }
        println!();
    }

    /// Export metrics as `key=value` lines.
    pub fn export_text(&self) -> String {
        format!(
            "saves_encoded={}\n\
             bytes_written={}\n\
             loads_issued={}\n\
             loads_completed={}\n\
             loads_timed_out={}\n\
             loads_failed={}\n\
             completion_rate={:.4}\n\
             bricks_read={}\n\
             artifacts_baked={}\n\
             artifacts_removed={}\n\
             cleanup_failures={}\n\
             lookups_issued={}\n\
             lookups_found={}\n",
            self.saves_encoded,
            self.bytes_written,
            self.loads_issued,
            self.loads_completed,
            self.loads_timed_out,
            self.loads_failed,
            self.completion_rate(),
            self.bricks_read,
            self.artifacts_baked,
            self.artifacts_removed,
            self.cleanup_failures,
            self.lookups_issued,
            self.lookups_found,
        )
    }
}

impl Default for TransferMetrics {
    fn default() -> Self {
        Self::new()
    }
}
