// Copyright (c) 2025 Dimitris Kafetzis
//
// Licensed under the MIT License.
// See LICENSE file in the project root for full license information.
//
// SPDX-License-Identifier: MIT

//! Counters kept by a [`MemoryPool`](crate::MemoryPool).
//!
//! Tests use them as a leak check: once every holder is gone,
//! [`AllocationStats::live`] must be zero and `invalid_releases` must not
//! have moved.

#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize)]
pub struct AllocationStats {
    /// Regions handed out.
    pub allocations: u64,
    /// How many of those reused storage from the free list.
    pub reused: u64,
    /// Requests refused because they would exceed the budget.
    pub refused: u64,
    /// Regions returned through a valid release.
    pub releases: u64,
    /// Release calls naming a region that was not live.
    pub invalid_releases: u64,
    /// Highest number of live bytes observed.
    pub peak_bytes: usize,
    /// Sum of all region lengths ever handed out.
    pub bytes_served: u64,
}

impl AllocationStats {
    /// Regions allocated and not yet released.
    pub fn live(&self) -> u64 {
        self.allocations.saturating_sub(self.releases)
    }

    /// Share of allocations served from the free list, in `[0.0, 1.0]`.
    pub fn reuse_ratio(&self) -> f64 {
        match self.allocations {
            0 => 0.0,
            n => self.reused as f64 / n as f64,
        }
    }

    pub(crate) fn record_allocation(&mut self, len: usize, reused: bool) {
        self.allocations += 1;
        self.bytes_served += len as u64;
        if reused {
            self.reused += 1;
        }
    }

    pub(crate) fn record_refusal(&mut self) {
        self.refused += 1;
    }

    pub(crate) fn record_release(&mut self) {
        self.releases += 1;
    }

    pub(crate) fn record_invalid_release(&mut self) {
        self.invalid_releases += 1;
    }

    pub(crate) fn observe_usage(&mut self, live_bytes: usize) {
        self.peak_bytes = self.peak_bytes.max(live_bytes);
    }

    /// One-line form for logs and the CLI.
    pub fn summary(&self) -> String {
        format!(
            "{} live of {} allocated ({} reused, {:.0}%; {} refused), {} released, {} invalid, peak {} KiB",
            self.live(),
            self.allocations,
            self.reused,
            self.reuse_ratio() * 100.0,
            self.refused,
            self.releases,
            self.invalid_releases,
            self.peak_bytes / 1024,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_and_reuse() {
        let mut stats = AllocationStats::default();
        assert_eq!(stats.reuse_ratio(), 0.0);
        stats.record_allocation(64, false);
        stats.record_allocation(64, true);
        stats.record_release();
        assert_eq!(stats.live(), 1);
        assert_eq!(stats.bytes_served, 128);
        assert!((stats.reuse_ratio() - 0.5).abs() < f64::EPSILON);
    }

    #[test]
    fn test_peak_only_grows() {
        let mut stats = AllocationStats::default();
        stats.observe_usage(4096);
        stats.observe_usage(1024);
        assert_eq!(stats.peak_bytes, 4096);
    }

    #[test]
    fn test_summary_mentions_invalid_releases() {
        let mut stats = AllocationStats::default();
        stats.record_allocation(2048, false);
        stats.record_invalid_release();
        let text = stats.summary();
        assert!(text.starts_with("1 live of 1 allocated (0 reused, 0%;"));
        assert!(text.contains("1 invalid"));
    }
}
