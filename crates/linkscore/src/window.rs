//! # Sample Window
//!
//! Short FIFO of [`DerivedSample`]s for one access point. Everything in the
//! window shares an identity, is in chronological order and was polled at
//! most `max_gap_ms` apart; a sample that would break any of that clears the
//! window first.

use std::collections::VecDeque;

use crate::derived::DerivedSample;
use crate::sample::TelemetrySample;

/// Fewest samples the classifier runs on.
pub const MIN_WINDOW: usize = 1;
/// Window capacity.
pub const MAX_WINDOW: usize = 5;

/// How a new sample relates to the window's most recent entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Continuity {
    /// Same identity, in order, within the gap limit (or window empty).
    Continuous,
    /// Different access point or frequency.
    IdentityChanged,
    /// Gap too large, or time went backwards.
    Stale,
}

#[derive(Debug, Clone)]
pub struct SampleWindow {
    entries: VecDeque<DerivedSample>,
    max_gap_ms: u64,
}

impl SampleWindow {
    pub fn new(max_gap_ms: u64) -> Self {
        SampleWindow {
            entries: VecDeque::with_capacity(MAX_WINDOW),
            max_gap_ms,
        }
    }

    pub fn max_gap_ms(&self) -> u64 {
        self.max_gap_ms
    }

    /// Classify `sample` against the last entry.
    pub fn continuity(&self, sample: &TelemetrySample) -> Continuity {
        let Some(last) = self.entries.back() else {
            return Continuity::Continuous;
        };
        if last.sample().identity != sample.identity {
            return Continuity::IdentityChanged;
        }
        match sample.gap_since(last.sample()) {
            Some(gap) if gap <= self.max_gap_ms => Continuity::Continuous,
            _ => Continuity::Stale,
        }
    }

    /// Append, evicting the oldest entry beyond [`MAX_WINDOW`].
    pub fn push(&mut self, entry: DerivedSample) {
        self.entries.push_back(entry);
        while self.entries.len() > MAX_WINDOW {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn last(&self) -> Option<&DerivedSample> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Whether there are enough samples to classify.
    pub fn is_ready(&self) -> bool {
        self.entries.len() >= MIN_WINDOW
    }

    /// Oldest first.
    pub fn iter(&self) -> impl ExactSizeIterator<Item = &DerivedSample> {
        self.entries.iter()
    }
}
