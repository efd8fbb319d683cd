//! Prefetch queue
//!
//! Ordered buffer of candidates awaiting presentation. The head of the queue
//! is the card the user is looking at ("current"); everything behind it is
//! prefetched.
//!
//! Invariants:
//! - a candidate id appears at most once in the queue
//! - `current()` is always the head (or `None` when empty)
//! - appending never changes the head of a non-empty queue
//! - the exclusion set covers every queued id plus the recent tail

use std::collections::{HashSet, VecDeque};
use twoeat_common::Candidate;

/// Result of appending a page to the queue
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AppendReport {
    /// Candidates appended to the tail
    pub added: usize,
    /// Candidates dropped because they were already queued or recently shown
    pub duplicates: usize,
    /// True when the queue was empty and the first appended item became current
    pub promoted: bool,
}

/// Candidate buffer plus the bounded tail of recently submitted ids
#[derive(Debug, Clone)]
pub struct PrefetchQueue {
    items: VecDeque<Candidate>,

    /// Most recently submitted ids, oldest first
    recent: VecDeque<String>,

    /// Maximum number of recent ids retained
    recent_window: usize,
}

impl PrefetchQueue {
    pub fn new(recent_window: usize) -> Self {
        Self {
            items: VecDeque::new(),
            recent: VecDeque::with_capacity(recent_window),
            recent_window,
        }
    }

    /// Card currently presented to the user
    pub fn current(&self) -> Option<&Candidate> {
        self.items.front()
    }

    /// Number of queued candidates, current included
    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Candidate> {
        self.items.iter()
    }

    /// Queued ids in presentation order
    pub fn ids(&self) -> Vec<String> {
        self.items.iter().map(|c| c.id.clone()).collect()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.items.iter().any(|c| c.id == id)
    }

    /// Whether the id was submitted within the recent window
    pub fn recently_seen(&self, id: &str) -> bool {
        self.recent.iter().any(|r| r == id)
    }

    /// Ids to keep out of the next fetch
    ///
    /// Order: queued ids (current first), then the recent tail newest first.
    /// No id is listed twice.
    pub fn exclusion_set(&self) -> Vec<String> {
        let mut seen = HashSet::new();
        self.items
            .iter()
            .map(|c| c.id.as_str())
            .chain(self.recent.iter().rev().map(String::as_str))
            .filter(|id| seen.insert(*id))
            .map(str::to_string)
            .collect()
    }

    /// Append a page to the tail
    ///
    /// Items already queued, repeated within the page, or inside the recent
    /// window are filtered out so a misbehaving server can never make a card
    /// appear twice.
    pub fn append(&mut self, page: Vec<Candidate>) -> AppendReport {
        let was_empty = self.items.is_empty();
        let mut report = AppendReport::default();

        for candidate in page {
            if self.contains(&candidate.id) || self.recently_seen(&candidate.id) {
                report.duplicates += 1;
                continue;
            }
            self.items.push_back(candidate);
            report.added += 1;
        }

        report.promoted = was_empty && report.added > 0;
        report
    }

    /// Pop the current card and remember its id in the recent tail
    ///
    /// The new head (if any) becomes current.
    pub fn advance(&mut self) -> Option<Candidate> {
        let popped = self.items.pop_front()?;
        self.remember(popped.id.clone());
        Some(popped)
    }

    /// Record an id in the bounded recent tail
    pub fn remember(&mut self, id: String) {
        if self.recent_window == 0 {
            return;
        }
        self.recent.retain(|r| *r != id);
        if self.recent.len() == self.recent_window {
            self.recent.pop_front();
        }
        self.recent.push_back(id);
    }

    /// Drop queued candidates and the recent tail (session restart)
    pub fn clear(&mut self) {
        self.items.clear();
        self.recent.clear();
    }
}
