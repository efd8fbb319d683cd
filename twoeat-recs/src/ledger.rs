//! Swipe ledger: like history, superstar pick and finalize shortlist
//!
//! Belongs to exactly one session; the controller swaps in a fresh ledger
//! whenever a session starts.

use twoeat_common::FeedbackAction;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SwipeLedger {
    /// Liked ids in insertion order, deduplicated
    likes: Vec<String>,

    /// Most recent SUPERSTAR
    superstar: Option<String>,
}

impl SwipeLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply the bookkeeping for one swipe
    ///
    /// Returns true when the like history grew.
    pub fn record(&mut self, candidate_id: &str, action: FeedbackAction) -> bool {
        match action {
            FeedbackAction::Like => {
                if self.likes.iter().any(|id| id == candidate_id) {
                    return false;
                }
                self.likes.push(candidate_id.to_string());
                true
            }
            FeedbackAction::SuperStar => {
                self.superstar = Some(candidate_id.to_string());
                false
            }
            FeedbackAction::Pass => false,
        }
    }

    pub fn likes(&self) -> &[String] {
        &self.likes
    }

    pub fn like_count(&self) -> usize {
        self.likes.len()
    }

    pub fn superstar(&self) -> Option<&str> {
        self.superstar.as_deref()
    }

    /// Up to `size` most recently liked ids, most recent first
    pub fn recent_likes(&self, size: usize) -> Vec<String> {
        self.likes.iter().rev().take(size).cloned().collect()
    }

    /// Finalize shortlist
    ///
    /// Most recent likes first; when there are fewer than `size` likes the
    /// list is padded with `fallback` ids (current card, then queue order).
    /// Ids never repeat.
    pub fn shortlist<'a, I>(&self, size: usize, fallback: I) -> Vec<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut shortlist = self.recent_likes(size);
        for id in fallback {
            if shortlist.len() >= size {
                break;
            }
            if !shortlist.iter().any(|s| s == id) {
                shortlist.push(id.to_string());
            }
        }
        shortlist
    }
}
