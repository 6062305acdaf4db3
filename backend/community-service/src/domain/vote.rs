//! Vote state machine
//!
//! A vote request is evaluated against the row currently stored for the
//! (creator, comment) pair. A missing row behaves exactly like a `None` row:
//! it has never contributed to any counter. Every legal transition maps to a
//! fixed signed delta on the comment's like/dislike counters.

use super::models::VoteType;
use thiserror::Error;

/// Signed change applied to a comment's vote counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CounterDelta {
    pub likes: i64,
    pub dislikes: i64,
}

impl CounterDelta {
    const fn new(likes: i64, dislikes: i64) -> Self {
        Self { likes, dislikes }
    }
}

/// Why a vote request was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum RejectedVote {
    #[error("comment without votes cannot be voted with None type")]
    NothingToClear,

    #[error("specified vote equals the existing {0:?} vote")]
    Unchanged(VoteType),
}

/// Accepted transition between two vote types
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VoteTransition {
    pub previous: VoteType,
    pub requested: VoteType,
    pub delta: CounterDelta,
}

impl VoteTransition {
    /// Plan the transition from the persisted vote (absent = `None`) to the
    /// requested one.
    pub fn plan(previous: Option<VoteType>, requested: VoteType) -> Result<Self, RejectedVote> {
        use VoteType::{Dislike, Like, None};

        let previous = previous.unwrap_or(None);
        let delta = match (previous, requested) {
            (None, None) => return Err(RejectedVote::NothingToClear),
            (Like, Like) | (Dislike, Dislike) => return Err(RejectedVote::Unchanged(previous)),
            (None, Like) => CounterDelta::new(1, 0),
            (None, Dislike) => CounterDelta::new(0, 1),
            (Like, None) => CounterDelta::new(-1, 0),
            (Dislike, None) => CounterDelta::new(0, -1),
            (Like, Dislike) => CounterDelta::new(-1, 1),
            (Dislike, Like) => CounterDelta::new(1, -1),
        };

        Ok(Self {
            previous,
            requested,
            delta,
        })
    }

    /// Only transitions that end in a like alert the comment author
    pub fn notifies_author(&self) -> bool {
        self.requested == VoteType::Like
    }

    /// Label used for metrics, e.g. `None->Like`
    pub fn label(&self) -> String {
        format!("{}->{}", self.previous.as_str(), self.requested.as_str())
    }
}
