pub mod models;
pub mod vote;

pub use models::*;
pub use vote::{CounterDelta, RejectedVote, VoteTransition};
