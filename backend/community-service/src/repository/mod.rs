//! Storage seam for the community engine.
//!
//! `CommunityStore` exposes plain reads plus `begin()`; every mutation goes
//! through a `StoreTx`, so the transaction boundary is owned by the caller
//! (the community service) and never by an individual table.

pub mod comments;
pub mod creators;
pub mod forums;
pub mod memory;
pub mod postgres;
pub mod votes;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{
    Comment, CommentThread, CounterDelta, Creator, Forum, ForumCounters, ForumStatus, NewComment,
    Pagination, Vote, VoteType,
};
use crate::error::ServiceResult;

pub use memory::InMemoryCommunityStore;
pub use postgres::PgCommunityStore;

/// Strength of the row lock taken by `StoreTx::lock_forum`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForumLock {
    /// Blocks status changes; concurrent voters share it
    Share,
    /// Also serializes writers that go on to change the forum counters
    Update,
}

#[async_trait]
pub trait CommunityStore: Send + Sync + 'static {
    type Tx: StoreTx;

    /// Open a transaction; dropping it without `commit` rolls back
    async fn begin(&self) -> ServiceResult<Self::Tx>;

    async fn find_forum(&self, video_id: Uuid) -> ServiceResult<Option<Forum>>;

    async fn find_creator(&self, creator_id: Uuid) -> ServiceResult<Option<Creator>>;

    async fn find_comment(&self, comment_id: Uuid) -> ServiceResult<Option<Comment>>;

    /// Root comments of a video, newest first, with authors and replies
    async fn list_threads(
        &self,
        video_id: Uuid,
        pagination: Pagination,
    ) -> ServiceResult<Vec<CommentThread>>;

    /// All root comments a creator wrote under a video
    async fn list_creator_threads(
        &self,
        video_id: Uuid,
        creator_id: Uuid,
    ) -> ServiceResult<Vec<CommentThread>>;

    async fn list_votes(&self, video_id: Uuid, creator_id: Uuid) -> ServiceResult<Vec<Vote>>;
}

#[async_trait]
pub trait StoreTx: Send {
    async fn insert_forum(&mut self, video_id: Uuid, creator_id: Uuid) -> ServiceResult<Forum>;

    /// Returns `None` when the forum does not exist
    async fn set_forum_status(
        &mut self,
        video_id: Uuid,
        status: ForumStatus,
    ) -> ServiceResult<Option<Forum>>;

    /// Read a forum and hold a row lock on it until the transaction ends.
    /// Taken before any comment lock.
    async fn lock_forum(
        &mut self,
        video_id: Uuid,
        lock: ForumLock,
    ) -> ServiceResult<Option<Forum>>;

    /// Apply deltas to both forum counters and read back the new values
    async fn adjust_forum_counters(
        &mut self,
        video_id: Uuid,
        total_delta: i64,
        root_delta: i64,
    ) -> ServiceResult<ForumCounters>;

    async fn upsert_creator(&mut self, creator: &Creator) -> ServiceResult<()>;

    async fn insert_comment(&mut self, comment: &NewComment) -> ServiceResult<Comment>;

    /// Read a comment and hold a row lock on it until the transaction ends
    async fn lock_comment(&mut self, comment_id: Uuid) -> ServiceResult<Option<Comment>>;

    async fn adjust_replies_count(&mut self, comment_id: Uuid, delta: i64) -> ServiceResult<()>;

    async fn update_comment_text(
        &mut self,
        comment_id: Uuid,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> ServiceResult<Comment>;

    /// Delete a comment together with its replies and their votes.
    /// Returns the number of comment rows removed.
    async fn delete_comment(&mut self, comment_id: Uuid) -> ServiceResult<u64>;

    async fn find_vote(
        &mut self,
        creator_id: Uuid,
        comment_id: Uuid,
    ) -> ServiceResult<Option<VoteType>>;

    async fn upsert_vote(&mut self, vote: &Vote) -> ServiceResult<()>;

    /// Apply a like/dislike delta and return the updated comment
    async fn adjust_vote_counters(
        &mut self,
        comment_id: Uuid,
        delta: CounterDelta,
    ) -> ServiceResult<Comment>;

    async fn commit(self) -> ServiceResult<()>;
}
