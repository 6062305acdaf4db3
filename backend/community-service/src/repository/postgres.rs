use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::{comments, creators, forums, votes, CommunityStore, ForumLock, StoreTx};
use crate::domain::{
    Comment, CommentThread, CounterDelta, Creator, Forum, ForumCounters, ForumStatus, NewComment,
    Pagination, Vote, VoteType,
};
use crate::error::{ServiceError, ServiceResult};

/// PostgreSQL-backed community store
#[derive(Clone)]
pub struct PgCommunityStore {
    pool: PgPool,
}

impl PgCommunityStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

/// Open PostgreSQL transaction (READ COMMITTED + row locks)
pub struct PgStoreTx {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl CommunityStore for PgCommunityStore {
    type Tx = PgStoreTx;

    async fn begin(&self) -> ServiceResult<PgStoreTx> {
        let tx = self.pool.begin().await?;
        Ok(PgStoreTx { tx })
    }

    async fn find_forum(&self, video_id: Uuid) -> ServiceResult<Option<Forum>> {
        Ok(forums::find(&self.pool, video_id).await?)
    }

    async fn find_creator(&self, creator_id: Uuid) -> ServiceResult<Option<Creator>> {
        Ok(creators::find(&self.pool, creator_id).await?)
    }

    async fn find_comment(&self, comment_id: Uuid) -> ServiceResult<Option<Comment>> {
        Ok(comments::find(&self.pool, comment_id).await?)
    }

    async fn list_threads(
        &self,
        video_id: Uuid,
        pagination: Pagination,
    ) -> ServiceResult<Vec<CommentThread>> {
        Ok(comments::list_threads(&self.pool, video_id, pagination).await?)
    }

    async fn list_creator_threads(
        &self,
        video_id: Uuid,
        creator_id: Uuid,
    ) -> ServiceResult<Vec<CommentThread>> {
        Ok(comments::list_creator_threads(&self.pool, video_id, creator_id).await?)
    }

    async fn list_votes(&self, video_id: Uuid, creator_id: Uuid) -> ServiceResult<Vec<Vote>> {
        Ok(votes::list_for_video(&self.pool, video_id, creator_id).await?)
    }
}

#[async_trait]
impl StoreTx for PgStoreTx {
    async fn insert_forum(&mut self, video_id: Uuid, creator_id: Uuid) -> ServiceResult<Forum> {
        Ok(forums::insert(&mut *self.tx, video_id, creator_id).await?)
    }

    async fn set_forum_status(
        &mut self,
        video_id: Uuid,
        status: ForumStatus,
    ) -> ServiceResult<Option<Forum>> {
        Ok(forums::set_status(&mut *self.tx, video_id, status).await?)
    }

    async fn lock_forum(
        &mut self,
        video_id: Uuid,
        lock: ForumLock,
    ) -> ServiceResult<Option<Forum>> {
        Ok(forums::find_locked(&mut *self.tx, video_id, lock).await?)
    }

    async fn adjust_forum_counters(
        &mut self,
        video_id: Uuid,
        total_delta: i64,
        root_delta: i64,
    ) -> ServiceResult<ForumCounters> {
        forums::adjust_counters(&mut *self.tx, video_id, total_delta, root_delta)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    ServiceError::NotFound(format!("Video forum ({}) not found", video_id))
                }
                other => other.into(),
            })
    }

    async fn upsert_creator(&mut self, creator: &Creator) -> ServiceResult<()> {
        Ok(creators::upsert(&mut *self.tx, creator).await?)
    }

    async fn insert_comment(&mut self, comment: &NewComment) -> ServiceResult<Comment> {
        Ok(comments::insert(&mut *self.tx, comment).await?)
    }

    async fn lock_comment(&mut self, comment_id: Uuid) -> ServiceResult<Option<Comment>> {
        Ok(comments::find_for_update(&mut *self.tx, comment_id).await?)
    }

    async fn adjust_replies_count(&mut self, comment_id: Uuid, delta: i64) -> ServiceResult<()> {
        comments::adjust_replies_count(&mut *self.tx, comment_id, delta)
            .await
            .map_err(|e| match e {
                sqlx::Error::RowNotFound => {
                    ServiceError::NotFound(format!("Parent comment ({}) not found", comment_id))
                }
                other => other.into(),
            })
    }

    async fn update_comment_text(
        &mut self,
        comment_id: Uuid,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> ServiceResult<Comment> {
        Ok(comments::update_text(&mut *self.tx, comment_id, text, edited_at).await?)
    }

    async fn delete_comment(&mut self, comment_id: Uuid) -> ServiceResult<u64> {
        Ok(comments::delete_with_replies(&mut *self.tx, comment_id).await?)
    }

    async fn find_vote(
        &mut self,
        creator_id: Uuid,
        comment_id: Uuid,
    ) -> ServiceResult<Option<VoteType>> {
        Ok(votes::find_type(&mut *self.tx, creator_id, comment_id).await?)
    }

    async fn upsert_vote(&mut self, vote: &Vote) -> ServiceResult<()> {
        Ok(votes::upsert(&mut *self.tx, vote).await?)
    }

    async fn adjust_vote_counters(
        &mut self,
        comment_id: Uuid,
        delta: CounterDelta,
    ) -> ServiceResult<Comment> {
        Ok(comments::adjust_vote_counters(&mut *self.tx, comment_id, delta).await?)
    }

    async fn commit(self) -> ServiceResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
