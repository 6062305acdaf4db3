//! In-memory community store.
//!
//! A transaction takes the single state lock for its whole lifetime and works
//! on a staged copy, so transactions are fully serialized and a dropped
//! transaction leaves no trace. Table constraints of the SQL schema (counters
//! never negative, root counter bounded by the total, foreign keys, unique
//! forum per video) are enforced and reported as storage failures.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use super::{CommunityStore, ForumLock, StoreTx};
use crate::domain::{
    Comment, CommentThread, CommentWithCreator, CounterDelta, Creator, Forum, ForumCounters,
    ForumStatus, NewComment, Pagination, Vote, VoteType,
};
use crate::error::{ServiceError, ServiceResult};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    forums: HashMap<Uuid, Forum>,
    creators: HashMap<Uuid, Creator>,
    comments: HashMap<Uuid, Comment>,
    /// Insertion sequence per comment, stands in for created_at ordering
    sequence: HashMap<Uuid, u64>,
    next_sequence: u64,
    votes: HashMap<(Uuid, Uuid), Vote>,
}

#[derive(Clone, Default)]
pub struct InMemoryCommunityStore {
    state: Arc<Mutex<MemoryState>>,
    fail_next_commit: Arc<AtomicBool>,
}

impl InMemoryCommunityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next commit fail as a storage conflict
    pub fn fail_next_commit(&self) {
        self.fail_next_commit.store(true, Ordering::SeqCst);
    }

    /// Number of comments whose parent is `comment_id`
    pub async fn count_replies(&self, comment_id: Uuid) -> usize {
        let state = self.state.lock().await;
        state
            .comments
            .values()
            .filter(|c| c.parent_comment_id == Some(comment_id))
            .count()
    }

    pub async fn find_vote(&self, creator_id: Uuid, comment_id: Uuid) -> Option<Vote> {
        let state = self.state.lock().await;
        state.votes.get(&(creator_id, comment_id)).cloned()
    }
}

pub struct MemoryStoreTx {
    guard: OwnedMutexGuard<MemoryState>,
    staged: MemoryState,
    fail_commit: bool,
}

fn constraint_violation(message: &str) -> ServiceError {
    ServiceError::TransientStorage(sqlx::Error::Protocol(format!(
        "constraint violation: {}",
        message
    )))
}

fn build_threads(state: &MemoryState, mut roots: Vec<&Comment>) -> Vec<CommentThread> {
    let seq = |c: &Comment| state.sequence.get(&c.id).copied().unwrap_or_default();
    roots.sort_by(|a, b| seq(b).cmp(&seq(a)));

    roots
        .into_iter()
        .filter_map(|root| {
            let creator = state.creators.get(&root.creator_id)?.clone();
            let mut replies: Vec<&Comment> = state
                .comments
                .values()
                .filter(|c| c.parent_comment_id == Some(root.id))
                .collect();
            replies.sort_by_key(|c| seq(c));

            let replies = replies
                .into_iter()
                .filter_map(|reply| {
                    let creator = state.creators.get(&reply.creator_id)?.clone();
                    Some(CommentWithCreator {
                        comment: reply.clone(),
                        creator,
                    })
                })
                .collect();

            Some(CommentThread {
                comment: root.clone(),
                creator,
                replies,
            })
        })
        .collect()
}

#[async_trait]
impl CommunityStore for InMemoryCommunityStore {
    type Tx = MemoryStoreTx;

    async fn begin(&self) -> ServiceResult<MemoryStoreTx> {
        let guard = self.state.clone().lock_owned().await;
        let staged = guard.clone();
        Ok(MemoryStoreTx {
            guard,
            staged,
            fail_commit: self.fail_next_commit.swap(false, Ordering::SeqCst),
        })
    }

    async fn find_forum(&self, video_id: Uuid) -> ServiceResult<Option<Forum>> {
        Ok(self.state.lock().await.forums.get(&video_id).cloned())
    }

    async fn find_creator(&self, creator_id: Uuid) -> ServiceResult<Option<Creator>> {
        Ok(self.state.lock().await.creators.get(&creator_id).cloned())
    }

    async fn find_comment(&self, comment_id: Uuid) -> ServiceResult<Option<Comment>> {
        Ok(self.state.lock().await.comments.get(&comment_id).cloned())
    }

    async fn list_threads(
        &self,
        video_id: Uuid,
        pagination: Pagination,
    ) -> ServiceResult<Vec<CommentThread>> {
        let state = self.state.lock().await;
        let roots = state
            .comments
            .values()
            .filter(|c| c.video_id == video_id && c.is_root())
            .collect();

        Ok(build_threads(&state, roots)
            .into_iter()
            .skip(pagination.offset() as usize)
            .take(pagination.limit() as usize)
            .collect())
    }

    async fn list_creator_threads(
        &self,
        video_id: Uuid,
        creator_id: Uuid,
    ) -> ServiceResult<Vec<CommentThread>> {
        let state = self.state.lock().await;
        let roots = state
            .comments
            .values()
            .filter(|c| c.video_id == video_id && c.creator_id == creator_id && c.is_root())
            .collect();

        Ok(build_threads(&state, roots))
    }

    async fn list_votes(&self, video_id: Uuid, creator_id: Uuid) -> ServiceResult<Vec<Vote>> {
        let state = self.state.lock().await;
        Ok(state
            .votes
            .values()
            .filter(|v| v.video_id == video_id && v.creator_id == creator_id)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl StoreTx for MemoryStoreTx {
    async fn insert_forum(&mut self, video_id: Uuid, creator_id: Uuid) -> ServiceResult<Forum> {
        if self.staged.forums.contains_key(&video_id) {
            return Err(constraint_violation("video_forums_pkey"));
        }

        let forum = Forum {
            video_id,
            creator_id,
            status: ForumStatus::Registered,
            allowed_to_comment: true,
            video_comments_count: 0,
            root_video_comments_count: 0,
            created_at: Utc::now(),
        };
        self.staged.forums.insert(video_id, forum.clone());
        Ok(forum)
    }

    async fn set_forum_status(
        &mut self,
        video_id: Uuid,
        status: ForumStatus,
    ) -> ServiceResult<Option<Forum>> {
        Ok(self.staged.forums.get_mut(&video_id).map(|forum| {
            forum.status = status;
            forum.clone()
        }))
    }

    /// The state lock already serializes transactions
    async fn lock_forum(
        &mut self,
        video_id: Uuid,
        _lock: ForumLock,
    ) -> ServiceResult<Option<Forum>> {
        Ok(self.staged.forums.get(&video_id).cloned())
    }

    async fn adjust_forum_counters(
        &mut self,
        video_id: Uuid,
        total_delta: i64,
        root_delta: i64,
    ) -> ServiceResult<ForumCounters> {
        let forum = self
            .staged
            .forums
            .get_mut(&video_id)
            .ok_or_else(|| ServiceError::NotFound(format!("Video forum ({}) not found", video_id)))?;

        let total = forum.video_comments_count + total_delta;
        let root = forum.root_video_comments_count + root_delta;
        if total < 0 || root < 0 {
            return Err(constraint_violation("video_forums counters non-negative"));
        }
        if root > total {
            return Err(constraint_violation("video_forums_root_le_total"));
        }

        forum.video_comments_count = total;
        forum.root_video_comments_count = root;
        Ok(ForumCounters {
            video_comments_count: total,
            root_video_comments_count: root,
        })
    }

    async fn upsert_creator(&mut self, creator: &Creator) -> ServiceResult<()> {
        self.staged.creators.insert(creator.id, creator.clone());
        Ok(())
    }

    async fn insert_comment(&mut self, comment: &NewComment) -> ServiceResult<Comment> {
        if !self.staged.forums.contains_key(&comment.video_id) {
            return Err(constraint_violation("video_comments_video_id_fkey"));
        }
        if !self.staged.creators.contains_key(&comment.creator_id) {
            return Err(constraint_violation("video_comments_creator_id_fkey"));
        }
        if let Some(parent_id) = comment.parent_comment_id {
            if !self.staged.comments.contains_key(&parent_id) {
                return Err(constraint_violation("video_comments_parent_comment_id_fkey"));
            }
        }

        let created = Comment {
            id: Uuid::new_v4(),
            video_id: comment.video_id,
            creator_id: comment.creator_id,
            parent_comment_id: comment.parent_comment_id,
            text: comment.text.clone(),
            likes_count: 0,
            dislikes_count: 0,
            replies_count: 0,
            created_at: Utc::now(),
            edited_at: None,
        };

        self.staged.next_sequence += 1;
        self.staged
            .sequence
            .insert(created.id, self.staged.next_sequence);
        self.staged.comments.insert(created.id, created.clone());
        Ok(created)
    }

    async fn lock_comment(&mut self, comment_id: Uuid) -> ServiceResult<Option<Comment>> {
        Ok(self.staged.comments.get(&comment_id).cloned())
    }

    async fn adjust_replies_count(&mut self, comment_id: Uuid, delta: i64) -> ServiceResult<()> {
        let comment = self.staged.comments.get_mut(&comment_id).ok_or_else(|| {
            ServiceError::NotFound(format!("Parent comment ({}) not found", comment_id))
        })?;

        let replies = comment.replies_count + delta;
        if replies < 0 {
            return Err(constraint_violation("video_comments replies_count non-negative"));
        }
        comment.replies_count = replies;
        Ok(())
    }

    async fn update_comment_text(
        &mut self,
        comment_id: Uuid,
        text: &str,
        edited_at: DateTime<Utc>,
    ) -> ServiceResult<Comment> {
        let comment = self
            .staged
            .comments
            .get_mut(&comment_id)
            .ok_or(ServiceError::TransientStorage(sqlx::Error::RowNotFound))?;

        comment.text = text.to_string();
        comment.edited_at = Some(edited_at);
        Ok(comment.clone())
    }

    async fn delete_comment(&mut self, comment_id: Uuid) -> ServiceResult<u64> {
        let removed: Vec<Uuid> = self
            .staged
            .comments
            .values()
            .filter(|c| c.id == comment_id || c.parent_comment_id == Some(comment_id))
            .map(|c| c.id)
            .collect();

        for id in &removed {
            self.staged.comments.remove(id);
            self.staged.sequence.remove(id);
        }
        self.staged
            .votes
            .retain(|(_, voted_comment), _| !removed.contains(voted_comment));

        Ok(removed.len() as u64)
    }

    async fn find_vote(
        &mut self,
        creator_id: Uuid,
        comment_id: Uuid,
    ) -> ServiceResult<Option<VoteType>> {
        Ok(self
            .staged
            .votes
            .get(&(creator_id, comment_id))
            .map(|v| v.vote_type))
    }

    async fn upsert_vote(&mut self, vote: &Vote) -> ServiceResult<()> {
        if !self.staged.comments.contains_key(&vote.video_comment_id) {
            return Err(constraint_violation("video_comment_votes_video_comment_id_fkey"));
        }
        if !self.staged.creators.contains_key(&vote.creator_id) {
            return Err(constraint_violation("video_comment_votes_creator_id_fkey"));
        }

        self.staged
            .votes
            .entry((vote.creator_id, vote.video_comment_id))
            .and_modify(|existing| existing.vote_type = vote.vote_type)
            .or_insert_with(|| vote.clone());
        Ok(())
    }

    async fn adjust_vote_counters(
        &mut self,
        comment_id: Uuid,
        delta: CounterDelta,
    ) -> ServiceResult<Comment> {
        let comment = self
            .staged
            .comments
            .get_mut(&comment_id)
            .ok_or(ServiceError::TransientStorage(sqlx::Error::RowNotFound))?;

        let likes = comment.likes_count + delta.likes;
        let dislikes = comment.dislikes_count + delta.dislikes;
        if likes < 0 || dislikes < 0 {
            return Err(constraint_violation("video_comments vote counters non-negative"));
        }

        comment.likes_count = likes;
        comment.dislikes_count = dislikes;
        Ok(comment.clone())
    }

    async fn commit(mut self) -> ServiceResult<()> {
        if self.fail_commit {
            return Err(constraint_violation("could not serialize access"));
        }
        *self.guard = self.staged;
        Ok(())
    }
}
