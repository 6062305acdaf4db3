//! Community service: forum lifecycle, comments, replies and votes.
//!
//! Every mutation runs in exactly one store transaction opened here. Counter
//! changes are applied as deltas inside that transaction, so forum and
//! comment counters move together with the rows they count. Outbound events
//! are built from values read inside the transaction and handed to the
//! emitter only after `commit` succeeded.
//!
//! Row locks are always taken forum first, then root comment, then reply.
//! Writes that need an open forum re-check eligibility under the forum lock,
//! so a concurrent unregister either lands before them or waits for them.

use chrono::Utc;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::notifications::{
    like_notification, reply_notification, root_comment_notification, NotificationEmitter,
};
use crate::domain::{
    Comment, CommentThread, Creator, Forum, ForumStatus, ForumView, NewComment, Pagination,
    UserVotes, Vote, VoteTransition, VoteType,
};
use crate::error::{ServiceError, ServiceResult};
use crate::metrics;
use crate::repository::{CommunityStore, ForumLock, StoreTx};

pub struct CommunityService<S: CommunityStore> {
    store: Arc<S>,
    emitter: NotificationEmitter,
}

impl<S: CommunityStore> Clone for CommunityService<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            emitter: self.emitter.clone(),
        }
    }
}

impl<S: CommunityStore> CommunityService<S> {
    pub fn new(store: Arc<S>, emitter: NotificationEmitter) -> Self {
        Self { store, emitter }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    // ------------------------------------------------------------------
    // Forum lifecycle
    // ------------------------------------------------------------------

    /// Open a forum for a freshly published video. A second registration of
    /// the same video fails on the primary key.
    pub async fn register_forum(&self, video_id: Uuid, creator_id: Uuid) -> ServiceResult<Forum> {
        let mut tx = self.store.begin().await?;
        let forum = tx.insert_forum(video_id, creator_id).await?;
        tx.commit().await?;

        info!(video_id = %video_id, creator_id = %creator_id, "Video forum registered");
        Ok(forum)
    }

    /// Close a forum for writes. Reads keep working.
    pub async fn unregister_forum(&self, video_id: Uuid) -> ServiceResult<Forum> {
        let mut tx = self.store.begin().await?;
        let forum = tx
            .set_forum_status(video_id, ForumStatus::Unregistered)
            .await?
            .ok_or_else(|| forum_not_found(video_id))?;
        tx.commit().await?;

        info!(video_id = %video_id, "Video forum unregistered");
        Ok(forum)
    }

    pub async fn sync_creator(&self, creator: Creator) -> ServiceResult<()> {
        let mut tx = self.store.begin().await?;
        tx.upsert_creator(&creator).await?;
        tx.commit().await?;

        debug!(creator_id = %creator.id, "Creator profile synced");
        Ok(())
    }

    /// Fails with `NotFound` for an unknown forum and `Closed` when it no
    /// longer accepts comments or votes.
    pub async fn check_forum_eligible(&self, video_id: Uuid) -> ServiceResult<Forum> {
        let forum = self
            .store
            .find_forum(video_id)
            .await?
            .ok_or_else(|| forum_not_found(video_id))?;

        if !forum.accepts_writes() {
            return Err(ServiceError::Closed(video_id));
        }
        Ok(forum)
    }

    async fn require_creator(&self, creator_id: Uuid) -> ServiceResult<Creator> {
        self.store
            .find_creator(creator_id)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Creator ({}) not found", creator_id)))
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    pub async fn add_comment(
        &self,
        video_id: Uuid,
        text: String,
        actor_id: Uuid,
    ) -> ServiceResult<Comment> {
        self.check_forum_eligible(video_id).await?;
        let author = self.require_creator(actor_id).await?;

        let mut tx = self.store.begin().await?;
        let forum = lock_eligible_forum(&mut tx, video_id, ForumLock::Update).await?;
        let comment = tx
            .insert_comment(&NewComment {
                video_id,
                creator_id: actor_id,
                parent_comment_id: None,
                text,
            })
            .await?;
        let counters = tx.adjust_forum_counters(video_id, 1, 1).await?;
        tx.commit().await?;

        metrics::record_comment_created("root");
        info!(
            video_id = %video_id,
            comment_id = %comment.id,
            creator_id = %actor_id,
            comments_count = counters.video_comments_count,
            "Root comment created"
        );

        self.emitter.comments_metrics(video_id, counters);
        self.emitter
            .notify(root_comment_notification(forum.creator_id, video_id, &author));

        Ok(comment)
    }

    pub async fn reply(
        &self,
        video_id: Uuid,
        parent_comment_id: Uuid,
        text: String,
        actor_id: Uuid,
    ) -> ServiceResult<Comment> {
        self.check_forum_eligible(video_id).await?;
        let author = self.require_creator(actor_id).await?;

        let mut tx = self.store.begin().await?;
        lock_eligible_forum(&mut tx, video_id, ForumLock::Update).await?;
        let parent = tx
            .lock_comment(parent_comment_id)
            .await?
            .filter(|parent| parent.video_id == video_id && parent.is_root())
            .ok_or_else(|| {
                ServiceError::NotFound(format!(
                    "Parent comment ({}) not found",
                    parent_comment_id
                ))
            })?;

        let reply = tx
            .insert_comment(&NewComment {
                video_id,
                creator_id: actor_id,
                parent_comment_id: Some(parent.id),
                text,
            })
            .await?;
        tx.adjust_replies_count(parent.id, 1).await?;
        tx.adjust_forum_counters(video_id, 1, 0).await?;
        tx.commit().await?;

        metrics::record_comment_created("reply");
        info!(
            video_id = %video_id,
            comment_id = %reply.id,
            parent_comment_id = %parent.id,
            creator_id = %actor_id,
            "Reply created"
        );

        self.emitter.notify(reply_notification(
            parent.creator_id,
            video_id,
            parent.id,
            &author,
        ));

        Ok(reply)
    }

    pub async fn edit_comment(
        &self,
        comment_id: Uuid,
        text: String,
        actor_id: Uuid,
    ) -> ServiceResult<Comment> {
        let mut tx = self.store.begin().await?;
        let comment = tx
            .lock_comment(comment_id)
            .await?
            .ok_or_else(|| comment_not_found(comment_id))?;

        if comment.creator_id != actor_id {
            return Err(ServiceError::Forbidden(format!(
                "Comment ({}) belongs to another creator",
                comment_id
            )));
        }

        let updated = tx
            .update_comment_text(comment_id, &text, Utc::now())
            .await?;
        tx.commit().await?;

        debug!(comment_id = %comment_id, "Comment edited");
        Ok(updated)
    }

    /// Delete a comment the actor wrote. Deleting a root removes its replies
    /// and every vote on them; forum and parent counters shrink by the rows
    /// actually removed.
    pub async fn delete_comment(&self, comment_id: Uuid, actor_id: Uuid) -> ServiceResult<()> {
        let target = self
            .store
            .find_comment(comment_id)
            .await?
            .ok_or_else(|| comment_not_found(comment_id))?;

        let mut tx = self.store.begin().await?;
        tx.lock_forum(target.video_id, ForumLock::Update).await?;
        if let Some(parent_id) = target.parent_comment_id {
            tx.lock_comment(parent_id).await?;
        }
        let comment = tx
            .lock_comment(comment_id)
            .await?
            .ok_or_else(|| comment_not_found(comment_id))?;

        if comment.creator_id != actor_id {
            return Err(ServiceError::Forbidden(format!(
                "Comment ({}) belongs to another creator",
                comment_id
            )));
        }

        let removed = tx.delete_comment(comment_id).await?;
        let removed_delta = -(removed as i64);
        let counters = match comment.parent_comment_id {
            Some(parent_id) => {
                tx.adjust_replies_count(parent_id, -1).await?;
                tx.adjust_forum_counters(comment.video_id, removed_delta, 0)
                    .await?
            }
            None => {
                tx.adjust_forum_counters(comment.video_id, removed_delta, -1)
                    .await?
            }
        };
        tx.commit().await?;

        let kind = if comment.is_root() { "root" } else { "reply" };
        metrics::record_comments_deleted(kind, removed);
        info!(
            video_id = %comment.video_id,
            comment_id = %comment_id,
            removed_rows = removed,
            comments_count = counters.video_comments_count,
            "Comment deleted"
        );
        Ok(())
    }

    // ------------------------------------------------------------------
    // Votes
    // ------------------------------------------------------------------

    /// Apply a vote and return the comment with its new counters.
    ///
    /// The comment row is locked before the vote row is read, so two votes by
    /// the same actor on the same comment are evaluated one after the other.
    pub async fn vote(
        &self,
        video_id: Uuid,
        comment_id: Uuid,
        vote_type: VoteType,
        actor_id: Uuid,
    ) -> ServiceResult<Comment> {
        self.check_forum_eligible(video_id).await?;
        let voter = self.require_creator(actor_id).await?;

        let mut tx = self.store.begin().await?;
        lock_eligible_forum(&mut tx, video_id, ForumLock::Share).await?;
        let comment = tx
            .lock_comment(comment_id)
            .await?
            .filter(|comment| comment.video_id == video_id)
            .ok_or_else(|| comment_not_found(comment_id))?;

        let previous = tx.find_vote(actor_id, comment_id).await?;
        let transition = match VoteTransition::plan(previous, vote_type) {
            Ok(transition) => transition,
            Err(rejected) => {
                metrics::record_vote_transition(vote_type.as_str(), "rejected");
                warn!(
                    comment_id = %comment_id,
                    creator_id = %actor_id,
                    vote_type = vote_type.as_str(),
                    reason = %rejected,
                    "Vote rejected"
                );
                return Err(rejected.into());
            }
        };

        tx.upsert_vote(&Vote {
            creator_id: actor_id,
            video_comment_id: comment_id,
            video_id,
            vote_type,
        })
        .await?;
        let updated = tx.adjust_vote_counters(comment_id, transition.delta).await?;
        tx.commit().await?;

        metrics::record_vote_transition(&transition.label(), "applied");
        debug!(
            comment_id = %comment_id,
            creator_id = %actor_id,
            transition = %transition.label(),
            likes = updated.likes_count,
            dislikes = updated.dislikes_count,
            "Vote applied"
        );

        if transition.notifies_author() {
            self.emitter.notify(like_notification(
                comment.creator_id,
                video_id,
                comment_id,
                &voter,
            ));
        }

        Ok(updated)
    }

    // ------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------

    pub async fn get_comments(
        &self,
        video_id: Uuid,
        pagination: Pagination,
    ) -> ServiceResult<Vec<CommentThread>> {
        self.store.list_threads(video_id, pagination).await
    }

    pub async fn get_votes(&self, video_id: Uuid, actor_id: Uuid) -> ServiceResult<UserVotes> {
        let votes = self.store.list_votes(video_id, actor_id).await?;
        Ok(UserVotes::from_votes(votes))
    }

    /// Counters, the viewer's votes and own root comments, and the first
    /// page of the general list. When the viewer has root comments of their
    /// own, those are left out of the general page.
    pub async fn get_forum_view(
        &self,
        video_id: Uuid,
        per_page: u32,
        actor_id: Option<Uuid>,
    ) -> ServiceResult<ForumView> {
        let forum = self
            .store
            .find_forum(video_id)
            .await?
            .ok_or_else(|| forum_not_found(video_id))?;

        let (votes, user_comments) = match actor_id {
            Some(actor_id) => (
                self.get_votes(video_id, actor_id).await?,
                self.store.list_creator_threads(video_id, actor_id).await?,
            ),
            None => (UserVotes::default(), Vec::new()),
        };

        let mut comments = self
            .store
            .list_threads(video_id, Pagination::new(1, per_page))
            .await?;
        if let (Some(actor_id), false) = (actor_id, user_comments.is_empty()) {
            comments.retain(|thread| thread.comment.creator_id != actor_id);
        }

        Ok(ForumView {
            comments_count: forum.video_comments_count,
            root_comments_count: forum.root_video_comments_count,
            votes,
            comments,
            user_comments,
        })
    }
}

/// Eligibility as seen under the forum row lock, which holds until commit
async fn lock_eligible_forum<T: StoreTx>(
    tx: &mut T,
    video_id: Uuid,
    lock: ForumLock,
) -> ServiceResult<Forum> {
    let forum = tx
        .lock_forum(video_id, lock)
        .await?
        .ok_or_else(|| forum_not_found(video_id))?;

    if !forum.accepts_writes() {
        return Err(ServiceError::Closed(video_id));
    }
    Ok(forum)
}

fn forum_not_found(video_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Video forum ({}) not found", video_id))
}

fn comment_not_found(comment_id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("Comment ({}) not found", comment_id))
}
