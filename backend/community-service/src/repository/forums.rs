use sqlx::PgExecutor;
use uuid::Uuid;

use super::ForumLock;
use crate::domain::{Forum, ForumCounters, ForumStatus};

const FORUM_COLUMNS: &str = "video_id, creator_id, status, allowed_to_comment, \
     video_comments_count, root_video_comments_count, created_at";

pub async fn find<'e, E: PgExecutor<'e>>(
    executor: E,
    video_id: Uuid,
) -> Result<Option<Forum>, sqlx::Error> {
    sqlx::query_as::<_, Forum>(&format!(
        "SELECT {} FROM video_forums WHERE video_id = $1",
        FORUM_COLUMNS
    ))
    .bind(video_id)
    .fetch_optional(executor)
    .await
}

pub async fn find_locked<'e, E: PgExecutor<'e>>(
    executor: E,
    video_id: Uuid,
    lock: ForumLock,
) -> Result<Option<Forum>, sqlx::Error> {
    let clause = match lock {
        ForumLock::Share => "FOR SHARE",
        ForumLock::Update => "FOR NO KEY UPDATE",
    };
    sqlx::query_as::<_, Forum>(&format!(
        "SELECT {} FROM video_forums WHERE video_id = $1 {}",
        FORUM_COLUMNS, clause
    ))
    .bind(video_id)
    .fetch_optional(executor)
    .await
}

/// Insert a registered, open forum with zeroed counters
pub async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    video_id: Uuid,
    creator_id: Uuid,
) -> Result<Forum, sqlx::Error> {
    sqlx::query_as::<_, Forum>(&format!(
        r#"
        INSERT INTO video_forums (
            video_id, creator_id, status, allowed_to_comment,
            video_comments_count, root_video_comments_count
        )
        VALUES ($1, $2, $3, TRUE, 0, 0)
        RETURNING {}
        "#,
        FORUM_COLUMNS
    ))
    .bind(video_id)
    .bind(creator_id)
    .bind(ForumStatus::Registered)
    .fetch_one(executor)
    .await
}

pub async fn set_status<'e, E: PgExecutor<'e>>(
    executor: E,
    video_id: Uuid,
    status: ForumStatus,
) -> Result<Option<Forum>, sqlx::Error> {
    sqlx::query_as::<_, Forum>(&format!(
        "UPDATE video_forums SET status = $2 WHERE video_id = $1 RETURNING {}",
        FORUM_COLUMNS
    ))
    .bind(video_id)
    .bind(status)
    .fetch_optional(executor)
    .await
}

/// Counter deltas are applied in SQL so concurrent writers never lose updates
pub async fn adjust_counters<'e, E: PgExecutor<'e>>(
    executor: E,
    video_id: Uuid,
    total_delta: i64,
    root_delta: i64,
) -> Result<ForumCounters, sqlx::Error> {
    sqlx::query_as::<_, ForumCounters>(
        r#"
        UPDATE video_forums
        SET video_comments_count = video_comments_count + $2,
            root_video_comments_count = root_video_comments_count + $3
        WHERE video_id = $1
        RETURNING video_comments_count, root_video_comments_count
        "#,
    )
    .bind(video_id)
    .bind(total_delta)
    .bind(root_delta)
    .fetch_one(executor)
    .await
}
