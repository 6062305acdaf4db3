use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgExecutor, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::domain::{
    Comment, CommentThread, CommentWithCreator, CounterDelta, Creator, NewComment, Pagination,
};

const COMMENT_COLUMNS: &str = "id, video_id, creator_id, parent_comment_id, text, \
     likes_count, dislikes_count, replies_count, created_at, edited_at";

/// Comment row joined with its author's profile
#[derive(sqlx::FromRow)]
struct CommentCreatorRow {
    id: Uuid,
    video_id: Uuid,
    creator_id: Uuid,
    parent_comment_id: Option<Uuid>,
    text: String,
    likes_count: i64,
    dislikes_count: i64,
    replies_count: i64,
    created_at: DateTime<Utc>,
    edited_at: Option<DateTime<Utc>>,
    display_name: String,
    nickname: String,
    thumbnail_url: String,
}

impl From<CommentCreatorRow> for CommentWithCreator {
    fn from(row: CommentCreatorRow) -> Self {
        Self {
            creator: Creator {
                id: row.creator_id,
                display_name: row.display_name,
                nickname: row.nickname,
                thumbnail_url: row.thumbnail_url,
            },
            comment: Comment {
                id: row.id,
                video_id: row.video_id,
                creator_id: row.creator_id,
                parent_comment_id: row.parent_comment_id,
                text: row.text,
                likes_count: row.likes_count,
                dislikes_count: row.dislikes_count,
                replies_count: row.replies_count,
                created_at: row.created_at,
                edited_at: row.edited_at,
            },
        }
    }
}

const JOINED_SELECT: &str = r#"
    SELECT c.id, c.video_id, c.creator_id, c.parent_comment_id, c.text,
           c.likes_count, c.dislikes_count, c.replies_count, c.created_at, c.edited_at,
           cr.display_name, cr.nickname, cr.thumbnail_url
    FROM video_comments c
    JOIN creators cr ON cr.id = c.creator_id
"#;

pub async fn find<'e, E: PgExecutor<'e>>(
    executor: E,
    comment_id: Uuid,
) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!(
        "SELECT {} FROM video_comments WHERE id = $1",
        COMMENT_COLUMNS
    ))
    .bind(comment_id)
    .fetch_optional(executor)
    .await
}

/// Lock the comment row so concurrent vote/delete transactions serialize on it
pub async fn find_for_update<'e, E: PgExecutor<'e>>(
    executor: E,
    comment_id: Uuid,
) -> Result<Option<Comment>, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!(
        "SELECT {} FROM video_comments WHERE id = $1 FOR UPDATE",
        COMMENT_COLUMNS
    ))
    .bind(comment_id)
    .fetch_optional(executor)
    .await
}

pub async fn insert<'e, E: PgExecutor<'e>>(
    executor: E,
    comment: &NewComment,
) -> Result<Comment, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!(
        r#"
        INSERT INTO video_comments (
            video_id, creator_id, parent_comment_id, text,
            likes_count, dislikes_count, replies_count
        )
        VALUES ($1, $2, $3, $4, 0, 0, 0)
        RETURNING {}
        "#,
        COMMENT_COLUMNS
    ))
    .bind(comment.video_id)
    .bind(comment.creator_id)
    .bind(comment.parent_comment_id)
    .bind(&comment.text)
    .fetch_one(executor)
    .await
}

pub async fn adjust_replies_count<'e, E: PgExecutor<'e>>(
    executor: E,
    comment_id: Uuid,
    delta: i64,
) -> Result<(), sqlx::Error> {
    let result = sqlx::query(
        "UPDATE video_comments SET replies_count = replies_count + $2 WHERE id = $1",
    )
    .bind(comment_id)
    .bind(delta)
    .execute(executor)
    .await?;

    if result.rows_affected() == 0 {
        return Err(sqlx::Error::RowNotFound);
    }
    Ok(())
}

pub async fn update_text<'e, E: PgExecutor<'e>>(
    executor: E,
    comment_id: Uuid,
    text: &str,
    edited_at: DateTime<Utc>,
) -> Result<Comment, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!(
        "UPDATE video_comments SET text = $2, edited_at = $3 WHERE id = $1 RETURNING {}",
        COMMENT_COLUMNS
    ))
    .bind(comment_id)
    .bind(text)
    .bind(edited_at)
    .fetch_one(executor)
    .await
}

pub async fn adjust_vote_counters<'e, E: PgExecutor<'e>>(
    executor: E,
    comment_id: Uuid,
    delta: CounterDelta,
) -> Result<Comment, sqlx::Error> {
    sqlx::query_as::<_, Comment>(&format!(
        r#"
        UPDATE video_comments
        SET likes_count = likes_count + $2,
            dislikes_count = dislikes_count + $3
        WHERE id = $1
        RETURNING {}
        "#,
        COMMENT_COLUMNS
    ))
    .bind(comment_id)
    .bind(delta.likes)
    .bind(delta.dislikes)
    .fetch_one(executor)
    .await
}

/// Remove a comment and its replies; votes go with them via ON DELETE CASCADE
pub async fn delete_with_replies(
    conn: &mut PgConnection,
    comment_id: Uuid,
) -> Result<u64, sqlx::Error> {
    let replies = sqlx::query("DELETE FROM video_comments WHERE parent_comment_id = $1")
        .bind(comment_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    let comment = sqlx::query("DELETE FROM video_comments WHERE id = $1")
        .bind(comment_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();

    Ok(replies + comment)
}

/// Page of root comments for a video, newest first
pub async fn list_threads(
    pool: &PgPool,
    video_id: Uuid,
    pagination: Pagination,
) -> Result<Vec<CommentThread>, sqlx::Error> {
    let roots = sqlx::query_as::<_, CommentCreatorRow>(&format!(
        r#"
        {}
        WHERE c.video_id = $1 AND c.parent_comment_id IS NULL
        ORDER BY c.created_at DESC, c.id
        LIMIT $2 OFFSET $3
        "#,
        JOINED_SELECT
    ))
    .bind(video_id)
    .bind(pagination.limit())
    .bind(pagination.offset())
    .fetch_all(pool)
    .await?;

    attach_replies(pool, roots).await
}

/// Every root comment the creator wrote under the video
pub async fn list_creator_threads(
    pool: &PgPool,
    video_id: Uuid,
    creator_id: Uuid,
) -> Result<Vec<CommentThread>, sqlx::Error> {
    let roots = sqlx::query_as::<_, CommentCreatorRow>(&format!(
        r#"
        {}
        WHERE c.video_id = $1 AND c.creator_id = $2 AND c.parent_comment_id IS NULL
        ORDER BY c.created_at DESC, c.id
        "#,
        JOINED_SELECT
    ))
    .bind(video_id)
    .bind(creator_id)
    .fetch_all(pool)
    .await?;

    attach_replies(pool, roots).await
}

async fn attach_replies(
    pool: &PgPool,
    roots: Vec<CommentCreatorRow>,
) -> Result<Vec<CommentThread>, sqlx::Error> {
    if roots.is_empty() {
        return Ok(Vec::new());
    }

    let root_ids: Vec<Uuid> = roots.iter().map(|row| row.id).collect();
    let replies = sqlx::query_as::<_, CommentCreatorRow>(&format!(
        r#"
        {}
        WHERE c.parent_comment_id = ANY($1)
        ORDER BY c.created_at ASC, c.id
        "#,
        JOINED_SELECT
    ))
    .bind(&root_ids)
    .fetch_all(pool)
    .await?;

    let mut by_parent: HashMap<Uuid, Vec<CommentWithCreator>> = HashMap::new();
    for reply in replies {
        if let Some(parent_id) = reply.parent_comment_id {
            by_parent.entry(parent_id).or_default().push(reply.into());
        }
    }

    Ok(roots
        .into_iter()
        .map(|row| {
            let CommentWithCreator { comment, creator } = CommentWithCreator::from(row);
            let replies = by_parent.remove(&comment.id).unwrap_or_default();
            CommentThread {
                comment,
                creator,
                replies,
            }
        })
        .collect())
}
