use sqlx::PgExecutor;
use uuid::Uuid;

use crate::domain::{Vote, VoteType};

pub async fn find_type<'e, E: PgExecutor<'e>>(
    executor: E,
    creator_id: Uuid,
    comment_id: Uuid,
) -> Result<Option<VoteType>, sqlx::Error> {
    sqlx::query_scalar::<_, VoteType>(
        r#"
        SELECT vote_type
        FROM video_comment_votes
        WHERE creator_id = $1 AND video_comment_id = $2
        "#,
    )
    .bind(creator_id)
    .bind(comment_id)
    .fetch_optional(executor)
    .await
}

pub async fn upsert<'e, E: PgExecutor<'e>>(executor: E, vote: &Vote) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO video_comment_votes (creator_id, video_comment_id, video_id, vote_type)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (creator_id, video_comment_id) DO UPDATE
        SET vote_type = EXCLUDED.vote_type,
            updated_at = NOW()
        "#,
    )
    .bind(vote.creator_id)
    .bind(vote.video_comment_id)
    .bind(vote.video_id)
    .bind(vote.vote_type)
    .execute(executor)
    .await?;

    Ok(())
}

pub async fn list_for_video<'e, E: PgExecutor<'e>>(
    executor: E,
    video_id: Uuid,
    creator_id: Uuid,
) -> Result<Vec<Vote>, sqlx::Error> {
    sqlx::query_as::<_, Vote>(
        r#"
        SELECT creator_id, video_comment_id, video_id, vote_type
        FROM video_comment_votes
        WHERE video_id = $1 AND creator_id = $2
        ORDER BY updated_at DESC
        "#,
    )
    .bind(video_id)
    .bind(creator_id)
    .fetch_all(executor)
    .await
}
