use sqlx::PgExecutor;
use uuid::Uuid;

use crate::domain::Creator;

pub async fn find<'e, E: PgExecutor<'e>>(
    executor: E,
    creator_id: Uuid,
) -> Result<Option<Creator>, sqlx::Error> {
    sqlx::query_as::<_, Creator>(
        r#"
        SELECT id, display_name, nickname, thumbnail_url
        FROM creators
        WHERE id = $1
        "#,
    )
    .bind(creator_id)
    .fetch_optional(executor)
    .await
}

pub async fn upsert<'e, E: PgExecutor<'e>>(
    executor: E,
    creator: &Creator,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        INSERT INTO creators (id, display_name, nickname, thumbnail_url)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (id) DO UPDATE
        SET display_name = EXCLUDED.display_name,
            nickname = EXCLUDED.nickname,
            thumbnail_url = EXCLUDED.thumbnail_url,
            updated_at = NOW()
        "#,
    )
    .bind(creator.id)
    .bind(&creator.display_name)
    .bind(&creator.nickname)
    .bind(&creator.thumbnail_url)
    .execute(executor)
    .await?;

    Ok(())
}
