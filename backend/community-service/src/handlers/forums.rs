/// Forum view handler
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::optional_user_id;
use crate::error::ServiceResult;
use crate::repository::CommunityStore;
use crate::services::CommunityService;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ForumViewQuery {
    #[validate(range(min = 1, max = 100))]
    pub per_page: u32,
}

/// GET /api/v1/community/{video_id}?perPage=
///
/// Anonymous viewers get counters and the first page only.
pub async fn get_forum_view<S: CommunityStore>(
    req: HttpRequest,
    service: web::Data<CommunityService<S>>,
    path: web::Path<Uuid>,
    query: web::Query<ForumViewQuery>,
) -> ServiceResult<HttpResponse> {
    let actor_id = optional_user_id(&req)?;
    query.validate()?;

    let view = service
        .get_forum_view(path.into_inner(), query.per_page, actor_id)
        .await?;
    Ok(HttpResponse::Ok().json(view))
}
