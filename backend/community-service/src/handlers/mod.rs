/// HTTP handlers for the community API
pub mod comments;
pub mod forums;

use actix_web::{web, HttpRequest, HttpResponse};
use uuid::Uuid;

use crate::error::{ServiceError, ServiceResult};
use crate::repository::CommunityStore;

/// Header set by the gateway after authentication
pub const USER_ID_HEADER: &str = "x-user-id";

/// Body returned by every successful mutation
pub(crate) fn status_ok() -> HttpResponse {
    HttpResponse::Ok().json(serde_json::json!({ "status": true }))
}

/// Authenticated actor; missing or malformed header is `Unauthorized`
pub(crate) fn extract_user_id(req: &HttpRequest) -> ServiceResult<Uuid> {
    optional_user_id(req)?
        .ok_or_else(|| ServiceError::Unauthorized("Missing x-user-id header".into()))
}

/// Actor for endpoints that also serve anonymous viewers
pub(crate) fn optional_user_id(req: &HttpRequest) -> ServiceResult<Option<Uuid>> {
    let Some(header_value) = req.headers().get(USER_ID_HEADER) else {
        return Ok(None);
    };

    let value = header_value
        .to_str()
        .map_err(|_| ServiceError::Unauthorized("Invalid x-user-id header".into()))?;

    Uuid::parse_str(value)
        .map(Some)
        .map_err(|_| ServiceError::Unauthorized("Invalid x-user-id header value".into()))
}

/// Register routes under `/api/v1/community`
pub fn register_routes<S: CommunityStore>(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| {
        ServiceError::InvalidInput(err.to_string()).into()
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _| {
        ServiceError::InvalidInput(err.to_string()).into()
    }))
    .app_data(web::PathConfig::default().error_handler(|err, _| {
        ServiceError::InvalidInput(err.to_string()).into()
    }))
    .service(
        web::scope("/api/v1/community")
            .route("/comments", web::post().to(comments::add_comment::<S>))
            .route("/comments", web::put().to(comments::edit_comment::<S>))
            .route("/comments/replies", web::post().to(comments::reply::<S>))
            .route("/comments/votes", web::post().to(comments::vote::<S>))
            .route(
                "/comments/votes/{video_id}",
                web::get().to(comments::get_votes::<S>),
            )
            .route(
                "/comments/{video_id}",
                web::get().to(comments::get_comments::<S>),
            )
            .route(
                "/comments/{comment_id}",
                web::delete().to(comments::delete_comment::<S>),
            )
            .route("/{video_id}", web::get().to(forums::get_forum_view::<S>)),
    );
}
