/// Comment, reply and vote handlers
use actix_web::{web, HttpRequest, HttpResponse};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{extract_user_id, status_ok};
use crate::domain::{Pagination, VoteType};
use crate::error::ServiceResult;
use crate::repository::CommunityStore;
use crate::services::CommunityService;

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentRequest {
    pub video_id: Uuid,
    #[validate(length(min = 1, max = 9999))]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EditCommentRequest {
    pub comment_id: Uuid,
    #[validate(length(min = 1, max = 9999))]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ReplyRequest {
    pub video_id: Uuid,
    pub parent_comment_id: Uuid,
    #[validate(length(min = 1, max = 9999))]
    pub comment: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VoteRequest {
    pub video_id: Uuid,
    pub comment_id: Uuid,
    pub vote_type: VoteType,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PaginationQuery {
    #[validate(range(min = 1))]
    pub page: u32,
    #[validate(range(min = 1, max = 100))]
    pub per_page: u32,
}

/// GET /api/v1/community/comments/{video_id}?page=&perPage=
pub async fn get_comments<S: CommunityStore>(
    service: web::Data<CommunityService<S>>,
    path: web::Path<Uuid>,
    query: web::Query<PaginationQuery>,
) -> ServiceResult<HttpResponse> {
    query.validate()?;
    let threads = service
        .get_comments(
            path.into_inner(),
            Pagination::new(query.page, query.per_page),
        )
        .await?;

    Ok(HttpResponse::Ok().json(threads))
}

/// POST /api/v1/community/comments
pub async fn add_comment<S: CommunityStore>(
    req: HttpRequest,
    service: web::Data<CommunityService<S>>,
    payload: web::Json<AddCommentRequest>,
) -> ServiceResult<HttpResponse> {
    let actor_id = extract_user_id(&req)?;
    payload.validate()?;

    let AddCommentRequest { video_id, comment } = payload.into_inner();
    service.add_comment(video_id, comment, actor_id).await?;
    Ok(status_ok())
}

/// PUT /api/v1/community/comments
pub async fn edit_comment<S: CommunityStore>(
    req: HttpRequest,
    service: web::Data<CommunityService<S>>,
    payload: web::Json<EditCommentRequest>,
) -> ServiceResult<HttpResponse> {
    let actor_id = extract_user_id(&req)?;
    payload.validate()?;

    let EditCommentRequest {
        comment_id,
        comment,
    } = payload.into_inner();
    service.edit_comment(comment_id, comment, actor_id).await?;
    Ok(status_ok())
}

/// DELETE /api/v1/community/comments/{comment_id}
pub async fn delete_comment<S: CommunityStore>(
    req: HttpRequest,
    service: web::Data<CommunityService<S>>,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let actor_id = extract_user_id(&req)?;
    service.delete_comment(path.into_inner(), actor_id).await?;
    Ok(status_ok())
}

/// POST /api/v1/community/comments/replies
pub async fn reply<S: CommunityStore>(
    req: HttpRequest,
    service: web::Data<CommunityService<S>>,
    payload: web::Json<ReplyRequest>,
) -> ServiceResult<HttpResponse> {
    let actor_id = extract_user_id(&req)?;
    payload.validate()?;

    let ReplyRequest {
        video_id,
        parent_comment_id,
        comment,
    } = payload.into_inner();
    service
        .reply(video_id, parent_comment_id, comment, actor_id)
        .await?;
    Ok(status_ok())
}

/// POST /api/v1/community/comments/votes
pub async fn vote<S: CommunityStore>(
    req: HttpRequest,
    service: web::Data<CommunityService<S>>,
    payload: web::Json<VoteRequest>,
) -> ServiceResult<HttpResponse> {
    let actor_id = extract_user_id(&req)?;

    let VoteRequest {
        video_id,
        comment_id,
        vote_type,
    } = payload.into_inner();
    service
        .vote(video_id, comment_id, vote_type, actor_id)
        .await?;
    Ok(status_ok())
}

/// GET /api/v1/community/comments/votes/{video_id}
pub async fn get_votes<S: CommunityStore>(
    req: HttpRequest,
    service: web::Data<CommunityService<S>>,
    path: web::Path<Uuid>,
) -> ServiceResult<HttpResponse> {
    let actor_id = extract_user_id(&req)?;
    let votes = service.get_votes(path.into_inner(), actor_id).await?;
    Ok(HttpResponse::Ok().json(votes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_comment_length_bounds() {
        let mut request = AddCommentRequest {
            video_id: Uuid::new_v4(),
            comment: String::new(),
        };
        assert!(request.validate().is_err());

        request.comment = "a".repeat(9999);
        assert!(request.validate().is_ok());

        request.comment.push('a');
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_pagination_query_bounds() {
        let ok = PaginationQuery {
            page: 1,
            per_page: 100,
        };
        assert!(ok.validate().is_ok());

        let zero_page = PaginationQuery {
            page: 0,
            per_page: 10,
        };
        assert!(zero_page.validate().is_err());

        let too_many = PaginationQuery {
            page: 1,
            per_page: 101,
        };
        assert!(too_many.validate().is_err());
    }

    #[test]
    fn test_vote_request_rejects_unknown_type() {
        let raw = serde_json::json!({
            "videoId": Uuid::new_v4(),
            "commentId": Uuid::new_v4(),
            "voteType": "Love",
        });
        assert!(serde_json::from_value::<VoteRequest>(raw).is_err());

        let raw = serde_json::json!({
            "videoId": Uuid::new_v4(),
            "commentId": Uuid::new_v4(),
            "voteType": "None",
        });
        let request: VoteRequest = serde_json::from_value(raw).unwrap();
        assert_eq!(request.vote_type, VoteType::None);
    }
}
