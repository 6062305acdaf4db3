use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Forum lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum ForumStatus {
    Registered,
    Unregistered,
}

impl ForumStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Registered => "Registered",
            Self::Unregistered => "Unregistered",
        }
    }
}

/// Vote type stored per (creator, comment) pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar")]
pub enum VoteType {
    None,
    Like,
    Dislike,
}

impl VoteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::None => "None",
            Self::Like => "Like",
            Self::Dislike => "Dislike",
        }
    }
}

impl std::str::FromStr for VoteType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "None" => Ok(Self::None),
            "Like" => Ok(Self::Like),
            "Dislike" => Ok(Self::Dislike),
            other => Err(format!("unknown vote type: {}", other)),
        }
    }
}

/// Video forum - gates whether comments are accepted for a video
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Forum {
    pub video_id: Uuid,
    pub creator_id: Uuid,
    pub status: ForumStatus,
    pub allowed_to_comment: bool,
    pub video_comments_count: i64,
    pub root_video_comments_count: i64,
    pub created_at: DateTime<Utc>,
}

impl Forum {
    pub fn accepts_writes(&self) -> bool {
        self.status == ForumStatus::Registered && self.allowed_to_comment
    }
}

/// Forum counters as read back after an atomic increment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ForumCounters {
    pub video_comments_count: i64,
    pub root_video_comments_count: i64,
}

/// Creator profile projection (owned by the identity domain)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Creator {
    pub id: Uuid,
    pub display_name: String,
    pub nickname: String,
    pub thumbnail_url: String,
}

/// Comment entity - a root comment or a one-level reply
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: Uuid,
    pub video_id: Uuid,
    pub creator_id: Uuid,
    pub parent_comment_id: Option<Uuid>,
    /// Serialized as `comment`, the name clients send it under
    #[serde(rename = "comment")]
    pub text: String,
    pub likes_count: i64,
    pub dislikes_count: i64,
    pub replies_count: i64,
    pub created_at: DateTime<Utc>,
    pub edited_at: Option<DateTime<Utc>>,
}

impl Comment {
    pub fn is_root(&self) -> bool {
        self.parent_comment_id.is_none()
    }
}

/// Input for inserting a comment row
#[derive(Debug, Clone)]
pub struct NewComment {
    pub video_id: Uuid,
    pub creator_id: Uuid,
    pub parent_comment_id: Option<Uuid>,
    pub text: String,
}

/// Vote entity - at most one per (creator, comment)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub creator_id: Uuid,
    pub video_comment_id: Uuid,
    pub video_id: Uuid,
    pub vote_type: VoteType,
}

/// Comment joined with its author
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentWithCreator {
    #[serde(flatten)]
    pub comment: Comment,
    pub creator: Creator,
}

/// Root comment with its author and replies
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentThread {
    #[serde(flatten)]
    pub comment: Comment,
    pub creator: Creator,
    pub replies: Vec<CommentWithCreator>,
}

/// Offset pagination; `page` is 1-based
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: u32,
    pub per_page: u32,
}

impl Pagination {
    pub const MAX_PER_PAGE: u32 = 100;

    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.clamp(1, Self::MAX_PER_PAGE),
        }
    }

    pub fn limit(&self) -> i64 {
        self.per_page as i64
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.per_page as i64
    }
}

/// Comment ids an actor has liked and disliked under one video
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserVotes {
    pub liked_comment_ids: Vec<Uuid>,
    pub disliked_comment_ids: Vec<Uuid>,
}

impl UserVotes {
    pub fn from_votes(votes: impl IntoIterator<Item = Vote>) -> Self {
        let mut result = Self::default();
        for vote in votes {
            match vote.vote_type {
                VoteType::Like => result.liked_comment_ids.push(vote.video_comment_id),
                VoteType::Dislike => result.disliked_comment_ids.push(vote.video_comment_id),
                VoteType::None => {}
            }
        }
        result
    }
}

/// Aggregate view of a video forum for one (optional) viewer
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForumView {
    pub comments_count: i64,
    pub root_comments_count: i64,
    #[serde(flatten)]
    pub votes: UserVotes,
    #[serde(rename = "Comments")]
    pub comments: Vec<CommentThread>,
    #[serde(rename = "UserComments")]
    pub user_comments: Vec<CommentThread>,
}
