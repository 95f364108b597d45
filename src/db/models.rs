use chrono::NaiveDateTime;
use serde::Serialize;

/// Storage format for every timestamp column.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT).ok()
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    #[serde(skip)]
    pub password_hash: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub date_joined: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Photo {
    pub id: i64,
    /// File name inside the uploads directory
    pub path: String,
    pub description: String,
    pub created_at: String,
    pub owner_id: i64,
}

/// A photo joined with what the feed and detail pages show next to it.
#[derive(Debug, Clone, Serialize)]
pub struct PhotoSummary {
    pub photo: Photo,
    pub owner_username: String,
    pub like_count: i64,
    pub comment_count: i64,
    pub liked_by_viewer: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub created_at: String,
    pub photo_id: i64,
    pub author_id: i64,
    pub active: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct CommentWithAuthor {
    pub comment: Comment,
    pub author_username: String,
}
