use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    pub id: String,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    /// Generated token distinct from the primary key; scopes post ownership.
    pub author_id: String,
    pub profile_image: Option<String>,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: String,
    pub account_id: String,
    pub token: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Post {
    pub id: String,
    /// Display name as submitted with the post, not joined from accounts.
    pub author: String,
    pub author_id: String,
    pub title: String,
    pub body: String,
    pub category: Option<String>,
    pub likes: i64,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostImage {
    pub id: String,
    pub post_id: String,
    pub name: Option<String>,
    pub filename: Option<String>,
    /// Base64-encoded upload bytes; text-safe for inline rendering.
    pub data: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Comment {
    pub id: String,
    pub post_id: String,
    pub account_id: String,
    pub body: String,
    pub likes: i64,
    pub created_at: String,
}
