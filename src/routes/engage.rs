use askama::Template;
use axum::extract::{Path, Query, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use rusqlite::{params, Connection};
use serde::Deserialize;

use crate::error::{AppError, AppResult};
use crate::extractors::CurrentAccount;
use crate::routes::home::Html;
use crate::routes::posts::{find_post, images_for_post, list_all_posts, PostView};
use crate::state::AppState;

// --- View structs ---

pub struct CommentView {
    pub author: String,
    pub body: String,
    pub created_at: String,
}

pub struct TrendingEntry {
    pub post: PostView,
    pub images: Vec<String>,
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/trending.html")]
pub struct TrendingTemplate {
    pub entries: Vec<TrendingEntry>,
    pub sent: bool,
}

#[derive(Template)]
#[template(path = "pages/readmore.html")]
pub struct ReadmoreTemplate {
    pub post: PostView,
    pub images: Vec<String>,
    pub comments: Vec<CommentView>,
    pub total_comments: usize,
}

// --- Forms ---

#[derive(Deserialize)]
pub struct CommentForm {
    pub content: String,
}

#[derive(Deserialize)]
pub struct TrendingQuery {
    pub sent: Option<u8>,
}

// --- Handlers ---

/// GET /like_post/{post_id} — bump the like counter by one. No auth and no
/// per-client deduplication: repeated requests keep incrementing.
pub async fn like_post(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let updated = increment_likes(&conn, &post_id)?;
    if updated == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Redirect::to(&format!("/readmore/{}", post_id)).into_response())
}

/// GET /trending — every post in the same order as /posts, with decoded
/// image payloads for inline rendering.
pub async fn trending(
    State(state): State<AppState>,
    Query(query): Query<TrendingQuery>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let entries = trending_entries(&conn)?
        .into_iter()
        .map(|(post, images)| TrendingEntry {
            post: post.into(),
            images,
        })
        .collect();

    Ok(Html(TrendingTemplate {
        entries,
        sent: query.sent.is_some(),
    })
    .into_response())
}

/// GET,POST /readmore/{post_id} — one post with its images and comments.
pub async fn readmore(
    State(state): State<AppState>,
    Path(post_id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let (post, images, comments) = post_detail(&conn, &post_id)?;
    let total_comments = comments.len();

    Ok(Html(ReadmoreTemplate {
        post: post.into(),
        images,
        comments,
        total_comments,
    })
    .into_response())
}

/// POST /comment/{blog_id} — attach a comment to a post. The post's
/// existence is not pre-checked; a missing post surfaces as a foreign-key
/// violation from the store.
pub async fn add_comment(
    State(state): State<AppState>,
    account: CurrentAccount,
    Path(blog_id): Path<String>,
    Form(form): Form<CommentForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    insert_comment(&conn, &blog_id, &account.id, &form.content)?;
    Ok(Redirect::to(&format!("/readmore/{}", blog_id)).into_response())
}

// --- Query helpers ---

/// One post with its decoded images and comments; `NotFound` on a miss.
pub fn post_detail(
    conn: &Connection,
    post_id: &str,
) -> Result<(crate::db::models::Post, Vec<String>, Vec<CommentView>), AppError> {
    let post = find_post(conn, post_id)?.ok_or(AppError::NotFound)?;
    let images = images_for_post(conn, post_id)?;
    let comments = comments_for_post(conn, post_id)?;
    Ok((post, images, comments))
}

/// Every post in creation order, paired with its decoded image payloads.
/// Deliberately shares its ordering with the plain posts listing.
pub fn trending_entries(
    conn: &Connection,
) -> Result<Vec<(crate::db::models::Post, Vec<String>)>, AppError> {
    let mut entries = Vec::new();
    for post in list_all_posts(conn)? {
        let images = images_for_post(conn, &post.id)?;
        entries.push((post, images));
    }
    Ok(entries)
}

pub fn increment_likes(conn: &Connection, post_id: &str) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE posts SET likes = likes + 1 WHERE id = ?1",
        params![post_id],
    )
}

pub fn insert_comment(
    conn: &Connection,
    post_id: &str,
    account_id: &str,
    body: &str,
) -> rusqlite::Result<String> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO comments (id, post_id, account_id, body) VALUES (?1, ?2, ?3, ?4)",
        params![id, post_id, account_id, body],
    )?;
    Ok(id)
}

pub fn comments_for_post(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<CommentView>> {
    let mut stmt = conn.prepare(
        "SELECT a.name, c.body, c.created_at \
         FROM comments c \
         JOIN accounts a ON a.id = c.account_id \
         WHERE c.post_id = ?1 \
         ORDER BY c.created_at ASC, c.id ASC",
    )?;
    let comments = stmt
        .query_map(params![post_id], |row| {
            let created_at: String = row.get(2)?;
            Ok(CommentView {
                author: row.get(0)?,
                body: row.get(1)?,
                created_at: crate::routes::posts::format_db_time(&created_at),
            })
        })?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(comments)
}
