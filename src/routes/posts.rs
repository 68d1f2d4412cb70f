use askama::Template;
use axum::extract::{Multipart, Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;

use crate::auth::accounts;
use crate::db::models::Post;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentAccount;
use crate::routes::home::Html;
use crate::state::AppState;
use crate::uploads;

// --- View structs ---

pub struct PostView {
    pub id: String,
    pub author: String,
    pub title: String,
    pub body: String,
    pub category: String,
    pub likes: i64,
    pub created_at: String,
}

impl From<Post> for PostView {
    fn from(post: Post) -> Self {
        PostView {
            id: post.id,
            author: post.author,
            title: post.title,
            body: post.body,
            category: post.category.unwrap_or_default(),
            likes: post.likes,
            created_at: format_db_time(&post.created_at),
        }
    }
}

/// Render a SQLite `datetime('now')` string for display. Unparseable input
/// is passed through untouched.
pub fn format_db_time(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, "%Y-%m-%d %H:%M:%S")
        .map(|dt| dt.format("%b %-d, %Y %H:%M").to_string())
        .unwrap_or_else(|_| db_time.to_string())
}

// --- Templates ---

#[derive(Template)]
#[template(path = "pages/posts.html")]
pub struct PostsTemplate {
    pub posts: Vec<PostView>,
}

#[derive(Template)]
#[template(path = "pages/new_post.html")]
pub struct NewPostTemplate {
    pub account_id: String,
    pub author_name: String,
}

#[derive(Template)]
#[template(path = "pages/edit_post.html")]
pub struct EditPostTemplate {
    pub post: PostView,
}

// --- Forms ---

#[derive(Deserialize)]
pub struct EditPostForm {
    pub title: String,
    pub author: String,
    pub content: String,
}

// --- Handlers ---

/// GET /posts — all posts, oldest first.
pub async fn list_posts(
    State(state): State<AppState>,
    _account: CurrentAccount,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let posts = list_all_posts(&conn)?.into_iter().map(Into::into).collect();
    Ok(Html(PostsTemplate { posts }).into_response())
}

/// GET /user_posts/{author_id} — one author's posts.
pub async fn list_user_posts(
    State(state): State<AppState>,
    _account: CurrentAccount,
    Path(author_id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let posts = list_posts_by_author(&conn, &author_id)?
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(Html(PostsTemplate { posts }).into_response())
}

/// GET /posts/new/{account_id} — render the authoring form for an account.
pub async fn new_post_page(
    State(state): State<AppState>,
    _account: CurrentAccount,
    Path(account_id): Path<String>,
) -> AppResult<Response> {
    let target = accounts::find_by_id(&state.db, &account_id)?;
    Ok(Html(NewPostTemplate {
        account_id: target.id,
        author_name: target.name,
    })
    .into_response())
}

/// POST /posts/new/{account_id} — create a post owned by the account's
/// author token, with an optional image attachment.
pub async fn new_post_submit(
    State(state): State<AppState>,
    _account: CurrentAccount,
    Path(account_id): Path<String>,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let target = accounts::find_by_id(&state.db, &account_id)?;

    let mut title = String::new();
    let mut author = String::new();
    let mut content = String::new();
    let mut category = String::new();
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("title") => title = field.text().await?,
            Some("author") => author = field.text().await?,
            Some("content") => content = field.text().await?,
            Some("category") => category = field.text().await?,
            Some("image_file") => {
                let filename = field.file_name().map(str::to_string);
                let bytes = field.bytes().await?;
                if let Some(filename) = filename {
                    if !filename.is_empty() && !bytes.is_empty() {
                        upload = Some((filename, bytes.to_vec()));
                    }
                }
            }
            _ => {}
        }
    }

    let conn = state.db.get()?;
    let post_id = insert_post(&conn, &author, &target.author_id, &title, &content, &category)?;

    // Only attach the upload when the filename passes the extension
    // whitelist; anything else leaves the post imageless.
    if let Some((filename, bytes)) = upload {
        if let Some(encoded) =
            uploads::process_upload(state.config.uploads_path(), &filename, &bytes)?
        {
            attach_image(&conn, &post_id, &filename, &filename, &encoded)?;
        }
    }

    Ok(Redirect::to(&format!("/user_posts/{}", target.author_id)).into_response())
}

/// GET /posts/editpost/{id} — render the edit form.
pub async fn edit_post_page(
    State(state): State<AppState>,
    _account: CurrentAccount,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let post = find_post(&conn, &id)?.ok_or(AppError::NotFound)?;
    Ok(Html(EditPostTemplate { post: post.into() }).into_response())
}

/// POST /posts/editpost/{id} — update title/author/body in place.
/// Any signed-in account may edit any post; ownership is not checked.
pub async fn edit_post_submit(
    State(state): State<AppState>,
    _account: CurrentAccount,
    Path(id): Path<String>,
    axum::Form(form): axum::Form<EditPostForm>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let updated = update_post(&conn, &id, &form.title, &form.author, &form.content)?;
    if updated == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Redirect::to("/posts").into_response())
}

/// GET /posts/delete/{id} — remove a post. Ownership is not checked.
pub async fn delete_post_route(
    State(state): State<AppState>,
    _account: CurrentAccount,
    Path(id): Path<String>,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let deleted = delete_post(&conn, &id)?;
    if deleted == 0 {
        return Err(AppError::NotFound);
    }
    Ok(Redirect::to("/posts").into_response())
}

// --- Query helpers ---

fn post_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Post> {
    Ok(Post {
        id: row.get(0)?,
        author: row.get(1)?,
        author_id: row.get(2)?,
        title: row.get(3)?,
        body: row.get(4)?,
        category: row.get(5)?,
        likes: row.get(6)?,
        created_at: row.get(7)?,
    })
}

const POST_COLUMNS: &str = "id, author, author_id, title, body, category, likes, created_at";

pub fn insert_post(
    conn: &Connection,
    author: &str,
    author_id: &str,
    title: &str,
    body: &str,
    category: &str,
) -> rusqlite::Result<String> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO posts (id, author, author_id, title, body, category) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![id, author, author_id, title, body, category],
    )?;
    Ok(id)
}

pub fn find_post(conn: &Connection, id: &str) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("SELECT {POST_COLUMNS} FROM posts WHERE id = ?1"),
        params![id],
        post_from_row,
    )
    .optional()
}

/// All posts, creation order. Trending intentionally shares this ordering,
/// so both listings must go through this query.
pub fn list_all_posts(conn: &Connection) -> rusqlite::Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS} FROM posts ORDER BY created_at ASC, id ASC"
    ))?;
    let posts = stmt
        .query_map([], post_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(posts)
}

pub fn list_posts_by_author(conn: &Connection, author_id: &str) -> rusqlite::Result<Vec<Post>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {POST_COLUMNS} FROM posts WHERE author_id = ?1"
    ))?;
    let posts = stmt
        .query_map(params![author_id], post_from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(posts)
}

pub fn update_post(
    conn: &Connection,
    id: &str,
    title: &str,
    author: &str,
    body: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE posts SET title = ?1, author = ?2, body = ?3 WHERE id = ?4",
        params![title, author, body, id],
    )
}

pub fn delete_post(conn: &Connection, id: &str) -> rusqlite::Result<usize> {
    conn.execute("DELETE FROM posts WHERE id = ?1", params![id])
}

pub fn attach_image(
    conn: &Connection,
    post_id: &str,
    name: &str,
    filename: &str,
    data: &str,
) -> rusqlite::Result<String> {
    let id = uuid::Uuid::now_v7().to_string();
    conn.execute(
        "INSERT INTO post_images (id, post_id, name, filename, data) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, post_id, name, filename, data],
    )?;
    Ok(id)
}

/// Base64 payloads of a post's images, ready for inline rendering.
pub fn images_for_post(conn: &Connection, post_id: &str) -> rusqlite::Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT data FROM post_images WHERE post_id = ?1 ORDER BY id")?;
    let images = stmt
        .query_map(params![post_id], |row| row.get(0))?
        .collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(images)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use r2d2::Pool;
    use r2d2_sqlite::SqliteConnectionManager;

    fn test_pool() -> crate::state::DbPool {
        let manager = SqliteConnectionManager::memory()
            .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys = ON;"));
        let pool = Pool::builder().max_size(1).build(manager).unwrap();
        db::run_migrations(&pool).unwrap();
        pool
    }

    #[test]
    fn insert_and_find_post() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = insert_post(&conn, "alice", "tok-1", "Title", "Body", "life").unwrap();

        let post = find_post(&conn, &id).unwrap().unwrap();
        assert_eq!(post.author, "alice");
        assert_eq!(post.author_id, "tok-1");
        assert_eq!(post.title, "Title");
        assert_eq!(post.likes, 0);
    }

    #[test]
    fn find_post_missing_returns_none() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        assert!(find_post(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn list_by_author_filters() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        insert_post(&conn, "alice", "tok-1", "A", "a", "").unwrap();
        insert_post(&conn, "bob", "tok-2", "B", "b", "").unwrap();
        insert_post(&conn, "alice", "tok-1", "C", "c", "").unwrap();

        let mine = list_posts_by_author(&conn, "tok-1").unwrap();
        assert_eq!(mine.len(), 2);
        assert!(mine.iter().all(|p| p.author_id == "tok-1"));

        let nobody = list_posts_by_author(&conn, "tok-9").unwrap();
        assert!(nobody.is_empty());
    }

    #[test]
    fn list_all_is_creation_ordered() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let first = insert_post(&conn, "a", "t", "first", "x", "").unwrap();
        let second = insert_post(&conn, "a", "t", "second", "x", "").unwrap();
        let third = insert_post(&conn, "a", "t", "third", "x", "").unwrap();

        // Spread the timestamps out; inserts above land in the same second
        for (id, ts) in [
            (&first, "2025-01-01 10:00:00"),
            (&second, "2025-01-02 10:00:00"),
            (&third, "2025-01-03 10:00:00"),
        ] {
            conn.execute(
                "UPDATE posts SET created_at = ?1 WHERE id = ?2",
                params![ts, id],
            )
            .unwrap();
        }

        let ids: Vec<String> = list_all_posts(&conn)
            .unwrap()
            .into_iter()
            .map(|p| p.id)
            .collect();
        assert_eq!(ids, vec![first, second, third]);
    }

    #[test]
    fn update_post_missing_touches_no_rows() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let updated = update_post(&conn, "nope", "t", "a", "b").unwrap();
        assert_eq!(updated, 0);
    }

    #[test]
    fn format_db_time_renders_sqlite_datetimes() {
        assert_eq!(format_db_time("2025-01-15 12:30:00"), "Jan 15, 2025 12:30");
    }

    #[test]
    fn format_db_time_passes_garbage_through() {
        assert_eq!(format_db_time("not-a-date"), "not-a-date");
    }

    #[test]
    fn attach_and_list_images() {
        let pool = test_pool();
        let conn = pool.get().unwrap();
        let id = insert_post(&conn, "alice", "tok-1", "T", "B", "").unwrap();
        attach_image(&conn, &id, "pic.png", "pic.png", "aGVsbG8=").unwrap();

        let images = images_for_post(&conn, &id).unwrap();
        assert_eq!(images, vec!["aGVsbG8=".to_string()]);
    }
}
