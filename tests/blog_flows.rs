use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use tempfile::TempDir;

use quill::auth::{accounts, session};
use quill::db;
use quill::error::AppError;
use quill::routes::{engage, posts};
use quill::state::DbPool;
use quill::uploads;

fn setup() -> (TempDir, DbPool) {
    let temp_dir = TempDir::new().unwrap();
    let db_path = temp_dir.path().join("test.db");
    let pool = db::create_pool(&db_path).expect("Failed to create test database");
    db::run_migrations(&pool).expect("Failed to run migrations");
    (temp_dir, pool)
}

#[test]
fn second_registration_with_same_email_fails() {
    let (_tmp, pool) = setup();

    accounts::register(&pool, "alice", "alice@example.com", "pw1").unwrap();
    let second = accounts::register(&pool, "impostor", "alice@example.com", "pw2");
    assert!(matches!(second, Err(AppError::DuplicateAccount)));

    let conn = pool.get().unwrap();
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM accounts WHERE email = 'alice@example.com'",
            [],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(count, 1, "exactly one account must survive the conflict");
}

#[test]
fn failed_login_establishes_no_session() {
    let (_tmp, pool) = setup();
    accounts::register(&pool, "alice", "alice@example.com", "correct").unwrap();

    let wrong_password = accounts::authenticate(&pool, "alice@example.com", "wrong");
    assert!(matches!(wrong_password, Err(AppError::InvalidCredentials)));

    let unknown_email = accounts::authenticate(&pool, "nobody@example.com", "correct");
    assert!(matches!(unknown_email, Err(AppError::InvalidCredentials)));

    let conn = pool.get().unwrap();
    let sessions: i64 = conn
        .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(sessions, 0);
}

#[test]
fn successful_login_flow_creates_usable_session() {
    let (_tmp, pool) = setup();
    let account = accounts::register(&pool, "alice", "alice@example.com", "pw").unwrap();

    let verified = accounts::authenticate(&pool, "alice@example.com", "pw").unwrap();
    assert_eq!(verified.id, account.id);

    let token = session::create_session(&pool, &account.id, 1).unwrap();

    let conn = pool.get().unwrap();
    let session_account: String = conn
        .query_row(
            "SELECT account_id FROM sessions WHERE token = ?1 AND expires_at > datetime('now')",
            rusqlite::params![token],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(session_account, account.id);

    session::delete_session(&pool, &token).unwrap();
    let remaining: i64 = conn
        .query_row("SELECT COUNT(*) FROM sessions", [], |r| r.get(0))
        .unwrap();
    assert_eq!(remaining, 0);
}

#[test]
fn sequential_likes_accumulate_exactly() {
    let (_tmp, pool) = setup();
    let conn = pool.get().unwrap();
    let post_id = posts::insert_post(&conn, "alice", "tok-1", "Title", "Body", "life").unwrap();

    let n = 7;
    for _ in 0..n {
        assert_eq!(engage::increment_likes(&conn, &post_id).unwrap(), 1);
    }

    let likes: i64 = conn
        .query_row(
            "SELECT likes FROM posts WHERE id = ?1",
            rusqlite::params![post_id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(likes, n);
}

#[test]
fn allowed_upload_produces_one_image_with_base64_payload() {
    let (tmp, pool) = setup();
    let uploads_dir = tmp.path().join("uploads");
    let conn = pool.get().unwrap();
    let post_id = posts::insert_post(&conn, "alice", "tok-1", "T", "B", "").unwrap();

    let bytes = b"\x89PNG\r\npretend image";
    let encoded = uploads::process_upload(&uploads_dir, "shot.PNG", bytes)
        .unwrap()
        .expect("allowed extension must be stored");
    posts::attach_image(&conn, &post_id, "shot.PNG", "shot.PNG", &encoded).unwrap();

    let images = posts::images_for_post(&conn, &post_id).unwrap();
    assert_eq!(images.len(), 1);
    assert_eq!(images[0], STANDARD.encode(bytes));
}

#[test]
fn disallowed_upload_leaves_post_imageless() {
    let (tmp, pool) = setup();
    let uploads_dir = tmp.path().join("uploads");
    let conn = pool.get().unwrap();
    let post_id = posts::insert_post(&conn, "alice", "tok-1", "T", "B", "").unwrap();

    let stored = uploads::process_upload(&uploads_dir, "payload.exe", b"MZ").unwrap();
    assert!(stored.is_none());

    let images = posts::images_for_post(&conn, &post_id).unwrap();
    assert!(images.is_empty());
}

#[test]
fn read_missing_post_is_not_found() {
    let (_tmp, pool) = setup();
    let conn = pool.get().unwrap();
    let result = engage::post_detail(&conn, "no-such-post");
    assert!(matches!(result, Err(AppError::NotFound)));
}

#[test]
fn trending_order_matches_posts_listing() {
    let (_tmp, pool) = setup();
    let conn = pool.get().unwrap();
    for i in 0..4 {
        posts::insert_post(&conn, "alice", "tok-1", &format!("post {i}"), "body", "").unwrap();
    }

    let listing: Vec<String> = posts::list_all_posts(&conn)
        .unwrap()
        .into_iter()
        .map(|p| p.id)
        .collect();
    let trending: Vec<String> = engage::trending_entries(&conn)
        .unwrap()
        .into_iter()
        .map(|(p, _)| p.id)
        .collect();

    assert_eq!(listing, trending);
}

#[test]
fn delete_account_removes_its_posts_and_cascades() {
    let (tmp, pool) = setup();
    let uploads_dir = tmp.path().join("uploads");
    let alice = accounts::register(&pool, "alice", "alice@example.com", "pw").unwrap();
    let bob = accounts::register(&pool, "bob", "bob@example.com", "pw").unwrap();

    let conn = pool.get().unwrap();
    let p1 = posts::insert_post(&conn, "alice", &alice.author_id, "A1", "x", "").unwrap();
    posts::insert_post(&conn, "alice", &alice.author_id, "A2", "x", "").unwrap();
    let keep = posts::insert_post(&conn, "bob", &bob.author_id, "B1", "x", "").unwrap();

    let encoded = uploads::process_upload(&uploads_dir, "pic.png", b"img")
        .unwrap()
        .unwrap();
    posts::attach_image(&conn, &p1, "pic.png", "pic.png", &encoded).unwrap();
    engage::insert_comment(&conn, &p1, &bob.id, "nice").unwrap();
    drop(conn);

    accounts::delete_by_author(&pool, &alice.author_id).unwrap();

    let conn = pool.get().unwrap();
    let alice_posts: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM posts WHERE author_id = ?1",
            rusqlite::params![alice.author_id],
            |r| r.get(0),
        )
        .unwrap();
    assert_eq!(alice_posts, 0);

    let accounts_left: i64 = conn
        .query_row("SELECT COUNT(*) FROM accounts", [], |r| r.get(0))
        .unwrap();
    assert_eq!(accounts_left, 1);

    // This store enforces cascading delete, so the orphans go too
    let images: i64 = conn
        .query_row("SELECT COUNT(*) FROM post_images", [], |r| r.get(0))
        .unwrap();
    let comments: i64 = conn
        .query_row("SELECT COUNT(*) FROM comments", [], |r| r.get(0))
        .unwrap();
    assert_eq!(images, 0);
    assert_eq!(comments, 0);

    // Bob's post is untouched
    assert!(posts::find_post(&conn, &keep).unwrap().is_some());
}

#[test]
fn edit_and_delete_post_by_id() {
    let (_tmp, pool) = setup();
    let conn = pool.get().unwrap();
    let id = posts::insert_post(&conn, "alice", "tok-1", "Old", "old body", "misc").unwrap();

    assert_eq!(posts::update_post(&conn, &id, "New", "alice", "new body").unwrap(), 1);
    let post = posts::find_post(&conn, &id).unwrap().unwrap();
    assert_eq!(post.title, "New");
    assert_eq!(post.body, "new body");
    // Category and likes are untouched by edits
    assert_eq!(post.category.as_deref(), Some("misc"));

    assert_eq!(posts::delete_post(&conn, &id).unwrap(), 1);
    assert!(posts::find_post(&conn, &id).unwrap().is_none());
}
