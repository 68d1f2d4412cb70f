use rusqlite::{params, OptionalExtension};

use crate::db::models::Account;
use crate::error::{AppError, AppResult};
use crate::state::DbPool;

fn account_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Account> {
    Ok(Account {
        id: row.get(0)?,
        name: row.get(1)?,
        email: row.get(2)?,
        password_hash: row.get(3)?,
        author_id: row.get(4)?,
        profile_image: row.get(5)?,
        created_at: row.get(6)?,
    })
}

const ACCOUNT_COLUMNS: &str =
    "id, name, email, password_hash, author_id, profile_image, created_at";

/// Register a new account. The email must not already belong to an account
/// (compared case-sensitively); the password is stored only as a bcrypt hash.
pub fn register(pool: &DbPool, name: &str, email: &str, password: &str) -> AppResult<Account> {
    let conn = pool.get()?;

    let id = uuid::Uuid::now_v7().to_string();
    let author_id = uuid::Uuid::now_v7().simple().to_string();
    let password_hash = bcrypt::hash(password, bcrypt::DEFAULT_COST)?;

    // Concurrent signups race past any pre-check; the UNIQUE index on
    // email is the arbiter.
    if let Err(e) = conn.execute(
        "INSERT INTO accounts (id, name, email, password_hash, author_id) \
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![id, name, email, password_hash, author_id],
    ) {
        if let rusqlite::Error::SqliteFailure(f, _) = &e {
            if f.code == rusqlite::ErrorCode::ConstraintViolation {
                return Err(AppError::DuplicateAccount);
            }
        }
        return Err(e.into());
    }
    drop(conn);

    tracing::info!("Registered account {} ({})", name, id);
    find_by_id(pool, &id)
}

/// Look up an account by email and verify the password against the stored
/// bcrypt hash. Both an unknown email and a wrong password come back as
/// `InvalidCredentials`.
pub fn authenticate(pool: &DbPool, email: &str, password: &str) -> AppResult<Account> {
    let conn = pool.get()?;

    let account: Option<Account> = conn
        .query_row(
            &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE email = ?1"),
            params![email],
            account_from_row,
        )
        .optional()?;

    let account = account.ok_or(AppError::InvalidCredentials)?;
    if !bcrypt::verify(password, &account.password_hash)? {
        return Err(AppError::InvalidCredentials);
    }

    Ok(account)
}

pub fn find_by_id(pool: &DbPool, id: &str) -> AppResult<Account> {
    let conn = pool.get()?;
    conn.query_row(
        &format!("SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = ?1"),
        params![id],
        account_from_row,
    )
    .optional()?
    .ok_or(AppError::NotFound)
}

/// Update the mutable profile fields. Name and email are overwritten
/// unconditionally; the image is only touched when a new one was uploaded.
pub fn update_profile(
    pool: &DbPool,
    account_id: &str,
    name: &str,
    email: &str,
    profile_image: Option<&str>,
) -> AppResult<()> {
    let conn = pool.get()?;
    conn.execute(
        "UPDATE accounts SET name = ?1, email = ?2 WHERE id = ?3",
        params![name, email, account_id],
    )?;
    if let Some(data) = profile_image {
        conn.execute(
            "UPDATE accounts SET profile_image = ?1 WHERE id = ?2",
            params![data, account_id],
        )?;
    }
    Ok(())
}

/// Delete every account and post carrying this author token. Posts go
/// first so their images and comments cascade before the account rows do.
pub fn delete_by_author(pool: &DbPool, author_id: &str) -> AppResult<()> {
    let conn = pool.get()?;
    let posts = conn.execute("DELETE FROM posts WHERE author_id = ?1", params![author_id])?;
    let accounts = conn.execute(
        "DELETE FROM accounts WHERE author_id = ?1",
        params![author_id],
    )?;
    tracing::info!(
        "Deleted {} account(s) and {} post(s) for author {}",
        accounts,
        posts,
        author_id
    );
    Ok(())
}
