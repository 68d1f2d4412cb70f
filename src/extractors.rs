use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;
use rusqlite::params;

use crate::error::AppError;
use crate::state::AppState;

/// The authenticated account for this request, resolved from the session
/// cookie. Threaded explicitly through handlers instead of living in any
/// process-wide state.
#[derive(Debug, Clone)]
pub struct CurrentAccount {
    pub id: String,
    pub name: String,
    pub email: String,
    pub author_id: String,
    pub profile_image: Option<String>,
}

/// Extractor that requires authentication.
/// Redirects to /login (via `AppError::Unauthenticated`) when no valid
/// session is found.
impl FromRequestParts<AppState> for CurrentAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = extract_session_token(&parts.headers, &state.config.auth.cookie_name)
            .ok_or(AppError::Unauthenticated)?;

        let conn = state.db.get()?;
        conn.query_row(
            "SELECT a.id, a.name, a.email, a.author_id, a.profile_image \
             FROM sessions s \
             JOIN accounts a ON a.id = s.account_id \
             WHERE s.token = ?1 AND s.expires_at > datetime('now')",
            params![token],
            |row| {
                Ok(CurrentAccount {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    email: row.get(2)?,
                    author_id: row.get(3)?,
                    profile_image: row.get(4)?,
                })
            },
        )
        .map_err(|_| AppError::Unauthenticated)
    }
}

/// Optional account extractor — returns None instead of redirecting when
/// not authenticated. Used by public pages that adapt to a signed-in user.
pub struct MaybeAccount(pub Option<CurrentAccount>);

impl FromRequestParts<AppState> for MaybeAccount {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentAccount::from_request_parts(parts, state).await {
            Ok(account) => Ok(MaybeAccount(Some(account))),
            Err(_) => Ok(MaybeAccount(None)),
        }
    }
}

pub fn extract_session_token<'a>(
    headers: &'a axum::http::HeaderMap,
    cookie_name: &str,
) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == cookie_name {
                Some(val)
            } else {
                None
            }
        })
}
