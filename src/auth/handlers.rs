use askama::Template;
use axum::extract::{Path, Query, State};
use axum::http::{header, HeaderMap};
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::auth::{accounts, session};
use crate::error::AppResult;
use crate::extractors::{extract_session_token, CurrentAccount};
use crate::routes::home::Html;
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub failed: bool,
}

#[derive(Template)]
#[template(path = "pages/signup.html")]
pub struct SignupTemplate {
    pub exists: bool,
}

// -- Forms --

#[derive(Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct SignupForm {
    pub username: String,
    pub email: String,
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginPageQuery {
    pub failed: Option<u8>,
}

#[derive(Deserialize)]
pub struct SignupPageQuery {
    pub exists: Option<u8>,
}

// -- Cookie helpers --

fn session_cookie(cookie_name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        cookie_name, token, max_age_secs
    )
}

fn clear_session_cookie(cookie_name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", cookie_name)
}

// -- Handlers --

/// GET /login — render the login form, with a generic failure message when
/// the browser was bounced back here.
pub async fn login_page(Query(query): Query<LoginPageQuery>) -> AppResult<Response> {
    Ok(Html(LoginTemplate {
        failed: query.failed.is_some(),
    })
    .into_response())
}

/// POST /login — verify credentials and establish a session.
pub async fn login_submit(
    State(state): State<AppState>,
    Form(form): Form<LoginForm>,
) -> AppResult<Response> {
    let account = accounts::authenticate(&state.db, &form.email, &form.password)?;
    let token = session::create_session(&state.db, &account.id, state.config.auth.session_hours)?;

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            session_cookie(
                &state.config.auth.cookie_name,
                &token,
                state.config.auth.session_hours,
            ),
        )]),
        Redirect::to("/profile"),
    )
        .into_response())
}

/// GET /signup — render the registration form.
pub async fn signup_page(Query(query): Query<SignupPageQuery>) -> AppResult<Response> {
    Ok(Html(SignupTemplate {
        exists: query.exists.is_some(),
    })
    .into_response())
}

/// POST /signup — register an account and sign it in straight away.
pub async fn signup_submit(
    State(state): State<AppState>,
    Form(form): Form<SignupForm>,
) -> AppResult<Response> {
    let account = accounts::register(&state.db, &form.username, &form.email, &form.password)?;
    let token = session::create_session(&state.db, &account.id, state.config.auth.session_hours)?;

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            session_cookie(
                &state.config.auth.cookie_name,
                &token,
                state.config.auth.session_hours,
            ),
        )]),
        Redirect::to("/profile"),
    )
        .into_response())
}

/// GET /logout — tear down the current session unconditionally.
pub async fn logout(
    State(state): State<AppState>,
    _account: CurrentAccount,
    headers: HeaderMap,
) -> AppResult<Response> {
    if let Some(token) = extract_session_token(&headers, &state.config.auth.cookie_name) {
        session::delete_session(&state.db, token)?;
    }

    Ok((
        AppendHeaders([(
            header::SET_COOKIE,
            clear_session_cookie(&state.config.auth.cookie_name),
        )]),
        Redirect::to("/"),
    )
        .into_response())
}

/// GET /delete_user/{author_id} — remove the accounts and posts carrying
/// this author token. Any signed-in account may invoke this; there is no
/// check that the session owns the token.
pub async fn delete_user(
    State(state): State<AppState>,
    _account: CurrentAccount,
    Path(author_id): Path<String>,
) -> AppResult<Response> {
    accounts::delete_by_author(&state.db, &author_id)?;
    Ok(Redirect::to("/").into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_sets_max_age_in_seconds() {
        let cookie = session_cookie("quill_session", "tok", 2);
        assert!(cookie.starts_with("quill_session=tok;"));
        assert!(cookie.contains("Max-Age=7200"));
        assert!(cookie.contains("HttpOnly"));
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        let cookie = clear_session_cookie("quill_session");
        assert!(cookie.contains("Max-Age=0"));
    }
}
