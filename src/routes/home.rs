use askama::Template;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum::Form;
use serde::Deserialize;

use crate::error::AppResult;
use crate::extractors::MaybeAccount;

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub signed_in: bool,
}

#[derive(Template)]
#[template(path = "pages/contact.html")]
pub struct ContactTemplate;

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// GET / — landing page.
pub async fn index(MaybeAccount(account): MaybeAccount) -> AppResult<Response> {
    Ok(Html(IndexTemplate {
        signed_in: account.is_some(),
    })
    .into_response())
}

#[derive(Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub comments: String,
}

/// GET /contact — render the contact form.
pub async fn contact_page() -> AppResult<Response> {
    Ok(Html(ContactTemplate).into_response())
}

/// POST /contact — the message is acknowledged but not persisted.
pub async fn contact_submit(Form(form): Form<ContactForm>) -> AppResult<Response> {
    tracing::info!("Contact message from {} <{}>", form.name, form.email);
    Ok(Redirect::to("/trending?sent=1").into_response())
}
