use askama::Template;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Redirect, Response};

use crate::auth::accounts;
use crate::error::AppResult;
use crate::extractors::CurrentAccount;
use crate::routes::home::Html;
use crate::routes::posts::{list_posts_by_author, PostView};
use crate::state::AppState;
use crate::uploads;

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub account_id: String,
    pub name: String,
    pub email: String,
    pub author_id: String,
    pub profile_image: Option<String>,
    pub posts: Vec<PostView>,
}

#[derive(Template)]
#[template(path = "pages/edit_profile.html")]
pub struct EditProfileTemplate {
    pub name: String,
    pub email: String,
}

/// GET /profile — the signed-in account plus its own posts.
pub async fn profile_page(
    State(state): State<AppState>,
    account: CurrentAccount,
) -> AppResult<Response> {
    let conn = state.db.get()?;
    let posts = list_posts_by_author(&conn, &account.author_id)?
        .into_iter()
        .map(Into::into)
        .collect();

    Ok(Html(ProfileTemplate {
        account_id: account.id,
        name: account.name,
        email: account.email,
        author_id: account.author_id,
        profile_image: account.profile_image,
        posts,
    })
    .into_response())
}

/// GET /edit_profile — render the edit form prefilled with current values.
pub async fn edit_profile_page(account: CurrentAccount) -> AppResult<Response> {
    Ok(Html(EditProfileTemplate {
        name: account.name,
        email: account.email,
    })
    .into_response())
}

/// POST /edit_profile — update name/email unconditionally; replace the
/// profile image only when an allowed upload is present.
pub async fn edit_profile_submit(
    State(state): State<AppState>,
    account: CurrentAccount,
    mut multipart: Multipart,
) -> AppResult<Response> {
    let mut name = account.name.clone();
    let mut email = account.email.clone();
    let mut upload: Option<(String, Vec<u8>)> = None;

    while let Some(field) = multipart.next_field().await? {
        match field.name() {
            Some("name") => name = field.text().await?,
            Some("email") => email = field.text().await?,
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

    let encoded = match upload {
        Some((filename, bytes)) => {
            uploads::process_upload(state.config.uploads_path(), &filename, &bytes)?
        }
        None => None,
    };

    accounts::update_profile(&state.db, &account.id, &name, &email, encoded.as_deref())?;

    Ok(Redirect::to("/profile").into_response())
}
