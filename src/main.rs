mod auth;
mod config;
mod db;
mod error;
mod extractors;
mod routes;
mod state;
mod uploads;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::Router;
use clap::Parser;
use std::net::SocketAddr;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;

use crate::config::{Cli, Config};
use crate::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI args and load config
    let cli = Cli::parse();
    let data_dir = Config::data_dir(&cli);
    std::fs::create_dir_all(&data_dir)?;
    tracing::info!("Data directory: {}", data_dir.display());

    let config = Config::load(&cli)?;

    // Ensure uploads directory exists
    std::fs::create_dir_all(config.uploads_path())?;

    // Initialize database
    let pool = db::create_pool(config.db_path())?;
    db::run_migrations(&pool)?;

    let state = AppState {
        db: pool,
        config: config.clone(),
    };

    // Uploads arrive whole in the request body and carry no size cap.
    let app = router()
        .layer(DefaultBodyLimit::disable())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(routes::home::index))
        .route(
            "/login",
            get(auth::handlers::login_page).post(auth::handlers::login_submit),
        )
        .route(
            "/signup",
            get(auth::handlers::signup_page).post(auth::handlers::signup_submit),
        )
        .route("/logout", get(auth::handlers::logout))
        .route("/delete_user/{author_id}", get(auth::handlers::delete_user))
        .route("/profile", get(routes::profile::profile_page))
        .route(
            "/edit_profile",
            get(routes::profile::edit_profile_page).post(routes::profile::edit_profile_submit),
        )
        .route(
            "/contact",
            get(routes::home::contact_page).post(routes::home::contact_submit),
        )
        .route("/posts", get(routes::posts::list_posts))
        .route("/user_posts/{author_id}", get(routes::posts::list_user_posts))
        .route("/posts/delete/{id}", get(routes::posts::delete_post_route))
        .route(
            "/posts/editpost/{id}",
            get(routes::posts::edit_post_page).post(routes::posts::edit_post_submit),
        )
        .route(
            "/posts/new/{account_id}",
            get(routes::posts::new_post_page).post(routes::posts::new_post_submit),
        )
        .route("/like_post/{post_id}", get(routes::engage::like_post))
        .route("/trending", get(routes::engage::trending))
        .route(
            "/readmore/{post_id}",
            get(routes::engage::readmore).post(routes::engage::readmore),
        )
        .route("/comment/{blog_id}", post(routes::engage::add_comment))
}
