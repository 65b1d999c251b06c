/// Application state and router builder
///
/// Defines the shared application state, the router with the full HTTP
/// surface, and the two middleware layers every request passes through:
///
/// 1. `session_layer` — resolves the session cookie against the Redis
///    store, creating a fresh session (and setting the cookie) when none
///    resolves. The loaded [`Session`] rides in request extensions.
/// 2. `require_login` — on protected routes, resolves the session's user id
///    to a live account and injects it; anonymous requests are answered
///    with a redirect to the login page carrying a `next` parameter.
///
/// # Example
///
/// ```no_run
/// use noticeboard_api::{app::AppState, config::Config};
/// use noticeboard_shared::db::pool::{create_pool, DatabaseConfig};
/// use noticeboard_shared::redis::{RedisClient, RedisConfig};
/// use noticeboard_shared::session::SessionStore;
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let pool = create_pool(DatabaseConfig {
///     url: config.database.url.clone(),
///     ..Default::default()
/// })
/// .await?;
/// let redis = RedisClient::new(RedisConfig::from_env()?).await?;
/// let state = AppState::new(pool, redis, config);
/// let app = noticeboard_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use axum::{
    extract::{Request, State},
    http::{header, HeaderValue},
    middleware::Next,
    response::Response,
    routing::get,
    Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use noticeboard_shared::models::user::User;
use noticeboard_shared::redis::RedisClient;
use noticeboard_shared::session::{Session, SessionStore, SESSION_COOKIE};
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer};
use tracing::Level;

use crate::{config::Config, error::ApiError, routes, uploads::ImageStore};

/// Path of the login form, the target of unauthenticated redirects
pub const LOGIN_PATH: &str = "/accounts/login/";

/// Shared application state
///
/// Cloned for each request handler via Axum's `State` extractor; the inner
/// handles are all cheap to clone.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: PgPool,

    /// Session store backing the confirm flows and login state
    pub sessions: SessionStore,

    /// Profile-image staging and permanent storage
    pub images: ImageStore,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state
    pub fn new(db: PgPool, redis: RedisClient, config: Config) -> Self {
        let sessions = SessionStore::new(redis, config.session.ttl_seconds);
        let images = ImageStore::new(
            config.uploads.tmp_dir.clone(),
            config.uploads.upload_dir.clone(),
        );

        Self {
            db,
            sessions,
            images,
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router
///
/// # Route map
///
/// ```text
/// /health                      # health check (public)
/// /accounts/login/             # authenticate (public)
/// /accounts/register/          # signup (public)
/// /                            # post list/search
/// /post/create/                # two-phase post creation
/// /post/:id/                   # two-phase post edit
/// /post/detail/                # post JSON detail
/// /post/delete/confirm/        # delete-confirmation payload
/// /post/delete/                # soft delete
/// /post/list/download          # CSV export
/// /csv/import/                 # CSV import
/// /users/                      # user list/search
/// /user/create/                # two-phase user creation
/// /user/:id/                   # two-phase user edit
/// /user/detail/                # user JSON detail
/// /user/delete/confirm/        # delete-confirmation payload
/// /user/delete/                # soft delete
/// /profile/                    # caller's own profile
/// /password-reset/             # self-service password change
/// ```
///
/// Everything below the public block requires a signed-in session.
pub fn build_router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/health", get(routes::health::health_check))
        .route(
            "/accounts/login/",
            get(routes::auth::login_page).post(routes::auth::login_submit),
        )
        .route(
            "/accounts/register/",
            get(routes::auth::signup_page).post(routes::auth::signup_submit),
        );

    let protected_routes = Router::new()
        .route(
            "/",
            get(routes::posts::index_page).post(routes::posts::index_submit),
        )
        .route(
            "/post/create/",
            get(routes::posts::create_page).post(routes::posts::create_submit),
        )
        .route(
            "/post/:id/",
            get(routes::posts::edit_page).post(routes::posts::edit_submit),
        )
        .route("/post/detail/", get(routes::posts::detail))
        .route("/post/delete/confirm/", get(routes::posts::delete_confirm))
        .route("/post/delete/", get(routes::posts::delete))
        .route("/post/list/download", get(routes::csv::download))
        .route(
            "/csv/import/",
            get(routes::csv::import_page).post(routes::csv::import_submit),
        )
        .route(
            "/users/",
            get(routes::users::list_page).post(routes::users::list_submit),
        )
        .route(
            "/user/create/",
            get(routes::users::create_page).post(routes::users::create_submit),
        )
        .route(
            "/user/:id/",
            get(routes::users::edit_page).post(routes::users::edit_submit),
        )
        .route("/user/detail/", get(routes::users::detail))
        .route("/user/delete/confirm/", get(routes::users::delete_confirm))
        .route("/user/delete/", get(routes::users::delete))
        .route("/profile/", get(routes::users::profile))
        .route(
            "/password-reset/",
            get(routes::users::password_reset_page).post(routes::users::password_reset_submit),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_login,
        ));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            session_layer,
        ))
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .with_state(state)
}

/// Session middleware
///
/// Resolves the session cookie against the store; a missing, expired, or
/// undecodable session is replaced with a fresh one and the cookie is set
/// on the response.
async fn session_layer(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let jar = CookieJar::from_headers(req.headers());

    let existing = match jar.get(SESSION_COOKIE) {
        Some(cookie) => state.sessions.load(cookie.value()).await?,
        None => None,
    };

    let (session, is_new) = match existing {
        Some(session) => (session, false),
        None => (state.sessions.create().await?, true),
    };

    let session_id = session.id.clone();
    req.extensions_mut().insert(session);

    let mut response = next.run(req).await;

    if is_new {
        let cookie = Cookie::build((SESSION_COOKIE, session_id))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .build();

        if let Ok(value) = HeaderValue::from_str(&cookie.to_string()) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }

    Ok(response)
}

/// Login-required middleware
///
/// Resolves the session's user id to a live account and injects the
/// [`User`] into request extensions. A session without a user — or whose
/// user has been soft-deleted since — is bounced to the login page with a
/// `next` parameter pointing back at the requested path.
async fn require_login(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let session = req
        .extensions()
        .get::<Session>()
        .cloned()
        .ok_or_else(|| ApiError::InternalError("Session middleware missing".to_string()))?;

    let next_path = urlencoding::encode(req.uri().path()).into_owned();
    let login_redirect = format!("{LOGIN_PATH}?next={next_path}");

    let Some(user_id) = session.data.user_id else {
        return Ok(routes::found(&login_redirect));
    };

    match User::find_active_by_id(&state.db, user_id).await? {
        Some(user) => {
            req.extensions_mut().insert(user);
            Ok(next.run(req).await)
        }
        None => Ok(routes::found(&login_redirect)),
    }
}
