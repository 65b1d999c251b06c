/// Common test utilities for integration tests
///
/// Provides a `TestContext` wiring the real router against live Postgres
/// and Redis instances (DATABASE_URL / REDIS_URL), plus helpers for
/// creating accounts and driving the session-cookie login flow.

use axum::body::Body;
use axum::http::{header, Request, Response, StatusCode};
use noticeboard_api::app::{build_router, AppState};
use noticeboard_api::config::Config;
use noticeboard_shared::auth::password::hash_password;
use noticeboard_shared::models::user::User;
use noticeboard_shared::redis::{RedisClient, RedisConfig};
use sqlx::PgPool;
use tower::ServiceExt;
use uuid::Uuid;

/// Test context containing all necessary resources
pub struct TestContext {
    pub db: PgPool,
    pub app: axum::Router,
    pub config: Config,
}

impl TestContext {
    /// Creates a new test context against the configured services
    pub async fn new() -> anyhow::Result<Self> {
        let config = Config::from_env()?;

        let db = PgPool::connect(&config.database.url).await?;
        sqlx::migrate!("../migrations").run(&db).await?;

        let redis = RedisClient::new(RedisConfig::from_env()?).await?;

        let state = AppState::new(db.clone(), redis, config.clone());
        state.images.ensure_dirs().await?;
        let app = build_router(state);

        Ok(TestContext { db, app, config })
    }

    /// Registers an account directly and returns it with its password
    pub async fn create_user(&self, admin: bool) -> anyhow::Result<(User, String)> {
        let password = "test-password-123".to_string();
        let email = format!("test-{}@example.com", Uuid::new_v4());

        let user = User::register(
            &self.db,
            "Test User".to_string(),
            email,
            hash_password(&password)?,
        )
        .await?;

        if admin {
            sqlx::query("UPDATE users SET role = 'admin' WHERE id = $1")
                .bind(user.id)
                .execute(&self.db)
                .await?;
        }

        Ok((user, password))
    }

    /// Logs in through the real endpoint and returns the session cookie
    pub async fn login(&self, email: &str, password: &str) -> anyhow::Result<String> {
        let response = self
            .app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/accounts/login/")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from(format!(
                        "email={}&password={}",
                        email, password
                    )))?,
            )
            .await?;

        assert_eq!(response.status(), StatusCode::FOUND, "login should redirect");
        session_cookie(&response).ok_or_else(|| anyhow::anyhow!("no session cookie set"))
    }

    /// Sends a request carrying a session cookie
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        cookie: &str,
        body: Option<(&str, String)>,
    ) -> anyhow::Result<Response<Body>> {
        let mut builder = Request::builder()
            .method(method)
            .uri(uri)
            .header(header::COOKIE, cookie);

        let body = match body {
            Some((content_type, payload)) => {
                builder = builder.header(header::CONTENT_TYPE, content_type);
                Body::from(payload)
            }
            None => Body::empty(),
        };

        Ok(self.app.clone().oneshot(builder.body(body)?).await?)
    }
}

/// Extracts the session cookie pair from a response
pub fn session_cookie(response: &Response<Body>) -> Option<String> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(';').next())
        .map(str::to_string)
}

/// Reads a response body as JSON
pub async fn body_json(response: Response<Body>) -> anyhow::Result<serde_json::Value> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Reads a response body as a string
pub async fn body_string(response: Response<Body>) -> anyhow::Result<String> {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(String::from_utf8(bytes.to_vec())?)
}
