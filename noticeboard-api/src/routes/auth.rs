/// Authentication endpoints
///
/// # Endpoints
///
/// - `GET/POST /accounts/login/` - Authenticate against a live account
/// - `GET/POST /accounts/register/` - Self-service signup
///
/// Login failures distinguish an unknown (or soft-deleted) email from a
/// password mismatch, re-rendering the login page with the message; a
/// success stores the user id in the session and answers `302` to the
/// `next` parameter (default `/`).

use axum::{
    extract::{Extension, State},
    response::Response,
    Form, Json,
};
use serde::Serialize;

use noticeboard_shared::auth::password::{hash_password, verify_password};
use noticeboard_shared::models::user::User;
use noticeboard_shared::session::Session;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    forms::{FormErrors, LoginForm, SignupForm},
    routes::found,
};

/// Login page context
#[derive(Debug, Serialize)]
pub struct LoginPage {
    /// Flash-style messages ("Email does not exist or deleted", ...)
    pub messages: Vec<String>,
}

/// Signup page context
#[derive(Debug, Serialize)]
pub struct SignupPage {
    pub values: SignupValues,
    pub errors: FormErrors,
}

/// Echoed signup fields (passwords are never echoed back)
#[derive(Debug, Default, Serialize)]
pub struct SignupValues {
    pub name: String,
    pub email: String,
}

/// Renders the empty login page
pub async fn login_page() -> Json<LoginPage> {
    Json(LoginPage { messages: vec![] })
}

/// Handles a login attempt
///
/// The email is looked up among live users only — a soft-deleted account
/// cannot sign in, whatever its password.
pub async fn login_submit(
    State(state): State<AppState>,
    Extension(mut session): Extension<Session>,
    Form(form): Form<LoginForm>,
) -> ApiResult<Response> {
    let Some(user) = User::find_active_by_email(&state.db, form.email.trim()).await? else {
        return Ok(login_message("Email does not exist or deleted"));
    };

    if !verify_password(&form.password, &user.password_hash)? {
        return Ok(login_message("Email and Password does not match."));
    }

    session.data.user_id = Some(user.id);
    state.sessions.save(&session).await?;

    let next = form
        .next
        .filter(|n| n.starts_with('/'))
        .unwrap_or_else(|| "/".to_string());

    tracing::info!(user_id = %user.id, "User logged in");
    Ok(found(&next))
}

fn login_message(message: &str) -> Response {
    use axum::response::IntoResponse;

    Json(LoginPage {
        messages: vec![message.to_string()],
    })
    .into_response()
}

/// Renders the empty signup page
pub async fn signup_page() -> Json<SignupPage> {
    Json(SignupPage {
        values: SignupValues::default(),
        errors: FormErrors::default(),
    })
}

/// Handles a signup attempt
///
/// A valid submission creates a non-privileged account that is its own
/// creator, signs the session in, and flashes a welcome message for the
/// post list to render.
pub async fn signup_submit(
    State(state): State<AppState>,
    Extension(mut session): Extension<Session>,
    Form(form): Form<SignupForm>,
) -> ApiResult<Response> {
    use axum::response::IntoResponse;

    let values = SignupValues {
        name: form.name.clone().unwrap_or_default(),
        email: form.email.clone().unwrap_or_default(),
    };

    let signup = match form.validate() {
        Ok(signup) => signup,
        Err(errors) => return Ok(Json(SignupPage { values, errors }).into_response()),
    };

    let password_hash = hash_password(&signup.password)?;

    let user = match User::register(&state.db, signup.name, signup.email, password_hash).await {
        Ok(user) => user,
        Err(e) => {
            // A duplicate live email surfaces on the form; anything else is
            // an infrastructure failure.
            return match ApiError::from(e) {
                ApiError::Conflict(message) => Ok(Json(SignupPage {
                    values,
                    errors: FormErrors::form_level(message),
                })
                .into_response()),
                other => Err(other),
            };
        }
    };

    session.data.user_id = Some(user.id);
    session
        .data
        .flash
        .push("User signup successful.".to_string());
    state.sessions.save(&session).await?;

    tracing::info!(user_id = %user.id, "User signed up");
    Ok(found("/"))
}
