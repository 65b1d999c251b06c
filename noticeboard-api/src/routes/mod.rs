/// Route handlers, organized by resource
///
/// - `health`: Health check endpoint
/// - `auth`: Login and signup
/// - `posts`: Post listing, two-phase create/edit, detail, soft delete
/// - `users`: User listing, two-phase create/edit, profile, password reset
/// - `csv`: Post CSV import and export
///
/// Form endpoints answer with either a `302 Found` redirect or a JSON page
/// context — the echoed values, errors, flags, and rows the admin UI's
/// templates render.

use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};

pub mod auth;
pub mod csv;
pub mod health;
pub mod posts;
pub mod users;

/// A `302 Found` redirect, the status the browser-facing flows use
pub fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location)]).into_response()
}
