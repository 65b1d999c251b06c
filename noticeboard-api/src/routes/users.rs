/// User administration endpoints
///
/// # Endpoints
///
/// - `GET/POST /users/` - List/search the caller's visible users (paginated)
/// - `GET/POST /user/create/` - Two-phase user creation (profile image required)
/// - `GET/POST /user/:id/` - Two-phase user edit (profile image optional)
/// - `GET /profile/` - The caller's own record
/// - `GET /user/detail/?user_id=` - JSON detail with resolved names
/// - `GET /user/delete/confirm/?user_id=` - Delete-confirmation payload
/// - `GET /user/delete/?user_id=` - Soft delete, redirect to the list
/// - `GET/POST /password-reset/` - Self-service password change
///
/// The create/edit flows mirror the post flows, with one more moving part:
/// an uploaded profile image is staged to temporary storage alongside the
/// snapshot and only promoted to permanent storage when the flow commits.
/// Commit failures (duplicate email, upload IO) surface as form-level
/// messages with the flow cleared and nothing persisted.

use axum::{
    extract::{Extension, Multipart, Path, Query, State},
    response::{IntoResponse, Response},
    Form, Json,
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use noticeboard_shared::auth::password::{hash_password, verify_password};
use noticeboard_shared::models::pagination::Page;
use noticeboard_shared::models::user::{
    CreateUser, Role, UpdateUser, User, UserDetail, UserDraft, UserListRow, UserSearch,
};
use noticeboard_shared::session::Session;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    forms::{
        validate_user_create, validate_user_edit, FormErrors, FormIntent, MultipartForm,
        PasswordResetForm, UserSearchForm,
    },
    routes::found,
    routes::posts::PageQuery,
    uploads::{permanent_reference, staged_reference},
};

/// `user_id` query parameter for the detail/delete endpoints
#[derive(Debug, Deserialize)]
pub struct UserIdQuery {
    pub user_id: Uuid,
}

/// User list page context
#[derive(Debug, Serialize)]
pub struct UserListPage {
    pub page_obj: Page<UserListRow>,

    /// Echoed search fields
    pub form: UserSearchEcho,

    pub errors: FormErrors,
}

/// Echoed user search fields, as submitted
#[derive(Debug, Default, Serialize)]
pub struct UserSearchEcho {
    pub name: String,
    pub email: String,
    pub from_date: String,
    pub to_date: String,
}

/// Echoed user form fields
#[derive(Debug, Serialize)]
pub struct UserFormValues {
    pub name: String,
    pub email: String,

    /// Echoed on the create confirm page only
    pub password: Option<String>,

    pub role: Role,
    pub phone: Option<String>,
    pub dob: Option<NaiveDate>,
    pub address: Option<String>,
}

/// User create/edit page context
#[derive(Debug, Serialize)]
pub struct UserFormPage {
    /// "create" or "edit"
    pub operation: &'static str,

    /// Target user for edits
    pub id: Option<Uuid>,

    pub values: UserFormValues,

    pub errors: FormErrors,

    /// Set when a snapshot is staged and the form is a read-only preview
    pub save_confirm_page: bool,

    /// Image shown on the form: a `tmp/` staging reference while the flow
    /// is staged with a new upload, otherwise the stored reference
    pub profile: Option<String>,

    /// The record's stored image reference (edit form only)
    pub old_profile: Option<String>,
}

/// The caller's own profile page context
#[derive(Debug, Serialize)]
pub struct ProfilePage {
    pub id: Uuid,
    pub name: String,
    pub role: Role,
    pub email: String,
    pub phone: Option<String>,
    pub dob: Option<NaiveDate>,
    pub address: Option<String>,
    pub profile: Option<String>,
}

/// Password-reset page context
#[derive(Debug, Serialize)]
pub struct PasswordResetPage {
    pub errors: FormErrors,
}

// ---------------------------------------------------------------------------
// Listing and profile
// ---------------------------------------------------------------------------

/// Renders the user list (GET)
pub async fn list_page(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<UserListPage>> {
    let page = User::list_visible(
        &state.db,
        &user.caller(),
        &UserSearch::default(),
        query.page.unwrap_or(1),
    )
    .await?;

    Ok(Json(UserListPage {
        page_obj: page,
        form: UserSearchEcho::default(),
        errors: FormErrors::default(),
    }))
}

/// Handles the user search form (POST)
///
/// An unparseable date leaves the listing unfiltered and reports the field
/// error, matching the list-with-errors rendering of the source system.
pub async fn list_submit(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PageQuery>,
    Form(form): Form<UserSearchForm>,
) -> ApiResult<Json<UserListPage>> {
    let echo = UserSearchEcho {
        name: form.name.clone().unwrap_or_default(),
        email: form.email.clone().unwrap_or_default(),
        from_date: form.from_date.clone().unwrap_or_default(),
        to_date: form.to_date.clone().unwrap_or_default(),
    };

    let (search, errors) = match form.validate() {
        Ok(search) => (search, FormErrors::default()),
        Err(errors) => (UserSearch::default(), errors),
    };

    let page = User::list_visible(&state.db, &user.caller(), &search, query.page.unwrap_or(1))
        .await?;

    Ok(Json(UserListPage {
        page_obj: page,
        form: echo,
        errors,
    }))
}

/// Renders the caller's own profile
pub async fn profile(Extension(user): Extension<User>) -> Json<ProfilePage> {
    Json(ProfilePage {
        id: user.id,
        name: user.name,
        role: user.role,
        email: user.email,
        phone: user.phone,
        dob: user.date_of_birth,
        address: user.address,
        profile: user.profile_image,
    })
}

// ---------------------------------------------------------------------------
// Create flow
// ---------------------------------------------------------------------------

/// Renders the create form, echoing any staged snapshot (GET)
pub async fn create_page(Extension(session): Extension<Session>) -> Json<UserFormPage> {
    let flow = &session.data.user_flow;

    let values = match flow.staged() {
        Some(draft) => draft_values(draft),
        None => empty_values(),
    };

    let profile = flow.staged_image().map(staged_reference);

    Json(UserFormPage {
        operation: "create",
        id: None,
        values,
        errors: FormErrors::default(),
        save_confirm_page: flow.is_staged(),
        profile,
        old_profile: None,
    })
}

/// Drives the user create flow (POST, multipart)
pub async fn create_submit(
    State(state): State<AppState>,
    Extension(mut session): Extension<Session>,
    Extension(user): Extension<User>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let form = MultipartForm::parse(multipart).await?;

    if form.intent() != Some(FormIntent::Save) {
        discard_staged_image(&state, &mut session).await;
        state.sessions.save(&session).await?;
        return Ok(found("/user/create/"));
    }

    let draft = match validate_user_create(&form) {
        Ok(draft) => draft,
        Err(errors) => {
            discard_staged_image(&state, &mut session).await;
            state.sessions.save(&session).await?;
            return Ok(form_error_page("create", None, &form, errors, None).into_response());
        }
    };

    match session.data.user_flow.take_staged() {
        Some((staged, staged_image)) => {
            // The marker is gone whatever happens next; a failed commit must
            // not leave a confirm page behind.
            state.sessions.save(&session).await?;

            match commit_create(&state, user.id, staged, staged_image).await {
                Ok(()) => Ok(found("/users/")),
                Err(message) => Ok(form_error_page(
                    "create",
                    None,
                    &form,
                    FormErrors::form_level(message),
                    None,
                )
                .into_response()),
            }
        }
        None => {
            let Some(upload) = form.file("profile") else {
                session.data.user_flow.cancel();
                state.sessions.save(&session).await?;

                let mut errors = FormErrors::default();
                errors.add_field("profile", "profile can not be blank");
                return Ok(form_error_page("create", None, &form, errors, None).into_response());
            };

            let staged_name = match state.images.stage(&upload.filename, &upload.bytes).await {
                Ok(name) => name,
                Err(e) => {
                    state.sessions.save(&session).await?;
                    return Ok(form_error_page(
                        "create",
                        None,
                        &form,
                        FormErrors::form_level(e.to_string()),
                        None,
                    )
                    .into_response());
                }
            };

            session
                .data
                .user_flow
                .stage(draft.clone(), Some(staged_name.clone()));
            state.sessions.save(&session).await?;

            Ok(Json(UserFormPage {
                operation: "create",
                id: None,
                values: draft_values(&draft),
                errors: FormErrors::default(),
                save_confirm_page: true,
                profile: Some(staged_reference(&staged_name)),
                old_profile: None,
            })
            .into_response())
        }
    }
}

/// Commits a staged user creation: promote the image, hash the password,
/// insert the record. Any failure becomes a form-level message.
async fn commit_create(
    state: &AppState,
    actor: Uuid,
    staged: UserDraft,
    staged_image: Option<String>,
) -> Result<(), String> {
    let image_name = staged_image.ok_or("profile can not be blank")?;

    state
        .images
        .promote(&image_name)
        .await
        .map_err(|e| e.to_string())?;

    let password = staged.password.as_deref().ok_or("Password can't be blank")?;
    let password_hash = hash_password(password).map_err(|e| e.to_string())?;

    User::create(
        &state.db,
        actor,
        CreateUser {
            name: staged.name,
            email: staged.email,
            password_hash,
            profile_image: Some(permanent_reference(&image_name)),
            role: staged.role,
            phone: staged.phone,
            address: staged.address,
            date_of_birth: staged.date_of_birth,
        },
    )
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::Conflict(message) => message,
        other => other.to_string(),
    })?;

    if let Err(e) = state.images.discard(&image_name).await {
        tracing::warn!("Failed to clean up staged image {image_name}: {e}");
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Edit flow
// ---------------------------------------------------------------------------

/// Renders the edit form for a user, echoing any staged snapshot (GET)
pub async fn edit_page(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<UserFormPage>> {
    let target = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let flow = &session.data.user_flow;

    let values = match flow.staged() {
        Some(draft) => draft_values(draft),
        None => UserFormValues {
            name: target.name.clone(),
            email: target.email.clone(),
            password: None,
            role: target.role,
            phone: target.phone.clone(),
            dob: target.date_of_birth,
            address: target.address.clone(),
        },
    };

    let profile = flow
        .staged_image()
        .map(staged_reference)
        .or_else(|| target.profile_image.clone());

    Ok(Json(UserFormPage {
        operation: "edit",
        id: Some(id),
        values,
        errors: FormErrors::default(),
        save_confirm_page: flow.is_staged(),
        profile,
        old_profile: target.profile_image,
    }))
}

/// Drives the user edit flow (POST, multipart)
pub async fn edit_submit(
    State(state): State<AppState>,
    Extension(mut session): Extension<Session>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    multipart: Multipart,
) -> ApiResult<Response> {
    let target = User::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let form = MultipartForm::parse(multipart).await?;

    if form.intent() != Some(FormIntent::Save) {
        discard_staged_image(&state, &mut session).await;
        state.sessions.save(&session).await?;
        return Ok(found(&format!("/user/{id}/")));
    }

    let draft = match validate_user_edit(&form) {
        Ok(draft) => draft,
        Err(errors) => {
            discard_staged_image(&state, &mut session).await;
            state.sessions.save(&session).await?;
            return Ok(form_error_page(
                "edit",
                Some(id),
                &form,
                errors,
                target.profile_image.clone(),
            )
            .into_response());
        }
    };

    match session.data.user_flow.take_staged() {
        Some((staged, staged_image)) => {
            state.sessions.save(&session).await?;

            match commit_edit(&state, &target, user.id, staged, staged_image).await {
                Ok(()) => Ok(found("/users/")),
                Err(message) => Ok(form_error_page(
                    "edit",
                    Some(id),
                    &form,
                    FormErrors::form_level(message),
                    target.profile_image.clone(),
                )
                .into_response()),
            }
        }
        None => {
            let staged_name = match form.file("profile") {
                Some(upload) => match state.images.stage(&upload.filename, &upload.bytes).await {
                    Ok(name) => Some(name),
                    Err(e) => {
                        state.sessions.save(&session).await?;
                        return Ok(form_error_page(
                            "edit",
                            Some(id),
                            &form,
                            FormErrors::form_level(e.to_string()),
                            target.profile_image.clone(),
                        )
                        .into_response());
                    }
                },
                None => None,
            };

            session
                .data
                .user_flow
                .stage(draft.clone(), staged_name.clone());
            state.sessions.save(&session).await?;

            let profile = staged_name
                .as_deref()
                .map(staged_reference)
                .or_else(|| target.profile_image.clone());

            Ok(Json(UserFormPage {
                operation: "edit",
                id: Some(id),
                values: draft_values(&draft),
                errors: FormErrors::default(),
                save_confirm_page: true,
                profile,
                old_profile: target.profile_image,
            })
            .into_response())
        }
    }
}

/// Commits a staged user edit onto the target record
///
/// A freshly staged image is promoted and replaces the stored reference;
/// without one the record keeps its current image.
async fn commit_edit(
    state: &AppState,
    target: &User,
    actor: Uuid,
    staged: UserDraft,
    staged_image: Option<String>,
) -> Result<(), String> {
    let profile_image = match &staged_image {
        Some(name) => {
            state
                .images
                .promote(name)
                .await
                .map_err(|e| e.to_string())?;
            Some(permanent_reference(name))
        }
        None => target.profile_image.clone(),
    };

    User::update(
        &state.db,
        target.id,
        actor,
        UpdateUser {
            name: staged.name,
            email: staged.email,
            role: staged.role,
            phone: staged.phone,
            address: staged.address,
            date_of_birth: staged.date_of_birth,
            profile_image,
        },
    )
    .await
    .map_err(|e| match ApiError::from(e) {
        ApiError::Conflict(message) => message,
        other => other.to_string(),
    })?
    .ok_or("User not found")?;

    if let Some(name) = staged_image {
        if let Err(e) = state.images.discard(&name).await {
            tracing::warn!("Failed to clean up staged image {name}: {e}");
        }
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Detail, delete, password reset
// ---------------------------------------------------------------------------

/// JSON detail payload with creator/updater names resolved
pub async fn detail(
    State(state): State<AppState>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<Json<UserDetail>> {
    let detail = User::find_detail(&state.db, query.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(detail))
}

/// Bare record payload for the delete-confirmation dialog
pub async fn delete_confirm(
    State(state): State<AppState>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<Json<User>> {
    let target = User::find_by_id(&state.db, query.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    Ok(Json(target))
}

/// Soft-deletes a user and returns to the list
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<UserIdQuery>,
) -> ApiResult<Response> {
    User::find_by_id(&state.db, query.user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    User::soft_delete(&state.db, query.user_id, user.id).await?;

    tracing::info!(user_id = %query.user_id, actor = %user.id, "User soft-deleted");
    Ok(found("/users/"))
}

/// Renders the empty password-reset page
pub async fn password_reset_page() -> Json<PasswordResetPage> {
    Json(PasswordResetPage {
        errors: FormErrors::default(),
    })
}

/// Handles a password change
///
/// The current password must verify against the caller's stored hash; a
/// mismatch attaches to the `password` field.
pub async fn password_reset_submit(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Form(form): Form<PasswordResetForm>,
) -> ApiResult<Response> {
    let reset = match form.validate() {
        Ok(reset) => reset,
        Err(errors) => return Ok(Json(PasswordResetPage { errors }).into_response()),
    };

    if !verify_password(&reset.current, &user.password_hash)? {
        let mut errors = FormErrors::default();
        errors.add_field("password", "Current password is wrong!");
        return Ok(Json(PasswordResetPage { errors }).into_response());
    }

    let password_hash = hash_password(&reset.new)?;
    User::update_password(&state.db, user.id, &password_hash).await?;

    tracing::info!(user_id = %user.id, "Password changed");
    Ok(found("/users/"))
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Drops any staged image from the session's user flow (cancel paths)
///
/// A file already missing from the staging area is only worth a warning
/// here; the flow is being abandoned either way.
async fn discard_staged_image(state: &AppState, session: &mut Session) {
    if let Some(name) = session.data.user_flow.cancel() {
        if let Err(e) = state.images.discard(&name).await {
            tracing::warn!("Failed to discard staged image {name}: {e}");
        }
    }
}

fn empty_values() -> UserFormValues {
    UserFormValues {
        name: String::new(),
        email: String::new(),
        password: None,
        role: Role::User,
        phone: None,
        dob: None,
        address: None,
    }
}

fn draft_values(draft: &UserDraft) -> UserFormValues {
    UserFormValues {
        name: draft.name.clone(),
        email: draft.email.clone(),
        password: draft.password.clone(),
        role: draft.role,
        phone: draft.phone.clone(),
        dob: draft.date_of_birth,
        address: draft.address.clone(),
    }
}

/// Re-renders a form page with the submitted values and their errors
fn form_error_page(
    operation: &'static str,
    id: Option<Uuid>,
    form: &MultipartForm,
    errors: FormErrors,
    old_profile: Option<String>,
) -> Json<UserFormPage> {
    use crate::forms::parse_role;

    let dob = form
        .text("dob")
        .and_then(|raw| NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok());

    Json(UserFormPage {
        operation,
        id,
        values: UserFormValues {
            name: form.text("name").unwrap_or_default().to_string(),
            email: form.text("email").unwrap_or_default().to_string(),
            password: None,
            role: parse_role(form.text("type")),
            phone: form.text("phone").map(str::to_string),
            dob,
            address: form.text("address").map(str::to_string),
        },
        errors,
        save_confirm_page: false,
        profile: old_profile.clone(),
        old_profile,
    })
}
