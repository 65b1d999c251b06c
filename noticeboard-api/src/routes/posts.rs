/// Post endpoints
///
/// # Endpoints
///
/// - `GET/POST /` - List/search the caller's visible posts (paginated)
/// - `GET/POST /post/create/` - Two-phase post creation
/// - `GET/POST /post/:id/` - Two-phase post edit
/// - `GET /post/detail/?post_id=` - JSON detail with resolved names
/// - `GET /post/delete/confirm/?post_id=` - Delete-confirmation payload
/// - `GET /post/delete/?post_id=` - Soft delete, redirect to the list
///
/// Create and edit run the two-phase confirm flow: the first valid save
/// stages a snapshot in the session and re-renders the form read-only with
/// `save_confirm_page` set; the second save commits the *staged* values and
/// redirects to the list. Cancel clears the snapshot and returns to the
/// form.

use axum::{
    extract::{Extension, Path, Query, State},
    response::{IntoResponse, Response},
    Form, Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use noticeboard_shared::models::pagination::Page;
use noticeboard_shared::models::post::{Post, PostDetail, PostStatus};
use noticeboard_shared::models::user::User;
use noticeboard_shared::session::Session;

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    forms::{FormErrors, FormIntent, PostEditorForm, PostListForm},
    routes::found,
};

/// Page-number query parameter, shared by the list endpoints
#[derive(Debug, Deserialize)]
pub struct PageQuery {
    pub page: Option<u32>,
}

/// `post_id` query parameter for the detail/delete endpoints
#[derive(Debug, Deserialize)]
pub struct PostIdQuery {
    pub post_id: Uuid,
}

/// Post list page context
#[derive(Debug, Serialize)]
pub struct PostListPage {
    pub page_obj: Page<Post>,

    /// Keyword the listing was filtered by, echoed into the search box
    pub keyword: Option<String>,

    /// Drained flash messages
    pub messages: Vec<String>,
}

/// Echoed post form fields
#[derive(Debug, Serialize)]
pub struct PostFormValues {
    pub title: String,
    pub description: String,

    /// Present on the edit form (checkbox state); absent on create
    pub status: Option<PostStatus>,
}

/// Post create/edit page context
#[derive(Debug, Serialize)]
pub struct PostFormPage {
    /// "create" or "edit"
    pub operation: &'static str,

    /// Target post for edits
    pub id: Option<Uuid>,

    pub values: PostFormValues,

    pub errors: FormErrors,

    /// Set when a snapshot is staged and the form is a read-only preview
    pub save_confirm_page: bool,
}

/// Renders the post list (GET)
pub async fn index_page(
    State(state): State<AppState>,
    Extension(mut session): Extension<Session>,
    Extension(user): Extension<User>,
    Query(query): Query<PageQuery>,
) -> ApiResult<Json<PostListPage>> {
    let messages = session.data.take_flash();
    if !messages.is_empty() {
        state.sessions.save(&session).await?;
    }

    let page = Post::list_visible(
        &state.db,
        &user.caller(),
        None,
        query.page.unwrap_or(1),
    )
    .await?;

    Ok(Json(PostListPage {
        page_obj: page,
        keyword: None,
        messages,
    }))
}

/// Handles the post list form (POST): search, or jump to the create page
pub async fn index_submit(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PageQuery>,
    Form(form): Form<PostListForm>,
) -> ApiResult<Response> {
    if form.create.is_some() {
        return Ok(found("/post/create/"));
    }

    let keyword = form
        .search
        .is_some()
        .then(|| form.keyword.as_deref().map(str::trim))
        .flatten()
        .filter(|k| !k.is_empty())
        .map(str::to_string);

    let page = Post::list_visible(
        &state.db,
        &user.caller(),
        keyword.as_deref(),
        query.page.unwrap_or(1),
    )
    .await?;

    Ok(Json(PostListPage {
        page_obj: page,
        keyword,
        messages: vec![],
    })
    .into_response())
}

/// Renders the create form, echoing any staged snapshot (GET)
pub async fn create_page(Extension(session): Extension<Session>) -> Json<PostFormPage> {
    let flow = &session.data.post_flow;

    let values = match flow.staged() {
        Some(draft) => PostFormValues {
            title: draft.title.clone(),
            description: draft.description.clone(),
            status: None,
        },
        None => PostFormValues {
            title: String::new(),
            description: String::new(),
            status: None,
        },
    };

    Json(PostFormPage {
        operation: "create",
        id: None,
        values,
        errors: FormErrors::default(),
        save_confirm_page: flow.is_staged(),
    })
}

/// Drives the post create flow (POST)
pub async fn create_submit(
    State(state): State<AppState>,
    Extension(mut session): Extension<Session>,
    Extension(user): Extension<User>,
    Form(form): Form<PostEditorForm>,
) -> ApiResult<Response> {
    match form.intent() {
        Some(FormIntent::Cancel) => {
            session.data.post_flow.cancel();
            state.sessions.save(&session).await?;
            Ok(found("/post/create/"))
        }
        Some(FormIntent::Save) => {
            let draft = match form.validate() {
                Ok(draft) => draft,
                Err(errors) => {
                    // Never leave a staged snapshot beside invalid input.
                    session.data.post_flow.cancel();
                    state.sessions.save(&session).await?;
                    return Ok(form_page("create", None, &form, errors).into_response());
                }
            };

            match session.data.post_flow.take_staged() {
                Some((staged, _)) => {
                    // The marker is gone whatever happens next; a failed
                    // commit must not leave a confirm page behind.
                    state.sessions.save(&session).await?;

                    // New posts always start active, whatever the preview said.
                    let result = Post::create(
                        &state.db,
                        user.id,
                        staged.title,
                        staged.description,
                        PostStatus::Active,
                    )
                    .await;

                    match result {
                        Ok(_) => Ok(found("/")),
                        Err(e) => {
                            let message = ApiError::from(e).to_string();
                            Ok(form_page("create", None, &form, FormErrors::form_level(message))
                                .into_response())
                        }
                    }
                }
                None => {
                    session.data.post_flow.stage(draft.clone(), None);
                    state.sessions.save(&session).await?;

                    Ok(Json(PostFormPage {
                        operation: "create",
                        id: None,
                        values: PostFormValues {
                            title: draft.title,
                            description: draft.description,
                            status: None,
                        },
                        errors: FormErrors::default(),
                        save_confirm_page: true,
                    })
                    .into_response())
                }
            }
        }
        None => Ok(create_page(Extension(session)).await.into_response()),
    }
}

/// Renders the edit form for a post, echoing any staged snapshot (GET)
pub async fn edit_page(
    State(state): State<AppState>,
    Extension(session): Extension<Session>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<PostFormPage>> {
    let post = Post::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    let flow = &session.data.post_flow;

    let values = match flow.staged() {
        Some(draft) => PostFormValues {
            title: draft.title.clone(),
            description: draft.description.clone(),
            status: Some(draft.status),
        },
        None => PostFormValues {
            title: post.title,
            description: post.description,
            status: Some(post.status),
        },
    };

    Ok(Json(PostFormPage {
        operation: "edit",
        id: Some(id),
        values,
        errors: FormErrors::default(),
        save_confirm_page: flow.is_staged(),
    }))
}

/// Drives the post edit flow (POST)
pub async fn edit_submit(
    State(state): State<AppState>,
    Extension(mut session): Extension<Session>,
    Extension(user): Extension<User>,
    Path(id): Path<Uuid>,
    Form(form): Form<PostEditorForm>,
) -> ApiResult<Response> {
    // The target has to exist whichever phase we are in.
    Post::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    match form.intent() {
        Some(FormIntent::Cancel) => {
            session.data.post_flow.cancel();
            state.sessions.save(&session).await?;
            Ok(found(&format!("/post/{id}/")))
        }
        Some(FormIntent::Save) => {
            let draft = match form.validate() {
                Ok(draft) => draft,
                Err(errors) => {
                    session.data.post_flow.cancel();
                    state.sessions.save(&session).await?;
                    return Ok(form_page("edit", Some(id), &form, errors).into_response());
                }
            };

            match session.data.post_flow.take_staged() {
                Some((staged, _)) => {
                    state.sessions.save(&session).await?;

                    match Post::update(&state.db, id, user.id, &staged).await {
                        Ok(Some(_)) => Ok(found("/")),
                        Ok(None) => {
                            Err(ApiError::NotFound("Post not found".to_string()))
                        }
                        Err(e) => {
                            let message = ApiError::from(e).to_string();
                            Ok(form_page("edit", Some(id), &form, FormErrors::form_level(message))
                                .into_response())
                        }
                    }
                }
                None => {
                    session.data.post_flow.stage(draft.clone(), None);
                    state.sessions.save(&session).await?;

                    Ok(Json(PostFormPage {
                        operation: "edit",
                        id: Some(id),
                        values: PostFormValues {
                            title: draft.title,
                            description: draft.description,
                            status: Some(draft.status),
                        },
                        errors: FormErrors::default(),
                        save_confirm_page: true,
                    })
                    .into_response())
                }
            }
        }
        None => Ok(edit_page(State(state), Extension(session), Path(id))
            .await?
            .into_response()),
    }
}

/// JSON detail payload with creator/updater names resolved
pub async fn detail(
    State(state): State<AppState>,
    Query(query): Query<PostIdQuery>,
) -> ApiResult<Json<PostDetail>> {
    let detail = Post::find_detail(&state.db, query.post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    Ok(Json(detail))
}

/// Bare record payload for the delete-confirmation dialog
pub async fn delete_confirm(
    State(state): State<AppState>,
    Query(query): Query<PostIdQuery>,
) -> ApiResult<Json<Post>> {
    let post = Post::find_by_id(&state.db, query.post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    Ok(Json(post))
}

/// Soft-deletes a post and returns to the list
pub async fn delete(
    State(state): State<AppState>,
    Extension(user): Extension<User>,
    Query(query): Query<PostIdQuery>,
) -> ApiResult<Response> {
    Post::find_by_id(&state.db, query.post_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Post not found".to_string()))?;

    Post::soft_delete(&state.db, query.post_id, user.id).await?;

    tracing::info!(post_id = %query.post_id, actor = %user.id, "Post soft-deleted");
    Ok(found("/"))
}

/// Re-renders a form page with the submitted values and their errors
fn form_page(
    operation: &'static str,
    id: Option<Uuid>,
    form: &PostEditorForm,
    errors: FormErrors,
) -> Json<PostFormPage> {
    Json(PostFormPage {
        operation,
        id,
        values: PostFormValues {
            title: form.title.clone().unwrap_or_default(),
            description: form.description.clone().unwrap_or_default(),
            status: id.map(|_| PostStatus::from_checkbox(form.post_status.is_some())),
        },
        errors,
        save_confirm_page: false,
    })
}
