use askama::Template;
use axum::extract::{Multipart, Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Form, Json, Router};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::{ApiResult, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::flash::{redirect_with, Flash, IncomingFlash};
use crate::routes::home::{render_page, PageChrome};
use crate::routes::multipart::read_upload_form;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/create_post.html")]
pub struct CreatePostTemplate {
    pub chrome: PageChrome,
    pub max_len: usize,
}

#[derive(Deserialize)]
pub struct CommentForm {
    #[serde(default)]
    pub content: String,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/create", get(create_page).post(create_post))
        .route("/like/{post_id}", post(toggle_like))
        .route("/comment/{id}", post(add_comment))
        .route("/post/{post_id}/delete", post(delete_post))
        .route("/comment/{id}/delete", post(delete_comment))
}

async fn create_page(MaybeUser(user): MaybeUser, flash: IncomingFlash) -> Response {
    let Some(user) = user else {
        return Redirect::to("/login").into_response();
    };
    let chrome = PageChrome::new(Some(&user), flash.0.as_ref());
    render_page(
        CreatePostTemplate {
            chrome,
            max_len: crate::content::MAX_POST_LEN,
        },
        &flash,
    )
}

async fn create_post(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    multipart: Multipart,
) -> Response {
    let Some(user) = user else {
        return Redirect::to("/login").into_response();
    };

    match publish(&state, &user, multipart).await {
        Ok(()) => redirect_with("/", Flash::success("Post created.")),
        Err(e) => redirect_with("/create", Flash::from_error(&e)),
    }
}

async fn publish(state: &AppState, user: &CurrentUser, multipart: Multipart) -> AppResult<()> {
    let form = read_upload_form(multipart, "image").await?;
    let image_url = state.media.save_image(form.file.as_ref())?;
    let created = state
        .content()
        .create_post(user, form.text("content"), image_url.as_deref());

    if let (Err(_), Some(url)) = (&created, &image_url) {
        if let Err(e) = state.media.discard(url) {
            tracing::warn!(url = %url, "Failed to discard upload of rejected post: {}", e);
        }
    }
    created.map(|_| ())
}

/// POST /like/{post_id} - `{ok, liked, count}`
async fn toggle_like(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    let toggle = state.content().toggle_like(&user, post_id)?;
    Ok(Json(json!({
        "ok": true,
        "liked": toggle.liked,
        "count": toggle.count,
    })))
}

async fn add_comment(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    Path(post_id): Path<i64>,
    Form(form): Form<CommentForm>,
) -> Response {
    let Some(user) = user else {
        return Redirect::to("/login").into_response();
    };

    match state.content().add_comment(&user, post_id, &form.content) {
        Ok(_) => redirect_with("/", Flash::success("Comment added.")),
        Err(e) => redirect_with("/", Flash::from_error(&e)),
    }
}

async fn delete_post(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.content().delete_post(&user, post_id)?;
    Ok(Json(json!({ "ok": true })))
}

async fn delete_comment(
    State(state): State<AppState>,
    user: CurrentUser,
    Path(comment_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.content().delete_comment(&user, comment_id)?;
    Ok(Json(json!({ "ok": true })))
}
