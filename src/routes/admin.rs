use askama::Template;
use axum::extract::{Path, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};

use crate::error::{ApiResult, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::flash::{redirect_with, Flash, IncomingFlash};
use crate::routes::home::{parse_and_format_time, render_page, PageChrome};
use crate::state::AppState;

pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub is_admin: bool,
    pub blocked: bool,
    pub joined: String,
}

pub struct PostRow {
    pub id: i64,
    pub author: String,
    pub content: String,
    pub image_url: String,
    pub created_at: String,
    pub is_deleted: bool,
}

#[derive(Template)]
#[template(path = "pages/admin.html")]
pub struct AdminTemplate {
    pub chrome: PageChrome,
    pub users: Vec<UserRow>,
    pub posts: Vec<PostRow>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin", get(admin_page))
        .route("/admin/block/{user_id}", post(block_user))
        .route("/admin/unblock/{user_id}", post(unblock_user))
        .route("/admin/delete_post/{post_id}", post(delete_post))
        .route("/admin/restore_post/{post_id}", post(restore_post))
}

async fn admin_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: IncomingFlash,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(Redirect::to("/login").into_response());
    };
    if !user.is_admin {
        return Ok(redirect_with("/", Flash::error("Admin only.")));
    }

    let overview = state.moderation().overview(&user)?;
    let users = overview
        .users
        .into_iter()
        .map(|u| UserRow {
            id: u.id,
            username: u.username,
            email: u.email,
            is_admin: u.is_admin,
            blocked: u.blocked,
            joined: parse_and_format_time(&u.created_at),
        })
        .collect();
    let posts = overview
        .posts
        .into_iter()
        .map(|p| PostRow {
            id: p.id,
            author: p.author,
            content: p.content,
            image_url: p.image_url.unwrap_or_default(),
            created_at: parse_and_format_time(&p.created_at),
            is_deleted: p.is_deleted,
        })
        .collect();

    let chrome = PageChrome::new(Some(&user), flash.0.as_ref());
    Ok(render_page(AdminTemplate { chrome, users, posts }, &flash))
}

async fn block_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.moderation().block_user(&admin, user_id)?;
    Ok(Json(json!({ "ok": true })))
}

async fn unblock_user(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(user_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.moderation().unblock_user(&admin, user_id)?;
    Ok(Json(json!({ "ok": true })))
}

async fn delete_post(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.moderation().soft_delete_post(&admin, post_id)?;
    Ok(Json(json!({ "ok": true })))
}

async fn restore_post(
    State(state): State<AppState>,
    admin: CurrentUser,
    Path(post_id): Path<i64>,
) -> ApiResult<Json<Value>> {
    state.moderation().restore_post(&admin, post_id)?;
    Ok(Json(json!({ "ok": true })))
}
