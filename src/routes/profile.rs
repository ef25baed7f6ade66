use askama::Template;
use axum::extract::{Multipart, State};
use axum::response::{IntoResponse, Redirect, Response};
use axum::routing::{get, post};
use axum::Router;

use crate::content::ProfileStats;
use crate::error::{AppError, AppResult};
use crate::extractors::{CurrentUser, MaybeUser};
use crate::flash::{redirect_with, Flash, IncomingFlash};
use crate::routes::home::{render_page, PageChrome};
use crate::routes::multipart::read_upload_form;
use crate::state::AppState;

#[derive(Template)]
#[template(path = "pages/profile.html")]
pub struct ProfileTemplate {
    pub chrome: PageChrome,
    pub email: String,
    pub avatar_url: String,
    pub joined: String,
    pub stats: ProfileStats,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/profile", get(profile_page))
        .route("/profile/avatar", post(update_avatar))
}

async fn profile_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: IncomingFlash,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(Redirect::to("/login").into_response());
    };

    let account = state
        .auth()
        .find_user(user.id)?
        .ok_or_else(|| AppError::NotFound("User not found.".into()))?;
    let stats = state.content().profile_stats(&user)?;

    let chrome = PageChrome::new(Some(&user), flash.0.as_ref());
    Ok(render_page(
        ProfileTemplate {
            chrome,
            email: account.email,
            avatar_url: account.avatar_url.unwrap_or_default(),
            joined: account.created_at,
            stats,
        },
        &flash,
    ))
}

async fn update_avatar(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    multipart: Multipart,
) -> Response {
    let Some(user) = user else {
        return Redirect::to("/login").into_response();
    };

    match replace_avatar(&state, &user, multipart).await {
        Ok(()) => redirect_with("/profile", Flash::success("Avatar updated.")),
        Err(e) => redirect_with("/profile", Flash::from_error(&e)),
    }
}

async fn replace_avatar(state: &AppState, user: &CurrentUser, multipart: Multipart) -> AppResult<()> {
    let form = read_upload_form(multipart, "avatar").await?;
    let url = state
        .media
        .save_image(form.file.as_ref())?
        .ok_or_else(|| AppError::Validation("Invalid image format.".into()))?;
    state.auth().update_avatar(user, &url)
}
