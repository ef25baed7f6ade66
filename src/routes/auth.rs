use askama::Template;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};
use axum::routing::get;
use axum::{Form, Router};
use serde::Deserialize;

use crate::auth::Role;
use crate::error::{AppError, AppResult};
use crate::extractors::{MaybeUser, SessionToken};
use crate::flash::{redirect_with, Flash, IncomingFlash};
use crate::routes::home::{render_page, PageChrome};
use crate::state::AppState;

// -- Templates --

#[derive(Template)]
#[template(path = "pages/login.html")]
pub struct LoginTemplate {
    pub chrome: PageChrome,
    pub admin_username: String,
}

#[derive(Template)]
#[template(path = "pages/register.html")]
pub struct RegisterTemplate {
    pub chrome: PageChrome,
}

// -- Request types --

#[derive(Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
}

#[derive(Deserialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub role: Role,
}

// -- Cookie helpers --

fn session_cookie(name: &str, token: &str, max_age_hours: u64) -> String {
    let max_age_secs = max_age_hours * 3600;
    format!(
        "{}={}; HttpOnly; SameSite=Strict; Path=/; Max-Age={}",
        name, token, max_age_secs
    )
}

fn clear_session_cookie(name: &str) -> String {
    format!("{}=; HttpOnly; SameSite=Strict; Path=/; Max-Age=0", name)
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/register", get(register_page).post(register))
        .route("/login", get(login_page).post(login))
        .route("/logout", get(logout))
}

/// bcrypt is deliberately slow; keep it off the async workers.
async fn blocking<T, F>(f: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .unwrap_or_else(|e| Err(AppError::Internal(format!("auth task failed: {}", e))))
}

// -- Handlers --

async fn register_page(MaybeUser(user): MaybeUser, flash: IncomingFlash) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    let chrome = PageChrome::new(None, flash.0.as_ref());
    render_page(RegisterTemplate { chrome }, &flash)
}

async fn register(State(state): State<AppState>, Form(form): Form<RegisterForm>) -> Response {
    let auth = state.auth();
    let result = blocking(move || auth.register(&form.username, &form.email, &form.password)).await;
    match result {
        Ok(_) => redirect_with(
            "/login",
            Flash::success("Registration successful. Please login."),
        ),
        Err(e) => redirect_with("/register", Flash::from_error(&e)),
    }
}

async fn login_page(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: IncomingFlash,
) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }
    let chrome = PageChrome::new(None, flash.0.as_ref());
    render_page(
        LoginTemplate {
            chrome,
            admin_username: state.config.admin.username.clone(),
        },
        &flash,
    )
}

async fn login(State(state): State<AppState>, Form(form): Form<LoginForm>) -> Response {
    let auth = state.auth();
    let result = blocking(move || auth.login(&form.username, &form.password, form.role)).await;
    match result {
        Ok(outcome) => {
            let cookie = session_cookie(
                &state.config.auth.cookie_name,
                &outcome.session.token,
                state.config.auth.session_hours,
            );
            let flash = Flash::success("Login successful.");
            (
                AppendHeaders([(SET_COOKIE, cookie), (SET_COOKIE, flash.cookie())]),
                Redirect::to("/"),
            )
                .into_response()
        }
        Err(e) => redirect_with("/login", Flash::from_error(&e)),
    }
}

async fn logout(State(state): State<AppState>, SessionToken(token): SessionToken) -> Response {
    if let Some(token) = token {
        if let Err(e) = state.auth().logout(&token) {
            tracing::error!("Failed to delete session: {}", e);
        }
    }

    let flash = Flash::info("Logged out.");
    (
        AppendHeaders([
            (SET_COOKIE, clear_session_cookie(&state.config.auth.cookie_name)),
            (SET_COOKIE, flash.cookie()),
        ]),
        Redirect::to("/login"),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn session_cookie_is_http_only_with_max_age() {
        let cookie = session_cookie("morphx_session", "abc", 2);
        assert_eq!(
            cookie,
            "morphx_session=abc; HttpOnly; SameSite=Strict; Path=/; Max-Age=7200"
        );
    }

    #[test]
    fn clear_cookie_expires_immediately() {
        assert!(clear_session_cookie("morphx_session").ends_with("Max-Age=0"));
    }
}
