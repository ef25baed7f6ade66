use axum::extract::FromRequestParts;
use axum::http::header;
use axum::http::request::Parts;

use crate::auth::session;
use crate::db::models::User;
use crate::error::{ApiError, AppError};
use crate::state::AppState;

/// Represents the currently authenticated user.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub id: i64,
    pub username: String,
    pub is_admin: bool,
}

impl From<&User> for CurrentUser {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            username: user.username.clone(),
            is_admin: user.is_admin,
        }
    }
}

/// Extractor that requires authentication.
/// Rejects with a JSON `{ok: false}` 401 when no valid session is found.
impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let token = get_cookie_value(parts, &state.config.auth.cookie_name)
            .ok_or_else(|| AppError::Auth("Login required.".into()))?;

        let conn = state.db.get()?;
        let user = session::find_session_user(&conn, token)?
            .ok_or_else(|| AppError::Auth("Login required.".into()))?;
        Ok(CurrentUser::from(&user))
    }
}

/// Optional user extractor - returns None instead of 401 when not authenticated.
pub struct MaybeUser(pub Option<CurrentUser>);

impl FromRequestParts<AppState> for MaybeUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        match CurrentUser::from_request_parts(parts, state).await {
            Ok(user) => Ok(MaybeUser(Some(user))),
            Err(ApiError(AppError::Auth(_))) => Ok(MaybeUser(None)),
            Err(other) => Err(other),
        }
    }
}

/// The session token carried by the request, if any.
pub struct SessionToken(pub Option<String>);

impl FromRequestParts<AppState> for SessionToken {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(SessionToken(
            get_cookie_value(parts, &state.config.auth.cookie_name).map(str::to_string),
        ))
    }
}

pub fn get_cookie_value<'a>(parts: &'a Parts, name: &str) -> Option<&'a str> {
    parts
        .headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|s| s.split(';'))
        .map(|s| s.trim())
        .find_map(|cookie| {
            let mut split = cookie.splitn(2, '=');
            let key = split.next()?.trim();
            let val = split.next()?.trim();
            if key == name && !val.is_empty() {
                Some(val)
            } else {
                None
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Request;

    fn parts_with_cookie(cookie: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(header::COOKIE, cookie)
            .body(())
            .unwrap()
            .into_parts();
        parts
    }

    #[test]
    fn finds_named_cookie_among_others() {
        let parts = parts_with_cookie("theme=dark; morphx_session=abc123; other=1");
        assert_eq!(get_cookie_value(&parts, "morphx_session"), Some("abc123"));
    }

    #[test]
    fn missing_cookie_is_none() {
        let parts = parts_with_cookie("theme=dark");
        assert_eq!(get_cookie_value(&parts, "morphx_session"), None);
    }

    #[test]
    fn cleared_cookie_is_none() {
        let parts = parts_with_cookie("morphx_session=");
        assert_eq!(get_cookie_value(&parts, "morphx_session"), None);
    }
}
