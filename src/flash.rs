//! One-shot notices carried across a redirect in a short-lived cookie.

use axum::extract::FromRequestParts;
use axum::http::header::SET_COOKIE;
use axum::http::request::Parts;
use axum::response::{AppendHeaders, IntoResponse, Redirect, Response};

use crate::error::AppError;
use crate::extractors::get_cookie_value;
use crate::state::AppState;

pub const FLASH_COOKIE: &str = "morphx_flash";
pub const CLEAR_FLASH_COOKIE: &str = "morphx_flash=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlashLevel {
    Success,
    Info,
    Error,
}

impl FlashLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlashLevel::Success => "success",
            FlashLevel::Info => "info",
            FlashLevel::Error => "error",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "success" => Some(FlashLevel::Success),
            "info" => Some(FlashLevel::Info),
            "error" => Some(FlashLevel::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Flash {
    pub level: FlashLevel,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Success,
            message: message.into(),
        }
    }

    pub fn info(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Info,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            level: FlashLevel::Error,
            message: message.into(),
        }
    }

    /// The user-facing message for a failed request.
    pub fn from_error(err: &AppError) -> Self {
        Self::error(err.public_message())
    }

    /// Cookie value: `{level}.{hex(message)}`. Hex keeps the value inside the
    /// cookie-octet alphabet whatever the message contains.
    pub fn encode(&self) -> String {
        format!("{}.{}", self.level.as_str(), hex::encode(self.message.as_bytes()))
    }

    pub fn decode(value: &str) -> Option<Self> {
        let (level, payload) = value.split_once('.')?;
        let level = FlashLevel::parse(level)?;
        let bytes = hex::decode(payload).ok()?;
        let message = String::from_utf8(bytes).ok()?;
        Some(Self { level, message })
    }

    pub fn cookie(&self) -> String {
        format!(
            "{}={}; HttpOnly; SameSite=Lax; Path=/; Max-Age=60",
            FLASH_COOKIE,
            self.encode()
        )
    }
}

/// Redirect (303) and leave a flash message for the next page.
pub fn redirect_with(to: &str, flash: Flash) -> Response {
    (
        AppendHeaders([(SET_COOKIE, flash.cookie())]),
        Redirect::to(to),
    )
        .into_response()
}

/// Flash message sent by the browser, if any.
pub struct IncomingFlash(pub Option<Flash>);

impl FromRequestParts<AppState> for IncomingFlash {
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        _state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        Ok(IncomingFlash(
            get_cookie_value(parts, FLASH_COOKIE).and_then(Flash::decode),
        ))
    }
}
