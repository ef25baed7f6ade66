use askama::Template;
use axum::extract::State;
use axum::http::header::SET_COOKIE;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use chrono::{NaiveDateTime, Utc};

use crate::content::FeedPost;
use crate::error::AppResult;
use crate::extractors::{CurrentUser, MaybeUser};
use crate::flash::{Flash, IncomingFlash, CLEAR_FLASH_COOKIE};
use crate::state::AppState;

/// Navigation and flash data shared by every page layout.
pub struct PageChrome {
    pub logged_in: bool,
    pub username: String,
    pub is_admin: bool,
    pub flash_level: &'static str,
    pub flash_text: String,
}

impl PageChrome {
    pub fn new(user: Option<&CurrentUser>, flash: Option<&Flash>) -> Self {
        Self {
            logged_in: user.is_some(),
            username: user.map(|u| u.username.clone()).unwrap_or_default(),
            is_admin: user.map(|u| u.is_admin).unwrap_or(false),
            flash_level: flash.map(|f| f.level.as_str()).unwrap_or(""),
            flash_text: flash.map(|f| f.message.clone()).unwrap_or_default(),
        }
    }
}

/// Wrapper to render askama templates as axum responses
pub struct Html<T: Template>(pub T);

impl<T: Template> IntoResponse for Html<T> {
    fn into_response(self) -> Response {
        match self.0.render() {
            Ok(body) => (
                StatusCode::OK,
                [(header::CONTENT_TYPE, "text/html; charset=utf-8")],
                body,
            )
                .into_response(),
            Err(e) => {
                tracing::error!("Template render error: {}", e);
                (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
            }
        }
    }
}

/// Render a page, expiring the flash cookie if its message was shown.
pub fn render_page<T: Template>(template: T, flash: &IncomingFlash) -> Response {
    let mut response = Html(template).into_response();
    if flash.0.is_some() {
        response
            .headers_mut()
            .append(SET_COOKIE, HeaderValue::from_static(CLEAR_FLASH_COOKIE));
    }
    response
}

pub struct PostView {
    pub id: i64,
    pub author: String,
    pub content: String,
    pub image_url: String,
    pub created_at: String,
    pub like_count: i64,
    pub liked: bool,
    pub can_delete: bool,
    pub comments: Vec<CommentView>,
}

pub struct CommentView {
    pub id: i64,
    pub author: String,
    pub content: String,
    pub created_at: String,
    pub can_delete: bool,
}

impl PostView {
    fn build(post: FeedPost, viewer: &CurrentUser) -> Self {
        let can_moderate = |author_id: i64| author_id == viewer.id || viewer.is_admin;
        Self {
            id: post.id,
            can_delete: can_moderate(post.author_id),
            author: post.author,
            content: post.content,
            image_url: post.image_url.unwrap_or_default(),
            created_at: parse_and_format_time(&post.created_at),
            like_count: post.like_count,
            liked: post.liked_by_viewer,
            comments: post
                .comments
                .into_iter()
                .map(|c| CommentView {
                    id: c.id,
                    can_delete: can_moderate(c.author_id),
                    author: c.author,
                    content: c.content,
                    created_at: parse_and_format_time(&c.created_at),
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "pages/index.html")]
pub struct IndexTemplate {
    pub chrome: PageChrome,
    pub posts: Vec<PostView>,
}

#[derive(Template)]
#[template(path = "pages/about.html")]
pub struct AboutTemplate {
    pub chrome: PageChrome,
}

pub async fn index(
    State(state): State<AppState>,
    MaybeUser(user): MaybeUser,
    flash: IncomingFlash,
) -> AppResult<Response> {
    let Some(user) = user else {
        return Ok(Redirect::to("/login").into_response());
    };

    let posts = state
        .content()
        .list_feed(Some(&user))?
        .into_iter()
        .map(|post| PostView::build(post, &user))
        .collect();

    let chrome = PageChrome::new(Some(&user), flash.0.as_ref());
    Ok(render_page(IndexTemplate { chrome, posts }, &flash))
}

pub async fn about(MaybeUser(user): MaybeUser, flash: IncomingFlash) -> Response {
    let chrome = PageChrome::new(user.as_ref(), flash.0.as_ref());
    render_page(AboutTemplate { chrome }, &flash)
}

// --- Time formatting ---

pub fn parse_and_format_time(db_time: &str) -> String {
    NaiveDateTime::parse_from_str(db_time, "%Y-%m-%d %H:%M:%S")
        .map(|dt| format_relative_time(&dt))
        .unwrap_or_else(|_| db_time.to_string())
}

pub fn format_relative_time(dt: &NaiveDateTime) -> String {
    let now = Utc::now().naive_utc();
    let diff = now.signed_duration_since(*dt);

    let seconds = diff.num_seconds();
    if seconds < 60 {
        return "just now".to_string();
    }

    let minutes = diff.num_minutes();
    if minutes < 60 {
        return format!("{}m ago", minutes);
    }

    let hours = diff.num_hours();
    if hours < 24 {
        return format!("{}h ago", hours);
    }

    let days = diff.num_days();
    if days < 7 {
        return format!("{}d ago", days);
    }

    dt.format("%b %-d, %Y").to_string()
}
