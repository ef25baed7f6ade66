use rusqlite::Row;
use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub is_admin: bool,
    pub blocked: bool,
    pub avatar_url: Option<String>,
    pub created_at: String,
}

impl User {
    pub const COLUMNS: &'static str =
        "id, username, email, password_hash, is_admin, blocked, avatar_url, created_at";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            username: row.get(1)?,
            email: row.get(2)?,
            password_hash: row.get(3)?,
            is_admin: row.get(4)?,
            blocked: row.get(5)?,
            avatar_url: row.get(6)?,
            created_at: row.get(7)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub id: String,
    pub user_id: i64,
    pub token: String,
    pub expires_at: String,
    pub created_at: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Post {
    pub id: i64,
    pub content: String,
    pub image_url: Option<String>,
    pub user_id: i64,
    pub created_at: String,
    pub is_deleted: bool,
}

impl Post {
    pub const COLUMNS: &'static str = "id, content, image_url, user_id, created_at, is_deleted";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            image_url: row.get(2)?,
            user_id: row.get(3)?,
            created_at: row.get(4)?,
            is_deleted: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: i64,
    pub content: String,
    pub user_id: i64,
    pub post_id: i64,
    pub created_at: String,
    pub is_deleted: bool,
}

impl Comment {
    pub const COLUMNS: &'static str = "id, content, user_id, post_id, created_at, is_deleted";

    pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            content: row.get(1)?,
            user_id: row.get(2)?,
            post_id: row.get(3)?,
            created_at: row.get(4)?,
            is_deleted: row.get(5)?,
        })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Like {
    pub id: i64,
    pub user_id: i64,
    pub post_id: i64,
    pub created_at: String,
}
