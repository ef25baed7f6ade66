use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;

use crate::auth::session;
use crate::db::models::User;
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::DbPool;

/// A post as listed on the admin page, deleted or not.
#[derive(Debug, Clone, Serialize)]
pub struct ModeratedPost {
    pub id: i64,
    pub content: String,
    pub image_url: Option<String>,
    pub author: String,
    pub created_at: String,
    pub is_deleted: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct AdminOverview {
    pub users: Vec<User>,
    pub posts: Vec<ModeratedPost>,
}

/// Admin-only actions over users and posts. Every operation checks the caller's role.
pub struct ModerationService {
    pool: DbPool,
}

impl ModerationService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub fn overview(&self, admin: &CurrentUser) -> AppResult<AdminOverview> {
        require_admin(admin)?;
        let conn = self.pool.get()?;

        let users = {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users ORDER BY created_at DESC, id DESC",
                User::COLUMNS
            ))?;
            let rows = stmt.query_map([], User::from_row)?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        let posts = {
            let mut stmt = conn.prepare(
                "SELECT p.id, p.content, p.image_url, u.username, p.created_at, p.is_deleted
                 FROM posts p
                 JOIN users u ON u.id = p.user_id
                 ORDER BY p.created_at DESC, p.id DESC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(ModeratedPost {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    image_url: row.get(2)?,
                    author: row.get(3)?,
                    created_at: row.get(4)?,
                    is_deleted: row.get(5)?,
                })
            })?;
            rows.collect::<Result<Vec<_>, _>>()?
        };

        Ok(AdminOverview { users, posts })
    }

    /// Block a user and end their sessions. Admin accounts cannot be blocked.
    pub fn block_user(&self, admin: &CurrentUser, user_id: i64) -> AppResult<()> {
        require_admin(admin)?;
        let mut conn = self.pool.get()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let target = find_user(&tx, user_id)?;
        if target.is_admin {
            return Err(AppError::Validation("Cannot block admin".into()));
        }

        tx.execute("UPDATE users SET blocked = 1 WHERE id = ?1", params![user_id])?;
        let dropped = session::delete_user_sessions(&tx, user_id)?;
        tx.commit()?;

        tracing::info!(user_id, admin_id = admin.id, sessions_dropped = dropped, "User blocked");
        Ok(())
    }

    pub fn unblock_user(&self, admin: &CurrentUser, user_id: i64) -> AppResult<()> {
        require_admin(admin)?;
        let conn = self.pool.get()?;
        find_user(&conn, user_id)?;

        conn.execute("UPDATE users SET blocked = 0 WHERE id = ?1", params![user_id])?;
        tracing::info!(user_id, admin_id = admin.id, "User unblocked");
        Ok(())
    }

    /// Hide a post from the feed. The row and its comments and likes stay in place.
    pub fn soft_delete_post(&self, admin: &CurrentUser, post_id: i64) -> AppResult<()> {
        self.set_post_deleted(admin, post_id, true)
    }

    pub fn restore_post(&self, admin: &CurrentUser, post_id: i64) -> AppResult<()> {
        self.set_post_deleted(admin, post_id, false)
    }

    fn set_post_deleted(&self, admin: &CurrentUser, post_id: i64, deleted: bool) -> AppResult<()> {
        require_admin(admin)?;
        let conn = self.pool.get()?;
        let updated = conn.execute(
            "UPDATE posts SET is_deleted = ?1 WHERE id = ?2",
            params![deleted, post_id],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound("Post not found.".into()));
        }
        tracing::info!(post_id, admin_id = admin.id, deleted, "Post visibility changed");
        Ok(())
    }
}

fn require_admin(user: &CurrentUser) -> AppResult<()> {
    if user.is_admin {
        Ok(())
    } else {
        Err(AppError::Forbidden("Admin only.".into()))
    }
}

fn find_user(conn: &Connection, user_id: i64) -> AppResult<User> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        params![user_id],
        User::from_row,
    )
    .optional()?
    .ok_or_else(|| AppError::NotFound("User not found.".into()))
}
