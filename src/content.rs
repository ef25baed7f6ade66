use std::collections::HashMap;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};
use serde::Serialize;

use crate::db::models::{Comment, Like, Post};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::DbPool;

pub const MAX_POST_LEN: usize = 2000;
pub const MAX_COMMENT_LEN: usize = 500;

/// A visible post as shown in the feed.
#[derive(Debug, Clone, Serialize)]
pub struct FeedPost {
    pub id: i64,
    pub content: String,
    pub image_url: Option<String>,
    pub author_id: i64,
    pub author: String,
    pub created_at: String,
    pub like_count: i64,
    pub liked_by_viewer: bool,
    pub comments: Vec<FeedComment>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeedComment {
    pub id: i64,
    pub content: String,
    pub author_id: i64,
    pub author: String,
    pub created_at: String,
}

/// Result of flipping a like.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LikeToggle {
    pub liked: bool,
    pub count: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ProfileStats {
    pub posts: i64,
    pub comments: i64,
    pub likes: i64,
}

/// Posts, comments and likes on behalf of a signed-in user.
pub struct ContentService {
    pool: DbPool,
}

impl ContentService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Publish a post. `image_url` is a reference already produced by the media store.
    pub fn create_post(
        &self,
        user: &CurrentUser,
        content: &str,
        image_url: Option<&str>,
    ) -> AppResult<Post> {
        let content = content.trim();
        let image_url = image_url.filter(|url| !url.is_empty());

        if content.is_empty() && image_url.is_none() {
            return Err(AppError::Validation(
                "Write something or add an image.".into(),
            ));
        }
        if content.chars().count() > MAX_POST_LEN {
            return Err(AppError::Validation(format!(
                "Post must be {} characters or less.",
                MAX_POST_LEN
            )));
        }

        let conn = self.pool.get()?;
        conn.execute(
            "INSERT INTO posts (content, image_url, user_id) VALUES (?1, ?2, ?3)",
            params![content, image_url, user.id],
        )?;
        let post = find_post(&conn, conn.last_insert_rowid())?
            .ok_or_else(|| AppError::Internal("created post vanished".into()))?;
        tracing::info!(post_id = post.id, user_id = user.id, "Post created");
        Ok(post)
    }

    /// Non-deleted posts, newest first, with likes and visible comments.
    pub fn list_feed(&self, viewer: Option<&CurrentUser>) -> AppResult<Vec<FeedPost>> {
        let conn = self.pool.get()?;
        let viewer_id = viewer.map(|v| v.id);

        let mut stmt = conn.prepare(
            "SELECT p.id, p.content, p.image_url, p.user_id, u.username, p.created_at,
                    (SELECT COUNT(*) FROM likes l WHERE l.post_id = p.id) AS like_count,
                    EXISTS(SELECT 1 FROM likes l WHERE l.post_id = p.id AND l.user_id = ?1) AS liked
             FROM posts p
             JOIN users u ON u.id = p.user_id
             WHERE p.is_deleted = 0
             ORDER BY p.created_at DESC, p.id DESC",
        )?;
        let mut posts = stmt
            .query_map(params![viewer_id], |row| {
                Ok(FeedPost {
                    id: row.get(0)?,
                    content: row.get(1)?,
                    image_url: row.get(2)?,
                    author_id: row.get(3)?,
                    author: row.get(4)?,
                    created_at: row.get(5)?,
                    like_count: row.get(6)?,
                    liked_by_viewer: row.get(7)?,
                    comments: Vec::new(),
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut comments = visible_comments_by_post(&conn)?;
        for post in &mut posts {
            if let Some(list) = comments.remove(&post.id) {
                post.comments = list;
            }
        }

        Ok(posts)
    }

    pub fn find_post(&self, post_id: i64) -> AppResult<Option<Post>> {
        let conn = self.pool.get()?;
        Ok(find_post(&conn, post_id)?)
    }

    /// Like the post, or take the like back if the user already liked it.
    pub fn toggle_like(&self, user: &CurrentUser, post_id: i64) -> AppResult<LikeToggle> {
        let mut conn = self.pool.get()?;
        // Write lock up front so concurrent toggles wait on busy_timeout.
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        visible_post(&tx, post_id)?;

        let liked = match find_like(&tx, user.id, post_id)? {
            Some(like) => {
                tx.execute("DELETE FROM likes WHERE id = ?1", params![like.id])?;
                false
            }
            None => {
                // A concurrent duplicate lands on the UNIQUE(user_id, post_id) constraint.
                tx.execute(
                    "INSERT INTO likes (user_id, post_id) VALUES (?1, ?2)
                     ON CONFLICT(user_id, post_id) DO NOTHING",
                    params![user.id, post_id],
                )?;
                true
            }
        };

        let count: i64 = tx.query_row(
            "SELECT COUNT(*) FROM likes WHERE post_id = ?1",
            params![post_id],
            |row| row.get(0),
        )?;
        tx.commit()?;

        tracing::debug!(post_id, user_id = user.id, liked, count, "Like toggled");
        Ok(LikeToggle { liked, count })
    }

    pub fn add_comment(&self, user: &CurrentUser, post_id: i64, content: &str) -> AppResult<Comment> {
        let content = content.trim();

        let conn = self.pool.get()?;
        visible_post(&conn, post_id)?;

        if content.is_empty() {
            return Err(AppError::Validation("Comment cannot be empty.".into()));
        }
        if content.chars().count() > MAX_COMMENT_LEN {
            return Err(AppError::Validation(format!(
                "Comment must be {} characters or less.",
                MAX_COMMENT_LEN
            )));
        }

        conn.execute(
            "INSERT INTO comments (content, user_id, post_id) VALUES (?1, ?2, ?3)",
            params![content, user.id, post_id],
        )?;
        let comment = conn.query_row(
            &format!("SELECT {} FROM comments WHERE id = ?1", Comment::COLUMNS),
            params![conn.last_insert_rowid()],
            Comment::from_row,
        )?;
        tracing::info!(comment_id = comment.id, post_id, user_id = user.id, "Comment added");
        Ok(comment)
    }

    /// Soft-delete a post. Only its author or an admin may do this.
    pub fn delete_post(&self, user: &CurrentUser, post_id: i64) -> AppResult<()> {
        let conn = self.pool.get()?;
        let post = find_post(&conn, post_id)?
            .ok_or_else(|| AppError::NotFound("Post not found.".into()))?;

        if post.user_id != user.id && !user.is_admin {
            return Err(AppError::Forbidden("You can only delete your own posts.".into()));
        }

        conn.execute("UPDATE posts SET is_deleted = 1 WHERE id = ?1", params![post_id])?;
        tracing::info!(post_id, user_id = user.id, "Post deleted");
        Ok(())
    }

    /// Soft-delete a comment. Only its author or an admin may do this.
    pub fn delete_comment(&self, user: &CurrentUser, comment_id: i64) -> AppResult<()> {
        let conn = self.pool.get()?;
        let comment = conn
            .query_row(
                &format!("SELECT {} FROM comments WHERE id = ?1", Comment::COLUMNS),
                params![comment_id],
                Comment::from_row,
            )
            .optional()?
            .ok_or_else(|| AppError::NotFound("Comment not found.".into()))?;

        if comment.user_id != user.id && !user.is_admin {
            return Err(AppError::Forbidden(
                "You can only delete your own comments.".into(),
            ));
        }

        conn.execute(
            "UPDATE comments SET is_deleted = 1 WHERE id = ?1",
            params![comment_id],
        )?;
        tracing::info!(comment_id, user_id = user.id, "Comment deleted");
        Ok(())
    }

    pub fn profile_stats(&self, user: &CurrentUser) -> AppResult<ProfileStats> {
        let conn = self.pool.get()?;
        let count = |sql: &str| -> rusqlite::Result<i64> {
            conn.query_row(sql, params![user.id], |row| row.get(0))
        };
        Ok(ProfileStats {
            posts: count("SELECT COUNT(*) FROM posts WHERE user_id = ?1 AND is_deleted = 0")?,
            comments: count("SELECT COUNT(*) FROM comments WHERE user_id = ?1 AND is_deleted = 0")?,
            likes: count("SELECT COUNT(*) FROM likes WHERE user_id = ?1")?,
        })
    }
}

fn find_post(conn: &Connection, post_id: i64) -> rusqlite::Result<Option<Post>> {
    conn.query_row(
        &format!("SELECT {} FROM posts WHERE id = ?1", Post::COLUMNS),
        params![post_id],
        Post::from_row,
    )
    .optional()
}

/// The post, if it exists and has not been soft-deleted.
fn visible_post(conn: &Connection, post_id: i64) -> AppResult<Post> {
    match find_post(conn, post_id)? {
        Some(post) if !post.is_deleted => Ok(post),
        Some(_) => Err(AppError::NotFound("Post removed.".into())),
        None => Err(AppError::NotFound("Post not found.".into())),
    }
}

fn find_like(conn: &Connection, user_id: i64, post_id: i64) -> rusqlite::Result<Option<Like>> {
    conn.query_row(
        "SELECT id, user_id, post_id, created_at FROM likes WHERE user_id = ?1 AND post_id = ?2",
        params![user_id, post_id],
        |row| {
            Ok(Like {
                id: row.get(0)?,
                user_id: row.get(1)?,
                post_id: row.get(2)?,
                created_at: row.get(3)?,
            })
        },
    )
    .optional()
}

fn visible_comments_by_post(conn: &Connection) -> rusqlite::Result<HashMap<i64, Vec<FeedComment>>> {
    let mut stmt = conn.prepare(
        "SELECT c.post_id, c.id, c.content, c.user_id, u.username, c.created_at
         FROM comments c
         JOIN users u ON u.id = c.user_id
         JOIN posts p ON p.id = c.post_id
         WHERE c.is_deleted = 0 AND p.is_deleted = 0
         ORDER BY c.created_at ASC, c.id ASC",
    )?;

    let mut by_post: HashMap<i64, Vec<FeedComment>> = HashMap::new();
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, i64>(0)?,
            FeedComment {
                id: row.get(1)?,
                content: row.get(2)?,
                author_id: row.get(3)?,
                author: row.get(4)?,
                created_at: row.get(5)?,
            },
        ))
    })?;
    for row in rows {
        let (post_id, comment) = row?;
        by_post.entry(post_id).or_default().push(comment);
    }
    Ok(by_post)
}
