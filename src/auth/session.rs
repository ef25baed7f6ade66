use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::models::{Session, User};

/// Create a new session for a user, valid for `hours`.
pub fn create_session(
    conn: &Connection,
    user_id: i64,
    hours: u64,
) -> Result<Session, rusqlite::Error> {
    let token = generate_token();
    let id = uuid::Uuid::now_v7().to_string();

    conn.execute(
        "INSERT INTO sessions (id, user_id, token, expires_at) VALUES (?1, ?2, ?3, datetime('now', ?4))",
        params![id, user_id, token, format!("+{} hours", hours)],
    )?;

    conn.query_row(
        "SELECT id, user_id, token, expires_at, created_at FROM sessions WHERE id = ?1",
        params![id],
        |row| {
            Ok(Session {
                id: row.get(0)?,
                user_id: row.get(1)?,
                token: row.get(2)?,
                expires_at: row.get(3)?,
                created_at: row.get(4)?,
            })
        },
    )
}

/// Delete a session by token.
pub fn delete_session(conn: &Connection, token: &str) -> Result<(), rusqlite::Error> {
    conn.execute("DELETE FROM sessions WHERE token = ?1", params![token])?;
    Ok(())
}

/// Drop every session a user holds. Returns how many were removed.
pub fn delete_user_sessions(conn: &Connection, user_id: i64) -> Result<usize, rusqlite::Error> {
    conn.execute("DELETE FROM sessions WHERE user_id = ?1", params![user_id])
}

/// Resolve an unexpired session token to its user. Blocked non-admin users resolve to nothing.
pub fn find_session_user(conn: &Connection, token: &str) -> Result<Option<User>, rusqlite::Error> {
    conn.query_row(
        "SELECT u.id, u.username, u.email, u.password_hash, u.is_admin, u.blocked, u.avatar_url, u.created_at
         FROM sessions s
         JOIN users u ON u.id = s.user_id
         WHERE s.token = ?1
           AND s.expires_at > datetime('now')
           AND (u.blocked = 0 OR u.is_admin = 1)",
        params![token],
        User::from_row,
    )
    .optional()
}

/// Generate a cryptographically random 32-byte hex token.
fn generate_token() -> String {
    let mut rng = rand::thread_rng();
    let bytes: [u8; 32] = rng.gen();
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
