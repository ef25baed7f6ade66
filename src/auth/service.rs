use rusqlite::{params, Connection, OptionalExtension};
use serde::Deserialize;

use crate::auth::password::{hash_password, verify_password};
use crate::auth::session;
use crate::config::{AdminConfig, AuthConfig};
use crate::db::models::{Session, User};
use crate::error::{AppError, AppResult};
use crate::extractors::CurrentUser;
use crate::state::DbPool;

const MAX_USERNAME_LEN: usize = 48;
const MAX_EMAIL_LEN: usize = 120;
const DUPLICATE_ACCOUNT: &str = "Username or Email already exists.";
const BAD_CREDENTIALS: &str = "Invalid username or password.";

/// Which login form the caller used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    User,
    Admin,
}

#[derive(Debug)]
pub struct LoginOutcome {
    pub user: User,
    pub session: Session,
}

/// Accounts, credentials and sessions.
pub struct AuthService {
    pool: DbPool,
    admin: AdminConfig,
    auth: AuthConfig,
}

impl AuthService {
    pub fn new(pool: DbPool, admin: AdminConfig, auth: AuthConfig) -> Self {
        Self { pool, admin, auth }
    }

    /// Create a regular (non-admin) account.
    pub fn register(&self, username: &str, email: &str, password: &str) -> AppResult<User> {
        let username = username.trim();
        let email = email.trim().to_lowercase();

        if username.is_empty() || email.is_empty() || password.is_empty() {
            return Err(AppError::Validation("All fields are required.".into()));
        }
        if username.chars().count() > MAX_USERNAME_LEN {
            return Err(AppError::Validation(format!(
                "Username must be {} characters or less.",
                MAX_USERNAME_LEN
            )));
        }
        if email.chars().count() > MAX_EMAIL_LEN {
            return Err(AppError::Validation(format!(
                "Email must be {} characters or less.",
                MAX_EMAIL_LEN
            )));
        }
        // The admin name is reserved even before the admin account is provisioned.
        if username == self.admin.username {
            return Err(AppError::Conflict(DUPLICATE_ACCOUNT.into()));
        }

        let conn = self.pool.get()?;
        let taken: bool = conn.query_row(
            "SELECT COUNT(*) > 0 FROM users WHERE username = ?1 OR email = ?2",
            params![username, email],
            |row| row.get(0),
        )?;
        if taken {
            return Err(AppError::Conflict(DUPLICATE_ACCOUNT.into()));
        }

        let password_hash = hash_password(password, self.auth.bcrypt_cost)?;
        conn.execute(
            "INSERT INTO users (username, email, password_hash, is_admin) VALUES (?1, ?2, ?3, 0)",
            params![username, email, password_hash],
        )
        .map_err(|e| AppError::conflict_on_constraint(e, DUPLICATE_ACCOUNT))?;

        let user = find_user(&conn, conn.last_insert_rowid())?
            .ok_or_else(|| AppError::Internal("registered user vanished".into()))?;
        tracing::info!(user_id = user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Check credentials and open a session.
    pub fn login(&self, username: &str, password: &str, role: Role) -> AppResult<LoginOutcome> {
        let username = username.trim();
        let conn = self.pool.get()?;

        let user = match role {
            Role::Admin => {
                if username != self.admin.username {
                    tracing::warn!(username = %username, "Admin login with non-admin username");
                    return Err(AppError::Auth("Invalid admin credentials.".into()));
                }
                Some(self.ensure_admin_on(&conn)?)
            }
            Role::User => find_user_by_username(&conn, username)?,
        };

        let user = match user {
            Some(user) if verify_password(password, &user.password_hash) => user,
            _ => {
                tracing::warn!(username = %username, "Rejected login");
                return Err(AppError::Auth(BAD_CREDENTIALS.into()));
            }
        };

        if user.blocked && !user.is_admin {
            tracing::warn!(user_id = user.id, "Blocked user attempted login");
            return Err(AppError::Forbidden(
                "Your account is blocked. Contact admin.".into(),
            ));
        }

        let session = session::create_session(&conn, user.id, self.auth.session_hours)?;
        tracing::info!(user_id = user.id, "User logged in");
        Ok(LoginOutcome { user, session })
    }

    /// End a session. Unknown tokens are ignored.
    pub fn logout(&self, token: &str) -> AppResult<()> {
        let conn = self.pool.get()?;
        session::delete_session(&conn, token)?;
        Ok(())
    }

    /// Resolve a session token to its user.
    pub fn session_user(&self, token: &str) -> AppResult<Option<User>> {
        let conn = self.pool.get()?;
        Ok(session::find_session_user(&conn, token)?)
    }

    /// Provision the administrator account from config if it does not exist yet.
    pub fn ensure_admin(&self) -> AppResult<User> {
        let conn = self.pool.get()?;
        self.ensure_admin_on(&conn)
    }

    fn ensure_admin_on(&self, conn: &Connection) -> AppResult<User> {
        if let Some(user) = find_user_by_username(conn, &self.admin.username)? {
            if !user.is_admin {
                tracing::error!(
                    user_id = user.id,
                    username = %user.username,
                    "Configured admin username belongs to a regular account"
                );
                return Err(AppError::Internal(format!(
                    "admin username '{}' is held by a non-admin account",
                    user.username
                )));
            }
            return Ok(user);
        }

        let password_hash = hash_password(&self.admin.password, self.auth.bcrypt_cost)?;
        conn.execute(
            "INSERT OR IGNORE INTO users (username, email, password_hash, is_admin) VALUES (?1, ?2, ?3, 1)",
            params![self.admin.username, self.admin.email.to_lowercase(), password_hash],
        )?;

        let user = find_user_by_username(conn, &self.admin.username)?
            .ok_or_else(|| AppError::Internal("admin account could not be provisioned".into()))?;
        tracing::info!(user_id = user.id, username = %user.username, "Admin account provisioned");
        Ok(user)
    }

    pub fn find_user(&self, id: i64) -> AppResult<Option<User>> {
        let conn = self.pool.get()?;
        Ok(find_user(&conn, id)?)
    }

    /// Point the user's avatar at an already stored upload.
    pub fn update_avatar(&self, user: &CurrentUser, avatar_url: &str) -> AppResult<()> {
        let conn = self.pool.get()?;
        let updated = conn.execute(
            "UPDATE users SET avatar_url = ?1 WHERE id = ?2",
            params![avatar_url, user.id],
        )?;
        if updated == 0 {
            return Err(AppError::NotFound("User not found.".into()));
        }
        Ok(())
    }
}

fn find_user(conn: &Connection, id: i64) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE id = ?1", User::COLUMNS),
        params![id],
        User::from_row,
    )
    .optional()
}

fn find_user_by_username(conn: &Connection, username: &str) -> rusqlite::Result<Option<User>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE username = ?1", User::COLUMNS),
        params![username],
        User::from_row,
    )
    .optional()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::test_pool;

    fn service() -> AuthService {
        let auth = AuthConfig {
            bcrypt_cost: 4,
            ..AuthConfig::default()
        };
        AuthService::new(test_pool(), AdminConfig::default(), auth)
    }

    #[test]
    fn register_then_login() {
        let auth = service();
        let user = auth.register("alice", "A@X.com", "pw1").unwrap();
        assert_eq!(user.email, "a@x.com");
        assert!(!user.is_admin);
        assert_ne!(user.password_hash, "pw1");

        let outcome = auth.login("alice", "pw1", Role::User).unwrap();
        assert_eq!(outcome.user.id, user.id);
        assert_eq!(outcome.session.token.len(), 64);

        let resolved = auth.session_user(&outcome.session.token).unwrap().unwrap();
        assert_eq!(resolved.username, "alice");
    }

    #[test]
    fn register_requires_all_fields() {
        let auth = service();
        for (u, e, p) in [("", "a@x.com", "pw"), ("a", "  ", "pw"), ("a", "a@x.com", "")] {
            assert!(matches!(
                auth.register(u, e, p),
                Err(AppError::Validation(_))
            ));
        }
    }

    #[test]
    fn register_rejects_overlong_username() {
        let auth = service();
        let name = "x".repeat(MAX_USERNAME_LEN + 1);
        assert!(matches!(
            auth.register(&name, "a@x.com", "pw"),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn duplicate_username_is_conflict() {
        let auth = service();
        auth.register("alice", "a@x.com", "pw1").unwrap();
        assert!(matches!(
            auth.register("alice", "other@x.com", "pw2"),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn duplicate_email_is_conflict() {
        let auth = service();
        auth.register("alice", "a@x.com", "pw1").unwrap();
        assert!(matches!(
            auth.register("bob", "A@x.com", "pw2"),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn admin_username_is_reserved() {
        let auth = service();
        assert!(matches!(
            auth.register("admin", "someone@x.com", "pw"),
            Err(AppError::Conflict(_))
        ));
    }

    #[test]
    fn wrong_password_is_auth_error() {
        let auth = service();
        auth.register("alice", "a@x.com", "pw1").unwrap();
        assert!(matches!(
            auth.login("alice", "nope", Role::User),
            Err(AppError::Auth(_))
        ));
        assert!(matches!(
            auth.login("ghost", "pw1", Role::User),
            Err(AppError::Auth(_))
        ));
    }

    #[test]
    fn blocked_user_is_forbidden() {
        let auth = service();
        let user = auth.register("alice", "a@x.com", "pw1").unwrap();
        auth.pool
            .get()
            .unwrap()
            .execute("UPDATE users SET blocked = 1 WHERE id = ?1", params![user.id])
            .unwrap();
        assert!(matches!(
            auth.login("alice", "pw1", Role::User),
            Err(AppError::Forbidden(_))
        ));
    }

    #[test]
    fn admin_login_provisions_account_once() {
        let auth = service();
        assert!(auth.find_user(1).unwrap().is_none());

        let first = auth.login("admin", "Admin@12345", Role::Admin).unwrap();
        assert!(first.user.is_admin);
        let second = auth.login("admin", "Admin@12345", Role::Admin).unwrap();
        assert_eq!(first.user.id, second.user.id);
    }

    #[test]
    fn admin_login_with_other_username_fails() {
        let auth = service();
        auth.register("alice", "a@x.com", "pw1").unwrap();
        assert!(matches!(
            auth.login("alice", "pw1", Role::Admin),
            Err(AppError::Auth(_))
        ));
    }

    #[test]
    fn admin_login_wrong_password_fails() {
        let auth = service();
        assert!(matches!(
            auth.login("admin", "guess", Role::Admin),
            Err(AppError::Auth(_))
        ));
    }

    #[test]
    fn blocked_admin_can_still_login() {
        let auth = service();
        let admin = auth.ensure_admin().unwrap();
        auth.pool
            .get()
            .unwrap()
            .execute("UPDATE users SET blocked = 1 WHERE id = ?1", params![admin.id])
            .unwrap();
        assert!(auth.login("admin", "Admin@12345", Role::Admin).is_ok());
    }

    #[test]
    fn logout_invalidates_session() {
        let auth = service();
        auth.register("alice", "a@x.com", "pw1").unwrap();
        let outcome = auth.login("alice", "pw1", Role::User).unwrap();
        auth.logout(&outcome.session.token).unwrap();
        assert!(auth.session_user(&outcome.session.token).unwrap().is_none());
        // second logout is harmless
        auth.logout(&outcome.session.token).unwrap();
    }

    #[test]
    fn update_avatar_records_url() {
        let auth = service();
        let user = auth.register("alice", "a@x.com", "pw1").unwrap();
        let current = CurrentUser::from(&user);
        auth.update_avatar(&current, "/static/uploads/me.png").unwrap();
        let reloaded = auth.find_user(user.id).unwrap().unwrap();
        assert_eq!(reloaded.avatar_url.as_deref(), Some("/static/uploads/me.png"));
    }

    #[test]
    fn role_deserializes_lowercase() {
        let role: Role = serde_json::from_str("\"admin\"").unwrap();
        assert_eq!(role, Role::Admin);
        assert_eq!(Role::default(), Role::User);
    }

    #[test]
    fn ensure_admin_refuses_a_regular_account_with_the_admin_name() {
        let auth = service();
        {
            let conn = auth.pool.get().unwrap();
            conn.execute(
                "INSERT INTO users (username, email, password_hash, is_admin) VALUES ('admin', 'squat@x.com', 'x', 0)",
                [],
            )
            .unwrap();
        }

        assert!(matches!(auth.ensure_admin(), Err(AppError::Internal(_))));
        assert!(auth.login("admin", "Admin@12345", Role::Admin).is_err());
    }

    #[test]
    fn racing_registrations_for_one_name_yield_one_account() {
        let (_dir, pool) = crate::db::file_test_pool();
        let config = AuthConfig {
            bcrypt_cost: 4,
            ..AuthConfig::default()
        };

        let threads = 6;
        let barrier = std::sync::Arc::new(std::sync::Barrier::new(threads));
        let handles: Vec<_> = (0..threads)
            .map(|i| {
                let auth = AuthService::new(pool.clone(), AdminConfig::default(), config.clone());
                let barrier = barrier.clone();
                std::thread::spawn(move || {
                    barrier.wait();
                    auth.register("alice", &format!("alice{}@x.com", i), "pw1")
                })
            })
            .collect();

        let mut created = 0;
        for handle in handles {
            match handle.join().unwrap() {
                Ok(_) => created += 1,
                Err(AppError::Conflict(message)) => {
                    assert_eq!(message, DUPLICATE_ACCOUNT);
                }
                Err(other) => panic!("unexpected error: {:?}", other),
            }
        }
        assert_eq!(created, 1);

        let conn = pool.get().unwrap();
        let rows: i64 = conn
            .query_row("SELECT COUNT(*) FROM users WHERE username = 'alice'", [], |row| {
                row.get(0)
            })
            .unwrap();
        assert_eq!(rows, 1);
    }

    #[test]
    fn unique_violation_on_insert_maps_to_conflict() {
        let auth = service();
        auth.register("alice", "a@x.com", "pw1").unwrap();

        // The insert a racing request would run after its duplicate check passed.
        let conn = auth.pool.get().unwrap();
        let err = conn
            .execute(
                "INSERT INTO users (username, email, password_hash, is_admin) VALUES ('alice', 'b@x.com', 'x', 0)",
                [],
            )
            .unwrap_err();
        match AppError::conflict_on_constraint(err, DUPLICATE_ACCOUNT) {
            AppError::Conflict(message) => assert_eq!(message, DUPLICATE_ACCOUNT),
            other => panic!("expected conflict, got {:?}", other),
        }
    }
}
