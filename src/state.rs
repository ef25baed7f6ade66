use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::auth::service::AuthService;
use crate::config::Config;
use crate::content::ContentService;
use crate::media::MediaStore;
use crate::moderation::ModerationService;

pub type DbPool = Pool<SqliteConnectionManager>;

#[derive(Clone)]
pub struct AppState {
    pub db: DbPool,
    pub config: Config,
    pub media: MediaStore,
}

impl AppState {
    pub fn new(db: DbPool, config: Config) -> Self {
        let media = MediaStore::new(config.uploads_path());
        Self { db, config, media }
    }

    pub fn auth(&self) -> AuthService {
        AuthService::new(
            self.db.clone(),
            self.config.admin.clone(),
            self.config.auth.clone(),
        )
    }

    pub fn content(&self) -> ContentService {
        ContentService::new(self.db.clone())
    }

    pub fn moderation(&self) -> ModerationService {
        ModerationService::new(self.db.clone())
    }
}
