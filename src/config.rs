use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEV_SECRET_KEY: &str = "dev-secret-change-me";

#[derive(Parser, Debug, Default)]
#[command(name = "morphx", about = "A small social feed server")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Host to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// Port to bind to
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Path to data directory
    #[arg(long)]
    pub data_dir: Option<PathBuf>,

    /// Database location, either `sqlite:///path/to.db` or a plain path
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    #[arg(long, env = "SECRET_KEY", hide_env_values = true)]
    pub secret_key: Option<String>,

    #[arg(long, env = "ADMIN_USERNAME")]
    pub admin_username: Option<String>,

    #[arg(long, env = "ADMIN_EMAIL")]
    pub admin_email: Option<String>,

    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// Remote backend URL (recorded only)
    #[arg(long, env = "SUPABASE_URL")]
    pub remote_url: Option<String>,

    #[arg(long, env = "SUPABASE_KEY", hide_env_values = true)]
    pub remote_key: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub admin: AdminConfig,
    pub remote: RemoteConfig,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct StorageConfig {
    pub path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    pub secret_key: String,
    pub bcrypt_cost: u32,
}

/// Credentials used to provision the single administrator account.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AdminConfig {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Optional hosted backend. Kept in config for deployments that set it; the
/// feed itself only talks to the local database.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct RemoteConfig {
    pub url: Option<String>,
    pub key: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 5000,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "morphx_session".to_string(),
            session_hours: 720,
            secret_key: DEV_SECRET_KEY.to_string(),
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            username: "admin".to_string(),
            email: "admin@amrita.edu".to_string(),
            password: "Admin@12345".to_string(),
        }
    }
}

impl Config {
    pub fn load(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = Self::data_dir(cli);
        let config_path = cli
            .config
            .clone()
            .unwrap_or_else(|| data_dir.join("config.toml"));

        let mut config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str(&content)?
        } else {
            Config::default()
        };

        // CLI / environment overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if let Some(ref url) = cli.database_url {
            config.database.path = Some(parse_database_url(url));
        }
        if let Some(ref key) = cli.secret_key {
            config.auth.secret_key = key.clone();
        }
        if let Some(ref username) = cli.admin_username {
            config.admin.username = username.clone();
        }
        if let Some(ref email) = cli.admin_email {
            config.admin.email = email.clone();
        }
        if let Some(ref password) = cli.admin_password {
            config.admin.password = password.clone();
        }
        if cli.remote_url.is_some() {
            config.remote.url = cli.remote_url.clone();
        }
        if cli.remote_key.is_some() {
            config.remote.key = cli.remote_key.clone();
        }

        // Resolve paths relative to data dir
        if config.database.path.is_none() {
            config.database.path = Some(data_dir.join("morphx.db"));
        }
        if config.storage.path.is_none() {
            config.storage.path = Some(data_dir.join("uploads"));
        }

        Ok(config)
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(default_data_dir)
    }

    /// Database file. Falls back to the home data dir when `load` did not resolve it.
    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| default_data_dir().join("morphx.db"))
    }

    pub fn uploads_path(&self) -> PathBuf {
        self.storage
            .path
            .clone()
            .unwrap_or_else(|| default_data_dir().join("uploads"))
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.auth.secret_key == DEV_SECRET_KEY
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".morphx")
}

/// SQLAlchemy-style URLs: `sqlite:///rel.db` is relative, `sqlite:////abs.db`
/// is absolute. A bare path is taken as-is.
fn parse_database_url(url: &str) -> PathBuf {
    let path = url
        .strip_prefix("sqlite:///")
        .or_else(|| url.strip_prefix("sqlite://"))
        .or_else(|| url.strip_prefix("sqlite:"))
        .unwrap_or(url);
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_for(dir: &std::path::Path) -> Cli {
        Cli {
            data_dir: Some(dir.to_path_buf()),
            ..Default::default()
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.auth.cookie_name, "morphx_session");
        assert_eq!(config.auth.session_hours, 720);
        assert_eq!(config.auth.bcrypt_cost, bcrypt::DEFAULT_COST);
        assert_eq!(config.admin.username, "admin");
        assert!(config.uses_dev_secret());
        assert!(config.database.path.is_none());
        assert!(config.storage.path.is_none());
        assert!(config.remote.url.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_for(std::path::Path::new("/tmp/test-morphx"));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-morphx"));
    }

    #[test]
    fn data_dir_defaults_to_home_dot_morphx() {
        let dir = Config::data_dir(&Cli::default());
        assert!(dir.ends_with(".morphx"));
    }

    #[test]
    fn load_with_no_config_file_uses_defaults() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_for(tmp.path())).unwrap();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.db_path(), tmp.path().join("morphx.db"));
        assert_eq!(config.uploads_path(), tmp.path().join("uploads"));
    }

    #[test]
    fn load_applies_cli_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli {
            host: Some("127.0.0.1".to_string()),
            port: Some(8080),
            secret_key: Some("s3cret".to_string()),
            admin_username: Some("root".to_string()),
            remote_url: Some("https://example.invalid".to_string()),
            ..cli_for(tmp.path())
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.admin.username, "root");
        assert_eq!(config.remote.url.as_deref(), Some("https://example.invalid"));
        assert!(!config.uses_dev_secret());
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
port = 9000

[auth]
cookie_name = "feed"
session_hours = 24

[admin]
username = "moderator"
email = "mod@x.com"
password = "pw"
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            ..cli_for(tmp.path())
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.cookie_name, "feed");
        assert_eq!(config.auth.session_hours, 24);
        assert_eq!(config.admin.username, "moderator");
        assert_eq!(config.admin.email, "mod@x.com");
    }

    #[test]
    fn database_url_overrides_path() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli {
            database_url: Some("sqlite:////var/lib/morphx/feed.db".to_string()),
            ..cli_for(tmp.path())
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/morphx/feed.db"));
    }

    #[test]
    fn parse_database_url_variants() {
        assert_eq!(parse_database_url("sqlite:///morphx.db"), PathBuf::from("morphx.db"));
        assert_eq!(parse_database_url("sqlite:///data/b.db"), PathBuf::from("data/b.db"));
        assert_eq!(parse_database_url("sqlite:////a/b.db"), PathBuf::from("/a/b.db"));
        assert_eq!(parse_database_url("plain.db"), PathBuf::from("plain.db"));
    }

    #[test]
    fn paths_fall_back_without_load() {
        let config = Config::default();
        assert!(config.db_path().ends_with(".morphx/morphx.db"));
        assert!(config.uploads_path().ends_with(".morphx/uploads"));
    }
}
