use clap::Parser;
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Parser, Debug)]
#[command(name = "talaan", about = "A personal knowledge and life-tracking server")]
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

    /// Keep the key-value store in memory instead of SQLite
    #[arg(long)]
    pub memory: bool,
}

#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub blog: BlogConfig,
    pub auth: AuthConfig,
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
    pub in_memory: bool,
}

/// Filesystem layout of the markdown mirror.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct BlogConfig {
    pub blogs_path: Option<PathBuf>,
    pub recycle_path: Option<PathBuf>,
    /// Startup `sys_conf` for the admin account, merged under the `sys_conf` blog.
    pub sys_conf_path: Option<PathBuf>,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct AuthConfig {
    pub cookie_name: String,
    pub session_hours: u64,
    pub admin_account: String,
    pub admin_password: String,
    pub admin_sms_code: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8888,
        }
    }
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session".to_string(),
            session_hours: 48,
            admin_account: "admin".to_string(),
            admin_password: "admin".to_string(),
            admin_sms_code: "666666".to_string(),
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

        // CLI overrides
        if let Some(ref host) = cli.host {
            config.server.host = host.clone();
        }
        if let Some(port) = cli.port {
            config.server.port = port;
        }
        if cli.memory {
            config.database.in_memory = true;
        }

        config.resolve_paths(&data_dir);
        Ok(config)
    }

    /// Fill every unset path relative to `data_dir`.
    pub fn resolve_paths(&mut self, data_dir: &Path) {
        if self.database.path.is_none() {
            self.database.path = Some(data_dir.join("talaan.db"));
        }
        if self.blog.blogs_path.is_none() {
            self.blog.blogs_path = Some(data_dir.join("blogs_txt"));
        }
        if self.blog.recycle_path.is_none() {
            self.blog.recycle_path = Some(data_dir.join(".recycle"));
        }
        if self.blog.sys_conf_path.is_none() {
            self.blog.sys_conf_path = Some(data_dir.join("sys_conf"));
        }
    }

    /// Defaults with every path rooted at `data_dir`.
    pub fn for_data_dir(data_dir: &Path) -> Self {
        let mut config = Config::default();
        config.resolve_paths(data_dir);
        config
    }

    pub fn data_dir(cli: &Cli) -> PathBuf {
        cli.data_dir.clone().unwrap_or_else(|| {
            dirs::home_dir()
                .unwrap_or_else(|| PathBuf::from("."))
                .join(".talaan")
        })
    }

    pub fn db_path(&self) -> PathBuf {
        self.database
            .path
            .clone()
            .unwrap_or_else(|| PathBuf::from("talaan.db"))
    }

    pub fn blogs_path(&self) -> PathBuf {
        self.blog
            .blogs_path
            .clone()
            .unwrap_or_else(|| PathBuf::from("blogs_txt"))
    }

    pub fn recycle_path(&self) -> PathBuf {
        self.blog
            .recycle_path
            .clone()
            .unwrap_or_else(|| PathBuf::from(".recycle"))
    }

    pub fn sys_conf_path(&self) -> Option<&Path> {
        self.blog.sys_conf_path.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cli_for(data_dir: Option<PathBuf>) -> Cli {
        Cli {
            config: None,
            host: None,
            port: None,
            data_dir,
            memory: false,
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let config = Config::default();
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.server.port, 8888);
        assert_eq!(config.auth.cookie_name, "session");
        assert_eq!(config.auth.session_hours, 48);
        assert_eq!(config.auth.admin_account, "admin");
        assert!(config.database.path.is_none());
        assert!(config.blog.blogs_path.is_none());
    }

    #[test]
    fn data_dir_uses_cli_override() {
        let cli = cli_for(Some(PathBuf::from("/tmp/test-talaan")));
        assert_eq!(Config::data_dir(&cli), PathBuf::from("/tmp/test-talaan"));
    }

    #[test]
    fn data_dir_defaults_to_home_dot_talaan() {
        let dir = Config::data_dir(&cli_for(None));
        assert!(dir.ends_with(".talaan"));
    }

    #[test]
    fn load_with_no_config_file_resolves_paths_under_data_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let config = Config::load(&cli_for(Some(tmp.path().to_path_buf()))).unwrap();
        assert_eq!(config.db_path(), tmp.path().join("talaan.db"));
        assert_eq!(config.blogs_path(), tmp.path().join("blogs_txt"));
        assert_eq!(config.recycle_path(), tmp.path().join(".recycle"));
        assert_eq!(
            config.sys_conf_path(),
            Some(tmp.path().join("sys_conf").as_path())
        );
    }

    #[test]
    fn load_applies_cli_overrides() {
        let tmp = tempfile::tempdir().unwrap();
        let cli = Cli {
            config: None,
            host: Some("127.0.0.1".to_string()),
            port: Some(8080),
            data_dir: Some(tmp.path().to_path_buf()),
            memory: true,
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.server.port, 8080);
        assert!(config.database.in_memory);
    }

    #[test]
    fn load_reads_toml_file() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000

[auth]
admin_account = "root"
admin_password = "pwd1"
session_hours = 24

[blog]
blogs_path = "/srv/blogs"
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: None,
            port: None,
            data_dir: Some(tmp.path().to_path_buf()),
            memory: false,
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "192.168.1.1");
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.auth.admin_account, "root");
        assert_eq!(config.auth.admin_password, "pwd1");
        assert_eq!(config.auth.session_hours, 24);
        // cookie name keeps its default when the section omits it
        assert_eq!(config.auth.cookie_name, "session");
        assert_eq!(config.blogs_path(), PathBuf::from("/srv/blogs"));
    }

    #[test]
    fn cli_overrides_beat_toml_values() {
        let tmp = tempfile::tempdir().unwrap();
        let config_path = tmp.path().join("config.toml");
        std::fs::write(
            &config_path,
            r#"
[server]
host = "192.168.1.1"
port = 9000
"#,
        )
        .unwrap();

        let cli = Cli {
            config: Some(config_path),
            host: Some("10.0.0.1".to_string()),
            port: Some(4000),
            data_dir: Some(tmp.path().to_path_buf()),
            memory: false,
        };
        let config = Config::load(&cli).unwrap();
        assert_eq!(config.server.host, "10.0.0.1");
        assert_eq!(config.server.port, 4000);
    }
}
