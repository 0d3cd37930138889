//! Process root. Owns every registry and hands out per-account engines.

use std::path::Path;
use std::sync::Arc;

use crate::accounts::AccountRegistry;
use crate::auth::{SessionRegistry, SmsCodes};
use crate::blog::{BlogEngine, BlogManager};
use crate::comments::CommentStore;
use crate::config::Config;
use crate::db;
use crate::kv::{KvStore, MemoryKv, SqliteKv};
use crate::persistence::{FileMirror, Persistence};
use crate::share::ShareRegistry;
use crate::sysconf::SysConfStore;

pub struct Engine {
    pub blogs: BlogManager,
    pub accounts: Arc<AccountRegistry>,
    pub sessions: SessionRegistry,
    pub sms: SmsCodes,
    pub shares: ShareRegistry,
    pub comments: CommentStore,
}

impl Engine {
    /// Open storage, load accounts and reconcile the markdown mirror.
    pub async fn bootstrap(config: &Config) -> anyhow::Result<Self> {
        let kv: Arc<dyn KvStore> = if config.database.in_memory {
            tracing::warn!("using in-memory key-value store, nothing will survive a restart");
            Arc::new(MemoryKv::new())
        } else {
            let pool = db::create_pool(&config.db_path())?;
            db::run_migrations(&pool)?;
            Arc::new(SqliteKv::new(pool))
        };

        let admin = config.auth.admin_account.as_str();
        let mirror = FileMirror::new(config.blogs_path(), config.recycle_path());
        let persistence = Persistence::new(kv, mirror, admin);

        let sysconf = SysConfStore::new(admin);
        let sysconf = match config.sys_conf_path().map(read_startup_conf) {
            Some(Some(text)) => sysconf.with_startup(&text),
            _ => sysconf,
        };
        let sysconf = Arc::new(sysconf);

        let blogs = BlogManager::new(persistence.clone(), sysconf.clone());
        let accounts = Arc::new(
            AccountRegistry::load(
                blogs.engine(admin),
                admin,
                &config.auth.admin_password,
                config.blogs_path(),
            )
            .await?,
        );

        let sms = SmsCodes::new();
        if !config.auth.admin_sms_code.is_empty() {
            sms.seed(admin, &config.auth.admin_sms_code);
        }

        let engine = Self {
            sessions: SessionRegistry::new(accounts.clone(), config.auth.session_hours),
            shares: ShareRegistry::spawn(sysconf.clone()),
            comments: CommentStore::spawn(persistence, sysconf),
            blogs,
            accounts,
            sms,
        };
        engine.reconcile_mirror().await;
        Ok(engine)
    }

    /// Re-export every account's blogs so the mirror matches the store.
    async fn reconcile_mirror(&self) {
        for account in self.accounts.list() {
            let written = self.blog(&account).export_mirror().await;
            tracing::info!("mirror reconciled account={} files={}", account, written);
        }
    }

    pub fn blog(&self, account: &str) -> BlogEngine {
        self.blogs.engine(account)
    }

    pub fn is_admin(&self, account: &str) -> bool {
        self.accounts.is_admin(account)
    }
}

fn read_startup_conf(path: &Path) -> Option<String> {
    match std::fs::read_to_string(path) {
        Ok(text) => {
            tracing::info!("loaded startup sys_conf from {}", path.display());
            Some(text)
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
        Err(e) => {
            tracing::warn!("cannot read {}: {}", path.display(), e);
            None
        }
    }
}
