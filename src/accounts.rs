//! Account records and profiles, persisted as a JSON array in the admin's
//! `sys_accounts` blog.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::blog::{BlogEngine, UploadedBlog};
use crate::clock;
use crate::error::AppError;

pub const SYS_ACCOUNTS_TITLE: &str = "sys_accounts";

// Account names become directory names under the blogs path.
static ACCOUNT_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\p{Han}a-zA-Z0-9_]+$").expect("valid regex"));

pub fn is_valid_account(account: &str) -> bool {
    ACCOUNT_RE.is_match(account)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub age: u32,
    pub height: f64,
    pub weight: f64,
    pub birthday: String,
    pub avatar: String,
    pub hobbies: Vec<String>,
    pub bio: String,
    pub location: String,
    pub website: String,
    pub updated_at: String,
}

impl Profile {
    /// Body mass index, or 0 when height or weight is unknown.
    pub fn bmi(&self) -> f64 {
        if self.height <= 0.0 || self.weight <= 0.0 {
            return 0.0;
        }
        let meters = self.height / 100.0;
        self.weight / (meters * meters)
    }

    pub fn bmi_status(&self) -> &'static str {
        let bmi = self.bmi();
        if bmi == 0.0 {
            "数据不足"
        } else if bmi < 18.5 {
            "偏瘦"
        } else if bmi < 24.0 {
            "正常"
        } else if bmi < 28.0 {
            "偏胖"
        } else {
            "肥胖"
        }
    }

    /// Age derived from the birthday when present, else the stored age.
    pub fn age_on(&self, today: NaiveDate) -> u32 {
        let Some(birthday) = clock::parse_date(&self.birthday) else {
            return self.age;
        };
        let mut age = today.year() - birthday.year();
        if (today.month(), today.day()) < (birthday.month(), birthday.day()) {
            age -= 1;
        }
        age.max(0) as u32
    }

    pub fn avatar_or_default(&self, account: &str) -> String {
        if !self.avatar.is_empty() {
            return self.avatar.clone();
        }
        let source = if self.name.is_empty() { account } else { &self.name };
        source
            .chars()
            .next()
            .map(|c| c.to_uppercase().collect())
            .unwrap_or_default()
    }

    /// Human-readable problems, empty when the profile is acceptable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.age > 150 {
            errors.push("age must be between 0 and 150".to_string());
        }
        if !(0.0..=300.0).contains(&self.height) {
            errors.push("height must be between 0 and 300 cm".to_string());
        }
        if !(0.0..=1000.0).contains(&self.weight) {
            errors.push("weight must be between 0 and 1000 kg".to_string());
        }
        if !self.phone.is_empty() && !is_valid_phone(&self.phone) {
            errors.push("invalid phone number".to_string());
        }
        if !self.email.is_empty() && !is_valid_email(&self.email) {
            errors.push("invalid email".to_string());
        }
        if !self.birthday.is_empty() && clock::parse_date(&self.birthday).is_none() {
            errors.push("invalid birthday, expected YYYY-MM-DD".to_string());
        }
        errors
    }
}

fn is_valid_phone(phone: &str) -> bool {
    let digits: String = phone
        .chars()
        .filter(|c| !matches!(c, '+' | '-' | ' '))
        .collect();
    (7..=15).contains(&digits.len()) && digits.chars().all(|c| c.is_ascii_digit())
}

fn is_valid_email(email: &str) -> bool {
    match email.split_once('@') {
        Some((local, domain)) => !local.is_empty() && domain.contains('.'),
        None => false,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccountRecord {
    pub account: String,
    pub password: String,
    #[serde(default)]
    pub profile: Profile,
}

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("account {0} already exists")]
    Exists(String),
    #[error("account {0} not found")]
    NotFound(String),
    #[error("invalid account name")]
    InvalidName,
    #[error("{}", .0.join("; "))]
    Invalid(Vec<String>),
    #[error("failed to save accounts code={0}")]
    Save(i32),
    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl From<AccountError> for AppError {
    fn from(e: AccountError) -> Self {
        match e {
            AccountError::Json(e) => AppError::Json(e),
            AccountError::NotFound(_) => AppError::NotFound,
            AccountError::Save(code) => AppError::Internal(format!("accounts save failed code={}", code)),
            exists @ AccountError::Exists(_) => AppError::Conflict(exists.to_string()),
            other => AppError::BadRequest(other.to_string()),
        }
    }
}

pub struct AccountRegistry {
    admin_account: String,
    blogs_path: PathBuf,
    accounts: RwLock<HashMap<String, AccountRecord>>,
    admin_engine: BlogEngine,
}

impl AccountRegistry {
    /// Load accounts from the admin's `sys_accounts` blog, seeding it with
    /// the admin credentials when it does not exist yet.
    pub async fn load(
        admin_engine: BlogEngine,
        admin_account: &str,
        admin_password: &str,
        blogs_path: impl Into<PathBuf>,
    ) -> Result<Self, AccountError> {
        let records: Vec<AccountRecord> = match admin_engine.get(SYS_ACCOUNTS_TITLE).await {
            Some(blog) => serde_json::from_str(&blog.content)?,
            None => Vec::new(),
        };

        let registry = Self {
            admin_account: admin_account.to_string(),
            blogs_path: blogs_path.into(),
            accounts: RwLock::new(
                records
                    .into_iter()
                    .map(|r| (r.account.clone(), r))
                    .collect(),
            ),
            admin_engine,
        };

        if !registry.exists(admin_account) {
            tracing::info!("seeding admin account {}", admin_account);
            registry.accounts.write().insert(
                admin_account.to_string(),
                AccountRecord {
                    account: admin_account.to_string(),
                    password: admin_password.to_string(),
                    profile: Profile::default(),
                },
            );
            registry.persist().await?;
        }

        tracing::info!("loaded {} accounts", registry.accounts.read().len());
        Ok(registry)
    }

    pub fn get(&self, account: &str) -> Option<AccountRecord> {
        self.accounts.read().get(account).cloned()
    }

    pub fn exists(&self, account: &str) -> bool {
        self.accounts.read().contains_key(account)
    }

    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self.accounts.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn verify_password(&self, account: &str, password: &str) -> bool {
        self.accounts
            .read()
            .get(account)
            .map(|r| r.password == password)
            .unwrap_or(false)
    }

    pub fn is_admin(&self, account: &str) -> bool {
        account == self.admin_account
    }

    pub fn admin_account(&self) -> &str {
        &self.admin_account
    }

    pub fn blogs_dir(&self, account: &str) -> PathBuf {
        self.blogs_path.join(account)
    }

    pub fn blogs_root(&self) -> &Path {
        &self.blogs_path
    }

    pub async fn add_account(&self, account: &str, password: &str) -> Result<(), AccountError> {
        if !is_valid_account(account) {
            return Err(AccountError::InvalidName);
        }
        {
            let mut accounts = self.accounts.write();
            if accounts.contains_key(account) {
                return Err(AccountError::Exists(account.to_string()));
            }
            accounts.insert(
                account.to_string(),
                AccountRecord {
                    account: account.to_string(),
                    password: password.to_string(),
                    profile: Profile::default(),
                },
            );
        }
        tracing::info!("account added {}", account);
        self.persist().await
    }

    /// Validate and store a new profile. Returns the stored profile.
    pub async fn update_profile(&self, account: &str, mut profile: Profile) -> Result<Profile, AccountError> {
        let errors = profile.validate();
        if !errors.is_empty() {
            return Err(AccountError::Invalid(errors));
        }
        profile.updated_at = clock::now_string();
        profile.avatar = profile.avatar_or_default(account);
        {
            let mut accounts = self.accounts.write();
            let record = accounts
                .get_mut(account)
                .ok_or_else(|| AccountError::NotFound(account.to_string()))?;
            record.profile = profile.clone();
        }
        self.persist().await?;
        Ok(profile)
    }

    async fn persist(&self) -> Result<(), AccountError> {
        let content = {
            let accounts = self.accounts.read();
            let mut records: Vec<&AccountRecord> = accounts.values().collect();
            records.sort_by(|a, b| a.account.cmp(&b.account));
            serde_json::to_string_pretty(&records)?
        };
        let code = self
            .admin_engine
            .save(UploadedBlog::new(SYS_ACCOUNTS_TITLE, content))
            .await;
        if code != 0 {
            return Err(AccountError::Save(code));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::blog::BlogBook;
    use crate::kv::memory::MemoryKv;
    use crate::persistence::{FileMirror, Persistence};
    use crate::sysconf::SysConfStore;

    fn admin_engine(tmp: &tempfile::TempDir, kv: Arc<MemoryKv>) -> BlogEngine {
        let mirror = FileMirror::new(tmp.path().join("blogs"), tmp.path().join("recycle"));
        let persistence = Persistence::new(kv, mirror, "admin");
        BlogEngine::spawn(BlogBook::load(
            "admin",
            persistence,
            Arc::new(SysConfStore::new("admin")),
        ))
    }

    #[test]
    fn bmi_and_status() {
        let p = Profile {
            height: 180.0,
            weight: 81.0,
            ..Default::default()
        };
        assert!((p.bmi() - 25.0).abs() < 1e-9);
        assert_eq!(p.bmi_status(), "偏胖");
        assert_eq!(Profile::default().bmi(), 0.0);
        assert_eq!(Profile::default().bmi_status(), "数据不足");
    }

    #[test]
    fn age_counts_only_passed_birthdays() {
        let p = Profile {
            birthday: "2000-06-15".into(),
            age: 1,
            ..Default::default()
        };
        let before = NaiveDate::from_ymd_opt(2024, 6, 14).unwrap();
        let on = NaiveDate::from_ymd_opt(2024, 6, 15).unwrap();
        assert_eq!(p.age_on(before), 23);
        assert_eq!(p.age_on(on), 24);
        let no_birthday = Profile { age: 7, ..Default::default() };
        assert_eq!(no_birthday.age_on(on), 7);
    }

    #[test]
    fn avatar_falls_back_to_name_then_account() {
        let named = Profile { name: "zoe".into(), ..Default::default() };
        assert_eq!(named.avatar_or_default("bob"), "Z");
        assert_eq!(Profile::default().avatar_or_default("bob"), "B");
    }

    #[test]
    fn validation_flags_each_bad_field() {
        let p = Profile {
            age: 200,
            height: 400.0,
            weight: -1.0,
            phone: "12-34".into(),
            email: "nope".into(),
            birthday: "2024/01/01".into(),
            ..Default::default()
        };
        assert_eq!(p.validate().len(), 6);

        let ok = Profile {
            phone: "+86 138-0000-0000".into(),
            email: "a@b.cn".into(),
            ..Default::default()
        };
        assert!(ok.validate().is_empty());
    }

    #[tokio::test]
    async fn load_seeds_admin_and_persists_new_accounts() {
        let tmp = tempfile::tempdir().unwrap();
        let kv = Arc::new(MemoryKv::new());
        let registry = AccountRegistry::load(admin_engine(&tmp, kv.clone()), "admin", "pw", tmp.path())
            .await
            .unwrap();
        assert!(registry.verify_password("admin", "pw"));
        assert!(!registry.verify_password("admin", "bad"));

        registry.add_account("alice", "secret").await.unwrap();
        assert!(matches!(
            registry.add_account("alice", "x").await,
            Err(AccountError::Exists(_))
        ));

        // a fresh registry over the same store sees alice
        let reloaded = AccountRegistry::load(admin_engine(&tmp, kv), "admin", "other", tmp.path())
            .await
            .unwrap();
        assert!(reloaded.verify_password("alice", "secret"));
        assert!(reloaded.verify_password("admin", "pw"));
    }

    #[test]
    fn account_names_cannot_leave_the_blogs_dir() {
        assert!(is_valid_account("alice_2"));
        assert!(is_valid_account("小明"));
        for bad in ["", ".", "..", "a/b", "a.b", "a b"] {
            assert!(!is_valid_account(bad), "{:?}", bad);
        }
    }

    #[tokio::test]
    async fn add_account_rejects_dot_names() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = AccountRegistry::load(
            admin_engine(&tmp, Arc::new(MemoryKv::new())),
            "admin",
            "pw",
            tmp.path(),
        )
        .await
        .unwrap();
        for bad in [".", ".."] {
            assert!(matches!(
                registry.add_account(bad, "x").await,
                Err(AccountError::InvalidName)
            ));
            assert!(!registry.exists(bad));
        }
    }

    #[tokio::test]
    async fn update_profile_validates_and_stamps() {
        let tmp = tempfile::tempdir().unwrap();
        let registry = AccountRegistry::load(
            admin_engine(&tmp, Arc::new(MemoryKv::new())),
            "admin",
            "pw",
            tmp.path(),
        )
        .await
        .unwrap();

        let bad = Profile { age: 999, ..Default::default() };
        assert!(matches!(
            registry.update_profile("admin", bad).await,
            Err(AccountError::Invalid(_))
        ));

        let saved = registry
            .update_profile("admin", Profile { name: "root user".into(), ..Default::default() })
            .await
            .unwrap();
        assert_eq!(saved.avatar, "R");
        assert!(!saved.updated_at.is_empty());
        assert_eq!(registry.get("admin").unwrap().profile, saved);
    }
}
