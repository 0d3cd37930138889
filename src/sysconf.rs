//! Per-account runtime configuration.
//!
//! Each account's settings come from the `sys_conf` blog (plus, for the
//! admin, a startup file). Reads are hot and writes only happen while the
//! owning blog actor handles a `sys_conf` mutation, so this is a plain
//! read-write lock per account instead of another actor.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

pub const SYS_CONF_TITLE: &str = "sys_conf";

const DEFAULTS: &[(&str, &str)] = &[
    ("publictags", "public|share|demo"),
    ("sysfiles", "sys_conf|sys_accounts"),
    ("title_auto_add_date_suffix", "日记"),
    ("diary_keywords", "日记_"),
    ("diary_password", "diary123"),
    ("share_days", "7"),
    ("max_blog_comments", "100"),
    ("main_show_blogs", "50"),
];

const DEFAULT_DIARY_KEYWORD: &str = "日记_";

/// Parse `key=value` lines. `#` lines and blank lines are skipped; the
/// split is on the first `=` and both sides are trimmed at the ends.
pub fn parse_conf(text: &str) -> HashMap<String, String> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .filter_map(|line| line.split_once('='))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .filter(|(k, _)| !k.is_empty())
        .collect()
}

fn split_pipe(value: Option<&String>) -> Vec<String> {
    value
        .map(|v| {
            v.split('|')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect()
        })
        .unwrap_or_default()
}

/// Parsed configuration of one account.
#[derive(Debug, Clone, Default)]
pub struct AccountConf {
    values: HashMap<String, String>,
    auto_date_suffix: Vec<String>,
    public_tags: Vec<String>,
    sys_files: Vec<String>,
    diary_keywords: Vec<String>,
}

impl AccountConf {
    fn from_values(values: HashMap<String, String>) -> Self {
        let mut diary_keywords = split_pipe(values.get("diary_keywords"));
        if diary_keywords.is_empty() {
            diary_keywords.push(DEFAULT_DIARY_KEYWORD.to_string());
        }
        Self {
            auto_date_suffix: split_pipe(values.get("title_auto_add_date_suffix")),
            public_tags: split_pipe(values.get("publictags")),
            sys_files: split_pipe(values.get("sysfiles")),
            diary_keywords,
            values,
        }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn auto_date_suffix(&self) -> &[String] {
        &self.auto_date_suffix
    }

    pub fn public_tags(&self) -> &[String] {
        &self.public_tags
    }

    pub fn sys_files(&self) -> &[String] {
        &self.sys_files
    }

    pub fn diary_keywords(&self) -> &[String] {
        &self.diary_keywords
    }

    /// Titles that get `_YYYY-MM-DD` appended on add. Exact match.
    pub fn needs_date_suffix(&self, title: &str) -> bool {
        self.auto_date_suffix.iter().any(|s| s == title)
    }

    /// Whether `title` is a dated variant of an auto-suffix title.
    pub fn is_timed_title(&self, title: &str) -> bool {
        let lower = title.to_lowercase();
        self.auto_date_suffix
            .iter()
            .any(|s| lower.contains(&s.to_lowercase()))
    }

    pub fn is_diary_title(&self, title: &str) -> bool {
        self.diary_keywords.iter().any(|k| title.starts_with(k.as_str()))
    }

    pub fn is_sys_file(&self, title: &str) -> bool {
        self.sys_files.iter().any(|s| s == title)
    }

    pub fn is_public_tag(&self, tag: &str) -> bool {
        self.public_tags.iter().any(|t| t.eq_ignore_ascii_case(tag))
    }

    fn number<T: std::str::FromStr>(&self, key: &str, default: T) -> T {
        self.get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    pub fn diary_password(&self) -> String {
        self.get("diary_password")
            .filter(|p| !p.is_empty())
            .unwrap_or("diary123")
            .to_string()
    }

    pub fn share_days(&self) -> i64 {
        self.number("share_days", 7)
    }

    pub fn max_blog_comments(&self) -> usize {
        self.number("max_blog_comments", 100)
    }

    pub fn main_show_blogs(&self) -> i64 {
        self.number("main_show_blogs", 50)
    }
}

pub struct SysConfStore {
    admin_account: String,
    /// Admin-only settings from the startup file.
    startup: HashMap<String, String>,
    accounts: RwLock<HashMap<String, Arc<RwLock<AccountConf>>>>,
}

impl SysConfStore {
    pub fn new(admin_account: impl Into<String>) -> Self {
        Self {
            admin_account: admin_account.into(),
            startup: HashMap::new(),
            accounts: RwLock::new(HashMap::new()),
        }
    }

    /// Seed the admin layer from the startup `sys_conf` file text.
    pub fn with_startup(mut self, text: &str) -> Self {
        self.startup = parse_conf(text);
        self
    }

    fn entry(&self, account: &str) -> Arc<RwLock<AccountConf>> {
        if let Some(conf) = self.accounts.read().get(account) {
            return conf.clone();
        }
        let mut accounts = self.accounts.write();
        accounts
            .entry(account.to_string())
            .or_insert_with(|| Arc::new(RwLock::new(self.build(account, None))))
            .clone()
    }

    fn build(&self, account: &str, blog_text: Option<&str>) -> AccountConf {
        let mut values: HashMap<String, String> = DEFAULTS
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        if account == self.admin_account {
            values.extend(self.startup.clone());
        }
        if let Some(text) = blog_text {
            values.extend(parse_conf(text));
        }
        AccountConf::from_values(values)
    }

    /// Re-parse the account's config from the `sys_conf` blog text
    /// (`None` when the blog does not exist).
    pub fn reload(&self, account: &str, blog_text: Option<&str>) {
        let conf = self.build(account, blog_text);
        tracing::debug!(
            "sys_conf reloaded account={} keys={}",
            account,
            conf.values.len()
        );
        *self.entry(account).write() = conf;
    }

    /// Snapshot of the parsed configuration.
    pub fn account(&self, account: &str) -> AccountConf {
        self.entry(account).read().clone()
    }

    /// Run `f` under the account's read lock.
    pub fn with<T>(&self, account: &str, f: impl FnOnce(&AccountConf) -> T) -> T {
        let entry = self.entry(account);
        let conf = entry.read();
        f(&conf)
    }

    pub fn get(&self, account: &str, key: &str) -> Option<String> {
        self.with(account, |c| c.get(key).map(String::from))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_conf_skips_comments_and_blank_lines() {
        let map = parse_conf("# comment\n\nkey = some value \nother=a=b\n  =novalue\nbare\n");
        assert_eq!(map.get("key").map(String::as_str), Some("some value"));
        assert_eq!(map.get("other").map(String::as_str), Some("a=b"));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn defaults_apply_to_every_account() {
        let store = SysConfStore::new("admin");
        let conf = store.account("bob");
        assert!(conf.is_sys_file("sys_conf"));
        assert!(conf.needs_date_suffix("日记"));
        assert!(!conf.needs_date_suffix("日记本"));
        assert_eq!(conf.diary_password(), "diary123");
        assert_eq!(conf.share_days(), 7);
    }

    #[test]
    fn blog_overrides_startup_file_for_admin() {
        let store = SysConfStore::new("admin").with_startup("share_days=3\ndiary_password=file");
        assert_eq!(store.account("admin").share_days(), 3);
        assert_eq!(store.account("bob").share_days(), 7);

        store.reload("admin", Some("diary_password=secret"));
        let conf = store.account("admin");
        assert_eq!(conf.diary_password(), "secret");
        assert_eq!(conf.share_days(), 3);
    }

    #[test]
    fn diary_keywords_trim_and_fall_back() {
        let store = SysConfStore::new("admin");
        store.reload("bob", Some("diary_keywords= 私密_ | |journal-"));
        let conf = store.account("bob");
        assert_eq!(conf.diary_keywords(), ["私密_", "journal-"]);
        assert!(conf.is_diary_title("journal-today"));

        store.reload("bob", Some("diary_keywords="));
        assert_eq!(store.account("bob").diary_keywords(), ["日记_"]);
    }

    #[test]
    fn arrays_are_reparsed_on_reload() {
        let store = SysConfStore::new("admin");
        store.reload("bob", Some("sysfiles=keep\npublictags=Open"));
        let conf = store.account("bob");
        assert!(conf.is_sys_file("keep"));
        assert!(!conf.is_sys_file("sys_conf"));
        assert!(conf.is_public_tag("open"));
        assert_eq!(store.get("bob", "sysfiles").as_deref(), Some("keep"));
    }

    #[test]
    fn timed_title_check_is_case_insensitive_contains() {
        let store = SysConfStore::new("admin");
        store.reload("bob", Some("title_auto_add_date_suffix=Daily|日记"));
        let conf = store.account("bob");
        assert!(conf.is_timed_title("daily_2024-05-01"));
        assert!(conf.is_timed_title("日记_2024-05-01"));
        assert!(!conf.is_timed_title("weekly"));
    }
}
