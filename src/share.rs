//! Password-protected share links for single blogs and whole tags.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::actor::Actor;
use crate::sysconf::SysConfStore;

pub const INITIAL_COUNT: i64 = 9999;

pub const ABSENT: i64 = -1;
pub const EXHAUSTED: i64 = -2;
pub const EXPIRED: i64 = -3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ShareKind {
    Blog,
    Tag,
}

impl ShareKind {
    /// Value of the `t` query parameter.
    pub fn code(self) -> u8 {
        match self {
            ShareKind::Blog => 0,
            ShareKind::Tag => 1,
        }
    }

    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ShareKind::Blog),
            1 => Some(ShareKind::Tag),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SharedEntry {
    pub kind: ShareKind,
    pub account: String,
    pub name: String,
    pub pwd: String,
    pub url: String,
    pub count: i64,
    /// Unix seconds.
    pub expires_at: i64,
}

impl SharedEntry {
    fn new(kind: ShareKind, account: &str, name: &str, days: i64, now: i64) -> Self {
        let pwd = uuid::Uuid::new_v4().to_string();
        let url = format!(
            "/getshare?t={}&name={}&pwd={}&account={}",
            kind.code(),
            escape(name),
            pwd,
            escape(account)
        );
        Self {
            kind,
            account: account.to_string(),
            name: name.to_string(),
            pwd,
            url,
            count: INITIAL_COUNT,
            expires_at: now + days * 86400,
        }
    }
}

fn escape(s: &str) -> String {
    url::form_urlencoded::byte_serialize(s.as_bytes()).collect()
}

type ShareKey = (ShareKind, String, String);

#[derive(Default)]
pub struct ShareBook {
    entries: HashMap<ShareKey, SharedEntry>,
}

impl ShareBook {
    fn key(kind: ShareKind, account: &str, name: &str) -> ShareKey {
        (kind, account.to_string(), name.to_string())
    }

    /// Existing links get one more use; new ones start at [`INITIAL_COUNT`].
    pub fn add(&mut self, kind: ShareKind, account: &str, name: &str, days: i64, now: i64) -> SharedEntry {
        let entry = self
            .entries
            .entry(Self::key(kind, account, name))
            .and_modify(|e| e.count += 1)
            .or_insert_with(|| SharedEntry::new(kind, account, name, days, now));
        entry.clone()
    }

    pub fn get(&self, kind: ShareKind, account: &str, name: &str) -> Option<SharedEntry> {
        self.entries.get(&Self::key(kind, account, name)).cloned()
    }

    /// Apply `delta` to the remaining count. Returns the new count, or one
    /// of [`ABSENT`], [`EXHAUSTED`], [`EXPIRED`]; the last two drop the link.
    pub fn modify_count(&mut self, kind: ShareKind, account: &str, name: &str, delta: i64, now: i64) -> i64 {
        let key = Self::key(kind, account, name);
        let Some(entry) = self.entries.get_mut(&key) else {
            return ABSENT;
        };
        entry.count += delta;
        if entry.count < 0 {
            self.entries.remove(&key);
            return EXHAUSTED;
        }
        if now > entry.expires_at {
            self.entries.remove(&key);
            return EXPIRED;
        }
        entry.count
    }

    pub fn list(&self, account: &str) -> Vec<SharedEntry> {
        let mut out: Vec<SharedEntry> = self
            .entries
            .values()
            .filter(|e| e.account == account)
            .cloned()
            .collect();
        out.sort_by(|a, b| (a.kind.code(), &a.name).cmp(&(b.kind.code(), &b.name)));
        out
    }

    pub fn remove(&mut self, kind: ShareKind, account: &str, name: &str) -> bool {
        self.entries.remove(&Self::key(kind, account, name)).is_some()
    }
}

#[derive(Clone)]
pub struct ShareRegistry {
    actor: Actor<ShareBook>,
    sysconf: Arc<SysConfStore>,
}

impl ShareRegistry {
    pub fn spawn(sysconf: Arc<SysConfStore>) -> Self {
        Self {
            actor: Actor::spawn("share", ShareBook::default()),
            sysconf,
        }
    }

    async fn add(&self, kind: ShareKind, account: &str, name: &str) -> Option<SharedEntry> {
        let days = self.sysconf.with(account, |c| c.share_days());
        let (account, name) = (account.to_string(), name.to_string());
        let now = Utc::now().timestamp();
        let entry = self
            .actor
            .execute(move |b| b.add(kind, &account, &name, days, now))
            .await;
        match entry {
            Ok(e) => {
                tracing::info!("share {:?} {}/{} count={}", kind, e.account, e.name, e.count);
                Some(e)
            }
            Err(e) => {
                tracing::error!("{}", e);
                None
            }
        }
    }

    pub async fn add_shared_blog(&self, account: &str, title: &str) -> Option<(String, String)> {
        self.add(ShareKind::Blog, account, title)
            .await
            .map(|e| (e.url, e.pwd))
    }

    pub async fn add_shared_tag(&self, account: &str, tag: &str) -> Option<(String, String)> {
        self.add(ShareKind::Tag, account, tag)
            .await
            .map(|e| (e.url, e.pwd))
    }

    pub async fn get(&self, kind: ShareKind, account: &str, name: &str) -> Option<SharedEntry> {
        let (account, name) = (account.to_string(), name.to_string());
        self.actor
            .execute(move |b| b.get(kind, &account, &name))
            .await
            .ok()
            .flatten()
    }

    pub async fn get_shared_blog(&self, account: &str, title: &str) -> Option<SharedEntry> {
        self.get(ShareKind::Blog, account, title).await
    }

    pub async fn get_shared_tag(&self, account: &str, tag: &str) -> Option<SharedEntry> {
        self.get(ShareKind::Tag, account, tag).await
    }

    pub async fn modify_count(&self, kind: ShareKind, account: &str, name: &str, delta: i64) -> i64 {
        let (account, name) = (account.to_string(), name.to_string());
        let now = Utc::now().timestamp();
        self.actor
            .execute(move |b| b.modify_count(kind, &account, &name, delta, now))
            .await
            .unwrap_or(ABSENT)
    }

    pub async fn modify_blog_count(&self, account: &str, title: &str, delta: i64) -> i64 {
        self.modify_count(ShareKind::Blog, account, title, delta).await
    }

    pub async fn modify_tag_count(&self, account: &str, tag: &str, delta: i64) -> i64 {
        self.modify_count(ShareKind::Tag, account, tag, delta).await
    }

    pub async fn list(&self, account: &str) -> Vec<SharedEntry> {
        let account = account.to_string();
        self.actor
            .execute(move |b| b.list(&account))
            .await
            .unwrap_or_default()
    }

    pub async fn remove(&self, kind: ShareKind, account: &str, name: &str) -> bool {
        let (account, name) = (account.to_string(), name.to_string());
        self.actor
            .execute(move |b| b.remove(kind, &account, &name))
            .await
            .unwrap_or(false)
    }
}
