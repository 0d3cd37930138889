//! In-memory login sessions, at most one per account.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

use crate::accounts::AccountRegistry;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub account: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Default)]
struct Sessions {
    by_account: HashMap<String, Session>,
    by_token: HashMap<String, String>,
}

impl Sessions {
    fn remove_account(&mut self, account: &str) {
        if let Some(old) = self.by_account.remove(account) {
            self.by_token.remove(&old.token);
        }
    }
}

pub struct SessionRegistry {
    accounts: Arc<AccountRegistry>,
    ttl: Duration,
    inner: Mutex<Sessions>,
}

impl SessionRegistry {
    pub fn new(accounts: Arc<AccountRegistry>, session_hours: u64) -> Self {
        Self {
            accounts,
            ttl: Duration::hours(session_hours as i64),
            inner: Mutex::new(Sessions::default()),
        }
    }

    pub fn accounts(&self) -> &Arc<AccountRegistry> {
        &self.accounts
    }

    /// Check the password and mint a session, replacing the account's
    /// previous one.
    pub fn login(&self, account: &str, password: &str) -> Option<Session> {
        if !self.accounts.verify_password(account, password) {
            tracing::warn!("login failed account={}", account);
            return None;
        }
        Some(self.start(account))
    }

    /// Mint a session for an account whose identity was already proven.
    pub fn start(&self, account: &str) -> Session {
        let session = Session {
            token: uuid::Uuid::new_v4().to_string(),
            account: account.to_string(),
            expires_at: Utc::now() + self.ttl,
        };
        let mut inner = self.inner.lock();
        inner.remove_account(account);
        inner
            .by_token
            .insert(session.token.clone(), account.to_string());
        inner
            .by_account
            .insert(account.to_string(), session.clone());
        tracing::info!("session started account={}", account);
        session
    }

    /// The account behind a live token. Expired sessions are dropped.
    pub fn resolve(&self, token: &str) -> Option<String> {
        let mut inner = self.inner.lock();
        let account = inner.by_token.get(token)?.clone();
        let expired = inner
            .by_account
            .get(&account)
            .map(|s| s.token != token || s.is_expired(Utc::now()))
            .unwrap_or(true);
        if expired {
            tracing::debug!("session expired account={}", account);
            inner.by_token.remove(token);
            if inner.by_account.get(&account).map(|s| s.token.as_str()) == Some(token) {
                inner.by_account.remove(&account);
            }
            return None;
        }
        Some(account)
    }

    pub fn check(&self, token: &str) -> bool {
        self.resolve(token).is_some()
    }

    pub fn logout(&self, token: &str) {
        let mut inner = self.inner.lock();
        if let Some(account) = inner.by_token.remove(token) {
            inner.by_account.remove(&account);
            tracing::info!("session ended account={}", account);
        }
    }

    #[cfg(test)]
    fn expire_now(&self, account: &str) {
        if let Some(s) = self.inner.lock().by_account.get_mut(account) {
            s.expires_at = Utc::now() - Duration::seconds(1);
        }
    }
}

// -- Cookie helpers --

pub fn session_cookie(name: &str, session: &Session) -> String {
    format!(
        "{}={}; Expires={}; Path=/; HttpOnly",
        name,
        session.token,
        session.expires_at.format("%a, %d %b %Y %H:%M:%S GMT")
    )
}

pub fn clear_session_cookie(name: &str) -> String {
    format!("{}=; Path=/; Max-Age=0", name)
}
