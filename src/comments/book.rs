use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Duration, Local};
use once_cell::sync::Lazy;
use rand::Rng;
use regex::Regex;

use super::model::{BlogComments, Comment, CommentSession, CommentUser, UserStatus, UsernameReservation};
use crate::clock;
use crate::persistence::Persistence;
use crate::sysconf::SysConfStore;

pub const OK: i32 = 0;
pub const NO_TITLE: i32 = 1;
pub const BAD_INDEX: i32 = 2;
pub const DENIED: i32 = 2;
pub const LIMIT_REACHED: i32 = 3;
pub const FAILED: i32 = 1;

const SESSION_DAYS: i64 = 7;
const FORBIDDEN_WORDS: [&str; 7] = ["admin", "管理员", "系统", "匿名", "游客", "root", "test"];

const USERNAME_TAKEN: &str = "username is already registered, enter its password";

/// Why a comment session cannot be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("session not found")]
    Missing,
    #[error("session expired")]
    Expired,
    #[error("user not found")]
    UnknownUser,
    #[error("user is muted")]
    Muted,
    #[error("user is banned")]
    Banned,
}

static USERNAME_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{Han}a-zA-Z0-9_]+$").expect("valid regex"));

/// Why a username cannot be used.
pub fn validate_username(username: &str) -> Result<(), &'static str> {
    let len = username.chars().count();
    if !(2..=20).contains(&len) {
        return Err("username must be 2 to 20 characters");
    }
    if !USERNAME_RE.is_match(username) {
        return Err("username may only contain Han characters, letters, digits and underscores");
    }
    let lower = username.to_lowercase();
    if FORBIDDEN_WORDS.iter().any(|w| lower.contains(w)) {
        return Err("username contains a forbidden word");
    }
    Ok(())
}

fn random_hex(len: usize) -> String {
    let bytes: Vec<u8> = (0..len.div_ceil(2)).map(|_| rand::thread_rng().gen()).collect();
    let mut s = hex::encode(bytes);
    s.truncate(len);
    s
}

fn new_user_id() -> String {
    format!("user_{}", random_hex(16))
}

fn new_session_id() -> String {
    format!("session_{}", random_hex(24))
}

/// Everything the store knows about one account.
#[derive(Default)]
struct AccountComments {
    comments: HashMap<String, BlogComments>,
    users: HashMap<String, CommentUser>,
    sessions: HashMap<String, CommentSession>,
    reservations: HashMap<String, UsernameReservation>,
}

pub struct CommentBook {
    accounts: HashMap<String, AccountComments>,
    persistence: Persistence,
    sysconf: Arc<SysConfStore>,
    hash_cost: u32,
}

impl CommentBook {
    pub fn new(persistence: Persistence, sysconf: Arc<SysConfStore>) -> Self {
        Self {
            accounts: HashMap::new(),
            persistence,
            sysconf,
            hash_cost: bcrypt::DEFAULT_COST,
        }
    }

    pub fn with_hash_cost(mut self, cost: u32) -> Self {
        self.hash_cost = cost;
        self
    }

    fn account(&mut self, account: &str) -> &mut AccountComments {
        if !self.accounts.contains_key(account) {
            let loaded = AccountComments {
                comments: self.persistence.list_comments(account),
                users: self.persistence.list_comment_users(account),
                sessions: self.persistence.list_comment_sessions(account),
                reservations: self.persistence.list_reservations(account),
            };
            tracing::debug!(
                "comments loaded account={} blogs={} users={}",
                account,
                loaded.comments.len(),
                loaded.users.len()
            );
            self.accounts.insert(account.to_string(), loaded);
        }
        self.accounts.entry(account.to_string()).or_default()
    }

    fn max_comments(&self, account: &str) -> usize {
        self.sysconf.with(account, |c| c.max_blog_comments())
    }

    fn push(&mut self, account: &str, title: &str, mut comment: Comment) -> i32 {
        let max = self.max_comments(account);
        let persistence = self.persistence.clone();
        let bc = self
            .account(account)
            .comments
            .entry(title.to_string())
            .or_insert_with(|| BlogComments::new(title));
        if bc.comments.len() >= max {
            tracing::warn!("comment limit reached account={} title={} max={}", account, title, max);
            return LIMIT_REACHED;
        }
        comment.idx = bc.next_index();
        bc.comments.push(comment);
        persistence.save_comments(account, bc);
        OK
    }

    /// Anonymous comment: a missing owner or password falls back to `ip`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_comment(&mut self, account: &str, title: &str, owner: &str, msg: &str, mail: &str, pwd: &str, ip: &str) -> i32 {
        let now = clock::now_string();
        let or_ip = |s: &str| if s.is_empty() { ip.to_string() } else { s.to_string() };
        let comment = Comment {
            owner: or_ip(owner),
            msg: msg.to_string(),
            create_time: now.clone(),
            modify_time: now,
            mail: mail.to_string(),
            pwd: or_ip(pwd),
            ip: ip.to_string(),
            is_anonymous: true,
            ..Default::default()
        };
        self.push(account, title, comment)
    }

    /// Resolve a live session to its user, dropping expired sessions.
    fn validate_session(&mut self, account: &str, session_id: &str) -> Result<CommentUser, SessionError> {
        let persistence = self.persistence.clone();
        let data = self.account(account);
        let session = data.sessions.get(session_id).ok_or(SessionError::Missing)?;

        let expired = clock::parse_time(&session.expire_time)
            .map(|t| Local::now().naive_local() > t)
            .unwrap_or(true);
        if expired {
            data.sessions.remove(session_id);
            persistence.delete_comment_session(account, session_id);
            return Err(SessionError::Expired);
        }

        let user = data.users.get_mut(&session.user_id).ok_or(SessionError::UnknownUser)?;
        match user.status {
            UserStatus::Normal => {}
            UserStatus::Muted => return Err(SessionError::Muted),
            UserStatus::Banned => return Err(SessionError::Banned),
        }
        user.last_active = clock::now_string();
        persistence.save_comment_user(account, user);
        Ok(user.clone())
    }

    pub fn add_comment_with_session(
        &mut self,
        account: &str,
        title: &str,
        msg: &str,
        session_id: &str,
        ip: &str,
        user_agent: &str,
    ) -> (i32, String) {
        let user = match self.validate_session(account, session_id) {
            Ok(user) => user,
            Err(e @ (SessionError::Muted | SessionError::Banned)) => return (DENIED, e.to_string()),
            Err(e) => return (FAILED, e.to_string()),
        };

        let now = clock::now_string();
        let comment = Comment {
            owner: user.username.clone(),
            msg: msg.to_string(),
            create_time: now.clone(),
            modify_time: now,
            mail: user.email.clone(),
            user_id: user.user_id.clone(),
            session_id: session_id.to_string(),
            ip: ip.to_string(),
            user_agent: user_agent.to_string(),
            is_anonymous: false,
            is_verified: user.is_verified,
            ..Default::default()
        };
        let code = self.push(account, title, comment);
        if code == LIMIT_REACHED {
            return (code, "comment limit reached".to_string());
        }

        let persistence = self.persistence.clone();
        if let Some(u) = self.account(account).users.get_mut(&user.user_id) {
            u.comment_count += 1;
            u.reputation += if u.comment_count % 10 == 0 { 5 } else { 1 };
            persistence.save_comment_user(account, u);
        }
        (OK, "comment posted".to_string())
    }

    fn open_session(&mut self, account: &str, user_id: &str, ip: &str, user_agent: &str) -> CommentSession {
        let now = Local::now();
        let session = CommentSession {
            session_id: new_session_id(),
            user_id: user_id.to_string(),
            ip: ip.to_string(),
            user_agent: user_agent.to_string(),
            create_time: now.format(clock::TIME_FORMAT).to_string(),
            expire_time: (now + Duration::days(SESSION_DAYS))
                .format(clock::TIME_FORMAT)
                .to_string(),
            is_active: true,
        };
        self.persistence.save_comment_session(account, &session);
        self.account(account)
            .sessions
            .insert(session.session_id.clone(), session.clone());
        session
    }

    /// Log in or register `username`, then comment as that user.
    /// Returns the session id so the caller can reuse it.
    #[allow(clippy::too_many_arguments)]
    pub fn add_comment_with_password(
        &mut self,
        account: &str,
        title: &str,
        msg: &str,
        username: &str,
        email: &str,
        password: &str,
        ip: &str,
        user_agent: &str,
    ) -> (i32, String, String) {
        if let Err(reason) = validate_username(username) {
            return (FAILED, reason.to_string(), String::new());
        }

        let existing = self
            .account(account)
            .users
            .values()
            .find(|u| u.username == username)
            .cloned();

        let user_id = match existing {
            Some(user) => {
                if password.is_empty() {
                    return (FAILED, USERNAME_TAKEN.to_string(), String::new());
                }
                if !bcrypt::verify(password, &user.password_hash).unwrap_or(false) {
                    return (FAILED, "wrong password for this username".to_string(), String::new());
                }
                user.user_id
            }
            None => match self.register(account, username, email, password) {
                Ok(id) => id,
                Err(reason) => return (FAILED, reason, String::new()),
            },
        };

        let session = self.open_session(account, &user_id, ip, user_agent);
        let (code, message) =
            self.add_comment_with_session(account, title, msg, &session.session_id, ip, user_agent);
        (code, message, session.session_id)
    }

    fn register(&mut self, account: &str, username: &str, email: &str, password: &str) -> Result<String, String> {
        let password_hash = if password.is_empty() {
            String::new()
        } else {
            bcrypt::hash(password, self.hash_cost).map_err(|e| {
                tracing::error!("password hash failed: {}", e);
                "password hashing failed".to_string()
            })?
        };
        let now = clock::now_string();
        let user = CommentUser {
            user_id: new_user_id(),
            username: username.to_string(),
            email: email.to_string(),
            password_hash,
            register_time: now.clone(),
            last_active: now.clone(),
            comment_count: 0,
            reputation: 0,
            status: UserStatus::Normal,
            is_verified: false,
        };
        let reservation = UsernameReservation {
            username: username.to_string(),
            user_id: user.user_id.clone(),
            reserve_time: now,
            is_temporary: false,
        };

        self.persistence.save_comment_user(account, &user);
        self.persistence.save_reservation(account, &reservation);
        let data = self.account(account);
        data.reservations.insert(username.to_string(), reservation);
        data.users.insert(user.user_id.clone(), user.clone());
        tracing::info!("comment user registered account={} user={}", account, username);
        Ok(user.user_id)
    }

    pub fn modify_comment(&mut self, account: &str, title: &str, idx: usize, msg: &str) -> i32 {
        let persistence = self.persistence.clone();
        let Some(bc) = self.account(account).comments.get_mut(title) else {
            return NO_TITLE;
        };
        let Some(comment) = bc.comments.iter_mut().find(|c| c.idx == idx) else {
            return BAD_INDEX;
        };
        comment.msg = msg.to_string();
        comment.modify_time = clock::now_string();
        persistence.save_comments(account, bc);
        OK
    }

    pub fn remove_comment(&mut self, account: &str, title: &str, idx: usize) -> i32 {
        let persistence = self.persistence.clone();
        let Some(bc) = self.account(account).comments.get_mut(title) else {
            return NO_TITLE;
        };
        let before = bc.comments.len();
        bc.comments.retain(|c| c.idx != idx);
        if bc.comments.len() == before {
            return BAD_INDEX;
        }
        bc.reindex();
        persistence.save_comments(account, bc);
        OK
    }

    pub fn get_comments(&mut self, account: &str, title: &str) -> Option<BlogComments> {
        self.account(account).comments.get(title).map(|bc| {
            let mut bc = bc.clone();
            bc.sort();
            bc
        })
    }

    pub fn comment_counts(&mut self, account: &str) -> HashMap<String, usize> {
        self.account(account)
            .comments
            .iter()
            .map(|(t, bc)| (t.clone(), bc.comments.len()))
            .collect()
    }

    pub fn check_username(&mut self, account: &str, username: &str) -> (bool, String) {
        if let Err(reason) = validate_username(username) {
            return (false, reason.to_string());
        }
        let data = self.account(account);
        let taken = data.reservations.contains_key(username)
            || data.users.values().any(|u| u.username == username);
        if taken {
            (false, USERNAME_TAKEN.to_string())
        } else {
            (true, "username is available".to_string())
        }
    }

    pub fn user(&mut self, account: &str, user_id: &str) -> Option<CommentUser> {
        self.account(account).users.get(user_id).cloned()
    }

    pub fn set_user_status(&mut self, account: &str, user_id: &str, status: UserStatus) -> bool {
        let persistence = self.persistence.clone();
        match self.account(account).users.get_mut(user_id) {
            Some(user) => {
                user.status = status;
                persistence.save_comment_user(account, user);
                true
            }
            None => false,
        }
    }

    #[cfg(test)]
    fn expire_session(&mut self, account: &str, session_id: &str) {
        if let Some(s) = self.account(account).sessions.get_mut(session_id) {
            s.expire_time = "2000-01-01 00:00:00".to_string();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory::MemoryKv;
    use crate::persistence::FileMirror;

    fn setup(tmp: &tempfile::TempDir) -> (CommentBook, Persistence, Arc<SysConfStore>) {
        let mirror = FileMirror::new(tmp.path().join("blogs"), tmp.path().join("recycle"));
        let persistence = Persistence::new(Arc::new(MemoryKv::new()), mirror, "admin");
        let conf = Arc::new(SysConfStore::new("admin"));
        let book = CommentBook::new(persistence.clone(), conf.clone()).with_hash_cost(4);
        (book, persistence, conf)
    }

    #[test]
    fn username_rules() {
        assert!(validate_username("小明_01").is_ok());
        assert!(validate_username("a").is_err());
        assert!(validate_username(&"x".repeat(21)).is_err());
        assert!(validate_username("bad name").is_err());
        assert!(validate_username("SuperAdmin").is_err());
        assert!(validate_username("游客123").is_err());
    }

    #[test]
    fn ids_have_expected_shape() {
        let u = new_user_id();
        let s = new_session_id();
        assert_eq!(u.len(), "user_".len() + 16);
        assert_eq!(s.len(), "session_".len() + 24);
        assert!(u["user_".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn anonymous_comments_get_contiguous_indices() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut book, persistence, _) = setup(&tmp);
        for i in 0..3 {
            assert_eq!(book.add_comment("a", "post", "", &format!("m{}", i), "", "", "1.2.3.4"), OK);
        }
        let bc = book.get_comments("a", "post").unwrap();
        assert_eq!(bc.comments.iter().map(|c| c.idx).collect::<Vec<_>>(), [0, 1, 2]);
        assert_eq!(bc.comments[0].owner, "1.2.3.4");
        assert_eq!(bc.comments[0].pwd, "1.2.3.4");

        assert_eq!(book.remove_comment("a", "post", 1), OK);
        let bc = book.get_comments("a", "post").unwrap();
        assert_eq!(bc.comments.iter().map(|c| c.idx).collect::<Vec<_>>(), [0, 1]);
        assert_eq!(bc.comments[1].msg, "m2");

        // persisted form matches after reindex
        let stored = persistence.list_comments("a");
        assert_eq!(stored["post"].comments.len(), 2);
    }

    #[test]
    fn limit_is_enforced() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut book, _, conf) = setup(&tmp);
        conf.reload("a", Some("max_blog_comments=2"));
        assert_eq!(book.add_comment("a", "p", "x", "1", "", "", "ip"), OK);
        assert_eq!(book.add_comment("a", "p", "x", "2", "", "", "ip"), OK);
        assert_eq!(book.add_comment("a", "p", "x", "3", "", "", "ip"), LIMIT_REACHED);
    }

    #[test]
    fn modify_and_remove_codes() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut book, _, _) = setup(&tmp);
        assert_eq!(book.modify_comment("a", "none", 0, "x"), NO_TITLE);
        book.add_comment("a", "p", "o", "m", "", "", "ip");
        assert_eq!(book.modify_comment("a", "p", 5, "x"), BAD_INDEX);
        assert_eq!(book.modify_comment("a", "p", 0, "edited"), OK);
        assert_eq!(book.get_comments("a", "p").unwrap().comments[0].msg, "edited");
        assert_eq!(book.remove_comment("a", "p", 9), BAD_INDEX);
        assert_eq!(book.remove_comment("a", "none", 0), NO_TITLE);
    }

    #[test]
    fn password_comment_registers_then_authenticates() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut book, _, _) = setup(&tmp);

        let (code, _, sid) = book.add_comment_with_password("a", "p", "hi", "小明", "m@x.cn", "pw1", "ip", "ua");
        assert_eq!(code, OK);
        assert!(sid.starts_with("session_"));
        assert!(!book.check_username("a", "小明").0);

        let (code, msg, _) = book.add_comment_with_password("a", "p", "again", "小明", "", "wrong", "ip", "ua");
        assert_eq!(code, FAILED);
        assert_eq!(msg, "wrong password for this username");

        let (code, _, _) = book.add_comment_with_password("a", "p", "again", "小明", "", "pw1", "ip", "ua");
        assert_eq!(code, OK);

        let (code, _) = book.add_comment_with_session("a", "p", "via session", &sid, "ip", "ua");
        assert_eq!(code, OK);

        let bc = book.get_comments("a", "p").unwrap();
        assert_eq!(bc.comments.len(), 3);
        let user = book.user("a", &bc.comments[0].user_id).unwrap();
        assert_eq!(user.comment_count, 3);
        assert_eq!(user.reputation, 3);
        assert_ne!(user.password_hash, "pw1");
    }

    #[test]
    fn reputation_bonus_every_tenth_comment() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut book, _, _) = setup(&tmp);
        let (_, _, sid) = book.add_comment_with_password("a", "p", "0", "writer", "", "pw", "ip", "ua");
        for i in 1..10 {
            book.add_comment_with_session("a", "p", &i.to_string(), &sid, "ip", "ua");
        }
        let uid = book.get_comments("a", "p").unwrap().comments[0].user_id.clone();
        let user = book.user("a", &uid).unwrap();
        assert_eq!(user.comment_count, 10);
        assert_eq!(user.reputation, 9 + 5);
    }

    #[test]
    fn session_rejections() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut book, _, _) = setup(&tmp);
        assert_eq!(book.add_comment_with_session("a", "p", "x", "session_nope", "ip", "ua").0, FAILED);

        let (_, _, sid) = book.add_comment_with_password("a", "p", "x", "muted_one", "", "pw", "ip", "ua");
        let uid = book.get_comments("a", "p").unwrap().comments[0].user_id.clone();
        book.set_user_status("a", &uid, UserStatus::Muted);
        let (code, msg) = book.add_comment_with_session("a", "p", "x", &sid, "ip", "ua");
        assert_eq!((code, msg.as_str()), (DENIED, "user is muted"));

        book.set_user_status("a", &uid, UserStatus::Normal);
        book.expire_session("a", &sid);
        let (code, msg) = book.add_comment_with_session("a", "p", "x", &sid, "ip", "ua");
        assert_eq!((code, msg.as_str()), (FAILED, "session expired"));
        // the expired session is gone for good
        assert_eq!(book.add_comment_with_session("a", "p", "x", &sid, "ip", "ua").1, "session not found");
    }

    #[test]
    fn state_is_reloaded_from_persistence() {
        let tmp = tempfile::tempdir().unwrap();
        let (mut book, persistence, conf) = setup(&tmp);
        book.add_comment_with_password("a", "p", "hello", "persisted", "", "pw", "ip", "ua");

        let mut fresh = CommentBook::new(persistence, conf).with_hash_cost(4);
        assert_eq!(fresh.get_comments("a", "p").unwrap().comments[0].msg, "hello");
        assert!(!fresh.check_username("a", "persisted").0);
        let (code, _, _) = fresh.add_comment_with_password("a", "p", "x", "persisted", "", "pw", "ip", "ua");
        assert_eq!(code, OK);
    }
}
