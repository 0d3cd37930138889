//! Blog comments and the lightweight commenter identities behind them.

pub mod book;
pub mod model;

use std::collections::HashMap;
use std::sync::Arc;

pub use book::CommentBook;
pub use model::{BlogComments, Comment, CommentUser, UserStatus};

use crate::actor::Actor;
use crate::persistence::Persistence;
use crate::sysconf::SysConfStore;

/// Who is posting a comment.
#[derive(Debug, Clone, Default)]
pub struct Poster {
    pub ip: String,
    pub user_agent: String,
}

/// Async handle to the single comment actor shared by every account.
#[derive(Clone)]
pub struct CommentStore {
    actor: Actor<CommentBook>,
}

impl CommentStore {
    pub fn spawn(persistence: Persistence, sysconf: Arc<SysConfStore>) -> Self {
        Self::from_book(CommentBook::new(persistence, sysconf))
    }

    pub fn from_book(book: CommentBook) -> Self {
        Self {
            actor: Actor::spawn("comments", book),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn add_comment(&self, account: &str, title: &str, owner: &str, msg: &str, mail: &str, pwd: &str, poster: &Poster) -> i32 {
        let (account, title, owner, msg, mail, pwd, ip) = (
            account.to_string(),
            title.to_string(),
            owner.to_string(),
            msg.to_string(),
            mail.to_string(),
            pwd.to_string(),
            poster.ip.clone(),
        );
        self.actor
            .execute(move |b| b.add_comment(&account, &title, &owner, &msg, &mail, &pwd, &ip))
            .await
            .unwrap_or(book::FAILED)
    }

    pub async fn add_comment_with_session(&self, account: &str, title: &str, msg: &str, session_id: &str, poster: &Poster) -> (i32, String) {
        let (account, title, msg, sid) = (
            account.to_string(),
            title.to_string(),
            msg.to_string(),
            session_id.to_string(),
        );
        let poster = poster.clone();
        self.actor
            .execute(move |b| {
                b.add_comment_with_session(&account, &title, &msg, &sid, &poster.ip, &poster.user_agent)
            })
            .await
            .unwrap_or_else(|e| (book::FAILED, e.to_string()))
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn add_comment_with_password(
        &self,
        account: &str,
        title: &str,
        msg: &str,
        username: &str,
        email: &str,
        password: &str,
        poster: &Poster,
    ) -> (i32, String, String) {
        let (account, title, msg, username, email, password) = (
            account.to_string(),
            title.to_string(),
            msg.to_string(),
            username.to_string(),
            email.to_string(),
            password.to_string(),
        );
        let poster = poster.clone();
        self.actor
            .execute(move |b| {
                b.add_comment_with_password(
                    &account,
                    &title,
                    &msg,
                    &username,
                    &email,
                    &password,
                    &poster.ip,
                    &poster.user_agent,
                )
            })
            .await
            .unwrap_or_else(|e| (book::FAILED, e.to_string(), String::new()))
    }

    pub async fn modify_comment(&self, account: &str, title: &str, idx: usize, msg: &str) -> i32 {
        let (account, title, msg) = (account.to_string(), title.to_string(), msg.to_string());
        self.actor
            .execute(move |b| b.modify_comment(&account, &title, idx, &msg))
            .await
            .unwrap_or(book::FAILED)
    }

    pub async fn remove_comment(&self, account: &str, title: &str, idx: usize) -> i32 {
        let (account, title) = (account.to_string(), title.to_string());
        self.actor
            .execute(move |b| b.remove_comment(&account, &title, idx))
            .await
            .unwrap_or(book::FAILED)
    }

    pub async fn get_comments(&self, account: &str, title: &str) -> Option<BlogComments> {
        let (account, title) = (account.to_string(), title.to_string());
        self.actor
            .execute(move |b| b.get_comments(&account, &title))
            .await
            .ok()
            .flatten()
    }

    pub async fn comment_counts(&self, account: &str) -> HashMap<String, usize> {
        let account = account.to_string();
        self.actor
            .execute(move |b| b.comment_counts(&account))
            .await
            .unwrap_or_default()
    }

    pub async fn check_username(&self, account: &str, username: &str) -> (bool, String) {
        let (account, username) = (account.to_string(), username.to_string());
        self.actor
            .execute(move |b| b.check_username(&account, &username))
            .await
            .unwrap_or_else(|e| (false, e.to_string()))
    }
}
