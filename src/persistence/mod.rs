//! KV + filesystem persistence for blogs, comments and commenter identities.
//!
//! The KV store is authoritative. The file mirror is a best-effort export:
//! its failures are logged and never reach the caller.

pub mod codec;
mod mirror;

use std::collections::HashMap;
use std::sync::Arc;

pub use mirror::FileMirror;

use crate::blog::model::Blog;
use crate::comments::model::{BlogComments, CommentSession, CommentUser, UsernameReservation};
use crate::kv::{Fields, KvStore};

pub fn blog_key(account: &str, title: &str) -> String {
    format!("{}:blog@{}", account, title)
}

pub fn legacy_blog_key(title: &str) -> String {
    format!("blog@{}", title)
}

pub fn comments_key(account: &str, title: &str) -> String {
    format!("{}:comments@{}", account, title)
}

pub fn comment_user_key(account: &str, user_id: &str) -> String {
    format!("{}:comment_user@{}", account, user_id)
}

pub fn comment_session_key(account: &str, session_id: &str) -> String {
    format!("{}:comment_session@{}", account, session_id)
}

pub fn reservation_key(account: &str, username: &str) -> String {
    format!("{}:username_reservation@{}", account, username)
}

/// Part of a key after the first `@`.
fn key_suffix(key: &str) -> &str {
    key.split_once('@').map(|(_, rest)| rest).unwrap_or(key)
}

#[derive(Clone)]
pub struct Persistence {
    kv: Arc<dyn KvStore>,
    mirror: FileMirror,
    admin_account: String,
}

impl Persistence {
    pub fn new(kv: Arc<dyn KvStore>, mirror: FileMirror, admin_account: impl Into<String>) -> Self {
        Self {
            kv,
            mirror,
            admin_account: admin_account.into(),
        }
    }

    pub fn mirror(&self) -> &FileMirror {
        &self.mirror
    }

    fn is_admin(&self, account: &str) -> bool {
        account == self.admin_account
    }

    // -- Blogs --

    /// Write the blog to the KV, then mirror it to disk.
    /// Returns false when the KV write failed.
    pub fn put_blog(&self, account: &str, blog: &Blog) -> bool {
        let key = blog_key(account, &blog.title);
        if let Err(e) = self.kv.hset_all(&key, &codec::blog_to_fields(blog)) {
            tracing::error!("put_blog error key={} err={}", key, e);
            return false;
        }

        if self.is_admin(account) {
            let legacy = legacy_blog_key(&blog.title);
            if let Err(e) = self.kv.del(&legacy) {
                tracing::warn!("legacy cleanup failed key={} err={}", legacy, e);
            }
        }

        if let Err(e) = self.mirror.save(account, &blog.title, &blog.content) {
            tracing::error!("mirror save failed {}/{}: {}", account, blog.title, e);
        }
        true
    }

    pub fn get_blog(&self, account: &str, title: &str) -> Option<Blog> {
        let mut keys = vec![blog_key(account, title)];
        if self.is_admin(account) {
            keys.push(legacy_blog_key(title));
        }
        keys.iter().find_map(|key| match self.kv.hget_all(key) {
            Ok(Some(fields)) => codec::blog_from_fields(&fields, account),
            Ok(None) => None,
            Err(e) => {
                tracing::error!("get_blog error key={} err={}", key, e);
                None
            }
        })
    }

    /// Every blog of `account`, oldest first by creation time.
    ///
    /// For the admin account the pre-multi-account `blog@*` keys are merged
    /// in; a prefixed key wins over a legacy one with the same title.
    pub fn list_blogs(&self, account: &str) -> Vec<Blog> {
        let mut blogs: HashMap<String, Blog> = HashMap::new();

        if self.is_admin(account) {
            for blog in self.load_blogs(account, "blog@*") {
                blogs.insert(blog.title.clone(), blog);
            }
        }
        for blog in self.load_blogs(account, &blog_key(account, "*")) {
            blogs.insert(blog.title.clone(), blog);
        }

        let mut out: Vec<Blog> = blogs.into_values().collect();
        out.sort_by(|a, b| {
            a.create_time
                .cmp(&b.create_time)
                .then_with(|| a.title.cmp(&b.title))
        });
        tracing::debug!("list_blogs account={} len={}", account, out.len());
        out
    }

    fn load_blogs(&self, account: &str, pattern: &str) -> Vec<Blog> {
        let keys = match self.kv.keys(pattern) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!("list_blogs error pattern={} err={}", pattern, e);
                return Vec::new();
            }
        };
        keys.iter()
            .filter_map(|key| match self.kv.hget_all(key) {
                Ok(Some(fields)) => codec::blog_from_fields(&fields, account),
                Ok(None) => None,
                Err(e) => {
                    tracing::error!("list_blogs error key={} err={}", key, e);
                    None
                }
            })
            .collect()
    }

    /// Remove the KV entry, then move the mirror file to the recycle bin.
    /// Returns false only when the KV delete failed.
    pub fn delete_blog(&self, account: &str, title: &str) -> bool {
        let key = blog_key(account, title);
        if let Err(e) = self.kv.del(&key) {
            tracing::error!("delete_blog error key={} err={}", key, e);
            return false;
        }
        if self.is_admin(account) {
            let legacy = legacy_blog_key(title);
            if let Err(e) = self.kv.del(&legacy) {
                tracing::warn!("legacy cleanup failed key={} err={}", legacy, e);
            }
        }

        match self.mirror.recycle(account, title) {
            Ok(Some(to)) => tracing::debug!("recycled {}/{} to {}", account, title, to.display()),
            Ok(None) => {}
            Err(e) => tracing::error!("recycle failed {}/{}: {}", account, title, e),
        }
        true
    }

    // -- Comments --

    /// Replace the stored comment hash of one blog.
    pub fn save_comments(&self, account: &str, bc: &BlogComments) -> bool {
        let key = comments_key(account, &bc.title);
        let result = self.kv.del(&key).and_then(|_| {
            if bc.comments.is_empty() {
                Ok(())
            } else {
                self.kv.hset_all(&key, &codec::comments_to_fields(bc))
            }
        });
        match result {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("save_comments error key={} err={}", key, e);
                false
            }
        }
    }

    pub fn list_comments(&self, account: &str) -> HashMap<String, BlogComments> {
        self.scan(&comments_key(account, "*"))
            .into_iter()
            .map(|(key, fields)| {
                let title = key_suffix(&key).to_string();
                let bc = codec::comments_from_fields(&title, &fields);
                (title, bc)
            })
            .collect()
    }

    pub fn save_comment_user(&self, account: &str, user: &CommentUser) -> bool {
        self.put(&comment_user_key(account, &user.user_id), codec::user_to_fields(user))
    }

    pub fn list_comment_users(&self, account: &str) -> HashMap<String, CommentUser> {
        self.scan(&comment_user_key(account, "*"))
            .into_iter()
            .filter_map(|(_, f)| codec::user_from_fields(&f))
            .map(|u| (u.user_id.clone(), u))
            .collect()
    }

    pub fn save_comment_session(&self, account: &str, session: &CommentSession) -> bool {
        self.put(
            &comment_session_key(account, &session.session_id),
            codec::session_to_fields(session),
        )
    }

    pub fn list_comment_sessions(&self, account: &str) -> HashMap<String, CommentSession> {
        self.scan(&comment_session_key(account, "*"))
            .into_iter()
            .filter_map(|(_, f)| codec::session_from_fields(&f))
            .map(|s| (s.session_id.clone(), s))
            .collect()
    }

    pub fn delete_comment_session(&self, account: &str, session_id: &str) -> bool {
        self.remove(&comment_session_key(account, session_id))
    }

    pub fn save_reservation(&self, account: &str, r: &UsernameReservation) -> bool {
        self.put(&reservation_key(account, &r.username), codec::reservation_to_fields(r))
    }

    pub fn list_reservations(&self, account: &str) -> HashMap<String, UsernameReservation> {
        self.scan(&reservation_key(account, "*"))
            .into_iter()
            .filter_map(|(_, f)| codec::reservation_from_fields(&f))
            .map(|r| (r.username.clone(), r))
            .collect()
    }

    pub fn delete_reservation(&self, account: &str, username: &str) -> bool {
        self.remove(&reservation_key(account, username))
    }

    // -- helpers --

    fn put(&self, key: &str, fields: Fields) -> bool {
        match self.kv.hset_all(key, &fields) {
            Ok(()) => true,
            Err(e) => {
                tracing::error!("kv write error key={} err={}", key, e);
                false
            }
        }
    }

    fn remove(&self, key: &str) -> bool {
        match self.kv.del(key) {
            Ok(removed) => removed,
            Err(e) => {
                tracing::error!("kv delete error key={} err={}", key, e);
                false
            }
        }
    }

    fn scan(&self, pattern: &str) -> Vec<(String, Fields)> {
        let keys = match self.kv.keys(pattern) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::error!("kv scan error pattern={} err={}", pattern, e);
                return Vec::new();
            }
        };
        keys.into_iter()
            .filter_map(|key| match self.kv.hget_all(&key) {
                Ok(Some(fields)) => Some((key, fields)),
                Ok(None) => None,
                Err(e) => {
                    tracing::error!("kv read error key={} err={}", key, e);
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::model::AuthFlags;
    use crate::comments::model::Comment;
    use crate::kv::MemoryKv;

    fn setup() -> (tempfile::TempDir, Arc<MemoryKv>, Persistence) {
        let tmp = tempfile::tempdir().unwrap();
        let kv = Arc::new(MemoryKv::new());
        let mirror = FileMirror::new(tmp.path().join("blogs"), tmp.path().join("recycle"));
        let p = Persistence::new(kv.clone(), mirror, "admin");
        (tmp, kv, p)
    }

    fn blog(account: &str, title: &str, ct: &str) -> Blog {
        Blog {
            title: title.into(),
            content: format!("content of {}", title),
            create_time: ct.into(),
            modify_time: ct.into(),
            access_time: ct.into(),
            modify_count: 0,
            access_count: 0,
            auth: AuthFlags::PRIVATE,
            tags: String::new(),
            encrypt: 0,
            account: account.into(),
        }
    }

    #[test]
    fn put_blog_writes_kv_and_mirror() {
        let (tmp, kv, p) = setup();
        assert!(p.put_blog("alice", &blog("alice", "k", "2024-01-01 00:00:00")));
        assert!(kv.hget_all("alice:blog@k").unwrap().is_some());
        assert!(tmp.path().join("blogs/alice/k.md").exists());
        assert_eq!(p.get_blog("alice", "k").unwrap().content, "content of k");
    }

    #[test]
    fn accounts_do_not_see_each_other() {
        let (_tmp, kv, p) = setup();
        p.put_blog("a", &blog("a", "k", "2024-01-01 00:00:00"));
        p.put_blog("b", &blog("b", "k", "2024-01-01 00:00:00"));
        assert_eq!(p.list_blogs("a").len(), 1);
        assert_eq!(p.list_blogs("b").len(), 1);
        assert!(kv.hget_all("a:blog@k").unwrap().is_some());
        assert!(kv.hget_all("b:blog@k").unwrap().is_some());
    }

    #[test]
    fn admin_merges_and_cleans_legacy_keys() {
        let (_tmp, kv, p) = setup();
        kv.hset_all(
            "blog@old",
            &codec::blog_to_fields(&blog("admin", "old", "2023-01-01 00:00:00")),
        )
        .unwrap();
        p.put_blog("admin", &blog("admin", "new", "2024-01-01 00:00:00"));

        let titles: Vec<_> = p.list_blogs("admin").into_iter().map(|b| b.title).collect();
        assert_eq!(titles, vec!["old", "new"]);
        assert!(p.get_blog("admin", "old").is_some());

        // rewriting the legacy blog moves it to the prefixed key
        p.put_blog("admin", &blog("admin", "old", "2023-01-01 00:00:00"));
        assert!(kv.hget_all("blog@old").unwrap().is_none());
        assert!(kv.hget_all("admin:blog@old").unwrap().is_some());

        // other accounts never read the legacy space
        assert!(p.list_blogs("bob").is_empty());
    }

    #[test]
    fn delete_blog_removes_key_and_recycles_file() {
        let (tmp, kv, p) = setup();
        p.put_blog("alice", &blog("alice", "gone", "2024-01-01 00:00:00"));
        assert!(p.delete_blog("alice", "gone"));
        assert!(kv.hget_all("alice:blog@gone").unwrap().is_none());
        assert!(!tmp.path().join("blogs/alice/gone.md").exists());
        assert!(tmp
            .path()
            .join("recycle")
            .join(format!("gone-{}.md", crate::clock::today_string()))
            .exists());
    }

    #[test]
    fn admin_delete_also_drops_legacy_key() {
        let (_tmp, kv, p) = setup();
        kv.hset_all(
            "blog@old",
            &codec::blog_to_fields(&blog("admin", "old", "2023-01-01 00:00:00")),
        )
        .unwrap();
        assert!(p.delete_blog("admin", "old"));
        assert!(kv.hget_all("blog@old").unwrap().is_none());
        assert!(p.get_blog("admin", "old").is_none());
    }

    #[test]
    fn comment_keys_carry_the_account_prefix() {
        assert_eq!(comments_key("alice", "post"), "alice:comments@post");
        assert_eq!(comment_user_key("alice", "u1"), "alice:comment_user@u1");
        assert_eq!(comment_session_key("alice", "s1"), "alice:comment_session@s1");
        assert_eq!(reservation_key("alice", "bob"), "alice:username_reservation@bob");
    }

    #[test]
    fn comments_round_trip_per_account() {
        let (_tmp, kv, p) = setup();
        let mut bc = BlogComments::new("post");
        bc.comments.push(Comment {
            idx: 0,
            owner: "x".into(),
            msg: "first".into(),
            ..Default::default()
        });
        assert!(p.save_comments("alice", &bc));

        let all = p.list_comments("alice");
        assert_eq!(all["post"].comments[0].msg, "first");
        assert!(p.list_comments("bob").is_empty());
        assert!(kv.hget_all("alice:comments@post").unwrap().is_some());
        assert!(kv.hget_all("comments@post").unwrap().is_none());

        // shrinking the list drops stale fields
        bc.comments.clear();
        p.save_comments("alice", &bc);
        assert!(p.list_comments("alice").is_empty());
    }
}
