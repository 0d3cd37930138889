//! Per-account blog collection.
//!
//! `BlogBook` is the state owned by one account's actor. Every method is
//! synchronous and runs on the actor thread; results are integer codes the
//! HTTP layer maps to responses.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use super::model::{is_valid_title, join_tags, split_tags, AuthFlags, Blog, BlogUpdate, UploadedBlog};
use crate::clock;
use crate::persistence::{FileMirror, Persistence};
use crate::sysconf::{AccountConf, SysConfStore, SYS_CONF_TITLE};

pub const OK: i32 = 0;
pub const NOT_FOUND: i32 = 1;
pub const EXISTS: i32 = 1;
pub const SYS_FILE: i32 = 2;
pub const KV_FAILURE: i32 = 3;

/// How far back `recently_timed` looks.
const TIMED_LOOKBACK_DAYS: i64 = 9999;

static LINK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(.*?)\]\(/get\?blogname=(.*?)\)").expect("valid regex")
});

pub struct BlogBook {
    account: String,
    blogs: Arc<HashMap<String, Blog>>,
    /// Titles in insertion order; ties in `get_all` keep this order.
    order: Vec<String>,
    persistence: Persistence,
    sysconf: Arc<SysConfStore>,
}

impl BlogBook {
    pub fn new(account: impl Into<String>, persistence: Persistence, sysconf: Arc<SysConfStore>) -> Self {
        Self {
            account: account.into(),
            blogs: Arc::new(HashMap::new()),
            order: Vec::new(),
            persistence,
            sysconf,
        }
    }

    /// Build the book from everything persisted for `account`.
    pub fn load(account: impl Into<String>, persistence: Persistence, sysconf: Arc<SysConfStore>) -> Self {
        let mut book = Self::new(account, persistence, sysconf);
        let blogs = book.persistence.list_blogs(&book.account);
        let map = Arc::make_mut(&mut book.blogs);
        for blog in blogs {
            book.order.push(blog.title.clone());
            map.insert(blog.title.clone(), blog);
        }
        book.reload_sys_conf();
        tracing::info!("blog book loaded account={} blogs={}", book.account, book.len());
        book
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn len(&self) -> usize {
        self.blogs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blogs.is_empty()
    }

    /// Snapshot of this account's parsed `sys_conf`.
    pub fn conf(&self) -> AccountConf {
        self.sysconf.account(&self.account)
    }

    fn reload_sys_conf(&self) {
        let text = self.blogs.get(SYS_CONF_TITLE).map(|b| b.content.as_str());
        self.sysconf.reload(&self.account, text);
    }

    fn after_write(&self, title: &str) {
        if title == SYS_CONF_TITLE {
            self.reload_sys_conf();
        }
    }

    fn store(&mut self, blog: Blog) {
        if !self.persistence.put_blog(&self.account, &blog) {
            tracing::warn!("write-through failed account={} title={}", self.account, blog.title);
        }
        let title = blog.title.clone();
        if !self.blogs.contains_key(&title) {
            self.order.push(title.clone());
        }
        Arc::make_mut(&mut self.blogs).insert(title.clone(), blog);
        self.after_write(&title);
    }

    fn blog_mut(&mut self, title: &str) -> Option<&mut Blog> {
        Arc::make_mut(&mut self.blogs).get_mut(title)
    }

    fn finalize_auth(&self, title: &str, mut auth: AuthFlags, encrypt: bool) -> (AuthFlags, u8) {
        if self.sysconf.with(&self.account, |c| c.is_diary_title(title)) {
            auth.insert(AuthFlags::DIARY);
        }
        // Encryption replaces every other flag, diary included.
        if encrypt {
            auth = AuthFlags::ENCRYPTED;
        }
        (auth.with_visibility(), u8::from(encrypt))
    }

    /// Create a blog. Returns [`EXISTS`] when the (possibly date-suffixed)
    /// title is taken.
    pub fn add(&mut self, udb: UploadedBlog) -> i32 {
        let mut title = udb.title;
        if self.sysconf.with(&self.account, |c| c.needs_date_suffix(&title)) {
            title = format!("{}_{}", title, clock::today_string());
        }
        if self.blogs.contains_key(&title) {
            tracing::debug!("add: exists account={} title={}", self.account, title);
            return EXISTS;
        }

        let (auth, encrypt) = self.finalize_auth(&title, udb.auth, udb.encrypt);
        let now = clock::now_string();
        let blog = Blog {
            title,
            content: udb.content,
            create_time: now.clone(),
            modify_time: now.clone(),
            access_time: now,
            modify_count: 0,
            access_count: 0,
            auth,
            tags: join_tags(split_tags(&udb.tags)),
            encrypt,
            account: self.account.clone(),
        };
        tracing::info!("add blog account={} title={}", self.account, blog.title);
        self.store(blog);
        OK
    }

    /// Replace content, tags and auth of an existing blog.
    pub fn modify(&mut self, udb: UploadedBlog) -> i32 {
        self.update(
            &udb.title,
            BlogUpdate {
                content: Some(udb.content),
                tags: Some(udb.tags),
                auth: Some(udb.auth),
                encrypt: Some(udb.encrypt),
            },
        )
    }

    /// Apply only the present fields of `update`.
    pub fn update(&mut self, title: &str, update: BlogUpdate) -> i32 {
        let Some(current) = self.blogs.get(title) else {
            return NOT_FOUND;
        };
        let mut blog = current.clone();

        if let Some(content) = update.content {
            blog.content = content;
        }
        if let Some(tags) = update.tags {
            blog.tags = join_tags(split_tags(&tags));
        }
        if update.auth.is_some() || update.encrypt.is_some() {
            let encrypt = update.encrypt.unwrap_or(blog.encrypt == 1);
            let auth = match update.auth {
                Some(auth) => auth,
                None => {
                    let mut auth = blog.auth;
                    auth.remove(AuthFlags::ENCRYPTED);
                    auth
                }
            };
            let (auth, encrypt) = self.finalize_auth(title, auth, encrypt);
            blog.auth = auth;
            blog.encrypt = encrypt;
        }
        blog.modify_count += 1;
        blog.modify_time = clock::now_string();

        tracing::info!("modify blog account={} title={}", self.account, title);
        self.store(blog);
        OK
    }

    /// Add when absent, modify otherwise.
    pub fn save(&mut self, udb: UploadedBlog) -> i32 {
        if self.blogs.contains_key(&udb.title) {
            self.modify(udb)
        } else {
            self.add(udb)
        }
    }

    /// Returns [`NOT_FOUND`], [`SYS_FILE`] or [`KV_FAILURE`] on refusal.
    pub fn delete(&mut self, title: &str) -> i32 {
        if !self.blogs.contains_key(title) {
            return NOT_FOUND;
        }
        if self.sysconf.with(&self.account, |c| c.is_sys_file(title)) {
            return SYS_FILE;
        }
        if !self.persistence.delete_blog(&self.account, title) {
            return KV_FAILURE;
        }
        Arc::make_mut(&mut self.blogs).remove(title);
        self.order.retain(|t| t != title);
        tracing::info!("delete blog account={} title={}", self.account, title);
        OK
    }

    pub fn get(&self, title: &str) -> Option<Blog> {
        self.blogs.get(title).cloned()
    }

    /// Blogs whose auth intersects `mask`, most recently modified first.
    /// A positive `num` keeps the first `num - 1`.
    pub fn get_all(&self, num: usize, mask: AuthFlags) -> Vec<Blog> {
        let mut out: Vec<Blog> = self
            .order
            .iter()
            .filter_map(|t| self.blogs.get(t))
            .filter(|b| b.auth.intersects(mask))
            .cloned()
            .collect();
        out.sort_by(|a, b| b.modify_time.cmp(&a.modify_time));
        if num > 0 {
            out.truncate(num - 1);
        }
        out
    }

    pub fn update_access(&mut self, title: &str) {
        let now = clock::now_string();
        let Some(blog) = self.blog_mut(title) else {
            return;
        };
        blog.access_time = now;
        blog.access_count += 1;
        let blog = blog.clone();
        if !self.persistence.put_blog(&self.account, &blog) {
            tracing::warn!("access write failed account={} title={}", self.account, title);
        }
    }

    fn change_auth(&mut self, title: &str, f: impl FnOnce(&mut Blog)) -> i32 {
        let Some(blog) = self.blog_mut(title) else {
            return NOT_FOUND;
        };
        f(blog);
        blog.auth = blog.auth.with_visibility();
        blog.encrypt = u8::from(blog.auth.intersects(AuthFlags::ENCRYPTED));
        let blog = blog.clone();
        self.persistence.put_blog(&self.account, &blog);
        OK
    }

    pub fn auth_add(&mut self, title: &str, flag: AuthFlags) -> i32 {
        self.change_auth(title, |b| b.auth.insert(flag))
    }

    pub fn auth_del(&mut self, title: &str, flag: AuthFlags) -> i32 {
        self.change_auth(title, |b| b.auth.remove(flag))
    }

    /// Latest `{base}_YYYY-MM-DD` blog on or before `today`.
    pub fn recently_timed(&self, base: &str, today: NaiveDate) -> Option<Blog> {
        (0..=TIMED_LOOKBACK_DAYS)
            .filter_map(|back| today.checked_sub_signed(Duration::days(back)))
            .find_map(|day| {
                let title = format!("{}_{}", base, clock::format_date(day));
                self.blogs.get(&title).cloned()
            })
    }

    /// Titles referenced as `[..](/get?blogname=NAME)` in the blog content.
    pub fn linked_names(&self, title: &str) -> Vec<String> {
        self.blogs
            .get(title)
            .map(|b| extract_links(&b.content))
            .unwrap_or_default()
    }

    /// Rename tag `from` to `to` everywhere; an empty `to` drops the tag.
    pub fn tag_replace(&mut self, from: &str, to: &str) -> Vec<String> {
        let from = from.to_lowercase();
        let mut changed = Vec::new();
        for title in self.order.clone() {
            let Some(blog) = self.blogs.get(&title) else {
                continue;
            };
            if !blog.has_tag(&from) {
                continue;
            }
            let tags = join_tags(split_tags(&blog.tags).into_iter().filter_map(|t| {
                if t.to_lowercase() == from {
                    (!to.is_empty()).then_some(to)
                } else {
                    Some(t)
                }
            }));
            if tags != blog.tags {
                let mut blog = blog.clone();
                blog.tags = tags;
                self.store(blog);
                changed.push(title);
            }
        }
        tracing::info!("tag_replace account={} changed={}", self.account, changed.len());
        changed
    }

    /// Add `tag` to every blog whose title contains `substr`.
    pub fn tag_add(&mut self, substr: &str, tag: &str) -> Vec<String> {
        if tag.is_empty() {
            return Vec::new();
        }
        let mut changed = Vec::new();
        for title in self.order.clone() {
            if !title.contains(substr) {
                continue;
            }
            let Some(blog) = self.blogs.get(&title) else {
                continue;
            };
            if blog.has_tag(tag) {
                continue;
            }
            let mut blog = blog.clone();
            blog.tags = join_tags(split_tags(&blog.tags).into_iter().chain([tag]));
            self.store(blog);
            changed.push(title);
        }
        changed
    }

    /// Copy the auth of `title` onto every blog it links to.
    pub fn set_same_auth(&mut self, title: &str) -> Vec<String> {
        let Some(source) = self.blogs.get(title) else {
            return Vec::new();
        };
        let (auth, encrypt) = (source.auth, source.encrypt);
        let mut changed = Vec::new();
        for name in self.linked_names(title) {
            let Some(blog) = self.blog_mut(&name) else {
                continue;
            };
            if blog.auth == auth && blog.encrypt == encrypt {
                continue;
            }
            blog.auth = auth;
            blog.encrypt = encrypt;
            let blog = blog.clone();
            self.persistence.put_blog(&self.account, &blog);
            changed.push(name);
        }
        changed
    }

    /// Load every `*.md` under `dir`: existing titles get the new content,
    /// new ones are created private. Returns the number of files imported.
    pub fn import_from_path(&mut self, dir: &Path) -> usize {
        let files = match FileMirror::read_markdown_dir(dir) {
            Ok(files) => files,
            Err(e) => {
                tracing::error!("import failed dir={} err={}", dir.display(), e);
                return 0;
            }
        };

        let now = clock::now_string();
        let mut touched = Vec::with_capacity(files.len());
        for (title, content) in files {
            if !is_valid_title(&title) {
                tracing::warn!("import skipped invalid title {}", title);
                continue;
            }
            let map = Arc::make_mut(&mut self.blogs);
            match map.get_mut(&title) {
                Some(blog) => {
                    blog.content = content;
                    blog.modify_time = now.clone();
                    blog.modify_count += 1;
                }
                None => {
                    map.insert(
                        title.clone(),
                        Blog {
                            title: title.clone(),
                            content,
                            create_time: now.clone(),
                            modify_time: now.clone(),
                            access_time: now.clone(),
                            modify_count: 0,
                            access_count: 0,
                            auth: AuthFlags::PRIVATE,
                            tags: String::new(),
                            encrypt: 0,
                            account: self.account.clone(),
                        },
                    );
                    self.order.push(title.clone());
                }
            }
            touched.push(title);
        }

        for title in &touched {
            if let Some(blog) = self.blogs.get(title) {
                self.persistence.put_blog(&self.account, blog);
            }
        }
        if touched.iter().any(|t| t == SYS_CONF_TITLE) {
            self.reload_sys_conf();
        }
        tracing::info!("imported {} blogs into {} from {}", touched.len(), self.account, dir.display());
        touched.len()
    }

    /// Rewrite every mirror file from the in-memory state.
    pub fn export_mirror(&self) -> usize {
        self.blogs
            .values()
            .filter(|b| match self.persistence.mirror().save(&self.account, &b.title, &b.content) {
                Ok(written) => written,
                Err(e) => {
                    tracing::error!("mirror export failed {}/{}: {}", self.account, b.title, e);
                    false
                }
            })
            .count()
    }

    /// Read-only view shared with statistics and search.
    pub fn snapshot(&self) -> Arc<HashMap<String, Blog>> {
        self.blogs.clone()
    }
}

/// Link targets in `content`, in first-seen order, invalid titles dropped.
pub fn extract_links(content: &str) -> Vec<String> {
    let mut names: Vec<String> = Vec::new();
    for line in content.lines() {
        for cap in LINK_RE.captures_iter(line) {
            let name = cap[2].trim();
            if is_valid_title(name) && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
    }
    names
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kv::memory::MemoryKv;

    fn book(tmp: &tempfile::TempDir, account: &str) -> BlogBook {
        let mirror = FileMirror::new(tmp.path().join("blogs"), tmp.path().join("recycle"));
        let persistence = Persistence::new(Arc::new(MemoryKv::new()), mirror, "admin");
        BlogBook::load(account, persistence, Arc::new(SysConfStore::new("admin")))
    }

    #[test]
    fn add_rejects_duplicates_and_writes_through() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        assert_eq!(b.add(UploadedBlog::new("hello", "world")), OK);
        assert_eq!(b.add(UploadedBlog::new("hello", "again")), EXISTS);

        let blog = b.get("hello").unwrap();
        assert_eq!(blog.content, "world");
        assert_eq!(blog.auth, AuthFlags::PRIVATE);
        assert_eq!(blog.create_time, blog.modify_time);
        assert!(tmp.path().join("blogs/alice/hello.md").exists());
    }

    #[test]
    fn date_suffix_and_diary_bit_are_applied() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        assert_eq!(b.add(UploadedBlog::new("日记", "today")), OK);

        let title = format!("日记_{}", clock::today_string());
        let blog = b.get(&title).unwrap();
        assert!(blog.auth.contains(AuthFlags::DIARY));
        assert!(blog.auth.contains(AuthFlags::PRIVATE));
    }

    #[test]
    fn encrypt_forces_encrypted_auth() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        b.add(
            UploadedBlog::new("secret", "xx")
                .with_auth(AuthFlags::PUBLIC)
                .encrypted(true),
        );
        let blog = b.get("secret").unwrap();
        assert_eq!(blog.encrypt, 1);
        assert!(blog.auth.contains(AuthFlags::ENCRYPTED));
        assert!(!blog.is_public());
    }

    #[test]
    fn encrypted_diary_loses_diary_bit() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        assert_eq!(b.add(UploadedBlog::new("日记", "today").encrypted(true)), OK);

        let title = format!("日记_{}", clock::today_string());
        let blog = b.get(&title).unwrap();
        assert_eq!(blog.encrypt, 1);
        assert!(blog.auth.contains(AuthFlags::ENCRYPTED));
        assert!(!blog.auth.contains(AuthFlags::DIARY));
    }

    #[test]
    fn modify_bumps_count_and_keeps_create_time() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        assert_eq!(b.modify(UploadedBlog::new("nope", "")), NOT_FOUND);
        b.add(UploadedBlog::new("note", "v1"));
        let before = b.get("note").unwrap();

        assert_eq!(b.modify(UploadedBlog::new("note", "v2").with_tags("a|A|b")), OK);
        let after = b.get("note").unwrap();
        assert_eq!(after.content, "v2");
        assert_eq!(after.tags, "a|b");
        assert_eq!(after.modify_count, 1);
        assert_eq!(after.create_time, before.create_time);
        assert!(after.modify_time >= before.modify_time);
    }

    #[test]
    fn partial_update_keeps_other_fields() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        b.add(UploadedBlog::new("note", "body").with_tags("x").with_auth(AuthFlags::PUBLIC));
        let code = b.update(
            "note",
            BlogUpdate {
                tags: Some("y".into()),
                ..Default::default()
            },
        );
        assert_eq!(code, OK);
        let blog = b.get("note").unwrap();
        assert_eq!(blog.content, "body");
        assert_eq!(blog.tags, "y");
        assert!(blog.is_public());
    }

    #[test]
    fn delete_codes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        assert_eq!(b.delete("missing"), NOT_FOUND);
        b.add(UploadedBlog::new("sys_conf", "share_days=3"));
        assert_eq!(b.delete("sys_conf"), SYS_FILE);
        b.add(UploadedBlog::new("gone", "bye"));
        assert_eq!(b.delete("gone"), OK);
        assert!(b.get("gone").is_none());
        let recycled = tmp
            .path()
            .join(format!("recycle/gone-{}.md", clock::today_string()));
        assert!(recycled.exists());
    }

    #[test]
    fn sys_conf_edits_reload_config() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        b.add(UploadedBlog::new("sys_conf", "share_days=3"));
        assert_eq!(b.sysconf.account("alice").share_days(), 3);
        b.modify(UploadedBlog::new("sys_conf", "share_days=5"));
        assert_eq!(b.sysconf.account("alice").share_days(), 5);
    }

    #[test]
    fn get_all_filters_sorts_and_truncates() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        b.add(UploadedBlog::new("a", "").with_auth(AuthFlags::PUBLIC));
        b.add(UploadedBlog::new("b", ""));
        b.add(UploadedBlog::new("c", "").with_auth(AuthFlags::PUBLIC));

        let titles = |b: &BlogBook| -> Vec<String> {
            b.get_all(0, AuthFlags::PUBLIC)
                .into_iter()
                .map(|x| x.title)
                .collect()
        };
        for t in ["a", "c"] {
            Arc::make_mut(&mut b.blogs).get_mut(t).unwrap().modify_time =
                "2000-01-01 00:00:00".into();
        }
        // equal modify times: insertion order wins
        assert_eq!(titles(&b), ["a", "c"]);

        Arc::make_mut(&mut b.blogs).get_mut("c").unwrap().modify_time =
            "2001-01-01 00:00:00".into();
        assert_eq!(titles(&b), ["c", "a"]);
        assert_eq!(b.get_all(3, AuthFlags::ALL).len(), 2);
    }

    #[test]
    fn auth_add_and_del_keep_visibility() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        b.add(UploadedBlog::new("n", ""));
        assert_eq!(b.auth_add("n", AuthFlags::PUBLIC), OK);
        assert_eq!(b.auth_del("n", AuthFlags::PRIVATE), OK);
        assert_eq!(b.get("n").unwrap().auth, AuthFlags::PUBLIC);
        b.auth_del("n", AuthFlags::PUBLIC);
        assert_eq!(b.get("n").unwrap().auth, AuthFlags::PRIVATE);
        assert_eq!(b.auth_add("missing", AuthFlags::PUBLIC), NOT_FOUND);
    }

    #[test]
    fn recently_timed_finds_latest_dated_blog() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        b.add(UploadedBlog::new("weekly_2024-04-20", "old"));
        b.add(UploadedBlog::new("weekly_2024-04-27", "new"));
        let today = NaiveDate::from_ymd_opt(2024, 5, 1).unwrap();
        assert_eq!(b.recently_timed("weekly", today).unwrap().content, "new");
        assert!(b.recently_timed("monthly", today).is_none());
    }

    #[test]
    fn links_are_validated_per_line() {
        let content = "see [a](/get?blogname=first) and [b](/get?blogname=second)\n\
                       [bad](/get?blogname=has space)\n[dup](/get?blogname=first)";
        assert_eq!(extract_links(content), ["first", "second"]);
    }

    #[test]
    fn tag_replace_and_tag_add() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        b.add(UploadedBlog::new("rust-1", "").with_tags("Lang|misc"));
        b.add(UploadedBlog::new("rust-2", "").with_tags("lang|code"));
        b.add(UploadedBlog::new("go-1", ""));

        assert_eq!(b.tag_replace("lang", "code"), ["rust-1", "rust-2"]);
        assert_eq!(b.get("rust-1").unwrap().tags, "code|misc");
        assert_eq!(b.get("rust-2").unwrap().tags, "code");

        assert!(b.tag_add("rust", "CODE").is_empty());
        assert_eq!(b.tag_add("1", "one"), ["rust-1", "go-1"]);
        assert_eq!(b.tag_replace("one", ""), ["rust-1", "go-1"]);
        assert_eq!(b.get("go-1").unwrap().tags, "");
    }

    #[test]
    fn set_same_auth_copies_to_linked_blogs() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        b.add(UploadedBlog::new("child", ""));
        b.add(UploadedBlog::new("other", "").with_auth(AuthFlags::PUBLIC));
        b.add(
            UploadedBlog::new(
                "index",
                "[c](/get?blogname=child)\n[o](/get?blogname=other)\n[m](/get?blogname=missing)",
            )
            .with_auth(AuthFlags::PUBLIC),
        );
        assert_eq!(b.set_same_auth("index"), ["child"]);
        assert!(b.get("child").unwrap().is_public());
    }

    #[test]
    fn import_overwrites_and_creates() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        b.add(UploadedBlog::new("kept", "old").with_auth(AuthFlags::PUBLIC));

        let src = tmp.path().join("import");
        std::fs::create_dir_all(&src).unwrap();
        std::fs::write(src.join("kept.md"), "new").unwrap();
        std::fs::write(src.join("fresh.md"), "hello").unwrap();
        std::fs::write(src.join("skip.txt"), "x").unwrap();

        assert_eq!(b.import_from_path(&src), 2);
        let kept = b.get("kept").unwrap();
        assert_eq!(kept.content, "new");
        assert!(kept.is_public());
        assert_eq!(b.get("fresh").unwrap().auth, AuthFlags::PRIVATE);
    }

    #[test]
    fn snapshot_is_detached_from_later_writes() {
        let tmp = tempfile::tempdir().unwrap();
        let mut b = book(&tmp, "alice");
        b.add(UploadedBlog::new("one", ""));
        let snap = b.snapshot();
        b.add(UploadedBlog::new("two", ""));
        assert_eq!(snap.len(), 1);
        assert_eq!(b.snapshot().len(), 2);
    }

    #[test]
    fn load_restores_persisted_blogs() {
        let tmp = tempfile::tempdir().unwrap();
        let mirror = FileMirror::new(tmp.path().join("blogs"), tmp.path().join("recycle"));
        let persistence = Persistence::new(Arc::new(MemoryKv::new()), mirror, "admin");
        let conf = Arc::new(SysConfStore::new("admin"));

        let mut first = BlogBook::load("bob", persistence.clone(), conf.clone());
        first.add(UploadedBlog::new("sys_conf", "share_days=9"));
        first.add(UploadedBlog::new("note", "x"));

        let fresh_conf = Arc::new(SysConfStore::new("admin"));
        let second = BlogBook::load("bob", persistence, fresh_conf.clone());
        assert_eq!(second.len(), 2);
        assert_eq!(fresh_conf.account("bob").share_days(), 9);
    }
}
