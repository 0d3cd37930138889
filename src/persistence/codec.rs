//! Field-level encoding of entities into KV hashes.

use crate::blog::model::{AuthFlags, Blog};
use crate::clock;
use crate::comments::model::{
    BlogComments, Comment, CommentSession, CommentUser, UserStatus, UsernameReservation,
};
use crate::kv::Fields;

/// Separator between `key=value` pairs inside a stored comment.
pub const COMMENT_SEP: char = '\x01';

fn field(map: &Fields, name: &str) -> Option<String> {
    map.get(name).cloned()
}

fn number<T: std::str::FromStr + Default>(map: &Fields, name: &str) -> T {
    map.get(name)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or_default()
}

fn flag(value: bool) -> String {
    let s = if value { "1" } else { "0" };
    s.to_string()
}

fn truthy(map: &Fields, name: &str) -> bool {
    matches!(map.get(name).map(String::as_str), Some("1") | Some("true"))
}

pub fn blog_to_fields(blog: &Blog) -> Fields {
    let mut f = Fields::new();
    f.insert("title".into(), blog.title.clone());
    f.insert("content".into(), blog.content.clone());
    f.insert("ct".into(), blog.create_time.clone());
    f.insert("mt".into(), blog.modify_time.clone());
    f.insert("at".into(), blog.access_time.clone());
    f.insert("modifynum".into(), blog.modify_count.to_string());
    f.insert("accessnum".into(), blog.access_count.to_string());
    f.insert("authtype".into(), blog.auth.bits().to_string());
    f.insert("tags".into(), blog.tags.clone());
    f.insert("encrypt".into(), blog.encrypt.to_string());
    f.insert("account".into(), blog.account.clone());
    f
}

/// Decode a stored blog. Missing timestamps read as now, missing numbers as 0.
pub fn blog_from_fields(map: &Fields, account: &str) -> Option<Blog> {
    let title = field(map, "title").filter(|t| !t.is_empty())?;
    let now = clock::now_string();
    let encrypt: u8 = number(map, "encrypt");
    let mut auth = AuthFlags::from_bits(number(map, "authtype"));
    if encrypt == 1 {
        auth = AuthFlags::ENCRYPTED;
    }

    Some(Blog {
        title,
        content: field(map, "content").unwrap_or_default(),
        create_time: field(map, "ct").filter(|s| !s.is_empty()).unwrap_or_else(|| now.clone()),
        modify_time: field(map, "mt").filter(|s| !s.is_empty()).unwrap_or_else(|| now.clone()),
        access_time: field(map, "at").filter(|s| !s.is_empty()).unwrap_or(now),
        modify_count: number(map, "modifynum"),
        access_count: number(map, "accessnum"),
        auth,
        tags: field(map, "tags").unwrap_or_default(),
        encrypt,
        account: field(map, "account")
            .filter(|a| !a.is_empty())
            .unwrap_or_else(|| account.to_string()),
    })
}

pub fn encode_comment(c: &Comment) -> String {
    let sep = COMMENT_SEP.to_string();
    [
        format!("Idx={}", c.idx),
        format!("owner={}", c.owner),
        format!("ct={}", c.create_time),
        format!("mt={}", c.modify_time),
        format!("msg={}", c.msg),
        format!("mail={}", c.mail),
        format!("Pwd={}", c.pwd),
        format!("user_id={}", c.user_id),
        format!("session_id={}", c.session_id),
        format!("ip={}", c.ip),
        format!("user_agent={}", c.user_agent),
        format!("is_anonymous={}", flag(c.is_anonymous)),
        format!("is_verified={}", flag(c.is_verified)),
    ]
    .join(&sep)
}

/// Split on 0x01, then on the first `=`; keys compare case-insensitively.
pub fn decode_comment(value: &str) -> Option<Comment> {
    let mut c = Comment::default();
    let mut idx = None;
    for token in value.split(COMMENT_SEP) {
        let Some((k, v)) = token.split_once('=') else {
            continue;
        };
        match k.to_ascii_lowercase().as_str() {
            "idx" => idx = v.trim().parse().ok(),
            "owner" => c.owner = v.to_string(),
            "ct" => c.create_time = v.to_string(),
            "mt" => c.modify_time = v.to_string(),
            "msg" => c.msg = v.to_string(),
            "mail" => c.mail = v.to_string(),
            "pwd" => c.pwd = v.to_string(),
            "user_id" => c.user_id = v.to_string(),
            "session_id" => c.session_id = v.to_string(),
            "ip" => c.ip = v.to_string(),
            "user_agent" => c.user_agent = v.to_string(),
            "is_anonymous" => c.is_anonymous = v == "1",
            "is_verified" => c.is_verified = v == "1",
            _ => {}
        }
    }
    c.idx = idx?;
    Some(c)
}

pub fn comments_to_fields(bc: &BlogComments) -> Fields {
    bc.comments
        .iter()
        .map(|c| (c.idx.to_string(), encode_comment(c)))
        .collect()
}

pub fn comments_from_fields(title: &str, map: &Fields) -> BlogComments {
    let mut bc = BlogComments::new(title);
    for (field, value) in map {
        match decode_comment(value) {
            Some(c) => bc.comments.push(c),
            None => tracing::warn!("skip malformed comment {}#{}", title, field),
        }
    }
    bc.sort();
    bc
}

pub fn user_to_fields(u: &CommentUser) -> Fields {
    let mut f = Fields::new();
    f.insert("user_id".into(), u.user_id.clone());
    f.insert("username".into(), u.username.clone());
    f.insert("email".into(), u.email.clone());
    f.insert("password_hash".into(), u.password_hash.clone());
    f.insert("register_time".into(), u.register_time.clone());
    f.insert("last_active".into(), u.last_active.clone());
    f.insert("comment_count".into(), u.comment_count.to_string());
    f.insert("reputation".into(), u.reputation.to_string());
    f.insert("status".into(), u8::from(u.status).to_string());
    f.insert("is_verified".into(), flag(u.is_verified));
    f
}

pub fn user_from_fields(map: &Fields) -> Option<CommentUser> {
    Some(CommentUser {
        user_id: field(map, "user_id").filter(|s| !s.is_empty())?,
        username: field(map, "username").unwrap_or_default(),
        email: field(map, "email").unwrap_or_default(),
        password_hash: field(map, "password_hash").unwrap_or_default(),
        register_time: field(map, "register_time").unwrap_or_default(),
        last_active: field(map, "last_active").unwrap_or_default(),
        comment_count: number(map, "comment_count"),
        reputation: number(map, "reputation"),
        status: UserStatus::from_code(number(map, "status")).unwrap_or(UserStatus::Normal),
        is_verified: truthy(map, "is_verified"),
    })
}

pub fn session_to_fields(s: &CommentSession) -> Fields {
    let mut f = Fields::new();
    f.insert("session_id".into(), s.session_id.clone());
    f.insert("user_id".into(), s.user_id.clone());
    f.insert("ip".into(), s.ip.clone());
    f.insert("user_agent".into(), s.user_agent.clone());
    f.insert("create_time".into(), s.create_time.clone());
    f.insert("expire_time".into(), s.expire_time.clone());
    f.insert("is_active".into(), flag(s.is_active));
    f
}

pub fn session_from_fields(map: &Fields) -> Option<CommentSession> {
    Some(CommentSession {
        session_id: field(map, "session_id").filter(|s| !s.is_empty())?,
        user_id: field(map, "user_id").unwrap_or_default(),
        ip: field(map, "ip").unwrap_or_default(),
        user_agent: field(map, "user_agent").unwrap_or_default(),
        create_time: field(map, "create_time").unwrap_or_default(),
        expire_time: field(map, "expire_time").unwrap_or_default(),
        is_active: truthy(map, "is_active"),
    })
}

pub fn reservation_to_fields(r: &UsernameReservation) -> Fields {
    let mut f = Fields::new();
    f.insert("username".into(), r.username.clone());
    f.insert("user_id".into(), r.user_id.clone());
    f.insert("reserve_time".into(), r.reserve_time.clone());
    f.insert("is_temporary".into(), flag(r.is_temporary));
    f
}

pub fn reservation_from_fields(map: &Fields) -> Option<UsernameReservation> {
    Some(UsernameReservation {
        username: field(map, "username").filter(|s| !s.is_empty())?,
        user_id: field(map, "user_id").unwrap_or_default(),
        reserve_time: field(map, "reserve_time").unwrap_or_default(),
        is_temporary: truthy(map, "is_temporary"),
    })
}
