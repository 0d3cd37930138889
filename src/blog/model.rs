use std::fmt;
use std::ops::{BitAnd, BitOr};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

static TITLE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[\p{Han}a-zA-Z0-9\._-]+$").expect("valid regex"));

/// Blog titles: Han characters, ASCII letters, digits and `._-`.
pub fn is_valid_title(title: &str) -> bool {
    TITLE_RE.is_match(title)
}

/// Visibility bitmask stored with every blog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuthFlags(u32);

impl AuthFlags {
    pub const NONE: AuthFlags = AuthFlags(0);
    pub const PRIVATE: AuthFlags = AuthFlags(1);
    pub const PUBLIC: AuthFlags = AuthFlags(2);
    pub const DIARY: AuthFlags = AuthFlags(4);
    pub const ENCRYPTED: AuthFlags = AuthFlags(8);
    pub const ALL: AuthFlags = AuthFlags(0xffff);

    const NAMES: [(&'static str, AuthFlags); 4] = [
        ("private", AuthFlags::PRIVATE),
        ("public", AuthFlags::PUBLIC),
        ("diary", AuthFlags::DIARY),
        ("encrypt", AuthFlags::ENCRYPTED),
    ];

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn from_bits(bits: u32) -> Self {
        AuthFlags(bits)
    }

    pub fn contains(self, other: AuthFlags) -> bool {
        self.0 & other.0 == other.0 && other.0 != 0
    }

    pub fn intersects(self, other: AuthFlags) -> bool {
        self.0 & other.0 != 0
    }

    pub fn insert(&mut self, other: AuthFlags) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: AuthFlags) {
        self.0 &= !other.0;
    }

    /// Guarantee one of private/public is present, defaulting to private.
    pub fn with_visibility(mut self) -> Self {
        if !self.intersects(AuthFlags::PRIVATE | AuthFlags::PUBLIC) {
            self.insert(AuthFlags::PRIVATE);
        }
        self
    }

    /// Parse the wire form: a comma list of `private|public|diary|encrypt`.
    /// Unknown names are ignored; an empty list means private.
    pub fn parse_list(s: &str) -> Self {
        let mut flags = AuthFlags::NONE;
        for name in s.split(',').map(|p| p.trim().to_ascii_lowercase()) {
            let name = if name == "encrypted" { "encrypt".to_string() } else { name };
            if let Some((_, flag)) = Self::NAMES.iter().find(|(n, _)| *n == name) {
                flags.insert(*flag);
            }
        }
        flags.with_visibility()
    }

    /// Parse a single flag name for the add/remove auth endpoints.
    pub fn parse_one(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::NAMES
            .iter()
            .find(|(n, _)| *n == name || (name == "encrypted" && *n == "encrypt"))
            .map(|(_, f)| *f)
    }

    pub fn names(self) -> Vec<&'static str> {
        Self::NAMES
            .iter()
            .filter(|(_, f)| self.contains(*f))
            .map(|(n, _)| *n)
            .collect()
    }
}

impl BitOr for AuthFlags {
    type Output = AuthFlags;
    fn bitor(self, rhs: AuthFlags) -> AuthFlags {
        AuthFlags(self.0 | rhs.0)
    }
}

impl BitAnd for AuthFlags {
    type Output = AuthFlags;
    fn bitand(self, rhs: AuthFlags) -> AuthFlags {
        AuthFlags(self.0 & rhs.0)
    }
}

impl fmt::Display for AuthFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.names().join(","))
    }
}

/// The universal storage unit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Blog {
    pub title: String,
    pub content: String,
    pub create_time: String,
    pub modify_time: String,
    pub access_time: String,
    pub modify_count: u64,
    pub access_count: u64,
    pub auth: AuthFlags,
    pub tags: String,
    pub encrypt: u8,
    pub account: String,
}

impl Blog {
    pub fn tag_list(&self) -> Vec<&str> {
        split_tags(&self.tags)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        let tag = tag.to_lowercase();
        self.tag_list().iter().any(|t| t.to_lowercase() == tag)
    }

    pub fn is_public(&self) -> bool {
        self.auth.intersects(AuthFlags::PUBLIC)
    }

    pub fn is_diary(&self) -> bool {
        self.auth.intersects(AuthFlags::DIARY)
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypt == 1 || self.auth.intersects(AuthFlags::ENCRYPTED)
    }
}

/// Pipe-delimited tag string to its non-empty entries.
pub fn split_tags(tags: &str) -> Vec<&str> {
    tags.split('|').map(str::trim).filter(|t| !t.is_empty()).collect()
}

/// Join tags back, dropping case-insensitive duplicates while keeping first-seen order.
pub fn join_tags<'a>(tags: impl IntoIterator<Item = &'a str>) -> String {
    let mut seen: Vec<String> = Vec::new();
    let mut out: Vec<&str> = Vec::new();
    for tag in tags {
        let key = tag.to_lowercase();
        if !tag.is_empty() && !seen.contains(&key) {
            seen.push(key);
            out.push(tag);
        }
    }
    out.join("|")
}

/// Input to add and modify: what a caller uploads.
#[derive(Debug, Clone, Default)]
pub struct UploadedBlog {
    pub title: String,
    pub content: String,
    pub auth: AuthFlags,
    pub tags: String,
    pub encrypt: bool,
}

impl UploadedBlog {
    pub fn new(title: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            content: content.into(),
            auth: AuthFlags::PRIVATE,
            ..Default::default()
        }
    }

    pub fn with_auth(mut self, auth: AuthFlags) -> Self {
        self.auth = auth;
        self
    }

    pub fn with_tags(mut self, tags: impl Into<String>) -> Self {
        self.tags = tags.into();
        self
    }

    pub fn encrypted(mut self, encrypt: bool) -> Self {
        self.encrypt = encrypt;
        self
    }
}

/// Partial edit: only the present fields are applied.
#[derive(Debug, Clone, Default)]
pub struct BlogUpdate {
    pub content: Option<String>,
    pub tags: Option<String>,
    pub auth: Option<AuthFlags>,
    pub encrypt: Option<bool>,
}

impl BlogUpdate {
    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.tags.is_none() && self.auth.is_none() && self.encrypt.is_none()
    }
}
