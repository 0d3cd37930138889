use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct Comment {
    pub idx: usize,
    pub owner: String,
    pub msg: String,
    pub create_time: String,
    pub modify_time: String,
    pub mail: String,
    #[serde(skip)]
    pub pwd: String,
    pub user_id: String,
    #[serde(skip)]
    pub session_id: String,
    #[serde(skip)]
    pub ip: String,
    #[serde(skip)]
    pub user_agent: String,
    pub is_anonymous: bool,
    pub is_verified: bool,
}

/// Comments of one blog, ordered by index.
#[derive(Debug, Clone, PartialEq, Serialize, Default)]
pub struct BlogComments {
    pub title: String,
    pub comments: Vec<Comment>,
}

impl BlogComments {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            comments: Vec::new(),
        }
    }

    pub fn next_index(&self) -> usize {
        self.comments.iter().map(|c| c.idx + 1).max().unwrap_or(0)
    }

    pub fn sort(&mut self) {
        self.comments.sort_by_key(|c| c.idx);
    }

    /// Renumber 0..n after a removal so indices stay contiguous.
    pub fn reindex(&mut self) {
        self.sort();
        for (i, c) in self.comments.iter_mut().enumerate() {
            c.idx = i;
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(into = "u8")]
pub enum UserStatus {
    Normal,
    Muted,
    Banned,
}

impl From<UserStatus> for u8 {
    fn from(s: UserStatus) -> u8 {
        match s {
            UserStatus::Normal => 1,
            UserStatus::Muted => 2,
            UserStatus::Banned => 3,
        }
    }
}

impl UserStatus {
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(UserStatus::Normal),
            2 => Some(UserStatus::Muted),
            3 => Some(UserStatus::Banned),
            _ => None,
        }
    }
}

/// Commenter identity, separate from account logins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentUser {
    pub user_id: String,
    pub username: String,
    pub email: String,
    #[serde(skip)]
    pub password_hash: String,
    pub register_time: String,
    pub last_active: String,
    pub comment_count: u64,
    pub reputation: i64,
    pub status: UserStatus,
    pub is_verified: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CommentSession {
    pub session_id: String,
    pub user_id: String,
    pub ip: String,
    pub user_agent: String,
    pub create_time: String,
    pub expire_time: String,
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UsernameReservation {
    pub username: String,
    pub user_id: String,
    pub reserve_time: String,
    pub is_temporary: bool,
}
