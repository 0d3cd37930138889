use std::io;
use std::path::{Path, PathBuf};

use crate::clock;

/// Human-readable export of blogs as `{blogs_path}/{account}/{title}.md`.
///
/// The mirror is never read back as a source of truth.
#[derive(Debug, Clone)]
pub struct FileMirror {
    blogs_path: PathBuf,
    recycle_path: PathBuf,
}

impl FileMirror {
    pub fn new(blogs_path: impl Into<PathBuf>, recycle_path: impl Into<PathBuf>) -> Self {
        Self {
            blogs_path: blogs_path.into(),
            recycle_path: recycle_path.into(),
        }
    }

    pub fn blogs_path(&self) -> &Path {
        &self.blogs_path
    }

    pub fn recycle_path(&self) -> &Path {
        &self.recycle_path
    }

    pub fn account_dir(&self, account: &str) -> PathBuf {
        self.blogs_path.join(account)
    }

    pub fn blog_path(&self, account: &str, title: &str) -> PathBuf {
        self.account_dir(account).join(format!("{}.md", title))
    }

    /// Write `content` unless the file already holds exactly that.
    /// Returns whether the file was written.
    pub fn save(&self, account: &str, title: &str, content: &str) -> io::Result<bool> {
        let path = self.blog_path(account, title);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        match std::fs::read_to_string(&path) {
            Ok(existing) if existing == content => {
                tracing::debug!("mirror unchanged {}", path.display());
                return Ok(false);
            }
            _ => {}
        }

        std::fs::write(&path, content)?;
        Ok(true)
    }

    /// Move the blog file to `{recycle_path}/{title}-YYYY-MM-DD.md`.
    /// Returns the new path, or `None` when there was no file to move.
    pub fn recycle(&self, account: &str, title: &str) -> io::Result<Option<PathBuf>> {
        let from = self.blog_path(account, title);
        if !from.exists() {
            return Ok(None);
        }

        let to = self
            .recycle_path
            .join(format!("{}-{}.md", title, clock::today_string()));
        if let Some(parent) = to.parent() {
            std::fs::create_dir_all(parent)?;
        }

        if std::fs::rename(&from, &to).is_err() {
            // rename fails across filesystems
            std::fs::copy(&from, &to)?;
            std::fs::remove_file(&from)?;
        }
        Ok(Some(to))
    }

    /// Markdown files directly under `dir`, as (stem, content) pairs.
    pub fn read_markdown_dir(dir: &Path) -> io::Result<Vec<(String, String)>> {
        let mut out = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match std::fs::read_to_string(&path) {
                Ok(content) => out.push((stem.to_string(), content)),
                Err(e) => tracing::warn!("skip unreadable {}: {}", path.display(), e),
            }
        }
        out.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(out)
    }
}
