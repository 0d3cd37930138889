//! The `/search` mini-language.
//!
//! - `$tag words`: blogs tagged `tag`, narrowed by `words`
//! - `@public`, `@private`, `@diary` with optional words; `@encrypt` lists encrypted blogs
//! - `@tag from [to]`, `@tagadd substr tag`, `@sameauth title`: bulk edits, returning what changed
//! - `@timed [base]`: date-suffixed blogs, or the latest `base_YYYY-MM-DD`
//! - anything else: every term must hit the title or content; `-t` limits a term to titles

use chrono::Local;

use crate::blog::{AuthFlags, Blog, BlogEngine};

#[derive(Debug, Clone, PartialEq)]
struct Term {
    text: String,
    title_only: bool,
}

fn parse_terms(tokens: &[&str]) -> Vec<Term> {
    let mut all_titles = false;
    let mut terms = Vec::new();
    for token in tokens {
        let lower = token.to_lowercase();
        if lower == "-t" || lower == "-ttitle" {
            all_titles = true;
            continue;
        }
        match lower.strip_prefix("-t") {
            Some(rest) => terms.push(Term {
                text: rest.to_string(),
                title_only: true,
            }),
            None => terms.push(Term {
                text: lower,
                title_only: all_titles,
            }),
        }
    }
    terms
}

fn matches(blog: &Blog, terms: &[Term]) -> bool {
    let title = blog.title.to_lowercase();
    let content = blog.content.to_lowercase();
    terms
        .iter()
        .all(|t| title.contains(&t.text) || (!t.title_only && content.contains(&t.text)))
}

fn sorted(mut blogs: Vec<Blog>) -> Vec<Blog> {
    blogs.sort_by(|a, b| {
        b.modify_time
            .cmp(&a.modify_time)
            .then_with(|| a.title.cmp(&b.title))
    });
    blogs
}

/// Run a search for the engine's account. Outside the owner's view only
/// public blogs are returned and bulk edits are refused.
pub async fn run(engine: &BlogEngine, query: &str, is_admin_view: bool) -> Vec<Blog> {
    let tokens: Vec<&str> = query.split_whitespace().collect();
    let Some((&head, rest)) = tokens.split_first() else {
        return Vec::new();
    };
    tracing::debug!("search account={} query={:?}", engine.account(), query);

    let snapshot = engine.snapshot().await;
    let visible = |b: &&Blog| is_admin_view || b.is_public();
    let filter = |pred: &dyn Fn(&Blog) -> bool, terms: &[Term]| -> Vec<Blog> {
        sorted(
            snapshot
                .values()
                .filter(visible)
                .filter(|b| !b.is_encrypted())
                .filter(|b| pred(b) && matches(b, terms))
                .cloned()
                .collect(),
        )
    };

    if let Some(tag) = head.strip_prefix('$') {
        let tag = tag.to_lowercase();
        return filter(&|b| b.tags.to_lowercase().contains(&tag), &parse_terms(rest));
    }

    let Some(directive) = head.strip_prefix('@') else {
        return filter(&|_| true, &parse_terms(&tokens));
    };
    let terms = parse_terms(rest);
    match directive.to_lowercase().as_str() {
        "public" => filter(&|b| b.auth.intersects(AuthFlags::PUBLIC), &terms),
        "private" => filter(&|b| b.auth.intersects(AuthFlags::PRIVATE), &terms),
        "diary" => filter(&|b| b.auth.intersects(AuthFlags::DIARY), &terms),
        "encrypt" => sorted(
            snapshot
                .values()
                .filter(visible)
                .filter(|b| b.is_encrypted())
                .cloned()
                .collect(),
        ),
        "timed" => match rest.first() {
            Some(base) => engine
                .recently_timed(base, Local::now().date_naive())
                .await
                .filter(|b| is_admin_view || b.is_public())
                .into_iter()
                .collect(),
            None => {
                let conf = match engine.with_book(|b| b.conf()).await {
                    Ok(conf) => conf,
                    Err(e) => {
                        tracing::error!("{}", e);
                        return Vec::new();
                    }
                };
                filter(&|b| conf.is_timed_title(&b.title), &[])
            }
        },
        "tag" | "tagadd" | "sameauth" if !is_admin_view => Vec::new(),
        "tag" => match rest {
            [from] => pick(engine, engine.tag_replace(from, "").await).await,
            [from, to, ..] => pick(engine, engine.tag_replace(from, to).await).await,
            [] => Vec::new(),
        },
        "tagadd" => match rest {
            [substr, tag, ..] => pick(engine, engine.tag_add(substr, tag).await).await,
            _ => Vec::new(),
        },
        "sameauth" => match rest.first() {
            Some(title) => pick(engine, engine.set_same_auth(title).await).await,
            None => Vec::new(),
        },
        other => {
            tracing::debug!("unknown search directive @{}", other);
            Vec::new()
        }
    }
}

/// Fresh copies of the changed blogs.
async fn pick(engine: &BlogEngine, titles: Vec<String>) -> Vec<Blog> {
    let snapshot = engine.snapshot().await;
    sorted(titles.iter().filter_map(|t| snapshot.get(t).cloned()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::UploadedBlog;
    use crate::features::testing;

    fn titles(blogs: Vec<Blog>) -> Vec<String> {
        let mut t: Vec<String> = blogs.into_iter().map(|b| b.title).collect();
        t.sort();
        t
    }

    async fn seeded(tmp: &tempfile::TempDir) -> BlogEngine {
        let engine = testing::engine(tmp);
        engine
            .add(UploadedBlog::new("rust-notes", "borrow checker tips").with_tags("code|rust"))
            .await;
        engine
            .add(
                UploadedBlog::new("go-notes", "goroutines and channels")
                    .with_tags("code")
                    .with_auth(AuthFlags::PUBLIC),
            )
            .await;
        engine
            .add(UploadedBlog::new("secret", "rust secret").encrypted(true))
            .await;
        engine
            .add(UploadedBlog::new("日记_2024-05-01", "rust day").with_auth(AuthFlags::PRIVATE))
            .await;
        engine
    }

    #[tokio::test]
    async fn plain_terms_must_all_match_and_skip_encrypted() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = seeded(&tmp).await;
        assert_eq!(
            titles(run(&engine, "rust", true).await),
            ["rust-notes", "日记_2024-05-01"]
        );
        assert_eq!(titles(run(&engine, "rust tips", true).await), ["rust-notes"]);
        assert!(run(&engine, "rust goroutines", true).await.is_empty());
        assert!(run(&engine, "   ", true).await.is_empty());
    }

    #[tokio::test]
    async fn title_only_terms() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = seeded(&tmp).await;
        assert!(run(&engine, "-tchecker", true).await.is_empty());
        assert_eq!(titles(run(&engine, "-tnotes", true).await), ["go-notes", "rust-notes"]);
        assert_eq!(titles(run(&engine, "-t rust", true).await), ["rust-notes"]);
    }

    #[tokio::test]
    async fn tag_and_auth_filters() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = seeded(&tmp).await;
        assert_eq!(titles(run(&engine, "$code", true).await), ["go-notes", "rust-notes"]);
        assert_eq!(titles(run(&engine, "$code borrow", true).await), ["rust-notes"]);
        assert_eq!(titles(run(&engine, "@public", true).await), ["go-notes"]);
        assert_eq!(titles(run(&engine, "@diary", true).await), ["日记_2024-05-01"]);
        assert_eq!(titles(run(&engine, "@encrypt", true).await), ["secret"]);
    }

    #[tokio::test]
    async fn visitors_only_see_public_and_cannot_edit() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = seeded(&tmp).await;
        assert_eq!(titles(run(&engine, "notes", false).await), ["go-notes"]);
        assert!(run(&engine, "@tag code", false).await.is_empty());
        assert!(engine.get("rust-notes").await.unwrap().has_tag("code"));
    }

    #[tokio::test]
    async fn bulk_directives_return_changed_blogs() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = seeded(&tmp).await;
        let changed = titles(run(&engine, "@tag code dev", true).await);
        assert_eq!(changed, ["go-notes", "rust-notes"]);
        assert!(engine.get("go-notes").await.unwrap().has_tag("dev"));

        let changed = titles(run(&engine, "@tagadd rust lang", true).await);
        assert_eq!(changed, ["rust-notes"]);
    }

    #[tokio::test]
    async fn timed_lists_and_latest() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = seeded(&tmp).await;
        assert_eq!(titles(run(&engine, "@timed", true).await), ["日记_2024-05-01"]);
        assert_eq!(titles(run(&engine, "@timed 日记", true).await), ["日记_2024-05-01"]);
        assert!(run(&engine, "@timed nothing", true).await.is_empty());
    }
}
