//! Read-only projections over an account's blogs.

use std::collections::{BTreeMap, HashMap};

use chrono::{Datelike, Duration, NaiveDate, Timelike};
use serde::Serialize;

use crate::blog::{AuthFlags, Blog};
use crate::clock;
use crate::sysconf::AccountConf;

/// Machine-written titles left out of user statistics.
pub const SYSTEM_PREFIXES: [&str; 8] = [
    "todolist-",
    "exercise-",
    "reading_book_",
    "年计划_",
    "月度目标_",
    "assistant_",
    "AI_assistant_",
    "sys_",
];

const TOP_N: usize = 10;
const HOT_TAGS: usize = 20;

pub fn is_system_title(title: &str) -> bool {
    SYSTEM_PREFIXES.iter().any(|p| title.starts_with(p))
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Statistics {
    pub blog_stats: BlogStats,
    pub access_stats: AccessStats,
    pub edit_stats: EditStats,
    pub tag_stats: TagStats,
    pub content_stats: ContentStats,
    pub time_analysis: TimeAnalysis,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BlogStats {
    pub total_blogs: usize,
    pub public_blogs: usize,
    pub private_blogs: usize,
    pub encrypt_blogs: usize,
    pub diary_blogs: usize,
    pub today_new_blogs: usize,
    pub week_new_blogs: usize,
    pub month_new_blogs: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlogAccessInfo {
    pub title: String,
    pub access_num: u64,
    pub access_time: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct AccessStats {
    pub total_access: u64,
    pub average_access: f64,
    pub zero_access_blogs: usize,
    pub top_accessed_blogs: Vec<BlogAccessInfo>,
    pub recent_access_blogs: Vec<BlogAccessInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlogEditInfo {
    pub title: String,
    pub modify_num: u64,
    pub modify_time: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct EditStats {
    pub total_edits: u64,
    pub average_edits: f64,
    pub never_edited_blogs: usize,
    pub top_edited_blogs: Vec<BlogEditInfo>,
    pub recent_edited_blogs: Vec<BlogEditInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TagInfo {
    pub tag: String,
    pub count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TagStats {
    pub total_tags: usize,
    pub public_tags: usize,
    pub hot_tags: Vec<TagInfo>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BlogContentInfo {
    pub title: String,
    pub length: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ContentStats {
    pub total_characters: usize,
    pub average_article_length: f64,
    pub empty_content_blogs: usize,
    pub longest_article: BlogContentInfo,
    pub shortest_article: BlogContentInfo,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TimeAnalysis {
    /// `YYYY-MM` to number of blogs created that month.
    pub creation_time_distribution: BTreeMap<String, usize>,
    pub edit_time_distribution: BTreeMap<String, usize>,
    pub access_hour_distribution: BTreeMap<u32, usize>,
}

fn month_key(ts: &str) -> Option<String> {
    clock::parse_time(ts).map(|t| t.format("%Y-%m").to_string())
}

/// Weeks start on Sunday.
pub fn collect(blogs: &HashMap<String, Blog>, today: NaiveDate, conf: &AccountConf) -> Statistics {
    let mut user: Vec<&Blog> = blogs.values().filter(|b| !is_system_title(&b.title)).collect();
    // HashMap order is arbitrary; ties below resolve by title
    user.sort_by(|a, b| a.title.cmp(&b.title));

    Statistics {
        blog_stats: blog_stats(&user, today),
        access_stats: access_stats(&user),
        edit_stats: edit_stats(&user),
        tag_stats: tag_stats(&user, conf),
        content_stats: content_stats(&user),
        time_analysis: time_analysis(&user),
    }
}

fn blog_stats(blogs: &[&Blog], today: NaiveDate) -> BlogStats {
    let week_start = today - Duration::days(i64::from(today.weekday().num_days_from_sunday()));
    let month_start = today.with_day(1).unwrap_or(today);
    let mut stats = BlogStats {
        total_blogs: blogs.len(),
        ..Default::default()
    };
    for b in blogs {
        if b.is_public() {
            stats.public_blogs += 1;
        }
        if b.auth.intersects(AuthFlags::PRIVATE) {
            stats.private_blogs += 1;
        }
        if b.is_encrypted() {
            stats.encrypt_blogs += 1;
        }
        if b.is_diary() {
            stats.diary_blogs += 1;
        }
        if let Some(created) = clock::date_of(&b.create_time) {
            if created == today {
                stats.today_new_blogs += 1;
            }
            if created >= week_start {
                stats.week_new_blogs += 1;
            }
            if created >= month_start {
                stats.month_new_blogs += 1;
            }
        }
    }
    stats
}

fn access_stats(blogs: &[&Blog]) -> AccessStats {
    let infos: Vec<BlogAccessInfo> = blogs
        .iter()
        .map(|b| BlogAccessInfo {
            title: b.title.clone(),
            access_num: b.access_count,
            access_time: b.access_time.clone(),
        })
        .collect();
    let total: u64 = infos.iter().map(|i| i.access_num).sum();

    let mut top = infos.clone();
    top.sort_by(|a, b| b.access_num.cmp(&a.access_num));
    top.truncate(TOP_N);
    let mut recent = infos;
    recent.sort_by(|a, b| b.access_time.cmp(&a.access_time));
    recent.truncate(TOP_N);

    AccessStats {
        total_access: total,
        average_access: average(total as f64, blogs.len()),
        zero_access_blogs: blogs.iter().filter(|b| b.access_count == 0).count(),
        top_accessed_blogs: top,
        recent_access_blogs: recent,
    }
}

fn edit_stats(blogs: &[&Blog]) -> EditStats {
    let infos: Vec<BlogEditInfo> = blogs
        .iter()
        .map(|b| BlogEditInfo {
            title: b.title.clone(),
            modify_num: b.modify_count,
            modify_time: b.modify_time.clone(),
        })
        .collect();
    let total: u64 = infos.iter().map(|i| i.modify_num).sum();

    let mut top = infos.clone();
    top.sort_by(|a, b| b.modify_num.cmp(&a.modify_num));
    top.truncate(TOP_N);
    let mut recent = infos;
    recent.sort_by(|a, b| b.modify_time.cmp(&a.modify_time));
    recent.truncate(TOP_N);

    EditStats {
        total_edits: total,
        average_edits: average(total as f64, blogs.len()),
        never_edited_blogs: blogs.iter().filter(|b| b.modify_count == 0).count(),
        top_edited_blogs: top,
        recent_edited_blogs: recent,
    }
}

fn tag_stats(blogs: &[&Blog], conf: &AccountConf) -> TagStats {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for b in blogs {
        for tag in b.tag_list() {
            *counts.entry(tag).or_default() += 1;
        }
    }
    let mut hot: Vec<TagInfo> = counts
        .iter()
        .map(|(tag, count)| TagInfo {
            tag: tag.to_string(),
            count: *count,
        })
        .collect();
    hot.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.tag.cmp(&b.tag)));
    hot.truncate(HOT_TAGS);

    TagStats {
        total_tags: counts.len(),
        public_tags: counts.keys().filter(|t| conf.is_public_tag(t)).count(),
        hot_tags: hot,
    }
}

fn content_stats(blogs: &[&Blog]) -> ContentStats {
    let mut stats = ContentStats::default();
    let mut shortest: Option<BlogContentInfo> = None;
    for b in blogs {
        let length = b.content.chars().count();
        stats.total_characters += length;
        if length == 0 {
            stats.empty_content_blogs += 1;
        }
        if length > stats.longest_article.length {
            stats.longest_article = BlogContentInfo {
                title: b.title.clone(),
                length,
            };
        }
        let shorter = match &shortest {
            Some(s) => length < s.length,
            None => true,
        };
        if shorter {
            shortest = Some(BlogContentInfo {
                title: b.title.clone(),
                length,
            });
        }
    }
    stats.shortest_article = shortest.unwrap_or_default();
    stats.average_article_length = average(stats.total_characters as f64, blogs.len());
    stats
}

fn time_analysis(blogs: &[&Blog]) -> TimeAnalysis {
    let mut analysis = TimeAnalysis::default();
    for b in blogs {
        if let Some(month) = month_key(&b.create_time) {
            *analysis.creation_time_distribution.entry(month).or_default() += 1;
        }
        if let Some(month) = month_key(&b.modify_time) {
            *analysis.edit_time_distribution.entry(month).or_default() += 1;
        }
        if let Some(t) = clock::parse_time(&b.access_time) {
            *analysis.access_hour_distribution.entry(t.hour()).or_default() += 1;
        }
    }
    analysis
}

fn average(total: f64, n: usize) -> f64 {
    if n == 0 {
        0.0
    } else {
        total / n as f64
    }
}

/// Titles whose title or content contains `keyword`, case-insensitively.
pub fn search_keyword(blogs: &HashMap<String, Blog>, keyword: &str) -> Vec<String> {
    let kw = keyword.to_lowercase();
    let mut hits: Vec<String> = blogs
        .values()
        .filter(|b| b.title.to_lowercase().contains(&kw) || b.content.to_lowercase().contains(&kw))
        .map(|b| b.title.clone())
        .collect();
    hits.sort();
    hits
}
