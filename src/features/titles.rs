//! Reserved title conventions.

use chrono::NaiveDate;

use crate::clock;

pub const TODO_PREFIX: &str = "todolist-";
pub const EXERCISE_PREFIX: &str = "exercise-";
pub const YEAR_PLAN_PREFIX: &str = "年计划_";
pub const MONTH_GOAL_PREFIX: &str = "月度目标_";
pub const READING_BOOK_PREFIX: &str = "reading_book_";
pub const ASSISTANT_PREFIX: &str = "AI_assistant_";

pub const EXERCISE_TEMPLATES_TITLE: &str = "exercise-templates";
pub const EXERCISE_COLLECTIONS_TITLE: &str = "exercise-template-collections";
pub const EXERCISE_PROFILE_TITLE: &str = "exercise-user-profile";
pub const LIFECOUNTDOWN_TITLE: &str = "lifecountdown.md";

const RESERVED_PREFIXES: [&str; 6] = [
    TODO_PREFIX,
    EXERCISE_PREFIX,
    YEAR_PLAN_PREFIX,
    MONTH_GOAL_PREFIX,
    READING_BOOK_PREFIX,
    ASSISTANT_PREFIX,
];

const RESERVED_TITLES: [&str; 1] = [LIFECOUNTDOWN_TITLE];

pub fn todo_title(date: &str) -> String {
    format!("{}{}", TODO_PREFIX, date)
}

pub fn exercise_title(date: &str) -> String {
    format!("{}{}", EXERCISE_PREFIX, date)
}

pub fn year_plan_title(year: i32) -> String {
    format!("{}{}", YEAR_PLAN_PREFIX, year)
}

pub fn month_goal_title(year: i32, month: u32) -> String {
    format!("{}{}-{:02}", MONTH_GOAL_PREFIX, year, month)
}

pub fn reading_book_title(book: &str) -> String {
    format!("{}{}.md", READING_BOOK_PREFIX, book)
}

pub fn assistant_title(date: NaiveDate) -> String {
    format!("{}{}", ASSISTANT_PREFIX, clock::format_date(date))
}

/// Whether generic save/modify must refuse this title.
pub fn is_reserved(title: &str) -> bool {
    RESERVED_PREFIXES.iter().any(|p| title.starts_with(p)) || RESERVED_TITLES.contains(&title)
}

/// Dated feature blog: the date part of `{prefix}YYYY-MM-DD`.
pub fn date_suffix<'a>(title: &'a str, prefix: &str) -> Option<&'a str> {
    title
        .strip_prefix(prefix)
        .filter(|rest| clock::parse_date(rest).is_some())
}

/// Page a feature blog is viewed through instead of the plain blog page.
pub fn redirect_for(title: &str) -> Option<String> {
    if let Some(date) = title.strip_prefix(TODO_PREFIX) {
        return Some(format!("/todolist?date={}", date));
    }
    if let Some(date) = date_suffix(title, EXERCISE_PREFIX) {
        return Some(format!("/exercise?date={}", date));
    }
    if let Some(year) = title.strip_prefix(YEAR_PLAN_PREFIX) {
        return Some(format!("/yearplan?year={}", year));
    }
    if let Some(ym) = title.strip_prefix(MONTH_GOAL_PREFIX) {
        let (year, month) = ym.split_once('-')?;
        return Some(format!("/monthgoal?year={}&month={}", year, month));
    }
    if let Some(rest) = title.strip_prefix(READING_BOOK_PREFIX) {
        let book = rest.strip_suffix(".md").unwrap_or(rest);
        return Some(format!("/reading?book={}", book));
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builders() {
        assert_eq!(todo_title("2024-05-01"), "todolist-2024-05-01");
        assert_eq!(month_goal_title(2024, 5), "月度目标_2024-05");
        assert_eq!(year_plan_title(2025), "年计划_2025");
        assert_eq!(reading_book_title("三体"), "reading_book_三体.md");
        let d = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        assert_eq!(assistant_title(d), "AI_assistant_2024-01-02");
    }

    #[test]
    fn reserved_titles() {
        assert!(is_reserved("todolist-2024-05-01"));
        assert!(is_reserved("exercise-templates"));
        assert!(is_reserved("lifecountdown.md"));
        assert!(is_reserved("AI_assistant_2024-01-02"));
        assert!(!is_reserved("sys_conf"));
        assert!(!is_reserved("lifecountdown"));
        assert!(!is_reserved("my-todolist-2024"));
    }

    #[test]
    fn redirects() {
        assert_eq!(
            redirect_for("todolist-2024-05-01").as_deref(),
            Some("/todolist?date=2024-05-01")
        );
        assert_eq!(
            redirect_for("exercise-2024-05-01").as_deref(),
            Some("/exercise?date=2024-05-01")
        );
        assert_eq!(redirect_for("exercise-templates"), None);
        assert_eq!(
            redirect_for("月度目标_2024-05").as_deref(),
            Some("/monthgoal?year=2024&month=05")
        );
        assert_eq!(
            redirect_for("reading_book_三体.md").as_deref(),
            Some("/reading?book=三体")
        );
        assert_eq!(redirect_for("notes"), None);
    }
}
