//! Life countdown: a stored config and the figures derived from it.

use serde::{Deserialize, Serialize};

use super::store::FeatureStore;
use super::titles::LIFECOUNTDOWN_TITLE;
use super::{FeatureError, FeatureResult};
use crate::blog::BlogEngine;

pub const TAGS: &str = "lifecountdown";

const DAYS_PER_YEAR: i64 = 365;
const SCHOOL_YEARS: i64 = 18;
const WORK_YEARS: (i64, i64) = (25, 65);
const GOLDEN_YEARS: (i64, i64) = (18, 45);
const MIN_REST_HOURS: f64 = 2.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserConfig {
    pub current_age: i64,
    pub expected_lifespan: i64,
    pub daily_sleep_hours: f64,
    pub daily_study_hours: f64,
    pub daily_reading_hours: f64,
    pub daily_work_hours: f64,
    pub reading_speed: i64,
    pub average_book_words: i64,
}

impl Default for UserConfig {
    fn default() -> Self {
        Self {
            current_age: 25,
            expected_lifespan: 80,
            daily_sleep_hours: 8.0,
            daily_study_hours: 2.0,
            daily_reading_hours: 1.0,
            daily_work_hours: 8.0,
            reading_speed: 300,
            average_book_words: 150_000,
        }
    }
}

impl UserConfig {
    fn validate(&self) -> FeatureResult<()> {
        if self.current_age < 0 || self.expected_lifespan <= 0 {
            return Err(FeatureError::Invalid("ages must be positive".into()));
        }
        if self.current_age > self.expected_lifespan {
            return Err(FeatureError::Invalid("current age exceeds expected lifespan".into()));
        }
        let hours = [
            self.daily_sleep_hours,
            self.daily_study_hours,
            self.daily_reading_hours,
            self.daily_work_hours,
        ];
        if hours.iter().any(|h| !(0.0..=24.0).contains(h)) {
            return Err(FeatureError::Invalid("daily hours must be within 0..=24".into()));
        }
        if self.reading_speed <= 0 || self.average_book_words < 0 {
            return Err(FeatureError::Invalid("reading speed must be positive".into()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CountdownData {
    pub current_age: i64,
    pub expected_lifespan: i64,
    pub total_days: i64,
    pub passed_days: i64,
    pub remaining_days: i64,
    pub passed_percent: f64,
    pub remaining_percent: f64,
    pub sleep_days: i64,
    pub study_days: i64,
    pub work_days: i64,
    pub rest_days: i64,
    pub golden_days: i64,
    pub total_reading_hours: i64,
    pub books_can_read: i64,
    pub reading_speed: i64,
    pub average_book_words: i64,
    pub daily_sleep_hours: f64,
    pub daily_study_hours: f64,
    pub daily_reading_hours: f64,
    pub daily_work_hours: f64,
}

/// Years left inside `[from, to]` for someone aged `age`.
fn years_in_window(age: i64, (from, to): (i64, i64)) -> i64 {
    if age < from {
        to - from
    } else if age <= to {
        to - age
    } else {
        0
    }
}

pub fn calculate(config: &UserConfig) -> CountdownData {
    let total_days = config.expected_lifespan * DAYS_PER_YEAR;
    let passed_days = config.current_age * DAYS_PER_YEAR;
    let remaining_days = total_days - passed_days;
    let passed_percent = if total_days > 0 {
        passed_days as f64 / total_days as f64 * 100.0
    } else {
        0.0
    };

    let share = |days: i64, hours: f64| (days as f64 * hours / 24.0) as i64;
    let mut rest_hours =
        24.0 - config.daily_sleep_hours - config.daily_study_hours - config.daily_work_hours;
    if rest_hours < 0.0 {
        rest_hours = MIN_REST_HOURS;
    }

    let total_reading_hours = (remaining_days as f64 * config.daily_reading_hours) as i64;
    let minutes_per_book = if config.reading_speed > 0 {
        config.average_book_words / config.reading_speed
    } else {
        0
    };
    let hours_per_book = minutes_per_book as f64 / 60.0;
    let books_can_read = if hours_per_book > 0.0 {
        (total_reading_hours as f64 / hours_per_book) as i64
    } else {
        0
    };

    CountdownData {
        current_age: config.current_age,
        expected_lifespan: config.expected_lifespan,
        total_days,
        passed_days,
        remaining_days,
        passed_percent,
        remaining_percent: 100.0 - passed_percent,
        sleep_days: share(total_days, config.daily_sleep_hours),
        study_days: config.current_age.min(SCHOOL_YEARS) * DAYS_PER_YEAR
            + share(remaining_days, config.daily_study_hours),
        work_days: years_in_window(config.current_age, WORK_YEARS) * DAYS_PER_YEAR,
        rest_days: share(total_days, rest_hours),
        golden_days: years_in_window(config.current_age, GOLDEN_YEARS) * DAYS_PER_YEAR,
        total_reading_hours,
        books_can_read,
        reading_speed: config.reading_speed,
        average_book_words: config.average_book_words,
        daily_sleep_hours: config.daily_sleep_hours,
        daily_study_hours: config.daily_study_hours,
        daily_reading_hours: config.daily_reading_hours,
        daily_work_hours: config.daily_work_hours,
    }
}

/// `N年M个月D天`, dropping leading zero units.
pub fn format_days(days: i64) -> String {
    let years = days / DAYS_PER_YEAR;
    let months = days % DAYS_PER_YEAR / 30;
    let rest = days % DAYS_PER_YEAR % 30;
    if years > 0 {
        format!("{}年{}个月{}天", years, months, rest)
    } else if months > 0 {
        format!("{}个月{}天", months, rest)
    } else {
        format!("{}天", rest)
    }
}

#[derive(Clone)]
pub struct LifeCountdownService {
    store: FeatureStore<UserConfig>,
}

impl LifeCountdownService {
    pub fn new(engine: BlogEngine) -> Self {
        Self {
            store: FeatureStore::new(engine, TAGS),
        }
    }

    pub async fn config(&self) -> FeatureResult<UserConfig> {
        self.store.load_or_default(LIFECOUNTDOWN_TITLE).await
    }

    pub async fn save_config(&self, config: UserConfig) -> FeatureResult<CountdownData> {
        config.validate()?;
        let data = calculate(&config);
        self.store.save(LIFECOUNTDOWN_TITLE, config).await?;
        Ok(data)
    }

    pub async fn data(&self) -> FeatureResult<CountdownData> {
        Ok(calculate(&self.config().await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::testing;

    #[test]
    fn defaults_produce_known_figures() {
        let d = calculate(&UserConfig::default());
        assert_eq!(d.total_days, 29200);
        assert_eq!(d.passed_days, 9125);
        assert_eq!(d.remaining_days, 20075);
        assert!((d.passed_percent - 31.25).abs() < 1e-9);
        assert_eq!(d.sleep_days, 9733);
        assert_eq!(d.study_days, 18 * 365 + 1672);
        assert_eq!(d.work_days, 40 * 365);
        assert_eq!(d.rest_days, 7300);
        assert_eq!(d.golden_days, 20 * 365);
        assert_eq!(d.total_reading_hours, 20075);
        // 150000 / 300 = 500 minutes per book
        assert_eq!(d.books_can_read, (20075.0 / (500.0 / 60.0)) as i64);
    }

    #[test]
    fn overbooked_days_keep_minimum_rest() {
        let d = calculate(&UserConfig {
            daily_sleep_hours: 10.0,
            daily_study_hours: 6.0,
            daily_work_hours: 10.0,
            ..Default::default()
        });
        assert_eq!(d.rest_days, 29200 / 12);
    }

    #[test]
    fn windows_for_young_and_old() {
        let young = calculate(&UserConfig {
            current_age: 10,
            ..Default::default()
        });
        assert_eq!(young.study_days, 10 * 365 + (70.0 * 365.0 * 2.0 / 24.0) as i64);
        assert_eq!(young.golden_days, 27 * 365);
        let old = calculate(&UserConfig {
            current_age: 70,
            ..Default::default()
        });
        assert_eq!(old.work_days, 0);
        assert_eq!(old.golden_days, 0);
    }

    #[test]
    fn format_days_drops_leading_units() {
        assert_eq!(format_days(400), "1年1个月5天");
        assert_eq!(format_days(45), "1个月15天");
        assert_eq!(format_days(3), "3天");
    }

    #[tokio::test]
    async fn config_round_trip_and_validation() {
        let tmp = tempfile::tempdir().unwrap();
        let engine = testing::engine(&tmp);
        let svc = LifeCountdownService::new(engine.clone());
        assert_eq!(svc.config().await.unwrap(), UserConfig::default());

        let cfg = UserConfig {
            current_age: 30,
            ..Default::default()
        };
        let data = svc.save_config(cfg.clone()).await.unwrap();
        assert_eq!(data.passed_days, 30 * 365);
        assert_eq!(svc.config().await.unwrap(), cfg);
        assert_eq!(engine.get("lifecountdown.md").await.unwrap().tags, "lifecountdown");

        let bad = UserConfig {
            current_age: 90,
            ..Default::default()
        };
        assert!(matches!(
            svc.save_config(bad).await,
            Err(FeatureError::Invalid(_))
        ));
    }
}
