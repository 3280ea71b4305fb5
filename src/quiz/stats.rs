use chrono::{DateTime, Datelike, Days, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};

/// Percentage of correct answers, `0.0` when nothing was answered.
pub fn accuracy(correct: i64, total: i64) -> f64 {
    if total <= 0 {
        return 0.0;
    }
    correct as f64 / total as f64 * 100.0
}

pub fn average(sum: i64, count: i64) -> f64 {
    if count <= 0 {
        return 0.0;
    }
    sum as f64 / count as f64
}

/// Start instants of the reporting windows, as UTC timestamps comparable
/// with the stored `datetime('now')` columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindows {
    pub today: NaiveDateTime,
    /// Weeks start on Sunday.
    pub week: NaiveDateTime,
    pub month: NaiveDateTime,
}

impl TimeWindows {
    pub fn now() -> Self {
        Self::at(Local::now())
    }

    pub fn at<Tz: TimeZone>(now: DateTime<Tz>) -> Self {
        let tz = now.timezone();
        let date = now.date_naive();
        let since_sunday = u64::from(date.weekday().num_days_from_sunday());

        let week = date.checked_sub_days(Days::new(since_sunday)).unwrap_or(date);
        let month = date.with_day(1).unwrap_or(date);

        Self {
            today: day_start_utc(&tz, date),
            week: day_start_utc(&tz, week),
            month: day_start_utc(&tz, month),
        }
    }
}

fn day_start_utc<Tz: TimeZone>(tz: &Tz, date: NaiveDate) -> NaiveDateTime {
    let midnight = date.and_hms_opt(0, 0, 0).unwrap_or_default();
    // A DST gap can swallow local midnight; fall back to reading it as UTC.
    tz.from_local_datetime(&midnight)
        .earliest()
        .map(|t| t.with_timezone(&Utc).naive_utc())
        .unwrap_or(midnight)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

/// Sort columns accepted by the per-question statistics listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuestionSort {
    TotalAnswered,
    CorrectAnswered,
    AccuracyRate,
}

/// Sort columns accepted by the per-user statistics listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserSort {
    TotalAnswered,
    CorrectAnswered,
    AccuracyRate,
    TotalTimeSpent,
    LastActiveTime,
}

impl QuestionSort {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "total_answered" => Some(Self::TotalAnswered),
            "correct_answered" => Some(Self::CorrectAnswered),
            "accuracy_rate" => Some(Self::AccuracyRate),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::TotalAnswered => "total_answered",
            Self::CorrectAnswered => "correct_answered",
            Self::AccuracyRate => "accuracy_rate",
        }
    }
}

impl UserSort {
    fn parse(key: &str) -> Option<Self> {
        match key {
            "total_answered" => Some(Self::TotalAnswered),
            "correct_answered" => Some(Self::CorrectAnswered),
            "accuracy_rate" => Some(Self::AccuracyRate),
            "total_time_spent" => Some(Self::TotalTimeSpent),
            "last_active_time" => Some(Self::LastActiveTime),
            _ => None,
        }
    }

    pub fn column(self) -> &'static str {
        match self {
            Self::TotalAnswered => "total_answered",
            Self::CorrectAnswered => "correct_answered",
            Self::AccuracyRate => "accuracy_rate",
            Self::TotalTimeSpent => "total_time_spent",
            Self::LastActiveTime => "last_active_time",
        }
    }
}

fn parse_order(order: Option<&str>) -> Option<SortOrder> {
    match order.unwrap_or("DESC") {
        "ASC" => Some(SortOrder::Asc),
        "DESC" => Some(SortOrder::Desc),
        _ => None,
    }
}

/// Resolves user-supplied sort parameters; anything off the allow-list falls
/// back to `total_answered DESC`.
pub fn question_sort(key: Option<&str>, order: Option<&str>) -> (QuestionSort, SortOrder) {
    let key = QuestionSort::parse(key.unwrap_or("total_answered"));
    match (key, parse_order(order)) {
        (Some(key), Some(order)) => (key, order),
        _ => (QuestionSort::TotalAnswered, SortOrder::Desc),
    }
}

pub fn user_sort(key: Option<&str>, order: Option<&str>) -> (UserSort, SortOrder) {
    let key = UserSort::parse(key.unwrap_or("total_answered"));
    match (key, parse_order(order)) {
        (Some(key), Some(order)) => (key, order),
        _ => (UserSort::TotalAnswered, SortOrder::Desc),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{FixedOffset, NaiveDate};

    use super::*;

    fn at(y: i32, m: u32, d: u32, h: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .and_then(|d| d.and_hms_opt(h, 0, 0))
            .unwrap_or_default()
    }

    #[test]
    fn accuracy_is_zero_without_answers() {
        assert_eq!(accuracy(0, 0), 0.0);
        assert_eq!(accuracy(3, 4), 75.0);
        assert_eq!(average(10, 0), 0.0);
        assert_eq!(average(10, 4), 2.5);
    }

    #[test]
    fn week_starts_on_sunday() {
        // 2024-05-15 is a Wednesday.
        let now = Utc.from_utc_datetime(&at(2024, 5, 15, 13));
        let windows = TimeWindows::at(now);

        assert_eq!(windows.today, at(2024, 5, 15, 0));
        assert_eq!(windows.week, at(2024, 5, 12, 0));
        assert_eq!(windows.month, at(2024, 5, 1, 0));
    }

    #[test]
    fn sunday_is_its_own_week_start() {
        let now = Utc.from_utc_datetime(&at(2024, 5, 12, 8));
        assert_eq!(TimeWindows::at(now).week, at(2024, 5, 12, 0));
    }

    #[test]
    fn local_midnight_is_converted_to_utc() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        // 2024-03-01 02:00 at +08:00.
        let now = tz.from_utc_datetime(&at(2024, 2, 29, 18));
        let windows = TimeWindows::at(now);

        assert_eq!(windows.today, at(2024, 2, 29, 16));
        assert_eq!(windows.month, at(2024, 2, 29, 16));
        // 2024-02-25 was the Sunday before.
        assert_eq!(windows.week, at(2024, 2, 24, 16));
    }

    #[test]
    fn unknown_sort_keys_fall_back_to_the_default() {
        assert_eq!(
            question_sort(Some("accuracy_rate"), Some("ASC")),
            (QuestionSort::AccuracyRate, SortOrder::Asc)
        );
        assert_eq!(
            question_sort(Some("id; DROP TABLE users"), Some("ASC")),
            (QuestionSort::TotalAnswered, SortOrder::Desc)
        );
        assert_eq!(
            question_sort(Some("total_time_spent"), None),
            (QuestionSort::TotalAnswered, SortOrder::Desc)
        );
        assert_eq!(
            user_sort(Some("total_time_spent"), Some("sideways")),
            (UserSort::TotalAnswered, SortOrder::Desc)
        );
        assert_eq!(
            user_sort(Some("last_active_time"), None),
            (UserSort::LastActiveTime, SortOrder::Desc)
        );
        assert_eq!(user_sort(None, None), (UserSort::TotalAnswered, SortOrder::Desc));
    }
}
