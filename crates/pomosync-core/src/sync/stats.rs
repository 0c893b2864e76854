//! Canonical stats aggregate and the local delta applied on optimistic adds.

use chrono::{DateTime, Datelike, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};

use super::types::NewSession;

pub const WEEKDAYS: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

pub fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeekdayActivity {
    pub day: String,
    pub sessions: u32,
    pub minutes: u32,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WeeklyTrend {
    pub current_week: u32,
    pub previous_week: u32,
    pub change_percent: f64,
}

impl WeeklyTrend {
    pub fn recompute(&mut self) {
        self.change_percent = change_percent(self.current_week, self.previous_week);
    }
}

/// Week-over-week change. A jump from zero counts as +100%.
pub fn change_percent(current: u32, previous: u32) -> f64 {
    if previous == 0 {
        return if current > 0 { 100.0 } else { 0.0 };
    }
    let delta = f64::from(current) - f64::from(previous);
    (delta / f64::from(previous) * 1000.0).round() / 10.0
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeatmapDay {
    pub date: NaiveDate,
    pub count: u32,
    pub minutes: u32,
}

/// Aggregate statistics in the one shape the rest of the app consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    pub total_sessions: u32,
    pub completed_sessions: u32,
    pub total_minutes: u32,
    /// Last 7 days, Monday..Sunday.
    pub weekly_activity: Vec<WeekdayActivity>,
    /// Last 30 days, Monday..Sunday.
    pub monthly_activity: Vec<WeekdayActivity>,
    /// All time, Monday..Sunday.
    pub all_time_activity: Vec<WeekdayActivity>,
    pub average_session_minutes: f64,
    pub most_productive_day: Option<String>,
    pub weekly_trend: WeeklyTrend,
    pub current_streak: u32,
    pub heatmap: Vec<HeatmapDay>,
}

impl Default for Stats {
    fn default() -> Self {
        Self::empty()
    }
}

impl Stats {
    /// Zeroed stats with all weekday buckets present.
    pub fn empty() -> Self {
        Self {
            total_sessions: 0,
            completed_sessions: 0,
            total_minutes: 0,
            weekly_activity: empty_buckets(),
            monthly_activity: empty_buckets(),
            all_time_activity: empty_buckets(),
            average_session_minutes: 0.0,
            most_productive_day: None,
            weekly_trend: WeeklyTrend::default(),
            current_streak: 0,
            heatmap: Vec::new(),
        }
    }

    /// Apply one locally-recorded session on top of this snapshot.
    pub fn record_local(&mut self, session: &NewSession, at: DateTime<Utc>) {
        self.total_sessions = self.total_sessions.saturating_add(1);
        self.total_minutes = self.total_minutes.saturating_add(session.duration);
        self.average_session_minutes = average(self.total_minutes, self.total_sessions);

        let weekday = at.weekday();
        for buckets in [
            &mut self.weekly_activity,
            &mut self.monthly_activity,
            &mut self.all_time_activity,
        ] {
            bump_bucket(buckets, weekday, session.duration);
        }
        self.most_productive_day = most_productive(&self.all_time_activity);

        let today = at.date_naive();
        match self.heatmap.iter_mut().find(|d| d.date == today) {
            Some(day) => {
                day.count = day.count.saturating_add(1);
                day.minutes = day.minutes.saturating_add(session.duration);
            }
            None => {
                // Without a heatmap a non-zero streak may already include today.
                if !self.heatmap.is_empty() || self.current_streak == 0 {
                    self.current_streak = self.current_streak.saturating_add(1);
                }
                self.heatmap.push(HeatmapDay {
                    date: today,
                    count: 1,
                    minutes: session.duration,
                });
                self.heatmap.sort_by_key(|d| d.date);
            }
        }

        if session.completed {
            self.completed_sessions = self.completed_sessions.saturating_add(1);
            self.weekly_trend.current_week = self.weekly_trend.current_week.saturating_add(1);
            self.weekly_trend.recompute();
        }
    }
}

pub fn empty_buckets() -> Vec<WeekdayActivity> {
    WEEKDAYS
        .iter()
        .map(|d| WeekdayActivity {
            day: weekday_name(*d).to_string(),
            sessions: 0,
            minutes: 0,
        })
        .collect()
}

pub fn average(total_minutes: u32, sessions: u32) -> f64 {
    if sessions == 0 {
        return 0.0;
    }
    (f64::from(total_minutes) / f64::from(sessions) * 10.0).round() / 10.0
}

/// Day with the most minutes; ties go to the earlier weekday.
pub fn most_productive(buckets: &[WeekdayActivity]) -> Option<String> {
    buckets
        .iter()
        .filter(|b| b.minutes > 0)
        .fold(None::<&WeekdayActivity>, |best, b| match best {
            Some(best) if best.minutes >= b.minutes => Some(best),
            _ => Some(b),
        })
        .map(|b| b.day.clone())
}

fn bump_bucket(buckets: &mut Vec<WeekdayActivity>, day: Weekday, minutes: u32) {
    let name = weekday_name(day);
    if buckets.len() != WEEKDAYS.len() {
        *buckets = empty_buckets();
    }
    if let Some(bucket) = buckets.iter_mut().find(|b| b.day == name) {
        bucket.sessions = bucket.sessions.saturating_add(1);
        bucket.minutes = bucket.minutes.saturating_add(minutes);
    }
}
