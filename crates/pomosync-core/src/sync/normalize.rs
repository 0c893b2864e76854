//! Normalization of server stats payloads into [`Stats`].
//!
//! Backends have shipped several field names for the same quantity over time
//! (`total_minutes`, `totalFocusMinutes`, `total_focus_time`, ...). Everything
//! is folded into the one canonical shape here, and values the server left
//! out are derived from the ones it did send.

use chrono::{NaiveDate, Weekday};
use serde_json::{Map, Value};
use tracing::debug;

use super::stats::{
    average, change_percent, empty_buckets, most_productive, HeatmapDay, Stats, WeekdayActivity,
    WeeklyTrend, WEEKDAYS,
};
use crate::error::ApiError;

const TOTAL_SESSIONS: &[&str] = &["total_sessions", "totalSessions", "sessionCount"];
const COMPLETED_SESSIONS: &[&str] = &["completed_sessions", "completedSessions"];
const TOTAL_MINUTES: &[&str] = &[
    "total_minutes",
    "totalMinutes",
    "totalFocusMinutes",
    "total_focus_minutes",
    "total_focus_time",
    "totalFocusTime",
];
const WEEKLY_ACTIVITY: &[&str] = &["weekly_activity", "weeklyActivity", "weekly"];
const MONTHLY_ACTIVITY: &[&str] = &["monthly_activity", "monthlyActivity", "monthly"];
const ALL_TIME_ACTIVITY: &[&str] = &["all_time_activity", "allTimeActivity", "allTime", "all_time"];
const AVERAGE_SESSION: &[&str] = &[
    "average_session_minutes",
    "averageSessionMinutes",
    "avgSessionLength",
    "avg_session_length",
    "averageSessionLength",
];
const MOST_PRODUCTIVE_DAY: &[&str] = &["most_productive_day", "mostProductiveDay"];
const WEEKLY_TREND: &[&str] = &["weekly_trend", "weeklyTrend"];
const CURRENT_STREAK: &[&str] = &["current_streak", "currentStreak", "streak"];
const HEATMAP: &[&str] = &["heatmap", "heatmapData", "heatmap_data"];

const BUCKET_DAY: &[&str] = &["day", "name", "weekday"];
const BUCKET_SESSIONS: &[&str] = &["sessions", "count", "sessionCount"];
const BUCKET_MINUTES: &[&str] = &["minutes", "focusMinutes", "totalMinutes"];

const TREND_CURRENT: &[&str] = &["current_week", "currentWeek", "thisWeek"];
const TREND_PREVIOUS: &[&str] = &["previous_week", "previousWeek", "lastWeek"];
const TREND_CHANGE: &[&str] = &["change_percent", "changePercent", "change"];

const HEATMAP_DATE: &[&str] = &["date"];
const HEATMAP_COUNT: &[&str] = &["count", "sessions"];
const HEATMAP_MINUTES: &[&str] = &["minutes", "focusMinutes"];

/// Fold a stats payload, bare or wrapped in `{"stats": ...}`, into [`Stats`].
///
/// When several spellings of one field are present the first known spelling
/// wins; values of the wrong type are treated as missing.
pub fn normalize_stats(payload: Value) -> Result<Stats, ApiError> {
    let mut map = match payload {
        Value::Object(map) => map,
        other => {
            return Err(ApiError::Decode(format!(
                "stats payload must be an object, got {}",
                kind(&other)
            )))
        }
    };
    if let Some(Value::Object(inner)) = map.remove("stats") {
        map = inner;
    }
    Ok(fold(&map))
}

/// First present, non-null value among `names`.
fn pick<'a>(map: &'a Map<String, Value>, names: &[&str]) -> Option<&'a Value> {
    names
        .iter()
        .find_map(|name| map.get(*name).filter(|v| !v.is_null()))
}

fn number(map: &Map<String, Value>, names: &[&str]) -> Option<f64> {
    match pick(map, names)? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn text<'a>(map: &'a Map<String, Value>, names: &[&str]) -> Option<&'a str> {
    pick(map, names)?.as_str()
}

fn objects<'a>(
    map: &'a Map<String, Value>,
    names: &[&str],
) -> impl Iterator<Item = &'a Map<String, Value>> {
    pick(map, names)
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
        .filter_map(Value::as_object)
}

fn fold(map: &Map<String, Value>) -> Stats {
    let weekly_activity = fill_buckets(map, WEEKLY_ACTIVITY);
    let monthly_activity = fill_buckets(map, MONTHLY_ACTIVITY);
    let all_time_activity = fill_buckets(map, ALL_TIME_ACTIVITY);

    let total_sessions = number(map, TOTAL_SESSIONS)
        .map(count)
        .unwrap_or_else(|| sum(all_time_activity.iter().map(|b| b.sessions)));
    let total_minutes = number(map, TOTAL_MINUTES)
        .map(count)
        .unwrap_or_else(|| sum(all_time_activity.iter().map(|b| b.minutes)));

    let average_session_minutes = match number(map, AVERAGE_SESSION) {
        Some(avg) if avg.is_finite() && avg >= 0.0 => avg,
        _ => average(total_minutes, total_sessions),
    };

    let most_productive_day = text(map, MOST_PRODUCTIVE_DAY)
        .map(|d| d.trim().to_string())
        .filter(|d| !d.is_empty())
        .or_else(|| most_productive(&all_time_activity));

    let weekly_trend = match pick(map, WEEKLY_TREND).and_then(Value::as_object) {
        Some(trend) => {
            let current_week = number(trend, TREND_CURRENT).map(count).unwrap_or(0);
            let previous_week = number(trend, TREND_PREVIOUS).map(count).unwrap_or(0);
            WeeklyTrend {
                current_week,
                previous_week,
                change_percent: number(trend, TREND_CHANGE)
                    .filter(|c| c.is_finite())
                    .unwrap_or_else(|| change_percent(current_week, previous_week)),
            }
        }
        None => WeeklyTrend::default(),
    };

    let mut heatmap: Vec<HeatmapDay> = objects(map, HEATMAP)
        .filter_map(|day| {
            let date = parse_date(text(day, HEATMAP_DATE)?)?;
            Some(HeatmapDay {
                date,
                count: number(day, HEATMAP_COUNT).map(count).unwrap_or(0),
                minutes: number(day, HEATMAP_MINUTES).map(count).unwrap_or(0),
            })
        })
        .collect();
    heatmap.sort_by_key(|d| d.date);

    Stats {
        total_sessions,
        completed_sessions: number(map, COMPLETED_SESSIONS).map(count).unwrap_or(0),
        total_minutes,
        weekly_activity,
        monthly_activity,
        all_time_activity,
        average_session_minutes,
        most_productive_day,
        weekly_trend,
        current_streak: number(map, CURRENT_STREAK).map(count).unwrap_or(0),
        heatmap,
    }
}

/// Seven buckets, Monday..Sunday, whatever order or spelling the server used.
fn fill_buckets(map: &Map<String, Value>, names: &[&str]) -> Vec<WeekdayActivity> {
    let mut buckets = empty_buckets();
    for bucket in objects(map, names) {
        let Some(raw_day) = text(bucket, BUCKET_DAY) else {
            debug!("ignoring activity bucket without a weekday");
            continue;
        };
        let Ok(day) = raw_day.trim().parse::<Weekday>() else {
            debug!(day = raw_day, "ignoring activity bucket with unknown weekday");
            continue;
        };
        if let Some(idx) = WEEKDAYS.iter().position(|d| *d == day) {
            let sessions = number(bucket, BUCKET_SESSIONS).map(count).unwrap_or(0);
            let minutes = number(bucket, BUCKET_MINUTES).map(count).unwrap_or(0);
            buckets[idx].sessions = buckets[idx].sessions.saturating_add(sessions);
            buckets[idx].minutes = buckets[idx].minutes.saturating_add(minutes);
        }
    }
    buckets
}

fn sum(values: impl Iterator<Item = u32>) -> u32 {
    values.fold(0, u32::saturating_add)
}

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    let day = raw.get(..10).unwrap_or(raw);
    match NaiveDate::parse_from_str(day, "%Y-%m-%d") {
        Ok(date) => Some(date),
        Err(_) => {
            debug!(date = raw, "ignoring heatmap entry with unparseable date");
            None
        }
    }
}

fn count(value: f64) -> u32 {
    if value.is_finite() && value > 0.0 {
        value.round().min(f64::from(u32::MAX)) as u32
    } else {
        0
    }
}

fn kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
