use crate::models::TimeEntry;
use crate::status::{day_of, week_monday};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::Serialize;
use std::collections::HashMap;
use tracing::warn;

/// Один календарный день timesheet-недели.
#[derive(Debug, Clone, Serialize)]
pub struct DayBucket {
    pub date: NaiveDate,
    pub total_seconds: u64,
    pub entries: Vec<TimeEntry>,
}

/// Неделя timesheet: 7 дней начиная с понедельника.
/// Инвариант: total_seconds == сумма total_seconds по дням, всегда точно.
#[derive(Debug, Clone, Serialize)]
pub struct WeekBucket {
    pub week_start: NaiveDate,
    pub days: Vec<DayBucket>,
    pub total_seconds: u64,
    pub billable_seconds: u64,
    pub project_totals: HashMap<String, u64>,
}

/// Понедельник недели с заданным смещением от "сейчас": 0 = текущая неделя,
/// -1 = прошлая, +1 = следующая. Чистая функция, offset нигде не хранится.
pub fn week_start_for_offset(now: DateTime<Utc>, offset: i64) -> NaiveDate {
    week_monday(day_of(now)) + Duration::days(offset * 7)
}

/// Собрать недельный timesheet.
///
/// Запись попадает в день, на который приходится её start_time — целиком.
/// Запись через полночь не делится между днями (никакая секунда не
/// считается дважды). Закрытая запись: duration = end - start; открытая
/// (end_time = None, живой таймер): duration = now - start, пересчитывается
/// на каждом вызове. Записи вне недели игнорируются.
pub fn build_week(entries: &[TimeEntry], week_start: NaiveDate, now: DateTime<Utc>) -> WeekBucket {
    let mut days: Vec<DayBucket> = (0..7)
        .map(|i| DayBucket {
            date: week_start + Duration::days(i),
            total_seconds: 0,
            entries: Vec::new(),
        })
        .collect();
    let mut billable_seconds: u64 = 0;
    let mut project_totals: HashMap<String, u64> = HashMap::new();

    for entry in entries {
        let entry_day = day_of(entry.start_time);
        let idx = (entry_day - week_start).num_days();
        if !(0..7).contains(&idx) {
            continue; // запись вне запрошенной недели
        }

        let seconds = entry_duration_seconds(entry, now);
        let day = &mut days[idx as usize];
        day.total_seconds = day.total_seconds.saturating_add(seconds);
        if entry.billable {
            billable_seconds = billable_seconds.saturating_add(seconds);
        }
        let project = project_totals.entry(entry.project_id.clone()).or_insert(0);
        *project = project.saturating_add(seconds);
        day.entries.push(entry.clone());
    }

    let total_seconds = days
        .iter()
        .fold(0u64, |acc, d| acc.saturating_add(d.total_seconds));

    WeekBucket {
        week_start,
        days,
        total_seconds,
        billable_seconds,
        project_totals,
    }
}

/// Длительность записи в секундах. Отрицательный интервал (битые данные
/// или перевод часов) усекается до 0 с предупреждением.
pub fn entry_duration_seconds(entry: &TimeEntry, now: DateTime<Utc>) -> u64 {
    let end = entry.end_time.unwrap_or(now);
    let seconds = (end - entry.start_time).num_seconds();
    if seconds < 0 {
        warn!(
            "[TIMESHEET] Entry '{}' has negative duration ({}s), clamping to 0",
            entry.id, seconds
        );
        return 0;
    }
    seconds as u64
}

/// "HH:MM:SS" для tray/UI. Часы не ограничены 24 (недельные суммы).
pub fn format_elapsed(total_seconds: u64) -> String {
    let hours = total_seconds / 3600;
    let minutes = (total_seconds % 3600) / 60;
    let seconds = total_seconds % 60;
    format!("{:02}:{:02}:{:02}", hours, minutes, seconds)
}
