use crate::models::TaskStatus;
use chrono::{DateTime, Datelike, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Срочность задачи относительно "сейчас".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UrgencyStatus {
    Completed,
    Overdue,
    DueToday,
    DueSoon,
    OnTrack,
    None,
}

/// Окно "скоро дедлайн": [now, now + 3 дня] включительно.
const DUE_SOON_WINDOW_DAYS: i64 = 3;

/// Классификация задачи по дедлайну. Чистая функция: одинаковые аргументы —
/// одинаковый результат, никаких side effects.
///
/// Порядок проверок важен: `done` перекрывает всё (завершённая задача никогда
/// не overdue), дальше отсутствие дедлайна, дальше календарные полосы.
pub fn classify_due(
    due: Option<DateTime<Utc>>,
    status: TaskStatus,
    now: DateTime<Utc>,
) -> UrgencyStatus {
    if status == TaskStatus::Done {
        return UrgencyStatus::Completed;
    }
    let due = match due {
        Some(due) => due,
        None => return UrgencyStatus::None,
    };
    if due < now {
        return UrgencyStatus::Overdue;
    }
    if day_of(due) == day_of(now) {
        return UrgencyStatus::DueToday;
    }
    if due <= now + Duration::days(DUE_SOON_WINDOW_DAYS) {
        return UrgencyStatus::DueSoon;
    }
    UrgencyStatus::OnTrack
}

/// Человекочитаемая метка дедлайна относительно "сейчас".
///
/// Полосы независимы от classify_due: прошлое — минуты/часы/дни/недели/месяцы,
/// будущее — минуты/"today"/"tomorrow"/дни/абсолютная короткая дата. Каждая
/// полоса переключается на более грубую единицу до того, как мелкая вышла бы
/// за диапазон (никогда не показываем "Overdue by 90m").
/// Время суток показываем только если у дедлайна есть явный time component.
pub fn format_due_label(due: DateTime<Utc>, has_due_time: bool, now: DateTime<Utc>) -> String {
    if due < now {
        return format_overdue_label(now - due);
    }

    let ahead = due - now;
    let minutes = ahead.num_minutes();
    if minutes < 60 {
        return format!("Due in {}m", minutes.max(1));
    }

    let today = day_of(now);
    let due_day = day_of(due);
    if due_day == today {
        return if has_due_time {
            format!("Due today at {}", due.format("%H:%M"))
        } else {
            "Due today".to_string()
        };
    }
    if due_day == today + Duration::days(1) {
        return if has_due_time {
            format!("Due tomorrow at {}", due.format("%H:%M"))
        } else {
            "Due tomorrow".to_string()
        };
    }

    // Полоса "in N days" — только для дедлайнов с явным временем; дата без
    // времени дальше завтра показывается абсолютной короткой датой
    let day_delta = (due_day - today).num_days();
    if has_due_time && day_delta < 7 {
        return format!("Due in {} days", day_delta);
    }

    format!("Due {} {}", due.format("%b"), due.day())
}

fn format_overdue_label(behind: Duration) -> String {
    let minutes = behind.num_minutes();
    if minutes < 60 {
        return format!("Overdue by {}m", minutes.max(1));
    }
    let hours = behind.num_hours();
    if hours < 24 {
        return format!("Overdue by {}h", hours);
    }
    let days = behind.num_days();
    if days == 1 {
        return "Overdue by 1 day".to_string();
    }
    if days < 7 {
        return format!("Overdue by {} days", days);
    }
    if days < 30 {
        let weeks = ((days as f64) / 7.0).round().max(1.0) as i64;
        return if weeks == 1 {
            "Overdue by 1 week".to_string()
        } else {
            format!("Overdue by {} weeks", weeks)
        };
    }
    let months = ((days as f64) / 30.0).round().max(1.0) as i64;
    if months == 1 {
        "Overdue by 1 month".to_string()
    } else {
        format!("Overdue by {} months", months)
    }
}

/// Календарная дата момента. Один helper для классификатора, bucket'ов и
/// timesheet — чтобы "тот же день" везде означал одно и то же.
pub(crate) fn day_of(dt: DateTime<Utc>) -> NaiveDate {
    dt.date_naive()
}

/// Понедельник недели, в которую попадает дата.
pub(crate) fn week_monday(date: NaiveDate) -> NaiveDate {
    date - Duration::days(i64::from(date.weekday().num_days_from_monday()))
}
