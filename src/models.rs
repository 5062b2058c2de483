use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Статус задачи (приходит из REST snapshot, ядро его не меняет)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Todo,
    InProgress,
    Review,
    Done,
}

/// Снимок задачи из backend task store. Read-only вход для классификации.
/// `due_date` приходит строкой ISO-8601; невалидная строка = нет дедлайна.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, deserialize_with = "lenient_instant")]
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub has_due_time: bool,
    pub status: TaskStatus,
    pub project_id: String,
    #[serde(default)]
    pub assignee: Option<String>,
}

/// Запись времени. `end_time = None` ⇔ запись сейчас идёт.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeEntry {
    pub id: String,
    pub project_id: String,
    #[serde(default)]
    pub task_id: Option<String>,
    pub start_time: DateTime<Utc>,
    #[serde(default)]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub billable: bool,
}

/// Push-уведомление (realtime) или элемент полного resync.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub read: bool,
}

/// Серверный снимок счётчиков дедлайнов. Вторая, независимая реализация той
/// же концепции, что и client-side bucket'ы — они могут транзиентно
/// расходиться, и это нормально (разная видимость задач).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationSummary {
    pub overdue: u32,
    pub due_today: u32,
    pub due_soon: u32,
    pub upcoming: u32,
}

/// Распарсить snapshot задач из REST pull. Ошибка = строка для лога;
/// вызывающий код оставляет прошлый снимок и повторяет на следующем тике.
pub fn parse_task_snapshot(json: &str) -> Result<Vec<Task>, String> {
    serde_json::from_str(json).map_err(|e| format!("Failed to parse task snapshot: {}", e))
}

/// Распарсить записи времени за запрошенную неделю.
pub fn parse_time_entries(json: &str) -> Result<Vec<TimeEntry>, String> {
    serde_json::from_str(json).map_err(|e| format!("Failed to parse time entries: {}", e))
}

/// Распарсить одно push-уведомление.
pub fn parse_notification(json: &str) -> Result<Notification, String> {
    serde_json::from_str(json).map_err(|e| format!("Failed to parse notification: {}", e))
}

/// Мягкий разбор ISO-8601: отсутствующая или кривая дата = None, никогда не
/// ошибка. Snapshot с одной битой датой не должен ронять весь pull.
fn lenient_instant<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.and_then(|s| match DateTime::parse_from_rfc3339(&s) {
        Ok(dt) => Some(dt.with_timezone(&Utc)),
        Err(e) => {
            warn!(
                "[SNAPSHOT] Unparseable due_date '{}': {}. Treating as absent.",
                s, e
            );
            None
        }
    }))
}
