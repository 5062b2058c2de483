use crate::clock::Clock;
use crate::store::TimerStore;
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};
use std::time::Instant;

mod core;
mod db;

/// Timer Engine - строгая FSM активного таймера
/// Все переходы атомарны через один Mutex; ровно один Running на пользователя
pub struct TimerEngine {
    /// Состояние FSM - единственный источник истины
    /// Внутри Running хранится started_at_instant
    pub(crate) state: Arc<Mutex<TimerState>>,
    /// Порт персистентности (sqlite / память); None = без сохранения
    pub(crate) store: Option<Arc<dyn TimerStore>>,
    /// Источник времени (инжектируется для тестов)
    pub(crate) clock: Arc<dyn Clock>,
}

/// Состояние таймера - строгая FSM
/// Невозможные состояния физически невозможны
#[derive(Debug, Clone)]
pub enum TimerState {
    /// Таймер не идёт
    Idle,
    /// Таймер идёт для одной записи времени
    Running {
        entry_id: String,
        project_id: String,
        description: String,
        billable: bool,
        started_at_ms: i64,          // Wall-clock (миллисекунды) для API и персистентности
        started_at_instant: Instant, // Монотонное время (для расчётов)
    },
}

/// Запрос на старт таймера (кто/для чего)
#[derive(Debug, Clone, Deserialize)]
pub struct StartTimer {
    pub entry_id: String,
    pub project_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub billable: bool,
}

/// Закрытая сессия таймера. Возвращается из stop() и из start() поверх
/// Running — вызывающий код обязан сконвертировать её в закрытый TimeEntry.
/// Ядро никогда молча не выбрасывает затреканное время.
#[derive(Debug, Clone, Serialize)]
pub struct ClosedSession {
    pub entry_id: String,
    pub project_id: String,
    pub description: String,
    pub billable: bool,
    pub started_at_ms: i64,
    pub ended_at_ms: i64,
    pub duration_seconds: u64,
}

/// Результат start(): если таймер уже шёл, предыдущая сессия закрыта и
/// возвращена здесь.
#[derive(Debug, Clone, Serialize)]
pub struct StartOutcome {
    pub closed: Option<ClosedSession>,
}

/// Ответ для API - упрощенная версия состояния (без Instant)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimerStateResponse {
    #[serde(flatten)]
    pub state: TimerStateForAPI,
    /// Всегда пересчитан от started_at; сохранённый счётчик — кэш, не истина
    pub elapsed_seconds: u64,
    /// "HH:MM:SS" для tray/заголовка
    pub elapsed_hms: String,
    pub session_start_ms: Option<i64>, // только для Running
}

/// Упрощенная версия TimerState для API (без Instant)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(tag = "state")]
pub enum TimerStateForAPI {
    Idle,
    Running {
        entry_id: String,
        project_id: String,
        billable: bool,
        started_at_ms: i64,
    },
}

impl TimerEngine {
    /// Создать новый TimerEngine без персистентности (для тестов или fallback)
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(TimerState::Idle)),
            store: None,
            clock,
        }
    }
}
