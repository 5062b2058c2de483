use rusqlite::{params, Connection, Result as SqliteResult};
use std::sync::{Arc, Mutex};
use tracing::{error, info, warn};

/// Персистентная запись активного таймера. Существование записи = RUNNING,
/// отсутствие = IDLE. Ровно одна запись на пользователя.
///
/// started_at_ms хранится строкой: при загрузке нечитаемое значение
/// отбрасывается вместе с записью, а не роняет restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActiveTimerRecord {
    pub entry_id: String,
    pub project_id: String,
    pub description: String,
    pub billable: bool,
    pub started_at_ms: i64,
}

/// Порт персистентности активного таймера. Одна и та же state machine
/// работает поверх sqlite, файла или строки в БД — ядру всё равно.
pub trait TimerStore: Send + Sync {
    fn load_active_timer(&self) -> Result<Option<ActiveTimerRecord>, String>;
    fn save_active_timer(&self, record: &ActiveTimerRecord) -> Result<(), String>;
    fn clear_active_timer(&self) -> Result<(), String>;
}

/// Log IO-related DB errors for easier diagnosis (disk full, permission denied).
/// Does not change error propagation — caller still returns Err.
fn log_io_error_if_any(context: &str, e: &rusqlite::Error) {
    use rusqlite::ffi::ErrorCode;
    if let rusqlite::Error::SqliteFailure(ffi_err, _) = e {
        match ffi_err.code {
            ErrorCode::DiskFull => {
                error!(
                    "[DB] {}: Disk full. Free space on drive or check app data directory.",
                    context
                );
            }
            ErrorCode::ReadOnly | ErrorCode::CannotOpen => {
                error!(
                    "[DB] {}: Permission denied or read-only. Check app data directory is writable.",
                    context
                );
            }
            ErrorCode::SystemIoFailure => {
                error!("[DB] {}: I/O error. Check disk and permissions.", context);
            }
            _ => {}
        }
    }
}

/// Менеджер базы данных (sqlite реализация TimerStore)
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    pub fn new(db_path: &str) -> SqliteResult<Self> {
        let conn = Connection::open(db_path)?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// In-memory база для тестов
    pub fn new_in_memory() -> SqliteResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn init_schema(conn: &Connection) -> SqliteResult<()> {
        // WAL: переживает force quit лучше, чем rollback journal
        if let Err(e) = conn.pragma_update(None, "journal_mode", "WAL") {
            warn!("[DB] Failed to enable WAL mode (non-critical): {}", e);
        }
        conn.execute(
            "CREATE TABLE IF NOT EXISTS active_timer (
                id INTEGER PRIMARY KEY CHECK (id = 1),
                entry_id TEXT NOT NULL,
                project_id TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                billable INTEGER NOT NULL DEFAULT 0,
                started_at_ms TEXT NOT NULL,
                updated_at_ms INTEGER NOT NULL
            )",
            [],
        )?;
        Ok(())
    }

    /// Безопасная блокировка соединения с обработкой poisoned mutex
    /// Обрабатывает случай, когда mutex был poisoned (panic в другом потоке)
    fn lock_conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>, String> {
        self.conn.lock().map_err(|e| {
            format!(
                "Database mutex poisoned: {}. A panic occurred while holding the lock. \
                 Please restart the application to recover.",
                e
            )
        })
    }
}

#[cfg(test)]
impl Database {
    /// Тестовый хук: записать мусор в started_at_ms в обход типизированного
    /// API (проверка устойчивости restore к порче данных)
    pub(crate) fn corrupt_started_at_for_test(&self, raw: &str) -> Result<(), String> {
        let conn = self.lock_conn()?;
        conn.execute(
            "UPDATE active_timer SET started_at_ms = ?1 WHERE id = 1",
            params![raw],
        )
        .map_err(|e| format!("Failed to corrupt record: {}", e))?;
        Ok(())
    }
}

impl TimerStore for Database {
    /// Загрузить запись активного таймера.
    /// GUARD: битый started_at_ms — запись отбрасывается (и подчищается),
    /// возвращается None; restore path никогда не падает из-за мусора в БД.
    fn load_active_timer(&self) -> Result<Option<ActiveTimerRecord>, String> {
        let conn = self.lock_conn()?;
        let row: Option<(String, String, String, bool, String)> = conn
            .query_row(
                "SELECT entry_id, project_id, description, billable, started_at_ms
                 FROM active_timer WHERE id = 1",
                [],
                |row| {
                    Ok((
                        row.get(0)?,
                        row.get(1)?,
                        row.get(2)?,
                        row.get(3)?,
                        row.get(4)?,
                    ))
                },
            )
            .map(Some)
            .or_else(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => Ok(None),
                other => {
                    log_io_error_if_any("load_active_timer", &other);
                    Err(format!("Failed to load active timer: {}", other))
                }
            })?;

        let (entry_id, project_id, description, billable, raw_started_at) = match row {
            Some(r) => r,
            None => return Ok(None),
        };

        let started_at_ms: i64 = match raw_started_at.trim().parse() {
            Ok(ms) => ms,
            Err(e) => {
                warn!(
                    "[RECOVERY] Unparseable started_at_ms '{}' in active_timer: {}. \
                     Discarding record, timer resets to idle.",
                    raw_started_at, e
                );
                drop(conn);
                // Подчищаем мусор, чтобы не спотыкаться о него на каждом старте
                if let Err(clear_e) = self.clear_active_timer() {
                    warn!("[RECOVERY] Failed to clear corrupt record: {}", clear_e);
                }
                return Ok(None);
            }
        };

        Ok(Some(ActiveTimerRecord {
            entry_id,
            project_id,
            description,
            billable,
            started_at_ms,
        }))
    }

    fn save_active_timer(&self, record: &ActiveTimerRecord) -> Result<(), String> {
        let conn = self.lock_conn()?;
        let updated_at_ms = chrono::Utc::now().timestamp_millis();
        conn.execute(
            "INSERT INTO active_timer
                (id, entry_id, project_id, description, billable, started_at_ms, updated_at_ms)
             VALUES (1, ?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(id) DO UPDATE SET
                entry_id = excluded.entry_id,
                project_id = excluded.project_id,
                description = excluded.description,
                billable = excluded.billable,
                started_at_ms = excluded.started_at_ms,
                updated_at_ms = excluded.updated_at_ms",
            params![
                record.entry_id,
                record.project_id,
                record.description,
                record.billable,
                record.started_at_ms.to_string(),
                updated_at_ms,
            ],
        )
        .map_err(|e| {
            log_io_error_if_any("save_active_timer", &e);
            format!("Failed to save active timer: {}", e)
        })?;
        Ok(())
    }

    fn clear_active_timer(&self) -> Result<(), String> {
        let conn = self.lock_conn()?;
        conn.execute("DELETE FROM active_timer WHERE id = 1", [])
            .map_err(|e| {
                log_io_error_if_any("clear_active_timer", &e);
                format!("Failed to clear active timer: {}", e)
            })?;
        Ok(())
    }
}

/// In-memory реализация порта — для тестов и для embedded-режима без диска.
pub struct MemoryTimerStore {
    record: Mutex<Option<ActiveTimerRecord>>,
}

impl MemoryTimerStore {
    pub fn new() -> Self {
        Self {
            record: Mutex::new(None),
        }
    }

    /// Стартовое состояние с уже существующей записью (симуляция рестарта)
    pub fn with_record(record: ActiveTimerRecord) -> Self {
        info!(
            "[DB] MemoryTimerStore seeded with running record for entry '{}'",
            record.entry_id
        );
        Self {
            record: Mutex::new(Some(record)),
        }
    }
}

impl Default for MemoryTimerStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TimerStore for MemoryTimerStore {
    fn load_active_timer(&self) -> Result<Option<ActiveTimerRecord>, String> {
        self.record
            .lock()
            .map(|r| r.clone())
            .map_err(|e| format!("Mutex poisoned: {}", e))
    }

    fn save_active_timer(&self, record: &ActiveTimerRecord) -> Result<(), String> {
        let mut guard = self
            .record
            .lock()
            .map_err(|e| format!("Mutex poisoned: {}", e))?;
        *guard = Some(record.clone());
        Ok(())
    }

    fn clear_active_timer(&self) -> Result<(), String> {
        let mut guard = self
            .record
            .lock()
            .map_err(|e| format!("Mutex poisoned: {}", e))?;
        *guard = None;
        Ok(())
    }
}
