use crate::clock::Clock;
use crate::engine::{TimerEngine, TimerState};
use crate::store::{ActiveTimerRecord, TimerStore};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tracing::{error, info, warn};

/// Гэп больше суток при восстановлении = почти наверняка clock skew или
/// мусор в хранилище, а не честно идущий таймер.
const MAX_REASONABLE_RESUME_GAP_SECS: i64 = 24 * 60 * 60;

impl TimerEngine {
    /// Инициализация с хранилищем + восстановление состояния после рестарта
    pub fn with_store(clock: Arc<dyn Clock>, store: Arc<dyn TimerStore>) -> Self {
        let engine = Self {
            state: Arc::new(Mutex::new(TimerState::Idle)),
            store: Some(store),
            clock,
        };

        // Восстанавливаем состояние из хранилища
        if let Err(e) = engine.restore_state() {
            error!("[TIMER] Failed to restore state from store: {}", e);
        }

        engine
    }

    /// Сохранить состояние в хранилище.
    /// Публичный метод для явного сохранения (периодический тикер, shutdown).
    pub fn save_state(&self) -> Result<(), String> {
        let store = match &self.store {
            Some(store) => store,
            None => return Ok(()), // Нет хранилища - пропускаем
        };

        let record = {
            let state = self
                .state
                .lock()
                .map_err(|e| format!("Mutex poisoned: {}", e))?;
            match &*state {
                TimerState::Idle => None,
                TimerState::Running {
                    entry_id,
                    project_id,
                    description,
                    billable,
                    started_at_ms,
                    ..
                } => Some(ActiveTimerRecord {
                    entry_id: entry_id.clone(),
                    project_id: project_id.clone(),
                    description: description.clone(),
                    billable: *billable,
                    started_at_ms: *started_at_ms,
                }),
            }
        }; // Lock освобождается до обращения к хранилищу

        match record {
            // Существование записи = Running, отсутствие = Idle
            Some(record) => store.save_active_timer(&record),
            None => store.clear_active_timer(),
        }
    }

    /// Очистить персистентную запись (после stop/discard)
    pub(crate) fn clear_persisted(&self) -> Result<(), String> {
        match &self.store {
            Some(store) => store.clear_active_timer(),
            None => Ok(()),
        }
    }

    /// Восстановить состояние из хранилища (вызывается один раз при старте).
    ///
    /// elapsed пересчитывается от сохранённого started_at — сохранённому
    /// счётчику доверять нельзя, процесс мог быть в suspend. Битая или
    /// подозрительная запись отбрасывается, состояние = Idle.
    /// GUARD: НИКОГДА не крашиться на ошибке восстановления.
    fn restore_state(&self) -> Result<(), String> {
        let store = match &self.store {
            Some(store) => store,
            None => {
                info!("[RECOVERY] No store available, starting with default state");
                return Ok(());
            }
        };

        let record = match store.load_active_timer() {
            Ok(Some(record)) => record,
            Ok(None) => {
                // Нет сохранённой записи - это нормально (Idle)
                info!("[RECOVERY] No active timer record found, starting idle");
                return Ok(());
            }
            Err(e) => {
                // GUARD: НИКОГДА не крашиться на ошибке восстановления
                error!(
                    "[RECOVERY] Failed to load active timer: {}. Starting with default state.",
                    e
                );
                return Ok(());
            }
        };

        let now_ms = self.clock.now_ms();
        let elapsed_secs = (now_ms - record.started_at_ms) / 1000;

        // Clock skew detection: started_at в будущем = часы переведены назад
        if elapsed_secs < 0 {
            warn!(
                "[RECOVERY] Clock skew detected: started_at_ms ({}) > now_ms ({}). \
                 Discarding record, timer resets to idle.",
                record.started_at_ms, now_ms
            );
            if let Err(e) = store.clear_active_timer() {
                warn!("[RECOVERY] Failed to clear skewed record: {}", e);
            }
            return Ok(());
        }

        // Нереалистично большой гэп (> 24 часов) = вероятный clock skew
        if elapsed_secs > MAX_REASONABLE_RESUME_GAP_SECS {
            warn!(
                "[RECOVERY] Unrealistic time gap: {}s ({} hours). Possible clock skew. \
                 Discarding record, timer resets to idle.",
                elapsed_secs,
                elapsed_secs / 3600
            );
            if let Err(e) = store.clear_active_timer() {
                warn!("[RECOVERY] Failed to clear stale record: {}", e);
            }
            return Ok(());
        }

        // Backdate монотонного старта, чтобы wall и monotonic сходились.
        // checked_sub: uptime системы может быть меньше elapsed.
        let started_at_instant = Instant::now()
            .checked_sub(Duration::from_secs(elapsed_secs as u64))
            .unwrap_or_else(|| {
                warn!(
                    "[RECOVERY] Cannot backdate monotonic start by {}s, using now",
                    elapsed_secs
                );
                Instant::now()
            });

        match self.state.lock() {
            Ok(mut state) => {
                *state = TimerState::Running {
                    entry_id: record.entry_id.clone(),
                    project_id: record.project_id.clone(),
                    description: record.description.clone(),
                    billable: record.billable,
                    started_at_ms: record.started_at_ms,
                    started_at_instant,
                };
            }
            Err(e) => {
                error!(
                    "[RECOVERY] Mutex poisoned for state: {}. Using default (Idle).",
                    e
                );
                return Ok(());
            }
        }

        info!(
            "[RECOVERY] Resumed running timer: entry='{}', elapsed_since_start={}s",
            record.entry_id, elapsed_secs
        );
        Ok(())
    }
}
