use crate::engine::{
    ClosedSession, StartOutcome, StartTimer, TimerEngine, TimerState, TimerStateForAPI,
    TimerStateResponse,
};
use crate::timesheet::format_elapsed;
use std::time::Instant;
use tracing::{info, warn};

impl TimerEngine {
    /// Переход: Idle → Running, или Running → Running (новая запись).
    /// Атомарная операция - один mutex lock на весь переход.
    ///
    /// Если таймер уже шёл, старая сессия закрывается моментом "сейчас" и
    /// возвращается в StartOutcome.closed — вызывающий код коммитит её как
    /// закрытый TimeEntry. Молчаливая замена запрещена: это потеря времени.
    pub fn start(&self, request: StartTimer) -> Result<StartOutcome, String> {
        let now_ms = self.clock.now_ms();
        let now_instant = Instant::now();

        let closed = {
            let mut state = self
                .state
                .lock()
                .map_err(|e| format!("Mutex poisoned: {}", e))?;

            let closed = match &*state {
                TimerState::Idle => None,
                TimerState::Running {
                    entry_id,
                    project_id,
                    description,
                    billable,
                    started_at_ms,
                    ..
                } => {
                    // Допустимый переход: Running → Running (с закрытием старой сессии)
                    info!(
                        "[FSM] start() over running timer: closing session for entry '{}' \
                         before starting '{}'",
                        entry_id, request.entry_id
                    );
                    Some(close_session(
                        entry_id,
                        project_id,
                        description,
                        *billable,
                        *started_at_ms,
                        now_ms,
                    ))
                }
            };

            *state = TimerState::Running {
                entry_id: request.entry_id.clone(),
                project_id: request.project_id.clone(),
                description: request.description.clone(),
                billable: request.billable,
                started_at_ms: now_ms,
                started_at_instant: now_instant,
            };
            closed
        }; // Lock освобождается до сохранения

        // Сохраняем новое состояние в хранилище до возврата.
        // Err отсюда означает "таймер идёт, но не сохранён": переход уже
        // совершён, вызывающий код показывает ошибку персистентности, а
        // периодический save-тикер досохранит при живом хранилище.
        self.save_state()?;

        Ok(StartOutcome { closed })
    }

    /// Переход: Running → Idle.
    /// Возвращает закрытую сессию; конвертация в TimeEntry с endTime = now —
    /// ответственность вызывающего кода.
    pub fn stop(&self) -> Result<ClosedSession, String> {
        let now_ms = self.clock.now_ms();

        let closed = {
            let mut state = self
                .state
                .lock()
                .map_err(|e| format!("Mutex poisoned: {}", e))?;

            let closed = match &*state {
                TimerState::Running {
                    entry_id,
                    project_id,
                    description,
                    billable,
                    started_at_ms,
                    ..
                } => close_session(
                    entry_id,
                    project_id,
                    description,
                    *billable,
                    *started_at_ms,
                    now_ms,
                ),
                TimerState::Idle => {
                    // Недопустимый переход: Idle → Idle
                    warn!("[FSM] Invalid transition: Idle → Idle (no timer running)");
                    return Err("No timer is running".to_string());
                }
            };
            *state = TimerState::Idle;
            closed
        }; // Lock освобождается до очистки хранилища

        self.clear_persisted()?;

        Ok(closed)
    }

    /// Переход: Running → Idle без закрытой сессии (затреканное время
    /// выбрасывается по явному запросу пользователя).
    pub fn discard(&self) -> Result<(), String> {
        {
            let mut state = self
                .state
                .lock()
                .map_err(|e| format!("Mutex poisoned: {}", e))?;

            match &*state {
                TimerState::Running { entry_id, .. } => {
                    info!("[FSM] Discarding running session for entry '{}'", entry_id);
                }
                TimerState::Idle => {
                    warn!("[FSM] Invalid transition: Idle → Idle (nothing to discard)");
                    return Err("No timer is running".to_string());
                }
            }
            *state = TimerState::Idle;
        }

        self.clear_persisted()?;
        Ok(())
    }

    /// Получить текущее состояние таймера.
    ///
    /// elapsed = min(wall, monotonic): wall clock — то, что видит пользователь
    /// (и что переживает рестарт), monotonic ограничивает при подвисании
    /// системы и TSC drift. Всегда пересчитывается, никогда не читается из
    /// сохранённого счётчика — поэтому перезагрузка не даёт дрейфа.
    pub fn elapsed_state(&self) -> Result<TimerStateResponse, String> {
        let state = self
            .state
            .lock()
            .map_err(|e| format!("Mutex poisoned: {}", e))?;

        let response = match &*state {
            TimerState::Idle => TimerStateResponse {
                state: TimerStateForAPI::Idle,
                elapsed_seconds: 0,
                elapsed_hms: format_elapsed(0),
                session_start_ms: None,
            },
            TimerState::Running {
                entry_id,
                project_id,
                billable,
                started_at_ms,
                started_at_instant,
                ..
            } => {
                let elapsed = self.compute_elapsed_seconds(*started_at_ms, *started_at_instant);
                TimerStateResponse {
                    state: TimerStateForAPI::Running {
                        entry_id: entry_id.clone(),
                        project_id: project_id.clone(),
                        billable: *billable,
                        started_at_ms: *started_at_ms,
                    },
                    elapsed_seconds: elapsed,
                    elapsed_hms: format_elapsed(elapsed),
                    session_start_ms: Some(*started_at_ms),
                }
            }
        };

        Ok(response)
    }

    /// Монотонная ветка читает `Instant` напрямую, мимо Clock: монотонное
    /// время не инжектируется. С ручными часами min() ограничивает elapsed
    /// реальным прошедшим временем, если started_at_instant не backdate'нут
    /// (restore его backdate'ит).
    pub(crate) fn compute_elapsed_seconds(
        &self,
        started_at_ms: i64,
        started_at_instant: Instant,
    ) -> u64 {
        let now_ms = self.clock.now_ms();
        let wall_elapsed = ((now_ms - started_at_ms).max(0) / 1000) as u64;
        let monotonic_elapsed = started_at_instant.elapsed().as_secs();
        wall_elapsed.min(monotonic_elapsed)
    }
}

fn close_session(
    entry_id: &str,
    project_id: &str,
    description: &str,
    billable: bool,
    started_at_ms: i64,
    ended_at_ms: i64,
) -> ClosedSession {
    ClosedSession {
        entry_id: entry_id.to_string(),
        project_id: project_id.to_string(),
        description: description.to_string(),
        billable,
        started_at_ms,
        ended_at_ms,
        duration_seconds: ((ended_at_ms - started_at_ms).max(0) / 1000) as u64,
    }
}
