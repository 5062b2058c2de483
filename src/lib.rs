use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

mod buckets;
mod clock;
mod engine;
mod models;
mod notifications;
mod status;
mod store;
mod ticker;
mod timesheet;

pub use buckets::{group_by_due, DueBuckets};
pub use clock::{Clock, ManualClock, SystemClock};
pub use engine::{
    ClosedSession, StartOutcome, StartTimer, TimerEngine, TimerStateForAPI, TimerStateResponse,
};
pub use models::{
    parse_notification, parse_task_snapshot, parse_time_entries, Notification,
    NotificationSummary, Task, TaskStatus, TimeEntry,
};
pub use notifications::{NotificationCenter, NotificationSnapshot};
pub use status::{classify_due, format_due_label, UrgencyStatus};
pub use store::{ActiveTimerRecord, Database, MemoryTimerStore, TimerStore};
pub use ticker::{Ticker, TickerSpec};
pub use timesheet::{build_week, format_elapsed, week_start_for_offset, DayBucket, WeekBucket};


/// Период секундного тикера (elapsed активного таймера)
const FINE_TICK_PERIOD: Duration = Duration::from_secs(1);
/// Период грубого тикера (пересчёт статусов/меток для отображения, poll)
const COARSE_TICK_PERIOD: Duration = Duration::from_secs(60);
/// Период фонового сохранения состояния таймера
const PERIODIC_SAVE_PERIOD: Duration = Duration::from_secs(30);
/// Джиттер первого poll-тика: клиенты не должны бить по серверу хором
const COARSE_STARTUP_JITTER: Duration = Duration::from_secs(3);

/// Инициализация логирования: по умолчанию info (если RUST_LOG не задан),
/// чтобы [TIMER]/[RECOVERY]/[NOTIF] были видны
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();
}

/// Собранное ядро: таймер + уведомления + стандартные тикеры.
/// Владелец один; тикеры отменяются детерминированно в shutdown()/Drop —
/// поздний тик не может оживить устаревшее Running после stop().
pub struct Core {
    pub engine: Arc<TimerEngine>,
    pub notifications: Arc<NotificationCenter>,
    clock: Arc<dyn Clock>,
    tickers: Vec<Ticker>,
}

impl Core {
    /// Создать ядро. store = None — без персистентности (тесты/fallback);
    /// с хранилищем таймер восстанавливается сразу, elapsed пересчитывается
    /// от сохранённого started_at.
    pub fn new(clock: Arc<dyn Clock>, store: Option<Arc<dyn TimerStore>>) -> Self {
        let engine = match store {
            Some(store) => Arc::new(TimerEngine::with_store(clock.clone(), store)),
            None => Arc::new(TimerEngine::new(clock.clone())),
        };
        Self {
            engine,
            notifications: Arc::new(NotificationCenter::new()),
            clock,
            tickers: Vec::new(),
        }
    }

    pub fn now(&self) -> chrono::DateTime<chrono::Utc> {
        self.clock.now()
    }

    /// Запустить стандартные тикеры:
    /// - секундный: elapsed активного таймера → on_timer_tick (только Running);
    /// - минутный: сигнал пересчёта статусов/poll → on_refresh_tick;
    /// - 30-секундный: фоновое сохранение состояния таймера, чтобы force
    ///   quit терял максимум метаданные одного периода (сам elapsed
    ///   выводится из started_at и не теряется в любом случае).
    pub fn start_standard_tickers<T, R>(&mut self, on_timer_tick: T, on_refresh_tick: R)
    where
        T: FnMut(TimerStateResponse) + Send + 'static,
        R: FnMut() + Send + 'static,
    {
        if !self.tickers.is_empty() {
            warn!("[CORE] Tickers already started, ignoring duplicate call");
            return;
        }

        let engine_for_emit = self.engine.clone();
        let mut on_timer_tick = on_timer_tick;
        let mut fine = TickerSpec::new("timer-emit", FINE_TICK_PERIOD);
        fine.align_to_second = true;
        self.tickers.push(Ticker::spawn(fine, move || {
            match engine_for_emit.elapsed_state() {
                Ok(state) => {
                    if matches!(state.state, TimerStateForAPI::Running { .. }) {
                        on_timer_tick(state);
                    }
                }
                Err(e) => warn!("[TIMER] Failed to read state on tick: {}", e),
            }
        }));

        let mut coarse = TickerSpec::new("status-refresh", COARSE_TICK_PERIOD);
        coarse.startup_jitter = Some(COARSE_STARTUP_JITTER);
        self.tickers.push(Ticker::spawn(coarse, on_refresh_tick));

        let engine_for_save = self.engine.clone();
        self.tickers.push(Ticker::spawn(
            TickerSpec::new("periodic-save", PERIODIC_SAVE_PERIOD),
            move || {
                if let Err(e) = engine_for_save.save_state() {
                    warn!("[TIMER] Failed to save state periodically: {}", e);
                } else {
                    debug!("[TIMER] State saved periodically");
                }
            },
        ));
    }

    /// Остановка ядра: сначала отменяем тикеры, потом сохраняем состояние —
    /// порядок важен, поздний тик не должен перезаписать сохранённое.
    pub fn shutdown(&mut self) {
        for ticker in self.tickers.drain(..) {
            ticker.cancel();
        }
        if let Err(e) = self.engine.save_state() {
            error!("[SHUTDOWN] Failed to save timer state on shutdown: {}", e);
        } else {
            info!("[SHUTDOWN] Timer state saved successfully on shutdown");
        }
    }
}

impl Drop for Core {
    fn drop(&mut self) {
        self.shutdown();
    }
}
