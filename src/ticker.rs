use scopeguard::guard;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info};

/// Параметры повторяющегося тикера.
#[derive(Debug, Clone)]
pub struct TickerSpec {
    pub name: &'static str,
    pub period: Duration,
    /// Первый тик на границе системной секунды (12:00:00.000, не .500) —
    /// для секундного таймера, чтобы цифры в UI щёлкали ровно
    pub align_to_second: bool,
    /// Случайная задержка перед первым тиком (poll-тикеры не должны бить по
    /// серверу одновременно со всех клиентов после старта/wake)
    pub startup_jitter: Option<Duration>,
}

impl TickerSpec {
    pub fn new(name: &'static str, period: Duration) -> Self {
        Self {
            name,
            period,
            align_to_second: false,
            startup_jitter: None,
        }
    }
}

/// Отменяемый повторяющийся тикер. Замена setInterval: точка подвеса и
/// отмена видны в типе, а не спрятаны в замыканиях.
///
/// cancel() выставляет флаг синхронно; цикл проверяет его на каждом тике и
/// не вызывает callback после отмены. Drop тоже отменяет — тикер не
/// утекает при пересоздании владельца.
pub struct Ticker {
    name: &'static str,
    cancelled: Arc<AtomicBool>,
}

impl Ticker {
    /// Запустить тикер на выделенном потоке со своим runtime.
    /// Если runtime создать не удалось — логируем и деградируем без паники
    /// (приложение продолжит работу без этого тикера).
    pub fn spawn<F>(spec: TickerSpec, mut f: F) -> Self
    where
        F: FnMut() + Send + 'static,
    {
        let cancelled = Arc::new(AtomicBool::new(false));
        let cancelled_for_loop = cancelled.clone();
        let name = spec.name;

        std::thread::spawn(move || {
            let rt = match tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    error!(
                        "[TICKER] Failed to create runtime for '{}': {}. Ticker disabled.",
                        name, e
                    );
                    return;
                }
            };

            // Логируем выход из цикла даже при панике в callback
            let _exit_guard = guard((), |_| {
                debug!("[TICKER] '{}' loop exited", name);
            });

            rt.block_on(async {
                if let Some(jitter_cap) = spec.startup_jitter {
                    let cap_ms = jitter_cap.as_millis().max(1) as u64;
                    let jitter_ms = rand::random::<u64>() % cap_ms;
                    tokio::time::sleep(Duration::from_millis(jitter_ms)).await;
                }

                // Микро-синхронизация: первый тик — на границе системной секунды
                if spec.align_to_second {
                    if let Ok(now) = std::time::SystemTime::now().duration_since(UNIX_EPOCH) {
                        let now_ms = now.as_millis();
                        let next_sec_ms = (now_ms / 1000 + 1) * 1000;
                        let delay_ms = (next_sec_ms - now_ms).min(999);
                        if delay_ms > 0 {
                            tokio::time::sleep(Duration::from_millis(delay_ms as u64)).await;
                        }
                    }
                }

                let mut interval = tokio::time::interval(spec.period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
                // Первый tick() у tokio срабатывает сразу — пропускаем его,
                // период отсчитывается от запуска
                interval.tick().await;

                loop {
                    interval.tick().await;
                    if cancelled_for_loop.load(Ordering::SeqCst) {
                        break;
                    }
                    f();
                }
            });
        });

        info!(
            "[TICKER] '{}' started: period={:?}, align_to_second={}",
            spec.name, spec.period, spec.align_to_second
        );

        Self { name, cancelled }
    }

    /// Отменить тикер. После возврата callback больше не будет вызван для
    /// новых тиков (уже выполняющийся вызов довершится).
    pub fn cancel(&self) {
        if !self.cancelled.swap(true, Ordering::SeqCst) {
            info!("[TICKER] '{}' cancelled", self.name);
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        self.cancel();
    }
}
