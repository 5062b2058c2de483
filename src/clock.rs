use chrono::{DateTime, Utc};
use std::sync::Mutex;

/// Источник текущего времени. Все компоненты ядра получают "сейчас" только
/// через этот trait — это единственный способ детерминированно тестировать
/// классификацию, агрегацию и восстановление таймера.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Wall-clock в миллисекундах (для персистентности и API)
    fn now_ms(&self) -> i64 {
        self.now().timestamp_millis()
    }
}

/// Системные часы — production реализация.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Ручные часы для тестов: время меняется только явными вызовами.
/// Mutex вместо Cell, чтобы часы можно было шарить между потоками (тикеры).
pub struct ManualClock {
    now_ms: Mutex<i64>,
}

impl ManualClock {
    pub fn at(now: DateTime<Utc>) -> Self {
        Self {
            now_ms: Mutex::new(now.timestamp_millis()),
        }
    }

    pub fn set(&self, now: DateTime<Utc>) {
        if let Ok(mut ms) = self.now_ms.lock() {
            *ms = now.timestamp_millis();
        }
    }

    pub fn advance_secs(&self, secs: i64) {
        if let Ok(mut ms) = self.now_ms.lock() {
            *ms += secs * 1000;
        }
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        let ms = self.now_ms.lock().map(|v| *v).unwrap_or(0);
        DateTime::<Utc>::from_timestamp_millis(ms).unwrap_or_else(Utc::now)
    }
}
