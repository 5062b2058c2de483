use crate::models::{Notification, NotificationSummary};
use serde::Serialize;
use std::sync::Mutex;
use tracing::{debug, warn};

/// Иммутабельный снимок состояния уведомлений. Каждый мутатор возвращает
/// свежий снимок — вызывающий код никогда не видит промежуточное состояние.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NotificationSnapshot {
    pub items: Vec<Notification>,
    pub unread_count: u32,
    pub due_summary: NotificationSummary,
}

/// Process-wide хранилище счётчиков уведомлений и серверного due-date
/// summary. Единственный писатель — логический event thread, но состояние
/// под Mutex, потому что тикеры в этом ядре живут на своих потоках.
///
/// Все операции идемпотентно-безопасны к повторной доставке событий:
/// повторный push того же id — no-op, mark_read/remove не уводят
/// unread_count в минус.
pub struct NotificationCenter {
    inner: Mutex<NotificationSnapshot>,
}

impl NotificationCenter {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(NotificationSnapshot::default()),
        }
    }

    /// Полный resync из pull (initial load или reconnect).
    /// unread_count приходит с сервера и принимается как есть.
    pub fn replace(
        &self,
        items: Vec<Notification>,
        unread_count: u32,
    ) -> Result<NotificationSnapshot, String> {
        let mut inner = self.lock()?;
        inner.items = items;
        inner.unread_count = unread_count;
        debug!(
            "[NOTIF] Replaced from resync: {} items, {} unread",
            inner.items.len(),
            inner.unread_count
        );
        Ok(inner.clone())
    }

    /// Realtime доставка: prepend + unread_count += 1.
    /// Дубликат id (повторная доставка) — no-op.
    pub fn push(&self, item: Notification) -> Result<NotificationSnapshot, String> {
        let mut inner = self.lock()?;
        if inner.items.iter().any(|n| n.id == item.id) {
            warn!("[NOTIF] Duplicate push for id '{}', ignoring", item.id);
            return Ok(inner.clone());
        }
        if !item.read {
            inner.unread_count = inner.unread_count.saturating_add(1);
        }
        inner.items.insert(0, item);
        Ok(inner.clone())
    }

    /// Пометить одно уведомление прочитанным. Неизвестный или уже
    /// прочитанный id — no-op (защита от двойной доставки события).
    pub fn mark_read(&self, id: &str) -> Result<NotificationSnapshot, String> {
        let mut inner = self.lock()?;
        match inner.items.iter_mut().find(|n| n.id == id) {
            Some(item) if !item.read => {
                item.read = true;
                inner.unread_count = inner.unread_count.saturating_sub(1);
            }
            Some(_) => {
                debug!("[NOTIF] mark_read for already-read id '{}', no-op", id);
            }
            None => {
                warn!("[NOTIF] mark_read for unknown id '{}', no-op", id);
            }
        }
        Ok(inner.clone())
    }

    /// Пометить всё прочитанным, unread_count = 0.
    pub fn mark_all_read(&self) -> Result<NotificationSnapshot, String> {
        let mut inner = self.lock()?;
        for item in &mut inner.items {
            item.read = true;
        }
        inner.unread_count = 0;
        Ok(inner.clone())
    }

    /// Удалить уведомление. unread_count уменьшается только если удалённый
    /// элемент был непрочитан — и ровно на этой ветке, больше нигде.
    pub fn remove(&self, id: &str) -> Result<NotificationSnapshot, String> {
        let mut inner = self.lock()?;
        match inner.items.iter().position(|n| n.id == id) {
            Some(pos) => {
                let removed = inner.items.remove(pos);
                if !removed.read {
                    inner.unread_count = inner.unread_count.saturating_sub(1);
                }
            }
            None => {
                warn!("[NOTIF] remove for unknown id '{}', no-op", id);
            }
        }
        Ok(inner.clone())
    }

    /// Принять серверный due-date summary целиком. Никогда не сверяется с
    /// клиентскими bucket'ами — транзиентное расхождение допустимо.
    pub fn set_due_summary(
        &self,
        summary: NotificationSummary,
    ) -> Result<NotificationSnapshot, String> {
        let mut inner = self.lock()?;
        inner.due_summary = summary;
        Ok(inner.clone())
    }

    /// Текущий снимок без мутации.
    pub fn snapshot(&self) -> Result<NotificationSnapshot, String> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, NotificationSnapshot>, String> {
        self.inner
            .lock()
            .map_err(|e| format!("Mutex poisoned: {}", e))
    }
}

impl Default for NotificationCenter {
    fn default() -> Self {
        Self::new()
    }
}
