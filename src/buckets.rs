use crate::models::{Task, TaskStatus};
use crate::status::{day_of, week_monday};
use chrono::{DateTime, Duration, Utc};
use serde::Serialize;
use std::collections::HashSet;

/// Задачи, сгруппированные по календарному отношению дедлайна к "сейчас".
/// Питает и счётчики дашборда, и панель "upcoming deadlines".
///
/// Никакого truncation здесь нет: "показать top 5" — забота presentation
/// слоя, не ядра.
#[derive(Debug, Default, Clone, Serialize)]
pub struct DueBuckets {
    pub overdue: Vec<Task>,
    pub today: Vec<Task>,
    pub tomorrow: Vec<Task>,
    pub this_week: Vec<Task>,
    pub later: Vec<Task>,
    pub none: Vec<Task>,
}

impl DueBuckets {
    pub fn total(&self) -> usize {
        self.overdue.len()
            + self.today.len()
            + self.tomorrow.len()
            + self.this_week.len()
            + self.later.len()
            + self.none.len()
    }
}

/// Разложить snapshot задач по bucket'ам.
///
/// - дедупликация по id: первая встреченная копия выигрывает, дубликаты
///   молча отбрасываются (без merge) — даже если первая копия `done` и
///   потому сама никуда не попала;
/// - `done` задачи пропускаются целиком;
/// - задачи без дедлайна идут в `none`;
/// - календарные предикаты — те же helpers, что в классификаторе, чтобы
///   два представления никогда не расходились.
pub fn group_by_due(tasks: &[Task], now: DateTime<Utc>) -> DueBuckets {
    let mut buckets = DueBuckets::default();
    let mut seen: HashSet<&str> = HashSet::with_capacity(tasks.len());

    let today = day_of(now);
    let tomorrow = today + Duration::days(1);
    let this_monday = week_monday(today);

    for task in tasks {
        // Регистрируем id до всех фильтров: судьбу задачи решает первая
        // копия, в том числе когда она done и отбрасывается
        if !seen.insert(task.id.as_str()) {
            continue;
        }
        if task.status == TaskStatus::Done {
            continue;
        }

        let due = match task.due_date {
            Some(due) => due,
            None => {
                buckets.none.push(task.clone());
                continue;
            }
        };

        let due_day = day_of(due);
        let target = if due < now {
            &mut buckets.overdue
        } else if due_day == today {
            &mut buckets.today
        } else if due_day == tomorrow {
            &mut buckets.tomorrow
        } else if week_monday(due_day) == this_monday {
            &mut buckets.this_week
        } else {
            &mut buckets.later
        };
        target.push(task.clone());
    }

    buckets
}
