//! Timer capability injected into the dashboard and audio engine.
//!
//! Components never read a wall clock; they ask a [`Scheduler`] for the
//! current time and for recurring or one-shot wakeups. [`TimerQueue`] is
//! the single implementation: the binary advances it from a monotonic
//! clock, tests advance it by hand.

use std::collections::BTreeMap;

/// Handle for a scheduled task
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(u64);

/// What a task does when it fires
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    /// Dropout sweep
    Watchdog,
    /// Audio rhythm pulse
    Rhythm,
    /// Re-read the display names document
    NameRefresh,
}

pub trait Scheduler {
    /// Milliseconds on the scheduler clock
    fn now_ms(&self) -> u64;

    /// Fire every `period_ms`, first at `now + period_ms`
    fn schedule_repeating(&mut self, kind: TaskKind, period_ms: u64) -> TaskId;

    /// Fire once at `now + delay_ms`
    fn schedule_once(&mut self, kind: TaskKind, delay_ms: u64) -> TaskId;

    /// Returns false when the task already finished or was never scheduled
    fn cancel(&mut self, id: TaskId) -> bool;
}

/// A task that came due
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DueTask {
    pub id: TaskId,
    pub kind: TaskKind,
    pub due_ms: u64,
}

#[derive(Debug, Clone)]
struct Entry {
    kind: TaskKind,
    due_ms: u64,
    period_ms: Option<u64>,
}

/// Virtual-clock timer queue
#[derive(Debug, Clone, Default)]
pub struct TimerQueue {
    now_ms: u64,
    next_id: u64,
    tasks: BTreeMap<TaskId, Entry>,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn insert(&mut self, kind: TaskKind, delay_ms: u64, period_ms: Option<u64>) -> TaskId {
        let id = TaskId(self.next_id);
        self.next_id += 1;
        self.tasks.insert(
            id,
            Entry {
                kind,
                due_ms: self.now_ms.saturating_add(delay_ms),
                period_ms,
            },
        );
        id
    }

    /// Take the earliest task due at or before `until_ms`
    ///
    /// The clock moves to that task's deadline, so whatever runs for it
    /// sees the time it was due and schedules relative to it. Ties go by
    /// creation order. Repeating tasks are re-armed; a task cancelled by
    /// an earlier handler is simply gone.
    pub fn pop_due(&mut self, until_ms: u64) -> Option<DueTask> {
        let (id, entry) = self
            .tasks
            .iter()
            .filter(|(_, e)| e.due_ms <= until_ms)
            .min_by_key(|(id, e)| (e.due_ms, **id))
            .map(|(id, e)| (*id, e.clone()))?;

        self.now_ms = self.now_ms.max(entry.due_ms);
        match entry.period_ms {
            Some(period) => {
                if let Some(task) = self.tasks.get_mut(&id) {
                    task.due_ms = entry.due_ms.saturating_add(period.max(1));
                }
            }
            None => {
                self.tasks.remove(&id);
            }
        }

        Some(DueTask {
            id,
            kind: entry.kind,
            due_ms: entry.due_ms,
        })
    }

    /// Move the clock to `now_ms` once nothing before it is due
    ///
    /// The clock never moves backwards.
    pub fn settle(&mut self, now_ms: u64) {
        self.now_ms = self.now_ms.max(now_ms);
    }

    /// Drain every task due by `now_ms`, then settle the clock there
    ///
    /// A repeating task that fell behind by several periods fires once per
    /// missed period.
    pub fn advance_to(&mut self, now_ms: u64) -> Vec<(TaskId, TaskKind)> {
        let mut fired = Vec::new();
        while let Some(due) = self.pop_due(now_ms) {
            fired.push((due.id, due.kind));
        }
        self.settle(now_ms);
        fired
    }

    /// Earliest pending deadline, if any
    pub fn next_deadline(&self) -> Option<u64> {
        self.tasks.values().map(|e| e.due_ms).min()
    }

    pub fn is_scheduled(&self, id: TaskId) -> bool {
        self.tasks.contains_key(&id)
    }

    /// Pending tasks of one kind
    pub fn count(&self, kind: TaskKind) -> usize {
        self.tasks.values().filter(|e| e.kind == kind).count()
    }
}

impl Scheduler for TimerQueue {
    fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn schedule_repeating(&mut self, kind: TaskKind, period_ms: u64) -> TaskId {
        let period_ms = period_ms.max(1);
        self.insert(kind, period_ms, Some(period_ms))
    }

    fn schedule_once(&mut self, kind: TaskKind, delay_ms: u64) -> TaskId {
        self.insert(kind, delay_ms, None)
    }

    fn cancel(&mut self, id: TaskId) -> bool {
        self.tasks.remove(&id).is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeating_task_rearms() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule_repeating(TaskKind::Watchdog, 1000);

        assert!(queue.advance_to(999).is_empty());
        assert_eq!(queue.advance_to(1000), vec![(id, TaskKind::Watchdog)]);
        assert_eq!(queue.advance_to(3500).len(), 2);
        assert_eq!(queue.next_deadline(), Some(4000));
    }

    #[test]
    fn test_one_shot_fires_once() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule_once(TaskKind::NameRefresh, 50);

        assert_eq!(queue.advance_to(100), vec![(id, TaskKind::NameRefresh)]);
        assert!(!queue.is_scheduled(id));
        assert!(queue.advance_to(1000).is_empty());
    }

    #[test]
    fn test_cancelled_task_never_fires() {
        let mut queue = TimerQueue::new();
        let id = queue.schedule_repeating(TaskKind::Rhythm, 500);

        assert!(queue.cancel(id));
        assert!(!queue.cancel(id));
        assert!(queue.advance_to(5000).is_empty());
        assert_eq!(queue.count(TaskKind::Rhythm), 0);
    }

    #[test]
    fn test_due_tasks_in_deadline_order() {
        let mut queue = TimerQueue::new();
        let slow = queue.schedule_repeating(TaskKind::Watchdog, 1000);
        let fast = queue.schedule_repeating(TaskKind::Rhythm, 400);

        let fired: Vec<TaskId> = queue.advance_to(1000).into_iter().map(|(id, _)| id).collect();
        assert_eq!(fired, vec![fast, fast, slow]);
        assert_eq!(queue.now_ms(), 1000);
    }

    #[test]
    fn test_pop_due_runs_on_each_deadline() {
        let mut queue = TimerQueue::new();
        let sweep = queue.schedule_repeating(TaskKind::Watchdog, 1000);
        let once = queue.schedule_once(TaskKind::NameRefresh, 1500);

        let first = queue.pop_due(3000).unwrap();
        assert_eq!((first.id, first.due_ms), (sweep, 1000));
        assert_eq!(queue.now_ms(), 1000);

        let second = queue.pop_due(3000).unwrap();
        assert_eq!((second.id, second.due_ms), (once, 1500));
        assert_eq!(queue.now_ms(), 1500);

        // Work scheduled from a handler is relative to its deadline
        let follow = queue.schedule_once(TaskKind::Rhythm, 100);
        let third = queue.pop_due(3000).unwrap();
        assert_eq!((third.id, third.due_ms), (follow, 1600));

        assert_eq!(queue.pop_due(3000).unwrap().due_ms, 2000);
        queue.cancel(sweep);
        assert!(queue.pop_due(3000).is_none());

        queue.settle(3000);
        assert_eq!(queue.now_ms(), 3000);
    }

    #[test]
    fn test_clock_never_moves_backwards() {
        let mut queue = TimerQueue::new();
        queue.advance_to(2000);
        queue.advance_to(1000);
        assert_eq!(queue.now_ms(), 2000);
    }
}
