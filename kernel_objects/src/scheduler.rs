//! Scheduler seam
//!
//! The object layer does not pick tasks to run. It only needs to make a task
//! runnable, take it off the run queue, park the calling task until it is
//! resumed or a deadline passes, and read the clock. [`Scheduler`] is that
//! contract.
//!
//! [`HostScheduler`] implements it for running the kernel on a host: each
//! task is an OS thread, parking blocks the thread on a condition variable
//! and time is a [`SimClock`] that only moves when a test advances it.
//!
//! ## Lost wakeups
//!
//! A resume that arrives before the matching park is not lost: it leaves a
//! token, and the next park consumes it and returns immediately.
//!
//! A dequeued task's parker is kept only while it still holds a token or a
//! parked thread; the last park of a dequeued task removes it.

use crate::timer::SimClock;
use core_types::TaskId;
use kernel_api::{Duration, Instant};
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

/// Schedule events kept before the oldest are dropped
pub const SCHEDULE_LOG_CAPACITY: usize = 4096;

/// Why `park` returned
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WakeReason {
    Resumed,
    DeadlineElapsed,
}

pub trait Scheduler: Send + Sync {
    /// Makes a task runnable
    fn enqueue(&self, task: TaskId);

    /// Removes a task from the run queue for good
    fn dequeue(&self, task: TaskId);

    /// Blocks the calling task until [`Scheduler::resume`] or `deadline`
    fn park(&self, task: TaskId, deadline: Instant) -> WakeReason;

    /// Wakes a parked task, or makes its next park return at once
    fn resume(&self, task: TaskId);

    fn now(&self) -> Instant;
}

/// Scheduling decisions, in order (test-only)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ScheduleEvent {
    Enqueued { task_id: TaskId, at: Instant },
    Dequeued { task_id: TaskId, at: Instant },
    Parked { task_id: TaskId, deadline: Instant, at: Instant },
    Resumed { task_id: TaskId, at: Instant },
    DeadlineElapsed { task_id: TaskId, at: Instant },
}

#[derive(Default)]
struct ParkState {
    token: bool,
    parked: bool,
}

#[derive(Default)]
struct Parker {
    state: Mutex<ParkState>,
    wakeup: Condvar,
}

impl Parker {
    fn lock(&self) -> MutexGuard<'_, ParkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[derive(Default)]
struct HostState {
    run_queue: VecDeque<TaskId>,
    parkers: HashMap<TaskId, Arc<Parker>>,
    audit_log: VecDeque<ScheduleEvent>,
}

impl HostState {
    fn record(&mut self, event: ScheduleEvent) {
        if self.audit_log.len() == SCHEDULE_LOG_CAPACITY {
            self.audit_log.pop_front();
        }
        self.audit_log.push_back(event);
    }

    /// Forgets the parker of a task that left the run queue, once idle
    fn prune(&mut self, task: TaskId) {
        if self.run_queue.contains(&task) {
            return;
        }
        let idle = self
            .parkers
            .get(&task)
            .map(|parker| {
                let state = parker.lock();
                !state.token && !state.parked
            })
            .unwrap_or(false);
        if idle {
            self.parkers.remove(&task);
        }
    }
}

/// Thread-per-task scheduler on a simulated clock
#[derive(Default)]
pub struct HostScheduler {
    clock: SimClock,
    inner: Mutex<HostState>,
}

impl HostScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: SimClock) -> Self {
        Self {
            clock,
            inner: Mutex::new(HostState::default()),
        }
    }

    pub fn clock(&self) -> &SimClock {
        &self.clock
    }

    /// Moves the clock forward and lets parked tasks check their deadlines
    pub fn advance_time(&self, by: Duration) -> Instant {
        let now = self.clock.advance(by);
        let parkers: Vec<Arc<Parker>> = self.lock().parkers.values().cloned().collect();
        for parker in parkers {
            // taking the lock orders this notify after any in-progress check
            let _state = parker.lock();
            parker.wakeup.notify_all();
        }
        now
    }

    /// Tasks currently runnable, in queue order
    pub fn run_queue(&self) -> Vec<TaskId> {
        self.lock().run_queue.iter().copied().collect()
    }

    /// Rotates the run queue and returns the task now at its tail
    pub fn next_runnable(&self) -> Option<TaskId> {
        let mut inner = self.lock();
        let task = inner.run_queue.pop_front()?;
        inner.run_queue.push_back(task);
        Some(task)
    }

    /// Whether the task is blocked in `park` right now
    pub fn is_parked(&self, task: TaskId) -> bool {
        let parker = self.lock().parkers.get(&task).cloned();
        parker.map(|p| p.lock().parked).unwrap_or(false)
    }

    pub fn audit_log(&self) -> Vec<ScheduleEvent> {
        self.lock().audit_log.iter().cloned().collect()
    }

    /// Tasks the scheduler currently keeps a parker for
    pub fn tracked_tasks(&self) -> usize {
        self.lock().parkers.len()
    }

    fn lock(&self) -> MutexGuard<'_, HostState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn parker(&self, task: TaskId) -> Arc<Parker> {
        self.lock().parkers.entry(task).or_default().clone()
    }

    fn record(&self, event: ScheduleEvent) {
        self.lock().record(event);
    }
}

impl Scheduler for HostScheduler {
    fn enqueue(&self, task: TaskId) {
        let at = self.clock.now();
        let mut inner = self.lock();
        if !inner.run_queue.contains(&task) {
            inner.run_queue.push_back(task);
        }
        inner.record(ScheduleEvent::Enqueued { task_id: task, at });
    }

    fn dequeue(&self, task: TaskId) {
        let at = self.clock.now();
        let mut inner = self.lock();
        inner.run_queue.retain(|t| *t != task);
        inner.record(ScheduleEvent::Dequeued { task_id: task, at });
        inner.prune(task);
    }

    fn park(&self, task: TaskId, deadline: Instant) -> WakeReason {
        let parker = self.parker(task);
        self.record(ScheduleEvent::Parked {
            task_id: task,
            deadline,
            at: self.clock.now(),
        });

        let mut state = parker.lock();
        let reason = loop {
            if state.token {
                state.token = false;
                break WakeReason::Resumed;
            }
            if self.clock.now() >= deadline {
                break WakeReason::DeadlineElapsed;
            }
            state.parked = true;
            state = parker
                .wakeup
                .wait(state)
                .unwrap_or_else(PoisonError::into_inner);
        };
        state.parked = false;
        drop(state);

        trace!("{} unparked: {:?}", task, reason);
        let mut inner = self.lock();
        if reason == WakeReason::DeadlineElapsed {
            let at = self.clock.now();
            inner.record(ScheduleEvent::DeadlineElapsed { task_id: task, at });
        }
        inner.prune(task);
        reason
    }

    fn resume(&self, task: TaskId) {
        let parker = self.parker(task);
        {
            let mut state = parker.lock();
            state.token = true;
            parker.wakeup.notify_all();
        }
        self.record(ScheduleEvent::Resumed {
            task_id: task,
            at: self.clock.now(),
        });
    }

    fn now(&self) -> Instant {
        self.clock.now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_run_queue_has_no_duplicates() {
        let scheduler = HostScheduler::new();
        let (a, b) = (TaskId::new(), TaskId::new());
        scheduler.enqueue(a);
        scheduler.enqueue(b);
        scheduler.enqueue(a);
        assert_eq!(scheduler.run_queue(), vec![a, b]);

        assert_eq!(scheduler.next_runnable(), Some(a));
        assert_eq!(scheduler.run_queue(), vec![b, a]);

        scheduler.dequeue(a);
        assert_eq!(scheduler.run_queue(), vec![b]);
    }

    #[test]
    fn test_dequeue_forgets_idle_parker() {
        let scheduler = HostScheduler::new();
        let task = TaskId::new();
        scheduler.enqueue(task);
        assert_eq!(scheduler.park(task, Instant::ZERO), WakeReason::DeadlineElapsed);
        assert_eq!(scheduler.tracked_tasks(), 1);

        scheduler.dequeue(task);
        assert_eq!(scheduler.tracked_tasks(), 0);
    }

    #[test]
    fn test_dequeue_keeps_pending_resume() {
        let scheduler = HostScheduler::new();
        let task = TaskId::new();
        scheduler.enqueue(task);
        scheduler.resume(task);
        scheduler.dequeue(task);
        assert_eq!(scheduler.tracked_tasks(), 1);

        // the late park still sees the resume, then the parker goes
        assert_eq!(scheduler.park(task, Instant::FOREVER), WakeReason::Resumed);
        assert_eq!(scheduler.tracked_tasks(), 0);
    }

    #[test]
    fn test_schedule_log_is_bounded() {
        let scheduler = HostScheduler::new();
        let task = TaskId::new();
        for _ in 0..SCHEDULE_LOG_CAPACITY + 10 {
            scheduler.enqueue(task);
        }
        let log = scheduler.audit_log();
        assert_eq!(log.len(), SCHEDULE_LOG_CAPACITY);
    }

    #[test]
    fn test_resume_before_park_is_kept() {
        let scheduler = HostScheduler::new();
        let task = TaskId::new();
        scheduler.resume(task);
        assert_eq!(scheduler.park(task, Instant::FOREVER), WakeReason::Resumed);
    }

    #[test]
    fn test_elapsed_deadline_returns_at_once() {
        let scheduler = HostScheduler::new();
        let task = TaskId::new();
        assert_eq!(
            scheduler.park(task, Instant::ZERO),
            WakeReason::DeadlineElapsed
        );
    }

    #[test]
    fn test_resume_wakes_parked_thread() {
        let scheduler = Arc::new(HostScheduler::new());
        let task = TaskId::new();
        let parked = {
            let scheduler = scheduler.clone();
            thread::spawn(move || scheduler.park(task, Instant::FOREVER))
        };
        while !scheduler.is_parked(task) {
            thread::yield_now();
        }
        scheduler.resume(task);
        assert_eq!(parked.join().unwrap(), WakeReason::Resumed);
    }

    #[test]
    fn test_advance_time_expires_deadline() {
        let scheduler = Arc::new(HostScheduler::new());
        let task = TaskId::new();
        let deadline = Instant::ZERO + Duration::from_millis(5);
        let parked = {
            let scheduler = scheduler.clone();
            thread::spawn(move || scheduler.park(task, deadline))
        };
        while !scheduler.is_parked(task) {
            thread::yield_now();
        }
        scheduler.advance_time(Duration::from_millis(2));
        assert!(!parked.is_finished());
        scheduler.advance_time(Duration::from_millis(3));
        assert_eq!(parked.join().unwrap(), WakeReason::DeadlineElapsed);
        assert!(scheduler
            .audit_log()
            .iter()
            .any(|e| matches!(e, ScheduleEvent::DeadlineElapsed { .. })));
    }
}
