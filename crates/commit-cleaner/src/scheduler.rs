//! Timers and microtasks on a virtual millisecond clock.
//!
//! The scheduler never waits. Platforms ask for [`Scheduler::next_deadline`],
//! arm one real timer for it and hand control back to the engine, which pops
//! due tasks with [`Scheduler::pop_due`]. Tests drive the same clock directly.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashSet, VecDeque};

use crate::dom::NodeId;

/// Cancellable handle to a scheduled task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, serde::Serialize)]
pub struct TimerToken(u64);

/// Why a cleaning pass was requested.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PassReason {
    Attempt,
    Poll,
    Debounce,
    StrategyChange,
    CompleteClick,
    Customize,
    Forced,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Task {
    Pass { dialog: NodeId, reason: PassReason },
    Poll { dialog: NodeId },
    Rescan,
}

#[derive(Clone, Copy, Debug)]
struct Repeat {
    period_ms: u64,
    /// Runs left including the one about to fire; `None` repeats forever.
    remaining: Option<u32>,
}

#[derive(Debug)]
struct TimerEntry {
    fire_at_ms: u64,
    seq: u64,
    token: TimerToken,
    task: Task,
    repeat: Option<Repeat>,
}

impl PartialEq for TimerEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at_ms == other.fire_at_ms && self.seq == other.seq
    }
}

impl Eq for TimerEntry {}

impl PartialOrd for TimerEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for TimerEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Min-heap on fire time; equal deadlines keep scheduling order.
        other
            .fire_at_ms
            .cmp(&self.fire_at_ms)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Default)]
pub struct Scheduler {
    now_ms: u64,
    next_seq: u64,
    next_token: u64,
    timers: BinaryHeap<TimerEntry>,
    live: HashSet<TimerToken>,
    microtasks: VecDeque<Task>,
}

impl Scheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now_ms(&self) -> u64 {
        self.now_ms
    }

    fn issue_token(&mut self) -> TimerToken {
        self.next_token += 1;
        TimerToken(self.next_token)
    }

    fn push(&mut self, fire_at_ms: u64, token: TimerToken, task: Task, repeat: Option<Repeat>) {
        self.next_seq += 1;
        self.timers.push(TimerEntry {
            fire_at_ms,
            seq: self.next_seq,
            token,
            task,
            repeat,
        });
    }

    pub fn schedule_once(&mut self, delay_ms: u64, task: Task) -> TimerToken {
        let token = self.issue_token();
        self.live.insert(token);
        self.push(self.now_ms + delay_ms, token, task, None);
        token
    }

    /// Fire every `period_ms`, first after one period, at most `max_runs`
    /// times when given. A zero period is clamped to one millisecond.
    pub fn schedule_repeating(&mut self, period_ms: u64, max_runs: Option<u32>, task: Task) -> TimerToken {
        let token = self.issue_token();
        if max_runs == Some(0) {
            return token;
        }
        let period_ms = period_ms.max(1);
        self.live.insert(token);
        self.push(
            self.now_ms + period_ms,
            token,
            task,
            Some(Repeat {
                period_ms,
                remaining: max_runs,
            }),
        );
        token
    }

    /// Replace whatever is pending in `slot` with a fresh one-shot.
    pub fn debounce(&mut self, slot: &mut Option<TimerToken>, delay_ms: u64, task: Task) -> TimerToken {
        if let Some(previous) = slot.take() {
            self.cancel(previous);
        }
        let token = self.schedule_once(delay_ms, task);
        *slot = Some(token);
        token
    }

    /// Returns whether the token was still pending.
    pub fn cancel(&mut self, token: TimerToken) -> bool {
        self.live.remove(&token)
    }

    pub fn is_pending(&self, token: TimerToken) -> bool {
        self.live.contains(&token)
    }

    /// Number of live timers.
    pub fn pending(&self) -> usize {
        self.live.len()
    }

    pub fn queue_microtask(&mut self, task: Task) {
        self.microtasks.push_back(task);
    }

    pub fn take_microtask(&mut self) -> Option<Task> {
        self.microtasks.pop_front()
    }

    pub fn has_microtasks(&self) -> bool {
        !self.microtasks.is_empty()
    }

    /// Earliest fire time among live timers.
    pub fn next_deadline(&self) -> Option<u64> {
        self.timers
            .iter()
            .filter(|entry| self.live.contains(&entry.token))
            .map(|entry| entry.fire_at_ms)
            .min()
    }

    /// Pop the next live task due at or before `target_ms`, moving the clock to
    /// its fire time. When nothing is due the clock moves to `target_ms`.
    pub fn pop_due(&mut self, target_ms: u64) -> Option<Task> {
        loop {
            let due = self
                .timers
                .peek()
                .is_some_and(|entry| entry.fire_at_ms <= target_ms);
            if !due {
                self.now_ms = self.now_ms.max(target_ms);
                return None;
            }
            let entry = self.timers.pop()?;
            if !self.live.contains(&entry.token) {
                continue;
            }
            self.now_ms = self.now_ms.max(entry.fire_at_ms);

            match entry.repeat {
                Some(repeat) => {
                    let remaining = repeat.remaining.map(|runs| runs.saturating_sub(1));
                    if remaining == Some(0) {
                        self.live.remove(&entry.token);
                    } else {
                        self.push(
                            entry.fire_at_ms + repeat.period_ms,
                            entry.token,
                            entry.task,
                            Some(Repeat {
                                period_ms: repeat.period_ms,
                                remaining,
                            }),
                        );
                    }
                }
                None => {
                    self.live.remove(&entry.token);
                }
            }
            return Some(entry.task);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pass(index: u32) -> Task {
        Task::Pass {
            dialog: NodeId::new(index, 0),
            reason: PassReason::Attempt,
        }
    }

    fn drain(scheduler: &mut Scheduler, until: u64) -> Vec<(u64, Task)> {
        let mut fired = Vec::new();
        while let Some(task) = scheduler.pop_due(until) {
            fired.push((scheduler.now_ms(), task));
        }
        fired
    }

    #[test]
    fn once_fires_in_deadline_then_schedule_order() {
        let mut scheduler = Scheduler::new();
        scheduler.schedule_once(50, pass(2));
        scheduler.schedule_once(0, pass(1));
        scheduler.schedule_once(50, pass(3));

        let fired = drain(&mut scheduler, 100);
        assert_eq!(fired, vec![(0, pass(1)), (50, pass(2)), (50, pass(3))]);
        assert_eq!(scheduler.now_ms(), 100);
        assert_eq!(scheduler.pending(), 0);
    }

    #[test]
    fn repeating_respects_cap() {
        let mut scheduler = Scheduler::new();
        let token = scheduler.schedule_repeating(500, Some(3), Task::Rescan);
        let fired = drain(&mut scheduler, 10_000);
        let times: Vec<u64> = fired.iter().map(|(at, _)| *at).collect();
        assert_eq!(times, vec![500, 1000, 1500]);
        assert!(!scheduler.is_pending(token));
    }

    #[test]
    fn cancelled_repeating_stops() {
        let mut scheduler = Scheduler::new();
        let token = scheduler.schedule_repeating(100, None, Task::Rescan);
        assert_eq!(drain(&mut scheduler, 250).len(), 2);
        assert!(scheduler.cancel(token));
        assert!(drain(&mut scheduler, 1_000).is_empty());
        assert_eq!(scheduler.next_deadline(), None);
    }

    #[test]
    fn debounce_keeps_only_latest() {
        let mut scheduler = Scheduler::new();
        let mut slot = None;
        scheduler.debounce(&mut slot, 75, pass(1));
        drain(&mut scheduler, 50);
        let latest = scheduler.debounce(&mut slot, 75, pass(1));
        assert_eq!(slot, Some(latest));

        assert!(drain(&mut scheduler, 100).is_empty());
        assert_eq!(drain(&mut scheduler, 125), vec![(125, pass(1))]);
    }

    #[test]
    fn microtasks_are_fifo() {
        let mut scheduler = Scheduler::new();
        scheduler.queue_microtask(pass(1));
        scheduler.queue_microtask(pass(2));
        assert_eq!(scheduler.take_microtask(), Some(pass(1)));
        assert_eq!(scheduler.take_microtask(), Some(pass(2)));
        assert!(!scheduler.has_microtasks());
    }
}
