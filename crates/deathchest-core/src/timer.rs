//! Tick-based task scheduling with cancellable handles.
//!
//! The queue stores tasks as data, not closures; the lifecycle
//! manager drains due tasks each tick and dispatches on [`TaskKind`].
//! Cancellation is best-effort: cancelling a handle whose task already
//! fired is a no-op, and a fired task is expected to re-check registry
//! membership before acting.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashSet};

use deathchest_world::BlockPos;

/// Game ticks per wall-clock second.
pub const TICKS_PER_SECOND: u64 = 20;

/// Opaque, unique handle to a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

/// What a task does when it fires. Dispatch lives in the manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskKind {
    /// Create the status display shortly after materialization.
    SpawnHologram { remaining: u32 },
    /// Update the countdown line to `remaining` whole seconds.
    CountdownTick { remaining: u32 },
    /// Terminal task: destroy the chest.
    Break,
    /// Poll a falling proxy for landing.
    FallPoll,
}

/// A task due for execution, as returned by [`TimerQueue::drain_ready`].
#[derive(Debug, Clone)]
pub struct ScheduledTask {
    pub handle: TaskHandle,
    pub pos: BlockPos,
    pub kind: TaskKind,
    target_tick: u64,
    repeat_every: Option<u64>,
}

impl PartialEq for ScheduledTask {
    fn eq(&self, other: &Self) -> bool {
        self.handle == other.handle
    }
}

impl Eq for ScheduledTask {}

impl Ord for ScheduledTask {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        // Earliest target first; handle order breaks ties so tasks
        // scheduled earlier fire earlier within the same tick.
        self.target_tick
            .cmp(&other.target_tick)
            .then(self.handle.cmp(&other.handle))
    }
}

impl PartialOrd for ScheduledTask {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

/// Priority queue of scheduled tasks, cancellable by handle.
#[derive(Default)]
pub struct TimerQueue {
    queue: BinaryHeap<Reverse<ScheduledTask>>,
    live: HashSet<TaskHandle>,
    next_handle: u64,
}

impl TimerQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Schedule a one-shot task `delay` ticks after `now`.
    pub fn schedule_once(
        &mut self,
        pos: BlockPos,
        kind: TaskKind,
        delay: u64,
        now: u64,
    ) -> TaskHandle {
        self.push(pos, kind, now + delay, None)
    }

    /// Schedule a repeating task: first fire `delay` ticks after `now`,
    /// then every `period` ticks (minimum 1) until cancelled.
    pub fn schedule_repeating(
        &mut self,
        pos: BlockPos,
        kind: TaskKind,
        delay: u64,
        period: u64,
        now: u64,
    ) -> TaskHandle {
        self.push(pos, kind, now + delay, Some(period.max(1)))
    }

    fn push(
        &mut self,
        pos: BlockPos,
        kind: TaskKind,
        target_tick: u64,
        repeat_every: Option<u64>,
    ) -> TaskHandle {
        self.next_handle += 1;
        let handle = TaskHandle(self.next_handle);
        self.live.insert(handle);
        self.queue.push(Reverse(ScheduledTask {
            handle,
            pos,
            kind,
            target_tick,
            repeat_every,
        }));
        handle
    }

    /// Cancel a task. Returns `false` if the handle was already
    /// consumed or cancelled.
    pub fn cancel(&mut self, handle: TaskHandle) -> bool {
        self.live.remove(&handle)
    }

    /// Whether a handle still refers to a pending task.
    pub fn is_live(&self, handle: TaskHandle) -> bool {
        self.live.contains(&handle)
    }

    /// Remove and return all tasks due at or before `now`, in firing
    /// order. Cancelled tasks are dropped silently; repeating tasks
    /// are re-queued with the same handle.
    pub fn drain_ready(&mut self, now: u64) -> Vec<ScheduledTask> {
        let mut ready = Vec::new();
        while let Some(Reverse(task)) = self.queue.peek() {
            if task.target_tick > now {
                break;
            }
            let Some(Reverse(task)) = self.queue.pop() else {
                break;
            };
            if !self.live.contains(&task.handle) {
                continue; // cancelled while queued
            }
            match task.repeat_every {
                Some(period) => {
                    let mut next = ScheduledTask {
                        target_tick: task.target_tick + period,
                        ..task.clone()
                    };
                    // Never re-fire within the same drain.
                    if next.target_tick <= now {
                        next.target_tick = now + period;
                    }
                    self.queue.push(Reverse(next));
                }
                None => {
                    self.live.remove(&task.handle);
                }
            }
            ready.push(task);
        }
        ready
    }

    /// Number of pending (non-cancelled) tasks.
    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Drop every pending task.
    pub fn clear(&mut self) {
        self.queue.clear();
        self.live.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use deathchest_world::WorldId;

    fn pos() -> BlockPos {
        BlockPos::new(WorldId::new("overworld"), 0, 64, 0)
    }

    #[test]
    fn one_shot_fires_once() {
        let mut q = TimerQueue::new();
        let h = q.schedule_once(pos(), TaskKind::Break, 5, 100);

        assert!(q.drain_ready(104).is_empty());
        let ready = q.drain_ready(105);
        assert_eq!(ready.len(), 1);
        assert_eq!(ready[0].handle, h);
        assert_eq!(ready[0].kind, TaskKind::Break);

        assert!(q.drain_ready(200).is_empty());
        assert!(q.is_empty());
    }

    #[test]
    fn firing_order_is_target_then_schedule_order() {
        let mut q = TimerQueue::new();
        let late = q.schedule_once(pos(), TaskKind::Break, 10, 0);
        let early_a = q.schedule_once(pos(), TaskKind::CountdownTick { remaining: 2 }, 5, 0);
        let early_b = q.schedule_once(pos(), TaskKind::CountdownTick { remaining: 1 }, 5, 0);

        let ready = q.drain_ready(10);
        let handles: Vec<_> = ready.iter().map(|t| t.handle).collect();
        assert_eq!(handles, vec![early_a, early_b, late]);
    }

    #[test]
    fn cancelled_task_never_fires() {
        let mut q = TimerQueue::new();
        let h = q.schedule_once(pos(), TaskKind::Break, 5, 0);
        assert!(q.is_live(h));
        assert!(q.cancel(h));
        assert!(!q.is_live(h));
        assert!(!q.cancel(h)); // second cancel is a no-op
        assert!(q.drain_ready(100).is_empty());
    }

    #[test]
    fn consumed_handle_cancel_is_noop() {
        let mut q = TimerQueue::new();
        let h = q.schedule_once(pos(), TaskKind::Break, 1, 0);
        assert_eq!(q.drain_ready(1).len(), 1);
        assert!(!q.cancel(h));
    }

    #[test]
    fn repeating_fires_every_period_until_cancelled() {
        let mut q = TimerQueue::new();
        let h = q.schedule_repeating(pos(), TaskKind::FallPoll, 1, 1, 0);

        for now in 1..=5 {
            let ready = q.drain_ready(now);
            assert_eq!(ready.len(), 1, "tick {now}");
            assert_eq!(ready[0].handle, h);
        }

        assert!(q.cancel(h));
        assert!(q.drain_ready(6).is_empty());
        assert!(q.is_empty());
    }

    #[test]
    fn repeating_does_not_storm_after_gap() {
        let mut q = TimerQueue::new();
        q.schedule_repeating(pos(), TaskKind::FallPoll, 1, 1, 0);

        // Ticks 1..=9 were never drained; a single drain at 10 must
        // fire once, not ten times.
        assert_eq!(q.drain_ready(10).len(), 1);
        assert_eq!(q.drain_ready(11).len(), 1);
    }

    #[test]
    fn clear_drops_everything() {
        let mut q = TimerQueue::new();
        q.schedule_once(pos(), TaskKind::Break, 5, 0);
        q.schedule_repeating(pos(), TaskKind::FallPoll, 1, 1, 0);
        assert_eq!(q.len(), 2);
        q.clear();
        assert!(q.is_empty());
        assert!(q.drain_ready(100).is_empty());
    }
}
