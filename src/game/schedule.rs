use std::cmp::Ordering;
use std::collections::BinaryHeap;

use serde::{Deserialize, Serialize};

use super::state::{ActionKind, Side};

/// 定时回调的种类，全部在同一条时间线上按序触发。
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "type")]
pub enum TimerEvent {
    CountdownTick,
    Impact { side: Side, action: ActionKind },
    ClearHit { side: Side },
    RecoveryEnd { side: Side },
    OpponentTick,
    EmitOutcome,
}

#[derive(Debug, Clone)]
pub struct Scheduled {
    pub due_at: u64,
    pub event: TimerEvent,
    order: u64,
}

impl PartialEq for Scheduled {
    fn eq(&self, other: &Self) -> bool {
        self.due_at == other.due_at && self.order == other.order
    }
}

impl Eq for Scheduled {}

impl PartialOrd for Scheduled {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scheduled {
    // BinaryHeap 是大顶堆，反转比较使最早到期、最先登记者先出队。
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .due_at
            .cmp(&self.due_at)
            .then_with(|| other.order.cmp(&self.order))
    }
}

/// 虚拟时钟加定时队列。
#[derive(Debug, Default)]
pub struct Timeline {
    heap: BinaryHeap<Scheduled>,
    now: u64,
    order: u64,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn now(&self) -> u64 {
        self.now
    }

    pub fn schedule(&mut self, delay: u64, event: TimerEvent) -> u64 {
        self.order += 1;
        let due_at = self.now.saturating_add(delay);
        self.heap.push(Scheduled {
            due_at,
            event,
            order: self.order,
        });
        due_at
    }

    /// 取出下一个不晚于 `until` 的回调，并把时钟拨到它的到期时间。
    pub fn pop_due(&mut self, until: u64) -> Option<Scheduled> {
        if self.heap.peek()?.due_at > until {
            return None;
        }
        let item = self.heap.pop()?;
        self.now = self.now.max(item.due_at);
        Some(item)
    }

    pub fn advance_to(&mut self, time: u64) {
        self.now = self.now.max(time);
    }

    pub fn next_due(&self) -> Option<u64> {
        self.heap.peek().map(|item| item.due_at)
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn earliest_due_fires_first() {
        let mut timeline = Timeline::new();
        timeline.schedule(700, TimerEvent::RecoveryEnd { side: Side::Player });
        timeline.schedule(150, TimerEvent::Impact {
            side: Side::Player,
            action: ActionKind::Heavy,
        });
        timeline.schedule(100, TimerEvent::OpponentTick);

        let order: Vec<u64> = std::iter::from_fn(|| timeline.pop_due(u64::MAX))
            .map(|item| item.due_at)
            .collect();
        assert_eq!(order, vec![100, 150, 700]);
        assert_eq!(timeline.now(), 700);
    }

    #[test]
    fn same_instant_keeps_scheduling_order() {
        let mut timeline = Timeline::new();
        timeline.schedule(150, TimerEvent::Impact {
            side: Side::Opponent,
            action: ActionKind::Light,
        });
        timeline.schedule(150, TimerEvent::Impact {
            side: Side::Player,
            action: ActionKind::Light,
        });

        let first = timeline.pop_due(150).expect("first impact");
        let second = timeline.pop_due(150).expect("second impact");
        assert!(matches!(first.event, TimerEvent::Impact { side: Side::Opponent, .. }));
        assert!(matches!(second.event, TimerEvent::Impact { side: Side::Player, .. }));
    }

    #[test]
    fn nothing_fires_before_its_time() {
        let mut timeline = Timeline::new();
        timeline.schedule(1000, TimerEvent::CountdownTick);
        assert!(timeline.pop_due(999).is_none());
        timeline.advance_to(999);
        assert_eq!(timeline.now(), 999);
        assert_eq!(timeline.next_due(), Some(1000));
        assert!(timeline.pop_due(1000).is_some());
        assert!(timeline.is_empty());
    }
}
