//! 仿真器
//!
//! 定义事件驱动仿真器，维护当前时间与事件队列。

use super::error::SimError;
use super::event::Event;
use super::time::SimTime;
use super::world::World;
use std::cmp::Ordering;
use std::collections::BinaryHeap;
use tracing::{debug, error, info, trace};

/// 调度事件：同一时刻的事件按调度顺序执行。
struct ScheduledEvent {
    at: SimTime,
    seq: u64,
    ev: Box<dyn Event>,
}

// BinaryHeap 是 max-heap；我们需要最小时间优先，因此反向比较。
impl Ord for ScheduledEvent {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.at, self.seq).cmp(&(other.at, other.seq)).reverse()
    }
}

impl PartialOrd for ScheduledEvent {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for ScheduledEvent {
    fn eq(&self, other: &Self) -> bool {
        self.at == other.at && self.seq == other.seq
    }
}

impl Eq for ScheduledEvent {}

/// 事件驱动仿真器：维护当前时间与事件队列。
#[derive(Default)]
pub struct Simulator {
    now: SimTime,
    next_seq: u64,
    executed: u64,
    q: BinaryHeap<ScheduledEvent>,
}

impl std::fmt::Debug for Simulator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Simulator")
            .field("now", &self.now)
            .field("executed", &self.executed)
            .field("pending", &self.q.len())
            .finish()
    }
}

impl Simulator {
    /// 获取当前仿真时间
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// 已执行的事件数
    pub fn executed(&self) -> u64 {
        self.executed
    }

    pub fn pending(&self) -> usize {
        self.q.len()
    }

    /// 调度事件在指定时间执行；早于当前时间的按当前时间处理
    pub fn schedule<E: Event>(&mut self, at: SimTime, ev: E) {
        let at = at.max(self.now);
        let seq = self.next_seq;
        trace!(event_type = std::any::type_name::<E>(), %at, seq, "调度事件");
        self.next_seq = self.next_seq.wrapping_add(1);
        self.q.push(ScheduledEvent {
            at,
            seq,
            ev: Box::new(ev),
        });
    }

    /// 运行直到事件队列为空或到达 `until`，之后时间推进到 `until`。
    pub fn run_until(&mut self, until: SimTime, world: &mut dyn World) -> Result<(), SimError> {
        self.drain(until, world)?;
        self.now = self.now.max(until);
        Ok(())
    }

    /// 运行所有事件直到队列为空。
    pub fn run(&mut self, world: &mut dyn World) -> Result<(), SimError> {
        self.drain(SimTime::MAX, world)
    }

    #[tracing::instrument(skip(self, world), fields(until = %until))]
    fn drain(&mut self, until: SimTime, world: &mut dyn World) -> Result<(), SimError> {
        info!("▶️  开始运行仿真");
        while let Some(top) = self.q.peek() {
            if top.at > until {
                break;
            }
            let Some(item) = self.q.pop() else {
                break;
            };
            self.step(item, world)?;
        }
        info!(total_events = self.executed, final_time = %self.now, "✅ 仿真完成");
        Ok(())
    }

    fn step(&mut self, item: ScheduledEvent, world: &mut dyn World) -> Result<(), SimError> {
        self.now = item.at;
        self.executed += 1;
        debug!(
            event_num = self.executed,
            now = %self.now,
            seq = item.seq,
            remaining_queue = self.q.len(),
            "执行事件"
        );
        if let Err(e) = item.ev.execute(self, world) {
            error!(error = %e, now = %self.now, "事件执行失败，仿真终止");
            return Err(e);
        }
        world.on_tick(self);
        Ok(())
    }
}
