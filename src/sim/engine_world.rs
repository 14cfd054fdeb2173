//! 流量工程仿真世界
//!
//! 持有 [`TrafficEngine`]，并记录每条流真正开始传输时拿到的路径。
//! 路径只物化一次；尚未分配的流挂起，在下一次分配后重试。

use std::collections::{BTreeMap, BTreeSet};

use super::error::SimError;
use super::world::World;
use crate::net::{AcyclicPath, FlowId};
use crate::routing::TrafficEngine;
use std::any::Any;
use tracing::{debug, trace};

#[derive(Debug)]
pub struct EngineWorld {
    pub engine: TrafficEngine,
    active: BTreeSet<FlowId>,
    materialized: BTreeMap<FlowId, AcyclicPath>,
    pending: BTreeSet<FlowId>,
    epochs: usize,
}

impl EngineWorld {
    pub fn new(engine: TrafficEngine) -> Self {
        Self {
            engine,
            active: BTreeSet::new(),
            materialized: BTreeMap::new(),
            pending: BTreeSet::new(),
            epochs: 0,
        }
    }

    /// 从 `dyn World` 取回具体类型
    pub fn downcast<'a>(world: &'a mut dyn World, event: &'static str) -> Result<&'a mut Self, SimError> {
        world
            .as_any_mut()
            .downcast_mut::<EngineWorld>()
            .ok_or(SimError::WorldMismatch {
                event,
                expected: "EngineWorld",
            })
    }

    pub(crate) fn flow_started(&mut self, flow: FlowId) {
        self.active.insert(flow);
    }

    pub(crate) fn flow_finished(&mut self, flow: FlowId) {
        self.active.remove(&flow);
        self.pending.remove(&flow);
    }

    pub(crate) fn epoch_done(&mut self) {
        self.epochs += 1;
    }

    /// 物化一条流的路径。已物化或已结束的流直接返回 true；路径缺失时挂起并返回 false。
    pub fn materialize(&mut self, flow: FlowId) -> bool {
        if self.materialized.contains_key(&flow) || !self.active.contains(&flow) {
            return true;
        }
        match self.engine.path_for(flow) {
            Some(path) => {
                trace!(%flow, hops = path.len(), "路径物化");
                self.materialized.insert(flow, path.clone());
                self.pending.remove(&flow);
                true
            }
            None => {
                debug!(%flow, "尚未分配，挂起");
                self.pending.insert(flow);
                false
            }
        }
    }

    /// 重试所有挂起的流，返回本次成功的数量
    pub fn retry_pending(&mut self) -> usize {
        let waiting: Vec<FlowId> = self.pending.iter().copied().collect();
        waiting.into_iter().filter(|&f| self.materialize(f)).count()
    }

    pub fn materialized(&self) -> &BTreeMap<FlowId, AcyclicPath> {
        &self.materialized
    }

    pub fn pending(&self) -> &BTreeSet<FlowId> {
        &self.pending
    }

    pub fn epochs(&self) -> usize {
        self.epochs
    }
}

impl World for EngineWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
