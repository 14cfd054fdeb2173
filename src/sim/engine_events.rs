//! 驱动流量工程引擎的仿真事件

use super::engine_world::EngineWorld;
use super::error::SimError;
use super::event::Event;
use super::simulator::Simulator;
use super::time::SimTime;
use super::world::World;
use crate::net::{FlowId, LinkId, NodeId};
use tracing::{debug, info};

/// 流开始：登记 commodity（ECMP 立即选路），1ns 后物化路径
#[derive(Debug)]
pub struct FlowStart {
    pub flow: FlowId,
    pub src: NodeId,
    pub dst: NodeId,
}

impl Event for FlowStart {
    #[tracing::instrument(skip(self, sim, world), fields(flow = %self.flow, src = %self.src, dst = %self.dst))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) -> Result<(), SimError> {
        let FlowStart { flow, src, dst } = *self;
        let w = EngineWorld::downcast(world, "FlowStart")?;
        w.engine.on_flow_start(flow, src, dst)?;
        w.flow_started(flow);
        debug!(now = %sim.now(), "流开始");
        sim.schedule(sim.now().saturating_add(SimTime(1)), MaterializePath { flow });
        Ok(())
    }
}

#[derive(Debug)]
pub struct FlowFinish {
    pub flow: FlowId,
}

impl Event for FlowFinish {
    #[tracing::instrument(skip(self, _sim, world), fields(flow = %self.flow))]
    fn execute(self: Box<Self>, _sim: &mut Simulator, world: &mut dyn World) -> Result<(), SimError> {
        let w = EngineWorld::downcast(world, "FlowFinish")?;
        w.engine.on_flow_finish(self.flow);
        w.flow_finished(self.flow);
        Ok(())
    }
}

/// epoch 边界：重新分配，然后重试挂起的流
#[derive(Debug)]
pub struct EpochBoundary;

impl Event for EpochBoundary {
    #[tracing::instrument(skip(self, sim, world), fields(now = %sim.now()))]
    fn execute(self: Box<Self>, sim: &mut Simulator, world: &mut dyn World) -> Result<(), SimError> {
        let w = EngineWorld::downcast(world, "EpochBoundary")?;
        let assigned = w.engine.on_epoch_boundary()?;
        w.epoch_done();
        let resumed = w.retry_pending();
        info!(assigned, resumed, "⏱️  epoch 边界");
        Ok(())
    }
}

#[derive(Debug)]
pub struct CoreFailure {
    pub core: NodeId,
}

impl Event for CoreFailure {
    fn execute(self: Box<Self>, _sim: &mut Simulator, world: &mut dyn World) -> Result<(), SimError> {
        EngineWorld::downcast(world, "CoreFailure")?
            .engine
            .on_core_failure(self.core);
        Ok(())
    }
}

#[derive(Debug)]
pub struct CoreRecovery {
    pub core: NodeId,
}

impl Event for CoreRecovery {
    fn execute(self: Box<Self>, _sim: &mut Simulator, world: &mut dyn World) -> Result<(), SimError> {
        EngineWorld::downcast(world, "CoreRecovery")?
            .engine
            .on_core_recovery(self.core);
        Ok(())
    }
}

#[derive(Debug)]
pub struct LinkFailure {
    pub link: LinkId,
}

impl Event for LinkFailure {
    fn execute(self: Box<Self>, _sim: &mut Simulator, world: &mut dyn World) -> Result<(), SimError> {
        EngineWorld::downcast(world, "LinkFailure")?
            .engine
            .on_link_failure(self.link);
        Ok(())
    }
}

#[derive(Debug)]
pub struct LinkRecovery {
    pub link: LinkId,
}

impl Event for LinkRecovery {
    fn execute(self: Box<Self>, _sim: &mut Simulator, world: &mut dyn World) -> Result<(), SimError> {
        EngineWorld::downcast(world, "LinkRecovery")?
            .engine
            .on_link_recovery(self.link);
        Ok(())
    }
}

/// 查询路径分配表；缺失时由世界挂起，等下一次分配
#[derive(Debug)]
pub struct MaterializePath {
    pub flow: FlowId,
}

impl Event for MaterializePath {
    fn execute(self: Box<Self>, _sim: &mut Simulator, world: &mut dyn World) -> Result<(), SimError> {
        EngineWorld::downcast(world, "MaterializePath")?.materialize(self.flow);
        Ok(())
    }
}
