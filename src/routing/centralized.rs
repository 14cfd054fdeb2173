//! 集中式控制器：持有 commodity 注册表，在 epoch 边界为全部活跃 commodity 重新分配。

use std::time::Instant;

use super::annealing::SimulatedAnnealing;
use super::commodity::{Commodity, CommodityRegistry};
use super::edge_coloring::EdgeColoringRouting;
use super::error::RoutingError;
use super::assignment::PathAssignmentTable;
use super::mcvlc::McvlcRouting;
use super::solver_bridge::ExternalSolverRouting;
use super::telemetry::AssignmentDurations;
use crate::net::{FlowId, Network, NodeId, construct_path};
use tracing::{debug, info, warn};

/// 批量分配算法
#[derive(Debug, Clone)]
pub enum CentralizedAlgorithm {
    Mcvlc(McvlcRouting),
    SimulatedAnnealing(SimulatedAnnealing),
    EdgeColoring(EdgeColoringRouting),
    External(ExternalSolverRouting),
}

impl CentralizedAlgorithm {
    pub fn name(&self) -> &'static str {
        match self {
            CentralizedAlgorithm::Mcvlc(_) => "mcvlc",
            CentralizedAlgorithm::SimulatedAnnealing(_) => "simulated_annealing",
            CentralizedAlgorithm::EdgeColoring(_) => "edge_coloring",
            CentralizedAlgorithm::External(ext) => ext.kind().name(),
        }
    }

    /// 返回 (flow -> core) 选择，以及本次是否计入耗时统计
    fn plan(
        &mut self,
        net: &Network,
        commodities: &[Commodity],
        cores: &[NodeId],
    ) -> Result<(Vec<(FlowId, NodeId)>, bool), RoutingError> {
        match self {
            CentralizedAlgorithm::Mcvlc(alg) => Ok((alg.plan(net, commodities, cores)?, true)),
            CentralizedAlgorithm::SimulatedAnnealing(alg) => {
                let plan = alg.plan(net, commodities, cores)?;
                Ok((plan.choices, plan.record_duration))
            }
            CentralizedAlgorithm::EdgeColoring(alg) => {
                Ok((alg.plan(net, commodities, cores)?, true))
            }
            CentralizedAlgorithm::External(alg) => Ok((alg.plan(net, commodities, cores)?, true)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CentralizedRouting {
    algorithm: CentralizedAlgorithm,
    registry: CommodityRegistry,
    durations: AssignmentDurations,
}

impl CentralizedRouting {
    pub fn new(algorithm: CentralizedAlgorithm) -> Self {
        Self {
            algorithm,
            registry: CommodityRegistry::default(),
            durations: AssignmentDurations::default(),
        }
    }

    pub fn name(&self) -> &'static str {
        self.algorithm.name()
    }

    pub fn algorithm(&self) -> &CentralizedAlgorithm {
        &self.algorithm
    }

    pub fn registry(&self) -> &CommodityRegistry {
        &self.registry
    }

    pub fn durations(&self) -> &AssignmentDurations {
        &self.durations
    }

    pub fn average_duration_ms(&self) -> f64 {
        self.durations.average_ms()
    }

    pub fn add_commodity(
        &mut self,
        net: &Network,
        flow: FlowId,
        src: NodeId,
        dst: NodeId,
    ) -> Result<(), RoutingError> {
        self.registry.add(net, flow, src, dst)?;
        Ok(())
    }

    /// 移除需求并归还其路径占用的负载
    pub fn clear_resources(&mut self, net: &Network, flow: FlowId, table: &mut PathAssignmentTable) {
        if self.registry.remove(flow).is_none() {
            warn!(%flow, "清理未注册的流，忽略");
        }
        table.release(net, flow);
    }

    /// 为全部活跃 commodity 重新计算分配并写入 `table`，返回写入条数。
    ///
    /// 所有路径都构造成功后才写表：失败时表保持调用前的状态。
    #[tracing::instrument(skip_all, fields(strategy = self.name(), commodities = self.registry.len()))]
    pub fn determine_path_assignments(
        &mut self,
        net: &Network,
        table: &mut PathAssignmentTable,
    ) -> Result<usize, RoutingError> {
        if self.registry.is_empty() {
            debug!("没有活跃 commodity，跳过分配");
            return Ok(0);
        }
        let cores = net.live_core_ids();
        if cores.is_empty() {
            return Err(RoutingError::NoLiveCore);
        }

        let start = Instant::now();
        let commodities: Vec<Commodity> = self.registry.iter().copied().collect();
        let (choices, record_duration) = self.algorithm.plan(net, &commodities, &cores)?;

        let mut paths = Vec::with_capacity(choices.len());
        for (flow, core) in choices {
            let Some(c) = self.registry.get(flow) else {
                continue;
            };
            paths.push((flow, construct_path(net, c.src, c.dst, core)?));
        }
        let assigned = paths.len();
        for (flow, path) in paths {
            table.assign(net, flow, path);
        }
        if record_duration {
            self.durations.record(start.elapsed());
        }

        info!(
            assigned,
            max_load = table.loads().max_load(),
            "✅ 路径分配完成"
        );
        Ok(assigned)
    }
}
