//! 流量工程引擎
//!
//! 拥有拓扑、当前策略、路径分配表和耗时日志，接收调度器的回调：
//! 流开始 / 结束、epoch 边界、core 失效 / 恢复，并对外提供 `path_for` 查询。

use super::assignment::PathAssignmentTable;
use super::commodity::{Commodity, validate_commodity};
use super::error::RoutingError;
use super::strategy::RoutingStrategy;
use super::telemetry::AssignmentsDurationLogger;
use crate::net::{AcyclicPath, FlowId, LinkId, Network, NodeId, NodeRole};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct TrafficEngine {
    net: Network,
    strategy: RoutingStrategy,
    table: PathAssignmentTable,
    logger: AssignmentsDurationLogger,
}

impl TrafficEngine {
    pub fn new(net: Network, strategy: RoutingStrategy) -> Self {
        let table = PathAssignmentTable::new(&net);
        Self {
            net,
            strategy,
            table,
            logger: AssignmentsDurationLogger::disabled(),
        }
    }

    pub fn with_logger(mut self, logger: AssignmentsDurationLogger) -> Self {
        self.logger = logger;
        self
    }

    pub fn net(&self) -> &Network {
        &self.net
    }

    pub fn strategy(&self) -> &RoutingStrategy {
        &self.strategy
    }

    pub fn table(&self) -> &PathAssignmentTable {
        &self.table
    }

    pub fn logger_mut(&mut self) -> &mut AssignmentsDurationLogger {
        &mut self.logger
    }

    /// ECMP 立即选路；集中式策略只登记，等下一个 epoch 边界
    #[tracing::instrument(skip(self), fields(strategy = self.strategy.name()))]
    pub fn on_flow_start(&mut self, flow: FlowId, src: NodeId, dst: NodeId) -> Result<(), RoutingError> {
        match &mut self.strategy {
            RoutingStrategy::Ecmp(ecmp) => {
                validate_commodity(&self.net, flow, src, dst)?;
                let path = ecmp.assign_single_path(&self.net, &Commodity { flow, src, dst })?;
                debug!(hops = path.len(), "ECMP 路径");
                self.table.assign(&self.net, flow, path);
            }
            RoutingStrategy::Centralized(ctrl) => {
                ctrl.add_commodity(&self.net, flow, src, dst)?;
            }
        }
        Ok(())
    }

    #[tracing::instrument(skip(self), fields(strategy = self.strategy.name()))]
    pub fn on_flow_finish(&mut self, flow: FlowId) {
        match &mut self.strategy {
            RoutingStrategy::Ecmp(_) => {
                if self.table.release(&self.net, flow).is_none() {
                    warn!(%flow, "结束未分配的流，忽略");
                }
            }
            RoutingStrategy::Centralized(ctrl) => {
                ctrl.clear_resources(&self.net, flow, &mut self.table);
            }
        }
    }

    /// 集中式策略重新分配并写出一行耗时统计；ECMP 无事可做
    #[tracing::instrument(skip(self), fields(strategy = self.strategy.name()))]
    pub fn on_epoch_boundary(&mut self) -> Result<usize, RoutingError> {
        let RoutingStrategy::Centralized(ctrl) = &mut self.strategy else {
            return Ok(0);
        };
        let assigned = ctrl.determine_path_assignments(&self.net, &mut self.table)?;
        let avg = ctrl.average_duration_ms();
        match self.logger.save_info(avg, self.table.len()) {
            Ok(()) => debug!(rows = self.logger.rows_written(), "耗时日志已写出"),
            Err(e) => warn!(error = %e, "写耗时日志失败"),
        }
        Ok(assigned)
    }

    /// 只改变存活 core 集合，已写入的分配在下一次重新分配前保持不变
    #[tracing::instrument(skip(self))]
    pub fn on_core_failure(&mut self, core: NodeId) {
        if self.net.role(core) != Some(NodeRole::Core) {
            warn!("不是 core 节点，忽略失效事件");
            return;
        }
        self.net.fail_node(core);
        info!(live_cores = self.net.live_core_ids().len(), "core 失效");
    }

    #[tracing::instrument(skip(self))]
    pub fn on_core_recovery(&mut self, core: NodeId) {
        if self.net.role(core) != Some(NodeRole::Core) {
            warn!("不是 core 节点，忽略恢复事件");
            return;
        }
        self.net.recover_node(core);
        info!(live_cores = self.net.live_core_ids().len(), "core 恢复");
    }

    /// 单条链路失效。与 core 失效一样只影响之后的选路。
    #[tracing::instrument(skip(self))]
    pub fn on_link_failure(&mut self, link: LinkId) {
        if self.net.link(link).is_none() {
            warn!("未知链路，忽略失效事件");
            return;
        }
        self.net.fail_link(link);
    }

    #[tracing::instrument(skip(self))]
    pub fn on_link_recovery(&mut self, link: LinkId) {
        if self.net.link(link).is_none() {
            warn!("未知链路，忽略恢复事件");
            return;
        }
        self.net.recover_link(link);
    }

    /// 缺失表示尚未分配
    pub fn path_for(&self, flow: FlowId) -> Option<&AcyclicPath> {
        self.table.path_for(flow)
    }

    pub fn average_duration_ms(&self) -> f64 {
        match &self.strategy {
            RoutingStrategy::Ecmp(_) => 0.0,
            RoutingStrategy::Centralized(ctrl) => ctrl.average_duration_ms(),
        }
    }

    pub fn num_assigned_commodities(&self) -> usize {
        self.table.len()
    }

    /// ToR-core 链路上的最大负载
    pub fn max_link_load(&self) -> u32 {
        self.table.loads().max_load()
    }
}
