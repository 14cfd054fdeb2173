//! 分布式 ECMP 路由
//!
//! 每个 commodity 独立选路：从源 ToR 起逐跳在等价最短路出链路中做
//! 确定性 hash 选择，直到目的 ToR。不做全局协调，也不看负载。

use super::commodity::Commodity;
use super::error::RoutingError;
use crate::net::{AcyclicPath, Network, RoutingTable, pick_ecmp};
use tracing::trace;

#[derive(Debug, Clone)]
pub struct EcmpRouting {
    table: RoutingTable,
}

impl EcmpRouting {
    /// 基于当前拓扑构建 “交换机 -> ToR” 的 ECMP 路由表
    pub fn new(net: &Network) -> Self {
        let mut table = RoutingTable::new(true);
        table.ensure_built(net);
        Self { table }
    }

    /// 拓扑结构（不是失效状态）变化后调用
    pub fn rebuild(&mut self, net: &Network) {
        self.table.mark_dirty();
        self.table.ensure_built(net);
    }

    /// 为单个 commodity 选路。同一拓扑和失效状态下结果确定。
    pub fn assign_single_path(
        &self,
        net: &Network,
        commodity: &Commodity,
    ) -> Result<AcyclicPath, RoutingError> {
        let Commodity { src, dst, .. } = *commodity;
        let no_path = || RoutingError::NoPath { src, dst };
        let src_tor = net.tor_of(src).ok_or_else(no_path)?;
        let dst_tor = net.tor_of(dst).ok_or_else(no_path)?;

        let mut links = Vec::new();
        if src != src_tor {
            links.push(net.present_link_between(src, src_tor).ok_or_else(no_path)?);
        }

        // 最短路上跳数不会超过节点数
        let mut at = src_tor;
        let mut steps = 0;
        while at != dst_tor {
            if steps > net.num_nodes() {
                return Err(no_path());
            }
            let cands = self.table.live_next_hops(net, at, dst_tor);
            if cands.is_empty() {
                return Err(no_path());
            }
            let link = pick_ecmp(&cands, src_tor, src, dst);
            trace!(%at, candidates = cands.len(), ?link, "ECMP 选择下一跳");
            links.push(link);
            at = net.link(link).ok_or_else(no_path)?.to;
            steps += 1;
        }

        if dst != dst_tor {
            links.push(net.present_link_between(dst_tor, dst).ok_or_else(no_path)?);
        }
        Ok(AcyclicPath::from_links(net, links)?)
    }
}
