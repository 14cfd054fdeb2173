//! 路径分配表
//!
//! flow -> 选定路径（等价于选定的 core）。只由当前路由策略写入，
//! 并与内部的 [`LinkLoadCounter`] 同步更新：任何时刻每条链路的计数
//! 都等于当前分配中经过它的 commodity 数。

use std::collections::{BTreeMap, HashMap};

use super::load::LinkLoadCounter;
use crate::net::{AcyclicPath, FlowId, LinkId, Network, NodeId};
use tracing::trace;

#[derive(Debug, Default, Clone)]
pub struct PathAssignmentTable {
    paths: BTreeMap<FlowId, AcyclicPath>,
    loads: LinkLoadCounter,
}

impl PathAssignmentTable {
    pub fn new(net: &Network) -> Self {
        Self {
            paths: BTreeMap::new(),
            loads: LinkLoadCounter::new(net.num_links()),
        }
    }

    /// 写入（或替换）一条分配，返回旧路径
    pub fn assign(&mut self, net: &Network, flow: FlowId, path: AcyclicPath) -> Option<AcyclicPath> {
        trace!(%flow, hops = path.len(), "写入路径分配");
        self.loads.add_path(net, &path);
        let old = self.paths.insert(flow, path);
        if let Some(old) = &old {
            self.loads.remove_path(net, old);
        }
        old
    }

    /// 删除分配并归还负载；不存在时为 no-op
    pub fn release(&mut self, net: &Network, flow: FlowId) -> Option<AcyclicPath> {
        let old = self.paths.remove(&flow)?;
        self.loads.remove_path(net, &old);
        Some(old)
    }

    /// 缺失表示 “尚未分配”，调用方应在下一次分配后重试
    pub fn path_for(&self, flow: FlowId) -> Option<&AcyclicPath> {
        self.paths.get(&flow)
    }

    pub fn core_for(&self, net: &Network, flow: FlowId) -> Option<NodeId> {
        self.path_for(flow).and_then(|p| p.core(net))
    }

    pub fn loads(&self) -> &LinkLoadCounter {
        &self.loads
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (FlowId, &AcyclicPath)> + '_ {
        self.paths.iter().map(|(&f, p)| (f, p))
    }

    /// 每条链路（含服务器跳）被多少条已分配路径使用
    pub fn link_utilization(&self) -> HashMap<LinkId, usize> {
        let mut util = HashMap::new();
        for path in self.paths.values() {
            for &link in path.links() {
                *util.entry(link).or_insert(0) += 1;
            }
        }
        util
    }
}
