//! Commodity 注册表
//!
//! 记录当前活跃的 (src, dst) 需求：流开始时加入，流结束时移除。

use std::collections::BTreeMap;

use super::error::RoutingError;
use crate::net::{FlowId, Network, NodeId, PathError};
use tracing::{debug, warn};

/// 一个活跃需求。同一 (src, dst) 可以被多个流同时占用。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Commodity {
    pub flow: FlowId,
    pub src: NodeId,
    pub dst: NodeId,
}

/// 端点必须不同，且都是拓扑里的合法端点（服务器，或无服务器时的 ToR）。
pub fn validate_commodity(
    net: &Network,
    flow: FlowId,
    src: NodeId,
    dst: NodeId,
) -> Result<(), RoutingError> {
    let reason = if src == dst {
        format!("source and destination are both {}", src)
    } else if !net.is_endpoint(src) {
        format!("source {} is not a valid endpoint", src)
    } else if !net.is_endpoint(dst) {
        format!("destination {} is not a valid endpoint", dst)
    } else {
        return Ok(());
    };
    Err(RoutingError::InvalidCommodity { flow, reason })
}

/// 把颜色 / 槽位映射到 core：只在经由存活链路可达的 core 中取模。
/// 没有链路失效时等价于 `cores[index % cores.len()]`。
pub(crate) fn usable_core_at(
    net: &Network,
    c: &Commodity,
    cores: &[NodeId],
    index: usize,
) -> Result<NodeId, RoutingError> {
    let src_tor = net.tor_of(c.src).ok_or(PathError::NotAttached(c.src))?;
    let dst_tor = net.tor_of(c.dst).ok_or(PathError::NotAttached(c.dst))?;
    let usable = net.usable_cores(src_tor, dst_tor, cores);
    if usable.is_empty() {
        return Err(RoutingError::NoPath {
            src: c.src,
            dst: c.dst,
        });
    }
    Ok(usable[index % usable.len()])
}

/// 按流 id 有序，保证每次分配遍历顺序确定
#[derive(Debug, Default, Clone)]
pub struct CommodityRegistry {
    entries: BTreeMap<FlowId, Commodity>,
}

impl CommodityRegistry {
    /// 注册需求。对同一流 id 幂等；新加入时返回 true。
    pub fn add(
        &mut self,
        net: &Network,
        flow: FlowId,
        src: NodeId,
        dst: NodeId,
    ) -> Result<bool, RoutingError> {
        validate_commodity(net, flow, src, dst)?;
        if let Some(existing) = self.entries.get(&flow) {
            if existing.src != src || existing.dst != dst {
                warn!(%flow, "重复注册的流端点不一致，保留首次注册");
            }
            return Ok(false);
        }
        debug!(%flow, %src, %dst, "注册 commodity");
        self.entries.insert(flow, Commodity { flow, src, dst });
        Ok(true)
    }

    /// 移除需求；不存在时为 no-op
    pub fn remove(&mut self, flow: FlowId) -> Option<Commodity> {
        self.entries.remove(&flow)
    }

    pub fn get(&self, flow: FlowId) -> Option<&Commodity> {
        self.entries.get(&flow)
    }

    pub fn contains(&self, flow: FlowId) -> bool {
        self.entries.contains_key(&flow)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Commodity> + '_ {
        self.entries.values()
    }
}
