//! 贪心的 “最小 core 链路拥塞”（MCVLC）分配
//!
//! commodity 按源 ToR 的上行组和目的 ToR 的下行组分组，从最大的组开始，
//! 逐个为尚未分配的 commodity 选择 max(上行负载, 下行负载) 最小的 core
//! （并列时取 id 最小者），并立即计入负载。

use std::cmp::Reverse;
use std::collections::BTreeMap;

use super::commodity::Commodity;
use super::error::RoutingError;
use super::load::LinkLoadCounter;
use crate::net::{FlowId, LinkId, Network, NodeId, PathError};
use tracing::{debug, trace};

/// 分组键。上行组排在下行组之前，组内再按 ToR id 排。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
enum GroupKey {
    Uplink(NodeId),
    Downlink(NodeId),
}

#[derive(Debug, Default, Clone)]
pub struct McvlcRouting;

impl McvlcRouting {
    /// 负载计数在每次调用时从零开始。
    pub fn plan(
        &self,
        net: &Network,
        commodities: &[Commodity],
        cores: &[NodeId],
    ) -> Result<Vec<(FlowId, NodeId)>, RoutingError> {
        let mut tors = Vec::with_capacity(commodities.len());
        let mut groups: BTreeMap<GroupKey, Vec<usize>> = BTreeMap::new();
        for (idx, c) in commodities.iter().enumerate() {
            let src_tor = net.tor_of(c.src).ok_or(PathError::NotAttached(c.src))?;
            let dst_tor = net.tor_of(c.dst).ok_or(PathError::NotAttached(c.dst))?;
            tors.push((src_tor, dst_tor));
            groups.entry(GroupKey::Uplink(src_tor)).or_default().push(idx);
            groups.entry(GroupKey::Downlink(dst_tor)).or_default().push(idx);
        }

        // 稳定排序：大小相同的组保持键序
        let mut ordered: Vec<(GroupKey, Vec<usize>)> = groups.into_iter().collect();
        ordered.sort_by_key(|(_, members)| Reverse(members.len()));

        let mut loads = LinkLoadCounter::new(net.num_links());
        let mut chosen: Vec<Option<NodeId>> = vec![None; commodities.len()];
        for (key, members) in &ordered {
            trace!(?key, size = members.len(), "处理分组");
            for &idx in members {
                if chosen[idx].is_some() {
                    continue;
                }
                let (src_tor, dst_tor) = tors[idx];
                let c = &commodities[idx];
                let core = if src_tor == dst_tor {
                    // 同 ToR 流量不经过 core
                    cores.first().copied().ok_or(RoutingError::NoLiveCore)?
                } else {
                    let (core, up, down) = least_loaded_core(net, &loads, src_tor, dst_tor, cores)
                        .ok_or(RoutingError::NoPath {
                            src: c.src,
                            dst: c.dst,
                        })?;
                    loads.increment(up);
                    loads.increment(down);
                    core
                };
                chosen[idx] = Some(core);
            }
        }

        debug!(max_load = loads.max_load(), "MCVLC 分配完成");
        Ok(commodities
            .iter()
            .zip(chosen)
            .filter_map(|(c, core)| core.map(|core| (c.flow, core)))
            .collect())
    }
}

/// 返回负载最小的可用 core 及其上行、下行链路；上下行任一失效的 core 被跳过。
fn least_loaded_core(
    net: &Network,
    loads: &LinkLoadCounter,
    src_tor: NodeId,
    dst_tor: NodeId,
    cores: &[NodeId],
) -> Option<(NodeId, LinkId, LinkId)> {
    let mut best: Option<(u32, NodeId, LinkId, LinkId)> = None;
    for &core in cores {
        let (Some(up), Some(down)) = (
            net.present_link_between(src_tor, core),
            net.present_link_between(core, dst_tor),
        ) else {
            continue;
        };
        let load = loads.get(up).max(loads.get(down));
        if best.is_none_or(|(b, ..)| load < b) {
            best = Some((load, core, up, down));
        }
    }
    best.map(|(_, core, up, down)| (core, up, down))
}
