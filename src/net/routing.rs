//! ECMP 路由表
//!
//! 基于 Floyd–Warshall 的全源最短跳数，为每个交换机预计算
//! 朝向每个 ToR（或全部交换机）的等价最短路径出链路集合。
//! 失效链路不在构建时剔除，而是在查询时剪掉。

use std::collections::HashMap;

use super::id::{LinkId, NodeId};
use super::network::Network;
use super::shortest_path::{UNREACHABLE, floyd_warshall};
use tracing::{debug, info};

#[derive(Debug, Default, Clone)]
pub struct RoutingTable {
    dirty: bool,
    /// true 时只为 “交换机 -> ToR” 建表，否则为 “交换机 -> 任意交换机”
    only_towards_tors: bool,
    /// (switch, dst) -> 等价最短路径上的出链路
    next_hops: HashMap<(NodeId, NodeId), Vec<LinkId>>,
}

impl RoutingTable {
    pub fn new(only_towards_tors: bool) -> Self {
        Self {
            dirty: true,
            only_towards_tors,
            next_hops: HashMap::new(),
        }
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// 确保路由表基于当前拓扑是最新的。
    #[tracing::instrument(skip(self, net), fields(nodes = net.num_nodes()))]
    pub fn ensure_built(&mut self, net: &Network) {
        if !self.dirty {
            return;
        }
        info!("计算 ECMP 路由状态（Floyd–Warshall）");

        let dist = floyd_warshall(&net.adjacency());
        self.next_hops.clear();

        let switches: Vec<NodeId> = (0..net.num_nodes())
            .map(NodeId)
            .filter(|&n| net.role(n).is_some_and(|r| r.is_switch()))
            .collect();
        let towards = if self.only_towards_tors {
            net.tor_ids()
        } else {
            switches.clone()
        };

        // 对每条出边 (i, v)，若 dist[i][j] == dist[v][j] + 1，则 (i, v) 位于到 j 的某条最短路上。
        for &i in &switches {
            for &j in &towards {
                if i == j || dist[i.0][j.0] == UNREACHABLE {
                    continue;
                }
                let cands: Vec<LinkId> = net
                    .out_links(i)
                    .iter()
                    .copied()
                    .filter(|&l| {
                        net.link(l).is_some_and(|link| {
                            let dv = dist[link.to.0][j.0];
                            dv != UNREACHABLE && dist[i.0][j.0] == dv + 1
                        })
                    })
                    .collect();
                if !cands.is_empty() {
                    self.next_hops.insert((i, j), cands);
                }
            }
        }

        debug!(entries = self.next_hops.len(), "ECMP 路由表构建完成");
        self.dirty = false;
    }

    /// 获取 (from, dst) 的 ECMP 候选出链路（含已失效的）。
    pub fn next_hops(&self, from: NodeId, dst: NodeId) -> Option<&[LinkId]> {
        self.next_hops.get(&(from, dst)).map(|v| v.as_slice())
    }

    /// 剪掉失效链路，以及之后沿最短路再也到不了 `dst` 的出链路
    pub fn live_next_hops(&self, net: &Network, from: NodeId, dst: NodeId) -> Vec<LinkId> {
        self.next_hops(from, dst)
            .unwrap_or(&[])
            .iter()
            .copied()
            .filter(|&l| {
                !net.is_link_failed(l) && net.link(l).is_some_and(|link| self.reaches(net, link.to, dst))
            })
            .collect()
    }

    // 每一跳到 dst 的距离严格减一，递归必然终止
    fn reaches(&self, net: &Network, at: NodeId, dst: NodeId) -> bool {
        at == dst || !self.live_next_hops(net, at, dst).is_empty()
    }
}

/// Robert Jenkins 的 32-bit 整数 hash，结果取绝对值（保证非负）。
pub fn jenkins_hash(a: i32) -> i32 {
    let mut a = a;
    a = a.wrapping_add(0x7ed5_5d16).wrapping_add(a.wrapping_shl(12));
    a = (a ^ (0xc761_c23c_u32 as i32)) ^ (a >> 19);
    a = a.wrapping_add(0x1656_67b1).wrapping_add(a.wrapping_shl(5));
    a = a.wrapping_add(0xd3a2_646c_u32 as i32) ^ a.wrapping_shl(9);
    a = a.wrapping_add(0xfd70_46c5_u32 as i32).wrapping_add(a.wrapping_shl(3));
    a = (a ^ (0xb55a_4f09_u32 as i32)) ^ (a >> 16);
    absolute(a)
}

/// |x|，其中 i32::MIN 映射为 i32::MAX。
pub fn absolute(x: i32) -> i32 {
    if x == i32::MIN { i32::MAX } else { x.abs() }
}

/// (src, dst) 的非连续 hash：相邻的 id 不会落到相邻的桶。
pub fn non_sequential_hash(src: i32, dst: i32) -> i32 {
    absolute(jenkins_hash(src.wrapping_add(jenkins_hash(dst))))
}

/// 在 `cands` 中为 (src, dst) 选出一条稳定的下一跳。
pub fn pick_ecmp(cands: &[LinkId], src_tor: NodeId, src: NodeId, dst: NodeId) -> LinkId {
    debug_assert!(!cands.is_empty());
    let salt = non_sequential_hash(src.0 as i32, dst.0 as i32);
    let h = jenkins_hash((src_tor.0 as i32).wrapping_add(salt));
    cands[h as usize % cands.len()]
}
