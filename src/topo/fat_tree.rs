//! Fat-tree 拓扑构建
//!
//! k-ary 三层 fat-tree：edge 层即 ToR，之上为 aggregation 与 core。
//! 只用来驱动多跳 ECMP；集中式策略要求单 core 跳的两层 fabric。

use crate::net::{Network, NodeId};

#[derive(Debug, Clone)]
pub struct FatTreeOpts {
    pub k: usize,
}

impl Default for FatTreeOpts {
    fn default() -> Self {
        Self { k: 4 }
    }
}

#[derive(Debug, Clone)]
pub struct FatTreeTopology {
    pub k: usize,
    pub hosts: Vec<NodeId>,
    pub edge_switches: Vec<NodeId>,
    pub agg_switches: Vec<NodeId>,
    pub core_switches: Vec<NodeId>,
}

impl FatTreeTopology {
    fn half(&self) -> usize {
        self.k / 2
    }

    pub fn host(&self, pod: usize, edge: usize, host: usize) -> NodeId {
        let half = self.half();
        self.hosts[(pod * half + edge) * half + host]
    }

    pub fn edge(&self, pod: usize, edge: usize) -> NodeId {
        self.edge_switches[pod * self.half() + edge]
    }

    pub fn agg(&self, pod: usize, agg: usize) -> NodeId {
        self.agg_switches[pod * self.half() + agg]
    }
}

pub fn build_fat_tree(net: &mut Network, opts: &FatTreeOpts) -> FatTreeTopology {
    let k = opts.k;
    assert!(k >= 2 && k % 2 == 0, "fat-tree k must be even and >= 2");
    let half = k / 2;

    let mut core_switches = Vec::with_capacity(half * half);
    for group in 0..half {
        for index in 0..half {
            core_switches.push(net.add_core(format!("c{}_{}", group, index)));
        }
    }

    let mut hosts = Vec::with_capacity(k * half * half);
    let mut edge_switches = Vec::with_capacity(k * half);
    let mut agg_switches = Vec::with_capacity(k * half);

    for pod in 0..k {
        let edges: Vec<NodeId> = (0..half)
            .map(|e| net.add_tor(format!("p{}_e{}", pod, e)))
            .collect();
        let aggs: Vec<NodeId> = (0..half)
            .map(|a| net.add_aggregation(format!("p{}_a{}", pod, a)))
            .collect();

        for (edge_idx, &edge_id) in edges.iter().enumerate() {
            for host in 0..half {
                let host_id = net.add_server(format!("h{}_{}_{}", pod, edge_idx, host));
                net.attach_server(host_id, edge_id);
                hosts.push(host_id);
            }
            for &agg_id in &aggs {
                net.connect_pair(edge_id, agg_id);
            }
        }

        // 第 a 个 aggregation 连接第 a 组 core
        for (agg_idx, &agg_id) in aggs.iter().enumerate() {
            for index in 0..half {
                net.connect_pair(agg_id, core_switches[agg_idx * half + index]);
            }
        }

        edge_switches.extend(edges);
        agg_switches.extend(aggs);
    }

    FatTreeTopology {
        k,
        hosts,
        edge_switches,
        agg_switches,
        core_switches,
    }
}
