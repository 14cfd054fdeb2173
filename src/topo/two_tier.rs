//! 两层 ToR/core 拓扑构建
//!
//! 每个 ToR 与每个 core 之间有一对有向链路，服务器挂在 ToR 下。
//! 节点编号顺序为：ToR、core、服务器（按 ToR 分组）。

use crate::net::{Network, NodeId};

#[derive(Debug, Clone)]
pub struct TwoTierOpts {
    pub num_tors: usize,
    pub num_cores: usize,
    /// 为 0 时 ToR 本身就是端点
    pub servers_per_tor: usize,
}

impl Default for TwoTierOpts {
    fn default() -> Self {
        Self {
            num_tors: 2,
            num_cores: 2,
            servers_per_tor: 2,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TwoTierTopology {
    pub servers_per_tor: usize,
    pub tors: Vec<NodeId>,
    pub cores: Vec<NodeId>,
    pub servers: Vec<NodeId>,
}

impl TwoTierTopology {
    pub fn tor(&self, index: usize) -> NodeId {
        self.tors[index]
    }

    pub fn core(&self, index: usize) -> NodeId {
        self.cores[index]
    }

    pub fn server(&self, tor: usize, index: usize) -> NodeId {
        self.servers[tor * self.servers_per_tor + index]
    }

    /// commodity 可用的端点：有服务器时为服务器，否则为 ToR
    pub fn endpoints(&self) -> &[NodeId] {
        if self.servers.is_empty() {
            &self.tors
        } else {
            &self.servers
        }
    }
}

pub fn build_two_tier(net: &mut Network, opts: &TwoTierOpts) -> TwoTierTopology {
    assert!(opts.num_tors >= 1, "two-tier topology needs at least one ToR");
    assert!(opts.num_cores >= 1, "two-tier topology needs at least one core");

    let tors: Vec<NodeId> = (0..opts.num_tors)
        .map(|t| net.add_tor(format!("tor{}", t)))
        .collect();
    let cores: Vec<NodeId> = (0..opts.num_cores)
        .map(|c| net.add_core(format!("core{}", c)))
        .collect();

    for &tor in &tors {
        for &core in &cores {
            net.connect_pair(tor, core);
        }
    }

    let mut servers = Vec::with_capacity(opts.num_tors * opts.servers_per_tor);
    for (t, &tor) in tors.iter().enumerate() {
        for s in 0..opts.servers_per_tor {
            let server = net.add_server(format!("s{}_{}", t, s));
            net.attach_server(server, tor);
            servers.push(server);
        }
    }

    TwoTierTopology {
        servers_per_tor: opts.servers_per_tor,
        tors,
        cores,
        servers,
    }
}
