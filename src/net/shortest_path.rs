//! 路径搜索原语：全源最短路（Floyd–Warshall）与 Yen k 最短路。
//!
//! 两者都在拓扑构建完成后计算一次，按跳数度量，不看失效状态；
//! 失效链路在查询时再剪掉。

use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};

use super::id::NodeId;
use super::network::Network;
use super::path::AcyclicPath;
use tracing::{debug, info};

/// 不可达
pub const UNREACHABLE: u32 = u32::MAX;

/// 全源最短跳数。`dist[i][j] == UNREACHABLE` 表示不可达。
pub fn floyd_warshall(adj: &[Vec<NodeId>]) -> Vec<Vec<u32>> {
    let n = adj.len();
    let mut dist = vec![vec![UNREACHABLE; n]; n];
    for (i, nbrs) in adj.iter().enumerate() {
        dist[i][i] = 0;
        for &j in nbrs {
            if j.0 != i {
                dist[i][j.0] = 1;
            }
        }
    }

    for k in 0..n {
        for i in 0..n {
            let dik = dist[i][k];
            if dik == UNREACHABLE {
                continue;
            }
            for j in 0..n {
                let via = dik.saturating_add(dist[k][j]);
                if via < dist[i][j] {
                    dist[i][j] = via;
                }
            }
        }
    }
    dist
}

/// BFS 最短路（节点序列），跳过被屏蔽的节点与边。邻接顺序决定平局结果。
fn bfs_path(
    adj: &[Vec<NodeId>],
    src: NodeId,
    dst: NodeId,
    blocked_nodes: &HashSet<NodeId>,
    blocked_edges: &HashSet<(NodeId, NodeId)>,
) -> Option<Vec<NodeId>> {
    let mut prev: Vec<Option<NodeId>> = vec![None; adj.len()];
    let mut seen = vec![false; adj.len()];
    let mut q = VecDeque::new();
    seen[src.0] = true;
    q.push_back(src);

    while let Some(v) = q.pop_front() {
        if v == dst {
            let mut path = vec![dst];
            let mut cur = dst;
            while let Some(p) = prev[cur.0] {
                path.push(p);
                cur = p;
            }
            path.reverse();
            return Some(path);
        }
        for &nh in &adj[v.0] {
            if seen[nh.0] || blocked_nodes.contains(&nh) || blocked_edges.contains(&(v, nh)) {
                continue;
            }
            seen[nh.0] = true;
            prev[nh.0] = Some(v);
            q.push_back(nh);
        }
    }
    None
}

/// Yen 算法：src 到 dst 的前 k 条无环最短路（按跳数，平局按节点序列字典序）。
pub fn yen_k_shortest_paths(
    adj: &[Vec<NodeId>],
    src: NodeId,
    dst: NodeId,
    k: usize,
) -> Vec<Vec<NodeId>> {
    let mut found: Vec<Vec<NodeId>> = Vec::new();
    if k == 0 || src == dst {
        return found;
    }
    let Some(first) = bfs_path(adj, src, dst, &HashSet::new(), &HashSet::new()) else {
        return found;
    };
    found.push(first);

    let mut candidates: BTreeSet<(usize, Vec<NodeId>)> = BTreeSet::new();
    while found.len() < k {
        let prev = found[found.len() - 1].clone();
        for i in 0..prev.len() - 1 {
            let spur = prev[i];
            let root = &prev[..=i];

            let blocked_edges: HashSet<(NodeId, NodeId)> = found
                .iter()
                .filter(|p| p.len() > i + 1 && &p[..=i] == root)
                .map(|p| (p[i], p[i + 1]))
                .collect();
            let blocked_nodes: HashSet<NodeId> = root[..i].iter().copied().collect();

            if let Some(spur_path) = bfs_path(adj, spur, dst, &blocked_nodes, &blocked_edges) {
                let mut total = root[..i].to_vec();
                total.extend(spur_path);
                if !found.contains(&total) {
                    candidates.insert((total.len(), total));
                }
            }
        }

        match candidates.pop_first() {
            Some((_, next)) => found.push(next),
            None => break,
        }
    }
    found
}

/// 把节点序列转换成链路路径
fn to_acyclic(net: &Network, nodes: &[NodeId]) -> Option<AcyclicPath> {
    let links = nodes
        .windows(2)
        .map(|w| net.link_between(w[0], w[1]))
        .collect::<Option<Vec<_>>>()?;
    AcyclicPath::from_links(net, links).ok()
}

/// 所有 ToR 对之间的前 k 条最短路
#[tracing::instrument(skip(net))]
pub fn ksp_between_tors(net: &Network, k: usize) -> HashMap<(NodeId, NodeId), Vec<AcyclicPath>> {
    info!("计算 ToR 间 k 最短路");
    let adj = net.adjacency();
    let tors = net.tor_ids();
    let mut out = HashMap::new();
    for &i in &tors {
        for &j in &tors {
            if i == j {
                continue;
            }
            let paths: Vec<AcyclicPath> = yen_k_shortest_paths(&adj, i, j, k)
                .iter()
                .filter_map(|nodes| to_acyclic(net, nodes))
                .collect();
            debug!(src = %i, dst = %j, found = paths.len(), "ToR 对完成");
            out.insert((i, j), paths);
        }
    }
    out
}
