//! 均衡边着色
//!
//! 把 “上行侧 ToR -> 下行侧 ToR” 的需求多重图正则化为 K-正则二部图，再递归拆分：
//! K 为奇数时用 Hopcroft–Karp 剥离一个完美匹配，K 为偶数时沿欧拉回路按奇偶一分为二。
//! 最终得到 K 个颜色类，每类在每个 ToR 的上行 / 下行侧最多占用一次。

mod euler;
mod matching;
mod regular;
mod union_find;

pub use euler::euler_circuit_order;
pub use matching::HopcroftKarp;
pub use regular::{RegularGraph, build_k_regular};
pub use union_find::UnionFind;

use std::collections::BTreeMap;

use crate::net::{FlowId, NodeId};
use tracing::{debug, trace};

/// 把 K-正则图的边拆成 K 个颜色类（每类是一个完美匹配，元素为边下标）。
pub fn decompose(graph: &RegularGraph) -> Vec<Vec<usize>> {
    let ord: Vec<usize> = (0..graph.num_edges()).collect();
    let mut classes = Vec::with_capacity(graph.k);
    rec(&graph.left, &graph.right, ord, graph.k, graph.p, &mut classes);
    classes
}

fn rec(
    left: &[usize],
    right: &[usize],
    ord: Vec<usize>,
    k: usize,
    n: usize,
    classes: &mut Vec<Vec<usize>>,
) {
    trace!(k, edges = ord.len(), "拆分");
    match k {
        0 => {}
        1 => classes.push(ord),
        _ if k % 2 == 1 => {
            let mut hk = HopcroftKarp::new(n, n);
            for &e in &ord {
                hk.add_edge(left[e], right[e]);
            }
            hk.max_matching();

            // 重边只取一条进入匹配
            let mut matched = hk.match_left().to_vec();
            let mut class = Vec::with_capacity(n);
            let mut rest = Vec::with_capacity(ord.len().saturating_sub(n));
            for e in ord {
                if matched[left[e]] == Some(right[e]) {
                    matched[left[e]] = None;
                    class.push(e);
                } else {
                    rest.push(e);
                }
            }
            classes.push(class);
            rec(left, right, rest, k - 1, n, classes);
        }
        _ => {
            let circuit = euler_circuit_order(left, right, &ord, n);
            let mut odd = Vec::with_capacity(circuit.len() / 2);
            let mut even = Vec::with_capacity(circuit.len() / 2);
            for (pos, e) in circuit.into_iter().enumerate() {
                if pos % 2 == 1 {
                    odd.push(e);
                } else {
                    even.push(e);
                }
            }
            rec(left, right, odd, k / 2, n, classes);
            rec(left, right, even, k / 2, n, classes);
        }
    }
}

/// 对二部多重图 `a[i] -> b[i]` 的边着色，返回每条原始边的颜色（0..K）。
pub fn color_bipartite_edges(n_left: usize, n_right: usize, a: &[usize], b: &[usize]) -> Vec<usize> {
    let graph = build_k_regular(n_left, n_right, a, b);
    let classes = decompose(&graph);
    debug!(k = graph.k, p = graph.p, colors = classes.len(), "正则图拆分完成");

    let m = a.len();
    let mut colors = vec![0; m];
    for (color, class) in classes.iter().enumerate() {
        for &e in class {
            if e < m {
                colors[e] = color;
            }
        }
    }
    colors
}

/// 按 commodity 的 (源 ToR, 目的 ToR) 着色；每个 commodity 取它自己那条边的颜色。
///
/// 左侧顶点是各 ToR 的上行侧，右侧是各 ToR 的下行侧，边按输入顺序排列。
pub fn color_commodities(pairs: &[(FlowId, NodeId, NodeId)]) -> BTreeMap<FlowId, usize> {
    let mut left_ids: BTreeMap<NodeId, usize> = BTreeMap::new();
    let mut right_ids: BTreeMap<NodeId, usize> = BTreeMap::new();
    for &(_, src_tor, dst_tor) in pairs {
        let next = left_ids.len();
        left_ids.entry(src_tor).or_insert(next);
        let next = right_ids.len();
        right_ids.entry(dst_tor).or_insert(next);
    }

    let a: Vec<usize> = pairs.iter().map(|(_, s, _)| left_ids[s]).collect();
    let b: Vec<usize> = pairs.iter().map(|(_, _, d)| right_ids[d]).collect();
    let colors = color_bipartite_edges(left_ids.len(), right_ids.len(), &a, &b);

    pairs
        .iter()
        .zip(colors)
        .map(|(&(flow, _, _), color)| (flow, color))
        .collect()
}
