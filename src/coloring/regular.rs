//! 二部多重图的 K-正则化
//!
//! K 取两侧最大度数。每侧独立地用度数受限的并查集反复合并度数最小的两个顶点
//! （合并后度数不超过 K），两侧收缩后的顶点数取较大者 p；原始边映射到收缩后的
//! 端点上，再在未满的顶点之间补虚拟边，直到每个顶点度数恰为 K。

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use super::union_find::UnionFind;

/// K-正则二部多重图：左右各 p 个顶点，第 i 条边为 (left[i], right[i])。
///
/// 前 m 条边对应原始边（同序），其余是补齐用的虚拟边。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegularGraph {
    pub k: usize,
    pub p: usize,
    pub left: Vec<usize>,
    pub right: Vec<usize>,
}

impl RegularGraph {
    pub fn num_edges(&self) -> usize {
        self.left.len()
    }

    /// (左侧度数, 右侧度数)
    pub fn degrees(&self) -> (Vec<usize>, Vec<usize>) {
        let mut dl = vec![0; self.p];
        let mut dr = vec![0; self.p];
        for (&u, &v) in self.left.iter().zip(&self.right) {
            dl[u] += 1;
            dr[v] += 1;
        }
        (dl, dr)
    }
}

/// 总是合并当前度数最小的两个桶，直到最小两者之和超过 k。
fn contract(deg: &[usize], k: usize) -> UnionFind {
    let mut heap: BinaryHeap<Reverse<(usize, usize)>> = deg
        .iter()
        .enumerate()
        .map(|(i, &d)| Reverse((d, i)))
        .collect();
    let mut uf = UnionFind::new(deg.len());

    while heap.len() >= 2 {
        let (Some(Reverse((dp, p))), Some(Reverse((dq, q)))) = (heap.pop(), heap.pop()) else {
            break;
        };
        // 最小的两个都合不进去，其余任何一对也合不进去
        if dp + dq > k {
            break;
        }
        uf.union(p, q);
        heap.push(Reverse((dp + dq, p)));
    }
    uf
}

/// 收缩后每个代表元的新编号
fn compact_ids(uf: &mut UnionFind, n: usize) -> (Vec<usize>, usize) {
    let mut ids = vec![usize::MAX; n];
    let mut next = 0;
    for i in 0..n {
        if uf.find(i) == i {
            ids[i] = next;
            next += 1;
        }
    }
    (ids, next)
}

/// 以 `a[i] -> b[i]` 为边（左 n_left 个顶点、右 n_right 个顶点）构造 K-正则图。
pub fn build_k_regular(n_left: usize, n_right: usize, a: &[usize], b: &[usize]) -> RegularGraph {
    debug_assert_eq!(a.len(), b.len());
    if a.is_empty() {
        return RegularGraph {
            k: 0,
            p: 0,
            left: Vec::new(),
            right: Vec::new(),
        };
    }

    let mut dega = vec![0; n_left];
    let mut degb = vec![0; n_right];
    for &u in a {
        dega[u] += 1;
    }
    for &v in b {
        degb[v] += 1;
    }
    let k = dega.iter().chain(&degb).copied().max().unwrap_or(0);

    let mut ufa = contract(&dega, k);
    let (ida, pa) = compact_ids(&mut ufa, n_left);
    let mut ufb = contract(&degb, k);
    let (idb, pb) = compact_ids(&mut ufb, n_right);
    let p = pa.max(pb);

    let mut dega = vec![0; p];
    let mut degb = vec![0; p];
    let mut left = Vec::with_capacity(p * k);
    let mut right = Vec::with_capacity(p * k);
    for (&u, &v) in a.iter().zip(b) {
        let cu = ida[ufa.find(u)];
        let cv = idb[ufb.find(v)];
        left.push(cu);
        right.push(cv);
        dega[cu] += 1;
        degb[cv] += 1;
    }

    // 两侧缺口总数相等（都是 p*k - m），按顺序补齐
    let mut j = 0;
    for i in 0..p {
        while dega[i] < k {
            while degb[j] == k {
                j += 1;
            }
            left.push(i);
            right.push(j);
            dega[i] += 1;
            degb[j] += 1;
        }
    }

    RegularGraph { k, p, left, right }
}
