//! 欧拉回路拆分
//!
//! 把二部图的左右顶点分别放在 [0, n) 与 [n, 2n)，在 `ord` 给出的边集上逐个连通分量
//! 跑 Hierholzer。每个顶点度数为偶数时，回路上相邻两条边经过同一顶点一进一出，
//! 因此按位置奇偶拆分即可把每个顶点的度数平分。

/// 返回沿欧拉回路排列的边（`ord` 中的原始边下标）
pub fn euler_circuit_order(left: &[usize], right: &[usize], ord: &[usize], n: usize) -> Vec<usize> {
    let vertex_count = 2 * n;
    let mut g: Vec<Vec<(usize, usize)>> = vec![Vec::new(); vertex_count];
    for (m, &e) in ord.iter().enumerate() {
        g[left[e]].push((right[e] + n, m));
        g[right[e] + n].push((left[e], m));
    }

    let mut used_v = vec![false; vertex_count];
    let mut used_e = vec![false; ord.len()];
    let mut out = Vec::with_capacity(ord.len());

    for start in 0..vertex_count {
        if used_v[start] {
            continue;
        }

        let mut stack: Vec<(usize, Option<usize>)> = vec![(start, None)];
        let mut circuit: Vec<Option<usize>> = Vec::new();
        while let Some(&(v, via)) = stack.last() {
            used_v[v] = true;
            match g[v].pop() {
                None => {
                    circuit.push(via);
                    stack.pop();
                }
                Some((w, m)) => {
                    if used_e[m] {
                        continue;
                    }
                    used_e[m] = true;
                    stack.push((w, Some(m)));
                }
            }
        }
        // 出栈顺序是回路的逆序；起点的 None 落在末尾
        out.extend(circuit.into_iter().rev().flatten());
    }

    out.into_iter().map(|m| ord[m]).collect()
}
