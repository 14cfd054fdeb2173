//! Hopcroft–Karp 二部图最大匹配

use std::collections::VecDeque;

const INF: usize = usize::MAX;

#[derive(Debug, Clone)]
pub struct HopcroftKarp {
    adj: Vec<Vec<usize>>,
    match_left: Vec<Option<usize>>,
    match_right: Vec<Option<usize>>,
    dist: Vec<usize>,
}

impl HopcroftKarp {
    pub fn new(n_left: usize, n_right: usize) -> Self {
        Self {
            adj: vec![Vec::new(); n_left],
            match_left: vec![None; n_left],
            match_right: vec![None; n_right],
            dist: vec![INF; n_left],
        }
    }

    /// 添加边 u(左) - v(右)。允许重边。
    pub fn add_edge(&mut self, u: usize, v: usize) {
        self.adj[u].push(v);
    }

    /// 分层：自由左顶点距离为 0；存在增广路时返回 true
    fn bfs(&mut self) -> bool {
        let mut q = VecDeque::new();
        for (u, m) in self.match_left.iter().enumerate() {
            if m.is_none() {
                self.dist[u] = 0;
                q.push_back(u);
            } else {
                self.dist[u] = INF;
            }
        }

        let mut found = false;
        while let Some(u) = q.pop_front() {
            for &v in &self.adj[u] {
                match self.match_right[v] {
                    None => found = true,
                    Some(w) if self.dist[w] == INF => {
                        self.dist[w] = self.dist[u] + 1;
                        q.push_back(w);
                    }
                    Some(_) => {}
                }
            }
        }
        found
    }

    /// 沿分层图找一条从 u 出发的最短增广路
    fn dfs(&mut self, u: usize) -> bool {
        for i in 0..self.adj[u].len() {
            let v = self.adj[u][i];
            let owner = self.match_right[v];
            let augment = match owner {
                None => true,
                Some(w) => self.dist[w] == self.dist[u].saturating_add(1) && self.dfs(w),
            };
            if augment {
                self.match_left[u] = Some(v);
                self.match_right[v] = Some(u);
                return true;
            }
        }
        self.dist[u] = INF;
        false
    }

    /// 计算最大匹配，返回匹配边数
    pub fn max_matching(&mut self) -> usize {
        let mut size = self.match_left.iter().filter(|m| m.is_some()).count();
        while self.bfs() {
            for u in 0..self.adj.len() {
                if self.match_left[u].is_none() && self.dfs(u) {
                    size += 1;
                }
            }
        }
        size
    }

    pub fn match_left(&self) -> &[Option<usize>] {
        &self.match_left
    }

    /// 当前匹配的 (左, 右) 对，按左顶点升序
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        self.match_left
            .iter()
            .enumerate()
            .filter_map(|(u, m)| m.map(|v| (u, v)))
            .collect()
    }
}
