//! 链路负载计数
//!
//! 以 [`LinkId`] 为下标的计数数组：每条 ToR-core 有向链路上当前被分配的 commodity 数。
//! 计数永不为负。

use crate::net::{AcyclicPath, LinkId, Network};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct LinkLoadCounter {
    counts: Vec<u32>,
}

impl LinkLoadCounter {
    pub fn new(num_links: usize) -> Self {
        Self {
            counts: vec![0; num_links],
        }
    }

    pub fn get(&self, link: LinkId) -> u32 {
        self.counts.get(link.0).copied().unwrap_or(0)
    }

    pub fn increment(&mut self, link: LinkId) {
        if link.0 >= self.counts.len() {
            self.counts.resize(link.0 + 1, 0);
        }
        self.counts[link.0] += 1;
    }

    pub fn decrement(&mut self, link: LinkId) {
        if let Some(c) = self.counts.get_mut(link.0) {
            *c = c.saturating_sub(1);
        }
    }

    /// 路径上每条 ToR-core 链路 +1
    pub fn add_path(&mut self, net: &Network, path: &AcyclicPath) {
        for link in path.core_links(net) {
            self.increment(link);
        }
    }

    /// 路径上每条 ToR-core 链路 -1
    pub fn remove_path(&mut self, net: &Network, path: &AcyclicPath) {
        for link in path.core_links(net) {
            self.decrement(link);
        }
    }

    pub fn max_load(&self) -> u32 {
        self.counts.iter().copied().max().unwrap_or(0)
    }

    /// 所有并列最大负载链路的计数之和（最大值 × 并列条数）；全零时为 0。
    pub fn peak_sum(&self) -> u32 {
        let max = self.max_load();
        if max == 0 {
            return 0;
        }
        self.counts.iter().filter(|&&c| c == max).sum()
    }

    /// 计数非零的链路
    pub fn iter_loaded(&self) -> impl Iterator<Item = (LinkId, u32)> + '_ {
        self.counts
            .iter()
            .enumerate()
            .filter(|(_, c)| **c > 0)
            .map(|(i, &c)| (LinkId(i), c))
    }

    pub fn clear(&mut self) {
        self.counts.iter_mut().for_each(|c| *c = 0);
    }
}
