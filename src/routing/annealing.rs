//! 模拟退火分配
//!
//! 状态是 “目的端点 -> 槽位” 的映射，槽位对可用 core 数取模得到 core
//! （可用 core 指经由存活链路可达的 core）。
//! 能量为所有并列最大负载的 ToR-core 链路的负载之和。邻域操作是交换两个目的的槽位：
//! 一半概率限定在同一目的 ToR 之下，否则任选两个。

use std::collections::BTreeMap;

use super::commodity::{Commodity, usable_core_at};
use super::error::RoutingError;
use super::load::LinkLoadCounter;
use crate::net::{FlowId, LinkId, Network, NodeId, PathError};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

/// 退火参数
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnnealingParams {
    pub initial_temperature: f64,
    /// 每步温度乘以 (1 - cooling_rate)
    pub cooling_rate: f64,
    pub min_temperature: f64,
    /// 邻域操作选择 “同 ToR 内交换” 的概率
    pub same_tor_swap_probability: f64,
}

impl Default for AnnealingParams {
    fn default() -> Self {
        Self {
            initial_temperature: 1000.0,
            cooling_rate: 0.01,
            min_temperature: 0.1,
            same_tor_swap_probability: 0.5,
        }
    }
}

/// 一次退火的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnealingPlan {
    pub choices: Vec<(FlowId, NodeId)>,
    /// 单 commodity 走捷径时为 false，不计入耗时统计
    pub record_duration: bool,
}

#[derive(Debug, Clone)]
pub struct SimulatedAnnealing {
    rng: StdRng,
    params: AnnealingParams,
    state: BTreeMap<NodeId, usize>,
}

/// 一个跨 ToR 需求可走的 (上行, 下行) 链路，按可用 core 的顺序排列
type Routes = Vec<(LinkId, LinkId)>;

/// 一次退火内部的只读上下文
struct Landscape<'a> {
    net: &'a Network,
    dsts: Vec<NodeId>,
    /// dsts[i] 的跨 ToR 需求，同 ToR 的已剔除
    demands: Vec<Vec<Routes>>,
    /// 同一目的 ToR 下、至少两个目的的下标组
    tor_groups: Vec<Vec<usize>>,
}

impl SimulatedAnnealing {
    pub fn new(seed: u64) -> Self {
        Self::with_params(seed, AnnealingParams::default())
    }

    pub fn with_params(seed: u64, params: AnnealingParams) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            params,
            state: BTreeMap::new(),
        }
    }

    /// 上一次退火结束时每个目的端点的槽位
    pub fn state(&self) -> &BTreeMap<NodeId, usize> {
        &self.state
    }

    pub fn plan(
        &mut self,
        net: &Network,
        commodities: &[Commodity],
        cores: &[NodeId],
    ) -> Result<AnnealingPlan, RoutingError> {
        if cores.is_empty() {
            return Err(RoutingError::NoLiveCore);
        }
        match commodities {
            [] => {
                return Ok(AnnealingPlan {
                    choices: Vec::new(),
                    record_duration: false,
                });
            }
            [only] => {
                return Ok(AnnealingPlan {
                    choices: vec![(only.flow, usable_core_at(net, only, cores, 0)?)],
                    record_duration: false,
                });
            }
            _ => {}
        }

        let land = Landscape::new(net, commodities, cores)?;
        let mut current = land.initial_slots();
        let mut energy = land.energy(&current);
        let start_energy = energy;

        let AnnealingParams {
            initial_temperature,
            cooling_rate,
            min_temperature,
            same_tor_swap_probability,
        } = self.params;
        let mut temperature = initial_temperature;
        let mut steps = 0usize;
        while temperature > min_temperature {
            let candidate = land.neighbor(&current, &mut self.rng, same_tor_swap_probability);
            let candidate_energy = land.energy(&candidate);
            if accept(energy, candidate_energy, temperature, &mut self.rng) {
                current = candidate;
                energy = candidate_energy;
            }
            temperature *= 1.0 - cooling_rate;
            steps += 1;
        }
        debug!(steps, start_energy, energy, "退火结束");

        self.state = land.dsts.iter().copied().zip(current.iter().copied()).collect();
        let choices = commodities
            .iter()
            .map(|c| {
                let slot = self.state.get(&c.dst).copied().unwrap_or(0);
                Ok((c.flow, usable_core_at(net, c, cores, slot)?))
            })
            .collect::<Result<_, RoutingError>>()?;
        Ok(AnnealingPlan {
            choices,
            record_duration: true,
        })
    }
}

/// Metropolis 准则：更优必接受，更差按 exp(-Δ/T) 的概率接受
fn accept(current: u32, candidate: u32, temperature: f64, rng: &mut StdRng) -> bool {
    if candidate < current {
        return true;
    }
    let delta = f64::from(candidate) - f64::from(current);
    (-delta / temperature).exp() > rng.gen_range(0.0..1.0)
}

/// 从 0..n 中取两个不同的下标
fn two_distinct(n: usize, rng: &mut StdRng) -> (usize, usize) {
    let i = rng.gen_range(0..n);
    let mut j = rng.gen_range(0..n - 1);
    if j >= i {
        j += 1;
    }
    (i, j)
}

impl<'a> Landscape<'a> {
    fn new(
        net: &'a Network,
        commodities: &[Commodity],
        cores: &[NodeId],
    ) -> Result<Self, RoutingError> {
        let mut by_dst: BTreeMap<NodeId, Vec<Routes>> = BTreeMap::new();
        for c in commodities {
            let src_tor = net.tor_of(c.src).ok_or(PathError::NotAttached(c.src))?;
            let dst_tor = net.tor_of(c.dst).ok_or(PathError::NotAttached(c.dst))?;
            let demands = by_dst.entry(c.dst).or_default();
            if src_tor != dst_tor {
                let routes = net
                    .usable_cores(src_tor, dst_tor, cores)
                    .into_iter()
                    .filter_map(|core| {
                        Some((
                            net.present_link_between(src_tor, core)?,
                            net.present_link_between(core, dst_tor)?,
                        ))
                    })
                    .collect();
                demands.push(routes);
            }
        }
        let (dsts, demands): (Vec<_>, Vec<_>) = by_dst.into_iter().unzip();

        let mut per_tor: BTreeMap<NodeId, Vec<usize>> = BTreeMap::new();
        for (i, &d) in dsts.iter().enumerate() {
            if let Some(tor) = net.tor_of(d) {
                per_tor.entry(tor).or_default().push(i);
            }
        }
        let tor_groups = per_tor.into_values().filter(|g| g.len() > 1).collect();

        Ok(Self {
            net,
            dsts,
            demands,
            tor_groups,
        })
    }

    /// 初始槽位：目的端点在其 ToR 下的序号（ToR 端点时为 ToR 的序号）
    fn initial_slots(&self) -> Vec<usize> {
        let tors = self.net.tor_ids();
        self.dsts
            .iter()
            .map(|&d| {
                let siblings = match self.net.tor_of(d) {
                    Some(tor) if tor != d => self.net.servers_of(tor),
                    _ => tors.as_slice(),
                };
                siblings.iter().position(|&s| s == d).unwrap_or(0)
            })
            .collect()
    }

    fn energy(&self, slots: &[usize]) -> u32 {
        let mut loads = LinkLoadCounter::new(self.net.num_links());
        for (demands, &slot) in self.demands.iter().zip(slots) {
            // 无可用 core 的需求不计能量，最终映射时报错
            for routes in demands.iter().filter(|r| !r.is_empty()) {
                let (up, down) = routes[slot % routes.len()];
                loads.increment(up);
                loads.increment(down);
            }
        }
        loads.peak_sum()
    }

    /// 不足两个目的时原样返回
    fn neighbor(&self, slots: &[usize], rng: &mut StdRng, same_tor_p: f64) -> Vec<usize> {
        let mut next = slots.to_vec();
        if next.len() < 2 {
            return next;
        }
        let same_tor = rng.gen_bool(same_tor_p.clamp(0.0, 1.0));
        let (i, j) = if same_tor && !self.tor_groups.is_empty() {
            let group = &self.tor_groups[rng.gen_range(0..self.tor_groups.len())];
            let (a, b) = two_distinct(group.len(), rng);
            (group[a], group[b])
        } else {
            two_distinct(next.len(), rng)
        };
        next.swap(i, j);
        next
    }
}
