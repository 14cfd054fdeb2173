//! 路由策略：分布式（逐流）或集中式（批量）二选一

use std::fmt;
use std::str::FromStr;

use super::annealing::SimulatedAnnealing;
use super::centralized::{CentralizedAlgorithm, CentralizedRouting};
use super::ecmp::EcmpRouting;
use super::edge_coloring::EdgeColoringRouting;
use super::mcvlc::McvlcRouting;
use super::solver_bridge::{ExternalSolverRouting, SolverConfig};
use crate::net::Network;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone)]
pub enum RoutingStrategy {
    Ecmp(EcmpRouting),
    Centralized(CentralizedRouting),
}

impl RoutingStrategy {
    pub fn name(&self) -> &'static str {
        match self {
            RoutingStrategy::Ecmp(_) => "ecmp",
            RoutingStrategy::Centralized(ctrl) => ctrl.name(),
        }
    }
}

/// 配置 / 命令行中使用的策略名
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    #[default]
    Ecmp,
    Mcvlc,
    SimulatedAnnealing,
    EdgeColoring,
    /// 外部求解器，具体类型由求解器配置决定
    External,
}

impl StrategyKind {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyKind::Ecmp => "ecmp",
            StrategyKind::Mcvlc => "mcvlc",
            StrategyKind::SimulatedAnnealing => "simulated_annealing",
            StrategyKind::EdgeColoring => "edge_coloring",
            StrategyKind::External => "external",
        }
    }

    /// `External` 需要求解器配置，缺失时返回 `None`
    pub fn build(self, net: &Network, seed: u64, solver: Option<SolverConfig>) -> Option<RoutingStrategy> {
        let algorithm = match self {
            StrategyKind::Ecmp => return Some(RoutingStrategy::Ecmp(EcmpRouting::new(net))),
            StrategyKind::Mcvlc => CentralizedAlgorithm::Mcvlc(McvlcRouting),
            StrategyKind::SimulatedAnnealing => {
                CentralizedAlgorithm::SimulatedAnnealing(SimulatedAnnealing::new(seed))
            }
            StrategyKind::EdgeColoring => CentralizedAlgorithm::EdgeColoring(EdgeColoringRouting),
            StrategyKind::External => CentralizedAlgorithm::External(ExternalSolverRouting::new(solver?)),
        };
        Some(RoutingStrategy::Centralized(CentralizedRouting::new(algorithm)))
    }
}

impl fmt::Display for StrategyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "ecmp" => Ok(StrategyKind::Ecmp),
            "mcvlc" | "greedy" => Ok(StrategyKind::Mcvlc),
            "simulated_annealing" | "sa" => Ok(StrategyKind::SimulatedAnnealing),
            "edge_coloring" => Ok(StrategyKind::EdgeColoring),
            "external" | "lp_solver" | "ilp" => Ok(StrategyKind::External),
            other => Err(format!(
                "unknown strategy {other:?} (expected ecmp|mcvlc|simulated_annealing|edge_coloring|external)"
            )),
        }
    }
}
