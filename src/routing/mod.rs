//! 流量工程路由
//!
//! 为每个活跃 commodity 选择一个 core，写入路径分配表。
//! 分布式策略（ECMP）在流开始时逐流选路；集中式策略（MCVLC、模拟退火、边着色、外部求解器）
//! 在 epoch 边界为全部活跃 commodity 一次性重新分配。

mod annealing;
mod assignment;
mod centralized;
mod commodity;
mod ecmp;
mod edge_coloring;
mod engine;
mod error;
mod load;
mod mcvlc;
mod solver_bridge;
mod strategy;
mod telemetry;

pub use annealing::{AnnealingParams, AnnealingPlan, SimulatedAnnealing};
pub use assignment::PathAssignmentTable;
pub use centralized::{CentralizedAlgorithm, CentralizedRouting};
pub use commodity::{Commodity, CommodityRegistry, validate_commodity};
pub use ecmp::EcmpRouting;
pub use edge_coloring::EdgeColoringRouting;
pub use engine::TrafficEngine;
pub use error::{RoutingError, SolverError};
pub use load::LinkLoadCounter;
pub use mcvlc::McvlcRouting;
pub use solver_bridge::{
    ExternalSolverRouting, SolverBridge, SolverConfig, SolverKind, format_list, format_pair_map,
    parse_response,
};
pub use strategy::{RoutingStrategy, StrategyKind};
pub use telemetry::{AssignmentDurations, AssignmentsDurationLogger};
