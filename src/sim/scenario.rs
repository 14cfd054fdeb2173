//! 场景文件
//!
//! JSON 描述的一次流量工程仿真：拓扑、路由策略、流、epoch 边界、core 失效和 ToR-core 链路失效。
//! 流端点、ToR 与 core 都用拓扑内的下标引用（端点为服务器，没有服务器时为 ToR）。

use std::fs;
use std::path::{Path, PathBuf};

use super::engine_events::{
    CoreFailure, CoreRecovery, EpochBoundary, FlowFinish, FlowStart, LinkFailure, LinkRecovery,
};
use super::engine_world::EngineWorld;
use super::simulator::Simulator;
use super::time::SimTime;
use crate::net::{FlowId, Network, NodeId};
use crate::routing::{AssignmentsDurationLogger, SolverConfig, StrategyKind, TrafficEngine};
use crate::topo::fat_tree::{FatTreeOpts, build_fat_tree};
use crate::topo::two_tier::{TwoTierOpts, build_two_tier};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ScenarioError {
    #[error("read scenario {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parse scenario: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("invalid scenario: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScenarioSpec {
    pub schema_version: u32,
    #[serde(default)]
    pub meta: Option<ScenarioMeta>,
    pub topology: TopologySpec,
    #[serde(default)]
    pub routing: RoutingSpec,
    #[serde(default)]
    pub flows: Vec<FlowSpec>,
    #[serde(default)]
    pub epochs: Vec<EpochSpec>,
    #[serde(default)]
    pub core_failures: Vec<CoreFailureSpec>,
    #[serde(default)]
    pub link_failures: Vec<LinkFailureSpec>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ScenarioMeta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TopologySpec {
    TwoTier {
        num_tors: usize,
        num_cores: usize,
        /// 0 表示 ToR 本身为端点
        #[serde(default)]
        servers_per_tor: usize,
    },
    FatTree { k: usize },
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoutingSpec {
    #[serde(default)]
    pub strategy: StrategyKind,
    /// 模拟退火的随机种子
    #[serde(default)]
    pub seed: u64,
    #[serde(default)]
    pub solver: Option<SolverConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlowSpec {
    pub id: u64,
    pub src: usize,
    pub dst: usize,
    #[serde(default)]
    pub start_us: u64,
    #[serde(default)]
    pub finish_us: Option<u64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EpochSpec {
    pub at_us: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CoreFailureSpec {
    /// 在 core 列表中的下标
    pub core: usize,
    #[serde(default)]
    pub at_us: u64,
    #[serde(default)]
    pub recover_us: Option<u64>,
}

/// 失效的是 ToR 与 core 之间哪个方向的链路
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkDirection {
    /// ToR -> core
    Uplink,
    /// core -> ToR
    Downlink,
    #[default]
    Both,
}

/// 两层拓扑中一条（或一对）ToR-core 链路的失效
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkFailureSpec {
    /// 在 ToR 列表中的下标
    pub tor: usize,
    /// 在 core 列表中的下标
    pub core: usize,
    #[serde(default)]
    pub direction: LinkDirection,
    #[serde(default)]
    pub at_us: u64,
    #[serde(default)]
    pub recover_us: Option<u64>,
}

/// 构建好的拓扑及其端点 / ToR / core 列表
#[derive(Debug, Clone)]
pub struct BuiltTopology {
    pub net: Network,
    pub endpoints: Vec<NodeId>,
    pub tors: Vec<NodeId>,
    pub cores: Vec<NodeId>,
}

fn invalid(msg: impl Into<String>) -> ScenarioError {
    ScenarioError::Invalid(msg.into())
}

impl ScenarioSpec {
    /// 只做语法解析；语义检查在 [`ScenarioSpec::validate`]，便于先应用命令行覆盖
    pub fn from_json(raw: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn load(path: &Path) -> Result<Self, ScenarioError> {
        let raw = fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&raw)
    }

    /// 结构检查；端点 / core 下标在 [`ScenarioSpec::prepare`] 时对照拓扑检查
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.schema_version != SCHEMA_VERSION {
            return Err(invalid(format!(
                "unsupported schema_version {} (expected {})",
                self.schema_version, SCHEMA_VERSION
            )));
        }
        match self.topology {
            TopologySpec::TwoTier {
                num_tors, num_cores, ..
            } => {
                if num_tors == 0 || num_cores == 0 {
                    return Err(invalid("two_tier needs at least one ToR and one core"));
                }
            }
            TopologySpec::FatTree { k } => {
                if k < 2 || k % 2 != 0 {
                    return Err(invalid(format!("fat_tree k must be even and >= 2, got {k}")));
                }
                if !self.link_failures.is_empty() {
                    return Err(invalid("link_failures need a two_tier topology"));
                }
                if self.routing.strategy != StrategyKind::Ecmp {
                    return Err(invalid(format!(
                        "strategy {} needs a two_tier topology",
                        self.routing.strategy
                    )));
                }
            }
        }
        if self.routing.strategy == StrategyKind::External && self.routing.solver.is_none() {
            return Err(invalid("strategy external needs a routing.solver block"));
        }

        let mut seen = std::collections::BTreeSet::new();
        for f in &self.flows {
            if !seen.insert(f.id) {
                return Err(invalid(format!("duplicate flow id {}", f.id)));
            }
            // 同一时刻结束先于开始执行，所以结束时间必须严格晚于开始时间
            if f.finish_us.is_some_and(|end| end <= f.start_us) {
                return Err(invalid(format!("flow {} must finish after it starts", f.id)));
            }
        }
        for c in &self.core_failures {
            if c.recover_us.is_some_and(|r| r < c.at_us) {
                return Err(invalid(format!("core {} recovers before it fails", c.core)));
            }
        }
        for l in &self.link_failures {
            if l.recover_us.is_some_and(|r| r < l.at_us) {
                return Err(invalid(format!(
                    "link tor {} / core {} recovers before it fails",
                    l.tor, l.core
                )));
            }
        }
        Ok(())
    }

    pub fn build_topology(&self) -> BuiltTopology {
        let mut net = Network::default();
        match self.topology {
            TopologySpec::TwoTier {
                num_tors,
                num_cores,
                servers_per_tor,
            } => {
                let topo = build_two_tier(
                    &mut net,
                    &TwoTierOpts {
                        num_tors,
                        num_cores,
                        servers_per_tor,
                    },
                );
                let endpoints = topo.endpoints().to_vec();
                BuiltTopology {
                    net,
                    endpoints,
                    tors: topo.tors,
                    cores: topo.cores,
                }
            }
            TopologySpec::FatTree { k } => {
                let topo = build_fat_tree(&mut net, &FatTreeOpts { k });
                BuiltTopology {
                    net,
                    endpoints: topo.hosts,
                    tors: topo.edge_switches,
                    cores: topo.core_switches,
                }
            }
        }
    }

    /// 构建拓扑、引擎与世界，并把所有场景事件放进仿真器。
    ///
    /// 同一时刻的事件顺序：core 失效 / 恢复、链路失效 / 恢复、流结束、流开始、epoch 边界。
    #[tracing::instrument(skip(self, logger), fields(strategy = %self.routing.strategy))]
    pub fn prepare(
        &self,
        logger: AssignmentsDurationLogger,
    ) -> Result<(Simulator, EngineWorld), ScenarioError> {
        self.validate()?;
        let BuiltTopology {
            net,
            endpoints,
            tors,
            cores,
        } = self.build_topology();

        let endpoint = |idx: usize| {
            endpoints
                .get(idx)
                .copied()
                .ok_or_else(|| invalid(format!("endpoint index {idx} out of range (have {})", endpoints.len())))
        };
        let core = |idx: usize| {
            cores
                .get(idx)
                .copied()
                .ok_or_else(|| invalid(format!("core index {idx} out of range (have {})", cores.len())))
        };

        let mut sim = Simulator::default();
        for c in &self.core_failures {
            let id = core(c.core)?;
            sim.schedule(SimTime::from_micros(c.at_us), CoreFailure { core: id });
            if let Some(r) = c.recover_us {
                sim.schedule(SimTime::from_micros(r), CoreRecovery { core: id });
            }
        }
        for l in &self.link_failures {
            let tor = tors.get(l.tor).copied().ok_or_else(|| {
                invalid(format!("tor index {} out of range (have {})", l.tor, tors.len()))
            })?;
            let core_id = core(l.core)?;
            let pairs = match l.direction {
                LinkDirection::Uplink => vec![(tor, core_id)],
                LinkDirection::Downlink => vec![(core_id, tor)],
                LinkDirection::Both => vec![(tor, core_id), (core_id, tor)],
            };
            for (from, to) in pairs {
                let link = net
                    .link_between(from, to)
                    .ok_or_else(|| invalid(format!("no link {from} -> {to}")))?;
                sim.schedule(SimTime::from_micros(l.at_us), LinkFailure { link });
                if let Some(r) = l.recover_us {
                    sim.schedule(SimTime::from_micros(r), LinkRecovery { link });
                }
            }
        }
        for f in &self.flows {
            let (src, dst) = (endpoint(f.src)?, endpoint(f.dst)?);
            if src == dst {
                return Err(invalid(format!("flow {} has identical endpoints", f.id)));
            }
            if let Some(end) = f.finish_us {
                sim.schedule(SimTime::from_micros(end), FlowFinish { flow: FlowId(f.id) });
            }
        }
        for f in &self.flows {
            let (src, dst) = (endpoint(f.src)?, endpoint(f.dst)?);
            sim.schedule(
                SimTime::from_micros(f.start_us),
                FlowStart {
                    flow: FlowId(f.id),
                    src,
                    dst,
                },
            );
        }
        for e in &self.epochs {
            sim.schedule(SimTime::from_micros(e.at_us), EpochBoundary);
        }

        let strategy = self
            .routing
            .strategy
            .build(&net, self.routing.seed, self.routing.solver.clone())
            .ok_or_else(|| invalid("strategy external needs a routing.solver block"))?;
        info!(
            nodes = net.num_nodes(),
            links = net.num_links(),
            endpoints = endpoints.len(),
            cores = cores.len(),
            events = sim.pending(),
            "场景就绪"
        );
        let engine = TrafficEngine::new(net, strategy).with_logger(logger);
        Ok((sim, EngineWorld::new(engine)))
    }
}
