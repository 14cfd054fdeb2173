//! 外部求解器桥接
//!
//! 以文件做握手：把请求写入运行目录下的请求文件，启动求解器进程（运行目录作为最后一个参数），
//! 轮询响应文件直到非空，稍等片刻后读取 `{"flow_id": color}` 映射并删除响应文件。
//! 请求是一个所有值都为字符串的 JSON 对象。

use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Child, Command};
use std::thread;
use std::time::{Duration, Instant};

use super::commodity::{Commodity, usable_core_at};
use super::error::{RoutingError, SolverError};
use crate::net::{FlowId, Network, NodeId, PathError};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// 外部求解器类型，决定请求内容与默认命令
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SolverKind {
    /// 整数规划：请求携带端点对、失效链路、失效 core 与 ToR 数
    Ilp,
    /// 外部边着色：请求携带 ToR 对与输出目录
    EdgeColoring,
}

impl SolverKind {
    pub fn name(self) -> &'static str {
        match self {
            SolverKind::Ilp => "lp_solver",
            SolverKind::EdgeColoring => "edge_coloring",
        }
    }

    fn default_command(self) -> Vec<String> {
        let module = match self {
            SolverKind::Ilp => "external.ilp_solver.main",
            SolverKind::EdgeColoring => "external.edge_coloring.main",
        };
        ["poetry", "run", "python", "-m", module]
            .into_iter()
            .map(String::from)
            .collect()
    }
}

fn default_request_file() -> String {
    "shared_memory_java.json".to_string()
}

fn default_response_file() -> String {
    "shared_memory_python.json".to_string()
}

fn default_poll_interval_ms() -> u64 {
    10
}

fn default_settle_ms() -> u64 {
    100
}

/// 求解器配置（可直接嵌在场景文件里）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SolverConfig {
    pub kind: SolverKind,
    /// 握手文件所在目录
    pub run_dir: PathBuf,
    /// 程序及参数；为空时使用该类型的默认命令。空列表且 `spawn = false` 时假定求解器已在外部运行。
    #[serde(default)]
    pub command: Vec<String>,
    #[serde(default = "default_spawn")]
    pub spawn: bool,
    #[serde(default = "default_request_file")]
    pub request_file: String,
    #[serde(default = "default_response_file")]
    pub response_file: String,
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// 响应文件首次非空后再等待的时间
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
    /// 缺省为无限等待
    #[serde(default)]
    pub timeout_ms: Option<u64>,
}

fn default_spawn() -> bool {
    true
}

impl SolverConfig {
    pub fn new(kind: SolverKind, run_dir: impl Into<PathBuf>) -> Self {
        Self {
            kind,
            run_dir: run_dir.into(),
            command: Vec::new(),
            spawn: true,
            request_file: default_request_file(),
            response_file: default_response_file(),
            poll_interval_ms: default_poll_interval_ms(),
            settle_ms: default_settle_ms(),
            timeout_ms: None,
        }
    }

    pub fn request_path(&self) -> PathBuf {
        self.run_dir.join(&self.request_file)
    }

    pub fn response_path(&self) -> PathBuf {
        self.run_dir.join(&self.response_file)
    }

    fn effective_command(&self) -> Vec<String> {
        if self.command.is_empty() {
            self.kind.default_command()
        } else {
            self.command.clone()
        }
    }
}

/// 按 `{k1=(a,b), k2=(c,d)}` 的格式输出 flow -> 端点对映射
pub fn format_pair_map(pairs: &BTreeMap<FlowId, (NodeId, NodeId)>) -> String {
    let mut out = String::from("{");
    for (i, (flow, (a, b))) in pairs.iter().enumerate() {
        if i > 0 {
            out.push_str(", ");
        }
        let _ = write!(out, "{}=({},{})", flow, a, b);
    }
    out.push('}');
    out
}

/// 按 `[x, y]` 的格式输出列表
pub fn format_list<T: std::fmt::Display>(items: impl IntoIterator<Item = T>) -> String {
    let items: Vec<String> = items.into_iter().map(|x| x.to_string()).collect();
    format!("[{}]", items.join(", "))
}

/// 解析求解器响应 `{"<flow id>": <color>, ...}`
pub fn parse_response(raw: &str) -> Result<BTreeMap<FlowId, usize>, SolverError> {
    let parsed: BTreeMap<String, i64> = serde_json::from_str(raw)?;
    parsed
        .into_iter()
        .map(|(key, color)| {
            let flow = key
                .trim()
                .parse::<u64>()
                .map(FlowId)
                .map_err(|_| SolverError::UnknownFlow(key.clone()))?;
            let color = usize::try_from(color).map_err(|_| SolverError::NegativeColor { flow, color })?;
            Ok((flow, color))
        })
        .collect()
}

/// 一次请求/响应握手
#[derive(Debug, Clone)]
pub struct SolverBridge {
    config: SolverConfig,
}

impl SolverBridge {
    pub fn new(config: SolverConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    #[tracing::instrument(skip(self, request), fields(kind = self.config.kind.name()))]
    pub fn exchange(
        &self,
        request: &BTreeMap<String, String>,
    ) -> Result<BTreeMap<FlowId, usize>, SolverError> {
        let request_path = self.config.request_path();
        let response_path = self.config.response_path();
        let io_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| SolverError::Io { path, source }
        };

        // 上一轮遗留的响应会被误读
        if response_path.exists() {
            warn!(path = ?response_path, "删除遗留的求解器响应");
            fs::remove_file(&response_path).map_err(io_err(&response_path))?;
        }

        let mut body = serde_json::to_string(request)?;
        body.push('\n');
        fs::write(&request_path, body).map_err(io_err(&request_path))?;
        debug!(path = ?request_path, "请求已写入");

        let mut child = if self.config.spawn {
            Some(self.spawn()?)
        } else {
            None
        };
        let waited = self.wait_for_response(&response_path, child.as_mut());
        let raw = match waited {
            Ok(()) => fs::read_to_string(&response_path).map_err(io_err(&response_path)),
            Err(e) => Err(e),
        };
        if let Some(mut c) = child {
            if raw.is_err() {
                let _ = c.kill();
            }
            let _ = c.wait();
        }
        let raw = raw?;
        fs::remove_file(&response_path).map_err(io_err(&response_path))?;

        let colors = parse_response(&raw)?;
        info!(assignments = colors.len(), "收到求解器响应");
        Ok(colors)
    }

    fn spawn(&self) -> Result<Child, SolverError> {
        let command = self.config.effective_command();
        let (program, args) = command
            .split_first()
            .map(|(p, a)| (p.clone(), a.to_vec()))
            .unwrap_or_default();
        info!(program = %program, "启动外部求解器");
        Command::new(&program)
            .args(&args)
            .arg(&self.config.run_dir)
            .spawn()
            .map_err(|source| SolverError::Spawn { program, source })
    }

    fn wait_for_response(&self, path: &Path, mut child: Option<&mut Child>) -> Result<(), SolverError> {
        let poll = Duration::from_millis(self.config.poll_interval_ms);
        let timeout = self.config.timeout_ms.map(Duration::from_millis);
        let start = Instant::now();
        loop {
            if fs::metadata(path).is_ok_and(|m| m.len() > 0) {
                thread::sleep(Duration::from_millis(self.config.settle_ms));
                return Ok(());
            }
            if let Some(c) = child.as_deref_mut() {
                match c.try_wait() {
                    // 进程已退出：再确认一次，避免错过退出前刚写完的响应
                    Ok(Some(status)) => {
                        if fs::metadata(path).is_ok_and(|m| m.len() > 0) {
                            continue;
                        }
                        return Err(SolverError::Exited(status));
                    }
                    Ok(None) => {}
                    Err(source) => {
                        return Err(SolverError::Io {
                            path: path.to_path_buf(),
                            source,
                        });
                    }
                }
            }
            if let Some(limit) = timeout {
                if start.elapsed() >= limit {
                    return Err(SolverError::Timeout(limit));
                }
            }
            thread::sleep(poll);
        }
    }
}

/// 通过外部求解器计算分配
#[derive(Debug, Clone)]
pub struct ExternalSolverRouting {
    bridge: SolverBridge,
}

impl ExternalSolverRouting {
    pub fn new(config: SolverConfig) -> Self {
        Self {
            bridge: SolverBridge::new(config),
        }
    }

    pub fn kind(&self) -> SolverKind {
        self.bridge.config().kind
    }

    /// 构造请求内容
    pub fn request(
        &self,
        net: &Network,
        commodities: &[Commodity],
    ) -> Result<BTreeMap<String, String>, RoutingError> {
        let mut request = BTreeMap::new();
        match self.kind() {
            SolverKind::Ilp => {
                let pairs = commodities.iter().map(|c| (c.flow, (c.src, c.dst))).collect();
                let failed_cores: Vec<NodeId> = net
                    .core_ids()
                    .into_iter()
                    .filter(|&c| net.is_node_failed(c))
                    .collect();
                let tors = net.tor_ids();
                // 先列出失效 core 的全部 ToR 链路，再补上其余单独失效的链路
                let mut listed = BTreeSet::new();
                let mut failed_links = Vec::new();
                let pairs_of_failed_cores = tors
                    .iter()
                    .flat_map(|&tor| failed_cores.iter().flat_map(move |&core| [(tor, core), (core, tor)]));
                let other_failed = net.failed_links().map(|l| (l.from, l.to));
                for (from, to) in pairs_of_failed_cores.chain(other_failed) {
                    if listed.insert((from, to)) {
                        failed_links.push(format!("({},{})", from, to));
                    }
                }
                request.insert("src_dst_pairs".into(), format_pair_map(&pairs));
                request.insert("failed_links".into(), format_list(failed_links));
                request.insert("failed_cores".into(), format_list(failed_cores));
                request.insert("num_tors".into(), tors.len().to_string());
            }
            SolverKind::EdgeColoring => {
                let mut pairs = BTreeMap::new();
                for c in commodities {
                    let src_tor = net.tor_of(c.src).ok_or(PathError::NotAttached(c.src))?;
                    let dst_tor = net.tor_of(c.dst).ok_or(PathError::NotAttached(c.dst))?;
                    pairs.insert(c.flow, (src_tor, dst_tor));
                }
                request.insert("src_dst_pairs".into(), format_pair_map(&pairs));
                request.insert(
                    "output_folder".into(),
                    self.bridge.config().run_dir.display().to_string(),
                );
            }
        }
        Ok(request)
    }

    /// 响应中没有出现的 commodity 本轮不分配
    pub fn plan(
        &self,
        net: &Network,
        commodities: &[Commodity],
        cores: &[NodeId],
    ) -> Result<Vec<(FlowId, NodeId)>, RoutingError> {
        if cores.is_empty() {
            return Err(RoutingError::NoLiveCore);
        }
        let request = self.request(net, commodities)?;
        let colors = self.bridge.exchange(&request)?;

        let mut choices = Vec::with_capacity(colors.len());
        for (flow, color) in colors {
            let Some(c) = commodities.iter().find(|c| c.flow == flow) else {
                return Err(SolverError::UnknownFlow(flow.to_string()).into());
            };
            choices.push((flow, usable_core_at(net, c, cores, color)?));
        }
        Ok(choices)
    }
}
