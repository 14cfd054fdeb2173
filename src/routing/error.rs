//! 路由引擎错误类型

use std::path::PathBuf;
use std::process::ExitStatus;
use std::time::Duration;

use crate::net::{FlowId, NodeId, PathError};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RoutingError {
    /// 注册时即拒绝：端点相同、越界或不是合法端点
    #[error("invalid commodity for flow {flow}: {reason}")]
    InvalidCommodity { flow: FlowId, reason: String },
    /// 所有 core 都已失效
    #[error("no path possible: every core switch has failed")]
    NoLiveCore,
    #[error("no path possible from {src} to {dst}")]
    NoPath { src: NodeId, dst: NodeId },
    #[error(transparent)]
    Path(#[from] PathError),
    #[error(transparent)]
    Solver(#[from] SolverError),
}

/// 外部求解器桥接错误。对当次分配而言都是致命的。
#[derive(Debug, Error)]
pub enum SolverError {
    #[error("solver file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to launch solver {program:?}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("solver exited with {0} before writing a response")]
    Exited(ExitStatus),
    #[error("no solver response within {0:?}")]
    Timeout(Duration),
    #[error("malformed solver payload: {0}")]
    Malformed(#[from] serde_json::Error),
    #[error("solver response names unknown flow {0:?}")]
    UnknownFlow(String),
    #[error("solver assigned negative color {color} to flow {flow}")]
    NegativeColor { flow: FlowId, color: i64 },
}
