//! 仿真错误类型

use crate::routing::RoutingError;
use thiserror::Error;

/// 事件执行失败；仿真器在第一个失败的事件处停止
#[derive(Debug, Error)]
pub enum SimError {
    #[error(transparent)]
    Routing(#[from] RoutingError),
    #[error("event {event} expects world {expected}")]
    WorldMismatch {
        event: &'static str,
        expected: &'static str,
    },
}
