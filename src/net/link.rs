//! 链路类型

use super::id::{LinkId, NodeId};

/// 有向链路 (from, to)，在所属拓扑内拥有稳定的 [`LinkId`]。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Link {
    pub id: LinkId,
    pub from: NodeId,
    pub to: NodeId,
}

impl Link {
    pub fn new(id: LinkId, from: NodeId, to: NodeId) -> Self {
        Self { id, from, to }
    }
}
