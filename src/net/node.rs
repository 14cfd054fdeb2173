//! 节点类型
//!
//! 两层（ToR/core）或三层 fabric 中的节点及其角色。

use super::id::NodeId;

/// 节点在 fabric 中的角色
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeRole {
    Server,
    Tor,
    Aggregation,
    Core,
}

impl NodeRole {
    /// 除服务器外的节点都是交换机
    pub fn is_switch(self) -> bool {
        !matches!(self, NodeRole::Server)
    }
}

/// 拓扑中的节点。存活 / 失效状态由 [`super::Network`] 统一维护。
#[derive(Debug, Clone)]
pub struct Node {
    id: NodeId,
    name: String,
    role: NodeRole,
}

impl Node {
    pub fn new(id: NodeId, name: impl Into<String>, role: NodeRole) -> Self {
        Self {
            id,
            name: name.into(),
            role,
        }
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn role(&self) -> NodeRole {
        self.role
    }
}
