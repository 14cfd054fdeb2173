//! 网络拓扑模块
//!
//! 此模块包含拓扑图（节点、链路、失效集合）、无环路径以及静态路由所需的路径搜索原语。

// 子模块声明
mod id;
mod link;
mod network;
mod node;
mod path;
mod routing;
mod shortest_path;

// 重新导出公共接口
pub use id::{FlowId, LinkId, NodeId};
pub use link::Link;
pub use network::Network;
pub use node::{Node, NodeRole};
pub use path::{AcyclicPath, PathError, construct_path};
pub use routing::{RoutingTable, absolute, jenkins_hash, non_sequential_hash, pick_ecmp};
pub use shortest_path::{UNREACHABLE, floyd_warshall, ksp_between_tors, yen_k_shortest_paths};
