//! 无环路径
//!
//! 从源服务器到目的服务器的有序链路序列，沿途节点不重复，长度 >= 1。
//! 两层 fabric 中路径形如 src -> srcTor -> core -> dstTor -> dst，
//! 源和目的共享 ToR 时收缩为两跳。

use std::collections::HashMap;

use super::id::{LinkId, NodeId};
use super::network::Network;
use super::node::NodeRole;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    #[error("path must contain at least one link")]
    Empty,
    #[error("unknown link {0:?}")]
    UnknownLink(LinkId),
    #[error("links are not contiguous at {0:?}")]
    NotContiguous(LinkId),
    #[error("node {0} appears twice along the path")]
    RepeatedNode(NodeId),
    #[error("no live link {from} -> {to}")]
    LinkUnavailable { from: NodeId, to: NodeId },
    #[error("node {0} is not attached to any ToR")]
    NotAttached(NodeId),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AcyclicPath {
    links: Vec<LinkId>,
    /// links.len() + 1 个节点
    nodes: Vec<NodeId>,
}

impl AcyclicPath {
    /// 校验链路首尾相接且不重复经过节点
    pub fn from_links(net: &Network, links: Vec<LinkId>) -> Result<Self, PathError> {
        let first = *links.first().ok_or(PathError::Empty)?;
        let first = net.link(first).ok_or(PathError::UnknownLink(first))?;
        let mut nodes = Vec::with_capacity(links.len() + 1);
        nodes.push(first.from);
        for &id in &links {
            let link = net.link(id).ok_or(PathError::UnknownLink(id))?;
            if nodes.last() != Some(&link.from) {
                return Err(PathError::NotContiguous(id));
            }
            if nodes.contains(&link.to) {
                return Err(PathError::RepeatedNode(link.to));
            }
            nodes.push(link.to);
        }
        Ok(Self { links, nodes })
    }

    /// 把可能含环的链路序列转换成无环路径：遇到回到已访问节点时剪掉整个环。
    ///
    /// 例如 0 -> 1 -> 2 -> 3 -> 1 -> 4 变为 0 -> 1 -> 4。
    pub fn from_walk(net: &Network, walk: &[LinkId]) -> Result<Self, PathError> {
        let first = *walk.first().ok_or(PathError::Empty)?;
        let first = net.link(first).ok_or(PathError::UnknownLink(first))?;

        // 节点 -> 到达它的链路在 current 中的下标（起点为 None）
        let mut visit_to_index: HashMap<NodeId, Option<usize>> = HashMap::new();
        let mut current: Vec<LinkId> = Vec::new();
        visit_to_index.insert(first.from, None);

        for &id in walk {
            let link = net.link(id).ok_or(PathError::UnknownLink(id))?;
            match visit_to_index.get(&link.to).copied() {
                Some(valid_until) => {
                    let keep = valid_until.map_or(0, |i| i + 1);
                    for removed in current.drain(keep..) {
                        if let Some(l) = net.link(removed) {
                            visit_to_index.remove(&l.to);
                        }
                    }
                }
                None => {
                    current.push(id);
                    visit_to_index.insert(link.to, Some(current.len() - 1));
                }
            }
        }

        Self::from_links(net, current)
    }

    pub fn links(&self) -> &[LinkId] {
        &self.links
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    /// 构造时已保证至少一条链路
    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }

    pub fn src(&self) -> NodeId {
        self.nodes[0]
    }

    pub fn dst(&self) -> NodeId {
        self.nodes[self.nodes.len() - 1]
    }

    /// 路径经过的 core 交换机（同 ToR 的两跳路径没有）
    pub fn core(&self, net: &Network) -> Option<NodeId> {
        self.nodes
            .iter()
            .copied()
            .find(|&n| net.role(n) == Some(NodeRole::Core))
    }

    /// 路径上一端为 core 的链路，即负载计数关心的 ToR-core 段
    pub fn core_links<'a>(&'a self, net: &'a Network) -> impl Iterator<Item = LinkId> + 'a {
        self.links.iter().copied().filter(move |&id| {
            net.link(id).is_some_and(|l| {
                net.role(l.from) == Some(NodeRole::Core) || net.role(l.to) == Some(NodeRole::Core)
            })
        })
    }
}

fn present(net: &Network, from: NodeId, to: NodeId) -> Result<LinkId, PathError> {
    net.present_link_between(from, to)
        .ok_or(PathError::LinkUnavailable { from, to })
}

/// 经由指定 core 拼接 src -> srcTor -> core -> dstTor -> dst。
///
/// ToR 作为端点时省略服务器跳；源、目的同 ToR 时不经过 core。
pub fn construct_path(
    net: &Network,
    src: NodeId,
    dst: NodeId,
    core: NodeId,
) -> Result<AcyclicPath, PathError> {
    let src_tor = net.tor_of(src).ok_or(PathError::NotAttached(src))?;
    let dst_tor = net.tor_of(dst).ok_or(PathError::NotAttached(dst))?;

    let mut links = Vec::with_capacity(4);
    if src != src_tor {
        links.push(present(net, src, src_tor)?);
    }
    if src_tor != dst_tor {
        links.push(present(net, src_tor, core)?);
        links.push(present(net, core, dst_tor)?);
    }
    if dst != dst_tor {
        links.push(present(net, dst_tor, dst)?);
    }
    AcyclicPath::from_links(net, links)
}
