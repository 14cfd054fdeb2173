//! 网络拓扑管理
//!
//! 节点按角色划分（server / ToR / aggregation / core），链路为有向边；
//! 同时维护实时的失效节点 / 失效链路集合以及 ToR 与服务器的归属关系。

use std::collections::{BTreeSet, HashMap};

use super::id::{LinkId, NodeId};
use super::link::Link;
use super::node::{Node, NodeRole};
use tracing::{debug, info};

/// 网络拓扑
#[derive(Debug, Default, Clone)]
pub struct Network {
    nodes: Vec<Node>,
    links: Vec<Link>,
    edges: HashMap<(NodeId, NodeId), LinkId>,
    out_links: Vec<Vec<LinkId>>,
    in_links: Vec<Vec<LinkId>>,
    tor_of_server: HashMap<NodeId, NodeId>,
    servers_of_tor: HashMap<NodeId, Vec<NodeId>>,
    failed_nodes: BTreeSet<NodeId>,
    failed_links: BTreeSet<LinkId>,
}

impl Network {
    /// 添加节点
    pub fn add_node(&mut self, name: impl Into<String>, role: NodeRole) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(Node::new(id, name, role));
        self.out_links.push(Vec::new());
        self.in_links.push(Vec::new());
        id
    }

    pub fn add_server(&mut self, name: impl Into<String>) -> NodeId {
        self.add_node(name, NodeRole::Server)
    }

    pub fn add_tor(&mut self, name: impl Into<String>) -> NodeId {
        self.add_node(name, NodeRole::Tor)
    }

    pub fn add_aggregation(&mut self, name: impl Into<String>) -> NodeId {
        self.add_node(name, NodeRole::Aggregation)
    }

    pub fn add_core(&mut self, name: impl Into<String>) -> NodeId {
        self.add_node(name, NodeRole::Core)
    }

    /// 连接两个节点（创建单向链路）。同一 (from, to) 只保留一条链路。
    pub fn connect(&mut self, from: NodeId, to: NodeId) -> LinkId {
        if let Some(&id) = self.edges.get(&(from, to)) {
            return id;
        }
        let id = LinkId(self.links.len());
        self.links.push(Link::new(id, from, to));
        self.edges.insert((from, to), id);
        self.out_links[from.0].push(id);
        self.in_links[to.0].push(id);
        id
    }

    /// 双向连接，返回 (a->b, b->a)
    pub fn connect_pair(&mut self, a: NodeId, b: NodeId) -> (LinkId, LinkId) {
        (self.connect(a, b), self.connect(b, a))
    }

    /// 把服务器挂到 ToR 下（双向链路 + 归属关系）
    pub fn attach_server(&mut self, server: NodeId, tor: NodeId) {
        self.connect_pair(server, tor);
        self.tor_of_server.insert(server, tor);
        self.servers_of_tor.entry(tor).or_default().push(server);
    }

    pub fn num_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn num_links(&self) -> usize {
        self.links.len()
    }

    pub fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    pub fn link(&self, id: LinkId) -> Option<&Link> {
        self.links.get(id.0)
    }

    pub fn links(&self) -> &[Link] {
        &self.links
    }

    pub fn role(&self, id: NodeId) -> Option<NodeRole> {
        self.node(id).map(Node::role)
    }

    /// 按 id 升序返回某一角色的全部节点
    pub fn ids_with_role(&self, role: NodeRole) -> Vec<NodeId> {
        self.nodes
            .iter()
            .filter(|n| n.role() == role)
            .map(Node::id)
            .collect()
    }

    pub fn tor_ids(&self) -> Vec<NodeId> {
        self.ids_with_role(NodeRole::Tor)
    }

    /// 全部 core（含已失效的）
    pub fn core_ids(&self) -> Vec<NodeId> {
        self.ids_with_role(NodeRole::Core)
    }

    /// 未失效的 core，按 id 升序。全部失效时为空。
    pub fn live_core_ids(&self) -> Vec<NodeId> {
        self.core_ids()
            .into_iter()
            .filter(|c| !self.failed_nodes.contains(c))
            .collect()
    }

    /// 拓扑中没有服务器时，ToR 本身就是流的端点
    pub fn tors_are_endpoints(&self) -> bool {
        self.tor_of_server.is_empty()
    }

    /// 节点能否作为 commodity 的端点
    pub fn is_endpoint(&self, id: NodeId) -> bool {
        match self.role(id) {
            Some(NodeRole::Server) => true,
            Some(NodeRole::Tor) => self.tors_are_endpoints(),
            _ => false,
        }
    }

    /// 端点所属的 ToR；ToR 作为端点时返回自身
    pub fn tor_of(&self, id: NodeId) -> Option<NodeId> {
        match self.role(id)? {
            NodeRole::Server => self.tor_of_server.get(&id).copied(),
            NodeRole::Tor => Some(id),
            _ => None,
        }
    }

    /// ToR 下挂的服务器（按挂载顺序）
    pub fn servers_of(&self, tor: NodeId) -> &[NodeId] {
        self.servers_of_tor
            .get(&tor)
            .map(|v| v.as_slice())
            .unwrap_or(&[])
    }

    pub fn link_between(&self, from: NodeId, to: NodeId) -> Option<LinkId> {
        self.edges.get(&(from, to)).copied()
    }

    /// 存在且未失效的链路
    pub fn present_link_between(&self, from: NodeId, to: NodeId) -> Option<LinkId> {
        self.link_between(from, to)
            .filter(|l| !self.failed_links.contains(l))
    }

    /// `among` 中经由存活链路连通 `src_tor -> core -> dst_tor` 的 core，保持原顺序。
    /// 同 ToR 的流量不经过 core，此时全部可用。
    pub fn usable_cores(&self, src_tor: NodeId, dst_tor: NodeId, among: &[NodeId]) -> Vec<NodeId> {
        if src_tor == dst_tor {
            return among.to_vec();
        }
        among
            .iter()
            .copied()
            .filter(|&core| {
                self.present_link_between(src_tor, core).is_some()
                    && self.present_link_between(core, dst_tor).is_some()
            })
            .collect()
    }

    pub fn out_links(&self, node: NodeId) -> &[LinkId] {
        self.out_links.get(node.0).map(|v| v.as_slice()).unwrap_or(&[])
    }

    pub fn in_links(&self, node: NodeId) -> &[LinkId] {
        self.in_links.get(node.0).map(|v| v.as_slice()).unwrap_or(&[])
    }

    fn incident_links(&self, id: NodeId) -> Vec<LinkId> {
        self.out_links(id)
            .iter()
            .chain(self.in_links(id))
            .copied()
            .collect()
    }

    /// `adj[from]` 为从 `from` 出发的所有出边邻居（不考虑失效状态）
    pub fn adjacency(&self) -> Vec<Vec<NodeId>> {
        self.out_links
            .iter()
            .map(|ls| ls.iter().map(|l| self.links[l.0].to).collect())
            .collect()
    }

    /// 节点失效：节点及其全部入/出链路标记为失效
    #[tracing::instrument(skip(self))]
    pub fn fail_node(&mut self, id: NodeId) {
        info!("💥 节点失效");
        self.failed_nodes.insert(id);
        let incident = self.incident_links(id);
        self.failed_links.extend(incident);
        debug!(failed_links = self.failed_links.len(), "失效链路已更新");
    }

    /// 节点恢复：恢复节点及其全部入/出链路
    #[tracing::instrument(skip(self))]
    pub fn recover_node(&mut self, id: NodeId) {
        info!("🔧 节点恢复");
        self.failed_nodes.remove(&id);
        for l in self.incident_links(id) {
            self.failed_links.remove(&l);
        }
    }

    /// 单条链路失效，端点节点不受影响
    #[tracing::instrument(skip(self))]
    pub fn fail_link(&mut self, id: LinkId) {
        info!("💥 链路失效");
        self.failed_links.insert(id);
    }

    /// 恢复单条链路；端点节点仍失效时链路保持失效
    #[tracing::instrument(skip(self))]
    pub fn recover_link(&mut self, id: LinkId) {
        let Some(link) = self.links.get(id.0) else {
            return;
        };
        if self.failed_nodes.contains(&link.from) || self.failed_nodes.contains(&link.to) {
            debug!("端点节点仍失效，链路保持失效");
            return;
        }
        info!("🔧 链路恢复");
        self.failed_links.remove(&id);
    }

    pub fn is_node_failed(&self, id: NodeId) -> bool {
        self.failed_nodes.contains(&id)
    }

    pub fn is_link_failed(&self, id: LinkId) -> bool {
        self.failed_links.contains(&id)
    }

    pub fn failed_nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.failed_nodes.iter().copied()
    }

    pub fn failed_links(&self) -> impl Iterator<Item = &Link> + '_ {
        self.failed_links.iter().map(|l| &self.links[l.0])
    }
}
