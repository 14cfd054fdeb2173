//! 进程内的均衡边着色分配：commodity 的颜色对可用 core 数取模即为其 core。

use super::commodity::{Commodity, usable_core_at};
use super::error::RoutingError;
use crate::coloring::color_commodities;
use crate::net::{FlowId, Network, NodeId, PathError};
use tracing::debug;

#[derive(Debug, Default, Clone)]
pub struct EdgeColoringRouting;

impl EdgeColoringRouting {
    pub fn plan(
        &self,
        net: &Network,
        commodities: &[Commodity],
        cores: &[NodeId],
    ) -> Result<Vec<(FlowId, NodeId)>, RoutingError> {
        if cores.is_empty() {
            return Err(RoutingError::NoLiveCore);
        }
        let pairs = commodities
            .iter()
            .map(|c| {
                let src_tor = net.tor_of(c.src).ok_or(PathError::NotAttached(c.src))?;
                let dst_tor = net.tor_of(c.dst).ok_or(PathError::NotAttached(c.dst))?;
                Ok((c.flow, src_tor, dst_tor))
            })
            .collect::<Result<Vec<_>, PathError>>()?;

        let colors = color_commodities(&pairs);
        let num_colors = colors.values().max().map_or(0, |&m| m + 1);
        debug!(num_colors, cores = cores.len(), "边着色完成");

        let mut choices = Vec::with_capacity(colors.len());
        for c in commodities {
            let Some(&color) = colors.get(&c.flow) else {
                continue;
            };
            choices.push((c.flow, usable_core_at(net, c, cores, color)?));
        }
        Ok(choices)
    }
}
