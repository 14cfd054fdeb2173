use crate::net::{FlowId, Network, NodeId, construct_path};
use crate::routing::{
    AnnealingParams, CentralizedAlgorithm, CentralizedRouting, Commodity, CommodityRegistry,
    EdgeColoringRouting, LinkLoadCounter, McvlcRouting, PathAssignmentTable, RoutingError,
    SimulatedAnnealing,
};
use crate::topo::two_tier::{TwoTierOpts, TwoTierTopology, build_two_tier};
use std::collections::BTreeMap;

fn fabric(num_tors: usize, num_cores: usize, servers_per_tor: usize) -> (Network, TwoTierTopology) {
    let mut net = Network::default();
    let topo = build_two_tier(
        &mut net,
        &TwoTierOpts {
            num_tors,
            num_cores,
            servers_per_tor,
        },
    );
    (net, topo)
}

/// Two uplink-heavy commodities on ToR A and two on ToR B.
fn cross_traffic(topo: &TwoTierTopology) -> Vec<Commodity> {
    let (a0, a1) = (topo.server(0, 0), topo.server(0, 1));
    let (b0, b1) = (topo.server(1, 0), topo.server(1, 1));
    [(1, a0, b0), (2, a1, b1), (3, b0, a0), (4, b1, a1)]
        .into_iter()
        .map(|(f, src, dst)| Commodity {
            flow: FlowId(f),
            src,
            dst,
        })
        .collect()
}

fn controller(net: &Network, algorithm: CentralizedAlgorithm, commodities: &[Commodity]) -> CentralizedRouting {
    let mut ctrl = CentralizedRouting::new(algorithm);
    for c in commodities {
        ctrl.add_commodity(net, c.flow, c.src, c.dst).expect("register");
    }
    ctrl
}

fn per_core(net: &Network, table: &PathAssignmentTable) -> BTreeMap<NodeId, usize> {
    let mut out = BTreeMap::new();
    for (flow, _) in table.iter() {
        if let Some(core) = table.core_for(net, flow) {
            *out.entry(core).or_insert(0) += 1;
        }
    }
    out
}

fn recount(net: &Network, table: &PathAssignmentTable) -> LinkLoadCounter {
    let mut expected = LinkLoadCounter::new(net.num_links());
    for (_, path) in table.iter() {
        expected.add_path(net, path);
    }
    expected
}

#[test]
fn registry_rejects_invalid_endpoints_and_is_idempotent() {
    let (net, topo) = fabric(2, 2, 2);
    let mut reg = CommodityRegistry::default();
    let (s, d) = (topo.server(0, 0), topo.server(1, 0));

    assert!(reg.add(&net, FlowId(1), s, d).unwrap());
    assert!(!reg.add(&net, FlowId(1), s, d).unwrap());
    // same pair under another flow id is a distinct commodity
    assert!(reg.add(&net, FlowId(2), s, d).unwrap());
    assert_eq!(reg.len(), 2);

    for (src, dst) in [(s, s), (s, topo.tor(0)), (topo.core(0), d), (s, NodeId(999))] {
        let err = reg.add(&net, FlowId(9), src, dst).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidCommodity { flow: FlowId(9), .. }));
    }

    assert!(reg.remove(FlowId(1)).is_some());
    assert!(reg.remove(FlowId(1)).is_none());
    assert!(!reg.contains(FlowId(1)));
    assert_eq!(reg.len(), 1);
}

#[test]
fn load_counter_never_goes_negative() {
    let (net, topo) = fabric(2, 1, 1);
    let path = construct_path(&net, topo.server(0, 0), topo.server(1, 0), topo.core(0)).unwrap();
    let mut loads = LinkLoadCounter::new(net.num_links());

    loads.add_path(&net, &path);
    loads.add_path(&net, &path);
    assert_eq!(loads.max_load(), 2);
    assert_eq!(loads.peak_sum(), 4);
    assert_eq!(loads.iter_loaded().count(), 2);

    loads.remove_path(&net, &path);
    loads.remove_path(&net, &path);
    loads.remove_path(&net, &path);
    assert_eq!(loads.max_load(), 0);
    assert_eq!(loads.peak_sum(), 0);
}

#[test]
fn assignment_table_keeps_loads_in_sync() {
    let (net, topo) = fabric(3, 3, 2);
    let mut table = PathAssignmentTable::new(&net);
    let servers = &topo.servers;

    // assign, reassign and release in an interleaved order
    let mut step = 0usize;
    for round in 0..3 {
        for (i, &src) in servers.iter().enumerate() {
            let dst = servers[(i + 2 + round) % servers.len()];
            if src == dst {
                continue;
            }
            let core = topo.core((i + round) % 3);
            let path = construct_path(&net, src, dst, core).unwrap();
            table.assign(&net, FlowId(i as u64), path);
            step += 1;
            if step % 4 == 0 {
                table.release(&net, FlowId(((i + 1) % servers.len()) as u64));
            }
            assert_eq!(table.loads(), &recount(&net, &table));
        }
    }

    assert!(table.release(&net, FlowId(12345)).is_none());
    let flows: Vec<FlowId> = table.iter().map(|(f, _)| f).collect();
    for f in flows {
        table.release(&net, f);
    }
    assert!(table.is_empty());
    assert_eq!(table.loads().max_load(), 0);
}

#[test]
fn link_utilization_counts_server_hops_too() {
    let (net, topo) = fabric(2, 2, 2);
    let mut table = PathAssignmentTable::new(&net);
    let src = topo.server(0, 0);
    for (flow, dst) in [(1, topo.server(1, 0)), (2, topo.server(1, 1))] {
        let path = construct_path(&net, src, dst, topo.core(0)).unwrap();
        table.assign(&net, FlowId(flow), path);
    }

    let util = table.link_utilization();
    let first_hop = net.link_between(src, topo.tor(0)).unwrap();
    let uplink = net.link_between(topo.tor(0), topo.core(0)).unwrap();
    assert_eq!(util[&first_hop], 2);
    assert_eq!(util[&uplink], 2);
    assert_eq!(table.loads().get(uplink), 2);
    assert_eq!(table.loads().get(first_hop), 0);
}

#[test]
fn mcvlc_splits_cross_traffic_evenly() {
    let (net, topo) = fabric(2, 2, 2);
    let commodities = cross_traffic(&topo);
    let mut ctrl = controller(&net, CentralizedAlgorithm::Mcvlc(McvlcRouting), &commodities);
    let mut table = PathAssignmentTable::new(&net);

    assert_eq!(ctrl.determine_path_assignments(&net, &mut table).unwrap(), 4);
    let counts = per_core(&net, &table);
    assert_eq!(counts.get(&topo.core(0)), Some(&2));
    assert_eq!(counts.get(&topo.core(1)), Some(&2));
    assert_eq!(table.loads().max_load(), 1);
    assert_eq!(ctrl.durations().len(), 1);
}

#[test]
fn mcvlc_prefers_lowest_core_on_ties() {
    let (net, topo) = fabric(2, 3, 1);
    let plan = McvlcRouting
        .plan(
            &net,
            &[Commodity {
                flow: FlowId(7),
                src: topo.server(0, 0),
                dst: topo.server(1, 0),
            }],
            &topo.cores,
        )
        .unwrap();
    assert_eq!(plan, vec![(FlowId(7), topo.core(0))]);
}

#[test]
fn mcvlc_balances_many_commodities() {
    let (net, topo) = fabric(4, 4, 4);
    let mut ctrl = CentralizedRouting::new(CentralizedAlgorithm::Mcvlc(McvlcRouting));
    let mut flow = 0;
    for t in 0..4 {
        for s in 0..4 {
            flow += 1;
            let src = topo.server(t, s);
            let dst = topo.server((t + 1) % 4, s);
            ctrl.add_commodity(&net, FlowId(flow), src, dst).unwrap();
        }
    }
    let mut table = PathAssignmentTable::new(&net);
    ctrl.determine_path_assignments(&net, &mut table).unwrap();

    // 4 commodities per ToR uplink spread over 4 cores
    assert_eq!(table.loads().max_load(), 1);
}

#[test]
fn edge_coloring_splits_cross_traffic_evenly() {
    let (net, topo) = fabric(2, 2, 2);
    let commodities = cross_traffic(&topo);
    let mut ctrl = controller(&net, CentralizedAlgorithm::EdgeColoring(EdgeColoringRouting), &commodities);
    let mut table = PathAssignmentTable::new(&net);

    ctrl.determine_path_assignments(&net, &mut table).unwrap();
    let counts = per_core(&net, &table);
    assert_eq!(counts.values().copied().collect::<Vec<_>>(), vec![2, 2]);
    assert_eq!(table.loads().max_load(), 1);
}

#[test]
fn centralized_strategies_are_deterministic() {
    let (net, topo) = fabric(3, 2, 2);
    let mut commodities = Vec::new();
    let mut flow = 0;
    for &src in &topo.servers {
        for &dst in &topo.servers {
            if net.tor_of(src) != net.tor_of(dst) && (src.0 + dst.0) % 3 == 0 {
                flow += 1;
                commodities.push(Commodity {
                    flow: FlowId(flow),
                    src,
                    dst,
                });
            }
        }
    }
    assert!(commodities.len() > 3);

    let run = |algorithm: CentralizedAlgorithm| {
        let mut ctrl = controller(&net, algorithm, &commodities);
        let mut table = PathAssignmentTable::new(&net);
        ctrl.determine_path_assignments(&net, &mut table).unwrap();
        table
            .iter()
            .map(|(f, p)| (f, p.clone()))
            .collect::<Vec<_>>()
    };

    assert_eq!(
        run(CentralizedAlgorithm::Mcvlc(McvlcRouting)),
        run(CentralizedAlgorithm::Mcvlc(McvlcRouting))
    );
    assert_eq!(
        run(CentralizedAlgorithm::EdgeColoring(EdgeColoringRouting)),
        run(CentralizedAlgorithm::EdgeColoring(EdgeColoringRouting))
    );
    assert_eq!(
        run(CentralizedAlgorithm::SimulatedAnnealing(SimulatedAnnealing::new(42))),
        run(CentralizedAlgorithm::SimulatedAnnealing(SimulatedAnnealing::new(42)))
    );
}

#[test]
fn annealing_with_same_seed_reaches_same_state() {
    let (net, topo) = fabric(2, 2, 2);
    let commodities = cross_traffic(&topo);

    let mut a = SimulatedAnnealing::new(7);
    let mut b = SimulatedAnnealing::new(7);
    let pa = a.plan(&net, &commodities, &topo.cores).unwrap();
    let pb = b.plan(&net, &commodities, &topo.cores).unwrap();
    assert_eq!(pa, pb);
    assert_eq!(a.state(), b.state());
    assert_eq!(a.state().len(), 4);
    assert!(pa.record_duration);

    // a second round continues from the same rng state on both sides
    let pa2 = a.plan(&net, &commodities, &topo.cores).unwrap();
    let pb2 = b.plan(&net, &commodities, &topo.cores).unwrap();
    assert_eq!(pa2, pb2);
}

#[test]
fn annealing_assigns_every_commodity_through_a_live_core() {
    let (net, topo) = fabric(2, 2, 2);
    let commodities = cross_traffic(&topo);
    let mut ctrl = controller(
        &net,
        CentralizedAlgorithm::SimulatedAnnealing(SimulatedAnnealing::new(3)),
        &commodities,
    );
    let mut table = PathAssignmentTable::new(&net);
    ctrl.determine_path_assignments(&net, &mut table).unwrap();

    assert_eq!(table.len(), 4);
    for c in &commodities {
        let path = table.path_for(c.flow).expect("assigned");
        assert_eq!((path.src(), path.dst()), (c.src, c.dst));
        assert!(topo.cores.contains(&path.core(&net).expect("core")));
    }
    assert_eq!(table.loads(), &recount(&net, &table));
    assert_eq!(ctrl.durations().len(), 1);
}

#[test]
fn annealing_without_commodities_is_a_no_op() {
    let (net, _) = fabric(2, 2, 2);
    let mut ctrl = CentralizedRouting::new(CentralizedAlgorithm::SimulatedAnnealing(SimulatedAnnealing::new(1)));
    let mut table = PathAssignmentTable::new(&net);

    assert_eq!(ctrl.determine_path_assignments(&net, &mut table).unwrap(), 0);
    assert!(table.is_empty());
    assert!(ctrl.durations().is_empty());
    assert_eq!(ctrl.average_duration_ms(), 0.0);
}

#[test]
fn annealing_single_commodity_goes_to_first_live_core() {
    let (mut net, topo) = fabric(2, 3, 1);
    net.fail_node(topo.core(0));
    let c = Commodity {
        flow: FlowId(5),
        src: topo.server(0, 0),
        dst: topo.server(1, 0),
    };
    let mut ctrl = controller(
        &net,
        CentralizedAlgorithm::SimulatedAnnealing(SimulatedAnnealing::new(1)),
        &[c],
    );
    let mut table = PathAssignmentTable::new(&net);

    assert_eq!(ctrl.determine_path_assignments(&net, &mut table).unwrap(), 1);
    assert_eq!(table.core_for(&net, FlowId(5)), Some(topo.core(1)));
    assert!(ctrl.durations().is_empty());
}

#[test]
fn annealing_params_control_the_schedule() {
    let (net, topo) = fabric(2, 2, 2);
    let commodities = cross_traffic(&topo);
    let params = AnnealingParams {
        initial_temperature: 1.0,
        min_temperature: 2.0,
        ..AnnealingParams::default()
    };
    // no steps: the initial slot assignment is returned
    let mut sa = SimulatedAnnealing::with_params(9, params);
    let plan = sa.plan(&net, &commodities, &topo.cores).unwrap();
    let initial: Vec<usize> = sa.state().values().copied().collect();
    assert_eq!(initial, vec![0, 1, 0, 1]);
    assert_eq!(plan.choices.len(), 4);
}

#[test]
fn every_strategy_uses_the_remaining_core_after_a_failure() {
    let (mut net, topo) = fabric(2, 2, 2);
    net.fail_node(topo.core(1));
    assert_eq!(net.live_core_ids(), vec![topo.core(0)]);
    let commodities = cross_traffic(&topo);

    for algorithm in [
        CentralizedAlgorithm::Mcvlc(McvlcRouting),
        CentralizedAlgorithm::SimulatedAnnealing(SimulatedAnnealing::new(11)),
        CentralizedAlgorithm::EdgeColoring(EdgeColoringRouting),
    ] {
        let name = algorithm.name();
        let mut ctrl = controller(&net, algorithm, &commodities);
        let mut table = PathAssignmentTable::new(&net);
        ctrl.determine_path_assignments(&net, &mut table).unwrap();
        assert_eq!(table.len(), 4, "{name}");
        for (flow, _) in table.iter() {
            assert_eq!(table.core_for(&net, flow), Some(topo.core(0)), "{name}");
        }
    }
}

#[test]
fn every_strategy_routes_around_a_failed_uplink() {
    let (mut net, topo) = fabric(2, 2, 2);
    let up = net.link_between(topo.tor(0), topo.core(0)).expect("uplink");
    net.fail_link(up);
    assert_eq!(net.live_core_ids(), topo.cores, "a link failure keeps the core alive");
    let commodities = cross_traffic(&topo);

    for algorithm in [
        CentralizedAlgorithm::Mcvlc(McvlcRouting),
        CentralizedAlgorithm::SimulatedAnnealing(SimulatedAnnealing::new(5)),
        CentralizedAlgorithm::EdgeColoring(EdgeColoringRouting),
    ] {
        let name = algorithm.name();
        let mut ctrl = controller(&net, algorithm, &commodities);
        let mut table = PathAssignmentTable::new(&net);
        ctrl.determine_path_assignments(&net, &mut table)
            .unwrap_or_else(|e| panic!("{name}: {e}"));
        assert_eq!(table.len(), 4, "{name}");
        for (_, path) in table.iter() {
            assert!(!path.links().contains(&up), "{name}");
        }
        // Flows leaving ToR A can only use core 1.
        assert_eq!(table.core_for(&net, FlowId(1)), Some(topo.core(1)), "{name}");
        assert_eq!(table.core_for(&net, FlowId(2)), Some(topo.core(1)), "{name}");
        assert_eq!(table.loads().get(up), 0, "{name}");
    }
}

#[test]
fn every_strategy_reports_no_path_for_a_cut_off_tor() {
    let (mut net, topo) = fabric(2, 2, 2);
    for core in topo.cores.clone() {
        let up = net.link_between(topo.tor(0), core).expect("uplink");
        net.fail_link(up);
    }
    let commodities = cross_traffic(&topo);

    for algorithm in [
        CentralizedAlgorithm::Mcvlc(McvlcRouting),
        CentralizedAlgorithm::SimulatedAnnealing(SimulatedAnnealing::new(5)),
        CentralizedAlgorithm::EdgeColoring(EdgeColoringRouting),
    ] {
        let name = algorithm.name();
        let mut ctrl = controller(&net, algorithm, &commodities);
        let mut table = PathAssignmentTable::new(&net);
        let err = ctrl.determine_path_assignments(&net, &mut table).unwrap_err();
        assert!(matches!(err, RoutingError::NoPath { .. }), "{name}: {err}");
        assert!(table.is_empty(), "{name}");
    }
}

#[test]
fn no_live_core_is_an_explicit_error() {
    let (mut net, topo) = fabric(2, 2, 2);
    net.fail_node(topo.core(0));
    net.fail_node(topo.core(1));
    let commodities = cross_traffic(&topo);

    let mut ctrl = controller(&net, CentralizedAlgorithm::Mcvlc(McvlcRouting), &commodities);
    let mut table = PathAssignmentTable::new(&net);
    let err = ctrl.determine_path_assignments(&net, &mut table).unwrap_err();
    assert!(matches!(err, RoutingError::NoLiveCore));
    assert!(table.is_empty());
}

#[test]
fn clearing_a_commodity_releases_its_path() {
    let (net, topo) = fabric(2, 2, 2);
    let commodities = cross_traffic(&topo);
    let mut ctrl = controller(&net, CentralizedAlgorithm::Mcvlc(McvlcRouting), &commodities);
    let mut table = PathAssignmentTable::new(&net);
    ctrl.determine_path_assignments(&net, &mut table).unwrap();

    ctrl.clear_resources(&net, FlowId(1), &mut table);
    ctrl.clear_resources(&net, FlowId(1), &mut table);
    assert_eq!(ctrl.registry().len(), 3);
    assert!(table.path_for(FlowId(1)).is_none());
    assert_eq!(table.len(), 3);
    assert_eq!(table.loads(), &recount(&net, &table));
}
