use crate::net::{FlowId, LinkId, Network, NodeId};
use crate::routing::{AssignmentsDurationLogger, RoutingError, StrategyKind, TrafficEngine};
use crate::sim::{
    CoreFailure, CoreRecovery, EngineWorld, EpochBoundary, FlowFinish, FlowStart, LinkFailure,
    LinkRecovery, SimError, SimTime, Simulator, World,
};
use crate::topo::two_tier::{TwoTierOpts, TwoTierTopology, build_two_tier};
use std::any::Any;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};

#[derive(Clone, Default)]
struct SharedBuf(Arc<Mutex<Vec<u8>>>);

impl SharedBuf {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().expect("buf lock").clone()).expect("utf8")
    }
}

impl Write for SharedBuf {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().expect("buf lock").extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn engine(kind: StrategyKind) -> (TrafficEngine, TwoTierTopology) {
    let mut net = Network::default();
    let topo = build_two_tier(&mut net, &TwoTierOpts::default());
    let strategy = kind.build(&net, 7, None).expect("strategy");
    (TrafficEngine::new(net, strategy), topo)
}

fn core_of(engine: &TrafficEngine, flow: u64) -> Option<NodeId> {
    engine.table().core_for(engine.net(), FlowId(flow))
}

#[test]
fn ecmp_assigns_on_flow_start_and_releases_on_finish() {
    let (mut engine, topo) = engine(StrategyKind::Ecmp);
    let (src, dst) = (topo.server(0, 0), topo.server(1, 1));

    engine.on_flow_start(FlowId(1), src, dst).unwrap();
    let path = engine.path_for(FlowId(1)).expect("assigned immediately");
    assert_eq!((path.src(), path.dst()), (src, dst));
    assert_eq!(path.len(), 4);
    assert!(topo.cores.contains(&core_of(&engine, 1).expect("through a core")));
    assert_eq!(engine.num_assigned_commodities(), 1);
    assert_eq!(engine.max_link_load(), 1);

    // Nothing to do at an epoch boundary.
    assert_eq!(engine.on_epoch_boundary().unwrap(), 0);

    engine.on_flow_finish(FlowId(1));
    assert!(engine.path_for(FlowId(1)).is_none());
    assert_eq!(engine.max_link_load(), 0);
    assert_eq!(engine.average_duration_ms(), 0.0);
}

#[test]
fn ecmp_rejects_invalid_commodity() {
    let (mut engine, topo) = engine(StrategyKind::Ecmp);
    let s = topo.server(0, 0);

    let err = engine.on_flow_start(FlowId(1), s, s).unwrap_err();
    assert!(matches!(err, RoutingError::InvalidCommodity { flow: FlowId(1), .. }));
    let err = engine.on_flow_start(FlowId(2), s, topo.core(0)).unwrap_err();
    assert!(matches!(err, RoutingError::InvalidCommodity { .. }));
    assert_eq!(engine.num_assigned_commodities(), 0);
}

#[test]
fn centralized_assignment_waits_for_epoch_and_logs_a_row() {
    let (engine, topo) = engine(StrategyKind::Mcvlc);
    let buf = SharedBuf::default();
    let mut engine = engine.with_logger(AssignmentsDurationLogger::new(Box::new(buf.clone())));

    engine
        .on_flow_start(FlowId(1), topo.server(0, 0), topo.server(1, 0))
        .unwrap();
    engine
        .on_flow_start(FlowId(2), topo.server(0, 1), topo.server(1, 1))
        .unwrap();
    assert!(engine.path_for(FlowId(1)).is_none(), "pending until the epoch");
    assert_eq!(engine.num_assigned_commodities(), 0);

    assert_eq!(engine.on_epoch_boundary().unwrap(), 2);
    assert!(engine.path_for(FlowId(1)).is_some());
    assert_ne!(core_of(&engine, 1), core_of(&engine, 2), "spread over both cores");
    assert_eq!(engine.max_link_load(), 1);

    let text = buf.text();
    assert!(text.ends_with(",2\r\n"), "unexpected log: {text:?}");
    assert_eq!(text.matches("\r\n").count(), 1);
    assert_eq!(engine.logger_mut().rows_written(), 1);
    assert!(engine.average_duration_ms() >= 0.0);

    engine.on_flow_finish(FlowId(1));
    assert!(engine.path_for(FlowId(1)).is_none());
    assert_eq!(engine.on_epoch_boundary().unwrap(), 1);
    assert!(buf.text().ends_with(",1\r\n"));
}

#[test]
fn disabled_logger_writes_nothing() {
    let (engine, topo) = engine(StrategyKind::EdgeColoring);
    let buf = SharedBuf::default();
    let mut logger = AssignmentsDurationLogger::new(Box::new(buf.clone()));
    logger.set_info_saving_enabled(false);
    let mut engine = engine.with_logger(logger);

    engine
        .on_flow_start(FlowId(1), topo.server(0, 0), topo.server(1, 0))
        .unwrap();
    assert_eq!(engine.on_epoch_boundary().unwrap(), 1);
    assert!(buf.text().is_empty());
    assert_eq!(engine.logger_mut().rows_written(), 0);
    assert!(!engine.logger_mut().is_enabled());
}

#[test]
fn core_failure_steers_next_assignment_to_live_cores() {
    let (mut engine, topo) = engine(StrategyKind::Mcvlc);
    engine
        .on_flow_start(FlowId(1), topo.server(0, 0), topo.server(1, 0))
        .unwrap();
    engine
        .on_flow_start(FlowId(2), topo.server(0, 1), topo.server(1, 1))
        .unwrap();

    engine.on_core_failure(topo.core(0));
    assert_eq!(engine.on_epoch_boundary().unwrap(), 2);
    assert_eq!(core_of(&engine, 1), Some(topo.core(1)));
    assert_eq!(core_of(&engine, 2), Some(topo.core(1)));
    assert_eq!(engine.max_link_load(), 2);

    engine.on_core_recovery(topo.core(0));
    engine.on_epoch_boundary().unwrap();
    assert_ne!(core_of(&engine, 1), core_of(&engine, 2));
    assert_eq!(engine.max_link_load(), 1);
}

#[test]
fn link_failure_steers_next_assignment_around_the_link() {
    let (mut engine, topo) = engine(StrategyKind::EdgeColoring);
    engine
        .on_flow_start(FlowId(1), topo.server(0, 0), topo.server(1, 0))
        .unwrap();
    engine
        .on_flow_start(FlowId(2), topo.server(0, 1), topo.server(1, 1))
        .unwrap();

    let down = engine
        .net()
        .link_between(topo.core(0), topo.tor(1))
        .expect("downlink");
    engine.on_link_failure(down);
    assert_eq!(engine.on_epoch_boundary().unwrap(), 2);
    assert_eq!(core_of(&engine, 1), Some(topo.core(1)));
    assert_eq!(core_of(&engine, 2), Some(topo.core(1)));
    assert!(!engine.net().is_node_failed(topo.core(0)));

    engine.on_link_recovery(down);
    engine.on_epoch_boundary().unwrap();
    assert_ne!(core_of(&engine, 1), core_of(&engine, 2));
}

#[test]
fn unknown_link_events_are_ignored() {
    let (mut engine, _) = engine(StrategyKind::Ecmp);
    let bogus = LinkId(engine.net().num_links() + 5);
    engine.on_link_failure(bogus);
    engine.on_link_recovery(bogus);
    assert_eq!(engine.net().failed_links().count(), 0);
}

#[test]
fn failing_every_core_is_an_error_for_centralized_routing() {
    let (mut engine, topo) = engine(StrategyKind::SimulatedAnnealing);
    engine
        .on_flow_start(FlowId(1), topo.server(0, 0), topo.server(1, 0))
        .unwrap();
    engine.on_core_failure(topo.core(0));
    engine.on_core_failure(topo.core(1));

    assert!(matches!(engine.on_epoch_boundary(), Err(RoutingError::NoLiveCore)));
    assert!(engine.path_for(FlowId(1)).is_none());
}

#[test]
fn failure_of_non_core_node_is_ignored() {
    let (mut engine, topo) = engine(StrategyKind::Mcvlc);
    engine.on_core_failure(topo.tor(0));
    assert!(!engine.net().is_node_failed(topo.tor(0)));
    assert_eq!(engine.net().live_core_ids().len(), 2);
}

#[test]
fn world_materializes_after_epoch_and_drops_finished_flows() {
    let (engine, topo) = engine(StrategyKind::Mcvlc);
    let mut world = EngineWorld::new(engine);
    let mut sim = Simulator::default();

    sim.schedule(
        SimTime::ZERO,
        FlowStart {
            flow: FlowId(1),
            src: topo.server(0, 0),
            dst: topo.server(1, 0),
        },
    );
    sim.schedule(
        SimTime::ZERO,
        FlowStart {
            flow: FlowId(2),
            src: topo.server(0, 1),
            dst: topo.server(1, 1),
        },
    );
    sim.schedule(SimTime::from_micros(5), FlowFinish { flow: FlowId(2) });
    sim.schedule(SimTime::from_micros(10), EpochBoundary);

    sim.run_until(SimTime::from_micros(1), &mut world).unwrap();
    assert!(world.materialized().is_empty());
    assert_eq!(world.pending().len(), 2);

    sim.run(&mut world).unwrap();
    assert_eq!(world.epochs(), 1);
    assert!(world.pending().is_empty());
    assert_eq!(world.materialized().keys().copied().collect::<Vec<_>>(), vec![FlowId(1)]);
    assert_eq!(world.engine.num_assigned_commodities(), 1);
}

#[test]
fn world_materializes_ecmp_paths_without_epochs() {
    let (engine, topo) = engine(StrategyKind::Ecmp);
    let mut world = EngineWorld::new(engine);
    let mut sim = Simulator::default();

    sim.schedule(
        SimTime::ZERO,
        FlowStart {
            flow: FlowId(3),
            src: topo.server(1, 0),
            dst: topo.server(0, 1),
        },
    );
    sim.run(&mut world).unwrap();

    let path = world.materialized().get(&FlowId(3)).expect("materialized");
    assert_eq!(path.dst(), topo.server(0, 1));
    assert!(world.pending().is_empty());
    assert_eq!(world.epochs(), 0);
}

#[test]
fn core_events_reach_the_engine() {
    let (engine, topo) = engine(StrategyKind::Ecmp);
    let mut world = EngineWorld::new(engine);
    let mut sim = Simulator::default();

    sim.schedule(SimTime(1), CoreFailure { core: topo.core(1) });
    sim.run(&mut world).unwrap();
    assert!(world.engine.net().is_node_failed(topo.core(1)));

    sim.schedule(SimTime(2), CoreRecovery { core: topo.core(1) });
    sim.run(&mut world).unwrap();
    assert!(!world.engine.net().is_node_failed(topo.core(1)));
}

#[test]
fn link_events_reach_the_engine() {
    let (engine, topo) = engine(StrategyKind::Ecmp);
    let up = engine
        .net()
        .link_between(topo.tor(0), topo.core(0))
        .expect("uplink");
    let mut world = EngineWorld::new(engine);
    let mut sim = Simulator::default();

    sim.schedule(SimTime(1), LinkFailure { link: up });
    sim.run(&mut world).unwrap();
    assert!(world.engine.net().is_link_failed(up));
    assert!(!world.engine.net().is_node_failed(topo.core(0)));

    sim.schedule(SimTime(2), LinkRecovery { link: up });
    sim.run(&mut world).unwrap();
    assert!(!world.engine.net().is_link_failed(up));
}

#[derive(Default)]
struct OtherWorld;

impl World for OtherWorld {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[test]
fn engine_events_require_engine_world() {
    let mut sim = Simulator::default();
    sim.schedule(SimTime::ZERO, EpochBoundary);

    let err = sim.run(&mut OtherWorld).unwrap_err();
    assert!(matches!(
        err,
        SimError::WorldMismatch {
            event: "EpochBoundary",
            ..
        }
    ));
}
