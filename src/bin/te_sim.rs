use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use std::str::FromStr;
use tesim_rs::routing::{AssignmentsDurationLogger, SolverConfig, SolverKind, StrategyKind};
use tesim_rs::sim::{EngineWorld, ScenarioSpec, SimTime};

#[derive(Debug, Parser)]
#[command(
    name = "te-sim",
    about = "Run a traffic-engineering scenario (ECMP / MCVLC / annealing / edge coloring / external solver)"
)]
struct Args {
    /// Path to scenario.json
    #[arg(long)]
    scenario: PathBuf,

    /// Override strategy: ecmp, mcvlc, simulated_annealing, edge_coloring or external
    #[arg(long)]
    strategy: Option<String>,

    /// Override the simulated annealing seed
    #[arg(long)]
    seed: Option<u64>,

    /// Directory for external solver handshake files
    #[arg(long)]
    run_dir: Option<PathBuf>,

    /// Write `average_ms,num_assigned` rows to this file after every epoch
    #[arg(long)]
    assignments_log: Option<PathBuf>,

    /// Run until this time (ms); defaults to running until completion
    #[arg(long)]
    until_ms: Option<u64>,
}

fn run(args: Args) -> Result<(), String> {
    let mut spec = ScenarioSpec::load(&args.scenario).map_err(|e| e.to_string())?;

    if let Some(s) = args.strategy.as_deref() {
        spec.routing.strategy = StrategyKind::from_str(s)?;
    }
    if let Some(seed) = args.seed {
        spec.routing.seed = seed;
    }
    if let Some(dir) = args.run_dir {
        match spec.routing.solver.as_mut() {
            Some(solver) => solver.run_dir = dir,
            None => spec.routing.solver = Some(SolverConfig::new(SolverKind::Ilp, dir)),
        }
    }

    let logger = match &args.assignments_log {
        Some(path) => AssignmentsDurationLogger::create(path)
            .map_err(|e| format!("create {}: {e}", path.display()))?,
        None => AssignmentsDurationLogger::disabled(),
    };

    let (mut sim, mut world) = spec.prepare(logger).map_err(|e| e.to_string())?;
    let result = match args.until_ms {
        Some(ms) => sim.run_until(SimTime::from_millis(ms), &mut world),
        None => sim.run(&mut world),
    };
    result.map_err(|e| format!("simulation aborted at {}: {e}", sim.now()))?;

    print_report(&spec, &world);
    Ok(())
}

fn print_report(spec: &ScenarioSpec, world: &EngineWorld) {
    let net = world.engine.net();
    for (flow, path) in world.materialized() {
        let core = path
            .core(net)
            .map_or_else(|| "-".to_string(), |c| c.to_string());
        let nodes: Vec<String> = path.nodes().iter().map(|n| n.to_string()).collect();
        println!(
            "flow_path flow={} core={} hops={} nodes={}",
            flow,
            core,
            path.len(),
            nodes.join("-")
        );
    }
    for flow in world.pending() {
        println!("flow_pending flow={}", flow);
    }
    println!(
        "summary strategy={} flows={} materialized={} pending={} epochs={} assigned={} avg_duration_ms={:.3} max_link_load={}",
        world.engine.strategy().name(),
        spec.flows.len(),
        world.materialized().len(),
        world.pending().len(),
        world.epochs(),
        world.engine.num_assigned_commodities(),
        world.engine.average_duration_ms(),
        world.engine.max_link_load()
    );
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .with_target(true)
        .init();

    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("te_sim: {e}");
            ExitCode::FAILURE
        }
    }
}
