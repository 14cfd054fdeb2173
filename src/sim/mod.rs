//! 仿真核心模块
//!
//! 事件驱动仿真的核心组件（仿真时间、事件、世界、仿真器），
//! 以及驱动流量工程引擎的事件、世界与场景文件。

mod engine_events;
mod engine_world;
mod error;
mod event;
mod scenario;
mod simulator;
mod time;
mod world;

pub use engine_events::{
    CoreFailure, CoreRecovery, EpochBoundary, FlowFinish, FlowStart, LinkFailure, LinkRecovery,
    MaterializePath,
};
pub use engine_world::EngineWorld;
pub use error::SimError;
pub use event::Event;
pub use scenario::{
    BuiltTopology, CoreFailureSpec, EpochSpec, FlowSpec, LinkDirection, LinkFailureSpec, RoutingSpec,
    SCHEMA_VERSION, ScenarioError, ScenarioMeta, ScenarioSpec, TopologySpec,
};
pub use simulator::Simulator;
pub use time::SimTime;
pub use world::World;
