//! Deployment configuration: the service topology, the per-environment
//! target, and small parsing helpers.

mod duration;
mod graph;
mod target;
mod topology;

pub use duration::parse_duration;
pub use graph::DependencyGraph;
pub use target::{DeployTarget, PRODUCTION_COMPOSE_FILE};
pub use topology::{ExecStep, OneShotStep, Probe, ServiceSpec, Topology};
