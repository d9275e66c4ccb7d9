//! `sim` — Baseband synthesis, orchestration, and named scenarios.
//!
//! # Module layout
//! - [`error`]     — Simulation error taxonomy
//! - [`tensor`]    — The complex baseband output tensor
//! - [`baseband`]  — Per-pulse signal synthesis and receiver noise
//! - [`simulator`] — Orchestrator state machine and `run_simulator`
//! - [`scenarios`] — Named, seeded demo scenes

pub mod baseband;
pub mod error;
pub mod scenarios;
pub mod simulator;
pub mod tensor;

pub use error::SimulationError;
pub use scenarios::{Scenario, ScenarioKind};
pub use simulator::{run_simulator, CancelToken, RadarConfig, SimOptions, SimState, Simulator};
pub use tensor::BasebandTensor;
