//! `rotavoid-runtime` – Driving the avoidance core
//!
//! Everything around [`rotavoid_kernel`] that turns a single modulation call
//! into a usable tool: scene files, trajectory integration and field
//! sampling.
//!
//! # Modules
//!
//! - [`scenario`] – [`ScenarioConfig`][scenario::ScenarioConfig]:
//!   TOML scene files (start, attractor, ellipse obstacles and every tuning
//!   parameter) with `ROTAVOID_*` environment overrides.
//! - [`simulation`] – [`Simulation`][simulation::Simulation]:
//!   Euler / RK4 integration of the modulated dynamics into a
//!   [`Trajectory`][simulation::Trajectory].
//! - [`stall_guard`] – [`StallGuard`][stall_guard::StallGuard]:
//!   detects runs that stop making progress towards the attractor.
//! - [`vector_field`] – [`sample_grid`][vector_field::sample_grid]:
//!   the modulated field on a planar grid, evaluated in parallel.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]:
//!   installs the global `tracing` subscriber (`RUST_LOG`,
//!   `ROTAVOID_LOG_FORMAT=json`).

pub mod scenario;
pub mod simulation;
pub mod stall_guard;
pub mod telemetry;
pub mod vector_field;

pub use scenario::{
    ConvergenceMode, EllipseSpec, Integrator, ScenarioConfig, ScenarioError, SimulationConfig,
};
pub use simulation::{Outcome, Simulation, Trajectory};
pub use stall_guard::StallGuard;
pub use telemetry::init_tracing;
pub use vector_field::{GridSample, sample_grid};
