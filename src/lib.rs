//! Short-range pairwise particle simulation over a uniform grid of cutoff-sized bins.
//!
//! The engine keeps every particle in exactly one bin between steps, evaluates forces only
//! against the 3x3 block of bins around each particle, and reports closest-encounter
//! statistics that reveal whether particles interact correctly.

pub mod force;
pub mod grid;
pub mod integrator;
pub mod output;
pub mod particle;
pub mod simulation;
pub mod stats;

pub use force::{apply_force, StepStats};
pub use grid::{BinGrid, CellIdx};
pub use integrator::move_particle;
pub use output::{General, SnapshotArchive, SnapshotSink, TextTrajectory};
pub use particle::{init_particles, Particle};
pub use simulation::Simulation;
pub use stats::{QualityWarning, RunStats, RunSummary};

pub use particle_common::{ForceMode, SimParams, SimulationConfig, SnapshotFormat};
