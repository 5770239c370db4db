use serde::{Serialize, Deserialize};

/// Particle positions at a recorded step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Step index after which the snapshot was taken.
    pub step: u32,
    /// Simulated time, `(step + 1) * dt`.
    pub time: f64,
    /// `(x, y)` for every particle, in store order.
    pub positions: Vec<(f64, f64)>,
}

/// Every recorded snapshot of a run, for the non-streaming output formats.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrajectoryArchive {
    pub num_particles: usize,
    pub size: f64,
    pub snapshots: Vec<Snapshot>,
}
