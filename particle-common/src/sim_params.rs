use serde::{Deserialize, Serialize};

/// Simulation parameters derived once from the configuration and shared read-only by every component.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimParams {
    pub num_particles: usize,

    // Physics
    pub density: f64,
    pub mass: f64,
    pub cutoff: f64, // Interaction radius, also the bin width
    pub cutoff_sq: f64,
    pub min_r: f64, // Separation floor for the force magnitude
    pub min_r_sq: f64,

    // Time
    pub dt: f64,
    pub num_steps: u32,
    pub save_freq: u32,

    // Domain & Grid
    pub size: f64, // Side of the square domain [0, size] x [0, size]
    pub bins: usize, // Bins per axis, ceil(size / cutoff)
}

impl SimParams {
    /// Total number of bins in the grid.
    pub fn num_bins(&self) -> usize {
        self.bins * self.bins
    }

    /// Whether a snapshot is due after the given step.
    pub fn is_save_step(&self, step: u32) -> bool {
        step % self.save_freq == 0
    }
}
