use anyhow::Result;
use particle_common::SimParams;
use rand::distr::Uniform;
use rand::prelude::*;
use serde::{Deserialize, Serialize};

/// State of a single particle. Identity is its index in the particle store, never its coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub x: f64,
    pub y: f64,
    pub vx: f64,
    pub vy: f64,
    pub ax: f64,
    pub ay: f64,
}

impl Particle {
    /// A particle at rest at `(x, y)`.
    pub fn at(x: f64, y: f64) -> Self {
        Self { x, y, ..Self::default() }
    }

    pub fn with_velocity(mut self, vx: f64, vy: f64) -> Self {
        self.vx = vx;
        self.vy = vy;
        self
    }

    #[inline(always)]
    pub fn zero_acceleration(&mut self) {
        self.ax = 0.0;
        self.ay = 0.0;
    }
}

/// Places `params.num_particles` particles on an evenly spaced lattice inside the domain,
/// in shuffled order so the store is not spatially sorted, with velocities uniform in `[-1, 1)`.
pub fn init_particles(params: &SimParams, rng: &mut StdRng) -> Result<Vec<Particle>> {
    let n = params.num_particles;
    if n == 0 {
        return Ok(Vec::new());
    }
    let size = params.size;
    let sx = (n as f64).sqrt().ceil() as usize;
    let sy = n.div_ceil(sx);

    // Lattice slots in random order
    let mut slots: Vec<usize> = (0..n).collect();
    slots.shuffle(rng);

    let velocity_dist = Uniform::new(-1.0f64, 1.0f64)?;
    let particles = slots
        .into_iter()
        .map(|k| {
            let x = size * (1 + k % sx) as f64 / (1 + sx) as f64;
            let y = size * (1 + k / sx) as f64 / (1 + sy) as f64;
            Particle::at(x, y).with_velocity(rng.sample(velocity_dist), rng.sample(velocity_dist))
        })
        .collect();
    Ok(particles)
}
