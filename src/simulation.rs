use crate::force::{apply_force, StepStats};
use crate::grid::BinGrid;
use crate::integrator::move_particle;
use crate::output::SnapshotSink;
use crate::particle::{init_particles, Particle};
use crate::stats::{RunStats, RunSummary};
use anyhow::Result;
use log::{debug, error, info, trace, warn};
use particle_common::{ForceMode, SimParams, SimulationConfig};
use rand::prelude::*;
use std::time::Instant;

/// Drives the binned short-range particle simulation.
///
/// Each step runs strictly in order: every particle's acceleration is recomputed from the
/// positions at the start of the step, then every particle is moved and re-binned. No particle
/// moves while another may still read its old position.
pub struct Simulation {
    params: SimParams,
    force_mode: ForceMode,
    /// Re-check the whole bin invariant after every step.
    verify_bins: bool,
    /// The particle store. Indices are particle identities for the whole run.
    particles: Vec<Particle>,
    grid: BinGrid,
    run_stats: RunStats,
    /// Number of completed steps.
    current_step: u32,
}

impl Simulation {
    /// Creates a simulation with freshly placed particles.
    pub fn new(config: &SimulationConfig) -> Result<Self> {
        config.validate()?;
        let params = config.get_sim_params();

        let seed = match config.initial_conditions.seed {
            Some(seed) => seed,
            None => rand::rng().random(),
        };
        info!("Placing {} particles (seed {}).", params.num_particles, seed);
        let mut rng = StdRng::seed_from_u64(seed);
        let particles = init_particles(&params, &mut rng)?;

        let sim = Self::from_particles(params, particles, config.engine.force_mode)?;
        Ok(sim.with_bin_verification(config.engine.verify_bins))
    }

    /// Creates a simulation over an explicit particle store. Every particle must lie inside
    /// the domain `[0, size]²`.
    pub fn from_particles(params: SimParams, particles: Vec<Particle>, force_mode: ForceMode) -> Result<Self> {
        if !(params.cutoff.is_finite() && params.cutoff > 0.0) {
            anyhow::bail!("cutoff must be positive and finite (got {}).", params.cutoff);
        }
        if params.save_freq == 0 {
            anyhow::bail!("save_freq must be greater than 0.");
        }
        if params.bins == 0 || (params.bins as f64) * params.cutoff < params.size {
            anyhow::bail!(
                "{} bins of width {} do not cover the domain [0, {}].",
                params.bins, params.cutoff, params.size
            );
        }
        if particles.len() != params.num_particles {
            anyhow::bail!(
                "Expected {} particles, got {}.",
                params.num_particles,
                particles.len()
            );
        }
        let inside = |c: f64| (0.0..=params.size).contains(&c);
        if let Some(idx) = particles.iter().position(|p| !(inside(p.x) && inside(p.y))) {
            anyhow::bail!(
                "Particle {} at ({}, {}) lies outside the domain [0, {}].",
                idx, particles[idx].x, particles[idx].y, params.size
            );
        }

        let grid = BinGrid::from_particles(&params, &particles);
        debug!("Simulation Parameters: {:#?}", params);
        info!(
            "Domain size {:.6}, {}x{} bins of width {}, force mode {:?}.",
            params.size, grid.bins(), grid.bins(), params.cutoff, force_mode
        );

        Ok(Self {
            params,
            force_mode,
            verify_bins: false,
            particles,
            grid,
            run_stats: RunStats::default(),
            current_step: 0,
        })
    }

    pub fn with_bin_verification(mut self, verify_bins: bool) -> Self {
        self.verify_bins = verify_bins;
        self
    }

    /// Advances the simulation by one time step and returns that step's statistics.
    pub fn step(&mut self) -> Result<StepStats> {
        let mut stats = StepStats::default();

        // --- 1. Forces from the current positions ---
        match self.force_mode {
            ForceMode::Binned => self.compute_forces_binned(&mut stats),
            ForceMode::AllPairs => self.compute_forces_all_pairs(&mut stats),
        }

        // --- 2. Move and re-bin ---
        self.move_particles()?;

        // --- 3. Aggregate ---
        self.run_stats.accumulate(&stats);

        if self.verify_bins {
            self.grid.verify(&self.particles)?;
        }
        self.current_step += 1;
        Ok(stats)
    }

    /// Each particle against the members of its 3x3 bin neighborhood, itself included.
    fn compute_forces_binned(&mut self, stats: &mut StepStats) {
        let Self { params, particles, grid, .. } = self;
        for idx in 0..particles.len() {
            // Accumulate into a copy; neighbors only read positions, which are fixed this phase
            let mut p = particles[idx];
            p.zero_acceleration();
            for neighbor_idx in grid.neighbors_of(&p) {
                apply_force(&mut p, &particles[neighbor_idx], stats, params);
            }
            particles[idx] = p;
        }
    }

    /// Quadratic baseline: each particle against every particle in store order.
    fn compute_forces_all_pairs(&mut self, stats: &mut StepStats) {
        let Self { params, particles, .. } = self;
        for idx in 0..particles.len() {
            let mut p = particles[idx];
            p.zero_acceleration();
            for neighbor in particles.iter() {
                apply_force(&mut p, neighbor, stats, params);
            }
            particles[idx] = p;
        }
    }

    /// Integrates every particle and moves it to its new bin when it crossed a cell edge.
    fn move_particles(&mut self) -> Result<()> {
        for (idx, p) in self.particles.iter_mut().enumerate() {
            let old_cell = self.grid.cell_of(p);
            move_particle(p, &self.params);
            let new_cell = self.grid.cell_of(p);
            if old_cell != new_cell {
                self.grid.rebin(idx, old_cell, new_cell)?;
            }
        }
        Ok(())
    }

    /// Runs all configured steps, handing a snapshot to `sink` on every save step, and
    /// returns the end-of-run report.
    pub fn run<S: SnapshotSink + ?Sized>(&mut self, sink: &mut S) -> Result<RunSummary> {
        let total_steps = self.params.num_steps;
        info!(
            "Starting simulation loop for {} steps (snapshot every {} steps)...",
            total_steps, self.params.save_freq
        );
        let start_time = Instant::now();
        let mut previous_print_time = start_time;

        for _ in 0..total_steps {
            let step = self.current_step;
            let step_start_time = Instant::now();
            let stats = match self.step() {
                Ok(stats) => stats,
                Err(e) => {
                    error!("Error during simulation step {}: {}", step, e);
                    return Err(e.context("Simulation step failed."));
                }
            };
            let step_duration = step_start_time.elapsed();

            if self.params.is_save_step(step) {
                if let Err(e) = sink.record(step, &self.params, &self.particles) {
                    error!("Error recording snapshot at step {}: {}", step, e);
                    return Err(e.context("Failed to record snapshot."));
                }
            }

            // Print status periodically
            let now = Instant::now();
            if now.duration_since(previous_print_time).as_secs_f64() >= 5.0 || step + 1 == total_steps {
                info!(
                    "Step [{}/{}] | dmin: {:.4} | Step Time: {:6.2} ms | Elapsed: {:.2} s",
                    step + 1,
                    total_steps,
                    stats.dmin,
                    step_duration.as_secs_f64() * 1000.0,
                    start_time.elapsed().as_secs_f64()
                );
                previous_print_time = now;
            } else {
                trace!(
                    "Step [{}/{}] completed in {:.3} ms (dmin {:.4}, navg {})",
                    step + 1,
                    total_steps,
                    step_duration.as_secs_f64() * 1000.0,
                    stats.dmin,
                    stats.navg
                );
            }
        }

        let elapsed = start_time.elapsed().as_secs_f64();
        sink.finish()?;

        let summary = RunSummary::new(
            self.particles.len(),
            self.params.size,
            total_steps,
            elapsed,
            &self.run_stats,
        );
        info!("Simulation finished in {:.3} seconds.", elapsed);
        if !summary.observed_interactions() {
            warn!("No pair came within the cutoff during the run; absavg reported as 0.");
        }
        for warning in &summary.warnings {
            warn!("{}", warning);
        }
        Ok(summary)
    }

    pub fn params(&self) -> &SimParams {
        &self.params
    }

    pub fn force_mode(&self) -> ForceMode {
        self.force_mode
    }

    /// The particle store, in identity order.
    pub fn particles(&self) -> &[Particle] {
        &self.particles
    }

    pub fn grid(&self) -> &BinGrid {
        &self.grid
    }

    pub fn run_stats(&self) -> &RunStats {
        &self.run_stats
    }

    pub fn current_step(&self) -> u32 {
        self.current_step
    }
}
