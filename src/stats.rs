use crate::force::StepStats;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Below this `absmin` at least one pair got closer than a working force law allows.
pub const ABSMIN_WARNING_THRESHOLD: f64 = 0.4;
/// Below this `absavg` most particles are not interacting.
pub const ABSAVG_WARNING_THRESHOLD: f64 = 0.8;

/// Run-level aggregation of the per-step closest-encounter statistics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunStats {
    /// Minimum `dmin` over all steps.
    pub absmin: f64,
    /// Sum of per-step averages.
    pub absavg_sum: f64,
    /// Steps that contributed to `absavg_sum` (`navg != 0`).
    pub nabsavg: u64,
}

impl Default for RunStats {
    fn default() -> Self {
        Self { absmin: 1.0, absavg_sum: 0.0, nabsavg: 0 }
    }
}

impl RunStats {
    pub fn accumulate(&mut self, step: &StepStats) {
        if let Some(avg) = step.average() {
            self.absavg_sum += avg;
            self.nabsavg += 1;
        }
        if step.dmin < self.absmin {
            self.absmin = step.dmin;
        }
    }

    /// Mean of the per-step averages, or `None` if no step ever recorded an interaction.
    pub fn absavg(&self) -> Option<f64> {
        if self.nabsavg != 0 {
            Some(self.absavg_sum / self.nabsavg as f64)
        } else {
            None
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QualityWarning {
    /// `absmin < 0.4`
    ParticlesNotInteracting,
    /// `absavg < 0.8`
    MostParticlesNotInteracting,
}

impl fmt::Display for QualityWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QualityWarning::ParticlesNotInteracting => write!(
                f,
                "The minimum distance is below {} meaning that some particle is not interacting",
                ABSMIN_WARNING_THRESHOLD
            ),
            QualityWarning::MostParticlesNotInteracting => write!(
                f,
                "The average distance is below {} meaning that most particles are not interacting",
                ABSAVG_WARNING_THRESHOLD
            ),
        }
    }
}

/// End-of-run report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSummary {
    pub num_particles: usize,
    pub size: f64,
    pub num_steps: u32,
    pub elapsed_secs: f64,
    pub absmin: f64,
    /// Reported as 0 when no interaction was ever observed; see `interacting_steps`.
    pub absavg: f64,
    pub interacting_steps: u64,
    pub warnings: Vec<QualityWarning>,
}

impl RunSummary {
    pub fn new(num_particles: usize, size: f64, num_steps: u32, elapsed_secs: f64, stats: &RunStats) -> Self {
        let absavg = stats.absavg().unwrap_or(0.0);
        let mut warnings = Vec::new();
        if stats.absmin < ABSMIN_WARNING_THRESHOLD {
            warnings.push(QualityWarning::ParticlesNotInteracting);
        }
        if absavg < ABSAVG_WARNING_THRESHOLD {
            warnings.push(QualityWarning::MostParticlesNotInteracting);
        }
        Self {
            num_particles,
            size,
            num_steps,
            elapsed_secs,
            absmin: stats.absmin,
            absavg,
            interacting_steps: stats.nabsavg,
            warnings,
        }
    }

    /// Whether any step saw a pair within the cutoff.
    pub fn observed_interactions(&self) -> bool {
        self.interacting_steps != 0
    }
}

// Console report: summary line, then one line per warning
impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "n = {}, simulation time = {:.6} seconds, absmin = {:.6}, absavg = {:.6}",
            self.num_particles, self.elapsed_secs, self.absmin, self.absavg
        )?;
        for warning in &self.warnings {
            write!(f, "\n{}", warning)?;
        }
        Ok(())
    }
}
