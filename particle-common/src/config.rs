use serde::{Deserialize, Serialize};
use anyhow::Result;
use crate::sim_params::SimParams;
use std::path::Path;

// Physical constants of the force law and the domain
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct PhysicsConfig {
    #[serde(default = "default_density")]
    pub density: f64,
    #[serde(default = "default_mass")]
    pub mass: f64,
    /// Interaction radius. Also the width of one bin.
    #[serde(default = "default_cutoff")]
    pub cutoff: f64,
    /// Numerical floor on the pair separation. Defaults to `cutoff / 100`.
    #[serde(default)]
    pub min_r: Option<f64>,
}

// Configuration for timing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct TimingConfig {
    #[serde(default = "default_dt")]
    pub dt: f64,
    #[serde(default = "default_num_steps")]
    pub num_steps: u32,
    /// A snapshot is emitted on every step where `step % save_freq == 0`.
    #[serde(default = "default_save_freq")]
    pub save_freq: u32,
}

// Initial conditions for the simulation, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct InitialConditions {
    #[serde(default = "default_num_particles")]
    pub num_particles: usize,
    /// Placement/velocity seed. A fresh one is drawn (and logged) when absent.
    #[serde(default)]
    pub seed: Option<u64>,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ForceMode {
    /// Neighbor search restricted to the 3x3 block of bins around each particle.
    #[default]
    Binned,
    /// Every particle against every particle. Quadratic reference baseline.
    AllPairs,
}

#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct EngineConfig {
    #[serde(default)]
    pub force_mode: ForceMode,
    /// Re-check the full bin invariant after every step. Slow, for debugging.
    #[serde(default)]
    pub verify_bins: bool,
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SnapshotFormat {
    /// Streamed plain text: `"<n> <size>"` header, then `"<x> <y>"` per particle.
    #[default]
    Text,
    Json,
    Bincode,
    MessagePack,
}

// Configuration for output settings, loaded from config.toml
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct OutputConfig {
    #[serde(default = "default_trajectory_path")]
    pub trajectory_path: String,
    #[serde(default)]
    pub format: SnapshotFormat,
    #[serde(default)]
    pub save_final_positions: bool,
    #[serde(default)]
    pub summary_path: Option<String>,
}

// Main simulation configuration structure, loaded from config.toml.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct SimulationConfig {
    #[serde(default)]
    pub physics: PhysicsConfig,
    #[serde(default)]
    pub timing: TimingConfig,
    #[serde(default)]
    pub initial_conditions: InitialConditions,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

impl Default for PhysicsConfig {
    fn default() -> Self {
        PhysicsConfig {
            density: default_density(),
            mass: default_mass(),
            cutoff: default_cutoff(),
            min_r: None,
        }
    }
}

impl Default for TimingConfig {
    fn default() -> Self {
        TimingConfig {
            dt: default_dt(),
            num_steps: default_num_steps(),
            save_freq: default_save_freq(),
        }
    }
}

impl Default for InitialConditions {
    fn default() -> Self {
        InitialConditions {
            num_particles: default_num_particles(),
            seed: None,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        OutputConfig {
            trajectory_path: default_trajectory_path(),
            format: SnapshotFormat::Text,
            save_final_positions: false,
            summary_path: None,
        }
    }
}

impl SimulationConfig {
    /// Loads the simulation configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();

        let config_str = std::fs::read_to_string(path_ref)
            .map_err(|e| anyhow::anyhow!("Failed to read config file '{}': {}", path_ref.display(), e))?;
        Self::from_toml_str(&config_str)
            .map_err(|e| anyhow::anyhow!("Invalid config '{}': {}", path_ref.display(), e))
    }

    /// Parses and validates a configuration from TOML text.
    pub fn from_toml_str(config_str: &str) -> Result<Self> {
        let config: SimulationConfig = toml::from_str(config_str)
            .map_err(|e| anyhow::anyhow!("Failed to parse TOML: {}", e))?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects constants that would make the derived grid or the force law meaningless.
    pub fn validate(&self) -> Result<()> {
        let physics = &self.physics;
        for (name, value) in [
            ("density", physics.density),
            ("mass", physics.mass),
            ("cutoff", physics.cutoff),
            ("dt", self.timing.dt),
        ] {
            if !(value.is_finite() && value > 0.0) {
                anyhow::bail!("{} must be positive and finite (got {}).", name, value);
            }
        }
        let min_r = self.min_r();
        if !(min_r.is_finite() && min_r > 0.0) {
            anyhow::bail!("min_r must be positive and finite (got {}).", min_r);
        }
        if min_r > physics.cutoff {
            anyhow::bail!("min_r ({}) must not exceed cutoff ({}).", min_r, physics.cutoff);
        }
        if self.timing.save_freq == 0 {
            anyhow::bail!("save_freq must be greater than 0.");
        }
        if self.initial_conditions.num_particles == 0 {
            anyhow::bail!("num_particles must be greater than 0.");
        }
        Ok(())
    }

    /// Effective separation floor.
    pub fn min_r(&self) -> f64 {
        self.physics.min_r.unwrap_or(self.physics.cutoff / 100.0)
    }

    /// Converts the configuration into simulation parameters used at runtime.
    pub fn get_sim_params(&self) -> SimParams {
        let n = self.initial_conditions.num_particles;
        let density = self.physics.density;
        let cutoff = self.physics.cutoff;
        let min_r = self.min_r();

        // Domain side grows with n so that density stays constant
        let size = (n as f64 * density).sqrt();
        // Cell width is exactly the cutoff, so the grid may overhang the domain
        let mut bins = ((size / cutoff).ceil() as usize).max(1);
        // Guard against the quotient rounding down onto an integer
        while (bins as f64) * cutoff < size {
            bins += 1;
        }

        SimParams {
            num_particles: n,
            density,
            mass: self.physics.mass,
            cutoff,
            cutoff_sq: cutoff * cutoff,
            min_r,
            min_r_sq: min_r * min_r,
            dt: self.timing.dt,
            num_steps: self.timing.num_steps,
            save_freq: self.timing.save_freq,
            size,
            bins,
        }
    }
}

// Defaults reproduce the reference constants
fn default_density() -> f64 {
    0.0005
}

fn default_mass() -> f64 {
    0.01
}

fn default_cutoff() -> f64 {
    0.01
}

fn default_dt() -> f64 {
    0.0005
}

fn default_num_steps() -> u32 {
    1000
}

fn default_save_freq() -> u32 {
    10
}

fn default_num_particles() -> usize {
    1000
}

fn default_trajectory_path() -> String {
    "out".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_config_uses_reference_constants() {
        let config = SimulationConfig::from_toml_str("").unwrap();
        assert_eq!(config.physics.density, 0.0005);
        assert_eq!(config.physics.mass, 0.01);
        assert_eq!(config.physics.cutoff, 0.01);
        assert_eq!(config.min_r(), 0.01 / 100.0);
        assert_eq!(config.timing.dt, 0.0005);
        assert_eq!(config.timing.num_steps, 1000);
        assert_eq!(config.timing.save_freq, 10);
        assert_eq!(config.engine.force_mode, ForceMode::Binned);
        assert_eq!(config.output.format, SnapshotFormat::Text);
        assert_eq!(config.output.trajectory_path, "out");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = SimulationConfig::from_toml_str(
            r#"
            [physics]
            cutoff = 0.02

            [engine]
            force_mode = "all_pairs"

            [output]
            format = "messagepack"
            "#,
        )
        .unwrap();
        assert_eq!(config.physics.cutoff, 0.02);
        assert_eq!(config.physics.mass, 0.01);
        assert_eq!(config.min_r(), 0.02 / 100.0);
        assert_eq!(config.engine.force_mode, ForceMode::AllPairs);
        assert_eq!(config.output.format, SnapshotFormat::MessagePack);
    }

    #[test]
    fn rejects_invalid_constants() {
        assert!(SimulationConfig::from_toml_str("[physics]\ncutoff = 0.0").is_err());
        assert!(SimulationConfig::from_toml_str("[physics]\nmin_r = 0.5").is_err());
        assert!(SimulationConfig::from_toml_str("[timing]\nsave_freq = 0").is_err());
        assert!(SimulationConfig::from_toml_str("[timing]\ndt = -1.0").is_err());
        assert!(SimulationConfig::from_toml_str("[initial_conditions]\nnum_particles = 0").is_err());
    }

    #[test]
    fn derived_grid_covers_domain_with_cutoff_wide_bins() {
        for n in [1, 2, 7, 500, 1000, 4321] {
            let mut config = SimulationConfig::default();
            config.initial_conditions.num_particles = n;
            let params = config.get_sim_params();
            assert_eq!(params.size, (n as f64 * 0.0005).sqrt());
            assert!(params.bins >= 1);
            assert!(params.bins as f64 * params.cutoff >= params.size);
            assert!((params.bins - 1) as f64 * params.cutoff < params.size);
        }
    }
}
