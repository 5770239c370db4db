use crate::particle::Particle;
use particle_common::SimParams;

/// Closest-encounter statistics gathered during one force-evaluation phase.
/// Distances are normalized by the cutoff.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StepStats {
    /// Smallest separation seen so far this step. Starts at 1.0 and only decreases.
    pub dmin: f64,
    /// Sum of the separations that lowered `dmin` at the time they were evaluated.
    pub davg: f64,
    /// Number of terms in `davg`.
    pub navg: u64,
}

impl Default for StepStats {
    fn default() -> Self {
        Self { dmin: 1.0, davg: 0.0, navg: 0 }
    }
}

impl StepStats {
    /// Mean of the accumulated separations, if any pair was recorded.
    pub fn average(&self) -> Option<f64> {
        if self.navg != 0 {
            Some(self.davg / self.navg as f64)
        } else {
            None
        }
    }
}

/// Adds the acceleration `neighbor` exerts on `particle` and updates `stats`.
///
/// Pairs farther apart than the cutoff are skipped entirely (`r2 > cutoff²`; a pair exactly at
/// the cutoff is evaluated and contributes zero). A zero separation, which includes a particle
/// evaluated against itself, is kept out of the statistics. The separation is floored at
/// `min_r` before the force magnitude is computed.
#[inline(always)]
pub fn apply_force(particle: &mut Particle, neighbor: &Particle, stats: &mut StepStats, params: &SimParams) {
    let dx = neighbor.x - particle.x;
    let dy = neighbor.y - particle.y;
    let mut r2 = dx * dx + dy * dy;

    if r2 > params.cutoff_sq {
        return;
    }

    if r2 != 0.0 && r2 / params.cutoff_sq < stats.dmin * stats.dmin {
        let d = r2.sqrt() / params.cutoff;
        stats.dmin = d;
        stats.davg += d;
        stats.navg += 1;
    }

    r2 = r2.max(params.min_r_sq);
    let r = r2.sqrt();

    let coeff = (1.0 - params.cutoff / r) / r2 / params.mass;
    particle.ax += coeff * dx;
    particle.ay += coeff * dy;
}

#[cfg(test)]
mod tests {
    use super::*;
    use particle_common::SimulationConfig;

    fn default_params() -> SimParams {
        let mut config = SimulationConfig::default();
        config.initial_conditions.num_particles = 100;
        config.get_sim_params()
    }

    // cutoff = 0.25 keeps every distance below exactly representable
    fn exact_params() -> SimParams {
        let mut config = SimulationConfig::default();
        config.initial_conditions.num_particles = 2;
        config.physics.density = 0.5;
        config.physics.cutoff = 0.25;
        config.get_sim_params()
    }

    #[test]
    fn beyond_cutoff_is_a_no_op() {
        let params = default_params();
        let mut a = Particle::at(0.1, 0.1);
        let b = Particle::at(0.1 + params.cutoff * 1.01, 0.1);
        let mut stats = StepStats::default();
        apply_force(&mut a, &b, &mut stats, &params);
        assert_eq!(a, Particle::at(0.1, 0.1));
        assert_eq!(stats, StepStats::default());
    }

    #[test]
    fn exactly_at_cutoff_contributes_nothing() {
        let params = exact_params();
        let mut a = Particle::at(0.0, 0.5);
        let b = Particle::at(0.25, 0.5);
        let mut stats = StepStats::default();
        apply_force(&mut a, &b, &mut stats, &params);
        assert_eq!((a.ax, a.ay), (0.0, 0.0));
        assert_eq!(stats, StepStats::default());
    }

    #[test]
    fn self_interaction_is_inert() {
        let params = default_params();
        let mut a = Particle::at(0.2, 0.3);
        let same = a;
        let mut stats = StepStats::default();
        apply_force(&mut a, &same, &mut stats, &params);
        assert_eq!((a.ax, a.ay), (0.0, 0.0));
        assert_eq!(stats.navg, 0);
        assert_eq!(stats.dmin, 1.0);
    }

    #[test]
    fn newton_third_law() {
        let params = default_params();
        let mut a = Particle::at(0.200, 0.300);
        let mut b = Particle::at(0.203, 0.304);
        let (pa, pb) = (a, b);
        let mut stats = StepStats::default();
        apply_force(&mut a, &pb, &mut stats, &params);
        apply_force(&mut b, &pa, &mut stats, &params);
        assert!(a.ax != 0.0 && a.ay != 0.0);
        assert_eq!(a.ax, -b.ax);
        assert_eq!(a.ay, -b.ay);
    }

    #[test]
    fn close_pairs_are_repelled() {
        let params = default_params();
        let mut a = Particle::at(0.200, 0.3);
        let b = Particle::at(0.205, 0.3);
        let mut stats = StepStats::default();
        apply_force(&mut a, &b, &mut stats, &params);
        // Neighbor on the +x side pushes toward -x inside the cutoff
        assert!(a.ax < 0.0);
        assert_eq!(a.ay, 0.0);
    }

    #[test]
    fn min_r_floor_bounds_coincident_and_near_pairs() {
        let params = default_params();
        let floor_coeff = (1.0 - params.cutoff / params.min_r) / params.min_r_sq / params.mass;

        let mut a = Particle::at(0.2, 0.2);
        let b = Particle::at(0.2 + params.min_r * 1e-3, 0.2);
        let mut stats = StepStats::default();
        apply_force(&mut a, &b, &mut stats, &params);
        assert!(a.ax.is_finite());
        assert!((a.ax - floor_coeff * params.min_r * 1e-3).abs() <= 1e-9 * a.ax.abs());
    }

    #[test]
    fn statistics_track_running_minimum() {
        let params = exact_params();
        let mut a = Particle::at(0.5, 0.5);
        let mut stats = StepStats::default();

        // 0.5 of cutoff: new minimum
        apply_force(&mut a, &Particle::at(0.625, 0.5), &mut stats, &params);
        assert_eq!((stats.dmin, stats.davg, stats.navg), (0.5, 0.5, 1));

        // 0.75 of cutoff: farther than the running minimum, not recorded
        apply_force(&mut a, &Particle::at(0.5, 0.6875), &mut stats, &params);
        assert_eq!((stats.dmin, stats.davg, stats.navg), (0.5, 0.5, 1));

        // 0.25 of cutoff: closer again, accumulated
        apply_force(&mut a, &Particle::at(0.4375, 0.5), &mut stats, &params);
        assert_eq!((stats.dmin, stats.davg, stats.navg), (0.25, 0.75, 2));
        assert_eq!(stats.average(), Some(0.375));
    }

    #[test]
    fn empty_stats_have_no_average() {
        assert_eq!(StepStats::default().average(), None);
    }
}
