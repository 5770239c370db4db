use crate::particle::Particle;
use particle_common::SimParams;

/// Advances one particle by `dt`: velocity from the already accumulated acceleration, then
/// position from the new velocity. Positions leaving `[0, size]` are mirrored back across the
/// crossed wall with the matching velocity component negated. Acceleration is left untouched.
#[inline]
pub fn move_particle(p: &mut Particle, params: &SimParams) {
    let dt = params.dt;
    p.vx += p.ax * dt;
    p.vy += p.ay * dt;
    p.x += p.vx * dt;
    p.y += p.vy * dt;

    reflect(&mut p.x, &mut p.vx, params.size);
    reflect(&mut p.y, &mut p.vy, params.size);
}

/// Mirrors `pos` into `[0, size]`, once per wall crossed. An overshoot of more than one domain
/// width needs several reflections, so the bound is re-checked after each one.
#[inline(always)]
fn reflect(pos: &mut f64, vel: &mut f64, size: f64) {
    while *pos < 0.0 || *pos > size {
        *pos = if *pos < 0.0 { -*pos } else { 2.0 * size - *pos };
        *vel = -*vel;
    }
}
