//! Uniform spatial binning of the particle store.
//!
//! The domain is covered by `bins x bins` square cells of side `cutoff`, each holding the
//! indices of the particles whose position falls inside it. Because no pair interacts beyond
//! `cutoff` and a cell is exactly `cutoff` wide, every interaction partner of a particle lies
//! in the 3x3 block of cells around its own.
//!
//! Cells are unordered sets: removal swaps the last member into the hole, so the order of
//! particles inside a cell changes over time. Traversal is still deterministic for a given
//! history (cell order, then current order within a cell).

use crate::particle::Particle;
use anyhow::Result;
use particle_common::SimParams;

/// Grid coordinates of a cell. `i` follows x, `j` follows y.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CellIdx {
    pub i: usize,
    pub j: usize,
}

#[derive(Debug, Clone)]
pub struct BinGrid {
    bins: usize,
    cell_size: f64,
    /// Row-major by `i`: cell `(i, j)` lives at `i * bins + j`.
    cells: Vec<Vec<usize>>,
}

// Clamped bin coordinate along one axis
#[inline(always)]
fn axis_bin(coord: f64, cell_size: f64, bins: usize) -> usize {
    let b = (coord / cell_size).floor();
    // Also maps NaN to 0
    if !(b > 0.0) {
        return 0;
    }
    (b as usize).min(bins - 1)
}

impl BinGrid {
    /// An empty grid sized for the domain in `params`.
    pub fn new(params: &SimParams) -> Self {
        let bins = params.bins.max(1);
        Self {
            bins,
            cell_size: params.cutoff,
            cells: vec![Vec::new(); params.num_bins().max(1)],
        }
    }

    /// A grid already holding every particle of `particles`.
    pub fn from_particles(params: &SimParams, particles: &[Particle]) -> Self {
        let mut grid = Self::new(params);
        grid.populate(particles);
        grid
    }

    pub fn bins(&self) -> usize {
        self.bins
    }

    /// Cell containing `p`: `clamp(floor(x / cutoff), 0, bins - 1)` per axis.
    #[inline(always)]
    pub fn cell_of(&self, p: &Particle) -> CellIdx {
        CellIdx {
            i: axis_bin(p.x, self.cell_size, self.bins),
            j: axis_bin(p.y, self.cell_size, self.bins),
        }
    }

    #[inline(always)]
    fn flat(&self, cell: CellIdx) -> usize {
        cell.i * self.bins + cell.j
    }

    /// Particle indices currently stored in `cell`.
    pub fn members(&self, cell: CellIdx) -> &[usize] {
        &self.cells[self.flat(cell)]
    }

    /// Clears every cell and inserts each particle (by store index) into `cell_of` it.
    pub fn populate(&mut self, particles: &[Particle]) {
        self.cells.iter_mut().for_each(|c| c.clear());
        for (idx, p) in particles.iter().enumerate() {
            let flat = self.flat(self.cell_of(p));
            self.cells[flat].push(idx);
        }
    }

    /// Candidate interaction partners of `p`: every member of its own cell and of the up to
    /// eight surrounding cells, clamped at the domain edge. Includes `p` itself when `p` is in
    /// the store.
    pub fn neighbors_of(&self, p: &Particle) -> impl Iterator<Item = usize> + '_ {
        self.neighbors_of_cell(self.cell_of(p))
    }

    /// Members of the 3x3 block centered on `cell`, in `(i, j)` cell order.
    pub fn neighbors_of_cell(&self, cell: CellIdx) -> impl Iterator<Item = usize> + '_ {
        let last = self.bins - 1;
        let i_range = cell.i.saturating_sub(1)..=(cell.i + 1).min(last);
        let j_lo = cell.j.saturating_sub(1);
        let j_hi = (cell.j + 1).min(last);
        let bins = self.bins;

        i_range
            .flat_map(move |i| (j_lo..=j_hi).map(move |j| i * bins + j))
            .flat_map(move |flat| self.cells[flat].iter().copied())
    }

    /// Moves particle `idx` from `old_cell` to `new_cell`. No-op when the cells are equal.
    ///
    /// Membership is matched by index, never by position, since two particles may share
    /// coordinates. Removal is O(1) after the lookup (swap with the last member).
    pub fn rebin(&mut self, idx: usize, old_cell: CellIdx, new_cell: CellIdx) -> Result<()> {
        if old_cell == new_cell {
            return Ok(());
        }
        let old_flat = self.flat(old_cell);
        let old = &mut self.cells[old_flat];
        let Some(pos) = old.iter().position(|&member| member == idx) else {
            anyhow::bail!(
                "Bin invariant violated: particle {} missing from its cell ({}, {}).",
                idx, old_cell.i, old_cell.j
            );
        };
        old.swap_remove(pos);

        let new_flat = self.flat(new_cell);
        self.cells[new_flat].push(idx);
        Ok(())
    }

    /// Total number of stored entries.
    pub fn len(&self) -> usize {
        self.cells.iter().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(Vec::is_empty)
    }

    /// Checks that each particle is stored exactly once, in the cell its position maps to.
    pub fn verify(&self, particles: &[Particle]) -> Result<()> {
        let mut seen = vec![false; particles.len()];
        for (flat, members) in self.cells.iter().enumerate() {
            let cell = CellIdx { i: flat / self.bins, j: flat % self.bins };
            for &idx in members {
                let Some(p) = particles.get(idx) else {
                    anyhow::bail!("Cell ({}, {}) holds unknown particle {}.", cell.i, cell.j, idx);
                };
                if std::mem::replace(&mut seen[idx], true) {
                    anyhow::bail!("Particle {} is stored in more than one cell.", idx);
                }
                let expected = self.cell_of(p);
                if expected != cell {
                    anyhow::bail!(
                        "Particle {} at ({}, {}) stored in cell ({}, {}) but belongs to ({}, {}).",
                        idx, p.x, p.y, cell.i, cell.j, expected.i, expected.j
                    );
                }
            }
        }
        if let Some(missing) = seen.iter().position(|&s| !s) {
            anyhow::bail!("Particle {} is not stored in any cell.", missing);
        }
        Ok(())
    }
}
