//! 8-neighbourhood operations over a spatial grid of attention rows
//!
//! A grid has shape `[batch, height, width, n]`: every spatial position owns
//! an `n`-length vector (for attention, a full row of the distribution).
//! Borders are handled by edge replication, so a position on the edge sees
//! itself in place of the missing neighbours.

use burn::prelude::*;

/// The eight `(row, col)` neighbour offsets, row-major, centre excluded
pub const NEIGHBOR_OFFSETS: [(isize, isize); 8] = [
    (-1, -1),
    (-1, 0),
    (-1, 1),
    (0, -1),
    (0, 1),
    (1, -1),
    (1, 0),
    (1, 1),
];

/// Pads the two spatial axes of a grid by one cell using edge replication
///
/// Input: `[batch, height, width, n]`
/// Output: `[batch, height + 2, width + 2, n]`
pub fn replicate_pad<B: Backend>(grid: Tensor<B, 4>) -> Tensor<B, 4> {
    let [b, h, w, n] = grid.dims();
    assert!(h > 0 && w > 0, "cannot pad an empty {h}x{w} grid");

    let top = grid.clone().slice([0..b, 0..1, 0..w, 0..n]);
    let bottom = grid.clone().slice([0..b, h - 1..h, 0..w, 0..n]);
    let grid = Tensor::cat(vec![top, grid, bottom], 1);

    let left = grid.clone().slice([0..b, 0..h + 2, 0..1, 0..n]);
    let right = grid.clone().slice([0..b, 0..h + 2, w - 1..w, 0..n]);
    Tensor::cat(vec![left, grid, right], 2)
}

/// Gathers the neighbour at `offset` for every position of an `height x width` grid
///
/// `padded` must come from [`replicate_pad`].
pub fn shifted_neighbor<B: Backend>(
    padded: Tensor<B, 4>,
    offset: (isize, isize),
    height: usize,
    width: usize,
) -> Tensor<B, 4> {
    let [b, _, _, n] = padded.dims();
    let row = (1 + offset.0) as usize;
    let col = (1 + offset.1) as usize;
    padded.slice([0..b, row..row + height, col..col + width, 0..n])
}

/// A grid together with its replicate-padded copy
///
/// Padding once and reusing it keeps the distance and averaging passes on the
/// same neighbour set.
#[derive(Debug, Clone)]
pub struct Neighborhood<B: Backend> {
    grid: Tensor<B, 4>,
    padded: Tensor<B, 4>,
}

impl<B: Backend> Neighborhood<B> {
    /// Creates a neighbourhood view over `[batch, height, width, n]`
    pub fn new(grid: Tensor<B, 4>) -> Self {
        let padded = replicate_pad(grid.clone());
        Self { grid, padded }
    }

    /// Spatial `(height, width)` of the unpadded grid
    pub fn spatial(&self) -> (usize, usize) {
        let [_, h, w, _] = self.grid.dims();
        (h, w)
    }

    /// The unpadded grid
    pub fn grid(&self) -> Tensor<B, 4> {
        self.grid.clone()
    }

    fn neighbors(&self) -> impl Iterator<Item = Tensor<B, 4>> + '_ {
        let (h, w) = self.spatial();
        NEIGHBOR_OFFSETS
            .iter()
            .map(move |&offset| shifted_neighbor(self.padded.clone(), offset, h, w))
    }

    /// Chebyshev (L-infinity) distance to each of the eight neighbours
    ///
    /// Output: `[batch, height, width, 8]`, last axis ordered as
    /// [`NEIGHBOR_OFFSETS`].
    pub fn chebyshev_distances(&self) -> Tensor<B, 4> {
        let distances = self
            .neighbors()
            .map(|neighbor| (neighbor - self.grid.clone()).abs().max_dim(3))
            .collect();
        Tensor::cat(distances, 3)
    }

    /// Worst-case neighbour distance per position
    ///
    /// Output: `[batch, height, width, 1]`
    pub fn max_distance(&self) -> Tensor<B, 4> {
        self.chebyshev_distances().max_dim(3)
    }

    /// Elementwise mean of the eight neighbours, centre excluded
    ///
    /// Output: `[batch, height, width, n]`
    pub fn mean(&self) -> Tensor<B, 4> {
        let total = self
            .neighbors()
            .reduce(|acc, neighbor| acc + neighbor)
            .unwrap_or_else(|| self.grid.zeros_like());
        total / NEIGHBOR_OFFSETS.len() as f64
    }
}
