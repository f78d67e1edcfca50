use ndarray::{Array3, ArrayView2, Axis};
use serde::{Deserialize, Serialize};

use crate::error::{GravityError, Result};
use crate::problem::Problem;

/// Outcome of one solve.
///
/// On success `positions` and `velocities` are shaped
/// `(mesh.len(), order, dimension)`. A failed solve carries `status == false`
/// and empty arrays.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Solution {
    pub status: bool,
    pub mesh: Vec<f64>,
    pub positions: Array3<f64>,
    pub velocities: Array3<f64>,
}

impl Solution {
    pub fn failed() -> Self {
        Self {
            status: false,
            mesh: Vec::new(),
            positions: Array3::zeros((0, 0, 0)),
            velocities: Array3::zeros((0, 0, 0)),
        }
    }

    /// Split a row-major packed trajectory into position and velocity arrays.
    ///
    /// Each row holds the state at one mesh point in the layout produced by
    /// [`Problem::build`]: even slots are positions, odd slots velocities.
    pub fn from_trajectory(problem: &Problem, trajectory: Vec<f64>) -> Result<Self> {
        let samples = problem.mesh.len();
        let shape = (samples, problem.order, problem.dimension);
        if trajectory.len() != samples * problem.state_len() {
            return Err(GravityError::Internal(format!(
                "trajectory has {} values, expected {}",
                trajectory.len(),
                samples * problem.state_len()
            )));
        }

        let positions: Vec<f64> = trajectory.iter().step_by(2).copied().collect();
        let velocities: Vec<f64> = trajectory.iter().skip(1).step_by(2).copied().collect();

        let shape_err = |e: ndarray::ShapeError| GravityError::Internal(e.to_string());
        Ok(Self {
            status: true,
            mesh: problem.mesh.clone(),
            positions: Array3::from_shape_vec(shape, positions).map_err(shape_err)?,
            velocities: Array3::from_shape_vec(shape, velocities).map_err(shape_err)?,
        })
    }

    /// `(samples, order, dimension)`
    pub fn shape(&self) -> (usize, usize, usize) {
        self.positions.dim()
    }

    pub fn samples(&self) -> usize {
        self.positions.len_of(Axis(0))
    }

    /// Positions of all bodies at mesh index `m`, shaped `(order, dimension)`.
    pub fn positions_at(&self, m: usize) -> ArrayView2<'_, f64> {
        self.positions.index_axis(Axis(0), m)
    }

    /// Velocities of all bodies at mesh index `m`, shaped `(order, dimension)`.
    pub fn velocities_at(&self, m: usize) -> ArrayView2<'_, f64> {
        self.velocities.index_axis(Axis(0), m)
    }
}
