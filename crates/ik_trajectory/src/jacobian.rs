use nalgebra::{DMatrix, DVector, Vector3};

use crate::chain::KinematicChain;
use crate::{Error, Result};

/// Rows of the position-only Jacobian
pub const JACOBIAN_ROWS: usize = 3;

/// Per-solve working data: the 3×n position Jacobian, the position error
/// and the target it was built for
#[derive(Clone, Debug)]
pub struct JacobianState {
    matrix: DMatrix<f64>,
    delta_s: DVector<f64>,
    target: Vector3<f64>,
}

impl JacobianState {
    /// Build the geometric Jacobian of an evaluated chain
    ///
    /// Column `j` is `w_j × (s_effector − s_j)`, with `w_j` the world axis and
    /// `s_j` the world position of joint `j`. The error is measured against
    /// `current_effector`, which may come from an external simulation rather
    /// than from the chain's own forward evaluation.
    pub fn compute(
        chain: &KinematicChain,
        target: Vector3<f64>,
        current_effector: Vector3<f64>,
    ) -> Self {
        let effector = chain.effector_world_position();
        let mut matrix = DMatrix::zeros(JACOBIAN_ROWS, chain.joint_count());

        for (col, joint) in chain.joints().enumerate() {
            let column = joint.world_axis().cross(&(effector - joint.world_position()));
            for row in 0..JACOBIAN_ROWS {
                matrix[(row, col)] = column[row];
            }
        }

        let delta = target - current_effector;
        Self {
            matrix,
            delta_s: DVector::from_column_slice(delta.as_slice()),
            target,
        }
    }

    pub fn rows(&self) -> usize {
        self.matrix.nrows()
    }

    pub fn cols(&self) -> usize {
        self.matrix.ncols()
    }

    pub fn matrix(&self) -> &DMatrix<f64> {
        &self.matrix
    }

    /// Position error `target − current effector`
    pub fn delta_s(&self) -> &DVector<f64> {
        &self.delta_s
    }

    pub fn target(&self) -> &Vector3<f64> {
        &self.target
    }

    /// Check that a flattened external Jacobian fits this state
    pub fn validate_external(&self, values: &[f64]) -> Result<()> {
        validate_external_len(self.rows(), self.cols(), values)
    }

    /// Replace the computed Jacobian with an external one, given row-major
    pub fn set_external(&mut self, values: &[f64]) -> Result<()> {
        self.validate_external(values)?;
        self.matrix = DMatrix::from_row_slice(self.rows(), self.cols(), values);
        Ok(())
    }
}

pub(crate) fn validate_external_len(rows: usize, cols: usize, values: &[f64]) -> Result<()> {
    let expected = rows * cols;
    if values.len() != expected {
        return Err(Error::MalformedExternalJacobian {
            expected,
            actual: values.len(),
        });
    }
    Ok(())
}
