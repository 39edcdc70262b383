//! Interchangeable strategies turning a Jacobian and a position error into
//! joint-angle changes.
//!
//! Every strategy bounds the largest single-joint change of one call; the
//! bounds live in [`SolverConfig`].

use nalgebra::{DMatrix, DVector};

use crate::config::SolverConfig;

/// Singular values at or below this carry no usable direction for SDLS
const SDLS_SINGULAR_EPSILON: f64 = 1e-10;

/// Numerical method used to compute joint deltas
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SolveMethod {
    /// Δθ = α·Jᵗ·Δs with an optimal step length α
    Transpose,
    /// Moore–Penrose pseudoinverse through the SVD
    PurePseudoinverse,
    /// Damped least squares, Δθ = Jᵗ(JJᵗ + λ²I)⁻¹·Δs
    DampedLeastSquares,
    /// Selectively damped least squares
    #[default]
    SelectivelyDamped,
    /// Damped least squares through the SVD
    DampedLeastSquaresSvd,
    /// No motion
    Identity,
}

impl SolveMethod {
    /// Map an integer method code; unknown codes select [`SolveMethod::Identity`]
    ///
    /// ```rust
    /// use ik_trajectory::SolveMethod;
    ///
    /// assert_eq!(SolveMethod::from_code(3), SolveMethod::SelectivelyDamped);
    /// assert_eq!(SolveMethod::from_code(42), SolveMethod::Identity);
    /// ```
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => Self::Transpose,
            1 => Self::PurePseudoinverse,
            2 => Self::DampedLeastSquares,
            3 => Self::SelectivelyDamped,
            4 => Self::DampedLeastSquaresSvd,
            _ => Self::Identity,
        }
    }

    /// Compute joint deltas for `jacobian` and the position error `delta_s`
    ///
    /// `target_clamp` bounds the error vector seen by SDLS.
    pub fn delta_thetas(
        self,
        jacobian: &DMatrix<f64>,
        delta_s: &DVector<f64>,
        target_clamp: f64,
        config: &SolverConfig,
    ) -> DVector<f64> {
        match self {
            Self::Transpose => transpose(jacobian, delta_s, config.max_angle_transpose),
            Self::PurePseudoinverse => pseudoinverse(
                jacobian,
                delta_s,
                config.pseudoinverse_threshold_factor,
                config.max_angle_pseudoinverse,
            ),
            Self::DampedLeastSquares => damped_least_squares(
                jacobian,
                delta_s,
                config.damping_lambda_squared(),
                config.max_angle_dls,
            ),
            Self::SelectivelyDamped => {
                let clamped = clamp_magnitude(delta_s, target_clamp);
                selectively_damped(jacobian, &clamped, config.max_angle_sdls)
            }
            Self::DampedLeastSquaresSvd => damped_least_squares_svd(
                jacobian,
                delta_s,
                config.damping_lambda_squared(),
                config.max_angle_dls,
            ),
            Self::Identity => DVector::zeros(jacobian.ncols()),
        }
    }
}

impl std::fmt::Display for SolveMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::Transpose => "jacobian transpose",
            Self::PurePseudoinverse => "pure pseudoinverse",
            Self::DampedLeastSquares => "damped least squares",
            Self::SelectivelyDamped => "selectively damped least squares",
            Self::DampedLeastSquaresSvd => "damped least squares (svd)",
            Self::Identity => "identity",
        };
        f.write_str(name)
    }
}

/// Uniformly rescale `delta` so no entry exceeds `max_angle`
fn limit_max_change(delta: &mut DVector<f64>, max_angle: f64) {
    let max_change = delta.amax();
    if max_change > max_angle {
        *delta *= max_angle / max_change;
    }
}

/// Shorten `delta_s` to at most `max_norm`
fn clamp_magnitude(delta_s: &DVector<f64>, max_norm: f64) -> DVector<f64> {
    let norm = delta_s.norm();
    if norm > max_norm {
        delta_s * (max_norm / norm)
    } else {
        delta_s.clone()
    }
}

pub fn transpose(jacobian: &DMatrix<f64>, delta_s: &DVector<f64>, max_angle: f64) -> DVector<f64> {
    let mut delta = jacobian.transpose() * delta_s;

    // Step length minimizing the linearized residual along Jᵗ·Δs
    let response = jacobian * &delta;
    let response_norm_sq = response.norm_squared();
    let alpha = if response_norm_sq > 0.0 {
        delta_s.dot(&response) / response_norm_sq
    } else {
        0.0
    };
    tracing::trace!(alpha, "transpose step length");

    delta *= alpha;
    limit_max_change(&mut delta, max_angle);
    delta
}

pub fn damped_least_squares(
    jacobian: &DMatrix<f64>,
    delta_s: &DVector<f64>,
    lambda_sq: f64,
    max_angle: f64,
) -> DVector<f64> {
    let mut normal = jacobian * jacobian.transpose();
    for i in 0..normal.nrows() {
        normal[(i, i)] += lambda_sq;
    }

    let Some(solved) = normal.lu().solve(delta_s) else {
        tracing::warn!("damped normal equations are singular, skipping update");
        return DVector::zeros(jacobian.ncols());
    };

    let mut delta = jacobian.transpose() * solved;
    limit_max_change(&mut delta, max_angle);
    delta
}

/// Singular triplets `(σᵢ, uᵢ, vᵢ)` of a Jacobian, or `None` if the SVD failed
fn singular_triplets(
    jacobian: &DMatrix<f64>,
) -> Option<Vec<(f64, DVector<f64>, DVector<f64>)>> {
    let svd = jacobian.clone().svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        tracing::warn!("singular value decomposition failed, skipping update");
        return None;
    };

    let triplets = svd
        .singular_values
        .iter()
        .enumerate()
        .map(|(i, &sigma)| {
            (
                sigma,
                u.column(i).clone_owned(),
                v_t.row(i).transpose(),
            )
        })
        .collect();
    Some(triplets)
}

pub fn damped_least_squares_svd(
    jacobian: &DMatrix<f64>,
    delta_s: &DVector<f64>,
    lambda_sq: f64,
    max_angle: f64,
) -> DVector<f64> {
    let mut delta = DVector::zeros(jacobian.ncols());
    let Some(triplets) = singular_triplets(jacobian) else {
        return delta;
    };

    for (sigma, u, v) in triplets {
        let scale = u.dot(delta_s) * sigma / (sigma * sigma + lambda_sq);
        delta.axpy(scale, &v, 1.0);
    }
    limit_max_change(&mut delta, max_angle);
    delta
}

/// Moore–Penrose pseudoinverse step
///
/// Singular values at or below `threshold_factor` times the largest one are
/// treated as zero.
pub fn pseudoinverse(
    jacobian: &DMatrix<f64>,
    delta_s: &DVector<f64>,
    threshold_factor: f64,
    max_angle: f64,
) -> DVector<f64> {
    let mut delta = DVector::zeros(jacobian.ncols());
    let Some(triplets) = singular_triplets(jacobian) else {
        return delta;
    };

    let largest = triplets.iter().fold(0.0_f64, |max, (sigma, _, _)| max.max(sigma.abs()));
    let threshold = threshold_factor * largest;
    for (sigma, u, v) in triplets {
        if sigma.abs() <= threshold {
            tracing::trace!(sigma, "dropping small singular value");
            continue;
        }
        delta.axpy(u.dot(delta_s) / sigma, &v, 1.0);
    }
    limit_max_change(&mut delta, max_angle);
    delta
}

/// Selectively damped least squares (Buss & Kim)
///
/// Each singular direction is damped by how far a unit change along it moves
/// the joints relative to how far it moves the effector.
pub fn selectively_damped(
    jacobian: &DMatrix<f64>,
    delta_t: &DVector<f64>,
    max_angle: f64,
) -> DVector<f64> {
    let mut delta = DVector::zeros(jacobian.ncols());
    let Some(triplets) = singular_triplets(jacobian) else {
        return delta;
    };

    // Effector displacement per unit change of each joint
    let column_norms: Vec<f64> = jacobian.column_iter().map(|c| c.norm()).collect();

    for (sigma, u, v) in triplets {
        if sigma.abs() <= SDLS_SINGULAR_EPSILON {
            continue;
        }
        let sigma_inv = 1.0 / sigma;

        let n = u.norm();
        let m = sigma_inv.abs()
            * v.iter()
                .zip(&column_norms)
                .map(|(vj, norm)| vj.abs() * norm)
                .sum::<f64>();

        let gamma = if n < m { max_angle * n / m } else { max_angle };

        let pre_delta = &v * (u.dot(delta_t) * sigma_inv);
        let pre_max = pre_delta.amax();
        if pre_max == 0.0 {
            continue;
        }
        delta.axpy(gamma / (gamma + pre_max), &pre_delta, 1.0);
    }

    let max_change = delta.amax();
    if max_change > max_angle {
        delta *= max_angle / (max_angle + max_change);
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use test_log::test;

    const ALL_METHODS: [SolveMethod; 6] = [
        SolveMethod::Transpose,
        SolveMethod::PurePseudoinverse,
        SolveMethod::DampedLeastSquares,
        SolveMethod::SelectivelyDamped,
        SolveMethod::DampedLeastSquaresSvd,
        SolveMethod::Identity,
    ];

    /// Well-conditioned 3×3 Jacobian with distinct singular values
    fn well_conditioned() -> DMatrix<f64> {
        DMatrix::from_row_slice(3, 3, &[1.0, 0.2, 0.0, 0.0, 0.8, 0.1, 0.1, 0.0, 0.6])
    }

    fn loose_config() -> SolverConfig {
        SolverConfig {
            max_angle_transpose: 10.0,
            max_angle_dls: 10.0,
            max_angle_pseudoinverse: 10.0,
            max_angle_sdls: 10.0,
            ..SolverConfig::default()
        }
    }

    #[test]
    fn test_from_code() {
        assert_eq!(SolveMethod::from_code(0), SolveMethod::Transpose);
        assert_eq!(SolveMethod::from_code(1), SolveMethod::PurePseudoinverse);
        assert_eq!(SolveMethod::from_code(2), SolveMethod::DampedLeastSquares);
        assert_eq!(SolveMethod::from_code(3), SolveMethod::SelectivelyDamped);
        assert_eq!(SolveMethod::from_code(4), SolveMethod::DampedLeastSquaresSvd);
        assert_eq!(SolveMethod::from_code(-1), SolveMethod::Identity);
        assert_eq!(SolveMethod::from_code(5), SolveMethod::Identity);
        assert_eq!(SolveMethod::default(), SolveMethod::SelectivelyDamped);
    }

    #[test]
    fn test_zero_error_gives_zero_delta() {
        let j = well_conditioned();
        let zero = DVector::zeros(3);
        for method in ALL_METHODS {
            let delta = method.delta_thetas(&j, &zero, f64::INFINITY, &SolverConfig::default());
            assert_eq!(delta.len(), 3);
            assert!(delta.norm() < 1e-15, "{} moved on zero error", method);
        }
    }

    #[test]
    fn test_identity_is_zero() {
        let j = well_conditioned();
        let ds = DVector::from_vec(vec![0.1, -0.2, 0.3]);
        let delta = SolveMethod::Identity.delta_thetas(&j, &ds, 1.0, &SolverConfig::default());
        assert_eq!(delta, DVector::zeros(3));
    }

    #[test]
    fn test_pseudoinverse_inverts_square_jacobian() {
        let j = well_conditioned();
        let ds = DVector::from_vec(vec![0.01, -0.02, 0.015]);
        let delta = pseudoinverse(&j, &ds, 0.01, 10.0);
        let residual = (&j * delta - &ds).norm();
        assert!(residual < 1e-12, "residual {}", residual);
    }

    #[test]
    fn test_pseudoinverse_drops_small_singular_values() {
        // Rank one: only the first row responds
        let j = DMatrix::from_row_slice(3, 2, &[1.0, 1.0, 0.0, 0.0, 0.0, 0.0]);
        let ds = DVector::from_vec(vec![0.2, 0.5, 0.0]);
        let delta = pseudoinverse(&j, &ds, 0.01, 10.0);
        assert!((delta[0] - 0.1).abs() < 1e-12);
        assert!((delta[1] - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_pseudoinverse_threshold_scales_with_jacobian() {
        // Every singular value is 0.005, well conditioned despite the scale
        let j = DMatrix::from_diagonal_element(3, 3, 0.005);
        let ds = DVector::from_vec(vec![1e-4, 0.0, 0.0]);
        let delta = pseudoinverse(&j, &ds, 0.01, 1.0);
        assert!((delta[0] - 0.02).abs() < 1e-12, "delta {}", delta);
        assert!(delta[1].abs() < 1e-12 && delta[2].abs() < 1e-12);

        // Shrinking the Jacobian uniformly keeps J·Δθ = Δs
        for scale in [1.0, 1e-2, 1e-4] {
            let scaled = well_conditioned() * scale;
            let ds = DVector::from_vec(vec![0.01, -0.02, 0.015]) * scale;
            let delta = pseudoinverse(&scaled, &ds, 0.01, 10.0);
            assert!((&scaled * delta - &ds).norm() < 1e-12 * scale);
        }
    }

    #[test]
    fn test_pseudoinverse_drops_relatively_small_singular_values() {
        // σ = 1 and σ = 0.005; the second falls under 1% of the first
        let j = DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 0.005]);
        let ds = DVector::from_vec(vec![0.1, 0.1]);
        let delta = pseudoinverse(&j, &ds, 0.01, 10.0);
        assert!((delta[0] - 0.1).abs() < 1e-12);
        assert!(delta[1].abs() < 1e-12, "delta {}", delta);
    }

    #[test]
    fn test_sdls_zero_error_with_zero_step_bound() {
        let j = well_conditioned();
        let delta = selectively_damped(&j, &DVector::zeros(3), 0.0);
        assert!(delta.iter().all(|d| *d == 0.0), "delta {}", delta);
    }

    #[test]
    fn test_dls_matches_svd_form() {
        let j = DMatrix::from_row_slice(
            3,
            4,
            &[0.5, 0.1, -0.3, 0.2, 0.0, 0.7, 0.1, -0.4, 0.2, 0.0, 0.6, 0.3],
        );
        let ds = DVector::from_vec(vec![0.05, -0.02, 0.04]);
        let lambda_sq = 0.36;
        let direct = damped_least_squares(&j, &ds, lambda_sq, 10.0);
        let via_svd = damped_least_squares_svd(&j, &ds, lambda_sq, 10.0);
        assert!((direct - via_svd).norm() < 1e-12);
    }

    #[test]
    fn test_transpose_optimal_step() {
        let j = well_conditioned();
        let ds = DVector::from_vec(vec![0.02, 0.01, -0.01]);
        let delta = transpose(&j, &ds, 10.0);

        // The step length minimizes the residual along Jᵗ·Δs
        let residual = (&ds - &j * &delta).norm();
        let direction = j.transpose() * &ds;
        for scale in [0.9, 1.1] {
            let other = (&ds - &j * (&delta * scale)).norm();
            assert!(residual <= other + 1e-15);
        }
        assert!(direction.dot(&delta) > 0.0);
    }

    #[test]
    fn test_transpose_zero_jacobian() {
        let j = DMatrix::zeros(3, 7);
        let ds = DVector::from_vec(vec![0.1, 0.1, 0.1]);
        let delta = transpose(&j, &ds, 1.0);
        assert!(delta.iter().all(|d| *d == 0.0));
    }

    #[test]
    fn test_max_angle_limits() {
        let j = DMatrix::from_row_slice(3, 3, &[0.05, 0.0, 0.0, 0.0, 0.05, 0.0, 0.0, 0.0, 0.05]);
        let ds = DVector::from_vec(vec![1.0, -1.0, 0.5]);
        let config = SolverConfig::default();

        let pinv = pseudoinverse(
            &j,
            &ds,
            config.pseudoinverse_threshold_factor,
            config.max_angle_pseudoinverse,
        );
        assert!((pinv.amax() - config.max_angle_pseudoinverse).abs() < 1e-12);

        let dls = damped_least_squares(&j, &ds, 1e-6, config.max_angle_dls);
        assert!(dls.amax() <= config.max_angle_dls + 1e-12);

        let trans = transpose(&j, &ds, config.max_angle_transpose);
        assert!(trans.amax() <= config.max_angle_transpose + 1e-12);

        let sdls = selectively_damped(&j, &ds, config.max_angle_sdls);
        assert!(sdls.amax() <= config.max_angle_sdls);
    }

    #[test]
    fn test_sdls_tracks_small_errors() {
        // Small errors on a well-conditioned Jacobian are nearly undamped
        let j = well_conditioned();
        let ds = DVector::from_vec(vec![1e-4, -2e-4, 1e-4]);
        let delta = selectively_damped(&j, &ds, PI / 4.0);
        let residual = (&j * &delta - &ds).norm();
        assert!(residual < 1e-2 * ds.norm(), "residual {}", residual);
    }

    #[test]
    fn test_sdls_uses_clamped_error() {
        let j = well_conditioned();
        let ds = DVector::from_vec(vec![3.0, 0.0, 4.0]);
        let config = loose_config();
        let clamped = SolveMethod::SelectivelyDamped.delta_thetas(&j, &ds, 0.5, &config);
        let expected = selectively_damped(&j, &(&ds * 0.1), config.max_angle_sdls);
        assert!((clamped - expected).norm() < 1e-12);
    }

    #[test]
    fn test_display() {
        assert_eq!(SolveMethod::Transpose.to_string(), "jacobian transpose");
        assert_eq!(SolveMethod::Identity.to_string(), "identity");
    }
}
