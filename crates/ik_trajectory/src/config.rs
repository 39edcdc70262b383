//! Chain descriptions and solver tuning.
//!
//! A [`ChainSpec`] is the literal, ordered description of a serial chain
//! that [`crate::KinematicChain::build`] turns into nodes. [`SolverConfig`]
//! holds the numerical constants of the solve methods.

use nalgebra::Vector3;
use std::f64::consts::PI;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Degrees of freedom of the KUKA LBR iiwa arm
pub const KUKA_IIWA_DOF: usize = 7;

/// One revolute joint of a chain description
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct JointSpec {
    /// Offset from the parent node, in the parent's frame
    pub offset: Vector3<f64>,
    /// Rotation axis, normalized during chain construction
    pub axis: Vector3<f64>,
    /// Angle limits as `(min, max)` in radians
    pub limits: (f64, f64),
}

impl JointSpec {
    pub fn new(offset: Vector3<f64>, axis: Vector3<f64>, limits: (f64, f64)) -> Self {
        Self {
            offset,
            axis,
            limits,
        }
    }
}

/// Ordered description of a serial chain: joints from root to tip, then the
/// effector offset from the last joint
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ChainSpec {
    pub joints: Vec<JointSpec>,
    pub effector_offset: Vector3<f64>,
}

/// Zero-pose joint positions of the KUKA LBR iiwa, in the base frame
const KUKA_IIWA_REST_POSITIONS: [[f64; 3]; KUKA_IIWA_DOF] = [
    [0.1, 0.0, 0.0875],
    [0.1, 0.0, 0.29],
    [0.1, 0.0, 0.4945],
    [0.1, 0.0, 0.71],
    [0.1, 0.0, 0.8945],
    [0.1, 0.0, 1.11],
    [0.1, 0.0, 1.191],
];

/// Zero-pose effector position of the KUKA LBR iiwa, in the base frame
const KUKA_IIWA_EFFECTOR_REST_POSITION: [f64; 3] = [0.1, 0.0, 1.2];

/// Limits wide enough to leave a joint effectively unconstrained
const WIDE_LIMITS: (f64, f64) = (-4.0 * PI, 4.0 * PI);

impl ChainSpec {
    pub fn new(joints: Vec<JointSpec>, effector_offset: Vector3<f64>) -> Self {
        Self {
            joints,
            effector_offset,
        }
    }

    /// Build a description from absolute zero-pose positions
    ///
    /// Each entry is `(position, axis, limits)` with `position` expressed in
    /// the base frame with every joint at zero; offsets are derived from
    /// consecutive positions.
    pub fn from_rest_positions(
        joints: &[(Vector3<f64>, Vector3<f64>, (f64, f64))],
        effector_position: Vector3<f64>,
    ) -> Self {
        let mut previous = Vector3::zeros();
        let joints = joints
            .iter()
            .map(|&(position, axis, limits)| {
                let offset = position - previous;
                previous = position;
                JointSpec::new(offset, axis, limits)
            })
            .collect();

        Self::new(joints, effector_position - previous)
    }

    /// The 7-DOF KUKA LBR iiwa used by the grasp demo
    ///
    /// The second joint is limited to `[-0.5, 0.4]`; the base joint is left
    /// unbounded and the remaining joints get `±4π`.
    pub fn kuka_iiwa() -> Self {
        let axes = [
            Vector3::z(),
            Vector3::y(),
            Vector3::z(),
            -Vector3::y(),
            Vector3::z(),
            Vector3::y(),
            Vector3::z(),
        ];
        let limits = [
            (-1e30, 1e30),
            (-0.5, 0.4),
            WIDE_LIMITS,
            WIDE_LIMITS,
            WIDE_LIMITS,
            WIDE_LIMITS,
            WIDE_LIMITS,
        ];

        let joints: Vec<_> = KUKA_IIWA_REST_POSITIONS
            .iter()
            .zip(axes)
            .zip(limits)
            .map(|((position, axis), limits)| (Vector3::from(*position), axis, limits))
            .collect();

        Self::from_rest_positions(&joints, Vector3::from(KUKA_IIWA_EFFECTOR_REST_POSITION))
    }

    /// Pick a known chain for a multibody with `num_links` links
    pub fn for_joint_count(num_links: usize) -> Option<Self> {
        match num_links {
            KUKA_IIWA_DOF => Some(Self::kuka_iiwa()),
            _ => None,
        }
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    /// Parse a chain description from YAML
    ///
    /// ```yaml
    /// joints:
    ///   - offset: [0.0, 0.0, 0.1]
    ///     axis: [0.0, 0.0, 1.0]
    ///     limits: [-3.14, 3.14]
    /// effector_offset: [0.0, 0.0, 0.2]
    /// ```
    #[cfg(feature = "serde")]
    pub fn from_yaml_str(yaml: &str) -> crate::Result<Self> {
        serde_yaml::from_str(yaml).map_err(|e| crate::Error::InvalidConfiguration {
            message: format!("chain description: {e}"),
        })
    }
}

impl Default for ChainSpec {
    fn default() -> Self {
        Self::kuka_iiwa()
    }
}

/// Numerical constants of the solve methods
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SolverConfig {
    /// Number of joints the solver accepts
    pub dof: usize,
    /// Damping factor λ of the damped least squares methods
    pub damping_lambda: f64,
    /// Singular values at or below this fraction of the largest one are
    /// ignored by the pseudoinverse
    pub pseudoinverse_threshold_factor: f64,
    /// Largest single-joint change per call, in radians
    pub max_angle_transpose: f64,
    pub max_angle_dls: f64,
    pub max_angle_pseudoinverse: f64,
    pub max_angle_sdls: f64,
    /// Base distance the SDLS error vector is clamped to
    pub base_max_target_distance: f64,
}

impl Default for SolverConfig {
    fn default() -> Self {
        Self {
            dof: KUKA_IIWA_DOF,
            damping_lambda: 0.6,
            pseudoinverse_threshold_factor: 0.01,
            max_angle_transpose: 30.0_f64.to_radians(),
            max_angle_dls: 45.0_f64.to_radians(),
            max_angle_pseudoinverse: 5.0_f64.to_radians(),
            max_angle_sdls: 45.0_f64.to_radians(),
            base_max_target_distance: 0.4,
        }
    }
}

impl SolverConfig {
    pub fn damping_lambda_squared(&self) -> f64 {
        self.damping_lambda * self.damping_lambda
    }

    /// Reject tuning values the solve methods cannot work with
    ///
    /// Step bounds and the SDLS base distance must be finite and positive,
    /// the damping and threshold factors finite and non-negative.
    pub fn validate(&self) -> crate::Result<()> {
        if self.dof == 0 {
            return Err(invalid_config("dof must be at least 1"));
        }

        let positive = [
            ("max_angle_transpose", self.max_angle_transpose),
            ("max_angle_dls", self.max_angle_dls),
            ("max_angle_pseudoinverse", self.max_angle_pseudoinverse),
            ("max_angle_sdls", self.max_angle_sdls),
            ("base_max_target_distance", self.base_max_target_distance),
        ];
        for (name, value) in positive {
            if !value.is_finite() || value <= 0.0 {
                return Err(invalid_config(&format!("{name} must be positive, got {value}")));
            }
        }

        let non_negative = [
            ("damping_lambda", self.damping_lambda),
            (
                "pseudoinverse_threshold_factor",
                self.pseudoinverse_threshold_factor,
            ),
        ];
        for (name, value) in non_negative {
            if !value.is_finite() || value < 0.0 {
                return Err(invalid_config(&format!(
                    "{name} must be non-negative, got {value}"
                )));
            }
        }
        Ok(())
    }

    /// Parse solver constants from YAML; missing keys keep their defaults
    #[cfg(feature = "serde")]
    pub fn from_yaml_str(yaml: &str) -> crate::Result<Self> {
        let config: Self =
            serde_yaml::from_str(yaml).map_err(|e| crate::Error::InvalidConfiguration {
                message: format!("solver configuration: {e}"),
            })?;
        config.validate()?;
        Ok(config)
    }
}

fn invalid_config(message: &str) -> crate::Error {
    crate::Error::InvalidConfiguration {
        message: message.to_string(),
    }
}
