use nalgebra::Vector3;

use crate::chain::KinematicChain;
use crate::config::{ChainSpec, SolverConfig};
use crate::jacobian::{JACOBIAN_ROWS, JacobianState, validate_external_len};
use crate::method::SolveMethod;
use crate::{Error, Result};

/// Differential IK solver owning one kinematic chain
///
/// The chain is the authoritative store of joint angles between calls: each
/// successful [`IkSolver::solve`] leaves the new angles in it. One solver per
/// robot; solvers share no state.
#[derive(Clone, Debug)]
pub struct IkSolver {
    chain: KinematicChain,
    config: SolverConfig,

    /// Largest error the SDLS method is allowed to act on, updated after each solve
    target_clamp: f64,
}

impl IkSolver {
    /// Wrap `chain` with the given solver constants
    ///
    /// # Errors
    /// [`Error::InvalidConfiguration`] when `config` fails
    /// [`SolverConfig::validate`].
    pub fn new(chain: KinematicChain, config: SolverConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            chain,
            config,
            target_clamp: f64::INFINITY,
        })
    }

    /// Solver for the 7-DOF KUKA LBR iiwa with default settings
    ///
    /// # Example
    /// ```rust
    /// use ik_trajectory::{IkSolver, SolveMethod, Vector3};
    ///
    /// let mut solver = IkSolver::kuka_iiwa().unwrap();
    /// let current = solver.chain().effector_world_position();
    /// let target = current + Vector3::new(0.01, 0.0, 0.0);
    /// let angles = solver
    ///     .solve(target, current, &[0.0; 7], SolveMethod::SelectivelyDamped, None)
    ///     .unwrap();
    /// assert_eq!(angles.len(), 7);
    /// ```
    pub fn kuka_iiwa() -> Result<Self> {
        let chain = KinematicChain::build(&ChainSpec::kuka_iiwa())?;
        Self::new(chain, SolverConfig::default())
    }

    /// Solver for a multibody with `num_links` links, if a matching chain is known
    pub fn for_joint_count(num_links: usize, config: SolverConfig) -> Option<Self> {
        let spec = ChainSpec::for_joint_count(num_links)?;
        let chain = KinematicChain::build(&spec).ok()?;
        Self::new(chain, config).ok()
    }

    pub fn chain(&self) -> &KinematicChain {
        &self.chain
    }

    pub fn config(&self) -> &SolverConfig {
        &self.config
    }

    /// Current SDLS error clamp distance
    pub fn target_clamp(&self) -> f64 {
        self.target_clamp
    }

    pub fn into_chain(self) -> KinematicChain {
        self.chain
    }

    /// Move the effector one step toward `target`
    ///
    /// `current_effector` is the measured effector world position and
    /// `current_angles` the measured joint angles, both supplied by the
    /// caller's simulation. An `external_jacobian` (row-major, 3×dof)
    /// replaces the geometric one. Returns the new angles, clamped to the
    /// joint limits.
    ///
    /// # Errors
    /// [`Error::UnsupportedChainSize`] when the angle count or the chain does
    /// not match the configured DOF, [`Error::MalformedExternalJacobian`] when
    /// the external Jacobian has the wrong length. Neither mutates the chain.
    pub fn solve(
        &mut self,
        target: Vector3<f64>,
        current_effector: Vector3<f64>,
        current_angles: &[f64],
        method: SolveMethod,
        external_jacobian: Option<&[f64]>,
    ) -> Result<Vec<f64>> {
        self.check_preconditions(current_angles, external_jacobian)
            .inspect_err(|e| tracing::warn!(error = %e, "rejecting IK solve"))?;

        self.chain.set_joint_angles(current_angles)?;
        self.chain.forward_evaluate();

        let mut state = JacobianState::compute(&self.chain, target, current_effector);
        if let Some(values) = external_jacobian {
            state.set_external(values)?;
        }

        let delta = method.delta_thetas(
            state.matrix(),
            state.delta_s(),
            self.target_clamp,
            &self.config,
        );

        let angles: Vec<f64> = delta
            .iter()
            .enumerate()
            .map(|(index, &d)| self.chain.add_to_joint_angle(index, d))
            .collect();
        self.chain.forward_evaluate();
        self.update_target_clamp(&state);

        tracing::debug!(
            %method,
            error = state.delta_s().norm(),
            max_change = delta.amax(),
            "solved IK step"
        );
        Ok(angles)
    }

    fn check_preconditions(
        &self,
        current_angles: &[f64],
        external_jacobian: Option<&[f64]>,
    ) -> Result<()> {
        let dof = self.config.dof;
        if self.chain.joint_count() != dof {
            return Err(Error::UnsupportedChainSize {
                expected: dof,
                actual: self.chain.joint_count(),
            });
        }
        if current_angles.len() != dof {
            return Err(Error::UnsupportedChainSize {
                expected: dof,
                actual: current_angles.len(),
            });
        }
        if let Some(values) = external_jacobian {
            validate_external_len(JACOBIAN_ROWS, dof, values)?;
        }
        Ok(())
    }

    /// Let the SDLS clamp grow while the effector moves away from the target
    fn update_target_clamp(&mut self, state: &JacobianState) {
        let remaining = (state.target() - self.chain.effector_world_position()).norm();
        let changed = remaining - state.delta_s().norm();
        let base = self.config.base_max_target_distance;
        self.target_clamp = if changed > 0.0 { base + changed } else { base };
        tracing::trace!(clamp = self.target_clamp, "updated target clamp");
    }
}
