//! # IK Trajectory
//!
//! Per-step differential inverse kinematics for a serial manipulator.
//! Each simulation step the caller hands over the measured joint angles and
//! effector position; the solver builds the position Jacobian of its
//! kinematic chain and returns joint angles that move the effector toward
//! the target, clamped to the joint limits.
//!
//! ## Features
//!
//! - Kinematic chain model with forward evaluation
//! - Geometric position Jacobian, or one supplied by an external simulation
//! - Transpose, pseudoinverse, damped and selectively damped least squares
//! - Integration with nalgebra for linear algebra
//!
//! ## Example
//!
//! ```rust
//! use ik_trajectory::{IkSolver, OscillatingTarget, SolveMethod};
//!
//! let mut solver = IkSolver::kuka_iiwa().unwrap();
//! let mut target = OscillatingTarget::default();
//! let mut angles = vec![0.0; 7];
//!
//! for _ in 0..10 {
//!     let goal = target.advance(0.01);
//!     let measured = solver.chain().effector_world_position();
//!     angles = solver
//!         .solve(goal, measured, &angles, SolveMethod::SelectivelyDamped, None)
//!         .unwrap();
//! }
//! ```

pub mod chain;
pub mod config;
pub mod jacobian;
pub mod joint;
pub mod method;
pub mod solver;
pub mod trajectory;

pub use chain::KinematicChain;
pub use config::{ChainSpec, JointSpec, KUKA_IIWA_DOF, SolverConfig};
pub use jacobian::JacobianState;
pub use joint::{JointNode, NodeKind};
pub use method::SolveMethod;
pub use nalgebra::{Isometry3, Vector3};
pub use solver::IkSolver;
pub use trajectory::OscillatingTarget;

/// Common result type for this library
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for chain construction and IK solves
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The chain or the supplied angles do not have the supported DOF count
    #[error("Unsupported chain size: expected {expected} joints, got {actual}")]
    UnsupportedChainSize { expected: usize, actual: usize },

    /// External Jacobian length differs from rows × cols
    #[error("Malformed external Jacobian: expected {expected} values, got {actual}")]
    MalformedExternalJacobian { expected: usize, actual: usize },

    /// Invalid variable count
    #[error("Expected {expected} variables, got {actual}")]
    InvalidVariableCount { expected: usize, actual: usize },

    /// Invalid chain description or configuration
    #[error("Invalid configuration: {message}")]
    InvalidConfiguration { message: String },
}
