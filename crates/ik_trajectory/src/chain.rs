use nalgebra::{Isometry3, Unit, Vector3};

use crate::config::ChainSpec;
use crate::joint::JointNode;
use crate::{Error, Result};

/// A serial kinematic chain: revolute joints from root to tip, terminated by
/// one effector node
///
/// Nodes are stored in traversal order, so joint `i` of the flat angle array
/// is node `i` and every parent precedes its children.
#[derive(Clone, Debug)]
pub struct KinematicChain {
    nodes: Vec<JointNode>,
    joint_count: usize,
}

impl KinematicChain {
    /// Build a chain from its description and evaluate it at zero angles
    ///
    /// # Example
    /// ```rust
    /// use ik_trajectory::{ChainSpec, KinematicChain};
    ///
    /// let chain = KinematicChain::build(&ChainSpec::kuka_iiwa()).unwrap();
    /// assert_eq!(chain.joint_count(), 7);
    /// assert_eq!(chain.node_count(), 8);
    /// ```
    pub fn build(spec: &ChainSpec) -> Result<Self> {
        if spec.joints.is_empty() {
            return Err(Error::InvalidConfiguration {
                message: "chain has no joints".to_string(),
            });
        }

        let mut nodes = Vec::with_capacity(spec.joints.len() + 1);
        for (index, joint) in spec.joints.iter().enumerate() {
            let (min, max) = joint.limits;
            if min.is_nan() || max.is_nan() || min > max {
                return Err(Error::InvalidConfiguration {
                    message: format!("joint {index} has invalid limits [{min}, {max}]"),
                });
            }
            if !joint.offset.iter().all(|v| v.is_finite()) {
                return Err(Error::InvalidConfiguration {
                    message: format!("joint {index} has a non-finite offset"),
                });
            }
            if !joint.axis.iter().all(|v| v.is_finite()) {
                return Err(Error::InvalidConfiguration {
                    message: format!("joint {index} has a non-finite axis"),
                });
            }
            let axis = Unit::try_new(joint.axis, 1e-12).ok_or_else(|| {
                Error::InvalidConfiguration {
                    message: format!("joint {index} has a degenerate axis"),
                }
            })?;

            let mut node = JointNode::joint(joint.offset, axis.into_inner(), joint.limits);
            node.attach(index, index.checked_sub(1));
            nodes.push(node);
        }

        if !spec.effector_offset.iter().all(|v| v.is_finite()) {
            return Err(Error::InvalidConfiguration {
                message: "effector has a non-finite offset".to_string(),
            });
        }
        let joint_count = nodes.len();
        let mut effector = JointNode::effector(spec.effector_offset);
        effector.attach(joint_count, Some(joint_count - 1));
        nodes.push(effector);

        let mut chain = Self { nodes, joint_count };
        chain.forward_evaluate();

        tracing::debug!(
            joints = chain.joint_count,
            nodes = chain.nodes.len(),
            "built kinematic chain"
        );
        Ok(chain)
    }

    /// Number of rotational joints
    pub fn joint_count(&self) -> usize {
        self.joint_count
    }

    /// Number of nodes, effector included
    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn nodes(&self) -> &[JointNode] {
        &self.nodes
    }

    /// The rotational joints in traversal order
    pub fn joints(&self) -> impl Iterator<Item = &JointNode> {
        self.nodes.iter().filter(|node| node.is_joint())
    }

    pub fn effector(&self) -> &JointNode {
        // `build` always appends the effector last
        &self.nodes[self.joint_count]
    }

    /// Set one joint angle without clamping; out-of-range indices are ignored
    pub fn set_joint_angle(&mut self, index: usize, value: f64) {
        if index < self.joint_count {
            self.nodes[index].set_angle(value);
        }
    }

    /// Set every joint angle at once without clamping
    pub fn set_joint_angles(&mut self, angles: &[f64]) -> Result<()> {
        if angles.len() != self.joint_count {
            return Err(Error::InvalidVariableCount {
                expected: self.joint_count,
                actual: angles.len(),
            });
        }
        for (node, &angle) in self.nodes.iter_mut().zip(angles) {
            node.set_angle(angle);
        }
        Ok(())
    }

    pub fn joint_angle(&self, index: usize) -> Option<f64> {
        (index < self.joint_count).then(|| self.nodes[index].angle())
    }

    pub fn joint_angles(&self) -> Vec<f64> {
        self.joints().map(JointNode::angle).collect()
    }

    /// Add `delta` to a joint angle, clamping to its limits
    pub(crate) fn add_to_joint_angle(&mut self, index: usize, delta: f64) -> f64 {
        self.nodes[index].add_to_angle(delta)
    }

    /// Recompute every node's world transform from root to effector
    ///
    /// Must be called after changing angles and before reading world
    /// positions or building a Jacobian.
    pub fn forward_evaluate(&mut self) {
        for index in 0..self.nodes.len() {
            let parent_world = match self.nodes[index].parent() {
                Some(parent) => *self.nodes[parent].world_transform(),
                None => Isometry3::identity(),
            };
            self.nodes[index].update_world(&parent_world);
        }
    }

    /// Effector world position after the last forward evaluation
    pub fn effector_world_position(&self) -> Vector3<f64> {
        self.effector().world_position()
    }
}
