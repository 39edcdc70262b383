use nalgebra::{Isometry3, Translation3, Unit, UnitQuaternion, Vector3};

/// Discriminates rotational joints from the terminal effector point
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NodeKind {
    /// Revolute joint with one rotational degree of freedom
    Joint,
    /// Terminal point of the chain, no degree of freedom
    Effector,
}

/// One node of a kinematic chain: a revolute joint (or the effector) plus
/// the rigid offset from its parent
#[derive(Clone, Debug)]
pub struct JointNode {
    kind: NodeKind,

    /// Offset from the parent node, expressed in the parent's frame
    offset: Vector3<f64>,

    /// Rotation axis in the node's own frame (zero for effectors)
    axis: Vector3<f64>,

    /// Current joint angle in radians
    angle: f64,

    /// Lower and upper angle limits
    limits: (f64, f64),

    /// Index of the parent node, `None` for the root
    parent: Option<usize>,

    /// Index of this node in the chain's traversal order
    index: usize,

    /// World transform after the last forward evaluation
    world_transform: Isometry3<f64>,

    /// World-frame rotation axis after the last forward evaluation
    world_axis: Vector3<f64>,
}

impl JointNode {
    /// Create a revolute joint node
    ///
    /// The axis is normalized; callers are expected to reject degenerate
    /// axes before construction (see [`crate::KinematicChain::build`]).
    ///
    /// # Example
    /// ```rust
    /// use ik_trajectory::JointNode;
    /// use nalgebra::Vector3;
    ///
    /// let joint = JointNode::joint(Vector3::new(0.0, 0.0, 0.2), Vector3::y(), (-0.5, 0.4));
    /// assert!(joint.is_joint());
    /// assert_eq!(joint.limits(), (-0.5, 0.4));
    /// ```
    pub fn joint(offset: Vector3<f64>, axis: Vector3<f64>, limits: (f64, f64)) -> Self {
        Self {
            kind: NodeKind::Joint,
            offset,
            axis: axis.normalize(),
            angle: 0.0,
            limits,
            parent: None,
            index: 0,
            world_transform: Isometry3::identity(),
            world_axis: Vector3::zeros(),
        }
    }

    /// Create the terminal effector node
    pub fn effector(offset: Vector3<f64>) -> Self {
        Self {
            kind: NodeKind::Effector,
            offset,
            axis: Vector3::zeros(),
            angle: 0.0,
            limits: (0.0, 0.0),
            parent: None,
            index: 0,
            world_transform: Isometry3::identity(),
            world_axis: Vector3::zeros(),
        }
    }

    pub(crate) fn attach(&mut self, index: usize, parent: Option<usize>) {
        self.index = index;
        self.parent = parent;
    }

    pub fn kind(&self) -> NodeKind {
        self.kind
    }

    pub fn is_joint(&self) -> bool {
        self.kind == NodeKind::Joint
    }

    pub fn is_effector(&self) -> bool {
        self.kind == NodeKind::Effector
    }

    /// Offset from the parent node
    pub fn offset(&self) -> &Vector3<f64> {
        &self.offset
    }

    /// Rotation axis in the node's own frame
    pub fn axis(&self) -> &Vector3<f64> {
        &self.axis
    }

    /// Current angle; meaningless for effectors
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Set the angle without clamping. Ignored for effectors.
    pub fn set_angle(&mut self, angle: f64) {
        if self.is_joint() {
            self.angle = angle;
        }
    }

    /// Add `delta` to the angle and clamp the result to the joint limits
    pub fn add_to_angle(&mut self, delta: f64) -> f64 {
        if self.is_joint() {
            self.angle = self.clamp(self.angle + delta);
        }
        self.angle
    }

    pub fn limits(&self) -> (f64, f64) {
        self.limits
    }

    /// Check if an angle is within the joint limits
    pub fn is_within_limits(&self, angle: f64) -> bool {
        let (min, max) = self.limits;
        angle >= min && angle <= max
    }

    /// Clamp an angle into the joint limits
    pub fn clamp(&self, angle: f64) -> f64 {
        let (min, max) = self.limits;
        angle.clamp(min, max)
    }

    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    pub fn index(&self) -> usize {
        self.index
    }

    /// Transform from the parent frame to this node's frame at the current angle
    ///
    /// The offset is applied first, then the rotation about the joint axis,
    /// so a joint's own angle moves its children but not the joint itself.
    pub fn local_transform(&self) -> Isometry3<f64> {
        let translation = Translation3::from(self.offset);
        match self.kind {
            NodeKind::Joint => {
                let rotation =
                    UnitQuaternion::from_axis_angle(&Unit::new_unchecked(self.axis), self.angle);
                Isometry3::from_parts(translation, rotation)
            }
            NodeKind::Effector => Isometry3::from_parts(translation, UnitQuaternion::identity()),
        }
    }

    /// Recompute the world transform and world axis from the parent's world transform
    pub(crate) fn update_world(&mut self, parent_world: &Isometry3<f64>) {
        self.world_axis = match self.kind {
            NodeKind::Joint => parent_world.rotation * self.axis,
            NodeKind::Effector => Vector3::zeros(),
        };
        self.world_transform = parent_world * self.local_transform();
    }

    /// World transform after the last forward evaluation
    pub fn world_transform(&self) -> &Isometry3<f64> {
        &self.world_transform
    }

    /// World position of the node origin after the last forward evaluation
    pub fn world_position(&self) -> Vector3<f64> {
        self.world_transform.translation.vector
    }

    /// World-frame rotation axis after the last forward evaluation
    pub fn world_axis(&self) -> &Vector3<f64> {
        &self.world_axis
    }
}

impl std::fmt::Display for JointNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.kind {
            NodeKind::Joint => write!(
                f,
                "Joint {} (angle: {:.4}, limits: [{}, {}], parent: {:?})",
                self.index, self.angle, self.limits.0, self.limits.1, self.parent
            ),
            NodeKind::Effector => write!(f, "Effector {} (parent: {:?})", self.index, self.parent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f64::consts::PI;
    use test_log::test;

    #[test]
    fn test_joint_creation() {
        let joint = JointNode::joint(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(3.0, 4.0, 0.0),
            (-1.0, 1.0),
        );
        assert!(joint.is_joint());
        assert!(!joint.is_effector());
        assert_eq!(joint.angle(), 0.0);
        assert_eq!(joint.parent(), None);
        assert!((joint.axis().norm() - 1.0).abs() < 1e-10); // Should be normalized
    }

    #[test]
    fn test_effector_ignores_angle() {
        let mut effector = JointNode::effector(Vector3::new(0.0, 0.0, 0.1));
        effector.set_angle(1.0);
        assert_eq!(effector.angle(), 0.0);
        effector.add_to_angle(1.0);
        assert_eq!(effector.angle(), 0.0);
    }

    #[test]
    fn test_local_transform_identity() {
        let joint = JointNode::joint(Vector3::zeros(), Vector3::z(), (-PI, PI));
        let transform = joint.local_transform();

        let identity = Isometry3::identity();
        let translation_diff = (transform.translation.vector - identity.translation.vector).norm();
        assert!(translation_diff < 1e-10);
        assert!(transform.rotation.angle().abs() < 1e-10);
    }

    #[test]
    fn test_local_transform_90_degrees() {
        let mut joint = JointNode::joint(Vector3::new(1.0, 2.0, 3.0), Vector3::z(), (-PI, PI));
        joint.set_angle(PI / 2.0);
        let transform = joint.local_transform();

        assert!((transform.rotation.angle() - PI / 2.0).abs() < 1e-10);
        // The offset is not affected by the node's own rotation
        let translation = transform.translation.vector;
        assert!((translation - Vector3::new(1.0, 2.0, 3.0)).norm() < 1e-10);
    }

    #[test]
    fn test_add_to_angle_clamps() {
        let mut joint = JointNode::joint(Vector3::zeros(), Vector3::y(), (-0.5, 0.4));
        assert_eq!(joint.add_to_angle(1.0), 0.4);
        assert_eq!(joint.add_to_angle(-2.0), -0.5);
        assert!((joint.add_to_angle(0.25) - -0.25).abs() < 1e-12);
    }

    #[test]
    fn test_set_angle_does_not_clamp() {
        let mut joint = JointNode::joint(Vector3::zeros(), Vector3::y(), (-0.5, 0.4));
        joint.set_angle(2.0);
        assert_eq!(joint.angle(), 2.0);
        assert!(!joint.is_within_limits(joint.angle()));
    }

    #[test]
    fn test_limits() {
        let joint = JointNode::joint(Vector3::zeros(), Vector3::z(), (-PI, PI));
        assert!(joint.is_within_limits(0.0));
        assert!(joint.is_within_limits(PI - 0.1));
        assert!(!joint.is_within_limits(PI + 0.1));
        assert!(!joint.is_within_limits(-PI - 0.1));
        assert_eq!(joint.clamp(4.0), PI);
    }

    #[test]
    fn test_update_world_rotates_axis_and_offset() {
        let mut joint = JointNode::joint(Vector3::new(1.0, 0.0, 0.0), Vector3::x(), (-PI, PI));
        let parent = Isometry3::from_parts(
            Translation3::new(0.0, 0.0, 1.0),
            UnitQuaternion::from_axis_angle(&Vector3::z_axis(), PI / 2.0),
        );
        joint.update_world(&parent);

        assert!((joint.world_position() - Vector3::new(0.0, 1.0, 1.0)).norm() < 1e-10);
        assert!((joint.world_axis() - Vector3::y()).norm() < 1e-10);
    }

    #[test]
    fn test_display() {
        let joint = JointNode::joint(Vector3::zeros(), Vector3::z(), (-1.0, 1.0));
        assert!(format!("{}", joint).contains("Joint 0"));
        let effector = JointNode::effector(Vector3::zeros());
        assert!(format!("{}", effector).contains("Effector"));
    }
}
