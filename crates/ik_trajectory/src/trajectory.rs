use nalgebra::Vector3;

/// Smallest and largest time step accepted by [`OscillatingTarget::advance`]
pub const MIN_STEP: f64 = 1e-4;
pub const MAX_STEP: f64 = 1e-2;

/// Effector target sweeping back and forth along a line,
/// `base + amplitude · cos(t)`
///
/// Drives the tracking demo: the simulation advances it once per step and
/// hands [`OscillatingTarget::position`] to both the solver and the renderer.
#[derive(Clone, Debug, PartialEq)]
pub struct OscillatingTarget {
    base: Vector3<f64>,
    amplitude: Vector3<f64>,
    time: f64,
}

impl OscillatingTarget {
    pub fn new(base: Vector3<f64>, amplitude: Vector3<f64>) -> Self {
        Self {
            base,
            amplitude,
            time: 0.0,
        }
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Target position at the current time
    pub fn position(&self) -> Vector3<f64> {
        self.position_at(self.time)
    }

    pub fn position_at(&self, time: f64) -> Vector3<f64> {
        self.base + self.amplitude * time.cos()
    }

    /// Advance by `dt` (clamped to `[MIN_STEP, MAX_STEP]`) and return the new position
    pub fn advance(&mut self, dt: f64) -> Vector3<f64> {
        self.time += dt.clamp(MIN_STEP, MAX_STEP);
        self.position()
    }
}

impl Default for OscillatingTarget {
    /// Sweep in front of the KUKA iiwa between (0, 0, 1.2) and (0.8, 0, 0.4)
    fn default() -> Self {
        Self::new(Vector3::new(0.4, 0.0, 0.8), Vector3::new(-0.4, 0.0, 0.4))
    }
}
