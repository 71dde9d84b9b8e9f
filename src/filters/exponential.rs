use super::TargetFilter;
use crate::geometry::Position3D;

/// Exponential smoothing filter
pub struct ExponentialFilter {
    alpha: f64,
    last: Option<Position3D>,
}

impl ExponentialFilter {
    /// Create a new exponential filter; `alpha` is the weight of the newest sample
    ///
    /// # Panics
    ///
    /// Panics if alpha is not in the range (0, 1]
    #[must_use]
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "Alpha must be in (0, 1]");
        Self { alpha, last: None }
    }

    fn blend(&self, new: f64, last: f64) -> f64 {
        self.alpha.mul_add(new - last, last)
    }
}

impl TargetFilter for ExponentialFilter {
    fn apply(&mut self, position: Position3D) -> Position3D {
        let filtered = match self.last {
            Some(last) => Position3D::new(
                self.blend(position.x, last.x),
                self.blend(position.y, last.y),
                self.blend(position.z, last.z),
            ),
            None => position,
        };

        self.last = Some(filtered);
        filtered
    }

    fn reset(&mut self) {
        self.last = None;
    }

    fn name(&self) -> &str {
        "ExponentialFilter"
    }
}
