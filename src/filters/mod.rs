//! Smoothing filters for the primary target position.
//!
//! The detector reports a slightly different box every frame; smoothing the
//! estimated 3D position before it reaches the gaze controller removes most
//! of that jitter.

/// Exponential filter for responsive smoothing
pub mod exponential;

use crate::{geometry::Position3D, Error, Result};

/// Trait for all target position filters
pub trait TargetFilter: Send + Sync {
    /// Apply filter to a new position estimate
    fn apply(&mut self, position: Position3D) -> Position3D;

    /// Reset filter state
    fn reset(&mut self);

    /// Get filter name
    fn name(&self) -> &str;
}

/// No-op filter that passes positions through unchanged
pub struct NoFilter;

impl TargetFilter for NoFilter {
    fn apply(&mut self, position: Position3D) -> Position3D {
        position
    }

    fn reset(&mut self) {}

    fn name(&self) -> &str {
        "NoFilter"
    }
}

/// Create a target filter from a description such as `none` or `exponential:0.7`
pub fn create_filter(name: &str) -> Result<Box<dyn TargetFilter>> {
    let lowered = name.to_lowercase();
    let mut parts = lowered.split(':');
    let kind = parts.next().unwrap_or_default();
    let param = parts.next();

    match kind {
        "none" | "nofilter" => Ok(Box::new(NoFilter)),
        "exponential" => {
            let alpha = match param {
                Some(raw) => raw
                    .parse::<f64>()
                    .map_err(|e| Error::FilterError(format!("Invalid alpha '{raw}': {e}")))?,
                None => crate::constants::DEFAULT_TARGET_SMOOTHING_ALPHA,
            };
            if !(alpha > 0.0 && alpha <= 1.0) {
                return Err(Error::FilterError(format!("Alpha must be in (0, 1], got {alpha}")));
            }
            Ok(Box::new(exponential::ExponentialFilter::new(alpha)))
        }
        _ => Err(Error::FilterError(format!("Unknown filter type: {name}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_filter() {
        let mut filter = NoFilter;
        let p = Position3D::new(0.1, 0.2, 1.5);
        assert_eq!(filter.apply(p), p);
    }

    #[test]
    fn test_create_filter() {
        assert!(create_filter("none").is_ok());
        assert!(create_filter("exponential").is_ok());
        assert!(create_filter("exponential:0.3").is_ok());
        assert!(create_filter("exponential:0").is_err());
        assert!(create_filter("exponential:abc").is_err());
        assert!(create_filter("kalman").is_err());
    }
}
