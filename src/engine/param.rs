//! Automatable numeric parameters
//!
//! Every externally controllable value (band Q, band gain, master gain)
//! is an `AudioParam` that reports its native range so sliders can clamp
//! before writing.

use serde::{Deserialize, Serialize};

/// A numeric engine parameter with a native `[min_value, max_value]` range
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AudioParam {
    value: f32,
    default_value: f32,
    min_value: f32,
    max_value: f32,
}

impl AudioParam {
    /// Create a parameter at its default value
    pub fn new(default_value: f32, min_value: f32, max_value: f32) -> Self {
        debug_assert!(min_value <= max_value);
        Self {
            value: default_value.clamp(min_value, max_value),
            default_value,
            min_value,
            max_value,
        }
    }

    /// Current value
    #[inline]
    pub fn value(&self) -> f32 {
        self.value
    }

    /// Write a new value, clamped to the native range
    ///
    /// NaN is ignored so a bad slider reading never poisons the chain.
    pub fn set_value(&mut self, value: f32) {
        if value.is_nan() {
            return;
        }
        self.value = self.clamp(value);
    }

    /// Restore the default value
    pub fn reset(&mut self) {
        self.value = self.default_value;
    }

    pub fn default_value(&self) -> f32 {
        self.default_value
    }

    pub fn min_value(&self) -> f32 {
        self.min_value
    }

    pub fn max_value(&self) -> f32 {
        self.max_value
    }

    /// Clamp a candidate value to this parameter's native range
    #[inline]
    pub fn clamp(&self, value: f32) -> f32 {
        value.clamp(self.min_value, self.max_value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_starts_at_default() {
        let param = AudioParam::new(1.0, 0.0, 4.0);
        assert_eq!(param.value(), 1.0);
        assert_eq!(param.default_value(), 1.0);
    }

    #[test]
    fn test_set_value_clamps() {
        let mut param = AudioParam::new(0.0, -40.0, 40.0);
        param.set_value(55.0);
        assert_eq!(param.value(), 40.0);
        param.set_value(-100.0);
        assert_eq!(param.value(), -40.0);
    }

    #[test]
    fn test_nan_ignored_and_reset() {
        let mut param = AudioParam::new(1.0, 0.0, 4.0);
        param.set_value(2.5);
        param.set_value(f32::NAN);
        assert_eq!(param.value(), 2.5);
        param.reset();
        assert_eq!(param.value(), 1.0);
    }
}
