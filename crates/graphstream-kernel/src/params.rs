// SPDX-License-Identifier: Apache-2.0
//! Physics parameters, validated on construction and on every update.

use crate::KernelError;
use serde::{Deserialize, Serialize};

/// One parameter's valid range, used both to validate and to report a
/// useful error.
struct Range {
    name: &'static str,
    min: f32,
    max: f32,
}

impl Range {
    const fn check(&self, value: f32) -> Result<f32, KernelError> {
        if value >= self.min && value <= self.max {
            Ok(value)
        } else {
            Err(KernelError::ValidationFailed {
                parameter: self.name,
                value,
                min: self.min,
                max: self.max,
            })
        }
    }
}

/// Force-directed kernel parameters. Every field is independently validated
/// against the ranges in `spec.md` §4.4; an out-of-range update is rejected
/// wholesale and the previous value stays in effect.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct KernelParams {
    /// Centre-pull strength for connected nodes. Range 0.001–0.1.
    pub attraction: f32,
    /// Pairwise quadratic-falloff repulsion strength. Range 0.1–0.5.
    pub repulsion: f32,
    /// Edge-length restoration strength. Range 0.001–0.15.
    pub spring: f32,
    /// Per-tick velocity decay. Range 0.5–0.95.
    pub damping: f32,
    /// Hard velocity clamp after integration. Range 0.1–5.0.
    pub max_velocity: f32,
    /// Minimum pairwise distance before repulsion saturates. Range 0.1–1.0.
    pub collision_radius: f32,
    /// Soft cube bound, prior to the ×1000 wire scale. Range 0.1–2.0.
    pub bounds_size: f32,
    /// Ticks per batch when driven manually. Range 1–1000.
    pub iterations: u32,
}

impl Default for KernelParams {
    fn default() -> Self {
        Self {
            attraction: 0.02,
            repulsion: 0.05,
            spring: 0.08,
            damping: 0.85,
            max_velocity: 0.2,
            collision_radius: 0.1,
            bounds_size: 0.5,
            iterations: 100,
        }
    }
}

impl KernelParams {
    /// Validates every field against its documented range.
    ///
    /// # Errors
    ///
    /// Returns [`KernelError::ValidationFailed`] naming the first field out
    /// of range.
    pub fn validate(&self) -> Result<(), KernelError> {
        const ATTRACTION: Range = Range { name: "attraction", min: 0.001, max: 0.1 };
        const REPULSION: Range = Range { name: "repulsion", min: 0.1, max: 0.5 };
        const SPRING: Range = Range { name: "spring", min: 0.001, max: 0.15 };
        const DAMPING: Range = Range { name: "damping", min: 0.5, max: 0.95 };
        const MAX_VELOCITY: Range = Range { name: "max_velocity", min: 0.1, max: 5.0 };
        const COLLISION_RADIUS: Range = Range { name: "collision_radius", min: 0.1, max: 1.0 };
        const BOUNDS_SIZE: Range = Range { name: "bounds_size", min: 0.1, max: 2.0 };

        ATTRACTION.check(self.attraction)?;
        REPULSION.check(self.repulsion)?;
        SPRING.check(self.spring)?;
        DAMPING.check(self.damping)?;
        MAX_VELOCITY.check(self.max_velocity)?;
        COLLISION_RADIUS.check(self.collision_radius)?;
        BOUNDS_SIZE.check(self.bounds_size)?;
        if !(1..=1000).contains(&self.iterations) {
            return Err(KernelError::ValidationFailed {
                parameter: "iterations",
                value: self.iterations as f32,
                min: 1.0,
                max: 1000.0,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_params_are_valid() {
        assert!(KernelParams::default().validate().is_ok());
    }

    #[test]
    fn out_of_range_damping_is_rejected() {
        let params = KernelParams {
            damping: 0.99,
            ..KernelParams::default()
        };
        let err = params.validate().unwrap_err();
        assert!(matches!(
            err,
            KernelError::ValidationFailed { parameter: "damping", .. }
        ));
    }

    #[test]
    fn zero_iterations_is_rejected() {
        let params = KernelParams {
            iterations: 0,
            ..KernelParams::default()
        };
        assert!(params.validate().is_err());
    }
}
