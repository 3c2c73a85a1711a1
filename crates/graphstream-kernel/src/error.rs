// SPDX-License-Identifier: Apache-2.0
//! Error type for kernel parameter validation.

/// Failure constructing or updating [`crate::KernelParams`].
#[derive(Debug, Clone, Copy, thiserror::Error, PartialEq)]
pub enum KernelError {
    /// A parameter fell outside its documented range. The caller should
    /// keep the previous value in effect.
    #[error("parameter {parameter} = {value} is outside the valid range [{min}, {max}]")]
    ValidationFailed {
        /// Name of the offending field.
        parameter: &'static str,
        /// The rejected value.
        value: f32,
        /// Inclusive lower bound.
        min: f32,
        /// Inclusive upper bound.
        max: f32,
    },
}
