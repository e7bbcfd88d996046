// SPDX-License-Identifier: GPL-3.0-only

//! Error types for the capture core

use std::fmt;

/// Result type alias using CoreError
pub type CoreResult<T> = Result<T, CoreError>;

/// Top-level error type for registry and device operations
#[derive(Debug, Clone)]
pub enum CoreError {
    /// The hardware subsystem could not be initialized.
    /// Fatal for the registry instance, recoverable by retrying `open()`.
    HardwareUnavailable(String),
    /// The device rejected the requested stream combination.
    /// The device remains Stopped; adjust the configuration and retry.
    PipelineStartFailed(String),
    /// No tracked device with the given serial number
    DeviceNotFound(String),
    /// Parameter validation error
    Parameter(ParamError),
}

/// Parameter bus validation errors
#[derive(Debug, Clone, PartialEq)]
pub enum ParamError {
    /// Value outside the declared range; rejected before reaching hardware
    InvalidParameterValue {
        param: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },
    /// Value variant does not match the parameter's declared type
    WrongType { param: &'static str },
}

/// Capture-thread frameset wait failures
///
/// A bounded timeout is not a failure and is reported as `Ok(None)` by
/// the backend. These variants terminate the capture loop cleanly,
/// equivalent to an implicit stop.
#[derive(Debug, Clone)]
pub enum FrameWaitError {
    /// The device disconnected mid-capture
    Disconnected,
    /// Any other backend-reported streaming error
    Backend(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::HardwareUnavailable(msg) => write!(f, "Hardware unavailable: {}", msg),
            CoreError::PipelineStartFailed(msg) => write!(f, "Pipeline start failed: {}", msg),
            CoreError::DeviceNotFound(serial) => write!(f, "Device not found: {}", serial),
            CoreError::Parameter(e) => write!(f, "Parameter error: {}", e),
        }
    }
}

impl fmt::Display for ParamError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamError::InvalidParameterValue {
                param,
                value,
                min,
                max,
            } => write!(
                f,
                "Value {} for '{}' outside valid range [{}, {}]",
                value, param, min, max
            ),
            ParamError::WrongType { param } => {
                write!(f, "Wrong value type for parameter '{}'", param)
            }
        }
    }
}

impl fmt::Display for FrameWaitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameWaitError::Disconnected => write!(f, "Device disconnected during capture"),
            FrameWaitError::Backend(msg) => write!(f, "Frame wait failed: {}", msg),
        }
    }
}

impl std::error::Error for CoreError {}
impl std::error::Error for ParamError {}
impl std::error::Error for FrameWaitError {}

impl From<ParamError> for CoreError {
    fn from(err: ParamError) -> Self {
        CoreError::Parameter(err)
    }
}
